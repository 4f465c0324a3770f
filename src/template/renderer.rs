//! Template renderer that executes template AST with a data context.
//!
//! Evaluates pre-compiled expressions against a `serde_json::Value` context.

use serde_json::{Map, Value};

use crate::template::helpers::{
    call_array_method, call_builtin, call_object_method, call_string_method,
};
use crate::template::parser::{CompareOp, Expr, TemplateNode};

/// Callback that renders a named partial with its own data context.
pub type PartialRenderer<'a> = &'a dyn Fn(&str, &Value) -> Result<String, String>;

/// Callback for helper functions supplied by the caller (e.g. layout helpers).
/// Returns `None` when the helper name is unknown to it.
pub type HelperFn<'a> = &'a dyn Fn(&str, &[Value]) -> Option<Result<Value, String>>;

/// Everything a template can reach besides its data.
#[derive(Clone, Copy, Default)]
pub struct RenderScope<'a> {
    pub partials: Option<PartialRenderer<'a>>,
    pub helpers: Option<HelperFn<'a>>,
    /// Content substituted for `<%= yield %>`; only set when rendering a layout.
    pub yield_content: Option<&'a str>,
    /// Template path, used to annotate error messages.
    pub template_path: Option<&'a str>,
}

impl<'a> RenderScope<'a> {
    pub fn with_path(mut self, path: &'a str) -> Self {
        self.template_path = Some(path);
        self
    }
}

/// Render a template AST with the given data context into a fresh string.
pub fn render_nodes(
    nodes: &[TemplateNode],
    data: &Value,
    scope: RenderScope<'_>,
) -> Result<String, String> {
    let mut output = String::new();
    render_into(nodes, data, scope, &mut output)?;
    Ok(output)
}

/// Render a template AST, appending to `output`.
pub fn render_into(
    nodes: &[TemplateNode],
    data: &Value,
    scope: RenderScope<'_>,
    output: &mut String,
) -> Result<(), String> {
    for node in nodes {
        let node_line = match node {
            TemplateNode::Output { line, .. }
            | TemplateNode::If { line, .. }
            | TemplateNode::For { line, .. }
            | TemplateNode::Partial { line, .. } => Some(*line),
            _ => None,
        };

        if let Err(e) = render_node(node, data, scope, output) {
            // Nested nodes already annotated the message with their location
            if let Some(path) = scope.template_path {
                if !e.contains(path) {
                    return Err(match node_line {
                        Some(line) => format!("{} at {}:{}", e, path, line),
                        None => format!("{} in {}", e, path),
                    });
                }
            }
            return Err(e);
        }
    }

    Ok(())
}

fn render_node(
    node: &TemplateNode,
    data: &Value,
    scope: RenderScope<'_>,
    output: &mut String,
) -> Result<(), String> {
    match node {
        TemplateNode::Literal(s) => output.push_str(s),
        TemplateNode::Output { expr, escaped, .. } => {
            let value = evaluate_expr(expr, data, scope)?;
            let s = value_to_string(&value);
            if *escaped {
                output.push_str(&html_escape(&s));
            } else {
                output.push_str(&s);
            }
        }
        TemplateNode::If {
            condition,
            body,
            else_body,
            ..
        } => {
            let cond_value = evaluate_expr(condition, data, scope)?;
            if is_truthy(&cond_value) {
                render_into(body, data, scope, output)?;
            } else if let Some(else_nodes) = else_body {
                render_into(else_nodes, data, scope, output)?;
            }
        }
        TemplateNode::For {
            var,
            index_var,
            iterable,
            body,
            ..
        } => {
            let iterable_value = evaluate_expr(iterable, data, scope)?;
            match &iterable_value {
                Value::Array(arr) => {
                    for (i, item) in arr.iter().enumerate() {
                        let mut loop_data = with_variable(data, var, item.clone())?;
                        if let Some(idx_var) = index_var {
                            loop_data = with_variable(&loop_data, idx_var, Value::from(i))?;
                        }
                        render_into(body, &loop_data, scope, output)?;
                    }
                }
                Value::Object(map) => {
                    // Iterate over object entries as [key, value] pairs
                    for (i, (k, v)) in map.iter().enumerate() {
                        let pair = Value::Array(vec![Value::String(k.clone()), v.clone()]);
                        let mut loop_data = with_variable(data, var, pair)?;
                        if let Some(idx_var) = index_var {
                            loop_data = with_variable(&loop_data, idx_var, Value::from(i))?;
                        }
                        render_into(body, &loop_data, scope, output)?;
                    }
                }
                Value::Null => {}
                other => {
                    return Err(format!(
                        "Cannot iterate over {}: expected Array or Object",
                        type_name(other)
                    ));
                }
            }
        }
        TemplateNode::Yield => match scope.yield_content {
            Some(content) => output.push_str(content),
            None => return Err("yield encountered outside of layout context".to_string()),
        },
        TemplateNode::Partial { name, context, .. } => {
            let Some(renderer) = scope.partials else {
                return Err(format!("Partial rendering not available for '{}'", name));
            };
            let partial_data = match context {
                Some(ctx_expr) => evaluate_expr(ctx_expr, data, scope)?,
                None => data.clone(),
            };
            output.push_str(&renderer(name, &partial_data)?);
        }
    }
    Ok(())
}

/// Evaluate a pre-compiled expression in the context of the data.
pub fn evaluate_expr(expr: &Expr, data: &Value, scope: RenderScope<'_>) -> Result<Value, String> {
    match expr {
        Expr::StringLit(s) => Ok(Value::String(s.clone())),
        Expr::IntLit(n) => Ok(Value::from(*n)),
        Expr::FloatLit(n) => Ok(Value::from(*n)),
        Expr::BoolLit(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),

        Expr::Var(name) => get_field(data, name),

        Expr::Field(base, field) => {
            let base_value = evaluate_expr(base, data, scope)?;
            get_field(&base_value, field)
        }

        Expr::Index(base, key) => {
            let base_value = evaluate_expr(base, data, scope)?;
            let key_value = evaluate_expr(key, data, scope)?;
            Ok(index_value(&base_value, &key_value))
        }

        Expr::Compare(left, op, right) => {
            let left_val = evaluate_expr(left, data, scope)?;
            let right_val = evaluate_expr(right, data, scope)?;
            let result = match op {
                CompareOp::Eq => values_equal(&left_val, &right_val),
                CompareOp::Ne => !values_equal(&left_val, &right_val),
                CompareOp::Gt => compare_values(&left_val, &right_val)? > 0,
                CompareOp::Lt => compare_values(&left_val, &right_val)? < 0,
                CompareOp::Ge => compare_values(&left_val, &right_val)? >= 0,
                CompareOp::Le => compare_values(&left_val, &right_val)? <= 0,
            };
            Ok(Value::Bool(result))
        }

        Expr::And(left, right) => {
            let left_val = evaluate_expr(left, data, scope)?;
            if !is_truthy(&left_val) {
                return Ok(Value::Bool(false));
            }
            let right_val = evaluate_expr(right, data, scope)?;
            Ok(Value::Bool(is_truthy(&right_val)))
        }

        Expr::Or(left, right) => {
            let left_val = evaluate_expr(left, data, scope)?;
            if is_truthy(&left_val) {
                return Ok(Value::Bool(true));
            }
            let right_val = evaluate_expr(right, data, scope)?;
            Ok(Value::Bool(is_truthy(&right_val)))
        }

        Expr::Not(inner) => {
            let inner_val = evaluate_expr(inner, data, scope)?;
            Ok(Value::Bool(!is_truthy(&inner_val)))
        }

        Expr::Method(base, method) => {
            let base_value = evaluate_expr(base, data, scope)?;
            match &base_value {
                Value::Array(items) => call_array_method(items, method, &[]),
                Value::String(s) => call_string_method(s, method, &[]),
                Value::Object(map) => call_object_method(map, method),
                Value::Null => Ok(Value::Null),
                other => Err(format!("Cannot call method '{}' on {}", method, type_name(other))),
            }
        }

        Expr::Call(name, args) => {
            let evaluated_args = args
                .iter()
                .map(|arg| evaluate_expr(arg, data, scope))
                .collect::<Result<Vec<_>, _>>()?;

            if let Some(helpers) = scope.helpers {
                if let Some(result) = helpers(name, &evaluated_args) {
                    return result;
                }
            }

            call_builtin(name, &evaluated_args)
                .unwrap_or_else(|| Err(format!("'{}' is not defined", name)))
        }
    }
}

/// Index into a value (array or object access)
fn index_value(base: &Value, key: &Value) -> Value {
    match (base, key) {
        (Value::Array(arr), Value::Number(n)) => {
            let Some(idx) = n.as_i64() else {
                return Value::Null;
            };
            let idx = if idx < 0 { arr.len() as i64 + idx } else { idx };
            if idx >= 0 {
                arr.get(idx as usize).cloned().unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        (Value::Object(map), Value::String(k)) => map.get(k).cloned().unwrap_or(Value::Null),
        (Value::Object(map), other) => map
            .get(&value_to_string(other))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

/// Get a value from an object by key; missing keys read as null.
fn get_field(value: &Value, key: &str) -> Result<Value, String> {
    match value {
        Value::Object(map) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(format!("Cannot access '{}' on {}: expected Object", key, type_name(other))),
    }
}

/// Create a new data context with an additional variable.
fn with_variable(data: &Value, name: &str, value: Value) -> Result<Value, String> {
    match data {
        Value::Object(map) => {
            let mut new_map = map.clone();
            new_map.insert(name.to_string(), value);
            Ok(Value::Object(new_map))
        }
        Value::Null => {
            let mut new_map = Map::new();
            new_map.insert(name.to_string(), value);
            Ok(Value::Object(new_map))
        }
        _ => Err("Data context must be an Object".to_string()),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Convert a Value to its string representation for output
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(value_to_string).collect();
            items.join(", ")
        }
        Value::Object(_) => "[Object]".to_string(),
    }
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

/// Check if a value is truthy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

/// Compare two values, returning -1, 0, or 1
fn compare_values(a: &Value, b: &Value) -> Result<i32, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            Ok(x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal) as i32)
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y) as i32),
        _ => Err(format!("Cannot compare {} and {}", type_name(a), type_name(b))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::{compile_expr, parse_template};
    use serde_json::json;

    fn render(source: &str, data: Value) -> Result<String, String> {
        let nodes = parse_template(source)?;
        render_nodes(&nodes, &data, RenderScope::default())
    }

    #[test]
    fn test_render_literal() {
        let nodes = vec![TemplateNode::Literal("Hello World".to_string())];
        let result = render_nodes(&nodes, &json!({}), RenderScope::default()).unwrap();
        assert_eq!(result, "Hello World");
    }

    #[test]
    fn test_render_output_escaped() {
        let result = render("<%= name %>", json!({"name": "<script>"})).unwrap();
        assert_eq!(result, "&lt;script&gt;");
    }

    #[test]
    fn test_render_output_raw() {
        let result = render("<%- html %>", json!({"html": "<b>bold</b>"})).unwrap();
        assert_eq!(result, "<b>bold</b>");
    }

    #[test]
    fn test_render_if_else() {
        let src = "<% if show %>visible<% else %>hidden<% end %>";
        assert_eq!(render(src, json!({"show": true})).unwrap(), "visible");
        assert_eq!(render(src, json!({"show": false})).unwrap(), "hidden");
        assert_eq!(render(src, json!({})).unwrap(), "hidden");
    }

    #[test]
    fn test_render_elsif_chain() {
        let src = "<% if n > 10 %>big<% elsif n > 5 %>medium<% else %>small<% end %>";
        assert_eq!(render(src, json!({"n": 12})).unwrap(), "big");
        assert_eq!(render(src, json!({"n": 7})).unwrap(), "medium");
        assert_eq!(render(src, json!({"n": 1})).unwrap(), "small");
    }

    #[test]
    fn test_render_for_loop_with_index() {
        let src = "<% for item, i in items %><%= i %>:<%= item %> <% end %>";
        let result = render(src, json!({"items": ["a", "b"]})).unwrap();
        assert_eq!(result, "0:a 1:b ");
    }

    #[test]
    fn test_render_for_over_object() {
        let src = "<% for pair in user %><%= pair[0] %>=<%= pair[1] %>;<% end %>";
        let result = render(src, json!({"user": {"name": "ann", "age": 3}})).unwrap();
        assert_eq!(result, "name=ann;age=3;");
    }

    #[test]
    fn test_nested_field_and_methods() {
        let data = json!({"user": {"name": "ann", "tags": ["x", "y", "z"]}});
        assert_eq!(render("<%= user.name.upcase %>", data.clone()).unwrap(), "ANN");
        assert_eq!(render("<%= user.tags.length %>", data.clone()).unwrap(), "3");
        assert_eq!(render("<%= user[\"tags\"][-1] %>", data).unwrap(), "z");
    }

    #[test]
    fn test_missing_values_render_empty() {
        assert_eq!(render("[<%= nope.deeper %>]", json!({})).unwrap(), "[]");
    }

    #[test]
    fn test_yield_outside_layout_is_error() {
        assert!(render("<%= yield %>", json!({})).is_err());
    }

    #[test]
    fn test_yield_with_content() {
        let nodes = parse_template("<main><%= yield %></main>").unwrap();
        let scope = RenderScope {
            yield_content: Some("<p>hi</p>"),
            ..RenderScope::default()
        };
        let result = render_nodes(&nodes, &json!({}), scope).unwrap();
        assert_eq!(result, "<main><p>hi</p></main>");
    }

    #[test]
    fn test_partial_callback_receives_context() {
        let nodes = parse_template("<%= render 'card', user %>").unwrap();
        let partials = |name: &str, ctx: &Value| -> Result<String, String> {
            Ok(format!("{}:{}", name, ctx["name"].as_str().unwrap_or("")))
        };
        let scope = RenderScope {
            partials: Some(&partials),
            ..RenderScope::default()
        };
        let result = render_nodes(&nodes, &json!({"user": {"name": "bob"}}), scope).unwrap();
        assert_eq!(result, "card:bob");
    }

    #[test]
    fn test_helper_callback_takes_precedence() {
        let nodes = parse_template("<%- greet(\"x\") %>").unwrap();
        let helpers = |name: &str, args: &[Value]| -> Option<Result<Value, String>> {
            (name == "greet").then(|| Ok(Value::String(format!("<i>{}</i>", value_to_string(&args[0])))))
        };
        let scope = RenderScope {
            helpers: Some(&helpers),
            ..RenderScope::default()
        };
        assert_eq!(render_nodes(&nodes, &json!({}), scope).unwrap(), "<i>x</i>");
    }

    #[test]
    fn test_unknown_function_reports_path_and_line() {
        let nodes = parse_template("line one\n<%= missing() %>").unwrap();
        let err = render_nodes(&nodes, &json!({}), RenderScope::default().with_path("views/a.html.erb"))
            .unwrap_err();
        assert_eq!(err, "'missing' is not defined at views/a.html.erb:2");
    }

    #[test]
    fn test_compare_and_logic() {
        let data = json!({"a": 2, "b": 2.0, "s": "x"});
        let eval =
            |src: &str| evaluate_expr(&compile_expr(src), &data, RenderScope::default()).unwrap();
        assert_eq!(eval("a == b"), Value::Bool(true));
        assert_eq!(eval("a >= 3"), Value::Bool(false));
        assert_eq!(eval("s == \"x\" && !missing"), Value::Bool(true));
        assert_eq!(eval("missing || a"), Value::Bool(true));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<a href=\"x\">'&'</a>"), "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;");
    }
}

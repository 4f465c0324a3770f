//! ERB-style template parser.
//!
//! Parses templates with syntax like:
//! - `<%= expr %>` - HTML-escaped output
//! - `<%- expr %>` - Raw/unescaped output
//! - `<% code %>` - Control flow (if, elsif, else, for, end)
//! - `<%= yield %>` - Layout content insertion point
//! - `<%= render 'name' %>` - Partial insertion

/// Pre-compiled expression for fast evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// String literal: "hello"
    StringLit(String),
    /// Integer literal: 42
    IntLit(i64),
    /// Float literal: 3.14
    FloatLit(f64),
    /// Boolean literal: true/false
    BoolLit(bool),
    /// Null literal
    Null,
    /// Simple variable lookup: name
    Var(String),
    /// Field access: expr.field
    Field(Box<Expr>, String),
    /// Index access: expr[key]
    Index(Box<Expr>, Box<Expr>),
    /// Comparison: expr op expr
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    /// Logical AND: expr && expr
    And(Box<Expr>, Box<Expr>),
    /// Logical OR: expr || expr
    Or(Box<Expr>, Box<Expr>),
    /// Logical NOT: !expr
    Not(Box<Expr>),
    /// Built-in property: expr.length
    Method(Box<Expr>, String),
    /// Helper call: name(arg1, arg2, ...)
    Call(String, Vec<Expr>),
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareOp {
    Eq, // ==
    Ne, // !=
    Lt, // <
    Le, // <=
    Gt, // >
    Ge, // >=
}

/// A node in the template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    /// Raw HTML/text content
    Literal(String),
    /// Output expression: `<%= expr %>` (escaped) or `<%- expr %>` (raw)
    Output { expr: Expr, escaped: bool, line: usize },
    /// If conditional block
    If {
        condition: Expr,
        body: Vec<TemplateNode>,
        else_body: Option<Vec<TemplateNode>>,
        line: usize,
    },
    /// For loop block
    For {
        var: String,
        index_var: Option<String>,
        iterable: Expr,
        body: Vec<TemplateNode>,
        line: usize,
    },
    /// Layout content insertion point
    Yield,
    /// Render a partial template
    Partial {
        name: String,
        context: Option<Expr>,
        line: usize,
    },
}

/// Token types during lexing
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(String),
    OutputEscaped(String, usize), // <%= ... %>
    OutputRaw(String, usize),     // <%- ... %>
    Code(String, usize),          // <% ... %>
}

/// How a nested block ended.
enum BlockEnd {
    End,
    Else,
    Elsif(Expr, usize),
    Eof,
}

/// Parse an ERB-style template into an AST.
pub fn parse_template(source: &str) -> Result<Vec<TemplateNode>, String> {
    let tokens = tokenize(source)?;
    let mut pos = 0;
    let (nodes, end) = parse_block(&tokens, &mut pos)?;
    match end {
        BlockEnd::Eof => Ok(nodes),
        BlockEnd::End => Err(format!("Unexpected 'end' at line {}", line_of(&tokens, pos))),
        BlockEnd::Else | BlockEnd::Elsif(..) => Err(format!(
            "Unexpected 'else' outside of block at line {}",
            line_of(&tokens, pos)
        )),
    }
}

fn line_of(tokens: &[Token], pos: usize) -> usize {
    match tokens.get(pos.saturating_sub(1)) {
        Some(Token::OutputEscaped(_, l))
        | Some(Token::OutputRaw(_, l))
        | Some(Token::Code(_, l)) => *l,
        _ => 1,
    }
}

/// Tokenize the template source into a sequence of tokens.
fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut current_literal = String::new();
    let mut line = 1;

    while let Some(c) = chars.next() {
        if c == '<' && chars.peek() == Some(&'%') {
            chars.next(); // consume '%'
            let tag_line = line;

            if !current_literal.is_empty() {
                tokens.push(Token::Literal(std::mem::take(&mut current_literal)));
            }

            let is_output = chars.peek() == Some(&'=');
            let is_raw = chars.peek() == Some(&'-');
            if is_output || is_raw {
                chars.next();
            }

            let mut tag_content = String::new();
            loop {
                match chars.next() {
                    Some('%') if chars.peek() == Some(&'>') => {
                        chars.next();
                        break;
                    }
                    Some(ch) => {
                        if ch == '\n' {
                            line += 1;
                        }
                        tag_content.push(ch);
                    }
                    None => return Err(format!("Unclosed template tag at line {}", tag_line)),
                }
            }

            let tag_content = tag_content.trim().to_string();
            if is_raw {
                tokens.push(Token::OutputRaw(tag_content, tag_line));
            } else if is_output {
                tokens.push(Token::OutputEscaped(tag_content, tag_line));
            } else {
                tokens.push(Token::Code(tag_content, tag_line));
            }
        } else {
            if c == '\n' {
                line += 1;
            }
            current_literal.push(c);
        }
    }

    if !current_literal.is_empty() {
        tokens.push(Token::Literal(current_literal));
    }

    Ok(tokens)
}

/// Parse tokens until a block terminator or end of input.
fn parse_block(tokens: &[Token], pos: &mut usize) -> Result<(Vec<TemplateNode>, BlockEnd), String> {
    let mut nodes = Vec::new();

    while *pos < tokens.len() {
        let token = &tokens[*pos];
        *pos += 1;

        match token {
            Token::Literal(s) => nodes.push(TemplateNode::Literal(s.clone())),
            Token::OutputEscaped(expr, line) => nodes.push(output_node(expr, true, *line)?),
            Token::OutputRaw(expr, line) => nodes.push(output_node(expr, false, *line)?),
            Token::Code(code, line) => {
                let code = code.trim();
                if code == "end" {
                    return Ok((nodes, BlockEnd::End));
                } else if code == "else" {
                    return Ok((nodes, BlockEnd::Else));
                } else if let Some(cond) = code.strip_prefix("elsif ") {
                    return Ok((nodes, BlockEnd::Elsif(compile_expr(cond), *line)));
                } else if let Some(cond) = code.strip_prefix("if ") {
                    nodes.push(parse_if(tokens, pos, compile_expr(cond), *line)?);
                } else if let Some(stmt) = code.strip_prefix("for ") {
                    let (var, index_var, iterable) = parse_for_statement(stmt)?;
                    let (body, end) = parse_block(tokens, pos)?;
                    match end {
                        BlockEnd::End => nodes.push(TemplateNode::For {
                            var,
                            index_var,
                            iterable,
                            body,
                            line: *line,
                        }),
                        BlockEnd::Eof => {
                            return Err(format!("Unclosed for block at line {} - missing 'end'", line))
                        }
                        _ => return Err(format!("Unexpected 'else' inside for block at line {}", line)),
                    }
                }
                // Any other code tag is ignored; templates have no side effects.
            }
        }
    }

    Ok((nodes, BlockEnd::Eof))
}

/// Parse the remainder of an if block whose opening tag was already consumed.
fn parse_if(
    tokens: &[Token],
    pos: &mut usize,
    condition: Expr,
    line: usize,
) -> Result<TemplateNode, String> {
    let (body, end) = parse_block(tokens, pos)?;
    let else_body = match end {
        BlockEnd::End => None,
        BlockEnd::Else => {
            let (else_nodes, end) = parse_block(tokens, pos)?;
            match end {
                BlockEnd::End => Some(else_nodes),
                BlockEnd::Eof => return Err(format!("Unclosed if block at line {} - missing 'end'", line)),
                _ => return Err(format!("Duplicate 'else' in if block at line {}", line)),
            }
        }
        // elsif is a nested if living in the else branch; it consumes the shared 'end'
        BlockEnd::Elsif(cond, elsif_line) => Some(vec![parse_if(tokens, pos, cond, elsif_line)?]),
        BlockEnd::Eof => return Err(format!("Unclosed if block at line {} - missing 'end'", line)),
    };

    Ok(TemplateNode::If {
        condition,
        body,
        else_body,
        line,
    })
}

fn output_node(expr: &str, escaped: bool, line: usize) -> Result<TemplateNode, String> {
    if expr == "yield" {
        return Ok(TemplateNode::Yield);
    }
    if expr.starts_with("render ") || expr.starts_with("render(") {
        return parse_partial_call(expr, line);
    }
    Ok(TemplateNode::Output {
        expr: compile_expr(expr),
        escaped,
        line,
    })
}

/// Parse a for statement like "item in items", "item, i in items" or "(item in items)"
fn parse_for_statement(s: &str) -> Result<(String, Option<String>, Expr), String> {
    let s = s
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();

    let Some(pos) = s.find(" in ") else {
        return Err(format!(
            "Invalid for statement: expected 'var in iterable', got '{}'",
            s
        ));
    };

    let vars = s[..pos].trim();
    let iterable_str = s[pos + 4..].trim();

    if vars.is_empty() {
        return Err("Missing loop variable in for statement".to_string());
    }
    if iterable_str.is_empty() {
        return Err("Missing iterable in for statement".to_string());
    }

    let (var, index_var) = match vars.split_once(',') {
        Some((v, i)) => (v.trim().to_string(), Some(i.trim().to_string())),
        None => (vars.to_string(), None),
    };

    Ok((var, index_var, compile_expr(iterable_str)))
}

/// Parse a partial render call like "render 'users/card'" or "render('users/card', user)"
fn parse_partial_call(expr: &str, line: usize) -> Result<TemplateNode, String> {
    let expr = expr.trim();

    let args = if let Some(inner) = expr.strip_prefix("render(") {
        inner.trim_end_matches(')').trim()
    } else if let Some(rest) = expr.strip_prefix("render ") {
        rest.trim()
    } else {
        return Err(format!("Invalid render call: {}", expr));
    };

    let mut parts = args.splitn(2, ',');
    let name = parts
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_string();

    if name.is_empty() {
        return Err(format!("render call without a template name at line {}", line));
    }

    let context = parts.next().map(|ctx| compile_expr(ctx.trim()));

    Ok(TemplateNode::Partial {
        name,
        context,
        line,
    })
}

/// Compile an expression string into a pre-compiled Expr AST.
pub fn compile_expr(expr: &str) -> Expr {
    let expr = expr.trim();

    if expr.len() >= 2
        && ((expr.starts_with('"') && expr.ends_with('"'))
            || (expr.starts_with('\'') && expr.ends_with('\'')))
        && !expr[1..expr.len() - 1].contains(['"', '\''])
    {
        return Expr::StringLit(expr[1..expr.len() - 1].to_string());
    }

    if let Ok(n) = expr.parse::<i64>() {
        return Expr::IntLit(n);
    }
    // "inf" and "nan" parse as floats but are variable names here
    if expr.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        if let Ok(n) = expr.parse::<f64>() {
            return Expr::FloatLit(n);
        }
    }

    match expr {
        "true" => return Expr::BoolLit(true),
        "false" => return Expr::BoolLit(false),
        "null" | "nil" => return Expr::Null,
        _ => {}
    }

    // || binds looser than &&, so split on it first
    if let Some(pos) = find_top_level(expr, " || ") {
        let left = compile_expr(&expr[..pos]);
        let right = compile_expr(&expr[pos + 4..]);
        return Expr::Or(Box::new(left), Box::new(right));
    }
    if let Some(pos) = find_top_level(expr, " && ") {
        let left = compile_expr(&expr[..pos]);
        let right = compile_expr(&expr[pos + 4..]);
        return Expr::And(Box::new(left), Box::new(right));
    }

    for (op_str, op) in [
        ("==", CompareOp::Eq),
        ("!=", CompareOp::Ne),
        (">=", CompareOp::Ge),
        ("<=", CompareOp::Le),
        (">", CompareOp::Gt),
        ("<", CompareOp::Lt),
    ] {
        if let Some(pos) = find_top_level(expr, op_str) {
            let left = compile_expr(&expr[..pos]);
            let right = compile_expr(&expr[pos + op_str.len()..]);
            return Expr::Compare(Box::new(left), op, Box::new(right));
        }
    }

    if let Some(inner) = expr.strip_prefix('!') {
        return Expr::Not(Box::new(compile_expr(inner)));
    }

    // Helper calls like "name(arg1, arg2)"
    if let Some(paren_pos) = expr.find('(') {
        let name = &expr[..paren_pos];
        if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
            let args_str = &expr[paren_pos..];
            if find_matching_bracket(args_str) == Some(args_str.len() - 1) {
                let args_content = &args_str[1..args_str.len() - 1];
                let args = if args_content.trim().is_empty() {
                    Vec::new()
                } else {
                    parse_function_args(args_content)
                };
                return Expr::Call(name.to_string(), args);
            }
        }
    }

    compile_variable_access(expr)
}

/// Find an operator position, respecting bracket/quote nesting
fn find_top_level(expr: &str, op: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut string_char = b' ';
    let bytes = expr.as_bytes();
    let op_bytes = op.as_bytes();

    for i in 0..bytes.len() {
        let c = bytes[i];

        if in_string {
            if c == string_char && (i == 0 || bytes[i - 1] != b'\\') {
                in_string = false;
            }
            continue;
        }

        match c {
            b'"' | b'\'' => {
                in_string = true;
                string_char = c;
            }
            b'[' | b'(' => depth += 1,
            b']' | b')' => depth -= 1,
            _ => {
                if depth == 0 && bytes[i..].starts_with(op_bytes) {
                    return Some(i);
                }
            }
        }
    }
    None
}

/// Compile variable access like `user`, `user["name"]`, or `user.name`
fn compile_variable_access(expr: &str) -> Expr {
    let (head_end, head) = match expr.find(['.', '[']) {
        Some(pos) => (pos, &expr[..pos]),
        None => return Expr::Var(expr.to_string()),
    };
    if head.is_empty() {
        return Expr::Var(expr.to_string());
    }
    compile_accessors(Expr::Var(head.to_string()), &expr[head_end..])
}

/// Compile a chain of `.field` and `[key]` accessors applied to `base`.
fn compile_accessors(base: Expr, rest: &str) -> Expr {
    if rest.is_empty() {
        return base;
    }

    if let Some(after_dot) = rest.strip_prefix('.') {
        let end = after_dot.find(['.', '[']).unwrap_or(after_dot.len());
        let field = &after_dot[..end];
        let current = match field {
            "length" | "len" | "size" | "empty" | "first" | "last" | "keys" | "values"
            | "upcase" | "downcase" | "capitalize" | "trim" | "reverse" => {
                Expr::Method(Box::new(base), field.to_string())
            }
            _ => Expr::Field(Box::new(base), field.to_string()),
        };
        return compile_accessors(current, &after_dot[end..]);
    }

    if rest.starts_with('[') {
        if let Some(close) = find_matching_bracket(rest) {
            let key = compile_expr(&rest[1..close]);
            let indexed = Expr::Index(Box::new(base), Box::new(key));
            return compile_accessors(indexed, &rest[close + 1..]);
        }
    }

    base
}

/// Find the matching closing bracket for the bracket at position 0
fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0;
    let mut in_string = false;
    let mut string_char = ' ';

    for (i, c) in s.char_indices() {
        if in_string {
            if c == string_char {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                in_string = true;
                string_char = c;
            }
            '[' | '(' => depth += 1,
            ']' | ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse function arguments separated by commas
fn parse_function_args(args_str: &str) -> Vec<Expr> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0;
    let mut in_string = false;
    let mut string_char = ' ';

    for c in args_str.chars() {
        if in_string {
            if c == string_char && !current.ends_with('\\') {
                in_string = false;
            }
            current.push(c);
            continue;
        }
        match c {
            '"' | '\'' => {
                in_string = true;
                string_char = c;
                current.push(c);
            }
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.trim().is_empty() {
                    args.push(compile_expr(current.trim()));
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() {
        args.push(compile_expr(current.trim()));
    }

    args
}

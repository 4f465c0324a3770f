//! Array, string and object helpers plus the built-in template functions.

use serde_json::{Map, Value};

use crate::template::renderer::{html_escape, is_truthy, type_name, value_to_string};

pub fn call_array_method(
    items: &[Value],
    method_name: &str,
    args: &[Value],
) -> Result<Value, String> {
    match method_name {
        "length" | "len" | "size" => Ok(Value::from(items.len())),
        "first" => Ok(items.first().cloned().unwrap_or(Value::Null)),
        "last" => Ok(items.last().cloned().unwrap_or(Value::Null)),
        "reverse" => {
            let mut new_items = items.to_vec();
            new_items.reverse();
            Ok(Value::Array(new_items))
        }
        "join" => {
            let delim = match args.first() {
                Some(Value::String(s)) => s.as_str(),
                _ => "",
            };
            let parts: Vec<String> = items.iter().map(value_to_string).collect();
            Ok(Value::String(parts.join(delim)))
        }
        "empty" | "is_empty" => Ok(Value::Bool(items.is_empty())),
        _ => Err(format!("Unknown array method: {}", method_name)),
    }
}

pub fn call_string_method(s: &str, method_name: &str, args: &[Value]) -> Result<Value, String> {
    match method_name {
        "length" | "len" | "size" => Ok(Value::from(s.chars().count())),
        "empty" | "is_empty" => Ok(Value::Bool(s.is_empty())),
        "reverse" => Ok(Value::String(s.chars().rev().collect())),
        "uppercase" | "upcase" => Ok(Value::String(s.to_uppercase())),
        "lowercase" | "downcase" => Ok(Value::String(s.to_lowercase())),
        "trim" => Ok(Value::String(s.trim().to_string())),
        "capitalize" => {
            let mut chars = s.chars();
            match chars.next() {
                None => Ok(Value::String(String::new())),
                Some(c) => Ok(Value::String(c.to_uppercase().collect::<String>() + chars.as_str())),
            }
        }
        "split" => match args.first() {
            Some(Value::String(delim)) => Ok(Value::Array(
                s.split(delim.as_str()).map(|p| Value::String(p.to_string())).collect(),
            )),
            _ => Err("split requires a string delimiter".to_string()),
        },
        _ => Err(format!("Unknown string method: {}", method_name)),
    }
}

pub fn call_object_method(map: &Map<String, Value>, method_name: &str) -> Result<Value, String> {
    match method_name {
        "length" | "len" | "size" => Ok(Value::from(map.len())),
        "empty" | "is_empty" => Ok(Value::Bool(map.is_empty())),
        "keys" => Ok(Value::Array(map.keys().cloned().map(Value::String).collect())),
        "values" => Ok(Value::Array(map.values().cloned().collect())),
        _ => Err(format!("Unknown object method: {}", method_name)),
    }
}

/// Functions every template can call. `None` means the name is not a builtin.
pub fn call_builtin(name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    let result = match name {
        "json" => match args.first() {
            Some(v) => serde_json::to_string(v)
                .map(Value::String)
                .map_err(|e| format!("json(): {}", e)),
            None => Err("json requires one argument".to_string()),
        },
        "escape" | "h" => {
            let text = args.first().map(value_to_string).unwrap_or_default();
            Ok(Value::String(html_escape(&text)))
        }
        "default" => match args {
            [value, fallback] => Ok(if is_truthy(value) {
                value.clone()
            } else {
                fallback.clone()
            }),
            _ => Err("default requires two arguments".to_string()),
        },
        "join" => match args {
            [Value::Array(items), rest @ ..] => call_array_method(items, "join", rest),
            [other, ..] => Err(format!("join expects an Array, got {}", type_name(other))),
            [] => Err("join requires an array argument".to_string()),
        },
        _ => return None,
    };
    Some(result)
}

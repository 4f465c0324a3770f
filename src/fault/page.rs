//! HTML and JSON error pages.

use serde_json::{json, Value};

use super::Fault;
use crate::template::html_escape;

/// A fresh id printed on the page and in the log so the two can be matched.
pub fn new_error_id() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// `{"error": {"message", "code"}}`, plus `file`/`line`/`trace` in debug mode.
pub fn json_body(fault: &Fault, debug: bool) -> Value {
    let status = fault.status();
    if debug {
        json!({
            "error": {
                "message": fault.message,
                "code": status,
                "file": fault.file,
                "line": fault.line,
                "trace": fault.trace.lines().map(str::trim).collect::<Vec<_>>(),
            }
        })
    } else {
        json!({
            "error": {
                "message": fault.public_message(),
                "code": status,
            }
        })
    }
}

/// Debug page: message, location and backtrace.
pub fn debug_html(fault: &Fault, error_id: &str) -> String {
    let status = fault.status();
    let location = fault
        .location()
        .map(|l| format!("<p class=\"location\">{}</p>", html_escape(&l)))
        .unwrap_or_default();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{status} {status_text}</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 32px; background: #1e1e2e; color: #cdd6f4; }}
        h1 {{ font-size: 22px; color: #f38ba8; margin: 0 0 8px; }}
        .location {{ font-family: monospace; color: #a6adc8; margin: 0 0 24px; }}
        pre {{ background: #11111b; padding: 16px; border-radius: 6px; overflow-x: auto; font-size: 12px; line-height: 1.5; }}
        .error-id {{ font-family: monospace; color: #6c7086; font-size: 11px; }}
    </style>
</head>
<body>
    <h1>{message}</h1>
    {location}
    <pre>{trace}</pre>
    <p class="error-id">Error ID: {error_id}</p>
</body>
</html>"#,
        status = status,
        status_text = status_text(status),
        message = html_escape(&fault.message),
        location = location,
        trace = html_escape(&fault.trace),
        error_id = error_id,
    )
}

/// Production page: only the status and the public message.
pub fn production_html(fault: &Fault, error_id: &str) -> String {
    let status = fault.status();
    let code_class = if status >= 500 { "error" } else { "warning" };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{status} {status_text}</title>
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background-color: #f8f9fa;
            color: #212529;
            min-height: 100vh;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }}
        .container {{ text-align: center; max-width: 500px; }}
        .error-code {{ font-size: 120px; font-weight: 700; line-height: 1; margin-bottom: 20px; }}
        .error-code.error {{ color: #f8d7da; }}
        .error-code.warning {{ color: #fff3cd; }}
        p {{ font-size: 16px; color: #6c757d; line-height: 1.6; margin-bottom: 24px; }}
        .error-id {{ font-family: monospace; background: #e9ecef; padding: 2px 6px; border-radius: 4px; font-size: 11px; }}
    </style>
</head>
<body>
    <div class="container">
        <div class="error-code {code_class}">{status}</div>
        <p>{message}</p>
        <p>Error ID: <span class="error-id">{error_id}</span></p>
    </div>
</body>
</html>"#,
        status = status,
        status_text = status_text(status),
        code_class = code_class,
        message = html_escape(fault.public_message()),
        error_id = error_id,
    )
}

/// The page served when formatting the real error page failed.
pub const STATIC_500: &str = "500 Internal Server Error";

pub fn status_text(status_code: u16) -> &'static str {
    match status_code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Error",
    }
}

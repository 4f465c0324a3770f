//! File contents for `wallaby new`.

/// Runtime settings
pub const APP_YML: &str = r#"# Runtime settings. APP_DEBUG, APP_PORT and APP_LOG_FILE override these.
debug: false
json_errors: negotiate
views_dir: app/views
themes_dir: public/themes
public_dir: public
log_file: log/error.log
layout: layouts/main
port: 3000
"#;

/// Route table
pub const ROUTER_YML: &str = r#"# Patterns are tried in order and the first match wins.
# Reserved captures: controller, action, parameter, query.
# Any other named capture becomes a named action parameter.
routes:
  '^(?P<controller>[a-z-]+)?/?(?P<action>[a-z-]+)?/?(?P<parameter>[^?]*)(?P<query>\?.*)?$': {}
base_controller: site
base_action: index
error_handler: error
"#;

/// Layout assets, relative to public/content/css and public/content/js
pub const CONTENT_YML: &str = r#"css:
  - app.css
js:
  - app.js
"#;

pub const LAYOUT_VIEW: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title><%= title %></title>
    <%- stylesheets() %>
</head>
<body>
    <main>
<%- yield %>
    </main>
    <%- javascripts() %>
    <%- view_scripts() %>
</body>
</html>
"#;

pub const SITE_INDEX_VIEW: &str = r#"<h1>It works!</h1>
<p>You asked for <code><%= path %></code>.</p>
<% if params.empty %>
<p>No parameters.</p>
<% else %>
<ul>
<% for param, i in params %>
    <li><%= i %>: <%= param %></li>
<% end %>
</ul>
<% end %>
<script>console.log("site/index rendered");</script>
"#;

pub const ERROR_INDEX_VIEW: &str = r#"<h1>Not Found</h1>
<p>Nothing lives at <code><%= path %></code>.</p>
<p><a href="/">Back home</a></p>
"#;

pub const APP_CSS: &str = r#"body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    margin: 0 auto;
    max-width: 720px;
    padding: 40px 20px;
    color: #212529;
}
"#;

pub const APP_JS: &str = "// Application scripts\n";

pub const ENV_FILE: &str = "APP_DEBUG=true\n";

pub const GITIGNORE: &str = "/log\n.env.*\n";

pub fn readme(name: &str) -> String {
    format!(
        r#"# {name}

A Wallaby application.

    wallaby serve .
    wallaby dispatch . site/ping
    wallaby routes .

Routes live in `config/router.yml`, views in `app/views`, static files in
`public`.
"#
    )
}

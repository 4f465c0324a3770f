//! Layout support for templates.
//!
//! Wraps rendered view content with a layout that uses `<%= yield %>` and
//! exposes the layout helpers `stylesheets()`, `javascripts()` and
//! `view_scripts()`.

use serde::Deserialize;
use serde_json::Value;

use crate::template::parser::TemplateNode;
use crate::template::renderer::{render_into, PartialRenderer, RenderScope};

/// Static css/js asset lists shared by every layout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LayoutAssets {
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
}

impl LayoutAssets {
    pub fn stylesheet_tags(&self) -> String {
        self.css
            .iter()
            .map(|file| {
                format!(
                    "<link rel=\"stylesheet\" type=\"text/css\" href=\"/content/css/{}\">",
                    file
                )
            })
            .collect()
    }

    pub fn javascript_tags(&self) -> String {
        self.js
            .iter()
            .map(|file| format!("<script src=\"/content/js/{}\"></script>", file))
            .collect()
    }
}

/// Render layout nodes around `content`, appending to `output`.
///
/// `scripts` are the blocks pulled out of the view body; `view_scripts()`
/// emits them in their original order.
pub fn render_layout_into(
    nodes: &[TemplateNode],
    content: &str,
    data: &Value,
    assets: &LayoutAssets,
    scripts: &[String],
    partials: Option<PartialRenderer<'_>>,
    layout_path: Option<&str>,
    output: &mut String,
) -> Result<(), String> {
    let helpers = |name: &str, _args: &[Value]| -> Option<Result<Value, String>> {
        let html = match name {
            "stylesheets" => assets.stylesheet_tags(),
            "javascripts" => assets.javascript_tags(),
            "view_scripts" => scripts.concat(),
            _ => return None,
        };
        Some(Ok(Value::String(html)))
    };

    let scope = RenderScope {
        partials,
        helpers: Some(&helpers),
        yield_content: Some(content),
        template_path: layout_path,
    };

    output.reserve(content.len() + 2048);
    render_into(nodes, data, scope, output)
}

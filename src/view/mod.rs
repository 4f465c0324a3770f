//! Theme-aware view rendering.
//!
//! A view id such as `site/index` resolves to
//! `<themes_dir>/<theme>/views/site/index.html.erb` when a theme is set and to
//! `<views_dir>/site/index.html.erb` otherwise (`.erb` is accepted too).
//! Missing views and layouts render an inline placeholder instead of failing.

mod scripts;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::TemplateError;
use crate::template::layout::render_layout_into;
use crate::template::renderer::{render_into, RenderScope};
use crate::template::{LayoutAssets, TemplateCache};

pub use scripts::extract_scripts;

/// Nesting limit for `<%= render %>` inside templates.
const MAX_PARTIAL_DEPTH: usize = 32;

const EXTENSIONS: [&str; 2] = ["html.erb", "erb"];

/// Shared, read-mostly state behind every [`View`].
pub struct ViewEnvironment {
    views_dir: PathBuf,
    themes_dir: PathBuf,
    assets: LayoutAssets,
    cache: TemplateCache,
}

impl ViewEnvironment {
    pub fn new(
        views_dir: impl Into<PathBuf>,
        themes_dir: impl Into<PathBuf>,
        assets: LayoutAssets,
        check_modified: bool,
    ) -> Self {
        Self {
            views_dir: views_dir.into(),
            themes_dir: themes_dir.into(),
            assets,
            cache: TemplateCache::new(check_modified),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.app.views_dir,
            &config.app.themes_dir,
            config.content.clone(),
            config.app.debug,
        )
    }

    /// Where view `id` lives for `theme`. The returned path may not exist.
    pub fn resolve(&self, id: &str, theme: Option<&str>) -> PathBuf {
        let root = match theme {
            Some(theme) if !theme.is_empty() => self.themes_dir.join(theme).join("views"),
            _ => self.views_dir.clone(),
        };
        let id = id.trim_start_matches('/');
        let candidates: Vec<PathBuf> = EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{}.{}", id, ext)))
            .collect();
        candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }
}

/// Per-render view state: theme, layout, title and page url.
pub struct View {
    env: Arc<ViewEnvironment>,
    pub theme: Option<String>,
    pub layout: String,
    pub title: Option<String>,
    pub page_url: Option<String>,
}

impl View {
    pub fn new(env: Arc<ViewEnvironment>, layout: impl Into<String>) -> Self {
        Self {
            env,
            theme: None,
            layout: layout.into(),
            title: None,
            page_url: None,
        }
    }

    /// Render view `id` inside the layout, appending the document to `out`.
    pub fn render(&self, id: &str, data: &Value, out: &mut String) -> Result<(), TemplateError> {
        let context = context_of(data);
        let content = self.render_view(id, &context)?;

        let layout_path = self.env.resolve(&self.layout, self.theme.as_deref());
        if !layout_path.is_file() {
            warn!(layout = %layout_path.display(), "layout not found");
            out.push_str(&format!("<p>Layout <b>{}</b> not found!</p>", layout_path.display()));
            return Ok(());
        }

        let (content, scripts) = extract_scripts(&content);
        let nodes = self.env.cache.load(&layout_path)?;
        let layout_data = self.layout_context(&context, data);
        let path_str = layout_path.to_string_lossy().into_owned();
        let partials = |name: &str, ctx: &Value| {
            self.render_fragment(name, &context_of(ctx), 1)
                .map_err(|e| e.to_string())
        };

        render_layout_into(
            &nodes,
            &content,
            &layout_data,
            &self.env.assets,
            &scripts,
            Some(&partials),
            Some(path_str.as_str()),
            out,
        )
        .map_err(TemplateError::Render)
    }

    /// Render view `id` without a layout, appending to `out`.
    pub fn render_partial(
        &self,
        id: &str,
        data: &Value,
        out: &mut String,
    ) -> Result<(), TemplateError> {
        out.push_str(&self.render_partial_to_string(id, data)?);
        Ok(())
    }

    /// Render view `id` without a layout into its own buffer.
    pub fn render_partial_to_string(
        &self,
        id: &str,
        data: &Value,
    ) -> Result<String, TemplateError> {
        self.render_view(id, &context_of(data))
    }

    fn render_view(&self, id: &str, context: &Value) -> Result<String, TemplateError> {
        self.render_fragment(id, context, 0)
    }

    /// Render one template with nested partials resolved the same theme-aware way.
    fn render_fragment(
        &self,
        id: &str,
        context: &Value,
        depth: usize,
    ) -> Result<String, TemplateError> {
        if depth > MAX_PARTIAL_DEPTH {
            return Err(TemplateError::Render(format!(
                "Partial nesting deeper than {} while rendering '{}'",
                MAX_PARTIAL_DEPTH, id
            )));
        }

        let path = self.env.resolve(id, self.theme.as_deref());
        if !path.is_file() {
            warn!(view = %path.display(), "view not found");
            return Ok(format!("<p>View <b>{}</b> Not Found!</p>", path.display()));
        }
        debug!(view = %path.display(), depth, "rendering view");

        let nodes = self.env.cache.load(&path)?;
        let path_str = path.to_string_lossy().into_owned();
        let partials = |name: &str, ctx: &Value| {
            self.render_fragment(name, &context_of(ctx), depth + 1)
                .map_err(|e| e.to_string())
        };
        let scope = RenderScope {
            partials: Some(&partials),
            ..RenderScope::default()
        }
        .with_path(path_str.as_str());

        let mut output = String::new();
        render_into(&nodes, context, scope, &mut output).map_err(TemplateError::Render)?;
        Ok(output)
    }

    /// The view data plus `title`, `theme`, `page_url` and the original `data`.
    ///
    /// Those names shadow view keys of the same name in the layout: a view
    /// key `data` stays reachable there as `data.data`.
    fn layout_context(&self, context: &Value, data: &Value) -> Value {
        let mut map = match context {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        for (key, value) in [
            ("title", &self.title),
            ("theme", &self.theme),
            ("page_url", &self.page_url),
        ] {
            if let Some(value) = value {
                map.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        map.insert("data".to_string(), data.clone());
        Value::Object(map)
    }
}

/// Views always see an object: null becomes empty, scalars and arrays are
/// exposed as `data`.
fn context_of(data: &Value) -> Value {
    match data {
        Value::Object(_) => data.clone(),
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other.clone());
            Value::Object(map)
        }
    }
}

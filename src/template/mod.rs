//! ERB-style template engine for Wallaby views.
//!
//! Supports:
//! - `<%= expr %>` - HTML-escaped output
//! - `<%- expr %>` - Raw/unescaped output (no HTML escaping)
//! - `<% if/elsif/else/for/end %>` - Control flow
//! - `<%= yield %>` - Layout content insertion point
//! - `<%= render 'partial' %>` - Partial rendering

pub mod helpers;
pub mod layout;
pub mod parser;
pub mod renderer;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use crate::error::TemplateError;
use parser::{parse_template, TemplateNode};

pub use layout::LayoutAssets;
pub use renderer::{html_escape, RenderScope};

/// A cached template with its parsed AST and modification time.
#[derive(Debug, Clone)]
struct CachedTemplate {
    nodes: Arc<Vec<TemplateNode>>,
    modified: SystemTime,
}

/// Maximum size for template cache to prevent unbounded memory growth.
const TEMPLATE_CACHE_MAX_SIZE: usize = 500;

/// Shared cache of parsed templates keyed by file path.
///
/// With `check_modified` set (debug mode) a cached entry is re-parsed when
/// the file's modification time changes.
pub struct TemplateCache {
    cache: RwLock<HashMap<PathBuf, CachedTemplate>>,
    check_modified: bool,
}

impl TemplateCache {
    pub fn new(check_modified: bool) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            check_modified,
        }
    }

    /// Get the parsed template at `path`, loading it on a miss.
    pub fn load(&self, path: &Path) -> Result<Arc<Vec<TemplateNode>>, TemplateError> {
        let current_mtime = if self.check_modified { modified_time(path) } else { None };

        if let Ok(cache) = self.cache.read() {
            if let Some(cached) = cache.get(path) {
                match current_mtime {
                    Some(m) if m != cached.modified => {}
                    _ => return Ok(cached.nodes.clone()),
                }
            }
        }

        let source = fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let nodes = Arc::new(parse_template(&source).map_err(|e| TemplateError::syntax(path, e))?);
        let modified = current_mtime
            .or_else(|| modified_time(path))
            .unwrap_or(SystemTime::UNIX_EPOCH);

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= TEMPLATE_CACHE_MAX_SIZE {
                cache.clear();
            }
            cache.insert(
                path.to_path_buf(),
                CachedTemplate {
                    nodes: nodes.clone(),
                    modified,
                },
            );
        }

        Ok(nodes)
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_caches_parsed_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.html.erb");
        fs::write(&path, "Hello <%= name %>").unwrap();

        let cache = TemplateCache::new(false);
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_template_is_read_error() {
        let cache = TemplateCache::new(false);
        let err = cache.load(Path::new("/nonexistent/x.html.erb")).unwrap_err();
        assert!(matches!(err, TemplateError::Read { .. }));
    }

    #[test]
    fn test_syntax_error_names_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.html.erb");
        fs::write(&path, "<% if x %>never closed").unwrap();

        let err = TemplateCache::new(false).load(&path).unwrap_err();
        assert!(err.to_string().contains("bad.html.erb"));
    }

    #[test]
    fn test_modified_template_is_reloaded_in_check_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.html.erb");
        fs::write(&path, "one").unwrap();

        let cache = TemplateCache::new(true);
        let first = cache.load(&path).unwrap();

        fs::write(&path, "two").unwrap();
        let file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(120)).unwrap();
        drop(file);

        let second = cache.load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.as_slice(), &[TemplateNode::Literal("two".to_string())]);
    }
}

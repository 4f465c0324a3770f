//! Application configuration.
//!
//! An application folder carries three YAML files under `config/`:
//! - `router.yml` (required): the route table and routing defaults
//! - `app.yml` (optional): runtime settings such as debug mode and paths
//! - `content.yml` (optional): css/js assets pulled in by layouts
//!
//! `.env` and `.env.{APP_ENV}` are loaded first so `APP_*` overrides can
//! live next to the application.

pub mod env_loader;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::template::LayoutAssets;

pub const CONFIG_DIR: &str = "config";
pub const APP_FILE: &str = "app.yml";
pub const ROUTER_FILE: &str = "router.yml";
pub const CONTENT_FILE: &str = "content.yml";

/// When fault pages are rendered as JSON instead of HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonErrors {
    Never,
    /// JSON when the request's `Accept` or `Content-Type` asks for it.
    #[default]
    Negotiate,
    Always,
}

impl FromStr for JsonErrors {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "negotiate" => Ok(Self::Negotiate),
            "always" => Ok(Self::Always),
            _ => Err(ConfigError::invalid_value("json_errors", s)),
        }
    }
}

/// Settings from `config/app.yml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub debug: bool,
    pub json_errors: JsonErrors,
    pub views_dir: PathBuf,
    pub themes_dir: PathBuf,
    pub public_dir: PathBuf,
    pub log_file: PathBuf,
    /// View id of the default layout.
    pub layout: String,
    pub theme: Option<String>,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            debug: false,
            json_errors: JsonErrors::Negotiate,
            views_dir: PathBuf::from("app/views"),
            themes_dir: PathBuf::from("public/themes"),
            public_dir: PathBuf::from("public"),
            log_file: PathBuf::from("log/error.log"),
            layout: "layouts/main".to_string(),
            theme: None,
            port: 3000,
        }
    }
}

impl AppConfig {
    /// Apply `APP_DEBUG`, `APP_PORT` and `APP_LOG_FILE` from `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("APP_DEBUG") {
            self.debug =
                parse_bool(&value).ok_or_else(|| ConfigError::invalid_value("APP_DEBUG", &value))?;
        }
        if let Some(value) = lookup("APP_PORT") {
            self.port = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid_value("APP_PORT", &value))?;
        }
        if let Some(value) = lookup("APP_LOG_FILE") {
            self.log_file = PathBuf::from(value);
        }
        Ok(())
    }

    /// Make every relative path absolute against the application root.
    fn resolve_paths(&mut self, root: &Path) {
        for path in [
            &mut self.views_dir,
            &mut self.themes_dir,
            &mut self.public_dir,
            &mut self.log_file,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// What a route pattern maps to. Missing fields are filled from named
/// captures or the router defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RouteTarget {
    #[serde(default)]
    pub controller: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Settings from `config/router.yml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RouterConfig {
    /// Pattern -> target, in declaration order.
    #[serde(default)]
    pub routes: IndexMap<String, RouteTarget>,
    #[serde(default = "default_base_controller")]
    pub base_controller: String,
    #[serde(default = "default_base_action")]
    pub base_action: String,
    /// URL dispatched when a request cannot be resolved.
    #[serde(default = "default_error_handler")]
    pub error_handler: String,
}

fn default_base_controller() -> String {
    "site".to_string()
}

fn default_base_action() -> String {
    "index".to_string()
}

fn default_error_handler() -> String {
    "error".to_string()
}

impl RouterConfig {
    pub fn new(routes: impl IntoIterator<Item = (String, RouteTarget)>) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            base_controller: default_base_controller(),
            base_action: default_base_action(),
            error_handler: default_error_handler(),
        }
    }
}

/// Fully loaded configuration of one application folder.
#[derive(Debug, Clone)]
pub struct Config {
    pub root: PathBuf,
    pub app: AppConfig,
    pub router: RouterConfig,
    pub content: LayoutAssets,
}

impl Config {
    /// Load `.env` files and the YAML configuration under `root`.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        env_loader::load_env_files(root);
        Self::load_with_env(root, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] but with an explicit environment lookup and no
    /// `.env` loading.
    pub fn load_with_env(
        root: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let config_dir = root.join(CONFIG_DIR);

        let router_path = config_dir.join(ROUTER_FILE);
        if !router_path.is_file() {
            return Err(ConfigError::Missing(router_path));
        }
        let router: RouterConfig = read_yaml(&router_path)?;
        if router.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        let mut app: AppConfig = read_optional_yaml(&config_dir.join(APP_FILE))?;
        app.apply_env_overrides(lookup)?;
        app.resolve_paths(root);

        let content: LayoutAssets = read_optional_yaml(&config_dir.join(CONTENT_FILE))?;

        info!(
            root = %root.display(),
            routes = router.routes.len(),
            debug = app.debug,
            "configuration loaded"
        );

        Ok(Self {
            root: root.to_path_buf(),
            app,
            router,
            content,
        })
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional_yaml<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if !path.is_file() {
        debug!(path = %path.display(), "optional config file absent, using defaults");
        return Ok(T::default());
    }
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if source.trim().is_empty() {
        return Ok(T::default());
    }
    serde_yaml::from_str(&source).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

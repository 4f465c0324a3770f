//! Wallaby: a small MVC web skeleton.
//!
//! This is the library root that exports all modules.
//!
//! # Request flow
//!
//! - **Router**: the first matching regex route picks a controller action
//! - **Controller**: the action writes into a response, usually through a view
//! - **View**: ERB templates resolved per theme and wrapped in a layout
//! - **Fault**: errors and panics inside an action become an error page

// Allow some clippy lints that are stylistic and not critical
#![allow(clippy::module_inception)]
#![allow(clippy::result_large_err)]
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::manual_strip)]

pub mod app;
pub mod config;
pub mod controller;
pub mod error;
pub mod fault;
pub mod model;
pub mod router;
pub mod scaffold;
pub mod serve;
pub mod template;
pub mod view;

use std::path::Path;

use config::Config;
use controller::ControllerRegistry;
use error::WallabyError;
use router::{AppContext, Router};

/// Load the configuration under `root` and build a router over `registry`.
pub fn load(root: &Path, registry: ControllerRegistry) -> Result<(Config, Router), WallabyError> {
    let config = Config::load(root)?;
    let router = Router::new(config.router.clone(), registry, AppContext::from_config(&config))?;
    Ok((config, router))
}

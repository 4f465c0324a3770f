//! Scaffold module for generating new Wallaby applications.
//!
//! `wallaby new app_name` writes a config directory, a layout, the views of
//! the built-in `site` and `error` controllers and a couple of assets.

pub mod app_generator;
pub mod templates;
pub mod ui;

use std::path::Path;

use tracing::info;

use crate::scaffold::app_generator::{
    create_assets, create_config_files, create_directories, create_project_files, create_views,
    print_success_message,
};
use crate::scaffold::ui::ProgressDisplay;

/// Create a new application in the directory `name`
pub fn create_app(name: &str) -> Result<(), String> {
    ProgressDisplay::header(name);
    let mut progress = ProgressDisplay::new(4);
    create_app_at(Path::new(name), name, &mut progress)?;
    print_success_message(name);
    Ok(())
}

/// Generate the application skeleton into `app_path`, which must not exist yet
pub fn create_app_at(
    app_path: &Path,
    name: &str,
    progress: &mut ProgressDisplay,
) -> Result<(), String> {
    if name.is_empty() || name.contains(['/', '\\']) {
        return Err(format!("Invalid application name '{}'", name));
    }
    if app_path.exists() {
        return Err(format!("Directory '{}' already exists", app_path.display()));
    }

    let steps: [(&str, &dyn Fn() -> Result<(), String>); 4] = [
        ("Creating directory structure...", &|| create_directories(app_path)),
        ("Generating configuration files...", &|| create_config_files(app_path)),
        ("Creating views...", &|| create_views(app_path)),
        ("Setting up assets...", &|| {
            create_assets(app_path)?;
            create_project_files(app_path, name)
        }),
    ];

    for (description, step) in steps {
        progress.step(description);
        if let Err(e) = step() {
            ProgressDisplay::fail(&e);
            return Err(e);
        }
        ProgressDisplay::done();
    }

    info!(path = %app_path.display(), "application created");
    Ok(())
}

//! Application scaffolding generator

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::config::{APP_FILE, CONFIG_DIR, CONTENT_FILE, ROUTER_FILE};
use crate::scaffold::templates;

/// Create directories for a new application
pub fn create_directories(app_path: &Path) -> Result<(), String> {
    let dirs = [
        "",
        "app",
        "app/views",
        "app/views/layouts",
        "app/views/site",
        "app/views/error",
        CONFIG_DIR,
        "log",
        "public",
        "public/content/css",
        "public/content/js",
        "public/themes",
    ];

    for dir in dirs {
        let path = app_path.join(dir);
        fs::create_dir_all(&path)
            .map_err(|e| format!("Failed to create directory '{}': {}", path.display(), e))?;
    }

    Ok(())
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), String> {
    let mut file =
        File::create(path).map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write to '{}': {}", path.display(), e))?;
    Ok(())
}

/// Create `config/app.yml`, `config/router.yml` and `config/content.yml`
pub fn create_config_files(app_path: &Path) -> Result<(), String> {
    let config_dir = app_path.join(CONFIG_DIR);
    write_file(&config_dir.join(APP_FILE), templates::APP_YML)?;
    write_file(&config_dir.join(ROUTER_FILE), templates::ROUTER_YML)?;
    write_file(&config_dir.join(CONTENT_FILE), templates::CONTENT_YML)
}

/// Create the layout and the views of the built-in controllers
pub fn create_views(app_path: &Path) -> Result<(), String> {
    let views = app_path.join("app/views");
    write_file(&views.join("layouts/main.html.erb"), templates::LAYOUT_VIEW)?;
    write_file(&views.join("site/index.html.erb"), templates::SITE_INDEX_VIEW)?;
    write_file(&views.join("error/index.html.erb"), templates::ERROR_INDEX_VIEW)
}

/// Create the css and js files listed in `content.yml`
pub fn create_assets(app_path: &Path) -> Result<(), String> {
    let content = app_path.join("public/content");
    write_file(&content.join("css/app.css"), templates::APP_CSS)?;
    write_file(&content.join("js/app.js"), templates::APP_JS)
}

/// Create `.env`, `.gitignore` and `README.md`
pub fn create_project_files(app_path: &Path, name: &str) -> Result<(), String> {
    write_file(&app_path.join(".env"), templates::ENV_FILE)?;
    write_file(&app_path.join(".gitignore"), templates::GITIGNORE)?;
    write_file(&app_path.join("README.md"), &templates::readme(name))
}

/// Print success message after creating an app
pub fn print_success_message(name: &str) {
    println!();
    println!("  \x1b[32m\x1b[1mSuccess!\x1b[0m Created \x1b[1m{}\x1b[0m", name);
    println!();
    println!("  Get started:");
    println!("    \x1b[36mcd {}\x1b[0m", name);
    println!("    \x1b[36mwallaby serve .\x1b[0m");
    println!();
    println!("  Then open \x1b[4mhttp://localhost:3000\x1b[0m");
    println!();
}

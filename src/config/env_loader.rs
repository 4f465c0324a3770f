//! Environment file loading utilities

use std::path::Path;

use tracing::debug;

/// Load environment variables from .env files in the application directory.
/// This loads .env first, then .env.{APP_ENV} if APP_ENV is set.
pub fn load_env_files(folder: &Path) {
    load_env_file(folder, ".env", false);

    if let Ok(app_env) = std::env::var("APP_ENV") {
        load_env_file(folder, &format!(".env.{}", app_env), true);
    }
}

/// Load a single .env file
///
/// # Arguments
/// * `folder` - The directory containing the .env file
/// * `filename` - The name of the .env file
/// * `override_existing` - Whether to override existing environment variables
pub fn load_env_file(folder: &Path, filename: &str, override_existing: bool) {
    let Ok(content) = std::fs::read_to_string(folder.join(filename)) else {
        return;
    };

    let mut loaded = 0;
    for (key, value) in parse_env(&content) {
        if override_existing || std::env::var(key).is_err() {
            // Only called from main before the runtime starts
            std::env::set_var(key, value);
            loaded += 1;
        }
    }
    debug!(file = filename, loaded, "loaded env file");
}

/// Parse `KEY=value` lines, skipping blanks and `#` comments.
fn parse_env(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim().trim_matches('"').trim_matches('\'')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_lines() {
        let parsed = parse_env("# comment\n\nAPP_DEBUG=true\n  APP_PORT = \"8080\"\nnot a pair\nNAME='x'\n");
        assert_eq!(parsed, vec![("APP_DEBUG", "true"), ("APP_PORT", "8080"), ("NAME", "x")]);
    }

    #[test]
    fn test_load_env_file_does_not_override_by_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "WALLABY_ENV_TEST_KEEP=file\nWALLABY_ENV_TEST_NEW=file\n").unwrap();
        std::env::set_var("WALLABY_ENV_TEST_KEEP", "process");

        load_env_file(dir.path(), ".env", false);

        assert_eq!(std::env::var("WALLABY_ENV_TEST_KEEP").unwrap(), "process");
        assert_eq!(std::env::var("WALLABY_ENV_TEST_NEW").unwrap(), "file");
    }
}

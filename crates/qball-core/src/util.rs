//! Utility functions for QBall
//!
//! Environment-file loading shared by the binaries.

use std::path::{Path, PathBuf};

/// Candidate locations of the `qball.env` file, in lookup order:
/// 1. /usr/local/etc/qball/qball.env
/// 2. User's config directory/qball/qball.env
/// 3. ~/.config/qball/qball.env
pub fn env_file_candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/usr/local/etc/qball/qball.env")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("qball").join("qball.env"));
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("qball").join("qball.env"));
    }
    paths
}

/// Load environment variables from the first existing QBall env file.
/// Variables that are already set are left untouched.
///
/// Runs before logging is set up, so the file used and the number of
/// variables applied (or the read error) are returned to the caller.
pub fn load_env_file() -> Option<(PathBuf, std::io::Result<usize>)> {
    let path = env_file_candidates()
        .into_iter()
        .find(|path| Path::new(path).exists())?;
    let applied = std::fs::read_to_string(&path).map(|contents| parse_env_file(&contents));
    Some((path, applied))
}

/// Parse env file contents and set environment variables (only if not already set).
/// Supports formats:
/// - `KEY=value`
/// - `export KEY=value`
/// - `KEY="quoted value"`
/// - `KEY='single quoted'`
/// - Comments starting with #
///
/// Returns the number of variables that were set.
pub fn parse_env_file(contents: &str) -> usize {
    let mut applied = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !key.is_empty() && std::env::var(key).is_err() {
                std::env::set_var(key, value);
                applied += 1;
            }
        }
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_file() {
        std::env::remove_var("TEST_QBALL_VAR1");
        std::env::remove_var("TEST_QBALL_VAR2");
        std::env::remove_var("TEST_QBALL_VAR3");

        let contents = r#"
            # This is a comment
            TEST_QBALL_VAR1=value1
            export TEST_QBALL_VAR2="quoted value"
            TEST_QBALL_VAR3='single quoted'
        "#;

        assert_eq!(parse_env_file(contents), 3);

        assert_eq!(std::env::var("TEST_QBALL_VAR1").unwrap(), "value1");
        assert_eq!(std::env::var("TEST_QBALL_VAR2").unwrap(), "quoted value");
        assert_eq!(std::env::var("TEST_QBALL_VAR3").unwrap(), "single quoted");
    }

    #[test]
    fn test_parse_env_file_keeps_existing() {
        std::env::set_var("TEST_QBALL_KEEP", "original");
        assert_eq!(parse_env_file("TEST_QBALL_KEEP=replaced"), 0);
        assert_eq!(std::env::var("TEST_QBALL_KEEP").unwrap(), "original");
    }

    #[test]
    fn test_env_file_candidates_start_with_system_path() {
        let candidates = env_file_candidates();
        assert_eq!(
            candidates[0],
            PathBuf::from("/usr/local/etc/qball/qball.env")
        );
    }
}

pub mod generate;
pub mod parse;
pub mod types;

use regex::{Captures, Regex};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{BackfillConfig, Config, ServerConfig, ViewerConfig};

const APP_DIR: &str = "logview";
const CONFIG_FILE: &str = "config.yml";

/// Matches a `$env{NAME}` reference; group 1 is the variable name
pub(crate) fn env_reference() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Substitute `$env{NAME}` references. Unset variables are left in place so
/// validation can report them.
pub fn expand_env_vars(text: &str) -> String {
    let Some(pattern) = env_reference() else {
        return text.to_string();
    };

    pattern
        .replace_all(text, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// Locations searched when no config path is given, user config first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join(APP_DIR).join(CONFIG_FILE));
    }
    paths.push(Path::new("/etc").join(APP_DIR).join(CONFIG_FILE));
    paths
}

/// The explicit path (tilde-expanded) or the first default location that exists
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(expand_tilde(path)),
        None => default_config_paths().into_iter().find(|path| path.exists()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars_single() {
        std::env::set_var("LOGVIEW_TEST_HOST", "logs.internal");
        let result = expand_env_vars("http://$env{LOGVIEW_TEST_HOST}:8080");
        assert_eq!(result, "http://logs.internal:8080");
        std::env::remove_var("LOGVIEW_TEST_HOST");
    }

    #[test]
    fn test_expand_env_vars_unset() {
        let result = expand_env_vars("path/$env{LOGVIEW_NONEXISTENT_VAR}/file");
        assert_eq!(result, "path/$env{LOGVIEW_NONEXISTENT_VAR}/file");
    }

    #[test]
    fn test_expand_env_vars_no_expansion() {
        let result = expand_env_vars("plain text ${not_env}");
        assert_eq!(result, "plain text ${not_env}");
    }

    #[test]
    fn test_expand_tilde_with_path() {
        let expanded = expand_tilde(Path::new("~/test/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("test/path"));
        }
    }

    #[test]
    fn test_expand_tilde_no_expansion() {
        let expanded = expand_tilde(Path::new("/absolute/path"));
        assert_eq!(expanded, Path::new("/absolute/path"));
    }

    #[test]
    fn test_expand_tilde_only_at_start() {
        let expanded = expand_tilde(Path::new("~other/file"));
        assert_eq!(expanded, Path::new("~other/file"));
    }

    #[test]
    fn test_default_paths_end_with_system_config() {
        let paths = default_config_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("/etc/logview/config.yml")));
    }

    #[test]
    fn test_resolve_explicit_path_wins() {
        let resolved = resolve_config_path(Some(Path::new("/tmp/custom.yml")));
        assert_eq!(resolved, Some(PathBuf::from("/tmp/custom.yml")));
    }
}

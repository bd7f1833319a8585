use std::path::Path;

use crate::error::Error;

/// Broken references listed before `check`/`fix` stop printing detail.
const DEFAULT_REPORT_LIMIT: usize = 100;

/// Undefined key references listed before the key report stops printing detail.
const DEFAULT_KEY_REPORT_LIMIT: usize = 50;

/// Project configuration loaded from `.ditaref.toml`.
/// Include/exclude patterns are path prefixes applied to whole-directory enumeration.
#[derive(Debug, Clone)]
pub struct Config {
    exclude: Vec<String>,
    include: Vec<String>,
    /// Maximum undefined key references printed in detail.
    pub key_report_limit: usize,
    /// Maximum broken references printed in detail.
    pub report_limit: usize,
}

/// Raw TOML structure for `.ditaref.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct DitarefTomlConfig {
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    key_report_limit: Option<usize>,
    report_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            exclude: Vec::new(),
            include: Vec::new(),
            key_report_limit: DEFAULT_KEY_REPORT_LIMIT,
            report_limit: DEFAULT_REPORT_LIMIT,
        };
    }
}

impl Config {
    /// Load config from `.ditaref.toml` in the given directory.
    /// Returns a default that enumerates everything if the file doesn't exist.
    /// Returns an error if the file exists but is malformed; never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".ditaref.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&content);
    }

    /// Parse `.ditaref.toml` content.
    ///
    /// # Errors
    ///
    /// Returns `Error::TomlDe` if the TOML is malformed or has unknown keys.
    pub fn parse(content: &str) -> Result<Self, Error> {
        let raw: DitarefTomlConfig = toml::from_str(content)?;
        return Ok(Self {
            exclude: raw.exclude,
            include: raw.include,
            key_report_limit: raw.key_report_limit.unwrap_or(DEFAULT_KEY_REPORT_LIMIT),
            report_limit: raw.report_limit.unwrap_or(DEFAULT_REPORT_LIMIT),
        });
    }

    /// Check whether a file found during enumeration should be kept.
    ///
    /// A path is included if no include patterns are set (keep everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.report_limit, DEFAULT_REPORT_LIMIT);
        assert!(config.should_scan("anything/at/all.dita"));
    }

    #[test]
    fn include_then_exclude() {
        let config = Config::parse("include = [\"topics/\"]\nexclude = [\"topics/old/\"]\nreport_limit = 5\n").unwrap();
        assert!(config.should_scan("topics/a.dita"));
        assert!(!config.should_scan("topics/old/a.dita"));
        assert!(!config.should_scan("images/a.png"));
        assert_eq!(config.report_limit, 5);
        assert_eq!(config.key_report_limit, DEFAULT_KEY_REPORT_LIMIT);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".ditaref.toml"), "include = 3").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
        assert!(Config::parse("colour = \"blue\"").is_err());
    }
}

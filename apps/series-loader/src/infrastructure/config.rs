//! Loader Configuration
//!
//! # Environment Variables
//!
//! - `OUTPUT_DIR`: Storage root holding `ohlc/` and `volatility/` (default: ./data/outputs)
//! - `SERIES_DEFAULT_LIMIT`: Row limit for raw queries without one (default: 1000)
//! - `SERIES_FILE_EXTENSION`: Data file extension (default: parquet)
//! - `SERIES_PARALLEL_LOADS`: Load files of one query in parallel (default: true)
//!
//! Absent or unparsable values fall back to the default.

use std::path::PathBuf;
use std::str::FromStr;

/// Default storage root.
pub const DEFAULT_OUTPUT_DIR: &str = "./data/outputs";

/// Default row limit for raw queries.
pub const DEFAULT_LIMIT: usize = 1000;

/// Default data file extension.
pub const DEFAULT_FILE_EXTENSION: &str = "parquet";

/// Retrieval engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Storage root.
    pub output_dir: PathBuf,
    /// Limit applied to raw queries that give none.
    pub default_limit: usize,
    /// Extension of data files, without the dot.
    pub file_extension: String,
    /// Load candidate files on the rayon pool.
    pub parallel_loads: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            default_limit: DEFAULT_LIMIT,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            parallel_loads: true,
        }
    }
}

impl LoaderConfig {
    /// Settings rooted at `output_dir`, other values defaulted.
    #[must_use]
    pub fn with_output_dir(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            output_dir: lookup("OUTPUT_DIR")
                .filter(|v| !v.trim().is_empty())
                .map_or(defaults.output_dir, |v| PathBuf::from(v.trim())),
            default_limit: parse_var(&lookup, "SERIES_DEFAULT_LIMIT", defaults.default_limit),
            file_extension: lookup("SERIES_FILE_EXTENSION")
                .map(|v| v.trim().trim_start_matches('.').to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.file_extension),
            parallel_loads: parse_var(&lookup, "SERIES_PARALLEL_LOADS", defaults.parallel_loads),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(LoaderConfig::from_lookup(|_| None), LoaderConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("OUTPUT_DIR", "/srv/series"),
            ("SERIES_DEFAULT_LIMIT", "250"),
            ("SERIES_FILE_EXTENSION", ".PARQUET"),
            ("SERIES_PARALLEL_LOADS", "FALSE"),
        ]));
        assert_eq!(config.output_dir, PathBuf::from("/srv/series"));
        assert_eq!(config.default_limit, 250);
        assert_eq!(config.file_extension, "PARQUET");
        assert!(!config.parallel_loads);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = LoaderConfig::from_lookup(lookup(&[
            ("OUTPUT_DIR", "  "),
            ("SERIES_DEFAULT_LIMIT", "lots"),
            ("SERIES_PARALLEL_LOADS", "maybe"),
        ]));
        assert_eq!(config, LoaderConfig::default());
    }
}

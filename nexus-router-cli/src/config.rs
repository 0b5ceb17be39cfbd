//! Configuration management for the CLI.
//!
//! This module handles loading configuration from `nexus-router.toml` files
//! and merging with command-line arguments.

use crate::error::{CliResult, ConfigError};
use nexus_router::{DiscoveryOptions, FileFilter, OnInvalidExport};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default configuration filename.
pub const CONFIG_FILENAME: &str = "nexus-router.toml";

/// Main configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where and how to look for procedure collections.
    pub discovery: DiscoveryConfig,

    /// Static registration table output.
    pub codegen: CodegenConfig,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Directory to scan.
    pub root: PathBuf,

    /// Walk sub-directories.
    pub recursive: bool,

    /// `ignore`, `warn` or `error`.
    pub on_invalid_export: OnInvalidExport,

    /// Glob over root-relative paths restricting which files are loaded.
    pub filter: Option<String>,

    /// Maximum number of files loaded at once.
    pub concurrency: usize,
}

/// Code generation configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodegenConfig {
    /// Generated Rust file.
    pub output: PathBuf,

    /// Rust path of the scan root inside the host crate.
    pub module_root: String,

    /// Context type the generated collections are registered for.
    pub context_type: String,

    /// Path the host crate uses to reach nexus-router.
    pub crate_path: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./src"),
            recursive: true,
            on_invalid_export: OnInvalidExport::Warn,
            filter: None,
            concurrency: 8,
        }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("./src/procedures_gen.rs"),
            module_root: "crate".to_string(),
            context_type: "crate::AppContext".to_string(),
            crate_path: "nexus_router".to_string(),
        }
    }
}

impl DiscoveryConfig {
    /// Build scanner options from this section.
    pub fn options(&self) -> CliResult<DiscoveryOptions> {
        let mut options = DiscoveryOptions::new()
            .recursive(self.recursive)
            .on_invalid_export(self.on_invalid_export)
            .concurrency(self.concurrency);

        if let Some(pattern) = &self.filter {
            let filter = FileFilter::glob(pattern)
                .map_err(|e| ConfigError::invalid_value("discovery.filter", e.to_string()))?;
            options = options.file_filter(filter);
        }

        Ok(options)
    }
}

impl Config {
    /// Reject values that deserialize but cannot be used.
    pub fn validate(&self) -> CliResult<()> {
        if self.discovery.concurrency == 0 {
            return Err(
                ConfigError::invalid_value("discovery.concurrency", "must be at least 1").into(),
            );
        }
        for (key, value) in [
            ("codegen.module_root", &self.codegen.module_root),
            ("codegen.context_type", &self.codegen.context_type),
            ("codegen.crate_path", &self.codegen.crate_path),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid_value(key, "must not be empty").into());
            }
        }
        Ok(())
    }
}

/// Configuration manager for loading and merging configs.
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration from a file path.
    ///
    /// Without an explicit path the default file is tried and a missing file
    /// yields the default configuration. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> CliResult<Config> {
        let config_path = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::not_found(path.to_path_buf()).into());
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(CONFIG_FILENAME),
        };

        if !config_path.exists() {
            tracing::debug!("no {} found, using defaults", CONFIG_FILENAME);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config = Self::parse(&config_path, &content)?;
        tracing::debug!(path = %config_path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text read from `path`.
    pub fn parse(path: &Path, content: &str) -> CliResult<Config> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::invalid_toml(path.to_path_buf(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Merge CLI arguments into configuration.
    ///
    /// CLI arguments take precedence over config file values.
    pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
        if let Some(ref root) = args.root {
            config.discovery.root = root.clone();
        }

        if let Some(ref filter) = args.filter {
            config.discovery.filter = Some(filter.clone());
        }

        if let Some(policy) = args.on_invalid_export {
            config.discovery.on_invalid_export = policy;
        }

        if args.no_recursive {
            config.discovery.recursive = false;
        }

        if let Some(ref output) = args.output {
            config.codegen.output = output.clone();
        }

        if let Some(ref context_type) = args.context_type {
            config.codegen.context_type = context_type.clone();
        }

        config
    }

    /// Generate default configuration file content with comments.
    pub fn default_config_content() -> &'static str {
        r#"# nexus-router configuration file

[discovery]
# Directory scanned for #[procedures] modules
root = "./src"

# Walk sub-directories
recursive = true

# What to do with tagged items that are not valid collections (ignore, warn, error)
on_invalid_export = "warn"

# Only load files whose root-relative path matches this glob
# filter = "api/**/*.rs"

# Maximum number of files parsed at once
concurrency = 8

[codegen]
# Generated registration table
output = "./src/procedures_gen.rs"

# Rust path of the scan root inside your crate
module_root = "crate"

# Context type the procedures receive
context_type = "crate::AppContext"

# Path used to reach the nexus-router crate
crate_path = "nexus_router"
"#
    }
}

/// CLI arguments that can override configuration.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Scan root override.
    pub root: Option<PathBuf>,

    /// File filter override.
    pub filter: Option<String>,

    /// Invalid export policy override.
    pub on_invalid_export: Option<OnInvalidExport>,

    /// Only scan the top level of the root.
    pub no_recursive: bool,

    /// Generated file override.
    pub output: Option<PathBuf>,

    /// Context type override.
    pub context_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discovery.root, PathBuf::from("./src"));
        assert!(config.discovery.recursive);
        assert_eq!(config.discovery.on_invalid_export, OnInvalidExport::Warn);
        assert_eq!(config.discovery.filter, None);
        assert_eq!(config.discovery.concurrency, 8);
        assert_eq!(config.codegen.module_root, "crate");
        assert_eq!(config.codegen.crate_path, "nexus_router");
    }

    #[test]
    fn test_default_content_matches_defaults() {
        let parsed =
            ConfigManager::parse(Path::new(CONFIG_FILENAME), ConfigManager::default_config_content())
                .unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.discovery.root, defaults.discovery.root);
        assert_eq!(parsed.discovery.concurrency, defaults.discovery.concurrency);
        assert_eq!(parsed.codegen.output, defaults.codegen.output);
        assert_eq!(parsed.codegen.context_type, defaults.codegen.context_type);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = ConfigManager::parse(
            Path::new("x.toml"),
            r#"
            [discovery]
            root = "./procedures"
            on_invalid_export = "error"
            "#,
        )
        .unwrap();
        assert_eq!(config.discovery.root, PathBuf::from("./procedures"));
        assert_eq!(config.discovery.on_invalid_export, OnInvalidExport::Error);
        assert!(config.discovery.recursive);
        assert_eq!(config.codegen.module_root, "crate");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ConfigManager::parse(Path::new("x.toml"), "[discovery]\nconcurrency = 0")
            .unwrap_err();
        assert!(err.to_string().contains("discovery.concurrency"));

        let err = ConfigManager::parse(Path::new("x.toml"), "[discovery]\non_invalid_export = \"panic\"")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid TOML"));

        let err = ConfigManager::parse(Path::new("x.toml"), "[codegen]\nmodule_rot = \"crate\"")
            .unwrap_err();
        assert!(err.to_string().contains("module_rot"));
    }

    #[test]
    fn test_merge_cli_args_override_file_values() {
        let config = Config::default();
        let args = CliArgs {
            root: Some(PathBuf::from("./api")),
            filter: Some("v1/**".to_string()),
            on_invalid_export: Some(OnInvalidExport::Ignore),
            no_recursive: true,
            output: Some(PathBuf::from("./out.rs")),
            context_type: Some("Ctx".to_string()),
        };

        let merged = ConfigManager::merge_cli_args(config, &args);
        assert_eq!(merged.discovery.root, PathBuf::from("./api"));
        assert_eq!(merged.discovery.filter.as_deref(), Some("v1/**"));
        assert_eq!(merged.discovery.on_invalid_export, OnInvalidExport::Ignore);
        assert!(!merged.discovery.recursive);
        assert_eq!(merged.codegen.output, PathBuf::from("./out.rs"));
        assert_eq!(merged.codegen.context_type, "Ctx");
    }

    #[test]
    fn test_merge_empty_args_is_identity() {
        let merged = ConfigManager::merge_cli_args(Config::default(), &CliArgs::default());
        assert_eq!(merged.discovery.root, PathBuf::from("./src"));
        assert!(merged.discovery.recursive);
    }

    #[test]
    fn test_bad_filter_is_a_config_error() {
        let discovery = DiscoveryConfig {
            filter: Some("[".to_string()),
            ..Default::default()
        };
        assert!(discovery.options().unwrap_err().to_string().contains("discovery.filter"));
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let err = ConfigManager::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}

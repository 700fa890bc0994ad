//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/treebuilder/treebuilder.toml`
//! 3. Local config: file given with `--config`
//! 4. Environment variables: `TREEBUILDER_*` prefix

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, Map};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{BuildOptions, DuplicatePolicy};

/// How built trees are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Indented text tree
    #[default]
    Text,
    /// Pretty-printed JSON array
    Json,
}

/// Unified configuration for treebuilder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Output format (default: text)
    pub output: OutputFormat,
    /// Parent id treated as "no parent" (default: 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_parent: Option<i64>,
    /// Handling of repeated record ids
    pub duplicates: DuplicatePolicy,
    /// Maximum tree depth, unbounded if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Regexes on record names; matching records are dropped with their subtree
    pub exclude: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output: OutputFormat::default(),
            root_parent: Some(0),
            duplicates: DuplicatePolicy::default(),
            max_depth: None,
            exclude: vec![],
        }
    }
}

/// Raw settings for intermediate parsing (all optional to detect "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub output: Option<OutputFormat>,
    pub root_parent: Option<i64>,
    pub duplicates: Option<DuplicatePolicy>,
    pub max_depth: Option<usize>,
    pub exclude: Option<Vec<String>>,
}

/// Get the XDG config directory for treebuilder.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "treebuilder").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("treebuilder.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

/// Read an optional key; absent keys are `None`, malformed ones are errors.
fn optional_value<T: DeserializeOwned>(config: &Config, key: &str) -> ApplicationResult<Option<T>> {
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

impl Settings {
    /// Merge arrays with union semantics and negation support.
    ///
    /// - Items from overlay are added to base
    /// - Items prefixed with `!` remove the corresponding item from the result
    /// - Duplicates are de-duplicated
    ///
    /// # Examples
    /// ```ignore
    /// merge_array(&["a", "b"], &["c"])       // → ["a", "b", "c"]
    /// merge_array(&["a", "b"], &["!a", "c"]) // → ["b", "c"]
    /// ```
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: HashSet<String> = base.iter().cloned().collect();

        for pattern in overlay {
            if let Some(negated) = pattern.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(pattern.clone());
            }
        }

        // Convert to sorted Vec for deterministic output
        let mut vec: Vec<String> = result.into_iter().collect();
        vec.sort();
        vec
    }

    /// Merge overlay config onto self (base) with union semantics for arrays.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            output: overlay.output.unwrap_or(self.output),
            root_parent: overlay.root_parent.or(self.root_parent),
            duplicates: overlay.duplicates.unwrap_or(self.duplicates),
            max_depth: overlay.max_depth.or(self.max_depth),
            exclude: overlay
                .exclude
                .as_ref()
                .map(|o| Self::merge_array(&self.exclude, o))
                .unwrap_or_else(|| self.exclude.clone()),
        }
    }

    /// Apply global config onto defaults with REPLACE semantics for arrays.
    fn apply_global(&self, global: &RawSettings) -> Self {
        Self {
            exclude: global
                .exclude
                .clone()
                .unwrap_or_else(|| self.exclude.clone()),
            ..self.merge_with(&RawSettings {
                exclude: None,
                ..global.clone()
            })
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional config file given on the command line
    pub fn load(local: Option<&Path>) -> ApplicationResult<Self> {
        let global = global_config_path();
        let current = Self::load_from(global.as_deref(), local)?;
        current.with_env_overrides(None)
    }

    /// Load defaults, then the global and local files (no environment).
    ///
    /// A missing global file is skipped, a missing local file is an error.
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> ApplicationResult<Self> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config REPLACES defaults
        if let Some(global_path) = global {
            if global_path.exists() {
                debug!("loading global config: {}", global_path.display());
                let raw = load_raw_settings(global_path)?;
                current = current.apply_global(&raw);
            }
        }

        // 3. Local config UNIONS with global
        if let Some(local_path) = local {
            if !local_path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", local_path.display()),
                });
            }
            debug!("loading local config: {}", local_path.display());
            let raw = load_raw_settings(local_path)?;
            current = current.merge_with(&raw);
        }

        Ok(current)
    }

    /// Apply `TREEBUILDER_*` variables as explicit overrides.
    ///
    /// `vars` replaces the process environment when given. `exclude` is
    /// comma separated. Env vars replace values (not merge).
    pub fn with_env_overrides(mut self, vars: Option<Map<String, String>>) -> ApplicationResult<Self> {
        let env = Environment::with_prefix("TREEBUILDER")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("exclude")
            .try_parsing(true)
            .source(vars);
        let config = Config::builder().add_source(env).build().map_err(config_err)?;

        if let Some(val) = optional_value(&config, "output")? {
            self.output = val;
        }
        if let Some(val) = optional_value(&config, "root_parent")? {
            self.root_parent = Some(val);
        }
        if let Some(val) = optional_value(&config, "duplicates")? {
            self.duplicates = val;
        }
        if let Some(val) = optional_value(&config, "max_depth")? {
            self.max_depth = Some(val);
        }
        if let Some(val) = optional_value(&config, "exclude")? {
            self.exclude = val;
        }

        Ok(self)
    }

    /// Builder options derived from these settings.
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            duplicates: self.duplicates,
            max_depth: self.max_depth,
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> ApplicationResult<String> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: e.to_string(),
        })
    }
}

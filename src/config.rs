//! Configuration module
//!
//! Provides structured configuration for procsift.
//! Configuration can be loaded from:
//! 1. Default values (hardcoded)
//! 2. procsift.toml file (optional)
//! 3. Environment variables with PROCSIFT__ prefix
//!
//! Example environment variable override:
//! PROCSIFT__LOGGING__LEVEL=debug
//! PROCSIFT__REPUTATION__API_KEY=0123abcd...

use crate::models::WhitelistScope;
use crate::reputation::DEFAULT_ENDPOINT;
use crate::whitelist::{builtin_rules, WhitelistRule};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub reputation: ReputationConfig,
    pub whitelist: WhitelistConfig,
    pub output: OutputConfig,
    pub logging: LogConfig,
}

/// YARA scanning
#[derive(Debug, Deserialize)]
pub struct ScannerConfig {
    pub yara_enabled: bool,
    pub yara_rules_path: PathBuf,
}

/// Hash reputation lookups
#[derive(Debug, Deserialize)]
pub struct ReputationConfig {
    pub enabled: bool,
    pub api_key: String,
    /// Read when `api_key` is empty; first line holds the key
    pub api_key_file: PathBuf,
    pub endpoint: String,
    pub cooldown_secs: u64,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

/// Extra suppression rules appended to the built-in sets
#[derive(Debug, Deserialize)]
pub struct WhitelistConfig {
    /// Hash list file; empty means none
    pub hash_file: String,
    pub extra_process: Vec<String>,
    pub extra_file: Vec<String>,
    pub extra_registry: Vec<String>,
    pub extra_network: Vec<String>,
}

/// Report and timeline output
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    pub generalize_paths: bool,
    pub enable_timeline: bool,
    /// Empty writes next to the input file
    pub directory: String,
}

/// Operational logging configuration (application debug logs)
#[derive(Debug, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub directory: PathBuf,
    pub filename: String,
    pub file_output: bool,
}

impl AppConfig {
    /// Load configuration from defaults, procsift.toml, and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        let s = config::Config::builder()
            // --- Defaults ---
            // Scanner
            .set_default("scanner.yara_enabled", false)?
            .set_default("scanner.yara_rules_path", "rules/yara")?
            // Reputation
            .set_default("reputation.enabled", false)?
            .set_default("reputation.api_key", "")?
            .set_default("reputation.api_key_file", "virustotal.api")?
            .set_default("reputation.endpoint", DEFAULT_ENDPOINT)?
            .set_default("reputation.cooldown_secs", 60)?
            .set_default("reputation.max_retries", 5)?
            .set_default("reputation.timeout_secs", 30)?
            // Whitelist
            .set_default("whitelist.hash_file", "")?
            .set_default("whitelist.extra_process", Vec::<String>::new())?
            .set_default("whitelist.extra_file", Vec::<String>::new())?
            .set_default("whitelist.extra_registry", Vec::<String>::new())?
            .set_default("whitelist.extra_network", Vec::<String>::new())?
            // Output
            .set_default("output.generalize_paths", false)?
            .set_default("output.enable_timeline", true)?
            .set_default("output.directory", "")?
            // Logging
            .set_default("logging.level", "info")?
            .set_default("logging.directory", "logs")?
            .set_default("logging.filename", "procsift.log")?
            .set_default("logging.file_output", false)?
            // --- Sources ---
            .add_source(config::File::with_name("procsift").required(false))
            .add_source(config::Environment::with_prefix("PROCSIFT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

impl ReputationConfig {
    /// Configured key, falling back to the first line of `api_key_file`.
    pub fn resolve_api_key(&self) -> Option<String> {
        let key = self.api_key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
        let content = fs::read_to_string(&self.api_key_file).ok()?;
        content
            .lines()
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
    }
}

impl WhitelistConfig {
    /// Built-in rules followed by the configured extras
    pub fn rules(&self) -> Vec<WhitelistRule> {
        let extras = [
            (WhitelistScope::Process, &self.extra_process),
            (WhitelistScope::File, &self.extra_file),
            (WhitelistScope::Registry, &self.extra_registry),
            (WhitelistScope::Network, &self.extra_network),
        ];

        let mut rules = builtin_rules();
        for (scope, patterns) in extras {
            rules.extend(
                patterns
                    .iter()
                    .filter(|p| !p.trim().is_empty())
                    .map(|p| WhitelistRule::new(scope, p.as_str())),
            );
        }
        rules
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig {
                yara_enabled: false,
                yara_rules_path: PathBuf::from("rules/yara"),
            },
            reputation: ReputationConfig {
                enabled: false,
                api_key: String::new(),
                api_key_file: PathBuf::from("virustotal.api"),
                endpoint: DEFAULT_ENDPOINT.to_string(),
                cooldown_secs: 60,
                max_retries: 5,
                timeout_secs: 30,
            },
            whitelist: WhitelistConfig {
                hash_file: String::new(),
                extra_process: Vec::new(),
                extra_file: Vec::new(),
                extra_registry: Vec::new(),
                extra_network: Vec::new(),
            },
            output: OutputConfig {
                generalize_paths: false,
                enable_timeline: true,
                directory: String::new(),
            },
            logging: LogConfig {
                level: "info".to_string(),
                directory: PathBuf::from("logs"),
                filename: "procsift.log".to_string(),
                file_output: false,
            },
        }
    }
}

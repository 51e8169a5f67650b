//! Query configuration for sparqlate.
//!
//! The compiler itself is configuration-free apart from the inference toggle,
//! which switches type filters between reasoning-backed class matching and
//! explicit subclass enumeration. The remaining settings are store-specific
//! and only influence the query prologue the executor prepends.
//!
//! A configuration can be built in code, read from TOML, or parsed from a
//! `key=value;` connection string such as
//! `provider=virtuoso;host=localhost;rule=urn:example/ruleset;inference=true`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SparqlateError};

/// Default inference rule set name used by Virtuoso-style stores.
pub const DEFAULT_INFERENCE_RULE: &str = "urn:sparqlate/ruleset";

/// The kind of store the generated queries are sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    /// Any SPARQL 1.1 endpoint. No prologue is added.
    #[default]
    Generic,
    /// OpenLink Virtuoso. Inference is requested with `DEFINE input:inference`.
    Virtuoso,
}

impl StoreProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "generic" | "sparql" | "dotnetrdf" => Ok(StoreProvider::Generic),
            "virtuoso" => Ok(StoreProvider::Virtuoso),
            other => Err(SparqlateError::Config(format!(
                "unknown store provider '{other}'"
            ))),
        }
    }
}

/// Settings passed through to generator construction and query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// The store the queries target.
    pub provider: StoreProvider,
    /// Whether the store applies RDFS reasoning to type queries.
    pub inference_enabled: bool,
    /// Rule set name for stores that require one to enable reasoning.
    pub inference_rule: Option<String>,
    /// Connection options that are not interpreted by this crate.
    pub options: BTreeMap<String, String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        QueryConfig {
            provider: StoreProvider::Generic,
            inference_enabled: false,
            inference_rule: None,
            options: BTreeMap::new(),
        }
    }
}

impl QueryConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable inference-aware class matching.
    pub fn with_inference(mut self, enabled: bool) -> Self {
        self.inference_enabled = enabled;
        self
    }

    /// Set the inference rule set name.
    pub fn with_inference_rule(mut self, rule: &str) -> Self {
        self.inference_rule = Some(rule.to_string());
        self
    }

    /// Parse a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: QueryConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a `key=value;key=value` connection string.
    ///
    /// Recognized keys are `provider`, `inference` and `rule`; everything else
    /// (host, credentials, ...) is kept verbatim in [`QueryConfig::options`].
    pub fn from_connection_string(input: &str) -> Result<Self> {
        let mut config = QueryConfig::default();

        for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(SparqlateError::Config(format!(
                    "expected key=value in connection string, got '{part}'"
                )));
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "provider" => config.provider = StoreProvider::parse(value)?,
                "inference" => {
                    config.inference_enabled = parse_bool(value).ok_or_else(|| {
                        SparqlateError::Config(format!("invalid inference flag '{value}'"))
                    })?
                }
                "rule" => {
                    config.inference_rule = Some(value.to_string());
                    config.inference_enabled = true;
                }
                _ => {
                    config.options.insert(key, value.to_string());
                }
            }
        }

        config.validate()?;
        debug!(provider = ?config.provider, inference = config.inference_enabled, "parsed connection string");
        Ok(config)
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if let Some(rule) = &self.inference_rule
            && rule.trim().is_empty()
        {
            return Err(SparqlateError::Config(
                "inference rule must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Store-specific text prepended to every query.
    ///
    /// Virtuoso needs an explicit rule set to reason over; other providers
    /// get no prologue.
    pub fn query_prologue(&self) -> String {
        match self.provider {
            StoreProvider::Virtuoso if self.inference_enabled => {
                let rule = self
                    .inference_rule
                    .as_deref()
                    .unwrap_or(DEFAULT_INFERENCE_RULE);
                format!("DEFINE input:inference '{rule}' \n")
            }
            _ => String::new(),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

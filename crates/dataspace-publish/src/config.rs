//! Publisher configuration and its printable templates.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::error::PublishError;

pub const DEFAULT_GRAPHITE_HOST: &str = "localhost";
pub const DEFAULT_GRAPHITE_PORT: u16 = 2003;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublisherConfig {
    /// Name of the publisher to instantiate.
    pub name: String,
    #[serde(default = "default_graphite_host")]
    pub graphite_host: String,
    #[serde(default = "default_graphite_port")]
    pub graphite_port: u16,
    /// Namespace prefix for every published metric; publisher default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphite_context: Option<String>,
    #[serde(default)]
    pub publish_to_graphite: bool,
}

fn default_graphite_host() -> String {
    DEFAULT_GRAPHITE_HOST.to_string()
}

fn default_graphite_port() -> u16 {
    DEFAULT_GRAPHITE_PORT
}

impl PublisherConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graphite_host: default_graphite_host(),
            graphite_port: default_graphite_port(),
            graphite_context: None,
            publish_to_graphite: false,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PublishError> {
        let config: Self = toml::from_str(text).map_err(|e| PublishError::Config(e.to_string()))?;
        if config.name.trim().is_empty() {
            return Err(PublishError::Config("name must not be empty".to_string()));
        }
        if config.graphite_host.trim().is_empty() {
            return Err(PublishError::Config(
                "graphite_host must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PublishError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PublishError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

/// Example channel entry for a publisher, with a field legend.
pub fn config_template(name: &str) -> Result<String, PublishError> {
    let mut config = PublisherConfig::new(name);
    config.publish_to_graphite = true;
    let body = toml::to_string_pretty(&config)
        .map_err(|e| PublishError::Config(format!("{name}: {e}")))?;

    let mut out = String::new();
    let _ = writeln!(out, "Entry in channel configuration");
    let _ = writeln!(out, "[publishers.{name}]");
    out.push_str(&body);
    let _ = writeln!(out, "where");
    let _ = writeln!(out, "\t name - name of the publisher to be instantiated by task manager");
    let _ = writeln!(out, "\t publish_to_graphite - publish to graphite if true");
    let _ = writeln!(out, "\t graphite_host - graphite host name");
    let _ = writeln!(out, "\t graphite_port - graphite plaintext port");
    let _ = writeln!(out, "\t graphite_context - metric namespace prefix (optional)");
    Ok(out)
}

/// Consumed products followed by the configuration template.
pub fn config_info(name: &str, consumes: &[&str]) -> Result<String, PublishError> {
    Ok(format!("consumes {consumes:?}\n{}", config_template(name)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_graphite_endpoint() {
        let config = PublisherConfig::from_toml_str("name = \"GCEPricePerformancePublisher\"")
            .expect("config should parse");
        assert_eq!(config.graphite_host, DEFAULT_GRAPHITE_HOST);
        assert_eq!(config.graphite_port, DEFAULT_GRAPHITE_PORT);
        assert_eq!(config.graphite_context, None);
        assert!(!config.publish_to_graphite);
    }

    #[test]
    fn empty_name_and_unknown_keys_are_rejected() {
        assert!(matches!(
            PublisherConfig::from_toml_str("name = \"\""),
            Err(PublishError::Config(_))
        ));
        assert!(matches!(
            PublisherConfig::from_toml_str("name = \"p\"\nhost = \"x\""),
            Err(PublishError::Config(_))
        ));
    }

    #[test]
    fn template_body_parses_back() {
        let template = config_template("GCEPricePerformancePublisher").expect("template");
        let body: String = template
            .lines()
            .skip(2)
            .take_while(|line| *line != "where")
            .map(|line| format!("{line}\n"))
            .collect();
        assert!(body.contains("name = \"GCEPricePerformancePublisher\""));
        let parsed = PublisherConfig::from_toml_str(&body).expect("template body is valid toml");
        assert_eq!(parsed.name, "GCEPricePerformancePublisher");
        assert!(parsed.publish_to_graphite);
    }

    #[test]
    fn info_lists_consumed_products() {
        let info = config_info("P", &["GCE_Price_Performance"]).expect("info");
        assert!(info.starts_with("consumes [\"GCE_Price_Performance\"]\n"));
        assert!(info.contains("[publishers.P]"));
    }
}

use figment::providers::{Format, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use super::logging::LoggingConfig;
use crate::instrument::Options;

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0: bind address, logging and instrumentation.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct ConfigV1 {
    pub bind_address: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Instrumentation pipeline options; an omitted or empty section
    /// yields the documented defaults.
    #[serde(default)]
    pub instrumentation: Options,
    /// Path the exposition endpoint is registered at.
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

/// Load config from a YAML file named "config.yaml" in the current directory.
pub fn load_config() -> ConfigV1 {
    let figment = Figment::new().merge(Yaml::file("./config.yaml"));
    let config = match figment.extract::<Config>() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            std::process::exit(1);
        }
    };
    match config {
        Config::ConfigV1(c) => c,
    }
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() {
    let schema = schema_for!(Config);
    println!("{}", serde_json::to_string_pretty(&schema).unwrap());
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8080
"#;

    const FULL_CONFIG: &str = r#"
version: "1.0.0"
bind_address: 127.0.0.1:8080
metrics_path: /internal/metrics
logging:
  level: "debug"
  format: "json"
instrumentation:
  should_group_status_codes: false
  should_respect_env_var: true
  env_var_name: "PROMOTRON_ENABLED"
  excluded_handlers:
    - ".*admin.*"
  round_latency_decimals: 4
  metric_namespace: "acme"
"#;

    fn parse(yaml: &str) -> ConfigV1 {
        let config: Config = Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .expect("config parses");
        match config {
            Config::ConfigV1(c) => c,
        }
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse(MINIMAL_CONFIG);
        assert_eq!(config.metrics_path, "/metrics");
        assert!(config.instrumentation.should_group_status_codes);
        assert!(!config.instrumentation.should_respect_env_var);
        assert_eq!(config.instrumentation.env_var_name, "ENABLE_METRICS");
    }

    #[test]
    fn full_config_overrides_instrumentation() {
        let config = parse(FULL_CONFIG);
        assert_eq!(config.metrics_path, "/internal/metrics");
        assert!(!config.instrumentation.should_group_status_codes);
        assert!(config.instrumentation.should_respect_env_var);
        assert_eq!(config.instrumentation.env_var_name, "PROMOTRON_ENABLED");
        assert_eq!(config.instrumentation.excluded_handlers, vec![".*admin.*"]);
        assert_eq!(config.instrumentation.round_latency_decimals, Some(4));
        assert_eq!(config.instrumentation.metric_namespace, "acme");
    }
}

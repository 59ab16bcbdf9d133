use crate::config::EnricherConfig;
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Optional configuration file. Every table and key may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub pixabay: ProviderConfig,
    pub openai: OpenAiConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub images_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_records: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| EtlError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn apply_to(&self, config: &mut EnricherConfig) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.input_csv, &self.input.path);
        set(&mut config.output_csv, &self.output.path);
        set(&mut config.images_dir, &self.output.images_dir);
        set(&mut config.pixabay_endpoint, &self.pixabay.endpoint);
        set(&mut config.openai_endpoint, &self.openai.endpoint);
        set(&mut config.openai_model, &self.openai.model);

        if self.pixabay.api_key.is_some() {
            config.pixabay_api_key = self.pixabay.api_key.clone();
        }
        if self.openai.api_key.is_some() {
            config.openai_api_key = self.openai.api_key.clone();
        }
        if self.run.max_records.is_some() {
            config.max_records = self.run.max_records;
        }
        if let Some(secs) = self.run.request_timeout_seconds {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
    }
}

fn placeholder_pattern() -> Result<Regex> {
    Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
        message: format!("invalid placeholder pattern: {}", e),
    })
}

/// Replaces `${VAR}` with the environment value. Unset variables are left as written.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = placeholder_pattern()?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.to_string())
}

/// Fails when a value still holds a `${VAR}` whose variable was not set.
pub fn reject_unresolved(field: &str, value: &str) -> Result<()> {
    if let Some(caps) = placeholder_pattern()?.captures(value) {
        return Err(EtlError::ConfigValidationError {
            field: field.to_string(),
            message: format!("environment variable {} is not set", &caps[1]),
        });
    }
    Ok(())
}

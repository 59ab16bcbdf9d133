pub mod cli;
pub mod toml_config;

use crate::clients::{openai, pixabay};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::time::Duration;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_INPUT_CSV: &str = "FrenchCities_with_h3.csv";
pub const DEFAULT_OUTPUT_CSV: &str = "enriched_cities_dev.csv";
pub const DEFAULT_IMAGES_DIR: &str = "./city_images";

const TABLE_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// Fully resolved settings, built once at startup and handed to every component.
#[derive(Clone)]
pub struct EnricherConfig {
    pub input_csv: String,
    pub output_csv: String,
    pub images_dir: String,
    pub pixabay_endpoint: String,
    pub pixabay_api_key: Option<String>,
    pub openai_endpoint: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub max_records: Option<usize>,
    pub request_timeout: Option<Duration>,
    pub dry_run: bool,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            input_csv: DEFAULT_INPUT_CSV.to_string(),
            output_csv: DEFAULT_OUTPUT_CSV.to_string(),
            images_dir: DEFAULT_IMAGES_DIR.to_string(),
            pixabay_endpoint: pixabay::DEFAULT_ENDPOINT.to_string(),
            pixabay_api_key: None,
            openai_endpoint: openai::DEFAULT_ENDPOINT.to_string(),
            openai_api_key: None,
            openai_model: openai::DEFAULT_MODEL.to_string(),
            max_records: None,
            request_timeout: None,
            dry_run: false,
        }
    }
}

// API keys are never printed.
impl std::fmt::Debug for EnricherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<redacted>");
        f.debug_struct("EnricherConfig")
            .field("input_csv", &self.input_csv)
            .field("output_csv", &self.output_csv)
            .field("images_dir", &self.images_dir)
            .field("pixabay_endpoint", &self.pixabay_endpoint)
            .field("pixabay_api_key", &redact(&self.pixabay_api_key))
            .field("openai_endpoint", &self.openai_endpoint)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_model", &self.openai_model)
            .field("max_records", &self.max_records)
            .field("request_timeout", &self.request_timeout)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl EnricherConfig {
    pub fn from_toml(file: &TomlConfig) -> Self {
        let mut config = Self::default();
        file.apply_to(&mut config);
        config
    }

    pub fn pixabay_api_key(&self) -> Result<&str> {
        validation::validate_required_field("pixabay.api_key", &self.pixabay_api_key).map(String::as_str)
    }

    pub fn openai_api_key(&self) -> Result<&str> {
        validation::validate_required_field("openai.api_key", &self.openai_api_key).map(String::as_str)
    }
}

impl ConfigProvider for EnricherConfig {
    fn input_csv(&self) -> &str {
        &self.input_csv
    }

    fn output_csv(&self) -> &str {
        &self.output_csv
    }

    fn images_dir(&self) -> &str {
        &self.images_dir
    }

    fn max_records(&self) -> Option<usize> {
        self.max_records
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

impl Validate for EnricherConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("input_csv", &self.input_csv)?;
        validation::validate_file_extension("input_csv", &self.input_csv, &TABLE_EXTENSIONS)?;
        validation::validate_path("output_csv", &self.output_csv)?;
        validation::validate_file_extension("output_csv", &self.output_csv, &TABLE_EXTENSIONS)?;
        validation::validate_path("images_dir", &self.images_dir)?;
        validation::validate_url("pixabay.endpoint", &self.pixabay_endpoint)?;
        validation::validate_url("openai.endpoint", &self.openai_endpoint)?;
        validation::validate_non_empty_string("openai.model", &self.openai_model)?;

        if let Some(max_records) = self.max_records {
            validation::validate_positive_number("run.max_records", max_records, 1)?;
        }

        // A dry run never talks to the providers.
        if !self.dry_run {
            let pixabay_key = self.pixabay_api_key()?;
            toml_config::reject_unresolved("pixabay.api_key", pixabay_key)?;
            validation::validate_non_empty_string("pixabay.api_key", pixabay_key)?;

            let openai_key = self.openai_api_key()?;
            toml_config::reject_unresolved("openai.api_key", openai_key)?;
            validation::validate_non_empty_string("openai.api_key", openai_key)?;
        }

        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "city-enricher")]
#[command(about = "Enrich a city table with Pixabay images and an OpenAI travel guide")]
pub struct CliConfig {
    /// Optional TOML file; flags given on the command line take precedence
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, help = "Source table with at least city and country columns")]
    pub input_csv: Option<String>,

    #[arg(long, help = "Enriched table, created on the first run and resumed afterwards")]
    pub output_csv: Option<String>,

    #[arg(long)]
    pub images_dir: Option<String>,

    #[arg(long, env = "PIXABAY_API_KEY", hide_env_values = true)]
    pub pixabay_api_key: Option<String>,

    #[arg(long)]
    pub pixabay_endpoint: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long)]
    pub openai_endpoint: Option<String>,

    #[arg(long)]
    pub openai_model: Option<String>,

    #[arg(long, help = "Stop after enriching this many new rows")]
    pub max_records: Option<usize>,

    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, help = "List pending rows without calling any provider")]
    pub dry_run: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Defaults, then the TOML file (if any), then explicit flags.
    pub fn resolve(&self) -> Result<EnricherConfig> {
        let mut config = match &self.config {
            Some(path) => EnricherConfig::from_toml(&TomlConfig::from_file(path)?),
            None => EnricherConfig::default(),
        };
        self.apply_to(&mut config);
        Ok(config)
    }

    fn apply_to(&self, config: &mut EnricherConfig) {
        fn set(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }

        set(&mut config.input_csv, &self.input_csv);
        set(&mut config.output_csv, &self.output_csv);
        set(&mut config.images_dir, &self.images_dir);
        set(&mut config.pixabay_endpoint, &self.pixabay_endpoint);
        set(&mut config.openai_endpoint, &self.openai_endpoint);
        set(&mut config.openai_model, &self.openai_model);

        if self.pixabay_api_key.is_some() {
            config.pixabay_api_key = self.pixabay_api_key.clone();
        }
        if self.openai_api_key.is_some() {
            config.openai_api_key = self.openai_api_key.clone();
        }
        if self.max_records.is_some() {
            config.max_records = self.max_records;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        config.dry_run |= self.dry_run;
    }
}

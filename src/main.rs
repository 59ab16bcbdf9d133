use clap::Parser;
use city_enricher::clients::build_http_client;
use city_enricher::utils::error::ErrorSeverity;
use city_enricher::utils::{logger, validation::Validate};
use city_enricher::{
    CliConfig, Enricher, EnricherConfig, EtlEngine, EtlError, ImagePersister, LocalStorage, OpenAiClient,
    PixabayClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.log_json {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting city-enricher");

    let config = match cli.resolve().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration validation failed: {}", e);
            tracing::error!("Suggestion: {}", e.recovery_suggestion());
            eprintln!("{}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    tracing::debug!("Resolved config: {:?}", config);

    match run(config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "Enrichment failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

async fn run(config: EnricherConfig) -> Result<(), EtlError> {
    let client = build_http_client(config.request_timeout)?;
    let storage = LocalStorage::new(".");

    // Keys are validated unless this is a dry run, which never sends a request.
    let pixabay = PixabayClient::new(
        client.clone(),
        config.pixabay_endpoint.clone(),
        config.pixabay_api_key.clone().unwrap_or_default(),
    );
    let openai = OpenAiClient::new(
        client.clone(),
        config.openai_endpoint.clone(),
        config.openai_api_key.clone().unwrap_or_default(),
        config.openai_model.clone(),
    );
    let persister = ImagePersister::new(client, storage.clone(), config.images_dir.clone());
    let enricher = Enricher::new(pixabay, openai, persister);

    let engine = EtlEngine::new(storage, config, enricher);
    let summary = engine.run().await?;

    tracing::info!("Enrichment completed: {} new rows", summary.enriched);
    Ok(())
}

use anyhow::Result;
use city_enricher::core::dataset::Table;
use city_enricher::{
    Enricher, EnricherConfig, EtlEngine, EtlError, ImagePersister, LocalStorage, OpenAiClient, PixabayClient,
};
use httpmock::prelude::*;
use httpmock::Mock;
use reqwest::Client;
use std::collections::HashSet;
use tempfile::TempDir;

const CITIES: &str = "city,country,h3\nParis,France,861fb4667\nLyon,France,861f8a4a7\nNice,France,86396b217\n";

const GUIDE: &str = "Welcome! Visit https://example.fr/guide and http://tourisme.fr. Enjoy.";

type Engine = EtlEngine<LocalStorage, EnricherConfig, PixabayClient, OpenAiClient>;

fn config_for(server: &MockServer) -> EnricherConfig {
    EnricherConfig {
        input_csv: "cities.csv".to_string(),
        output_csv: "enriched.csv".to_string(),
        images_dir: "city_images".to_string(),
        pixabay_endpoint: server.url("/api/"),
        pixabay_api_key: Some("px-test".to_string()),
        openai_endpoint: server.url("/v1/chat/completions"),
        openai_api_key: Some("sk-test".to_string()),
        ..EnricherConfig::default()
    }
}

fn engine(temp_dir: &TempDir, config: EnricherConfig) -> Engine {
    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap());
    let client = Client::new();
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
    EtlEngine::new(storage, config, Enricher::new(pixabay, openai, persister))
}

struct Providers<'a> {
    search: Mock<'a>,
    images: Mock<'a>,
    chat: Mock<'a>,
}

fn healthy_providers(server: &MockServer) -> Providers<'_> {
    let hits = serde_json::json!({
        "total": 3,
        "hits": [
            {"webformatURL": server.url("/img/a.jpg")},
            {"webformatURL": server.url("/img/b.jpg")},
            {"webformatURL": server.url("/img/c.jpg")}
        ]
    });
    let search = server.mock(|when, then| {
        when.method(GET).path("/api/").query_param("key", "px-test");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(hits);
    });
    let images = server.mock(|when, then| {
        when.method(GET).path_contains("/img/");
        then.status(200).body(b"\xFF\xD8\xFFjpeg-bytes");
    });
    let chat = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer sk-test");
        then.status(200).json_body(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": GUIDE}}]
        }));
    });
    Providers { search, images, chat }
}

fn write_input(temp_dir: &TempDir, name: &str, content: &str) {
    std::fs::write(temp_dir.path().join(name), content).unwrap();
}

fn read_output(temp_dir: &TempDir, name: &str, delimiter: u8) -> Table {
    let data = std::fs::read(temp_dir.path().join(name)).unwrap();
    Table::parse(&data, delimiter).unwrap()
}

#[tokio::test]
async fn test_full_run_enriches_every_row() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", CITIES);
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let summary = engine(&temp_dir, config_for(&server)).run().await?;

    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.enriched, 3);
    assert_eq!(summary.skipped, 0);
    providers.search.assert_hits(3);
    providers.images.assert_hits(9);
    providers.chat.assert_hits(3);

    let output = read_output(&temp_dir, "enriched.csv", b',');
    assert_eq!(
        output.columns,
        vec!["city", "country", "h3", "image_1", "image_2", "image_3", "description", "hyperlinks"]
    );
    let keys: HashSet<(String, String)> = output
        .rows
        .iter()
        .map(|row| (row["city"].clone(), row["country"].clone()))
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(keys.contains(&("Lyon".to_string(), "France".to_string())));

    let paris = &output.rows[0];
    assert_eq!(paris["h3"], "861fb4667");
    assert_eq!(paris["image_1"], "city_images/Paris_1.jpg");
    assert_eq!(paris["image_3"], "city_images/Paris_3.jpg");
    assert_eq!(paris["description"], GUIDE);
    // Trailing punctuation stays attached to the extracted link.
    assert_eq!(paris["hyperlinks"], "https://example.fr/guide, http://tourisme.fr.");

    let image = std::fs::read(temp_dir.path().join("city_images/Nice_2.jpg"))?;
    assert_eq!(image, b"\xFF\xD8\xFFjpeg-bytes");
    Ok(())
}

#[tokio::test]
async fn test_second_run_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", CITIES);
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    engine(&temp_dir, config_for(&server)).run().await?;
    let first = std::fs::read(temp_dir.path().join("enriched.csv"))?;

    let summary = engine(&temp_dir, config_for(&server)).run().await?;
    let second = std::fs::read(temp_dir.path().join("enriched.csv"))?;

    assert_eq!(summary.enriched, 0);
    assert_eq!(summary.skipped, 3);
    providers.search.assert_hits(3);
    providers.chat.assert_hits(3);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn test_run_resumes_after_partial_output() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", CITIES);
    // As left behind by a run that stopped after committing Paris.
    write_input(
        &temp_dir,
        "enriched.csv",
        "city,country,h3,image_1,image_2,image_3,description,hyperlinks\n\
         Paris,France,861fb4667,city_images/Paris_1.jpg,,,Earlier guide,\n",
    );
    let server = MockServer::start();
    let paris_search = server.mock(|when, then| {
        when.method(GET).path("/api/").query_param("q", "Paris France");
        then.status(200).json_body(serde_json::json!({"hits": []}));
    });
    let providers = healthy_providers(&server);

    let summary = engine(&temp_dir, config_for(&server)).run().await?;

    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.skipped, 1);
    paris_search.assert_hits(0);
    providers.chat.assert_hits(2);

    let output = read_output(&temp_dir, "enriched.csv", b',');
    assert_eq!(output.len(), 3);
    assert_eq!(output.rows[0]["description"], "Earlier guide");
    assert_eq!(output.rows[1]["city"], "Lyon");
    assert_eq!(output.rows[2]["city"], "Nice");
    Ok(())
}

#[tokio::test]
async fn test_max_records_then_resume_completes_table() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", CITIES);
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let limited = EnricherConfig {
        max_records: Some(1),
        ..config_for(&server)
    };
    let summary = engine(&temp_dir, limited).run().await?;
    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.deferred, 2);
    assert_eq!(read_output(&temp_dir, "enriched.csv", b',').len(), 1);

    let summary = engine(&temp_dir, config_for(&server)).run().await?;
    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.skipped, 1);

    providers.chat.assert_hits(3);
    let output = read_output(&temp_dir, "enriched.csv", b',');
    assert_eq!(output.len(), 3);
    assert_eq!(output.columns.len(), 8);
    Ok(())
}

#[tokio::test]
async fn test_provider_failures_commit_placeholders() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", "city,country\nRennes,France\n");
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET).path("/api/");
        then.status(500).body("upstream down");
    });
    let chat = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(429).body("rate limited");
    });

    let summary = engine(&temp_dir, config_for(&server)).run().await?;

    assert_eq!(summary.enriched, 1);
    assert_eq!(summary.without_images, 1);
    assert_eq!(summary.fallback_descriptions, 1);

    // Created up front even though no image was saved.
    assert!(temp_dir.path().join("city_images").is_dir());

    let output = read_output(&temp_dir, "enriched.csv", b',');
    let row = &output.rows[0];
    assert_eq!(row["image_1"], "");
    assert_eq!(row["image_2"], "");
    assert_eq!(row["image_3"], "");
    assert_eq!(row["description"], "No description available.");
    assert_eq!(row["hyperlinks"], "");

    // Placeholders are final; the row is not retried.
    let summary = engine(&temp_dir, config_for(&server)).run().await?;
    assert_eq!(summary.skipped, 1);
    search.assert_hits(1);
    chat.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_short_input_rows_are_enriched() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", "city,country,h3\nParis,France,861\nLyon,France\n");
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let summary = engine(&temp_dir, config_for(&server)).run().await?;

    assert_eq!(summary.enriched, 2);
    providers.chat.assert_hits(2);
    let output = read_output(&temp_dir, "enriched.csv", b',');
    assert_eq!(output.len(), 2);
    assert_eq!(output.rows[1]["city"], "Lyon");
    assert_eq!(output.rows[1]["h3"], "");
    assert_eq!(output.rows[1]["image_1"], "city_images/Lyon_1.jpg");
    Ok(())
}

#[tokio::test]
async fn test_duplicate_keys_enriched_once() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(
        &temp_dir,
        "cities.csv",
        "city,country,h3\nParis,France,a\nParis,France,b\nParis,Canada,c\n",
    );
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let summary = engine(&temp_dir, config_for(&server)).run().await?;

    assert_eq!(summary.enriched, 2);
    assert_eq!(summary.skipped, 1);
    providers.chat.assert_hits(2);
    let output = read_output(&temp_dir, "enriched.csv", b',');
    assert_eq!(output.rows[0]["h3"], "a");
    assert_eq!(output.rows[1]["country"], "Canada");
    Ok(())
}

#[tokio::test]
async fn test_missing_input_is_fatal_before_any_work() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let err = engine(&temp_dir, config_for(&server)).run().await.unwrap_err();

    assert!(matches!(err, EtlError::InputNotFound { ref path } if path == "cities.csv"));
    assert!(!temp_dir.path().join("enriched.csv").exists());
    providers.search.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_missing_country_column_is_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", "city,h3\nParis,861fb4667\n");
    let server = MockServer::start();

    let err = engine(&temp_dir, config_for(&server)).run().await.unwrap_err();

    assert!(matches!(err, EtlError::MissingColumnError { ref column, .. } if column == "country"));
    assert!(!temp_dir.path().join("enriched.csv").exists());
    Ok(())
}

#[tokio::test]
async fn test_dry_run_calls_nothing_and_writes_nothing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.csv", CITIES);
    let server = MockServer::start();
    let providers = healthy_providers(&server);

    let config = EnricherConfig {
        dry_run: true,
        ..config_for(&server)
    };
    let summary = engine(&temp_dir, config).run().await?;

    assert_eq!(summary.enriched, 3);
    providers.search.assert_hits(0);
    providers.chat.assert_hits(0);
    assert!(!temp_dir.path().join("enriched.csv").exists());
    assert!(!temp_dir.path().join("city_images").exists());
    Ok(())
}

#[tokio::test]
async fn test_tsv_tables_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_input(&temp_dir, "cities.tsv", "city\tcountry\tnote\nLille\tFrance\tnorth, cold\n");
    let server = MockServer::start();
    healthy_providers(&server);

    let config = EnricherConfig {
        input_csv: "cities.tsv".to_string(),
        output_csv: "enriched.tsv".to_string(),
        ..config_for(&server)
    };
    let summary = engine(&temp_dir, config).run().await?;
    tokio_test::assert_ok!(std::fs::metadata(temp_dir.path().join("enriched.tsv")));

    assert_eq!(summary.enriched, 1);
    let output = read_output(&temp_dir, "enriched.tsv", b'\t');
    assert_eq!(output.rows[0]["note"], "north, cold");
    assert_eq!(output.rows[0]["image_2"], "city_images/Lille_2.jpg");
    Ok(())
}

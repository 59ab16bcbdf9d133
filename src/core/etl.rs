use crate::core::dataset::{read_input_table, DatasetStore};
use crate::core::enricher::{plan, Enricher};
use crate::domain::model::RunSummary;
use crate::domain::ports::{ConfigProvider, DescriptionSource, ImageSearch, Storage};
use crate::utils::error::Result;
use std::collections::HashSet;

pub struct EtlEngine<S, C, I, D>
where
    S: Storage + Clone,
    C: ConfigProvider,
    I: ImageSearch,
    D: DescriptionSource,
{
    storage: S,
    config: C,
    enricher: Enricher<S, I, D>,
}

impl<S, C, I, D> EtlEngine<S, C, I, D>
where
    S: Storage + Clone,
    C: ConfigProvider,
    I: ImageSearch,
    D: DescriptionSource,
{
    pub fn new(storage: S, config: C, enricher: Enricher<S, I, D>) -> Self {
        Self {
            storage,
            config,
            enricher,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        println!("Starting city enrichment...");

        let input = read_input_table(&self.storage, self.config.input_csv()).await?;
        println!("Read {} rows from {}", input.len(), self.config.input_csv());

        if self.config.dry_run() {
            let known = match DatasetStore::open(self.storage.clone(), self.config.output_csv()).await? {
                Some(store) => store.keys().clone(),
                None => HashSet::new(),
            };
            let summary = plan(&input, &known, self.config.max_records());
            print_summary("Dry run", &summary);
            return Ok(summary);
        }

        let mut store =
            DatasetStore::load_or_create(self.storage.clone(), self.config.output_csv(), &input.columns).await?;
        println!("Output {} holds {} enriched rows", store.path(), store.len());
        self.storage.create_dir(self.config.images_dir()).await?;

        let summary = self
            .enricher
            .run(&input, &mut store, self.config.max_records())
            .await?;

        print_summary("Run", &summary);
        println!("All rows from '{}' have been processed.", self.config.input_csv());
        println!("Final output is saved to '{}'.", store.path());

        Ok(summary)
    }
}

fn print_summary(label: &str, summary: &RunSummary) {
    tracing::info!(
        total = summary.total_rows,
        enriched = summary.enriched,
        skipped = summary.skipped,
        deferred = summary.deferred,
        "{} finished",
        label
    );
    println!(
        "{}: {} rows, {} enriched, {} skipped, {} deferred",
        label, summary.total_rows, summary.enriched, summary.skipped, summary.deferred
    );
    if summary.without_images > 0 || summary.fallback_descriptions > 0 {
        println!(
            "{} row(s) without images, {} with the fallback description",
            summary.without_images, summary.fallback_descriptions
        );
    }
}

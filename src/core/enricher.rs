use crate::core::dataset::{DatasetStore, Table};
use crate::core::images::ImagePersister;
use crate::domain::model::{
    CityKey, CityRecord, EnrichmentFields, RecordOutcome, RunSummary, FALLBACK_DESCRIPTION, IMAGE_SLOTS,
};
use crate::domain::ports::{DescriptionSource, ImageSearch, Storage};
use crate::utils::error::Result;
use std::collections::HashSet;

/// Drives one input row at a time through search, download, description and commit.
pub struct Enricher<S: Storage, I: ImageSearch, D: DescriptionSource> {
    images: I,
    descriptions: D,
    persister: ImagePersister<S>,
}

impl<S, I, D> Enricher<S, I, D>
where
    S: Storage,
    I: ImageSearch,
    D: DescriptionSource,
{
    pub fn new(images: I, descriptions: D, persister: ImagePersister<S>) -> Self {
        Self {
            images,
            descriptions,
            persister,
        }
    }

    /// Calls both providers for one key. Never fails: provider errors arrive here as placeholders.
    pub async fn fetch_fields(&self, key: &CityKey) -> EnrichmentFields {
        let urls = self
            .images
            .fetch_images(&key.city, &key.country, IMAGE_SLOTS)
            .await;
        let saved_paths = self.persister.persist_images(&urls, &key.city).await;
        let description = self
            .descriptions
            .fetch_description(&key.city, &key.country)
            .await;
        EnrichmentFields::new(saved_paths, description)
    }

    /// Enriches and commits `row` unless its key is already in the store.
    pub async fn process<T: Storage>(
        &self,
        row_index: usize,
        row: &CityRecord,
        store: &mut DatasetStore<T>,
    ) -> Result<RecordOutcome> {
        let key = CityKey::from_record(row);
        if store.contains(&key) {
            tracing::debug!("Skipping row {}: {} already enriched", row_index, key);
            return Ok(RecordOutcome::Skipped);
        }

        println!("Processing new row {}: {}", row_index, key);
        let fields = self.fetch_fields(&key).await;
        let outcome = RecordOutcome::Enriched {
            images_saved: fields.images_saved(),
            fallback_description: fields.description == FALLBACK_DESCRIPTION,
        };

        let mut record = row.clone();
        fields.apply_to(&mut record);
        store.append_and_persist(record).await?;

        Ok(outcome)
    }

    /// Walks the input in order. Stops enriching once `max_records` new rows
    /// are committed; the rows left over are counted as deferred.
    pub async fn run<T: Storage>(
        &self,
        input: &Table,
        store: &mut DatasetStore<T>,
        max_records: Option<usize>,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary {
            total_rows: input.len(),
            ..RunSummary::default()
        };

        for (row_index, row) in input.rows.iter().enumerate() {
            if max_records.is_some_and(|limit| summary.enriched >= limit) {
                summary.deferred = count_pending(&input.rows[row_index..], store.keys());
                tracing::info!(
                    "Reached max_records, {} row(s) left for the next run",
                    summary.deferred
                );
                break;
            }

            let outcome = self.process(row_index, row, store).await?;
            summary.record(outcome);
        }

        Ok(summary)
    }
}

/// Rows that would be enriched, without calling anything. Repeated keys count once.
fn count_pending(rows: &[CityRecord], known: &HashSet<CityKey>) -> usize {
    let mut seen = HashSet::new();
    rows.iter()
        .map(CityKey::from_record)
        .filter(|key| !known.contains(key) && seen.insert(key.clone()))
        .count()
}

/// Dry-run summary: which rows a real run would enrich and which it would skip.
pub fn plan(input: &Table, known: &HashSet<CityKey>, max_records: Option<usize>) -> RunSummary {
    let mut summary = RunSummary {
        total_rows: input.len(),
        ..RunSummary::default()
    };
    let mut pending = HashSet::new();

    for (row_index, row) in input.rows.iter().enumerate() {
        let key = CityKey::from_record(row);
        if known.contains(&key) || pending.contains(&key) {
            summary.skipped += 1;
        } else if max_records.is_some_and(|limit| summary.enriched >= limit) {
            pending.insert(key);
            summary.deferred += 1;
        } else {
            println!("Would process row {}: {}", row_index, key);
            pending.insert(key);
            summary.enriched += 1;
        }
    }

    summary
}

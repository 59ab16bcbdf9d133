use indexmap::IndexMap;

pub const CITY_COLUMN: &str = "city";
pub const COUNTRY_COLUMN: &str = "country";

/// Columns added by the pipeline, in the order they are appended to the output.
pub const ENRICHMENT_COLUMNS: [&str; 5] = ["image_1", "image_2", "image_3", "description", "hyperlinks"];

pub const IMAGE_SLOTS: usize = 3;

pub const FALLBACK_DESCRIPTION: &str = "No description available.";

/// One table row: column name to cell value, in column order.
pub type CityRecord = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CityKey {
    pub city: String,
    pub country: String,
}

impl CityKey {
    pub fn new(city: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            country: country.into(),
        }
    }

    /// Missing cells read as empty strings; column presence is checked when the table is loaded.
    pub fn from_record(record: &CityRecord) -> Self {
        let cell = |column: &str| record.get(column).cloned().unwrap_or_default();
        Self::new(cell(CITY_COLUMN), cell(COUNTRY_COLUMN))
    }
}

impl std::fmt::Display for CityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    pub text: String,
    pub hyperlinks: String,
}

impl Description {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_DESCRIPTION.to_string(),
            hyperlinks: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentFields {
    pub images: [String; IMAGE_SLOTS],
    pub description: String,
    pub hyperlinks: String,
}

impl EnrichmentFields {
    /// Image paths fill the slots positionally; missing positions stay empty.
    pub fn new(image_paths: Vec<String>, description: Description) -> Self {
        let mut images: [String; IMAGE_SLOTS] = Default::default();
        for (slot, path) in images.iter_mut().zip(image_paths) {
            *slot = path;
        }
        Self {
            images,
            description: description.text,
            hyperlinks: description.hyperlinks,
        }
    }

    pub fn images_saved(&self) -> usize {
        self.images.iter().filter(|path| !path.is_empty()).count()
    }

    /// Merges into the record, overwriting any same-named input cells.
    pub fn apply_to(self, record: &mut CityRecord) {
        let [image_1, image_2, image_3] = self.images;
        let values = [image_1, image_2, image_3, self.description, self.hyperlinks];
        for (column, value) in ENRICHMENT_COLUMNS.iter().zip(values) {
            record.insert(column.to_string(), value);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Enriched {
        images_saved: usize,
        fallback_description: bool,
    },
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total_rows: usize,
    pub enriched: usize,
    pub skipped: usize,
    pub without_images: usize,
    pub fallback_descriptions: usize,
    /// Rows left for a later run because `max_records` was reached.
    pub deferred: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Enriched {
                images_saved,
                fallback_description,
            } => {
                self.enriched += 1;
                if images_saved == 0 {
                    self.without_images += 1;
                }
                if fallback_description {
                    self.fallback_descriptions += 1;
                }
            }
            RecordOutcome::Skipped => self.skipped += 1,
        }
    }
}

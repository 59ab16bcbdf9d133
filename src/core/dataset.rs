use crate::domain::model::{CityKey, CityRecord, CITY_COLUMN, COUNTRY_COLUMN, ENRICHMENT_COLUMNS};
use crate::domain::ports::Storage;
use crate::utils::error::{EtlError, Result};
use std::collections::HashSet;
use std::path::Path;

/// Column list plus rows, each row keyed by those columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<CityRecord>,
}

/// `.tsv` files are tab-separated, everything else comma-separated.
pub fn delimiter_for(path: &str) -> u8 {
    match Path::new(path).extension().and_then(|ext| ext.to_str()) {
        Some("tsv") => b'\t',
        _ => b',',
    }
}

impl Table {
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Short rows are padded with empty cells, extra trailing cells are dropped.
    pub fn parse(data: &[u8], delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(data);

        let columns = unique_columns(reader.headers()?.iter());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row: CityRecord = columns
                .iter()
                .enumerate()
                .map(|(idx, column)| (column.clone(), record.get(idx).unwrap_or("").to_string()))
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn to_bytes(&self, delimiter: u8) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(
                self.columns
                    .iter()
                    .map(|column| row.get(column).map(String::as_str).unwrap_or("")),
            )?;
        }

        writer
            .into_inner()
            .map_err(|e| EtlError::IoError(e.into_error()))
    }

    pub fn require_columns(&self, path: &str, required: &[&str]) -> Result<()> {
        for column in required {
            if !self.columns.iter().any(|c| c == column) {
                return Err(EtlError::MissingColumnError {
                    path: path.to_string(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn keys(&self) -> HashSet<CityKey> {
        self.rows.iter().map(CityKey::from_record).collect()
    }
}

/// Repeated header names get a `.1`, `.2`, ... suffix so no column is lost.
fn unique_columns<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for name in names {
        let mut column = name.to_string();
        let mut suffix = 1;
        while columns.contains(&column) {
            column = format!("{}.{}", name, suffix);
            suffix += 1;
        }
        if column != name {
            tracing::warn!("Duplicate column '{}' renamed to '{}'", name, column);
        }
        columns.push(column);
    }
    columns
}

/// Reads the source table. A missing file or a missing `city`/`country` column is fatal.
pub async fn read_input_table<S: Storage>(storage: &S, path: &str) -> Result<Table> {
    if !storage.exists(path).await {
        return Err(EtlError::InputNotFound {
            path: path.to_string(),
        });
    }

    let data = storage.read_file(path).await?;
    let table = Table::parse(&data, delimiter_for(path))?;
    table.require_columns(path, &[CITY_COLUMN, COUNTRY_COLUMN])?;
    tracing::debug!("Input table {} has columns {:?}", path, table.columns);
    Ok(table)
}

/// Input columns followed by whichever enrichment columns they do not already contain.
pub fn output_columns(input_columns: &[String]) -> Vec<String> {
    let mut columns = input_columns.to_vec();
    for column in ENRICHMENT_COLUMNS {
        if !columns.iter().any(|c| c == column) {
            columns.push(column.to_string());
        }
    }
    columns
}

/// The output table and its key index. Every append rewrites the whole file.
pub struct DatasetStore<S: Storage> {
    storage: S,
    path: String,
    delimiter: u8,
    table: Table,
    index: HashSet<CityKey>,
}

impl<S: Storage> DatasetStore<S> {
    /// Loads an existing output table, or returns `None` when there is none yet.
    pub async fn open(storage: S, path: impl Into<String>) -> Result<Option<Self>> {
        let path = path.into();
        if !storage.exists(&path).await {
            return Ok(None);
        }
        Self::load(storage, path).await.map(Some)
    }

    pub async fn load_or_create(
        storage: S,
        path: impl Into<String>,
        input_columns: &[String],
    ) -> Result<Self> {
        let path = path.into();
        if storage.exists(&path).await {
            return Self::load(storage, path).await;
        }

        let store = Self {
            storage,
            delimiter: delimiter_for(&path),
            table: Table::with_columns(output_columns(input_columns)),
            index: HashSet::new(),
            path,
        };
        store.persist().await?;
        tracing::info!("Created new output {}", store.path);
        Ok(store)
    }

    async fn load(storage: S, path: String) -> Result<Self> {
        let delimiter = delimiter_for(&path);
        let data = storage.read_file(&path).await?;
        let mut table = Table::parse(&data, delimiter)?;
        table.require_columns(&path, &[CITY_COLUMN, COUNTRY_COLUMN])?;

        // Older outputs may predate some enrichment columns.
        for column in ENRICHMENT_COLUMNS {
            if !table.columns.iter().any(|c| c == column) {
                tracing::warn!("Output {} has no '{}' column, adding it", path, column);
                table.columns.push(column.to_string());
                for row in &mut table.rows {
                    row.insert(column.to_string(), String::new());
                }
            }
        }

        let index = table.keys();
        tracing::info!("Found existing output {} with {} enriched rows", path, table.len());
        Ok(Self {
            storage,
            path,
            delimiter,
            table,
            index,
        })
    }

    pub fn contains(&self, key: &CityKey) -> bool {
        self.index.contains(key)
    }

    pub fn keys(&self) -> &HashSet<CityKey> {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.table.columns
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Appends in the table's column order and rewrites the file. On a failed
    /// write the row is taken back out, so memory never runs ahead of disk.
    pub async fn append_and_persist(&mut self, mut record: CityRecord) -> Result<()> {
        let row: CityRecord = self
            .table
            .columns
            .iter()
            .map(|column| {
                let value = record.shift_remove(column).unwrap_or_default();
                (column.clone(), value)
            })
            .collect();

        if !record.is_empty() {
            let dropped: Vec<&String> = record.keys().collect();
            tracing::warn!("Dropping columns unknown to {}: {:?}", self.path, dropped);
        }

        let key = CityKey::from_record(&row);
        self.table.rows.push(row);

        if let Err(e) = self.persist().await {
            self.table.rows.pop();
            return Err(e);
        }

        self.index.insert(key);
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let data = self.table.to_bytes(self.delimiter)?;
        self.storage.write_file(&self.path, &data).await?;
        tracing::debug!("Wrote {} rows ({} bytes) to {}", self.table.len(), data.len(), self.path);
        Ok(())
    }
}

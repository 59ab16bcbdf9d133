pub mod dataset;
pub mod enricher;
pub mod etl;
pub mod images;

pub use crate::domain::model::{CityKey, CityRecord, RunSummary};
pub use crate::domain::ports::{ConfigProvider, DescriptionSource, ImageSearch, Storage};
pub use crate::utils::error::Result;

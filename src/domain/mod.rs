// Domain layer: city records, enrichment fields and the ports the pipeline depends on.

pub mod model;
pub mod ports;

// Adapters layer: concrete implementations of the domain ports (row sources, persistence).

pub mod csv_rows;
pub mod snapshot;

pub use csv_rows::CsvRowSource;
pub use snapshot::SnapshotRepository;

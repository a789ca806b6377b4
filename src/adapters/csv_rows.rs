use crate::domain::model::{Cell, RosterRow};
use crate::domain::ports::RowSource;
use crate::utils::error::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads an exported roster sheet. Every cell arrives as text; dates and
/// numbers are interpreted later by the ingestor.
pub struct CsvRowSource<R: Read> {
    reader: csv::Reader<R>,
}

impl CsvRowSource<File> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;
        Ok(Self { reader })
    }
}

impl<R: Read> CsvRowSource<R> {
    pub fn from_reader(input: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input);
        Self { reader }
    }
}

impl<R: Read> RowSource for CsvRowSource<R> {
    fn rows(&mut self) -> Result<Vec<RosterRow>> {
        let headers = self.reader.headers()?.clone();
        let mut rows = Vec::new();

        for record in self.reader.records() {
            let record = record?;
            let row = RosterRow::from_pairs(headers.iter().zip(record.iter()).map(|(header, value)| {
                let cell = if value.is_empty() { Cell::Empty } else { Cell::from(value) };
                (header, cell)
            }));
            rows.push(row);
        }

        tracing::debug!("Read {} rows with {} columns", rows.len(), headers.len());
        Ok(rows)
    }
}

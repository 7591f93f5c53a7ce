//! Flat-file bar data adapter: one `<CODE>.csv` per instrument with columns
//! `date,open,high,low,close,volume`.
//!
//! Rows are returned in file order. Ordering and price sanity are checked by
//! `BarSeries::validate` when the run starts, so corrupt files surface as
//! data-integrity errors rather than being silently repaired here.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn field<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    file: &str,
) -> Result<T, BacktestError>
where
    T::Err: std::fmt::Display,
{
    let line = record.position().map_or(0, |p| p.line());
    let raw = record.get(index).ok_or_else(|| BacktestError::DataFormat {
        file: file.to_string(),
        line,
        reason: format!("missing {} column", name),
    })?;
    raw.trim().parse().map_err(|e| BacktestError::DataFormat {
        file: file.to_string(),
        line,
        reason: format!("invalid {} value {:?}: {}", name, raw, e),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, BacktestError> {
        let path = self.csv_path(code);
        let file = path.display().to_string();
        let content = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => BacktestError::NoData {
                code: code.to_string(),
            },
            _ => BacktestError::Io(e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| BacktestError::DataFormat {
                file: file.clone(),
                line: e.position().map_or(0, |p| p.line()),
                reason: e.to_string(),
            })?;

            let date_str: String = field(&record, 0, "date", &file)?;
            let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                BacktestError::DataFormat {
                    file: file.clone(),
                    line: record.position().map_or(0, |p| p.line()),
                    reason: format!("invalid date {:?}: {}", date_str, e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                date,
                open: field(&record, 1, "open", &file)?,
                high: field(&record, 2, "high", &file)?,
                low: field(&record, 3, "low", &file)?,
                close: field(&record, 4, "close", &file)?,
                volume: field(&record, 5, "volume", &file)?,
            });
        }

        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                symbols.push(stem.to_string());
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

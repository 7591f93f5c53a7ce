//! Bar data access port.

use crate::domain::error::BacktestError;
use crate::domain::ohlcv::{BarSeries, OhlcvBar};
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `code` with `start_date <= date <= end_date`, in stored order.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, BacktestError>;

    fn list_symbols(&self) -> Result<Vec<String>, BacktestError>;

    /// One series per code, in the order given.
    fn fetch_universe(
        &self,
        codes: &[String],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<BarSeries>, BacktestError> {
        codes
            .iter()
            .map(|code| {
                let bars = self.fetch_ohlcv(code, start_date, end_date)?;
                Ok(BarSeries::new(code.clone(), bars))
            })
            .collect()
    }
}

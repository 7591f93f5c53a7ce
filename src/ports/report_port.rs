//! Report output port. The simulator core never formats or writes results
//! itself; renderers live behind this trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::comparison::ComparisonRow;
use crate::domain::error::BacktestError;
use std::path::Path;

pub trait ReportPort {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), BacktestError>;

    fn write_comparison(
        &self,
        rows: &[ComparisonRow],
        output_dir: &Path,
    ) -> Result<(), BacktestError>;
}

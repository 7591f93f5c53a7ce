//! CSV report adapter implementing ReportPort.
//!
//! A single run produces `trades.csv`, `equity.csv` and `metrics.csv` in the
//! output directory; comparison and sweep tables go to `comparison.csv`.

use std::fs;
use std::path::Path;

use crate::domain::backtest::BacktestResult;
use crate::domain::comparison::ComparisonRow;
use crate::domain::error::BacktestError;
use crate::domain::ledger::Trade;
use crate::domain::metrics::{EquityPoint, Metrics};
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const METRICS_FILE: &str = "metrics.csv";
pub const COMPARISON_FILE: &str = "comparison.csv";

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

fn writer(path: &Path) -> Result<csv::Writer<fs::File>, BacktestError> {
    csv::Writer::from_path(path).map_err(|e| BacktestError::Io(e.into()))
}

fn csv_err(e: csv::Error) -> BacktestError {
    BacktestError::Io(e.into())
}

fn write_trades(trades: &[Trade], path: &Path) -> Result<(), BacktestError> {
    let mut wtr = writer(path)?;
    wtr.write_record([
        "code",
        "entry_date",
        "exit_date",
        "size",
        "entry_price",
        "exit_price",
        "gross_pnl",
        "commission",
        "net_pnl",
    ])
    .map_err(csv_err)?;

    for t in trades {
        wtr.write_record([
            t.code.clone(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            t.size.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.commission),
            format!("{:.2}", t.net_pnl),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_equity(curve: &[EquityPoint], path: &Path) -> Result<(), BacktestError> {
    let mut wtr = writer(path)?;
    wtr.write_record(["date", "equity"]).map_err(csv_err)?;
    for point in curve {
        wtr.write_record([point.date.to_string(), format!("{:.2}", point.equity)])
            .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

fn metric_rows(m: &Metrics) -> Vec<(&'static str, String)> {
    vec![
        ("start_value", format!("{:.2}", m.start_value)),
        ("end_value", format!("{:.2}", m.end_value)),
        ("total_return_pct", format!("{:.4}", m.return_pct())),
        ("total_trades", m.total_trades.to_string()),
        ("winning_trades", m.winning_trades.to_string()),
        ("losing_trades", m.losing_trades.to_string()),
        ("win_rate_pct", format!("{:.2}", m.win_rate_pct())),
        ("avg_win", format!("{:.2}", m.avg_win)),
        ("avg_loss", format!("{:.2}", m.avg_loss)),
        ("largest_win", format!("{:.2}", m.largest_win)),
        ("largest_loss", format!("{:.2}", m.largest_loss)),
        ("profit_factor", format!("{:.4}", m.profit_factor)),
        ("max_drawdown_pct", format!("{:.4}", m.max_drawdown_pct())),
        ("max_drawdown_duration", m.max_drawdown_duration.to_string()),
        ("sharpe_ratio", format!("{:.4}", m.sharpe_ratio)),
        ("avg_trade_duration", format!("{:.2}", m.avg_trade_duration)),
    ]
}

fn write_metrics(strategy: &str, m: &Metrics, path: &Path) -> Result<(), BacktestError> {
    let mut wtr = writer(path)?;
    wtr.write_record(["metric", "value"]).map_err(csv_err)?;
    wtr.write_record(["strategy", strategy]).map_err(csv_err)?;
    for (name, value) in metric_rows(m) {
        wtr.write_record([name, value.as_str()]).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &BacktestResult, output_dir: &Path) -> Result<(), BacktestError> {
        fs::create_dir_all(output_dir)?;
        write_trades(&result.trades, &output_dir.join(TRADES_FILE))?;
        write_equity(&result.equity_curve, &output_dir.join(EQUITY_FILE))?;
        write_metrics(
            &result.strategy_name,
            &result.metrics,
            &output_dir.join(METRICS_FILE),
        )?;
        Ok(())
    }

    fn write_comparison(
        &self,
        rows: &[ComparisonRow],
        output_dir: &Path,
    ) -> Result<(), BacktestError> {
        fs::create_dir_all(output_dir)?;
        let mut wtr = writer(&output_dir.join(COMPARISON_FILE))?;
        wtr.write_record([
            "rank",
            "label",
            "end_value",
            "return_pct",
            "total_trades",
            "win_rate_pct",
            "profit_factor",
            "max_drawdown_pct",
            "sharpe_ratio",
        ])
        .map_err(csv_err)?;

        for (i, row) in rows.iter().enumerate() {
            wtr.write_record([
                (i + 1).to_string(),
                row.label.clone(),
                format!("{:.2}", row.end_value),
                format!("{:.4}", row.return_pct),
                row.total_trades.to_string(),
                format!("{:.2}", row.win_rate_pct),
                format!("{:.4}", row.profit_factor),
                format!("{:.4}", row.max_drawdown_pct),
                format!("{:.4}", row.sharpe_ratio),
            ])
            .map_err(csv_err)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

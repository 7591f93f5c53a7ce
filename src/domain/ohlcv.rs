//! OHLCV bars and per-instrument bar series.
//!
//! A `BarSeries` is dense and time-ordered. Several series replayed together
//! must share one date sequence so the simulator can step them in lockstep.

use crate::domain::error::BacktestError;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
}

impl BarSeries {
    pub fn new(code: impl Into<String>, bars: Vec<OhlcvBar>) -> Self {
        BarSeries {
            code: code.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&OhlcvBar> {
        self.bars.get(index)
    }

    /// Rejects non-positive prices, negative volume and non-increasing dates.
    pub fn validate(&self) -> Result<(), BacktestError> {
        if self.bars.is_empty() {
            return Err(BacktestError::NoData {
                code: self.code.clone(),
            });
        }

        let mut prev_date: Option<NaiveDate> = None;
        for bar in &self.bars {
            if let Some(prev) = prev_date {
                if bar.date <= prev {
                    return Err(self.integrity(bar.date, format!("date not after {}", prev)));
                }
            }
            prev_date = Some(bar.date);

            let prices = [
                ("open", bar.open),
                ("high", bar.high),
                ("low", bar.low),
                ("close", bar.close),
            ];
            for (field, value) in prices {
                if !(value.is_finite() && value > 0.0) {
                    return Err(self.integrity(bar.date, format!("non-positive {field} {value}")));
                }
            }
            if bar.volume < 0 {
                return Err(self.integrity(bar.date, format!("negative volume {}", bar.volume)));
            }
        }
        Ok(())
    }

    fn integrity(&self, date: NaiveDate, reason: String) -> BacktestError {
        BacktestError::DataIntegrity {
            code: self.code.clone(),
            date,
            reason,
        }
    }
}

/// Validates every series and returns the shared date sequence.
///
/// The first series defines the timeline; every other series must carry a bar
/// on exactly the same dates.
pub fn lockstep_timeline(series: &[BarSeries]) -> Result<Vec<NaiveDate>, BacktestError> {
    for s in series {
        s.validate()?;
    }

    let Some(reference) = series.first() else {
        return Ok(Vec::new());
    };
    let timeline: Vec<NaiveDate> = reference.bars.iter().map(|b| b.date).collect();

    for s in &series[1..] {
        for (i, date) in timeline.iter().enumerate() {
            match s.bars.get(i) {
                Some(bar) if bar.date == *date => {}
                Some(bar) => {
                    return Err(BacktestError::DataIntegrity {
                        code: s.code.clone(),
                        date: bar.date,
                        reason: format!("expected bar for {} (gap or misaligned series)", date),
                    });
                }
                None => {
                    return Err(BacktestError::DataIntegrity {
                        code: s.code.clone(),
                        date: *date,
                        reason: "missing bar".into(),
                    });
                }
            }
        }
        if s.bars.len() > timeline.len() {
            let extra = &s.bars[timeline.len()];
            return Err(BacktestError::DataIntegrity {
                code: s.code.clone(),
                date: extra.date,
                reason: format!("bar not present in {}", reference.code),
            });
        }
    }

    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn bar(d: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            date: day(d),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn valid_series_passes() {
        let s = BarSeries::new("SPY", vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)]);
        assert!(s.validate().is_ok());
        assert_eq!(s.len(), 3);
        assert!((s.bar(1).unwrap().close - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_series_is_no_data() {
        let s = BarSeries::new("SPY", vec![]);
        assert!(matches!(s.validate(), Err(BacktestError::NoData { code }) if code == "SPY"));
    }

    #[test]
    fn non_monotonic_dates_rejected() {
        let s = BarSeries::new("SPY", vec![bar(1, 10.0), bar(3, 11.0), bar(2, 12.0)]);
        match s.validate() {
            Err(BacktestError::DataIntegrity { code, date, .. }) => {
                assert_eq!(code, "SPY");
                assert_eq!(date, day(2));
            }
            other => panic!("expected DataIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_dates_rejected() {
        let s = BarSeries::new("SPY", vec![bar(1, 10.0), bar(1, 11.0)]);
        assert!(matches!(
            s.validate(),
            Err(BacktestError::DataIntegrity { .. })
        ));
    }

    #[test]
    fn non_positive_price_rejected() {
        let s = BarSeries::new("SPY", vec![bar(1, 10.0), bar(2, 0.0)]);
        match s.validate() {
            Err(BacktestError::DataIntegrity { date, reason, .. }) => {
                assert_eq!(date, day(2));
                assert!(reason.contains("non-positive"));
            }
            other => panic!("expected DataIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn lockstep_timeline_shared_dates() {
        let a = BarSeries::new("A", vec![bar(1, 10.0), bar(2, 11.0)]);
        let b = BarSeries::new("B", vec![bar(1, 20.0), bar(2, 21.0)]);
        let timeline = lockstep_timeline(&[a, b]).unwrap();
        assert_eq!(timeline, vec![day(1), day(2)]);
    }

    #[test]
    fn lockstep_timeline_detects_gap() {
        let a = BarSeries::new("A", vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.0)]);
        let b = BarSeries::new("B", vec![bar(1, 20.0), bar(3, 21.0)]);
        match lockstep_timeline(&[a, b]) {
            Err(BacktestError::DataIntegrity { code, date, .. }) => {
                assert_eq!(code, "B");
                assert_eq!(date, day(3));
            }
            other => panic!("expected DataIntegrity, got {:?}", other),
        }
    }

    #[test]
    fn lockstep_timeline_detects_short_series() {
        let a = BarSeries::new("A", vec![bar(1, 10.0), bar(2, 11.0)]);
        let b = BarSeries::new("B", vec![bar(1, 20.0)]);
        assert!(matches!(
            lockstep_timeline(&[a, b]),
            Err(BacktestError::DataIntegrity { code, .. }) if code == "B"
        ));
    }

    #[test]
    fn lockstep_timeline_empty_input() {
        assert!(lockstep_timeline(&[]).unwrap().is_empty());
    }
}

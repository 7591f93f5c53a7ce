//! INI file configuration adapter.

use crate::domain::error::BacktestError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BacktestError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config
            .load(path)
            .map_err(|reason| BacktestError::ConfigParse {
                file: path.display().to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, BacktestError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| BacktestError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[backtest]
initial_cash = 50000.0
commission_rate = 0.002
data_dir = ./data

[strategy]
kind = sma_crossover
fast_period = 10
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("./data".to_string())
        );
        assert_eq!(
            adapter.get_string("strategy", "kind"),
            Some("sma_crossover".to_string())
        );
        assert_eq!(adapter.get_double("backtest", "initial_cash", 0.0), 50000.0);
        assert_eq!(adapter.get_int("strategy", "fast_period", 0), 10);
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[backtest]\ninitial_cash = 100\n").unwrap();
        assert_eq!(adapter.get_string("backtest", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn numeric_getters_fall_back_to_default() {
        let adapter =
            FileConfigAdapter::from_string("[strategy]\nfast_period = abc\nsl = x\n").unwrap();
        assert_eq!(adapter.get_int("strategy", "fast_period", 42), 42);
        assert_eq!(adapter.get_int("strategy", "missing", 7), 7);
        assert_eq!(adapter.get_double("strategy", "sl", 0.05), 0.05);
        assert_eq!(adapter.get_double("strategy", "missing", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[strategy]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("strategy", "a", false));
        assert!(adapter.get_bool("strategy", "b", false));
        assert!(adapter.get_bool("strategy", "c", false));
        assert!(!adapter.get_bool("strategy", "d", true));
        assert!(!adapter.get_bool("strategy", "e", true));
        assert!(!adapter.get_bool("strategy", "f", true));
        assert!(adapter.get_bool("strategy", "missing", true));
    }

    #[test]
    fn get_list_splits_and_trims() {
        let adapter = FileConfigAdapter::from_string(
            "[backtest]\ncodes = SPY, QQQ ,,IWM\n\n[sweep]\nfast_periods = 5,10\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_list("backtest", "codes"),
            Some(vec!["SPY".to_string(), "QQQ".to_string(), "IWM".to_string()])
        );
        assert_eq!(
            adapter.get_list("sweep", "fast_periods"),
            Some(vec!["5".to_string(), "10".to_string()])
        );
        assert_eq!(adapter.get_list("sweep", "slow_periods"), None);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[backtest]\ndata_dir = /srv/bars\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("backtest", "data_dir"),
            Some("/srv/bars".to_string())
        );
    }

    #[test]
    fn from_file_missing_is_config_parse_error() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        match result {
            Err(BacktestError::ConfigParse { file, .. }) => {
                assert!(file.ends_with("config.ini"));
            }
            _ => panic!("expected ConfigParse error"),
        }
    }
}

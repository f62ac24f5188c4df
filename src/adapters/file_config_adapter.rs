//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String> {
        self.config.getint(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        self.config.getfloat(section, key)
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
[generator]
fallback_leverage = 2.0
max_nodes = 5000
timeframe = 1h
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("generator", "timeframe"),
            Some("1h".to_string())
        );
        assert_eq!(adapter.get_int("generator", "max_nodes"), Ok(Some(5000)));
        assert_eq!(
            adapter.get_double("generator", "fallback_leverage"),
            Ok(Some(2.0))
        );
    }

    #[test]
    fn missing_keys_are_none() {
        let adapter = FileConfigAdapter::from_string("[generator]\nmax_depth = 32\n").unwrap();
        assert_eq!(adapter.get_string("generator", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("generator", "missing"), Ok(None));
        assert_eq!(adapter.get_double("missing_section", "key"), Ok(None));
    }

    #[test]
    fn non_numeric_values_are_errors() {
        let adapter =
            FileConfigAdapter::from_string("[generator]\nmax_depth = deep\nstoploss = lots\n")
                .unwrap();
        assert!(adapter.get_int("generator", "max_depth").is_err());
        assert!(adapter.get_double("generator", "stoploss").is_err());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[generator]\nstoploss = -0.05\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(adapter.get_double("generator", "stoploss"), Ok(Some(-0.05)));
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}

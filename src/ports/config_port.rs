//! Configuration access port trait.
//!
//! Lookups return `Ok(None)` for a missing section or key and `Err` with the parser's
//! message when a value is present but not of the requested type.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String>;
    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String>;
}

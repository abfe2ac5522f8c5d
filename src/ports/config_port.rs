//! Configuration access port trait.
//!
//! Getters with a default fall back to it when the key is absent or does not
//! parse; validation reads the raw string where that matters.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
}

//! Process-level configuration, distinct from tenant-scoped rule data.
//!
//! Tenant matching tolerances (price/quantity/date bands, thresholds) are
//! domain data resolved by `reconap-rules`; this module only covers the
//! engineering knobs that are the same for every tenant on a given process,
//! following the teacher's `JobExecutorConfig` idiom (typed struct + env
//! overrides + `Default`).

use std::env;
use std::time::Duration;

/// Process-wide engine configuration, overridable via environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Rows per CSV ingestion window (spec.md §4.3: "recommended 500").
    pub csv_window_size: usize,
    /// Fraction of rows in a batch that may fail validation before the whole
    /// import is aborted (spec.md §4.3, default 10%).
    pub csv_abort_on_error_rate: f64,
    /// Maximum file size accepted for CSV ingestion, in bytes (spec.md §4.3).
    pub csv_max_file_bytes: u64,
    /// Default worker-pool width for batch matching (spec.md §4.4.6).
    pub match_default_parallelism: usize,
    /// Default currency assumed when a CSV row omits one.
    pub default_currency: String,
    /// Default locale used to disambiguate `MM/DD/YYYY` vs `DD/MM/YYYY`.
    pub default_date_locale: DateLocale,
    /// TTL for the process-local resolved rule-set cache (spec.md §4.5).
    pub rule_cache_ttl: Duration,
    /// Minimum retention for idempotency records (spec.md §4.2).
    pub idempotency_ttl: Duration,
}

/// Which locale governs ambiguous `NN/NN/YYYY` date parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLocale {
    Us,
    Eu,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            csv_window_size: 500,
            csv_abort_on_error_rate: 0.10,
            csv_max_file_bytes: 50 * 1024 * 1024,
            match_default_parallelism: 4,
            default_currency: "USD".to_string(),
            default_date_locale: DateLocale::Us,
            rule_cache_ttl: Duration::from_secs(60),
            idempotency_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    /// Load overrides from the process environment, falling back to
    /// [`Default`] for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_usize("RECONAP_CSV_WINDOW_SIZE") {
            cfg.csv_window_size = v;
        }
        if let Some(v) = env_f64("RECONAP_CSV_ABORT_ON_ERROR_RATE") {
            cfg.csv_abort_on_error_rate = v;
        }
        if let Some(v) = env_u64("RECONAP_CSV_MAX_FILE_BYTES") {
            cfg.csv_max_file_bytes = v;
        }
        if let Some(v) = env_usize("RECONAP_MATCH_PARALLELISM") {
            cfg.match_default_parallelism = v;
        }
        if let Ok(v) = env::var("RECONAP_DEFAULT_CURRENCY") {
            cfg.default_currency = v.to_uppercase();
        }
        if let Ok(v) = env::var("RECONAP_DEFAULT_DATE_LOCALE") {
            cfg.default_date_locale = match v.to_lowercase().as_str() {
                "eu" => DateLocale::Eu,
                _ => DateLocale::Us,
            };
        }
        if let Some(v) = env_u64("RECONAP_RULE_CACHE_TTL_SECS") {
            cfg.rule_cache_ttl = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("RECONAP_IDEMPOTENCY_TTL_SECS") {
            cfg.idempotency_ttl = Duration::from_secs(v);
        }

        cfg
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.csv_window_size, 500);
        assert_eq!(cfg.csv_abort_on_error_rate, 0.10);
        assert_eq!(cfg.match_default_parallelism, 4);
    }
}

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::platform::UpdateMode;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_usize(profile: &str, key: &str, default: usize) -> usize {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub platform: PlatformConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RECALC_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RECALC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            platform: PlatformConfig::from_env_profiled(p),
            run: RunConfig::from_env_profiled(p),
            logging: LoggingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  platform:    fixture={}", self.platform.fixture.display());
        tracing::info!(
            "  run:         max_events={}, include_start={}, include_end={}, update_mode={:?}",
            self.run.max_events,
            self.run.include_start,
            self.run.include_end,
            self.run.update_mode
        );
        tracing::info!("  logging:     level={}, format={}", self.logging.level, self.logging.format);
    }
}

// ── Platform ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// YAML fixture backing the in-memory platform.
    pub fixture: PathBuf,
}

impl PlatformConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            fixture: PathBuf::from(profiled_env_or(p, "RECALC_FIXTURE", "data/platform.yml")),
        }
    }
}

// ── Run ───────────────────────────────────────────────────────

/// Knobs for one recalculation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Upper bound on events a single run may produce, periodic or natural.
    pub max_events: usize,
    /// Natural events exactly at the range start are kept.
    pub include_start: bool,
    /// Natural events exactly at the range end are kept.
    pub include_end: bool,
    pub update_mode: UpdateMode,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            include_start: true,
            include_end: true,
            update_mode: UpdateMode::Replace,
        }
    }
}

impl RunConfig {
    fn from_env_profiled(p: &str) -> Self {
        let defaults = Self::default();
        let update_mode = match profiled_env_opt(p, "RECALC_UPDATE_MODE") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Unknown update mode, defaulting to replace");
                UpdateMode::Replace
            }),
            None => defaults.update_mode,
        };
        Self {
            max_events: profiled_env_usize(p, "RECALC_MAX_EVENTS", defaults.max_events),
            include_start: profiled_env_bool(p, "RECALC_INCLUDE_START", defaults.include_start),
            include_end: profiled_env_bool(p, "RECALC_INCLUDE_END", defaults.include_end),
            update_mode,
        }
    }
}

// ── Logging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset.
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl LoggingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            level: profiled_env_or(p, "RECALC_LOG_LEVEL", "info"),
            format: profiled_env_or(p, "RECALC_LOG_FORMAT", "text"),
        }
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

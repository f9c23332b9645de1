//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`BeaconSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Decode each top-level section on its own
//! 4. Apply `BEACON_*` environment overrides (highest priority)
//! 5. Reset values the server cannot run with
//!
//! A problem at any step costs only its own scope: an unreadable file drops
//! the file layer, a malformed section falls back to that section's
//! defaults, and an invalid value falls back to that value's default. The
//! environment layer always applies.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::BeaconSettings;

/// Resolve the default settings file (`~/.beacon/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".beacon").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<BeaconSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Any problem found along the way is an
/// error.
pub fn load_settings_from_path(path: &Path) -> Result<BeaconSettings> {
    let (settings, problems) = load_settings_lenient(path);
    match problems.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(settings),
    }
}

/// Load settings from `path`, recovering from every problem it can.
///
/// Returns the usable settings together with what had to be discarded.
pub fn load_settings_lenient(path: &Path) -> (BeaconSettings, Vec<SettingsError>) {
    load_settings_with(path, |name| std::env::var(name).ok())
}

/// [`load_settings_lenient`] with an arbitrary env lookup.
pub fn load_settings_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> (BeaconSettings, Vec<SettingsError>) {
    let mut problems = Vec::new();
    let defaults = serde_json::to_value(BeaconSettings::default()).unwrap_or_default();
    let merged = match read_file_layer(path) {
        Ok(Some(user)) => deep_merge(defaults, user),
        Ok(None) => defaults,
        Err(err) => {
            problems.push(err);
            defaults
        }
    };

    let mut settings = BeaconSettings {
        server: section(&merged, "server", &mut problems),
        presence: section(&merged, "presence", &mut problems),
        logging: section(&merged, "logging", &mut problems),
    };
    apply_overrides_from(&mut settings, lookup);
    problems.extend(settings.sanitize());
    (settings, problems)
}

fn read_file_layer(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return Ok(None);
    }
    debug!(?path, "loading settings from file");
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    if !user.is_object() {
        return Err(SettingsError::NotAnObject {
            path: path.to_path_buf(),
        });
    }
    Ok(Some(user))
}

fn section<T: DeserializeOwned + Default>(
    merged: &Value,
    name: &'static str,
    problems: &mut Vec<SettingsError>,
) -> T {
    let Some(value) = merged.get(name) else {
        return T::default();
    };
    T::deserialize(value).unwrap_or_else(|source| {
        problems.push(SettingsError::Section {
            section: name,
            source,
        });
        T::default()
    })
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `BEACON_*` overrides from the process environment.
pub fn apply_env_overrides(settings: &mut BeaconSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply `BEACON_*` overrides from an arbitrary lookup.
///
/// Invalid values are logged and ignored (the file/default value stays).
pub fn apply_overrides_from(
    settings: &mut BeaconSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("BEACON_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env
        .u64_in("BEACON_PORT", 0, u64::from(u16::MAX))
        .and_then(|v| u16::try_from(v).ok())
    {
        settings.server.port = v;
    }
    if let Some(v) = env.string("BEACON_WS_PATH") {
        settings.server.ws_path = v;
    }

    // ── Presence ────────────────────────────────────────────────────
    if let Some(v) = env.u64_in("BEACON_BROADCAST_INTERVAL_MS", 10, 600_000) {
        settings.presence.broadcast_interval_ms = v;
    }
    if let Some(v) = env.u64_in("BEACON_PRESENCE_TTL_MS", 100, 86_400_000) {
        settings.presence.presence_ttl_ms = v;
    }
    if let Some(v) = env.u64_in("BEACON_MAX_SEND_DROPS", 1, 1_000_000) {
        settings.presence.max_send_drops = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("BEACON_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("BEACON_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u64` within an inclusive range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.string(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64_in(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = self.string(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid integer env var, ignoring");
        }
        result
    }
}

//! Process-wide options store.
//!
//! Options are read once from a `key: value` text file at startup and cached
//! for the lifetime of the process. Lines starting with `#` (or trailing
//! `#` comments) are ignored. Values decode on demand as integer, float or
//! string; a missing or undecodable value falls back to the caller's default
//! with a warning, so a broken config file never takes the loop down.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read options from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid option at {path}:{line}")]
    Malformed { path: String, line: usize },
}

fn values() -> &'static Mutex<BTreeMap<String, String>> {
    static VALUES: OnceLock<Mutex<BTreeMap<String, String>>> = OnceLock::new();
    VALUES.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Load options from a file, merging over any values already set.
pub fn load(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let mut map = values().lock().unwrap();

    for (idx, raw) in text.lines().enumerate() {
        let line = match raw.find('#') {
            Some(p) => &raw[..p],
            None => raw,
        };

        let Some(p) = line.find(':') else {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ConfigError::Malformed {
                path: path.display().to_string(),
                line: idx + 1,
            });
        };

        let key = line[..p].trim();
        let val = line[p + 1..].trim();

        if key.is_empty() || val.is_empty() {
            return Err(ConfigError::Malformed {
                path: path.display().to_string(),
                line: idx + 1,
            });
        }

        map.insert(key.to_string(), val.to_string());
    }

    Ok(())
}

/// Write the current option set back out in loadable form.
pub fn write(path: impl AsRef<Path>) -> std::io::Result<()> {
    let map = values().lock().unwrap();
    let mut out = String::new();

    for (k, v) in map.iter() {
        let _ = writeln!(out, "{}: {}", k, v);
    }

    std::fs::write(path, out)
}

/// Dump the current option set to the log.
pub fn print() {
    let map = values().lock().unwrap();
    for (k, v) in map.iter() {
        log::info!("{}: {}", k, v);
    }
}

pub fn set_str(key: &str, value: &str) {
    values()
        .lock()
        .unwrap()
        .insert(key.to_string(), value.to_string());
}

pub fn set_int(key: &str, value: i64) {
    set_str(key, &value.to_string());
}

pub fn set_float(key: &str, value: f32) {
    set_str(key, &value.to_string());
}

pub fn get_str(key: &str, def: &str) -> String {
    values()
        .lock()
        .unwrap()
        .get(key)
        .cloned()
        .unwrap_or_else(|| def.to_string())
}

pub fn get_int(key: &str, def: i64) -> i64 {
    match values().lock().unwrap().get(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            log::warn!("option {} = {:?} is not an integer, using {}", key, v, def);
            def
        }),
        None => def,
    }
}

pub fn get_float(key: &str, def: f32) -> f32 {
    match values().lock().unwrap().get(key) {
        Some(v) => v.parse().unwrap_or_else(|_| {
            log::warn!("option {} = {:?} is not a float, using {}", key, v, def);
            def
        }),
        None => def,
    }
}

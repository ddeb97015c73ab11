//! Ordered encoder options handed to the downstream encode session

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Key that accumulates raw vendor parameters
pub const QSV_PARAMS_KEY: &str = "qsv_params";

/// Ordered key/value options
///
/// Setting an existing key replaces its value in place. Raw vendor
/// parameters are collected under [`QSV_PARAMS_KEY`] as `KEY=VALUE` pairs
/// joined by `:`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideChannelOptions {
    entries: Vec<(String, String)>,
}

impl SideChannelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Append a raw vendor parameter; zero means "driver default" and is skipped
    pub fn append_param(&mut self, key: &str, value: u32) {
        if value == 0 {
            return;
        }
        let pair = format!("{key}={value}");
        match self.entries.iter_mut().find(|(k, _)| k == QSV_PARAMS_KEY) {
            Some((_, params)) => {
                params.push(':');
                params.push_str(&pair);
            }
            None => self.entries.push((QSV_PARAMS_KEY.to_string(), pair)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of one raw vendor parameter inside `qsv_params`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.get(QSV_PARAMS_KEY)?
            .split(':')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for SideChannelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

impl Serialize for SideChannelOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

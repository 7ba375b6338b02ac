//! Reader option sets.
//!
//! Options are an open string-keyed map so unknown keys survive the trip
//! from the caller through the registry to the plugin that understands
//! them. The keys the built-in plugins recognise have typed accessors.

use std::collections::BTreeMap;

/// Playback rate used when the source carries no intrinsic rate
/// (e.g. an image sequence).
pub const DEFAULT_SPEED: &str = "SequenceIO/DefaultSpeed";

/// Number of decode worker threads per reader.
pub const THREAD_COUNT: &str = "SequenceIO/ThreadCount";

/// A single option value.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Float(f64),
    Int(u32),
    Text(String),
}

impl OptionValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Int(value) => Some(*value as f64),
            Self::Text(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<u32> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// An ordered option map forwarded to reader plugins.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Options {
    entries: BTreeMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: OptionValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: OptionValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set_default_speed(&mut self, rate: f64) {
        self.set(DEFAULT_SPEED, OptionValue::Float(rate));
    }

    pub fn default_speed(&self) -> Option<f64> {
        self.get(DEFAULT_SPEED).and_then(OptionValue::as_float)
    }

    pub fn set_thread_count(&mut self, count: u32) {
        self.set(THREAD_COUNT, OptionValue::Int(count));
    }

    pub fn thread_count(&self) -> Option<u32> {
        self.get(THREAD_COUNT).and_then(OptionValue::as_int)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let mut options = Options::new();
        options.set_default_speed(24.0);
        options.set_thread_count(4);
        assert_eq!(options.default_speed(), Some(24.0));
        assert_eq!(options.thread_count(), Some(4));
    }

    #[test]
    fn unknown_keys_are_preserved() {
        let options = Options::new().with("Vendor/Custom", OptionValue::Text("x".into()));
        assert_eq!(
            options.get("Vendor/Custom"),
            Some(&OptionValue::Text("x".into()))
        );
        assert_eq!(options.iter().count(), 1);
    }

    #[test]
    fn missing_keys_are_none() {
        let options = Options::new();
        assert_eq!(options.default_speed(), None);
        assert_eq!(options.thread_count(), None);
    }
}

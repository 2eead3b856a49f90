//! Dedup tables scoped to one top-level encode or decode call
//!
//! Object memory is keyed by identity: every composite is written or read in
//! full once, and each later occurrence becomes an index into this table.
//! String memory is keyed by value and only holds strings longer than one
//! character.

use std::collections::HashMap;

use crate::value::Value;

/// Object and string dedup tables
#[derive(Clone, Default)]
pub struct Memory {
    objects: Vec<Value>,
    object_index: HashMap<usize, usize>,
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
}

/// Thread-safe snapshot of string memory, cloned into every call of a
/// compiled codec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Seed {
    strings: Vec<String>,
    string_index: HashMap<String, usize>,
}

impl Memory {
    /// Empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables pre-filled with a seed's strings
    pub fn from_seed(seed: &Seed) -> Self {
        Self {
            strings: seed.strings.clone(),
            string_index: seed.string_index.clone(),
            ..Self::default()
        }
    }

    /// Snapshot the string table
    pub fn seed(&self) -> Seed {
        Seed {
            strings: self.strings.clone(),
            string_index: self.string_index.clone(),
        }
    }

    /// Index of a composite seen earlier in this call; records it and
    /// returns `None` on first sight
    pub fn remember_object(&mut self, value: &Value) -> Option<usize> {
        let id = value.identity()?;
        if let Some(&index) = self.object_index.get(&id) {
            return Some(index);
        }
        self.object_index.insert(id, self.objects.len());
        self.objects.push(value.clone());
        None
    }

    /// Record a freshly decoded composite
    pub fn push_object(&mut self, value: Value) -> usize {
        self.objects.push(value);
        self.objects.len() - 1
    }

    /// Composite by memory index
    pub fn object(&self, index: usize) -> Option<&Value> {
        self.objects.get(index)
    }

    /// Index of a string written earlier in this call; records it and
    /// returns `None` on first sight
    pub fn remember_string(&mut self, s: &str) -> Option<usize> {
        if let Some(&index) = self.string_index.get(s) {
            return Some(index);
        }
        self.string_index.insert(s.to_owned(), self.strings.len());
        self.strings.push(s.to_owned());
        None
    }

    /// Record a freshly decoded string
    pub fn push_string(&mut self, s: String) {
        self.strings.push(s);
    }

    /// String by memory index
    pub fn string(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(String::as_str)
    }

    /// Number of composites recorded
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of strings recorded
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// Forget everything
    pub fn reset(&mut self) {
        self.objects.clear();
        self.object_index.clear();
        self.strings.clear();
        self.string_index.clear();
    }
}

/// True for strings eligible for string memory
///
/// Length is counted in Unicode scalar values, so any single character,
/// including one outside the Basic Multilingual Plane such as "😀", is
/// always written literally.
#[inline]
pub(crate) fn is_memorable(s: &str) -> bool {
    s.chars().nth(1).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objects_by_identity() {
        let mut memory = Memory::new();
        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1))]);

        assert_eq!(memory.remember_object(&a), None);
        assert_eq!(memory.remember_object(&b), None);
        assert_eq!(memory.remember_object(&a.clone()), Some(0));
        assert_eq!(memory.remember_object(&b), Some(1));
        assert_eq!(memory.remember_object(&Value::from(1)), None);
        assert_eq!(memory.object_count(), 2);
    }

    #[test]
    fn test_strings_by_value_and_seed() {
        let mut memory = Memory::new();
        assert_eq!(memory.remember_string("abc"), None);
        assert_eq!(memory.remember_string(&String::from("abc")), Some(0));

        let seeded = Memory::from_seed(&memory.seed());
        assert_eq!(seeded.string(0), Some("abc"));
        assert_eq!(seeded.object_count(), 0);
    }

    #[test]
    fn test_memorable_counts_characters() {
        assert!(!is_memorable(""));
        assert!(!is_memorable("a"));
        assert!(!is_memorable("é"));
        assert!(!is_memorable("😀"));
        assert!(is_memorable("ab"));
        assert!(is_memorable("😀😀"));
    }
}

//! Sink for auxiliary files produced during conversion.
//!
//! Sub-converters occasionally produce content that does not belong in
//! the LaTeX stream itself (extracted listings, generated includes).
//! The store collects those as named byte buffers for the caller to
//! write out.

use std::collections::BTreeMap;

/// A collection of named files emitted alongside the converted LaTeX.
///
/// Names are unique; writing the same name twice keeps the last write.
#[derive(Debug, Clone, Default)]
pub struct ArtifactStore {
    files: BTreeMap<String, Vec<u8>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a file under `name`, replacing any earlier file of that name.
    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|data| data.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterates files in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<u8>> {
        self.files
    }
}

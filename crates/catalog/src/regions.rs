use std::collections::BTreeMap;

/// Maps a human-readable region name to the backend's `Region` field value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RegionDirectory {
    backend_keys: BTreeMap<String, String>,
}

impl RegionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mapping(mut self, name: impl Into<String>, backend_key: impl Into<String>) -> Self {
        self.backend_keys.insert(name.into(), backend_key.into());
        self
    }

    pub(crate) fn insert(&mut self, name: String, backend_key: String) {
        self.backend_keys.insert(name, backend_key);
    }

    /// Unknown names pass through unchanged.
    pub fn backend_key<'a>(&'a self, name: &'a str) -> &'a str {
        self.backend_keys
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.backend_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend_keys.is_empty()
    }
}

use std::collections::HashMap;

/// Translations obtained during one run, keyed by source text. Shared by
/// every catalog processed in the run and dropped when the run ends.
#[derive(Debug, Default)]
pub struct TranslationCache {
    entries: HashMap<String, String>,
}

impl TranslationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, source_text: &str) -> Option<&str> {
        self.entries.get(source_text).map(String::as_str)
    }

    pub fn contains(&self, source_text: &str) -> bool {
        self.entries.contains_key(source_text)
    }

    pub fn insert(&mut self, source_text: String, translation: String) {
        self.entries.insert(source_text, translation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Diagnostics store: the current diagnostics of every linted document.

use std::collections::HashMap;

use flowlint_types::Diagnostic;
use url::Url;

#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    data: HashMap<Url, Vec<Diagnostic>>,
}

impl DiagnosticsStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the document's list wholesale. Empty lists are not stored.
    pub fn replace(&mut self, uri: &Url, items: Vec<Diagnostic>) {
        if items.is_empty() {
            self.data.remove(uri);
        } else {
            self.data.insert(uri.clone(), items);
        }
    }

    /// Drop the document's diagnostics. Returns whether any were stored.
    pub fn remove(&mut self, uri: &Url) -> bool {
        self.data.remove(uri).is_some()
    }

    #[must_use]
    pub fn get(&self, uri: &Url) -> &[Diagnostic] {
        self.data.get(uri).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn count(&self, uri: &Url) -> usize {
        self.data.get(uri).map_or(0, Vec::len)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

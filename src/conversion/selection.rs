//! Set of holder addresses chosen for the next batch

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// Selected holder addresses.
///
/// Iteration order is the lexicographic order of addresses, so every client
/// lists summary lines identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selection {
    addresses: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the address if absent, remove it if present.
    /// Returns whether the address is selected afterwards.
    pub fn toggle(&mut self, address: &str) -> bool {
        if self.addresses.remove(address) {
            false
        } else {
            self.addresses.insert(address.to_string());
            true
        }
    }

    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        self.addresses.insert(address.into())
    }

    pub fn extend<I, S>(&mut self, addresses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.addresses.extend(addresses.into_iter().map(Into::into));
    }

    pub fn clear(&mut self) {
        self.addresses.clear();
    }

    /// Drop every address not in `known`; returns the dropped addresses
    pub fn retain_known(&mut self, known: &HashSet<&str>) -> Vec<String> {
        let stale: Vec<String> = self
            .addresses
            .iter()
            .filter(|a| !known.contains(a.as_str()))
            .cloned()
            .collect();
        for address in &stale {
            self.addresses.remove(address);
        }
        stale
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.addresses.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Selection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut selection = Selection::new();
        selection.extend(iter);
        selection
    }
}

//! Recently recognized formulas, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_HISTORY: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub markup: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryEntry>);

impl History {
    /// Records `markup` at the head of the list.
    ///
    /// Blank markup and exact duplicates of an existing entry are ignored.
    /// Returns whether the list changed.
    pub fn record(&mut self, markup: &str, at: DateTime<Utc>) -> bool {
        let markup = markup.trim();
        if markup.is_empty() || self.0.iter().any(|e| e.markup == markup) {
            return false;
        }
        self.0.insert(
            0,
            HistoryEntry {
                markup: markup.to_string(),
                timestamp: at,
            },
        );
        self.0.truncate(MAX_HISTORY);
        true
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

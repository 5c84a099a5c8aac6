//! Append-only transition history.

use crate::catalog::PhaseId;
use crate::state::{EntityId, ReviewDecision};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionHistoryEntry {
    /// Unique entry id.
    pub id: Uuid,

    /// Entity the transition belongs to.
    pub parent_entity_id: EntityId,

    /// Phase that was left; absent only for imported initial entries.
    pub from_phase_id: Option<PhaseId>,

    /// Phase that was entered.
    pub to_phase_id: PhaseId,

    /// Gate decision of the phase that was left, when it was gated.
    pub decision: Option<ReviewDecision>,

    /// Free-text remarks from the acting user.
    pub comments: Option<String>,

    /// Acting user.
    pub transitioned_by: String,

    /// When the transition was applied.
    pub timestamp: DateTime<Utc>,
}

/// Ordered transition log owned by a parent entity.
///
/// Entries can only be appended; there is no API to remove or reorder them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<TransitionHistoryEntry>,
}

impl History {
    /// Appends an entry.
    pub fn append(&mut self, entry: TransitionHistoryEntry) {
        self.entries.push(entry);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TransitionHistoryEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no transition has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&TransitionHistoryEntry> {
        self.entries.last()
    }

    /// Entries ordered by timestamp, ties kept in insertion order.
    pub fn chronological(&self) -> Vec<TransitionHistoryEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TransitionHistoryEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a TransitionHistoryEntry;
    type IntoIter = std::slice::Iter<'a, TransitionHistoryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(to: &str, at: DateTime<Utc>) -> TransitionHistoryEntry {
        TransitionHistoryEntry {
            id: Uuid::new_v4(),
            parent_entity_id: EntityId::parse("CAPA-7").unwrap(),
            from_phase_id: None,
            to_phase_id: PhaseId::new(to),
            decision: None,
            comments: None,
            transitioned_by: "qa-lead".to_string(),
            timestamp: at,
        }
    }

    #[test]
    fn test_append_preserves_insertion_order() {
        let now = Utc::now();
        let mut history = History::default();
        history.append(entry("A", now));
        history.append(entry("B", now));
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().to_phase_id, "B");
    }

    #[test]
    fn test_chronological_breaks_ties_by_insertion() {
        let now = Utc::now();
        let mut history = History::default();
        history.append(entry("late", now + Duration::seconds(5)));
        history.append(entry("tie-1", now));
        history.append(entry("tie-2", now));

        let ordered: Vec<_> = history
            .chronological()
            .into_iter()
            .map(|e| e.to_phase_id.to_string())
            .collect();
        assert_eq!(ordered, vec!["tie-1", "tie-2", "late"]);
        // Stored order untouched.
        assert_eq!(history.entries()[0].to_phase_id, "late");
    }
}

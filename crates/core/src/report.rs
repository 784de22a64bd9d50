//! Per-call transfer reports

use serde::Serialize;

use crate::events::{Operation, SyncEvent};

/// What happened to a single item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Transferred { size_bytes: u64 },
    Skipped,
    Deleted,
    Failed { cause: String },
}

/// Outcome of one item in an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    /// Local path or remote key the item was read from
    pub source: String,
    /// Remote key, local path or archive entry the item was written to
    pub target: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn transferred(source: impl Into<String>, target: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            status: ItemStatus::Transferred { size_bytes },
        }
    }

    pub fn skipped(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            status: ItemStatus::Skipped,
        }
    }

    pub fn deleted(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            source: key.clone(),
            target: key,
            status: ItemStatus::Deleted,
        }
    }

    pub fn failed(
        source: impl Into<String>,
        target: impl Into<String>,
        cause: impl std::fmt::Display,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            status: ItemStatus::Failed {
                cause: cause.to_string(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ItemStatus::Failed { .. })
    }

    /// The progress event describing this outcome
    pub fn to_event(&self, operation: Operation) -> SyncEvent {
        match &self.status {
            ItemStatus::Transferred { size_bytes } => SyncEvent::ItemTransferred {
                operation,
                source: self.source.clone(),
                target: self.target.clone(),
                size_bytes: *size_bytes,
            },
            ItemStatus::Skipped => SyncEvent::ItemSkipped {
                operation,
                source: self.source.clone(),
                target: self.target.clone(),
            },
            ItemStatus::Deleted => SyncEvent::ItemDeleted {
                key: self.target.clone(),
            },
            ItemStatus::Failed { cause } => SyncEvent::ItemFailed {
                operation,
                source: self.source.clone(),
                target: self.target.clone(),
                cause: cause.clone(),
            },
        }
    }
}

/// All item outcomes of one operation, in completion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub operation: Operation,
    pub items: Vec<ItemOutcome>,
}

impl TransferReport {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            items: Vec::new(),
        }
    }

    fn count(&self, f: impl Fn(&ItemStatus) -> bool) -> usize {
        self.items.iter().filter(|item| f(&item.status)).count()
    }

    pub fn transferred(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Transferred { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Skipped))
    }

    pub fn deleted(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Deleted))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ItemStatus::Failed { .. }))
    }

    /// Outcomes of the items that failed
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.items.iter().filter(|item| item.is_failed())
    }

    /// True when no item failed
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    /// Bytes moved by transferred items
    pub fn total_bytes(&self) -> u64 {
        self.items
            .iter()
            .map(|item| match item.status {
                ItemStatus::Transferred { size_bytes } => size_bytes,
                _ => 0,
            })
            .sum()
    }
}

impl std::fmt::Display for TransferReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.operation {
            Operation::Delete => write!(
                f,
                "{}: {} deleted, {} failed",
                self.operation,
                self.deleted(),
                self.failed()
            ),
            _ => write!(
                f,
                "{}: {} transferred ({}), {} skipped, {} failed",
                self.operation,
                self.transferred(),
                humansize::format_size(self.total_bytes(), humansize::BINARY),
                self.skipped(),
                self.failed()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TransferReport {
        let mut report = TransferReport::new(Operation::Upload);
        report.items.push(ItemOutcome::transferred("/in/a.txt", "a.txt", 1024));
        report.items.push(ItemOutcome::transferred("/in/b.txt", "b.txt", 1024));
        report.items.push(ItemOutcome::skipped("/in/c.txt", "c.txt"));
        report.items.push(ItemOutcome::failed("/in/d.txt", "d.txt", "boom"));
        report
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.transferred(), 2);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.total_bytes(), 2048);
        assert!(!report.is_complete());
        assert_eq!(report.failures().next().unwrap().source, "/in/d.txt");
    }

    #[test]
    fn test_summary() {
        assert_eq!(
            sample().to_string(),
            "upload: 2 transferred (2 KiB), 1 skipped, 1 failed"
        );

        let mut report = TransferReport::new(Operation::Delete);
        report.items.push(ItemOutcome::deleted("a.txt"));
        assert_eq!(report.to_string(), "delete: 1 deleted, 0 failed");
    }

    #[test]
    fn test_outcome_to_event() {
        let event = ItemOutcome::deleted("Folder/File4.txt").to_event(Operation::Delete);
        assert_eq!(
            event,
            SyncEvent::ItemDeleted {
                key: "Folder/File4.txt".into()
            }
        );

        let event = ItemOutcome::failed("k", "/out/k", "boom").to_event(Operation::Download);
        assert!(matches!(event, SyncEvent::ItemFailed { cause, .. } if cause == "boom"));
    }

    #[test]
    fn test_outcome_json_flattens_status() {
        let json = serde_json::to_value(ItemOutcome::skipped("/in/a.txt", "a.txt")).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["target"], "a.txt");
    }
}

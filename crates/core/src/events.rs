//! Progress events emitted by the directory operations
//!
//! Operations report every item through an [`EventSink`] instead of printing.
//! The default [`TracingSink`] turns events into `tracing` records; closures
//! and [`ChannelSink`] hand them to the caller.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// The operation an event or report belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    Download,
    Archive,
    Delete,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Archive => "archive",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed progress event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Upload target already existed, nothing transferred
    ItemSkipped {
        operation: Operation,
        source: String,
        target: String,
    },

    /// An item was copied to its target
    ItemTransferred {
        operation: Operation,
        source: String,
        target: String,
        size_bytes: u64,
    },

    /// A remote object was deleted
    ItemDeleted { key: String },

    /// An item could not be transferred or deleted
    ItemFailed {
        operation: Operation,
        source: String,
        target: String,
        cause: String,
    },

    /// A missing local directory was created
    DirectoryCreated { path: String },
}

/// Receiver of progress events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SyncEvent);
}

impl<F> EventSink for F
where
    F: Fn(SyncEvent) + Send + Sync,
{
    fn emit(&self, event: SyncEvent) {
        self(event)
    }
}

/// Sink that logs events with `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SyncEvent) {
        match event {
            SyncEvent::ItemSkipped {
                operation,
                source,
                target,
            } => {
                tracing::info!(%operation, %source, %target, "Object already exists, skipped");
            }
            SyncEvent::ItemTransferred {
                operation,
                source,
                target,
                size_bytes,
            } => {
                tracing::info!(
                    %operation,
                    %source,
                    %target,
                    size = %humansize::format_size(size_bytes, humansize::BINARY),
                    "Transferred"
                );
            }
            SyncEvent::ItemDeleted { key } => {
                tracing::info!(%key, "Deleted object");
            }
            SyncEvent::ItemFailed {
                operation,
                source,
                target,
                cause,
            } => {
                tracing::warn!(%operation, %source, %target, %cause, "Transfer failed");
            }
            SyncEvent::DirectoryCreated { path } => {
                tracing::info!(%path, "Created missing directory");
            }
        }
    }
}

/// Sink forwarding events into an unbounded channel
///
/// Events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink(UnboundedSender<SyncEvent>);

impl ChannelSink {
    pub fn new(sender: UnboundedSender<SyncEvent>) -> Self {
        Self(sender)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SyncEvent) {
        if self.0.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |event: SyncEvent| seen.lock().unwrap().push(event)
        };

        sink.emit(SyncEvent::ItemDeleted {
            key: "a.txt".into(),
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            SyncEvent::ItemDeleted {
                key: "a.txt".into()
            }
        );
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        sink.emit(SyncEvent::DirectoryCreated {
            path: "/tmp/out/Folder".into(),
        });

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, SyncEvent::DirectoryCreated { .. }));
    }

    #[test]
    fn test_channel_sink_after_receiver_dropped() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelSink::new(tx).emit(SyncEvent::ItemDeleted { key: "x".into() });
    }

    #[test]
    fn test_event_json_shape() {
        let event = SyncEvent::ItemFailed {
            operation: Operation::Download,
            source: "Folder/File4.txt".into(),
            target: "/tmp/out/File4.txt".into(),
            cause: "Network error: reset".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "item_failed");
        assert_eq!(json["operation"], "download");
        assert_eq!(json["cause"], "Network error: reset");
    }
}

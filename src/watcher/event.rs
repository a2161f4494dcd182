//! Change events produced by the event source.

use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use notify::EventKind;
use notify::event::ModifyKind;

/// Kind of filesystem activity observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Write,
    Remove,
    Rename,
    /// Permission or attribute change with no content change.
    Metadata,
}

impl Operation {
    /// Wire name sent in the operation header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "CREATE",
            Operation::Write => "WRITE",
            Operation::Remove => "REMOVE",
            Operation::Rename => "RENAME",
            Operation::Metadata => "CHMOD",
        }
    }

    /// Map a `notify` event kind onto an operation.
    ///
    /// Access notifications and `Other` carry no change and return `None`.
    pub fn from_event_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Operation::Create),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(Operation::Metadata),
            EventKind::Modify(ModifyKind::Name(_)) => Some(Operation::Rename),
            EventKind::Modify(_) | EventKind::Any => Some(Operation::Write),
            EventKind::Remove(_) => Some(Operation::Remove),
            EventKind::Access(_) | EventKind::Other => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub operation: Operation,
    pub observed_at: SystemTime,
}

impl ChangeEvent {
    /// Create an event stamped with the current time.
    pub fn new(path: impl Into<PathBuf>, operation: Operation) -> Self {
        Self {
            path: path.into(),
            operation,
            observed_at: SystemTime::now(),
        }
    }

    /// Expand a `notify` event into one change event per affected path.
    pub fn from_notify(event: &notify::Event) -> Vec<Self> {
        let Some(operation) = Operation::from_event_kind(&event.kind) else {
            return Vec::new();
        };
        let observed_at = SystemTime::now();

        event
            .paths
            .iter()
            .map(|path| Self {
                path: path.clone(),
                operation,
                observed_at,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode};

    #[test]
    fn test_operation_mapping() {
        assert_eq!(
            Operation::from_event_kind(&EventKind::Create(CreateKind::File)),
            Some(Operation::Create)
        );
        assert_eq!(
            Operation::from_event_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(Operation::Write)
        );
        assert_eq!(
            Operation::from_event_kind(&EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            Some(Operation::Metadata)
        );
        assert_eq!(
            Operation::from_event_kind(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(Operation::Rename)
        );
        assert_eq!(
            Operation::from_event_kind(&EventKind::Remove(RemoveKind::File)),
            Some(Operation::Remove)
        );
        assert_eq!(
            Operation::from_event_kind(&EventKind::Access(AccessKind::Any)),
            None
        );
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Operation::Write.to_string(), "WRITE");
        assert_eq!(Operation::Metadata.as_str(), "CHMOD");
    }

    #[test]
    fn test_from_notify_expands_paths() {
        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/tmp/old"))
            .add_path(PathBuf::from("/tmp/new"));

        let events = ChangeEvent::from_notify(&event);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].path, PathBuf::from("/tmp/old"));
        assert_eq!(events[1].path, PathBuf::from("/tmp/new"));
        assert!(events.iter().all(|e| e.operation == Operation::Rename));
    }

    #[test]
    fn test_from_notify_skips_access() {
        let event = notify::Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/tmp/a"));
        assert!(ChangeEvent::from_notify(&event).is_empty());
    }
}

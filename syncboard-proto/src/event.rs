//! Board change notification events.
//!
//! Events are named triggers, not diffs: the payload carried alongside an
//! event is opaque to consumers, and the only correct reaction to any
//! event is "something changed, refetch the board". Delivery through the
//! hub is at-most-once and unordered with respect to the board read path.

use serde::{Deserialize, Serialize};

use crate::board::{BoardId, ParseEnumError};

/// A named board change event published on a board's channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardEvent {
    /// A task was created.
    TaskCreated,
    /// A task was updated (including moves).
    TaskUpdated,
    /// A task was deleted.
    TaskDeleted,
    /// A batch of tasks was generated.
    TasksGenerated,
    /// A sprint was created.
    SprintCreated,
    /// A sprint was updated.
    SprintUpdated,
    /// A sprint was deleted.
    SprintDeleted,
}

impl BoardEvent {
    /// All event kinds.
    pub const ALL: [Self; 7] = [
        Self::TaskCreated,
        Self::TaskUpdated,
        Self::TaskDeleted,
        Self::TasksGenerated,
        Self::SprintCreated,
        Self::SprintUpdated,
        Self::SprintDeleted,
    ];

    /// Returns the wire name of this event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
            Self::TaskDeleted => "task-deleted",
            Self::TasksGenerated => "tasks-generated",
            Self::SprintCreated => "sprint-created",
            Self::SprintUpdated => "sprint-updated",
            Self::SprintDeleted => "sprint-deleted",
        }
    }
}

impl std::fmt::Display for BoardEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BoardEvent {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task-created" => Ok(Self::TaskCreated),
            "task-updated" => Ok(Self::TaskUpdated),
            "task-deleted" => Ok(Self::TaskDeleted),
            "tasks-generated" => Ok(Self::TasksGenerated),
            "sprint-created" => Ok(Self::SprintCreated),
            "sprint-updated" => Ok(Self::SprintUpdated),
            "sprint-deleted" => Ok(Self::SprintDeleted),
            other => Err(ParseEnumError::UnknownEvent(other.to_string())),
        }
    }
}

/// Returns the hub channel name for a board: `board-{id}`.
#[must_use]
pub fn board_channel(board_id: &BoardId) -> String {
    format!("board-{board_id}")
}

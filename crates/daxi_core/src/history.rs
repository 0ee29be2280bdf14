//! Linear undo/redo history of full project snapshots.
//!
//! # Responsibility
//! - Record serialized project snapshots in recency order.
//! - Move a cursor backwards and forwards over recorded snapshots.
//!
//! # Invariants
//! - Snapshots are contiguous, oldest first.
//! - The cursor is `None` exactly when the history is empty; otherwise it
//!   points at the snapshot of the live project state.
//! - Recording after an undo discards every snapshot past the cursor.
//! - Every record appends, even when identical to the current snapshot.

use crate::model::project::Project;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Direction of a history move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Undo,
    Redo,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undo => f.write_str("undo"),
            Self::Redo => f.write_str("redo"),
        }
    }
}

#[derive(Debug)]
pub enum HistoryError {
    /// Cursor is already at the first (undo) or last (redo) snapshot.
    AtBoundary(Direction),
    /// A snapshot could not be encoded or decoded.
    Format(serde_json::Error),
}

impl Display for HistoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AtBoundary(Direction::Undo) => write!(f, "nothing to undo"),
            Self::AtBoundary(Direction::Redo) => write!(f, "nothing to redo"),
            Self::Format(err) => write!(f, "corrupt history snapshot: {err}"),
        }
    }
}

impl Error for HistoryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AtBoundary(_) => None,
            Self::Format(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(value: serde_json::Error) -> Self {
        Self::Format(value)
    }
}

/// Snapshot log with a cursor.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    snapshots: Vec<String>,
    cursor: Option<usize>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot of `project`, dropping any redo branch first.
    pub fn record(&mut self, project: &Project) -> Result<(), HistoryError> {
        let snapshot = serde_json::to_string(project)?;
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        let discarded = self.snapshots.len().saturating_sub(keep);
        self.snapshots.truncate(keep);
        self.snapshots.push(snapshot);
        self.cursor = Some(self.snapshots.len() - 1);
        debug!(
            "event=history_record module=history status=ok len={} discarded={discarded}",
            self.snapshots.len()
        );
        Ok(())
    }

    /// Steps back one snapshot and returns it.
    ///
    /// The cursor does not move when decoding fails.
    pub fn undo(&mut self) -> Result<Project, HistoryError> {
        let index = self.neighbor(Direction::Undo)?;
        self.move_to(index)
    }

    /// Steps forward one snapshot and returns it.
    pub fn redo(&mut self) -> Result<Project, HistoryError> {
        let index = self.neighbor(Direction::Redo)?;
        self.move_to(index)
    }

    /// Decodes the snapshot one step in `direction` without moving the cursor.
    pub fn peek(&self, direction: Direction) -> Result<Project, HistoryError> {
        self.decode(self.neighbor(direction)?)
    }

    /// Clears every snapshot.
    pub fn reset(&mut self) {
        self.snapshots.clear();
        self.cursor = None;
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.neighbor(Direction::Undo).is_ok()
    }

    pub fn can_redo(&self) -> bool {
        self.neighbor(Direction::Redo).is_ok()
    }

    /// Decodes the snapshot under the cursor.
    pub fn current(&self) -> Option<Result<Project, HistoryError>> {
        self.cursor.map(|cursor| self.decode(cursor))
    }

    /// Decodes every snapshot, oldest first.
    pub fn entries(&self) -> Result<Vec<Project>, HistoryError> {
        (0..self.snapshots.len()).map(|index| self.decode(index)).collect()
    }

    fn move_to(&mut self, index: usize) -> Result<Project, HistoryError> {
        let project = self.decode(index)?;
        self.cursor = Some(index);
        Ok(project)
    }

    fn neighbor(&self, direction: Direction) -> Result<usize, HistoryError> {
        match (direction, self.cursor) {
            (Direction::Undo, Some(cursor)) if cursor > 0 => Ok(cursor - 1),
            (Direction::Redo, Some(cursor)) if cursor + 1 < self.snapshots.len() => Ok(cursor + 1),
            _ => Err(HistoryError::AtBoundary(direction)),
        }
    }

    fn decode(&self, index: usize) -> Result<Project, HistoryError> {
        Ok(serde_json::from_str(&self.snapshots[index])?)
    }
}

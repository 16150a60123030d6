//! Render-surface event contract.
//!
//! The surface turns user actions into these events and hands them to the
//! chat loop one at a time; it re-reads store state to redraw afterwards.
//! Events are serializable for future JSON-driven surfaces.

use serde::{Deserialize, Serialize};

use crate::core::session::Selection;

/// User actions captured by the render surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceEvent {
    /// A message was submitted for the current selection.
    Submitted { text: String },

    /// A sidebar entry was picked.
    TopicSelected { selection: Selection },

    /// The clear-all control was used.
    ClearRequested,

    /// The topic list should be shown.
    ListRequested,

    /// The active topic's history should be shown (most recent first).
    HistoryRequested,

    /// End of session.
    Quit,
}

//! In-memory conversation session model.
//!
//! A session groups exchanges into topics. The store owns the topic map,
//! the sidebar display order, and the current selection; everything lives
//! for one process run (no persistence).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The reply half of a turn.
///
/// A turn is recorded with `Pending` before the provider call is issued;
/// `Pending -> Final` is the only permitted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Reply {
    /// Response outstanding.
    Pending,
    /// Response text, or an error line absorbed into the log.
    Final { text: String },
}

impl Reply {
    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Pending)
    }

    /// Returns the final text, if the reply has settled.
    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Pending => None,
            Reply::Final { text } => Some(text),
        }
    }
}

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Verbatim user submission; non-empty when recorded.
    pub user_text: String,
    pub reply: Reply,
}

/// One conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// `topic_<n>`, assigned at creation, never reused within a generation.
    pub id: String,
    /// Display label; may transiently hold the naming placeholder.
    pub title: String,
    /// Append-only, apart from the in-place pending reply update.
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

/// Sidebar selection: the "new conversation" entry or an existing topic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    New,
    Topic { id: String },
}

/// Addresses one turn inside one topic.
///
/// Handles are produced by the store when a pending turn is installed and
/// consumed by [`SessionStore::finalize_turn`], so the later patch targets
/// an explicit index rather than "the last element".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRef {
    topic_id: String,
    index: usize,
}

impl TurnRef {
    pub fn topic_id(&self) -> &str {
        &self.topic_id
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Consistency faults raised by the store.
///
/// These indicate a bug in the caller (stale id, stale handle, violated
/// invariant), not a runtime condition a user can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The topic id is not present in the store.
    UnknownTopic(String),
    /// The topic exists but has no turns (violates the never-empty invariant).
    EmptyTopic(String),
    /// The turn handle points past the end of the topic's turns; only
    /// possible when a handle crosses a `clear_all` generation.
    TurnOutOfRange { topic_id: String, index: usize },
    /// The addressed turn already holds a final reply.
    AlreadyFinalized { topic_id: String, index: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownTopic(id) => write!(f, "unknown topic: {id}"),
            StoreError::EmptyTopic(id) => write!(f, "topic has no turns: {id}"),
            StoreError::TurnOutOfRange { topic_id, index } => {
                write!(f, "turn index {index} out of range for {topic_id}")
            }
            StoreError::AlreadyFinalized { topic_id, index } => {
                write!(f, "turn {topic_id}[{index}] already finalized")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Process-scoped conversation state.
///
/// Invariants:
/// - `topic_order` and `topics` hold exactly the same ids (bijection).
/// - `current` is `New` or a member of `topic_order`.
/// - a topic's `turns` is never empty once created.
/// - ids are never reassigned; `clear_all` starts a fresh generation and
///   restarts the counter at `topic_1`.
#[derive(Debug)]
pub struct SessionStore {
    topics: HashMap<String, Topic>,
    topic_order: Vec<String>,
    current: Selection,
    next_seq: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            topics: HashMap::new(),
            topic_order: Vec::new(),
            current: Selection::New,
            next_seq: 1,
        }
    }

    /// Creates a topic from the first submission of a conversation.
    ///
    /// Installs one pending turn, appends the topic to the display order,
    /// and selects it. The provisional `title` is stored as given; the
    /// de-duplication rule applies to later [`SessionStore::set_title`]
    /// calls, not to creation.
    pub fn create_topic(&mut self, user_text: &str, title: impl Into<String>) -> TurnRef {
        let id = format!("topic_{}", self.next_seq);
        self.next_seq += 1;

        let topic = Topic {
            id: id.clone(),
            title: title.into(),
            turns: vec![Turn {
                user_text: user_text.to_string(),
                reply: Reply::Pending,
            }],
            created_at: Utc::now(),
        };
        self.topics.insert(id.clone(), topic);
        self.topic_order.push(id.clone());
        self.current = Selection::Topic { id: id.clone() };

        TurnRef { topic_id: id, index: 0 }
    }

    /// Appends a pending turn to an existing topic.
    pub fn append_turn(&mut self, topic_id: &str, user_text: &str) -> StoreResult<TurnRef> {
        let topic = self
            .topics
            .get_mut(topic_id)
            .ok_or_else(|| StoreError::UnknownTopic(topic_id.to_string()))?;
        topic.turns.push(Turn {
            user_text: user_text.to_string(),
            reply: Reply::Pending,
        });
        Ok(TurnRef {
            topic_id: topic_id.to_string(),
            index: topic.turns.len() - 1,
        })
    }

    /// Patches the pending reply addressed by `turn` with its final text.
    ///
    /// Re-finalizing is a fault: the pending -> final transition happens at
    /// most once per turn.
    pub fn finalize_turn(&mut self, turn: &TurnRef, text: impl Into<String>) -> StoreResult<()> {
        let topic = self
            .topics
            .get_mut(&turn.topic_id)
            .ok_or_else(|| StoreError::UnknownTopic(turn.topic_id.clone()))?;
        if topic.turns.is_empty() {
            debug_assert!(false, "topic {} exists with no turns", turn.topic_id);
            return Err(StoreError::EmptyTopic(turn.topic_id.clone()));
        }
        let slot = topic
            .turns
            .get_mut(turn.index)
            .ok_or_else(|| StoreError::TurnOutOfRange {
                topic_id: turn.topic_id.clone(),
                index: turn.index,
            })?;
        if !slot.reply.is_pending() {
            return Err(StoreError::AlreadyFinalized {
                topic_id: turn.topic_id.clone(),
                index: turn.index,
            });
        }
        slot.reply = Reply::Final { text: text.into() };
        Ok(())
    }

    /// Overwrites a topic's title, de-duplicating against all other topics.
    ///
    /// If the candidate collides, `_1`, `_2`, ... suffixes are tried until
    /// the title is unique among current titles.
    pub fn set_title(&mut self, topic_id: &str, title: &str) -> StoreResult<()> {
        if !self.topics.contains_key(topic_id) {
            return Err(StoreError::UnknownTopic(topic_id.to_string()));
        }
        let unique = self.dedup_title(topic_id, title);
        if let Some(topic) = self.topics.get_mut(topic_id) {
            topic.title = unique;
        }
        Ok(())
    }

    fn dedup_title(&self, topic_id: &str, candidate: &str) -> String {
        let taken = |t: &str| {
            self.topics
                .values()
                .any(|other| other.id != topic_id && other.title == t)
        };
        if !taken(candidate) {
            return candidate.to_string();
        }
        let mut n = 1usize;
        loop {
            let suffixed = format!("{candidate}_{n}");
            if !taken(&suffixed) {
                return suffixed;
            }
            n += 1;
        }
    }

    /// Changes the current selection.
    ///
    /// The surface only offers valid values, so a failure here is a
    /// contract breach, not a live error path.
    pub fn select(&mut self, selection: Selection) -> StoreResult<()> {
        if let Selection::Topic { id } = &selection
            && !self.topics.contains_key(id)
        {
            return Err(StoreError::UnknownTopic(id.clone()));
        }
        self.current = selection;
        Ok(())
    }

    /// Drops every topic and starts a fresh generation: the next created
    /// topic is `topic_1` again.
    pub fn clear_all(&mut self) {
        self.topics.clear();
        self.topic_order.clear();
        self.current = Selection::New;
        self.next_seq = 1;
    }

    pub fn current(&self) -> &Selection {
        &self.current
    }

    /// The selected topic, if the selection is not `New`.
    pub fn current_topic(&self) -> Option<&Topic> {
        match &self.current {
            Selection::New => None,
            Selection::Topic { id } => self.topics.get(id),
        }
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.get(id)
    }

    /// Topics in sidebar/display order.
    pub fn topics_in_order(&self) -> impl Iterator<Item = &Topic> {
        self.topic_order.iter().filter_map(|id| self.topics.get(id))
    }

    pub fn len(&self) -> usize {
        self.topic_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topic_order.is_empty()
    }
}

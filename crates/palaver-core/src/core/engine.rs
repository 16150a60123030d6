//! Turn execution flow over the session store.
//!
//! Submission is an explicit two-phase write: `begin_submission` validates
//! the input and installs the pending turn, `resolve` awaits the provider
//! and patches the turn in place. The surface renders between the phases,
//! which is what makes the pending state visible without a background task.

use crate::config::TitlePolicy;
use crate::core::session::{Selection, SessionStore, StoreResult, TurnRef};
use crate::core::title;
use crate::providers::{CompletionProvider, ProviderError};

/// Outcome of the validation phase.
#[derive(Debug)]
pub enum Submission {
    /// Rejected at the boundary; nothing was recorded.
    Rejected(Rejected),
    /// Pending turn installed; pass to [`Engine::resolve`].
    Pending(PendingSubmission),
}

/// Boundary conditions, not store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Empty or whitespace-only input.
    Empty,
    /// Input longer than the configured ceiling.
    TooLong { limit: usize },
}

/// A submission whose pending turn is installed but not yet resolved.
#[derive(Debug)]
pub struct PendingSubmission {
    turn: TurnRef,
    user_text: String,
    names_topic: bool,
}

impl PendingSubmission {
    pub fn topic_id(&self) -> &str {
        self.turn.topic_id()
    }
}

/// How the provider round-trip ended. Either way the turn is finalized and
/// the conversation continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Answered,
    ProviderFailed,
}

/// Binds the session store to the completion provider(s).
///
/// `answerer` handles the conversation; `titler` is the summarizer used by
/// the generated-title policy (typically a cheaper model).
pub struct Engine<P> {
    store: SessionStore,
    policy: TitlePolicy,
    max_input_chars: usize,
    answerer: P,
    titler: P,
}

impl<P: CompletionProvider> Engine<P> {
    pub fn new(policy: TitlePolicy, max_input_chars: usize, answerer: P, titler: P) -> Self {
        Self {
            store: SessionStore::new(),
            policy,
            max_input_chars,
            answerer,
            titler,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn select(&mut self, selection: Selection) -> StoreResult<()> {
        self.store.select(selection)
    }

    pub fn clear_all(&mut self) {
        self.store.clear_all();
    }

    /// Phase one: validate the input and install the pending turn.
    ///
    /// Creates a topic when the current selection is "new", otherwise
    /// appends to the selected topic.
    ///
    /// # Errors
    /// Store faults only; boundary rejections are a [`Submission`] variant,
    /// not an error.
    pub fn begin_submission(&mut self, raw: &str) -> StoreResult<Submission> {
        let text = raw.trim();
        if text.is_empty() {
            return Ok(Submission::Rejected(Rejected::Empty));
        }
        if text.chars().count() > self.max_input_chars {
            return Ok(Submission::Rejected(Rejected::TooLong {
                limit: self.max_input_chars,
            }));
        }

        let (turn, names_topic) = match self.store.current().clone() {
            Selection::New => {
                let provisional = title::provisional_title(text, self.policy);
                let turn = self.store.create_topic(text, provisional);
                (turn, self.policy == TitlePolicy::Generated)
            }
            Selection::Topic { id } => (self.store.append_turn(&id, text)?, false),
        };

        Ok(Submission::Pending(PendingSubmission {
            turn,
            user_text: text.to_string(),
            names_topic,
        }))
    }

    /// Phase two: one provider call, then patch the pending turn.
    ///
    /// A provider failure is absorbed into the turn as an error line; it
    /// never propagates, so chat continuity is preserved. When the
    /// submission created a topic under the generated policy, a second
    /// call names it (falling back to a fixed label on failure).
    ///
    /// # Errors
    /// Store faults only.
    pub async fn resolve(&mut self, pending: PendingSubmission) -> StoreResult<TurnOutcome> {
        let (reply, outcome) = match self.answerer.complete(&pending.user_text).await {
            Ok(text) => (text, TurnOutcome::Answered),
            Err(err) => {
                tracing::warn!(error = %err, topic = pending.turn.topic_id(), "completion failed");
                (error_reply(&err), TurnOutcome::ProviderFailed)
            }
        };
        self.store.finalize_turn(&pending.turn, reply)?;

        if pending.names_topic {
            let label = match title::generate_title(&self.titler, &pending.user_text).await {
                Ok(label) => label,
                Err(err) => {
                    tracing::warn!(error = %err, topic = pending.turn.topic_id(), "title generation failed");
                    title::FALLBACK_TITLE.to_string()
                }
            };
            self.store.set_title(pending.turn.topic_id(), &label)?;
        }

        Ok(outcome)
    }
}

/// Error line written into the conversation log in place of a reply.
fn error_reply(err: &ProviderError) -> String {
    format!("[error] {err}")
}

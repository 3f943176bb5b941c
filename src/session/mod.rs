use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::config::{EditorConfig, SwitchPolicy};
use crate::store::{NoteId, NoteStore};
use crate::text;

pub mod timer;

pub use timer::{CancellableTimer, Clock, ManualClock, SystemClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Buffering,
    Committing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Inactive,
    Idle {
        note_id: NoteId,
        last_saved_at: Option<OffsetDateTime>,
    },
    Buffering {
        note_id: NoteId,
        since: OffsetDateTime,
    },
    Saving {
        note_id: NoteId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEvent {
    pub note_id: NoteId,
    pub committed_at: OffsetDateTime,
}

#[derive(Debug)]
struct Attached {
    note_id: NoteId,
    committed: String,
    buffer: String,
    state: SessionState,
    buffering_since: Option<OffsetDateTime>,
    last_saved_at: Option<OffsetDateTime>,
}

impl Attached {
    fn seeded(note_id: NoteId, content: &str) -> Self {
        Self {
            note_id,
            committed: content.to_string(),
            buffer: content.to_string(),
            state: SessionState::Idle,
            buffering_since: None,
            last_saved_at: None,
        }
    }
}

#[derive(Debug)]
pub struct EditSession<C = SystemClock> {
    clock: C,
    debounce: Duration,
    indicator: Duration,
    switch_policy: SwitchPolicy,
    attached: Option<Attached>,
    commit_timer: CancellableTimer<NoteId>,
    indicator_timer: CancellableTimer<NoteId>,
}

impl EditSession<SystemClock> {
    pub fn new(config: &EditorConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> EditSession<C> {
    pub fn with_clock(config: &EditorConfig, clock: C) -> Self {
        Self {
            clock,
            debounce: config.debounce(),
            indicator: config.saving_indicator(),
            switch_policy: config.switch_policy,
            attached: None,
            commit_timer: CancellableTimer::default(),
            indicator_timer: CancellableTimer::default(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn note_id(&self) -> Option<&NoteId> {
        self.attached.as_ref().map(|a| &a.note_id)
    }

    pub fn state(&self) -> SessionState {
        self.attached
            .as_ref()
            .map(|a| a.state)
            .unwrap_or(SessionState::Idle)
    }

    pub fn has_pending(&self) -> bool {
        self.state() == SessionState::Buffering
    }

    /// Latest plaintext seen from the surface, committed or not.
    pub fn buffer(&self) -> Option<&str> {
        self.attached.as_ref().map(|a| a.buffer.as_str())
    }

    /// The buffer rendered for the editing surface.
    pub fn editable(&self) -> String {
        self.buffer().map(text::to_editable).unwrap_or_default()
    }

    pub fn is_saving(&self) -> bool {
        self.indicator_timer.is_armed() && !self.indicator_timer.is_due(self.clock.now())
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.commit_timer.deadline(), self.indicator_timer.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn status(&self) -> SessionStatus {
        let Some(attached) = &self.attached else {
            return SessionStatus::Inactive;
        };
        if attached.state == SessionState::Buffering {
            return SessionStatus::Buffering {
                note_id: attached.note_id.clone(),
                since: attached
                    .buffering_since
                    .unwrap_or_else(OffsetDateTime::now_utc),
            };
        }
        if self.is_saving() {
            return SessionStatus::Saving {
                note_id: attached.note_id.clone(),
            };
        }
        SessionStatus::Idle {
            note_id: attached.note_id.clone(),
            last_saved_at: attached.last_saved_at,
        }
    }

    /// Follows the store's active note.
    ///
    /// A pending buffer for a different note is flushed or dropped according
    /// to the switch policy before the new note's content is seeded. Staying
    /// on the same note while buffering keeps the buffer; otherwise the buffer
    /// is re-seeded from the stored content.
    pub fn attach(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        let Some(active) = store.active_note() else {
            return self.detach(store);
        };
        let target = active.id.clone();
        let content = active.content.clone();

        let same_note = self.note_id() == Some(&target);
        if same_note && self.has_pending() {
            return None;
        }

        let event = if same_note {
            None
        } else {
            self.settle_pending(store)
        };
        if !same_note {
            // The indicator belongs to the note being left.
            self.indicator_timer.cancel();
            tracing::debug!(note_id = %target, "attaching edit session");
        }
        let last_saved_at = self
            .attached
            .as_ref()
            .filter(|a| a.note_id == target)
            .and_then(|a| a.last_saved_at);
        let mut attached = Attached::seeded(target, &content);
        attached.last_saved_at = last_saved_at;
        self.attached = Some(attached);
        event
    }

    /// Applies the switch policy to any pending buffer and drops the session.
    pub fn detach(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        let event = self.settle_pending(store);
        self.attached = None;
        self.indicator_timer.cancel();
        event
    }

    /// Raw surface content, as emitted on every input event.
    pub fn on_input(&mut self, rich: &str) {
        let plaintext = text::to_plaintext(rich);
        self.on_plaintext(&plaintext);
    }

    pub fn on_plaintext(&mut self, value: &str) {
        let now = self.clock.now();
        let Some(attached) = self.attached.as_mut() else {
            tracing::debug!("ignoring edit without an attached note");
            return;
        };
        if attached.buffer == value {
            return;
        }
        attached.buffer.clear();
        attached.buffer.push_str(value);
        match attached.state {
            SessionState::Idle | SessionState::Committing => {
                if attached.buffer == attached.committed {
                    return;
                }
                attached.state = SessionState::Buffering;
                attached.buffering_since = Some(OffsetDateTime::now_utc());
                tracing::debug!(note_id = %attached.note_id, "buffering edits");
            }
            SessionState::Buffering => {}
        }
        self.commit_timer
            .arm(attached.note_id.clone(), now, self.debounce);
    }

    /// Drives both timers. Call on every host tick.
    pub fn poll(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        let now = self.clock.now();
        if let Some(note_id) = self.indicator_timer.fire_if_due(now) {
            tracing::trace!(%note_id, "saving indicator cleared");
        }
        let due = self.commit_timer.fire_if_due(now)?;
        if self.note_id() != Some(&due) {
            return None;
        }
        self.commit(store)
    }

    /// Commits any pending buffer immediately.
    pub fn flush(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        self.commit_timer.cancel();
        if !self.has_pending() {
            return None;
        }
        self.commit(store)
    }

    fn settle_pending(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        if !self.has_pending() {
            self.commit_timer.cancel();
            return None;
        }
        match self.switch_policy {
            SwitchPolicy::Flush => self.flush(store),
            SwitchPolicy::Discard => {
                self.commit_timer.cancel();
                if let Some(attached) = self.attached.as_mut() {
                    tracing::debug!(note_id = %attached.note_id, "discarding buffered edits");
                    attached.buffer = attached.committed.clone();
                    attached.state = SessionState::Idle;
                    attached.buffering_since = None;
                }
                None
            }
        }
    }

    fn commit(&mut self, store: &mut NoteStore) -> Option<CommitEvent> {
        let now = self.clock.now();
        let attached = self.attached.as_mut()?;
        attached.state = SessionState::Committing;
        attached.buffering_since = None;

        if attached.buffer == attached.committed {
            attached.state = SessionState::Idle;
            tracing::debug!(note_id = %attached.note_id, "quiet period ended without changes");
            return None;
        }
        if !store.update_content(&attached.note_id, &attached.buffer) {
            attached.state = SessionState::Idle;
            tracing::warn!(note_id = %attached.note_id, "dropping edits for a note that no longer exists");
            return None;
        }

        let committed_at = OffsetDateTime::now_utc();
        attached.committed = attached.buffer.clone();
        attached.last_saved_at = Some(committed_at);
        attached.state = SessionState::Idle;
        self.indicator_timer
            .arm(attached.note_id.clone(), now, self.indicator);
        tracing::debug!(note_id = %attached.note_id, "committed buffered edits");
        Some(CommitEvent {
            note_id: attached.note_id.clone(),
            committed_at,
        })
    }
}

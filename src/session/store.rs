// src/session/store.rs

use std::{collections::HashMap, sync::Arc};

use crate::{
    config::SESSION_STALE_AFTER_MS,
    models::{Assessment, Question, Response, ResponsePatch},
    session::snapshot::{SessionSnapshot, SnapshotStore},
    utils::clock::Clock,
};

/// In-memory state of the one active session.
#[derive(Debug, Clone)]
struct ActiveSession {
    assessment: Assessment,
    responses: HashMap<String, Response>,
    current_question_index: usize,
    start_time: i64,
    user_id: Option<String>,
}

impl ActiveSession {
    fn last_index(&self) -> usize {
        self.assessment.questions.len().saturating_sub(1)
    }

    fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            assessment: self.assessment.clone(),
            responses: self.responses.clone(),
            current_question_index: self.current_question_index,
            start_time: self.start_time,
            user_id: self.user_id.clone(),
        }
    }
}

/// Authoritative state container for an in-progress assessment.
///
/// Every committed mutation is written through to the `SnapshotStore` before
/// the call returns. A failed write is logged and the in-memory change stands.
pub struct SessionStore {
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    active: Option<ActiveSession>,
    epoch: u64,
}

impl SessionStore {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            snapshots,
            clock,
            active: None,
            epoch: 0,
        }
    }

    /// Begins a session for `assessment`, replacing any unsubmitted one.
    pub fn start(&mut self, assessment: Assessment, user_id: impl Into<String>) {
        let responses = assessment
            .questions
            .iter()
            .map(|q| (q.id.clone(), Response::initial(q)))
            .collect();

        tracing::info!(
            assessment_id = %assessment.id,
            questions = assessment.questions.len(),
            "Assessment session started"
        );

        self.active = Some(ActiveSession {
            assessment,
            responses,
            current_question_index: 0,
            start_time: self.clock.now_ms(),
            user_id: Some(user_id.into()),
        });
        self.epoch += 1;
        self.persist();
    }

    /// Merges `patch` into the response for `question_id`.
    /// Returns false, without touching anything, if the id is not in the assessment.
    pub fn set_response(&mut self, question_id: &str, patch: ResponsePatch) -> bool {
        let applied = match self.active.as_mut() {
            Some(session) => apply_patch(session, question_id, patch),
            None => false,
        };
        if applied {
            self.persist();
        } else {
            tracing::debug!(question_id, "Ignoring response for unknown question");
        }
        applied
    }

    /// Applies several patches as one mutation with a single write.
    /// Unknown ids are skipped. Returns how many were applied.
    pub fn set_many_responses(&mut self, updates: HashMap<String, ResponsePatch>) -> usize {
        let Some(session) = self.active.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        for (question_id, patch) in updates {
            if apply_patch(session, &question_id, patch) {
                applied += 1;
            } else {
                tracing::debug!(%question_id, "Skipping result for unknown question");
            }
        }
        if applied > 0 {
            self.persist();
        }
        applied
    }

    pub fn next(&mut self) -> usize {
        self.move_to(|index, last| (index + 1).min(last))
    }

    pub fn previous(&mut self) -> usize {
        self.move_to(|index, _| index.saturating_sub(1))
    }

    pub fn go_to(&mut self, index: usize) -> usize {
        self.move_to(|_, last| index.min(last))
    }

    fn move_to(&mut self, target: impl FnOnce(usize, usize) -> usize) -> usize {
        let Some(session) = self.active.as_mut() else {
            return 0;
        };
        let next = target(session.current_question_index, session.last_index());
        if next != session.current_question_index {
            session.current_question_index = next;
            self.persist();
        }
        next
    }

    /// Drops the session from memory and from durable storage.
    pub fn reset(&mut self) {
        if let Some(session) = self.active.take() {
            tracing::info!(assessment_id = %session.assessment.id, "Assessment session cleared");
        }
        self.epoch += 1;
        if let Err(e) = self.snapshots.clear() {
            tracing::warn!("Failed to remove session snapshot: {}", e);
        }
    }

    /// Loads a persisted session if it is recent enough and still valid.
    /// Anything unusable is discarded and removed from storage.
    pub fn rehydrate(&mut self) -> bool {
        self.active = None;
        self.epoch += 1;

        let snapshot = match self.snapshots.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Discarding unreadable session snapshot: {}", e);
                self.discard_snapshot();
                return false;
            }
        };

        let age = self.clock.now_ms() - snapshot.start_time;
        if age >= SESSION_STALE_AFTER_MS {
            tracing::info!(
                assessment_id = %snapshot.assessment.id,
                age_ms = age,
                "Discarding stale session snapshot"
            );
            self.discard_snapshot();
            return false;
        }

        if snapshot.assessment.questions.is_empty() || snapshot.user_id.is_none() {
            tracing::warn!(
                assessment_id = %snapshot.assessment.id,
                "Discarding session snapshot without questions or owner"
            );
            self.discard_snapshot();
            return false;
        }

        let session = reconcile(snapshot);
        tracing::info!(
            assessment_id = %session.assessment.id,
            index = session.current_question_index,
            "Resumed assessment session"
        );
        self.active = Some(session);
        self.persist();
        true
    }

    fn discard_snapshot(&mut self) {
        if let Err(e) = self.snapshots.clear() {
            tracing::warn!("Failed to remove session snapshot: {}", e);
        }
    }

    fn persist(&self) {
        let Some(session) = &self.active else {
            return;
        };
        if let Err(e) = self.snapshots.save(&session.to_snapshot()) {
            tracing::warn!("Failed to persist session snapshot: {}", e);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Identifies the current session lifetime. Changes on start, reset and rehydrate.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        self.active.as_ref().map(|s| &s.assessment)
    }

    pub fn responses(&self) -> Option<&HashMap<String, Response>> {
        self.active.as_ref().map(|s| &s.responses)
    }

    pub fn response(&self, question_id: &str) -> Option<&Response> {
        self.active.as_ref()?.responses.get(question_id)
    }

    pub fn current_question_index(&self) -> usize {
        self.active
            .as_ref()
            .map_or(0, |s| s.current_question_index)
    }

    pub fn current_question(&self) -> Option<&Question> {
        let session = self.active.as_ref()?;
        session
            .assessment
            .questions
            .get(session.current_question_index)
    }

    pub fn start_time(&self) -> Option<i64> {
        self.active.as_ref().map(|s| s.start_time)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.active.as_ref()?.user_id.as_deref()
    }

    /// Seconds left, rounded up, never negative. `None` without a session.
    ///
    /// Derived from the clock on every call so it cannot drift across reloads.
    pub fn remaining_seconds(&self) -> Option<u64> {
        let session = self.active.as_ref()?;
        let limit_ms = session.assessment.total_time_limit as i64 * 1000;
        let elapsed_ms = self.clock.now_ms() - session.start_time;
        let remaining_ms = (limit_ms - elapsed_ms).max(0);
        Some(((remaining_ms + 999) / 1000) as u64)
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.active.as_ref().map(ActiveSession::to_snapshot)
    }
}

fn apply_patch(session: &mut ActiveSession, question_id: &str, patch: ResponsePatch) -> bool {
    let Some(question) = session.assessment.question(question_id) else {
        return false;
    };
    session
        .responses
        .entry(question_id.to_string())
        .or_insert_with(|| Response::initial(question))
        .apply(patch);
    true
}

/// Brings a loaded snapshot back in line with its own assessment. Responses for
/// questions that no longer exist are dropped and missing ones are recreated.
fn reconcile(snapshot: SessionSnapshot) -> ActiveSession {
    let SessionSnapshot {
        assessment,
        mut responses,
        current_question_index,
        start_time,
        user_id,
    } = snapshot;

    responses.retain(|id, _| assessment.contains(id));
    for q in &assessment.questions {
        responses
            .entry(q.id.clone())
            .or_insert_with(|| Response::initial(q));
    }

    let last = assessment.questions.len().saturating_sub(1);
    ActiveSession {
        current_question_index: current_question_index.min(last),
        assessment,
        responses,
        start_time,
        user_id,
    }
}

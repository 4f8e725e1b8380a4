//! Submission state machine
//!
//! `Idle -> Collecting -> Submitting -> Idle`, with
//! `Submitting -> FallbackExport -> Idle` when the primary store fails.
//! There is no retry state and no queue of failed submissions.

use crate::error::{StoreError, StoreResult};
use crate::persist::{PersistReceipt, PersistStrategy};
use sat_record::IndicatorRecord;
use serde::Serialize;

/// Submission states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionState {
    /// Nothing in progress
    Idle,
    /// Form open, record being assembled
    Collecting,
    /// Record handed to the primary store
    Submitting,
    /// Primary failed, secondary store in use
    FallbackExport,
}

/// Illegal transition
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal submission transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    /// State we were in
    pub from: SubmissionState,
    /// State we tried to enter
    pub to: SubmissionState,
}

/// Validates a state transition
///
/// # Errors
/// `IllegalTransition` for anything not in [`allowed_transitions`].
pub fn validate_transition(
    from: SubmissionState,
    to: SubmissionState,
) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: SubmissionState) -> &'static [SubmissionState] {
    match from {
        SubmissionState::Idle => &[SubmissionState::Collecting],
        SubmissionState::Collecting => &[SubmissionState::Submitting, SubmissionState::Idle],
        SubmissionState::Submitting => &[SubmissionState::Idle, SubmissionState::FallbackExport],
        SubmissionState::FallbackExport => &[SubmissionState::Idle],
    }
}

/// Drives one record through the submission states
///
/// Keeps the visited states so callers can log or test the path taken.
#[derive(Debug, Clone)]
pub struct Submission {
    state: SubmissionState,
    trace: Vec<SubmissionState>,
}

impl Default for Submission {
    fn default() -> Self {
        Self::new()
    }
}

impl Submission {
    /// Start in `Idle`
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            trace: vec![SubmissionState::Idle],
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Every state visited, in order
    #[inline]
    #[must_use]
    pub fn trace(&self) -> &[SubmissionState] {
        &self.trace
    }

    /// Move to `to`
    ///
    /// # Errors
    /// `IllegalTransition` if the move is not allowed.
    pub fn transition(&mut self, to: SubmissionState) -> Result<(), IllegalTransition> {
        validate_transition(self.state, to)?;
        tracing::trace!(from = ?self.state, to = ?to, "submission transition");
        self.state = to;
        self.trace.push(to);
        Ok(())
    }

    /// Collect, submit and settle one record
    ///
    /// Any attempt at the fallback, successful ([`PersistReceipt::FellBack`])
    /// or not ([`StoreError::FallbackFailed`]), routes through
    /// `FallbackExport`. The machine ends in `Idle` whatever the store did.
    ///
    /// # Errors
    /// - `StoreError::Submission` if the submission is not idle
    /// - the strategy's error when nothing could store the record
    pub async fn run<S>(&mut self, strategy: &S, record: &IndicatorRecord) -> StoreResult<PersistReceipt>
    where
        S: PersistStrategy + ?Sized,
    {
        self.transition(SubmissionState::Collecting)?;
        self.transition(SubmissionState::Submitting)?;

        let outcome = strategy.persist(record).await;
        let fallback_attempted = matches!(
            outcome,
            Ok(PersistReceipt::FellBack { .. }) | Err(StoreError::FallbackFailed { .. })
        );
        if fallback_attempted {
            self.transition(SubmissionState::FallbackExport)?;
        }
        self.transition(SubmissionState::Idle)?;
        outcome
    }
}

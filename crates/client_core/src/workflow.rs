//! Proposition validation and topic creation workflow.
//!
//! A raw proposition is validated by the backend up to
//! [`MAX_VALIDATION_ATTEMPTS`] times. The user then confirms either one of the
//! backend's suggestions or, when the input was judged valid, the original
//! text. The confirmed proposition is committed as a new topic followed by
//! each drafted argument, one request at a time.

use std::{fmt, sync::Arc};

use shared::{
    domain::{ArgumentId, Side, TopicId},
    protocol::{CreateArgumentRequest, CreateTopicRequest, Suggestion, ValidationResult},
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{ClientError, DebateBackend};

pub const MAX_VALIDATION_ATTEMPTS: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftArgument {
    pub title: String,
    pub content: String,
    pub sources: Option<String>,
}

impl DraftArgument {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            sources: None,
        }
    }

    pub fn with_sources(mut self, sources: impl Into<String>) -> Self {
        self.sources = Some(sources.into());
        self
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    /// Only drafts with both a title and content are sent to the backend.
    pub fn is_submittable(&self) -> bool {
        !self.title.trim().is_empty() && !self.content.trim().is_empty()
    }

    fn to_request(&self, side: Side, author: &str) -> CreateArgumentRequest {
        CreateArgumentRequest {
            side,
            title: self.title.clone(),
            content: self.content.clone(),
            sources: self
                .sources
                .as_deref()
                .filter(|sources| !sources.trim().is_empty())
                .map(str::to_string),
            author: author.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgumentBundle {
    pub pro: Vec<DraftArgument>,
    pub con: Vec<DraftArgument>,
}

impl ArgumentBundle {
    pub fn side(&self, side: Side) -> &[DraftArgument] {
        match side {
            Side::Pro => &self.pro,
            Side::Con => &self.con,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec<DraftArgument> {
        match side {
            Side::Pro => &mut self.pro,
            Side::Con => &mut self.con,
        }
    }

    pub fn push(&mut self, side: Side, draft: DraftArgument) {
        self.side_mut(side).push(draft);
    }

    pub fn remove(&mut self, side: Side, index: usize) -> Option<DraftArgument> {
        let drafts = self.side_mut(side);
        (index < drafts.len()).then(|| drafts.remove(index))
    }

    /// Submittable drafts in commit order: the pro side, then the con side,
    /// each in insertion order. The index is the draft's position on its side.
    pub fn submittable(&self) -> impl Iterator<Item = (Side, usize, &DraftArgument)> {
        let pro = self.pro.iter().enumerate().map(|(i, d)| (Side::Pro, i, d));
        let con = self.con.iter().enumerate().map(|(i, d)| (Side::Con, i, d));
        pro.chain(con).filter(|(_, _, draft)| draft.is_submittable())
    }

    pub fn has_submittable(&self) -> bool {
        self.submittable().next().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    EditingInput,
    Validating,
    AwaitingDecision,
    Confirmed,
    Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    pub raw_input: String,
    pub attempts: u8,
    pub last_result: Option<ValidationResult>,
    pub confirmed: Option<String>,
    pub busy: bool,
    pub show_suggestions: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: WorkflowPhase::EditingInput,
            raw_input: String::new(),
            attempts: 0,
            last_result: None,
            confirmed: None,
            busy: false,
            show_suggestions: false,
        }
    }
}

impl WorkflowState {
    pub fn attempts_remaining(&self) -> u8 {
        MAX_VALIDATION_ATTEMPTS.saturating_sub(self.attempts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub topic_id: TopicId,
    pub argument_ids: Vec<ArgumentId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRejection {
    pub side: Side,
    pub index: usize,
    pub title: String,
    pub message: String,
    pub reasoning: Option<String>,
}

/// Outcome of a commit that did not fully succeed. Nothing is rolled back.
#[derive(Debug)]
pub struct CommitReport {
    /// `None` when the topic itself could not be created.
    pub topic_id: Option<TopicId>,
    pub succeeded: usize,
    pub failed: usize,
    /// Submittable drafts never sent because a halting error stopped the loop.
    pub skipped: usize,
    pub argument_ids: Vec<ArgumentId>,
    pub rejections: Vec<ArgumentRejection>,
    pub halted_by: Option<ClientError>,
}

impl CommitReport {
    fn topic_failed(err: ClientError) -> Self {
        Self {
            topic_id: None,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            argument_ids: Vec::new(),
            rejections: Vec::new(),
            halted_by: Some(err),
        }
    }

    fn is_clean(&self) -> bool {
        self.failed == 0 && self.halted_by.is_none()
    }
}

impl fmt::Display for CommitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(topic_id) = self.topic_id else {
            return match &self.halted_by {
                Some(err) => write!(f, "topic was not created: {err}"),
                None => f.write_str("topic was not created"),
            };
        };
        write!(
            f,
            "topic {topic_id} created; {} argument(s) submitted, {} failed",
            self.succeeded, self.failed
        )?;
        if self.skipped > 0 {
            write!(f, ", {} not sent", self.skipped)?;
        }
        if let Some(err) = &self.halted_by {
            write!(f, ": {err}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("please enter a proposition")]
    EmptyInput,
    #[error("please provide at least one pro or con argument with a title and content")]
    NoArguments,
    #[error("maximum validation attempts ({max}) reached; please select a suggestion")]
    MaxAttemptsExceeded { max: u8 },
    #[error("invalid workflow state: {0}")]
    InvalidState(&'static str),
    #[error("another workflow operation is still in flight")]
    Busy,
    #[error("workflow was cancelled while the request was in flight")]
    Cancelled,
    #[error("failed to validate proposition: {0}")]
    Backend(#[source] ClientError),
    #[error("{0}")]
    Commit(CommitReport),
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Validated(ValidationResult),
    Committed(CommitReceipt),
}

struct WorkflowInner {
    state: WorkflowState,
    /// Bumped by `cancel`; completions from an older epoch are discarded.
    epoch: u64,
}

impl WorkflowInner {
    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        if self.state.busy {
            return Err(WorkflowError::Busy);
        }
        if self.state.phase == WorkflowPhase::Terminal {
            return Err(WorkflowError::InvalidState(
                "topic already committed; start a new workflow",
            ));
        }
        Ok(())
    }
}

pub struct PropositionWorkflow {
    backend: Arc<dyn DebateBackend>,
    inner: Mutex<WorkflowInner>,
}

impl PropositionWorkflow {
    pub fn new(backend: Arc<dyn DebateBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(WorkflowInner {
                state: WorkflowState::default(),
                epoch: 0,
            }),
        }
    }

    pub async fn snapshot(&self) -> WorkflowState {
        self.inner.lock().await.state.clone()
    }

    /// Form submission: commits when a proposition is already confirmed,
    /// otherwise starts validation of `raw`.
    pub async fn submit(
        &self,
        raw: &str,
        bundle: &ArgumentBundle,
        author: &str,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let confirmed = self.inner.lock().await.state.phase == WorkflowPhase::Confirmed;
        if confirmed {
            return self.commit(bundle, author).await.map(SubmitOutcome::Committed);
        }
        self.validate(raw).await.map(SubmitOutcome::Validated)
    }

    pub async fn validate(&self, text: &str) -> Result<ValidationResult, WorkflowError> {
        if text.trim().is_empty() {
            return Err(WorkflowError::EmptyInput);
        }
        self.run_validation(text, WorkflowPhase::EditingInput).await
    }

    /// The attempt cap is checked before the input, so an exhausted workflow
    /// reports `MaxAttemptsExceeded` whatever the text.
    pub async fn retry(&self, text: &str) -> Result<ValidationResult, WorkflowError> {
        if self.inner.lock().await.state.attempts >= MAX_VALIDATION_ATTEMPTS {
            return Err(WorkflowError::MaxAttemptsExceeded {
                max: MAX_VALIDATION_ATTEMPTS,
            });
        }
        if text.trim().is_empty() {
            return Err(WorkflowError::EmptyInput);
        }
        self.run_validation(text, WorkflowPhase::AwaitingDecision)
            .await
    }

    pub async fn select_suggestion(&self, suggestion: &Suggestion) -> Result<String, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_idle()?;
        if inner.state.phase != WorkflowPhase::AwaitingDecision {
            return Err(WorkflowError::InvalidState(
                "suggestions can only be selected while awaiting a decision",
            ));
        }
        let offered = inner
            .state
            .last_result
            .as_ref()
            .is_some_and(|result| result.suggestions.contains(suggestion));
        if !offered {
            return Err(WorkflowError::InvalidState(
                "suggestion is not part of the current validation result",
            ));
        }

        let proposition = suggestion.proposition.clone();
        inner.state.confirmed = Some(proposition.clone());
        inner.state.show_suggestions = false;
        inner.state.phase = WorkflowPhase::Confirmed;
        info!(
            "workflow: suggestion confirmed kind={:?} attempts={}",
            suggestion.kind, inner.state.attempts
        );
        Ok(proposition)
    }

    pub async fn continue_with_original(&self) -> Result<String, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.ensure_idle()?;
        if inner.state.phase != WorkflowPhase::AwaitingDecision {
            return Err(WorkflowError::InvalidState(
                "no validation result is awaiting a decision",
            ));
        }
        let original = match &inner.state.last_result {
            Some(result) if result.is_valid => result.original_input.clone(),
            _ => {
                return Err(WorkflowError::InvalidState(
                    "the original proposition was not judged valid",
                ))
            }
        };

        inner.state.confirmed = Some(original.clone());
        inner.state.show_suggestions = false;
        inner.state.phase = WorkflowPhase::Confirmed;
        info!("workflow: original proposition confirmed");
        Ok(original)
    }

    pub async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        inner.epoch += 1;
        inner.state = WorkflowState::default();
        info!("workflow: reset");
    }

    /// Creates the topic for the confirmed proposition, then each submittable
    /// draft in order. Relevance rejections (HTTP 400) are recorded and the
    /// loop moves on; any other failure stops it.
    pub async fn commit(
        &self,
        bundle: &ArgumentBundle,
        author: &str,
    ) -> Result<CommitReceipt, WorkflowError> {
        if !bundle.has_submittable() {
            return Err(WorkflowError::NoArguments);
        }

        let (epoch, proposition) = {
            let mut inner = self.inner.lock().await;
            inner.ensure_idle()?;
            if inner.state.phase != WorkflowPhase::Confirmed {
                return Err(WorkflowError::InvalidState(
                    "a proposition must be confirmed before committing",
                ));
            }
            let proposition = inner
                .state
                .confirmed
                .clone()
                .ok_or(WorkflowError::InvalidState("confirmed proposition is missing"))?;
            inner.state.busy = true;
            (inner.epoch, proposition)
        };

        let report = self.submit_topic(&proposition, bundle, author).await;

        let mut inner = self.inner.lock().await;
        let current = inner.epoch == epoch;
        if current {
            inner.state.busy = false;
        }

        if report.is_clean() {
            let topic_id = report
                .topic_id
                .ok_or(WorkflowError::InvalidState("committed topic has no id"))?;
            if current {
                inner.state = WorkflowState {
                    phase: WorkflowPhase::Terminal,
                    ..WorkflowState::default()
                };
            }
            info!(
                "workflow: topic committed topic_id={topic_id} arguments={}",
                report.succeeded
            );
            return Ok(CommitReceipt {
                topic_id,
                argument_ids: report.argument_ids,
            });
        }

        warn!("workflow: commit incomplete: {report}");
        Err(WorkflowError::Commit(report))
    }

    async fn run_validation(
        &self,
        text: &str,
        from: WorkflowPhase,
    ) -> Result<ValidationResult, WorkflowError> {
        let epoch = {
            let mut inner = self.inner.lock().await;
            inner.ensure_idle()?;
            if inner.state.phase != from {
                return Err(WorkflowError::InvalidState(match from {
                    WorkflowPhase::AwaitingDecision => "retry requires a validation result",
                    _ => "validation only starts from an editable proposition; use retry",
                }));
            }
            if inner.state.attempts >= MAX_VALIDATION_ATTEMPTS {
                return Err(WorkflowError::MaxAttemptsExceeded {
                    max: MAX_VALIDATION_ATTEMPTS,
                });
            }
            inner.state.busy = true;
            inner.state.phase = WorkflowPhase::Validating;
            inner.epoch
        };

        let outcome = self.backend.validate_proposition(text).await;

        let mut inner = self.inner.lock().await;
        if inner.epoch != epoch {
            return Err(WorkflowError::Cancelled);
        }
        inner.state.busy = false;
        match outcome {
            Ok(result) => {
                inner.state.attempts += 1;
                inner.state.raw_input = text.to_string();
                inner.state.last_result = Some(result.clone());
                inner.state.show_suggestions = true;
                inner.state.phase = WorkflowPhase::AwaitingDecision;
                info!(
                    "workflow: proposition validated attempt={} valid={} suggestions={}",
                    inner.state.attempts,
                    result.is_valid,
                    result.suggestions.len()
                );
                Ok(result)
            }
            Err(err) => {
                inner.state.phase = from;
                warn!("workflow: validation failed, attempt not counted: {err}");
                Err(WorkflowError::Backend(err))
            }
        }
    }

    async fn submit_topic(
        &self,
        proposition: &str,
        bundle: &ArgumentBundle,
        author: &str,
    ) -> CommitReport {
        let request = CreateTopicRequest {
            proposition: proposition.to_string(),
            created_by: author.to_string(),
        };
        let topic_id = match self.backend.create_topic(&request).await {
            Ok(created) => created.topic_id,
            Err(err) => return CommitReport::topic_failed(err),
        };
        info!("workflow: topic created topic_id={topic_id}");

        let drafts: Vec<_> = bundle.submittable().collect();
        let mut report = CommitReport {
            topic_id: Some(topic_id),
            succeeded: 0,
            failed: 0,
            skipped: 0,
            argument_ids: Vec::new(),
            rejections: Vec::new(),
            halted_by: None,
        };

        for (position, (side, index, draft)) in drafts.iter().enumerate() {
            let request = draft.to_request(*side, author);
            match self.backend.create_argument(topic_id, &request).await {
                Ok(created) => {
                    report.succeeded += 1;
                    report.argument_ids.push(created.argument_id);
                }
                Err(ClientError::Api(api)) if api.is_relevance_rejection() => {
                    warn!(
                        "workflow: argument rejected side={side} index={index}: {}",
                        api.message
                    );
                    report.failed += 1;
                    report.rejections.push(ArgumentRejection {
                        side: *side,
                        index: *index,
                        title: draft.title.clone(),
                        message: api.message,
                        reasoning: api.reasoning,
                    });
                }
                Err(err) => {
                    warn!("workflow: argument submission halted side={side} index={index}: {err}");
                    report.failed += 1;
                    report.skipped = drafts.len() - position - 1;
                    report.halted_by = Some(err);
                    break;
                }
            }
        }

        report
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;

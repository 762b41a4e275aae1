//! Walkthrough runner
//!
//! Executes a registered walkthrough step by step against a live UI. Each
//! step waits for its trigger (woken by mutation notifications, bounded by a
//! deadline), dispatches its action, then yields to the host before the next
//! step is considered.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use super::context::EligibilityContext;
use super::definition::{Action, Step, Walkthrough};
use super::host::{Element, HandlerTable, Host};
use crate::common::StepFailure;

/// Timing knobs for a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// How long a step waits for its trigger
    pub step_timeout: Duration,
    /// Longest sleep between two trigger checks when no mutation arrives
    pub poll_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// Lifecycle of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "step", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running(usize),
    Completed,
    Failed(usize),
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }

    /// Legal transitions: steps advance one at a time and are never revisited
    pub fn can_transition_to(self, next: RunState) -> bool {
        match (self, next) {
            (RunState::Idle, RunState::Running(0)) => true,
            (RunState::Idle, RunState::Completed) => true,
            (RunState::Idle, RunState::Failed(0)) => true,
            (RunState::Running(i), RunState::Running(j)) => j == i + 1,
            (RunState::Running(_), RunState::Completed) => true,
            (RunState::Running(i), RunState::Failed(j)) => i == j,
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Caller-side cancellation of a run
///
/// Honoured between steps and while waiting for a trigger; an action that was
/// already dispatched always completes first.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The trigger resolved and the action was dispatched
    Done,
    /// The step's platform/edition filters rejected the context
    Skipped,
}

/// Per-step entry of a run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub trigger: String,
    /// Translated instructional text
    pub content: String,
    pub action: Action,
    pub status: StepStatus,
}

/// Terminal result of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Failed {
        step: usize,
        #[serde(serialize_with = "serialize_failure")]
        failure: StepFailure,
    },
}

fn serialize_failure<S: Serializer>(failure: &StepFailure, serializer: S) -> Result<S::Ok, S::Error> {
    #[derive(Serialize)]
    struct Wire<'a> {
        code: &'a str,
        message: String,
    }
    Wire {
        code: failure.code(),
        message: failure.to_string(),
    }
    .serialize(serializer)
}

/// Everything a caller needs to know about one run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub id: String,
    pub outcome: RunOutcome,
    pub steps_total: usize,
    pub records: Vec<StepRecord>,
    /// Show the completion celebration
    pub celebrate: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    pub fn failed_step(&self) -> Option<usize> {
        match self.outcome {
            RunOutcome::Completed => None,
            RunOutcome::Failed { step, .. } => Some(step),
        }
    }

    /// Number of actions actually dispatched to the host
    pub fn actions_dispatched(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == StepStatus::Done)
            .count()
    }
}

/// Bookkeeping for one in-flight run
struct RunSession<'a> {
    walkthrough: &'a Walkthrough,
    progress: Option<&'a watch::Sender<RunState>>,
    state: RunState,
    records: Vec<StepRecord>,
    started: Instant,
}

impl<'a> RunSession<'a> {
    fn new(walkthrough: &'a Walkthrough, progress: Option<&'a watch::Sender<RunState>>) -> Self {
        if let Some(tx) = progress {
            tx.send_replace(RunState::Idle);
        }
        Self {
            walkthrough,
            progress,
            state: RunState::Idle,
            records: Vec::with_capacity(walkthrough.steps.len()),
            started: Instant::now(),
        }
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal run transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
        if let Some(tx) = self.progress {
            tx.send_replace(next);
        }
    }

    fn record(&mut self, index: usize, step: &Step, content: String, status: StepStatus) {
        self.records.push(StepRecord {
            index,
            trigger: step.trigger.clone(),
            content,
            action: step.effective_action(),
            status,
        });
    }

    fn finish(mut self, outcome: RunOutcome) -> RunReport {
        let terminal = match &outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Failed { step, .. } => RunState::Failed(*step),
        };
        self.transition(terminal);

        let completed = outcome == RunOutcome::Completed;
        RunReport {
            id: self.walkthrough.id.clone(),
            outcome,
            steps_total: self.walkthrough.steps.len(),
            records: self.records,
            celebrate: completed && !self.walkthrough.suppress_celebration,
            elapsed: self.started.elapsed(),
        }
    }
}

/// Drives walkthroughs against a host UI
///
/// A runner keeps no state between runs; every `run` starts from `Idle`.
#[derive(Debug, Clone)]
pub struct Runner {
    host: Host,
    handlers: HandlerTable,
    context: EligibilityContext,
    settings: RunSettings,
}

impl Runner {
    pub fn new(host: Host, context: EligibilityContext, settings: RunSettings) -> Self {
        Self {
            host,
            handlers: HandlerTable::new(),
            context,
            settings,
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn context(&self) -> &EligibilityContext {
        &self.context
    }

    pub fn settings(&self) -> RunSettings {
        self.settings
    }

    /// Run a walkthrough to completion or first failure
    pub async fn run(&self, walkthrough: &Walkthrough) -> RunReport {
        self.run_with(walkthrough, &CancelToken::new(), None).await
    }

    /// Run with a cancellation token and an optional state channel
    pub async fn run_with(
        &self,
        walkthrough: &Walkthrough,
        cancel: &CancelToken,
        progress: Option<&watch::Sender<RunState>>,
    ) -> RunReport {
        let mut session = RunSession::new(walkthrough, progress);
        let total = walkthrough.steps.len();

        tracing::info!(
            id = %walkthrough.id,
            steps = total,
            context = %self.context,
            "Starting walkthrough"
        );

        if let Some(reason) = walkthrough.ineligibility(&self.context) {
            tracing::warn!(id = %walkthrough.id, %reason, "Walkthrough not eligible");
            return session.finish(RunOutcome::Failed {
                step: 0,
                failure: StepFailure::NotEligible(reason),
            });
        }

        for (index, step) in walkthrough.steps.iter().enumerate() {
            session.transition(RunState::Running(index));

            if cancel.is_cancelled() {
                tracing::info!(id = %walkthrough.id, step = index + 1, "Walkthrough cancelled");
                return session.finish(RunOutcome::Failed {
                    step: index,
                    failure: StepFailure::Cancelled,
                });
            }

            let content = self.host.translator.translate(&step.content);

            if !step.applies_to(&self.context) {
                tracing::debug!(step = index + 1, trigger = %step.trigger, "Step filtered out, skipping");
                session.record(index, step, content, StepStatus::Skipped);
                continue;
            }

            match self.execute_step(index, total, step, &content, cancel).await {
                Ok(()) => session.record(index, step, content, StepStatus::Done),
                Err(failure) => {
                    tracing::warn!(
                        id = %walkthrough.id,
                        step = index + 1,
                        code = failure.code(),
                        "Step failed: {}",
                        failure
                    );
                    return session.finish(RunOutcome::Failed {
                        step: index,
                        failure,
                    });
                }
            }

            // Let the host react to the action before the next trigger is evaluated
            tokio::task::yield_now().await;
        }

        tracing::info!(id = %walkthrough.id, "Walkthrough completed");
        session.finish(RunOutcome::Completed)
    }

    async fn execute_step(
        &self,
        index: usize,
        total: usize,
        step: &Step,
        content: &str,
        cancel: &CancelToken,
    ) -> Result<(), StepFailure> {
        let element = self.wait_for_trigger(step, cancel).await?;
        let action = step.effective_action();
        let actions = self.host.actions.as_ref();

        actions.show_tip(&element, content, step.position).await;
        tracing::info!(
            "Step {}/{}: {} on {}",
            index + 1,
            total,
            action,
            element
        );

        match &action {
            Action::Click => actions.dispatch_click(&element).await?,
            Action::Type { text } => actions.dispatch_input(&element, text).await?,
            Action::Custom { handler } => {
                let handler = self.handlers.resolve(handler)?;
                handler.run(&element, actions).await?;
            }
        }

        actions.hide_tip().await;
        Ok(())
    }

    /// Wait until the step's trigger (and extra trigger) resolve
    async fn wait_for_trigger(&self, step: &Step, cancel: &CancelToken) -> Result<Element, StepFailure> {
        let timeout = self.settings.step_timeout;
        let deadline = Instant::now() + timeout;
        let mut mutations = Some(self.host.ui.observe_mutations());
        let mut checks: u32 = 0;

        loop {
            // Mark the current generation seen before querying so a mutation
            // landing during the query still wakes the next wait.
            if let Some(rx) = mutations.as_mut() {
                rx.borrow_and_update();
            }

            checks += 1;
            // The host query itself is bounded by the step deadline
            let matched = tokio::select! {
                biased;
                matched = self.match_trigger(step) => matched,
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::debug!(trigger = %step.trigger, checks, "Host query outlived the step deadline");
                    None
                }
                _ = cancel.cancelled() => return Err(StepFailure::Cancelled),
            };
            if let Some(element) = matched {
                tracing::debug!(trigger = %step.trigger, checks, "Trigger matched");
                return Ok(element);
            }

            if cancel.is_cancelled() {
                return Err(StepFailure::Cancelled);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(StepFailure::Timeout {
                    trigger: step.trigger.clone(),
                    waited: timeout,
                });
            }

            tokio::select! {
                changed = next_mutation(&mut mutations) => {
                    if changed.is_err() {
                        tracing::debug!("Mutation feed closed, falling back to polling");
                        mutations = None;
                    }
                }
                _ = tokio::time::sleep(remaining.min(self.settings.poll_interval)) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    async fn match_trigger(&self, step: &Step) -> Option<Element> {
        let element = self.host.ui.find(&step.trigger).await?;
        if let Some(extra) = &step.extra_trigger {
            self.host.ui.find(extra).await?;
        }
        Some(element)
    }
}

async fn next_mutation(
    mutations: &mut Option<watch::Receiver<u64>>,
) -> Result<(), watch::error::RecvError> {
    match mutations {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}

//! The capture-and-analysis state machine.
//!
//! [`WorkflowController`] is the single owner of the UI state. Views and
//! shortcut handlers only ever call its methods and render its
//! [`WorkflowSnapshot`]s.
//!
//! ```text
//! Idle ──capture──▶ Capturing ──ok──▶ Idle
//!   │                   └──err──▶ ShowingError ──dismiss──▶ Idle
//!   └──analyze──▶ Analyzing ──ok──▶ ShowingResult ──new analysis──▶ Idle
//!                     └──err──▶ ShowingError
//! ```
//!
//! Only one of capture and analysis can be in flight. Requests arriving
//! while busy are dropped, not queued. The state lock is never held across
//! an await point.

use crate::analysis::{AnalysisClient, AnalysisRequest, AnalysisResult};
use crate::capture::{CaptureService, ScreenSource, ScreenshotArtifact};
use crate::config::Config;
use crate::error::{AnalysisError, CaptureError};
use crate::store::{ArtifactSummary, ScreenshotStore};
use crate::window::{WindowAttributes, WindowGuard};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Current mode of the workflow. Exactly one is active at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkflowState {
    #[default]
    Idle,
    Capturing,
    Analyzing,
    ShowingResult(AnalysisResult),
    ShowingError(String),
}

impl WorkflowState {
    /// Whether a capture or analysis is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Capturing | Self::Analyzing)
    }
}

/// Timing and policy knobs of the controller.
#[derive(Clone, Debug)]
pub struct WorkflowSettings {
    pub settle_delay: Duration,
    /// Covers the settling delay plus the capture itself.
    pub capture_timeout: Duration,
    pub analysis_timeout: Duration,
    /// Put drained screenshots back when analysis fails.
    pub restore_on_failure: bool,
    pub default_prompt: String,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            settle_delay: config.settle_delay,
            capture_timeout: config.capture_timeout,
            analysis_timeout: config.analysis_timeout,
            restore_on_failure: config.restore_on_failure,
            default_prompt: config.default_prompt.clone(),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Everything a view needs to draw one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub state: WorkflowState,
    pub screenshots: Vec<ArtifactSummary>,
    pub description: String,
    pub protected: bool,
}

#[derive(Default)]
struct Inner {
    state: WorkflowState,
    store: ScreenshotStore,
    description: String,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a busy state. If the owning future is dropped before
/// [`complete`](Self::complete), the state moves to `ShowingError` so the
/// controller is never left parked.
struct InFlight<'a> {
    inner: &'a Mutex<Inner>,
    operation: &'static str,
    done: bool,
}

impl<'a> InFlight<'a> {
    fn new(inner: &'a Mutex<Inner>, operation: &'static str) -> Self {
        Self {
            inner,
            operation,
            done: false,
        }
    }

    fn complete(mut self, apply: impl FnOnce(&mut Inner)) {
        let mut inner = lock(self.inner);
        apply(&mut inner);
        self.done = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut inner = lock(self.inner);
        if inner.state.is_busy() {
            log::warn!("{} was cancelled", self.operation);
            inner.state = WorkflowState::ShowingError(format!("{} was cancelled.", self.operation));
        }
    }
}

/// Orchestrates window protection, capture, the screenshot store and
/// analysis.
///
/// Share it as `Arc<WorkflowController<..>>`; every method takes `&self`.
pub struct WorkflowController<W, S, A> {
    guard: WindowGuard<W>,
    capture: CaptureService<S>,
    client: A,
    settings: WorkflowSettings,
    inner: Mutex<Inner>,
}

impl<W, S, A> WorkflowController<W, S, A>
where
    W: WindowAttributes,
    S: ScreenSource,
    A: AnalysisClient,
{
    /// Builds the controller and protects the window right away.
    pub fn new(window: W, source: S, client: A, settings: WorkflowSettings) -> Self {
        let guard = WindowGuard::new(window);
        if let Err(e) = guard.protect() {
            log::error!("Initial window protection failed: {}", e);
        }
        Self {
            guard,
            capture: CaptureService::new(source),
            client,
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Takes a screenshot with the window briefly unprotected.
    ///
    /// Returns `false` without doing anything while another operation is in
    /// flight. A shown result or error is cleared first.
    pub async fn request_capture(&self) -> bool {
        {
            let mut inner = lock(&self.inner);
            if inner.state.is_busy() {
                log::debug!("Capture request dropped: {:?} in progress", inner.state);
                return false;
            }
            inner.state = WorkflowState::Capturing;
        }
        let in_flight = InFlight::new(&self.inner, "Screen capture");

        let outcome = self.capture_unprotected().await;

        in_flight.complete(|inner| match outcome {
            Ok(artifact) => {
                inner.store.add(artifact);
                inner.state = WorkflowState::Idle;
            }
            Err(e) => {
                log::error!("Screen capture failed: {}", e);
                inner.state = WorkflowState::ShowingError(e.user_message());
            }
        });
        true
    }

    /// Protection is back on by the time this returns, on every path.
    async fn capture_unprotected(&self) -> Result<ScreenshotArtifact, CaptureError> {
        let _scope = self.guard.unprotected();
        let capture = async {
            tokio::time::sleep(self.settings.settle_delay).await;
            self.capture.capture().await
        };
        match tokio::time::timeout(self.settings.capture_timeout, capture).await {
            Ok(result) => result,
            Err(_) => Err(CaptureError::TimedOut(self.settings.capture_timeout)),
        }
    }

    /// Submits every pending screenshot plus the description.
    ///
    /// Returns `false` without doing anything when the store is empty or
    /// another operation is in flight. Submission is destructive: unless
    /// `restore_on_failure` is set, a failed analysis loses the screenshots.
    pub async fn request_analysis(&self) -> bool {
        let (request, description) = {
            let mut inner = lock(&self.inner);
            if !matches!(inner.state, WorkflowState::Idle | WorkflowState::ShowingError(_)) {
                log::debug!("Analysis request dropped: state is {:?}", inner.state);
                return false;
            }
            if inner.store.is_empty() {
                log::debug!("Analysis request dropped: no screenshots");
                return false;
            }
            let artifacts = inner.store.drain();
            let description = std::mem::take(&mut inner.description);
            inner.state = WorkflowState::Analyzing;
            let request = AnalysisRequest::new(&description, &self.settings.default_prompt, artifacts);
            (request, description)
        };
        let in_flight = InFlight::new(&self.inner, "Analysis");

        let backup = self
            .settings
            .restore_on_failure
            .then(|| request.artifacts.clone());
        log::info!(
            "Submitting {} screenshot(s) to the {} backend",
            request.artifacts.len(),
            self.client.name()
        );

        let outcome =
            match tokio::time::timeout(self.settings.analysis_timeout, self.client.analyze(request)).await {
                Ok(result) => result,
                Err(_) => Err(AnalysisError::TimedOut(self.settings.analysis_timeout)),
            };

        in_flight.complete(|inner| match outcome {
            Ok(result) => {
                log::info!("Analysis finished");
                inner.state = WorkflowState::ShowingResult(result);
            }
            Err(e) => {
                log::error!("Analysis failed: {}", e);
                if let Some(artifacts) = backup {
                    log::info!("Restoring {} screenshot(s) after failure", artifacts.len());
                    inner.store.restore_front(artifacts);
                    if inner.description.is_empty() {
                        inner.description = description;
                    }
                }
                inner.state = WorkflowState::ShowingError(e.user_message());
            }
        });
        true
    }

    /// Leaves the result view for a fresh capture/compose round.
    pub fn new_analysis(&self) -> bool {
        let mut inner = lock(&self.inner);
        if matches!(inner.state, WorkflowState::ShowingResult(_)) {
            inner.state = WorkflowState::Idle;
            return true;
        }
        false
    }

    /// Clears a shown error.
    pub fn dismiss_error(&self) -> bool {
        let mut inner = lock(&self.inner);
        if matches!(inner.state, WorkflowState::ShowingError(_)) {
            inner.state = WorkflowState::Idle;
            return true;
        }
        false
    }

    /// Removes a pending screenshot. Only allowed while idle.
    pub fn delete_screenshot(&self, id: &str) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state != WorkflowState::Idle {
            log::debug!("Not deleting {} while {:?}", id, inner.state);
            return false;
        }
        inner.store.remove(id).is_some()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        lock(&self.inner).description = description.into();
    }

    /// Applies an edit made on top of `seen`, the description a view last
    /// rendered.
    ///
    /// The edit is dropped unless the workflow is idle and the description
    /// is still `seen`, so a keystroke racing a submission cannot bring a
    /// consumed description back.
    pub fn edit_description(&self, seen: &str, description: impl Into<String>) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state != WorkflowState::Idle || inner.description != seen {
            log::debug!("Stale description edit dropped");
            return false;
        }
        inner.description = description.into();
        true
    }

    pub fn description(&self) -> String {
        lock(&self.inner).description.clone()
    }

    pub fn state(&self) -> WorkflowState {
        lock(&self.inner).state.clone()
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let inner = lock(&self.inner);
        WorkflowSnapshot {
            state: inner.state.clone(),
            screenshots: inner.store.summaries(),
            description: inner.description.clone(),
            protected: self.guard.is_protected(),
        }
    }

    pub fn screenshot_count(&self) -> usize {
        lock(&self.inner).store.len()
    }

    /// Whether a capture request would currently be accepted.
    pub fn can_capture(&self) -> bool {
        !lock(&self.inner).state.is_busy()
    }

    /// Whether an analysis request would currently be accepted.
    pub fn can_analyze(&self) -> bool {
        let inner = lock(&self.inner);
        matches!(inner.state, WorkflowState::Idle | WorkflowState::ShowingError(_))
            && !inner.store.is_empty()
    }

    /// The shown solution without fence markers, if a result with a
    /// solution is on screen.
    pub fn copyable_solution(&self) -> Option<String> {
        match &lock(&self.inner).state {
            WorkflowState::ShowingResult(result) => result.clean_solution(),
            _ => None,
        }
    }

    /// Re-applies window protection if an earlier restore failed.
    ///
    /// Does nothing during a capture. Call it on every frame or tick.
    /// Returns the protection flag afterwards.
    pub fn ensure_protected(&self) -> bool {
        // Held across `protect` so a capture cannot start in between
        let inner = lock(&self.inner);
        if inner.state == WorkflowState::Capturing || self.guard.is_protected() {
            return self.guard.is_protected();
        }
        match self.guard.protect() {
            Ok(()) => {
                log::info!("Window protection re-applied");
                true
            }
            Err(e) => {
                log::debug!("Window protection still failing: {}", e);
                false
            }
        }
    }

    /// Current value of the window protection flag.
    pub fn is_protected(&self) -> bool {
        self.guard.is_protected()
    }

    pub fn window(&self) -> &W {
        self.guard.window()
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT;

    #[test]
    fn busy_states() {
        assert!(WorkflowState::Capturing.is_busy());
        assert!(WorkflowState::Analyzing.is_busy());
        assert!(!WorkflowState::Idle.is_busy());
        assert!(!WorkflowState::ShowingError("x".into()).is_busy());
    }

    #[test]
    fn default_settings_follow_config_defaults() {
        let settings = WorkflowSettings::default();
        assert_eq!(settings.default_prompt, DEFAULT_PROMPT);
        assert!(!settings.restore_on_failure);
        assert!(settings.capture_timeout > settings.settle_delay);
    }

    #[test]
    fn dropped_in_flight_marker_parks_in_error() {
        let inner = Mutex::new(Inner {
            state: WorkflowState::Analyzing,
            ..Inner::default()
        });
        drop(InFlight::new(&inner, "Analysis"));
        assert_eq!(
            lock(&inner).state,
            WorkflowState::ShowingError("Analysis was cancelled.".into())
        );
    }

    #[test]
    fn completed_in_flight_marker_keeps_new_state() {
        let inner = Mutex::new(Inner {
            state: WorkflowState::Capturing,
            ..Inner::default()
        });
        InFlight::new(&inner, "Screen capture").complete(|i| i.state = WorkflowState::Idle);
        assert_eq!(lock(&inner).state, WorkflowState::Idle);
    }
}

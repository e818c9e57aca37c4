//! The affix session: probe, plan, wait for a scale, then composite and
//! encode on the blocking pool.
//!
//! ```text
//! Idle → Planning → AwaitingUserScale → Composing → Encoding → Done
//!                         │                 │
//!                         └→ Cancelled  ←───┘ (between images)
//! ```
//!
//! Any step after `Idle` may end in `Failed`. Terminal sessions are not
//! reused; start a new [`AffixSession`] for a new selection.

use std::fmt;
use std::io::{self, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compose::{self, DrawProgress};
use crate::config::AffixConfig;
use crate::encode::{OutputFormat, OutputSpec, encode};
use crate::error::{CompositeError, EncodeError, SessionError};
use crate::geometry::{Dimensions, RenderScale};
use crate::layout::{self, CanvasPlan};
use crate::source::{ImageRef, ImageSource, StreamProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Planning,
    AwaitingUserScale,
    Composing,
    Encoding,
    Done,
    Cancelled,
    Failed,
}

impl SessionState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed)
    }
}

/// An image picked by the user, optionally with a size the caller already knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub image: ImageRef,
    pub known: Option<Dimensions>,
}

impl SelectedImage {
    pub fn with_dimensions(image: ImageRef, dimensions: Dimensions) -> Self {
        Self {
            image,
            known: Some(dimensions),
        }
    }
}

impl From<ImageRef> for SelectedImage {
    fn from(image: ImageRef) -> Self {
        Self { image, known: None }
    }
}

impl From<&str> for SelectedImage {
    fn from(value: &str) -> Self {
        ImageRef::from(value).into()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("need two or more images to affix, got {0}")]
    TooFewImages(usize),
}

/// Ordered selection of at least two images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection(Vec<SelectedImage>);

impl Selection {
    pub const MIN_IMAGES: usize = 2;

    pub fn new<I, T>(images: I) -> Result<Self, SelectionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<SelectedImage>,
    {
        let images: Vec<SelectedImage> = images.into_iter().map(Into::into).collect();
        if images.len() < Self::MIN_IMAGES {
            return Err(SelectionError::TooFewImages(images.len()));
        }
        Ok(Self(images))
    }

    pub fn images(&self) -> &[SelectedImage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A freshly created output destination.
pub struct OutputSink {
    pub path: PathBuf,
    pub writer: Box<dyn Write + Send>,
}

impl OutputSink {
    pub fn new(path: impl Into<PathBuf>, writer: impl Write + Send + 'static) -> Self {
        Self {
            path: path.into(),
            writer: Box::new(writer),
        }
    }
}

impl fmt::Debug for OutputSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputSink")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Creates output sinks for finished images.
pub trait SinkFactory: Send + Sync {
    /// `extension` includes the leading dot, e.g. `".png"`.
    fn create(&self, extension: &str) -> io::Result<OutputSink>;

    /// Called with the sink path after a failed encode.
    fn discard(&self, _path: &Path) {}
}

/// Advisory hook bracketing a whole session, from `start` to its terminal state.
pub trait ExclusiveProcessing: Send + Sync {
    fn begin(&self) {}
    fn end(&self) {}
}

/// Notified once per successfully written output.
pub trait MediaRegistrar: Send + Sync {
    fn register(&self, _path: &Path) {}
}

struct NoHooks;

impl ExclusiveProcessing for NoHooks {}
impl MediaRegistrar for NoHooks {}

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    streams: Arc<dyn StreamProvider>,
    sinks: Arc<dyn SinkFactory>,
    exclusive: Arc<dyn ExclusiveProcessing>,
    registrar: Arc<dyn MediaRegistrar>,
}

impl Collaborators {
    pub fn new(streams: Arc<dyn StreamProvider>, sinks: Arc<dyn SinkFactory>) -> Self {
        Self {
            streams,
            sinks,
            exclusive: Arc::new(NoHooks),
            registrar: Arc::new(NoHooks),
        }
    }

    pub fn with_exclusive(mut self, exclusive: Arc<dyn ExclusiveProcessing>) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn with_registrar(mut self, registrar: Arc<dyn MediaRegistrar>) -> Self {
        self.registrar = registrar;
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// What a successful session produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffixResult {
    pub path: PathBuf,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
}

#[derive(Debug)]
pub enum SessionEvent {
    Progress(DrawProgress),
    Done(AffixResult),
    Failed(SessionError),
    Cancelled,
}

pub struct AffixSession {
    state: Arc<watch::Sender<SessionState>>,
    collaborators: Collaborators,
    config: AffixConfig,
    sources: Vec<ImageSource>,
    plan: Option<CanvasPlan>,
    exclusive: Option<ExclusiveGuard>,
}

impl AffixSession {
    pub fn new(collaborators: Collaborators) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            state: Arc::new(state),
            collaborators,
            config: AffixConfig::default(),
            sources: Vec::new(),
            plan: None,
            exclusive: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Natural plan, once planning has succeeded.
    pub fn plan(&self) -> Option<CanvasPlan> {
        self.plan
    }

    /// Probe every image in order and plan the natural canvas.
    pub async fn start(
        &mut self,
        selection: Selection,
        config: AffixConfig,
    ) -> Result<CanvasPlan, SessionError> {
        self.expect_state(SessionState::Idle, "start")?;

        self.config = config;
        publish(&self.state, SessionState::Planning);
        let exclusive =
            ExclusiveGuard::begin(self.collaborators.exclusive.clone(), self.state.clone());
        info!(
            images = selection.len(),
            axis = ?config.axis,
            policy = ?config.policy,
            "Planning affix"
        );

        let sources: Vec<ImageSource> = selection
            .0
            .into_iter()
            .map(|selected| {
                let source = ImageSource::new(selected.image, self.collaborators.streams.clone())
                    .with_budget(config.decode_budget);
                match selected.known {
                    Some(dimensions) => source.with_dimensions(dimensions),
                    None => source,
                }
            })
            .collect();

        let planned = tokio::task::spawn_blocking(move || {
            let mut sources = sources;
            let planned = probe_and_plan(&mut sources, &config);
            (sources, planned)
        })
        .await;

        let result = match planned {
            Ok((sources, Ok(plan))) => {
                self.sources = sources;
                Ok(plan)
            }
            Ok((_, Err(e))) => Err(e),
            Err(e) => Err(SessionError::WorkerLost(e.to_string())),
        };

        match result {
            Ok(plan) => {
                self.plan = Some(plan);
                self.exclusive = Some(exclusive);
                publish(&self.state, SessionState::AwaitingUserScale);
                info!(width = plan.width, height = plan.height, "Natural canvas planned");
                Ok(plan)
            }
            Err(e) => {
                error!(error = %e, "Planning failed");
                exclusive.finish(SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Start compositing at `scale` and return immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn confirm(
        &mut self,
        scale: RenderScale,
        spec: OutputSpec,
    ) -> Result<SessionHandle, SessionError> {
        self.expect_state(SessionState::AwaitingUserScale, "confirm")?;
        let (Some(plan), Some(exclusive)) = (self.plan, self.exclusive.take()) else {
            return Err(SessionError::InvalidTransition {
                from: self.state(),
                action: "confirm",
            });
        };

        publish(&self.state, SessionState::Composing);
        let (events_tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let job = Job {
            sources: std::mem::take(&mut self.sources),
            plan,
            scale,
            spec,
            config: self.config,
            collaborators: self.collaborators.clone(),
            state: self.state.clone(),
            exclusive,
            events: events_tx,
            cancel: cancel.clone(),
        };
        info!(scale = scale.get(), format = %spec.format, "Affix confirmed");
        let task = tokio::task::spawn_blocking(move || job.run());

        Ok(SessionHandle {
            events,
            state: self.state.subscribe(),
            cancel,
            task,
        })
    }

    /// Abandon the session while it waits for a scale.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::AwaitingUserScale, "cancel")?;
        self.sources.clear();
        match self.exclusive.take() {
            Some(exclusive) => exclusive.finish(SessionState::Cancelled),
            None => publish(&self.state, SessionState::Cancelled),
        }
        info!("Affix cancelled before compositing");
        Ok(())
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), SessionError> {
        let from = self.state();
        if from == expected {
            Ok(())
        } else {
            warn!(?from, action, "Rejected session transition");
            Err(SessionError::InvalidTransition { from, action })
        }
    }
}

impl fmt::Debug for AffixSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AffixSession")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

fn probe_and_plan(
    sources: &mut [ImageSource],
    config: &AffixConfig,
) -> Result<CanvasPlan, SessionError> {
    let mut sizes = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter_mut().enumerate() {
        let size = source
            .dimensions()
            .map_err(|cause| SessionError::Probe { index, cause })?;
        sizes.push(size);
    }
    Ok(layout::plan(&sizes, config.axis, config.policy, config.spacing)?)
}

fn publish(state: &watch::Sender<SessionState>, next: SessionState) {
    let previous = state.send_replace(next);
    debug!(?previous, ?next, "Session state changed");
}

/// The exclusive-processing bracket opened by `start`.
///
/// [`finish`](Self::finish) ends the bracket and publishes a terminal state.
/// Dropping a guard that was never finished (a panicked worker, an abandoned
/// `start` future, a session dropped while awaiting a scale) ends the bracket
/// and marks the session `Failed`.
struct ExclusiveGuard {
    exclusive: Arc<dyn ExclusiveProcessing>,
    state: Arc<watch::Sender<SessionState>>,
    open: bool,
}

impl ExclusiveGuard {
    fn begin(
        exclusive: Arc<dyn ExclusiveProcessing>,
        state: Arc<watch::Sender<SessionState>>,
    ) -> Self {
        exclusive.begin();
        Self {
            exclusive,
            state,
            open: true,
        }
    }

    fn finish(mut self, terminal: SessionState) {
        self.close(terminal);
    }

    fn close(&mut self, terminal: SessionState) {
        if std::mem::replace(&mut self.open, false) {
            self.exclusive.end();
            publish(&self.state, terminal);
        }
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        if self.open {
            warn!("Session abandoned before reaching a terminal state");
            self.close(SessionState::Failed);
        }
    }
}

/// Everything the background worker owns once the user confirms.
struct Job {
    sources: Vec<ImageSource>,
    plan: CanvasPlan,
    scale: RenderScale,
    spec: OutputSpec,
    config: AffixConfig,
    collaborators: Collaborators,
    state: Arc<watch::Sender<SessionState>>,
    exclusive: ExclusiveGuard,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl Job {
    fn run(mut self) {
        let outcome = self.execute();
        let collaborators = &self.collaborators;

        let (terminal, event) = match outcome {
            Ok(result) => {
                info!(
                    path = %result.path.display(),
                    dimensions = %result.dimensions,
                    "Affix complete"
                );
                collaborators.registrar.register(&result.path);
                (SessionState::Done, SessionEvent::Done(result))
            }
            Err(SessionError::Composite(CompositeError::Cancelled)) => {
                info!("Affix cancelled while compositing");
                (SessionState::Cancelled, SessionEvent::Cancelled)
            }
            Err(e) => {
                error!(error = %e, "Affix failed");
                (SessionState::Failed, SessionEvent::Failed(e))
            }
        };

        self.exclusive.finish(terminal);
        let _ = self.events.send(event);
    }

    fn execute(&mut self) -> Result<AffixResult, SessionError> {
        let events = &self.events;
        let cancel = &self.cancel;
        let buffer = compose::composite_with(
            &self.plan,
            self.scale,
            &mut self.sources,
            self.config.spacing,
            self.config.fill(),
            |progress| {
                let _ = events.send(SessionEvent::Progress(progress));
                if cancel.is_cancelled() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )?;
        self.sources.clear();

        let dimensions = Dimensions::new(buffer.width(), buffer.height());
        publish(&self.state, SessionState::Encoding);

        let OutputSink { path, writer } = self
            .collaborators
            .sinks
            .create(self.spec.format.extension())
            .map_err(EncodeError::SinkUnavailable)?;

        if let Err(e) = encode(buffer, self.spec, writer) {
            warn!(path = %path.display(), error = %e, "Encode failed, discarding output");
            self.collaborators.sinks.discard(&path);
            return Err(e.into());
        }

        Ok(AffixResult {
            path,
            dimensions,
            format: self.spec.format,
        })
    }
}

/// Live view of a confirmed session.
#[derive(Debug)]
pub struct SessionHandle {
    events: mpsc::UnboundedReceiver<SessionEvent>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Ask the worker to stop before it decodes the next image.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that triggers the same stop as [`cancel`](Self::cancel).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the terminal event.
    pub async fn outcome(self) -> Result<AffixResult, SessionError> {
        self.outcome_with(|_| {}).await
    }

    /// Wait for the terminal event, passing progress along the way.
    pub async fn outcome_with<F>(mut self, mut on_progress: F) -> Result<AffixResult, SessionError>
    where
        F: FnMut(DrawProgress),
    {
        while let Some(event) = self.events.recv().await {
            match event {
                SessionEvent::Progress(progress) => on_progress(progress),
                SessionEvent::Done(result) => return Ok(result),
                SessionEvent::Failed(e) => return Err(e),
                SessionEvent::Cancelled => return Err(CompositeError::Cancelled.into()),
            }
        }
        match self.task.await {
            Err(e) => Err(SessionError::WorkerLost(e.to_string())),
            Ok(()) => Err(SessionError::WorkerLost(
                "worker exited without a terminal event".to_string(),
            )),
        }
    }
}

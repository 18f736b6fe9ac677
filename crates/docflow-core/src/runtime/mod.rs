mod buffer;

use std::sync::Arc;

use docflow_harness::{GenerationRequest, Harness, RunEvent, StreamEvent};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::core::{Artifact, GenerationUnit, Pipeline, UnitStatus};
use crate::store::{PipelineStore, StoreError};

pub use buffer::{UnitBuffer, UnitProgress};

/// Variable carrying the host's revision instructions.
pub const REVISION_INSTRUCTIONS_VAR: &str = "revision_instructions";
/// Variable carrying the text of the artifact being revised.
pub const PREVIOUS_ARTIFACT_VAR: &str = "previous_artifact";

/// Rejected host action. The pipeline is left untouched.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unit not found: {0}")]
    UnitNotFound(usize),
    #[error("cannot {action} unit {index} while it is {status}")]
    InvalidTransition {
        index: usize,
        status: &'static str,
        action: &'static str,
    },
    #[error("a unit is already generating")]
    Busy,
    #[error("revision instructions must not be empty")]
    EmptyInstructions,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Cancels the stream of whichever unit is generating when it is used.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl CancelHandle {
    /// The unit ends `failed` with its last artifact kept.
    pub fn cancel(&self) {
        self.tx.send_modify(|generation| *generation += 1);
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Generate,
    Revise {
        previous: Option<Artifact>,
        previous_thought: String,
        instructions: String,
    },
}

#[derive(Debug, Clone)]
struct ActiveUnit {
    index: usize,
    mode: Mode,
}

enum Outcome {
    Completed(Option<Artifact>),
    Failed(String),
}

/// Drives a pipeline one unit at a time.
///
/// At most one unit is `generating`. After a unit reaches a terminal status the
/// next `pending` unit (in pipeline order) is started; a `failed` unit halts the
/// pipeline until the host retries it.
pub struct Scheduler {
    pipeline: Pipeline,
    harness: Harness,
    store: Option<Arc<dyn PipelineStore>>,
    updates: watch::Sender<Pipeline>,
    cancel: CancelHandle,
    active: Option<ActiveUnit>,
}

impl Scheduler {
    /// Takes ownership of `pipeline`, coercing any `generating` unit back to
    /// `pending` first.
    pub fn new(mut pipeline: Pipeline, harness: Harness) -> Self {
        let coerced = pipeline.resume();
        if coerced > 0 {
            info!(
                pipeline_id = %pipeline.id,
                coerced,
                event = "pipeline.resumed",
                "coerced generating units to pending"
            );
        }
        let (updates, _) = watch::channel(pipeline.clone());
        let (cancel_tx, _) = watch::channel(0_u64);
        Self {
            pipeline,
            harness,
            store: None,
            updates,
            cancel: CancelHandle {
                tx: Arc::new(cancel_tx),
            },
            active: None,
        }
    }

    /// Saves the pipeline after every terminal transition.
    pub fn with_store(mut self, store: Arc<dyn PipelineStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }

    /// Snapshots of the pipeline, published on every status or artifact change.
    pub fn subscribe(&self) -> watch::Receiver<Pipeline> {
        self.updates.subscribe()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Appends a later unit in `pending`. It runs after every unit before it.
    pub fn append(&mut self, unit: GenerationUnit) -> usize {
        let index = self.pipeline.push(unit);
        debug!(unit_index = index, event = "unit.appended", "unit appended");
        self.publish();
        index
    }

    fn is_busy(&self) -> bool {
        self.active.is_some() || self.pipeline.generating().is_some()
    }

    /// Marks the first unfinished unit `generating` when it is `pending` and
    /// nothing else is in flight. Returns the started index. The stream itself
    /// is driven by `run`.
    pub fn tick(&mut self) -> Option<usize> {
        if self.is_busy() {
            return None;
        }
        let next = self.pipeline.first_unfinished()?;
        if next.status != UnitStatus::Pending {
            debug!(unit_index = next.index, status = next.status.as_str(), "pipeline halted");
            return None;
        }
        let index = next.index;
        let unit = self.pipeline.unit_mut(index)?;
        unit.status = UnitStatus::Generating;
        unit.error_message = None;
        self.active = Some(ActiveUnit {
            index,
            mode: Mode::Generate,
        });
        self.publish();
        Some(index)
    }

    /// Runs units until the pipeline is complete, halted at a failed unit, or
    /// has nothing pending.
    pub async fn run(&mut self) {
        loop {
            let active = match self.active.clone() {
                Some(active) => active,
                None => {
                    if self.tick().is_none() {
                        break;
                    }
                    match self.active.clone() {
                        Some(active) => active,
                        None => break,
                    }
                }
            };
            self.drive(active).await;
        }
        if self.pipeline.is_complete() {
            info!(pipeline_id = %self.pipeline.id, event = "pipeline.complete", "pipeline complete");
        } else if let Some(index) = self.pipeline.halted_at() {
            warn!(pipeline_id = %self.pipeline.id, unit_index = index, event = "pipeline.halted", "pipeline halted at failed unit");
        }
    }

    /// Returns a `failed` unit to `pending` and resumes the pipeline.
    pub async fn retry(&mut self, index: usize) -> Result<(), SchedulerError> {
        if self.is_busy() {
            return Err(SchedulerError::Busy);
        }
        let unit = self
            .pipeline
            .unit_mut(index)
            .ok_or(SchedulerError::UnitNotFound(index))?;
        if unit.status != UnitStatus::Failed {
            return Err(SchedulerError::InvalidTransition {
                index,
                status: unit.status.as_str(),
                action: "retry",
            });
        }
        unit.status = UnitStatus::Pending;
        unit.error_message = None;
        info!(unit_index = index, event = "unit.retry", "retrying unit");
        self.publish();
        self.run().await;
        Ok(())
    }

    /// Regenerates a `done` unit with `instructions`. The previous artifact
    /// stays visible until the revision stream yields a replacement, and is
    /// restored if the revision fails.
    pub async fn revise(&mut self, index: usize, instructions: &str) -> Result<(), SchedulerError> {
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Err(SchedulerError::EmptyInstructions);
        }
        if self.is_busy() {
            return Err(SchedulerError::Busy);
        }
        let unit = self
            .pipeline
            .unit_mut(index)
            .ok_or(SchedulerError::UnitNotFound(index))?;
        if unit.status != UnitStatus::Done {
            return Err(SchedulerError::InvalidTransition {
                index,
                status: unit.status.as_str(),
                action: "revise",
            });
        }
        unit.status = UnitStatus::Generating;
        unit.error_message = None;
        let active = ActiveUnit {
            index,
            mode: Mode::Revise {
                previous: unit.artifact.clone(),
                previous_thought: unit.thought.clone(),
                instructions: instructions.to_string(),
            },
        };
        self.active = Some(active.clone());
        self.publish();
        self.drive(active).await;
        Ok(())
    }

    /// Saves the current pipeline to the configured store, if any.
    pub fn save(&self) -> Result<(), SchedulerError> {
        if let Some(store) = &self.store {
            store.save(&self.pipeline)?;
        }
        Ok(())
    }

    fn request_for(&self, active: &ActiveUnit) -> Option<GenerationRequest> {
        let unit = self.pipeline.unit(active.index)?;
        let mut variables = unit.variables.clone();
        if let Mode::Revise {
            previous,
            instructions,
            ..
        } = &active.mode
        {
            variables.insert(REVISION_INSTRUCTIONS_VAR.to_string(), instructions.clone());
            if let Some(previous) = previous {
                variables.insert(PREVIOUS_ARTIFACT_VAR.to_string(), previous.to_text());
            }
        }
        Some(
            GenerationRequest::new(unit.kind)
                .variables(variables)
                .session_id(self.pipeline.session.session_id.clone()),
        )
    }

    async fn drive(&mut self, active: ActiveUnit) {
        let index = active.index;
        let (Some(request), Some(shape)) = (
            self.request_for(&active),
            self.pipeline.unit(index).map(|u| u.shape.clone()),
        ) else {
            self.active = None;
            return;
        };
        info!(
            unit_index = index,
            unit_kind = %request.unit_kind,
            run_id = %request.run_id,
            revision = matches!(active.mode, Mode::Revise { .. }),
            event = "unit.started",
            "starting unit"
        );

        let mut cancel_rx = self.cancel.tx.subscribe();
        cancel_rx.borrow_and_update();

        let outcome = match self.harness.start(request).await {
            Err(err) => Outcome::Failed(err.to_string()),
            Ok(mut run) => {
                let mut buffer = UnitBuffer::new(shape);
                loop {
                    tokio::select! {
                        Ok(()) = cancel_rx.changed() => {
                            info!(unit_index = index, event = "unit.cancel_requested", "cancelling unit stream");
                            run.abort_handle().abort();
                        }
                        event = run.next_event() => match event {
                            Some(RunEvent::Delta(delta)) => self.apply_delta(index, &mut buffer, &delta),
                            Some(RunEvent::Completed(_)) => break Outcome::Completed(buffer.into_artifact()),
                            Some(RunEvent::Failed(failure)) => break Outcome::Failed(failure.to_string()),
                            None => break Outcome::Failed("stream closed without a terminal event".into()),
                        },
                    }
                }
            }
        };

        self.settle(active, outcome);
        self.active = None;
        self.publish();
        if let Err(err) = self.save() {
            warn!(unit_index = index, error = %err, event = "pipeline.save_failed", "failed to persist pipeline");
        }
    }

    fn apply_delta(&mut self, index: usize, buffer: &mut UnitBuffer, delta: &StreamEvent) {
        if let Some(session_id) = &delta.session_id
            && self.pipeline.session.establish(session_id)
        {
            info!(session_id = %session_id, event = "session.established", "session established");
        }
        let progress = buffer.push(delta);
        let Some(unit) = self.pipeline.unit_mut(index) else {
            return;
        };
        unit.thought = buffer.thought().to_string();
        if progress.changed {
            unit.artifact = progress.artifact;
        }
        self.publish();
    }

    fn settle(&mut self, active: ActiveUnit, outcome: Outcome) {
        let index = active.index;
        let Some(unit) = self.pipeline.unit_mut(index) else {
            return;
        };
        match (active.mode, outcome) {
            (_, Outcome::Completed(Some(artifact))) => {
                unit.status = UnitStatus::Done;
                unit.artifact = Some(artifact);
                unit.error_message = None;
                info!(unit_index = index, event = "unit.done", "unit done");
            }
            (Mode::Generate, Outcome::Completed(None)) => {
                unit.status = UnitStatus::Failed;
                unit.error_message = Some("stream completed without a recoverable artifact".into());
                warn!(unit_index = index, event = "unit.failed", "stream completed without artifact");
            }
            (Mode::Generate, Outcome::Failed(message)) => {
                unit.status = UnitStatus::Failed;
                warn!(unit_index = index, error = %message, event = "unit.failed", "unit failed");
                unit.error_message = Some(message);
            }
            (
                Mode::Revise {
                    previous,
                    previous_thought,
                    ..
                },
                outcome,
            ) => {
                let message = match outcome {
                    Outcome::Failed(message) => message,
                    Outcome::Completed(_) => "revision completed without a recoverable artifact".into(),
                };
                unit.status = UnitStatus::Done;
                unit.artifact = previous;
                unit.thought = previous_thought;
                warn!(unit_index = index, error = %message, event = "unit.revision_failed", "revision failed; previous artifact kept");
                unit.error_message = Some(message);
            }
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.pipeline.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonFileStore;
    use async_trait::async_trait;
    use bytes::Bytes;
    use docflow_harness::{ChunkStream, GenerationService, ServiceError, UnitKind};
    use futures::stream::{self, StreamExt as _};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    enum Script {
        Frames(Vec<String>),
        FramesThenError(Vec<String>),
        FramesThenHang(Vec<String>),
        OpenError,
    }

    #[derive(Default)]
    struct ScriptedService {
        scripts: Mutex<VecDeque<Script>>,
        requests: Mutex<Vec<GenerationRequest>>,
        observer: Mutex<Option<watch::Receiver<Pipeline>>>,
        generating_at_open: Mutex<Vec<Vec<usize>>>,
    }

    impl ScriptedService {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                ..Self::default()
            })
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn chunks(frames: Vec<String>) -> Vec<Result<Bytes, ServiceError>> {
        frames
            .into_iter()
            .map(|f| Ok(Bytes::from(format!("data: {f}\n"))))
            .collect()
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn open_stream(&self, request: GenerationRequest) -> Result<ChunkStream, ServiceError> {
            self.requests.lock().unwrap().push(request);
            if let Some(observer) = self.observer.lock().unwrap().as_ref() {
                let snapshot = observer.borrow();
                let generating = snapshot
                    .units()
                    .iter()
                    .filter(|u| u.status == UnitStatus::Generating)
                    .map(|u| u.index)
                    .collect();
                self.generating_at_open.lock().unwrap().push(generating);
            }
            let script = self
                .scripts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Script::OpenError);
            match script {
                Script::Frames(frames) => Ok(Box::pin(stream::iter(chunks(frames)))),
                Script::FramesThenError(frames) => {
                    let mut items = chunks(frames);
                    items.push(Err(ServiceError::transport("connection reset")));
                    Ok(Box::pin(stream::iter(items)))
                }
                Script::FramesThenHang(frames) => {
                    Ok(Box::pin(stream::iter(chunks(frames)).chain(stream::pending())))
                }
                Script::OpenError => Err(ServiceError::service("upstream unavailable", Some(503))),
            }
        }
    }

    fn frame(content: &str) -> String {
        json!({ "content": content }).to_string()
    }

    fn session_frame(content: &str, session_id: &str) -> String {
        json!({ "content": content, "session_id": session_id }).to_string()
    }

    fn outline_script(title: &str) -> Script {
        Script::Frames(vec![
            frame("Drafting.\n```json\n{\"title\": \""),
            frame(title),
            frame("\", \"summary\": \"s\"}\n```"),
        ])
    }

    fn content_script(text: &str) -> Script {
        Script::Frames(vec![frame(&json!({"title": "t", "content": text}).to_string())])
    }

    fn three_unit_pipeline() -> Pipeline {
        Pipeline::new(vec![
            GenerationUnit::new(UnitKind::Outline).variable("topic", "reefs"),
            GenerationUnit::new(UnitKind::Content).variable("section", "Coral"),
            GenerationUnit::new(UnitKind::Content).variable("section", "Fish"),
        ])
    }

    fn scheduler(pipeline: Pipeline, service: &Arc<ScriptedService>) -> Scheduler {
        let scheduler = Scheduler::new(pipeline, Harness::new(service.clone()));
        *service.observer.lock().unwrap() = Some(scheduler.subscribe());
        scheduler
    }

    fn statuses(pipeline: &Pipeline) -> Vec<UnitStatus> {
        pipeline.units().iter().map(|u| u.status).collect()
    }

    #[tokio::test]
    async fn runs_units_one_at_a_time_in_order() {
        let service = ScriptedService::new(vec![
            outline_script("Reefs"),
            content_script("polyps"),
            content_script("wrasse"),
        ]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        scheduler.run().await;

        assert!(scheduler.pipeline().is_complete());
        let opened = service.generating_at_open.lock().unwrap().clone();
        assert_eq!(opened, vec![vec![0], vec![1], vec![2]]);
        let kinds: Vec<UnitKind> = service.requests().iter().map(|r| r.unit_kind).collect();
        assert_eq!(kinds, vec![UnitKind::Outline, UnitKind::Content, UnitKind::Content]);

        let outline = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(
            outline.artifact_as::<crate::core::Outline>().unwrap().title,
            "Reefs"
        );
        assert_eq!(outline.thought, "Drafting.");
    }

    #[tokio::test]
    async fn appended_units_run_after_existing_ones() {
        let service = ScriptedService::new(vec![outline_script("Reefs"), content_script("late")]);
        let mut scheduler = scheduler(
            Pipeline::new(vec![GenerationUnit::new(UnitKind::Outline)]),
            &service,
        );
        scheduler.run().await;
        let index = scheduler.append(GenerationUnit::new(UnitKind::Content));
        assert_eq!(index, 1);
        assert_eq!(scheduler.pipeline().unit(1).unwrap().status, UnitStatus::Pending);

        scheduler.run().await;
        assert!(scheduler.pipeline().is_complete());
    }

    #[tokio::test]
    async fn tick_is_single_flight() {
        let service = ScriptedService::new(vec![]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        assert_eq!(scheduler.tick(), Some(0));
        assert_eq!(scheduler.tick(), None);
        assert_eq!(
            statuses(scheduler.pipeline()),
            vec![UnitStatus::Generating, UnitStatus::Pending, UnitStatus::Pending]
        );
    }

    #[tokio::test]
    async fn failure_halts_pipeline_and_retry_resumes() {
        let service = ScriptedService::new(vec![
            outline_script("Reefs"),
            Script::OpenError,
            content_script("polyps"),
            content_script("wrasse"),
        ]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        scheduler.run().await;

        assert_eq!(
            statuses(scheduler.pipeline()),
            vec![UnitStatus::Done, UnitStatus::Failed, UnitStatus::Pending]
        );
        assert_eq!(scheduler.pipeline().halted_at(), Some(1));
        let message = scheduler.pipeline().unit(1).unwrap().error_message.clone();
        assert!(message.unwrap().contains("upstream unavailable"));
        assert_eq!(scheduler.tick(), None);

        scheduler.retry(1).await.unwrap();
        assert!(scheduler.pipeline().is_complete());
        assert!(scheduler.pipeline().unit(1).unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn stream_without_artifact_fails_unit() {
        let service = ScriptedService::new(vec![Script::Frames(vec![frame("I am only thinking.")])]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        scheduler.run().await;

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Failed);
        assert!(unit.artifact.is_none());
        assert_eq!(unit.thought, "I am only thinking.");
    }

    #[tokio::test]
    async fn invalid_actions_are_rejected_without_mutation() {
        let service = ScriptedService::new(vec![]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        let before = scheduler.pipeline().clone();

        assert!(matches!(
            scheduler.retry(0).await,
            Err(SchedulerError::InvalidTransition { action: "retry", .. })
        ));
        assert!(matches!(
            scheduler.revise(0, "shorter").await,
            Err(SchedulerError::InvalidTransition { action: "revise", .. })
        ));
        assert!(matches!(
            scheduler.revise(0, "   ").await,
            Err(SchedulerError::EmptyInstructions)
        ));
        assert!(matches!(
            scheduler.retry(9).await,
            Err(SchedulerError::UnitNotFound(9))
        ));
        assert_eq!(scheduler.pipeline(), &before);

        scheduler.tick();
        assert!(matches!(scheduler.retry(0).await, Err(SchedulerError::Busy)));
        assert!(service.requests().is_empty());
    }

    fn done_outline(title: &str) -> Pipeline {
        let mut pipeline = Pipeline::new(vec![GenerationUnit::new(UnitKind::Outline)]);
        pipeline.session.establish("s-1");
        let unit = pipeline.unit_mut(0).unwrap();
        unit.status = UnitStatus::Done;
        unit.artifact = Some(Artifact::Structured {
            value: json!({"title": title, "summary": "old"}),
            is_partial: false,
        });
        pipeline
    }

    #[tokio::test]
    async fn revision_error_keeps_previous_artifact() {
        let service = ScriptedService::new(vec![Script::OpenError]);
        let pipeline = done_outline("Original");
        let original = pipeline.unit(0).unwrap().artifact.clone();
        let mut scheduler = scheduler(pipeline, &service);

        scheduler.revise(0, "make it punchier").await.unwrap();

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Done);
        assert_eq!(unit.artifact, original);
        assert!(unit.error_message.is_some());
    }

    #[tokio::test]
    async fn revision_failing_mid_stream_restores_previous_artifact() {
        let service = ScriptedService::new(vec![Script::FramesThenError(vec![frame(
            "{\"title\": \"Half a new ti",
        )])]);
        let pipeline = done_outline("Original");
        let original = pipeline.unit(0).unwrap().artifact.clone();
        let mut scheduler = scheduler(pipeline, &service);

        scheduler.revise(0, "new title").await.unwrap();

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Done);
        assert_eq!(unit.artifact, original);
        assert!(unit.error_message.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn failed_revision_restores_previous_thought() {
        let service = ScriptedService::new(vec![Script::FramesThenError(vec![frame(
            "Rethinking everything. {\"title\": \"Half",
        )])]);
        let mut pipeline = done_outline("Original");
        pipeline.unit_mut(0).unwrap().thought = "First pass.".into();
        let mut scheduler = scheduler(pipeline, &service);

        scheduler.revise(0, "new title").await.unwrap();

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Done);
        assert_eq!(unit.thought, "First pass.");
    }

    #[tokio::test]
    async fn revision_replaces_artifact_and_sends_context() {
        let service = ScriptedService::new(vec![outline_script("Revised")]);
        let mut scheduler = scheduler(done_outline("Original"), &service);
        let mut updates = scheduler.subscribe();

        scheduler.revise(0, "new title").await.unwrap();

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Done);
        assert_eq!(
            unit.artifact_as::<crate::core::Outline>().unwrap().title,
            "Revised"
        );

        let request = service.requests().pop().unwrap();
        assert_eq!(request.session_id.as_deref(), Some("s-1"));
        assert_eq!(request.variables[REVISION_INSTRUCTIONS_VAR], "new title");
        assert!(request.variables[PREVIOUS_ARTIFACT_VAR].contains("Original"));
        assert!(updates.has_changed().unwrap());
        assert!(updates.borrow_and_update().unit(0).unwrap().artifact.is_some());
    }

    #[tokio::test]
    async fn session_is_established_once_and_reused() {
        let service = ScriptedService::new(vec![
            Script::Frames(vec![
                session_frame("{\"title\": \"A\"}", "first"),
                session_frame("", "second"),
            ]),
            Script::Frames(vec![session_frame("{\"content\": \"b\"}", "third")]),
            content_script("c"),
        ]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        scheduler.run().await;

        assert_eq!(scheduler.pipeline().session.id(), Some("first"));
        let sessions: Vec<Option<String>> =
            service.requests().into_iter().map(|r| r.session_id).collect();
        assert_eq!(
            sessions,
            vec![None, Some("first".to_string()), Some("first".to_string())]
        );
    }

    #[tokio::test]
    async fn resume_coerces_generating_before_scheduling() {
        let mut pipeline = three_unit_pipeline();
        pipeline.unit_mut(0).unwrap().status = UnitStatus::Done;
        pipeline.unit_mut(1).unwrap().status = UnitStatus::Generating;
        let service = ScriptedService::new(vec![]);
        let mut scheduler = scheduler(pipeline, &service);

        assert_eq!(scheduler.pipeline().unit(1).unwrap().status, UnitStatus::Pending);
        assert_eq!(scheduler.tick(), Some(1));
    }

    #[tokio::test]
    async fn cancel_marks_failed_and_keeps_partial_artifact() {
        let service = ScriptedService::new(vec![Script::FramesThenHang(vec![frame(
            "{\"title\": \"Partial",
        )])]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service);
        let cancel = scheduler.cancel_handle();
        let mut updates = scheduler.subscribe();

        let canceller = async move {
            updates
                .wait_for(|p| p.unit(0).is_some_and(|u| u.artifact.is_some()))
                .await
                .unwrap();
            cancel.cancel();
        };
        tokio::join!(scheduler.run(), canceller);

        let unit = scheduler.pipeline().unit(0).unwrap();
        assert_eq!(unit.status, UnitStatus::Failed);
        assert_eq!(
            unit.artifact.as_ref().and_then(Artifact::as_value),
            Some(&json!({"title": "Partial"}))
        );
        assert!(unit.error_message.clone().unwrap().contains("cancelled"));
        assert_eq!(scheduler.pipeline().unit(1).unwrap().status, UnitStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_transitions_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("pipeline.json")));
        let service = ScriptedService::new(vec![outline_script("Saved"), Script::OpenError]);
        let mut scheduler = scheduler(three_unit_pipeline(), &service).with_store(store.clone());
        scheduler.run().await;

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.id, scheduler.pipeline().id);
        assert_eq!(
            statuses(&saved),
            vec![UnitStatus::Done, UnitStatus::Failed, UnitStatus::Pending]
        );
    }
}

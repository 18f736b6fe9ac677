use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::decoder::StreamDecoder;
use crate::errors::{HarnessError, RunFailure, run_failure_from_service_error};
use crate::harness::Harness;
use crate::service::{GenerationRequest, GenerationService};
use crate::stream::{RunEvent, RunOutput};

/// Handle used to request cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// Cancellation is best-effort and becomes visible as a terminal
    /// `RunEvent::Failed(RunFailure::Cancelled)`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

impl Harness {
    /// Validates the request and starts a streaming run.
    ///
    /// The returned `RunStream` yields one `RunEvent::Delta` per decoded frame
    /// followed by exactly one terminal `Completed`/`Failed` event.
    pub async fn start(&self, request: GenerationRequest) -> Result<RunStream, HarnessError> {
        if let Some(key) = request.variables.keys().find(|k| k.trim().is_empty()) {
            return Err(HarnessError::Validation(format!(
                "variable names must not be blank (got {key:?})"
            )));
        }

        let (tx, rx) = mpsc::channel(self.options.stream_buffer_capacity);
        let (abort_tx, abort_rx) = watch::channel(false);
        tokio::spawn(run_task(self.service.clone(), request, tx, abort_rx));

        Ok(RunStream {
            rx,
            abort_handle: AbortHandle { tx: abort_tx },
            terminal: None,
        })
    }
}

/// Streaming handle returned by `Harness::start`.
pub struct RunStream {
    rx: mpsc::Receiver<RunEvent>,
    abort_handle: AbortHandle,
    terminal: Option<Result<RunOutput, RunFailure>>,
}

impl RunStream {
    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next event.
    ///
    /// Returns `None` after the terminal event has been delivered.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        if self.terminal.is_some() {
            return None;
        }
        let event = match self.rx.recv().await {
            Some(event) => event,
            None => RunEvent::Failed(RunFailure::Protocol {
                message: "run task ended without a terminal event".into(),
            }),
        };
        match &event {
            RunEvent::Completed(output) => self.terminal = Some(Ok(output.clone())),
            RunEvent::Failed(failure) => self.terminal = Some(Err(failure.clone())),
            RunEvent::Delta(_) => {}
        }
        Some(event)
    }

    /// Drains the stream (if needed) and returns the terminal result.
    pub async fn finish(mut self) -> Result<RunOutput, RunFailure> {
        while self.next_event().await.is_some() {}
        match self.terminal {
            Some(result) => result,
            None => Err(RunFailure::Protocol {
                message: "run stream closed without a terminal event".into(),
            }),
        }
    }
}

async fn wait_for_abort(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn run_task(
    service: Arc<dyn GenerationService>,
    request: GenerationRequest,
    tx: mpsc::Sender<RunEvent>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let run_id = request.run_id;
    let unit_kind = request.unit_kind;
    let service_name = service.name().to_string();
    debug!(run_id = %run_id, service = %service_name, unit_kind = %unit_kind, "opening generation stream");

    let opened = tokio::select! {
        _ = wait_for_abort(&mut abort_rx) => {
            let _ = tx.send(RunEvent::Failed(RunFailure::Cancelled)).await;
            return;
        }
        opened = service.open_stream(request) => opened,
    };
    let mut chunks = match opened {
        Ok(chunks) => chunks,
        Err(err) => {
            let failure = run_failure_from_service_error(&err);
            let _ = tx.send(RunEvent::Failed(failure)).await;
            return;
        }
    };

    let mut decoder = StreamDecoder::new();
    let mut output = RunOutput::default();
    loop {
        tokio::select! {
            _ = wait_for_abort(&mut abort_rx) => {
                decoder.finish();
                debug!(run_id = %run_id, "generation stream cancelled");
                let _ = tx.send(RunEvent::Failed(RunFailure::Cancelled)).await;
                return;
            }
            next = chunks.next() => {
                match next {
                    Some(Ok(chunk)) => {
                        for event in decoder.push_chunk(&chunk) {
                            output.absorb(&event);
                            if tx.send(RunEvent::Delta(event)).await.is_err() {
                                debug!(run_id = %run_id, "run stream receiver dropped during output");
                                return;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        decoder.finish();
                        let failure = run_failure_from_service_error(&err);
                        let _ = tx.send(RunEvent::Failed(failure)).await;
                        return;
                    }
                    None => {
                        decoder.finish();
                        debug!(
                            run_id = %run_id,
                            text_len = output.text.len() as u64,
                            reasoning_len = output.reasoning.len() as u64,
                            "generation stream completed"
                        );
                        let _ = tx.send(RunEvent::Completed(output)).await;
                        return;
                    }
                }
            }
        }
    }
}

use crate::errors::RunFailure;

/// One decoded protocol frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StreamEvent {
    /// Appended artifact/content text (may be empty).
    pub content_delta: String,
    /// Appended reasoning text when the service emits a separate channel.
    pub reasoning_delta: Option<String>,
    /// Conversation id reported by the service.
    pub session_id: Option<String>,
}

/// Aggregated result of a run that ended normally.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunOutput {
    /// All content deltas concatenated.
    pub text: String,
    /// All reasoning deltas concatenated.
    pub reasoning: String,
    /// First session id seen on the stream.
    pub session_id: Option<String>,
}

impl RunOutput {
    pub(crate) fn absorb(&mut self, event: &StreamEvent) {
        self.text.push_str(&event.content_delta);
        if let Some(reasoning) = &event.reasoning_delta {
            self.reasoning.push_str(reasoning);
        }
        if self.session_id.is_none() {
            self.session_id = event.session_id.clone();
        }
    }
}

/// Events exposed by `RunStream`.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    /// One decoded frame.
    Delta(StreamEvent),
    /// Terminal success: the service ended the stream.
    Completed(RunOutput),
    /// Terminal failure.
    Failed(RunFailure),
}

impl RunEvent {
    /// Whether this is the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

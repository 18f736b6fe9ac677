use docflow_harness::StreamEvent;

use crate::core::{Artifact, ArtifactShape};
use crate::extract::{self, DecodedBuffer};

/// Result of feeding one delta into a `UnitBuffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitProgress {
    pub decoded: DecodedBuffer,
    /// Best artifact recovered so far for this stream.
    pub artifact: Option<Artifact>,
    /// Whether `artifact` differs from the previous delta's.
    pub changed: bool,
}

/// Accumulated text of one unit's stream, re-derived on every delta.
#[derive(Debug, Clone)]
pub struct UnitBuffer {
    shape: ArtifactShape,
    text: String,
    reasoning: String,
    latest: Option<Artifact>,
    decoded: DecodedBuffer,
}

impl UnitBuffer {
    pub fn new(shape: ArtifactShape) -> Self {
        Self {
            shape,
            text: String::new(),
            reasoning: String::new(),
            latest: None,
            decoded: DecodedBuffer::default(),
        }
    }

    pub fn push(&mut self, event: &StreamEvent) -> UnitProgress {
        self.text.push_str(&event.content_delta);
        if let Some(reasoning) = &event.reasoning_delta {
            self.reasoning.push_str(reasoning);
        }
        self.decoded = extract::decode(&self.text);

        let next = match &self.shape {
            ArtifactShape::Structured { fields } => self.structured(fields),
            // Markup is not introduced by a bracket, so the whole text is searched.
            ArtifactShape::Raw { field, language } => extract::extract_raw(&self.text, field, language)
                .map(|markup| Artifact::Raw { markup }),
        };
        let changed = match next {
            Some(artifact) if self.latest.as_ref() != Some(&artifact) => {
                self.latest = Some(artifact);
                true
            }
            _ => false,
        };

        UnitProgress {
            decoded: self.decoded.clone(),
            artifact: self.latest.clone(),
            changed,
        }
    }

    fn structured(&self, fields: &[String]) -> Option<Artifact> {
        let parsed = extract::parse_value(&self.decoded.payload_fragment, fields);
        let value = parsed.value.filter(extract::has_content)?;
        let value = if parsed.is_partial {
            let previous = self.latest.as_ref().and_then(Artifact::as_value);
            extract::merge_monotonic(previous, value)
        } else {
            value
        };
        Some(Artifact::Structured {
            value,
            is_partial: parsed.is_partial,
        })
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.latest.as_ref()
    }

    pub fn into_artifact(self) -> Option<Artifact> {
        self.latest
    }

    /// The separate reasoning channel when the service sent one, otherwise the
    /// text before the payload.
    pub fn thought(&self) -> &str {
        if self.reasoning.is_empty() {
            &self.decoded.thought
        } else {
            &self.reasoning
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

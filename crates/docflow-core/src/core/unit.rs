use std::collections::BTreeMap;

use docflow_harness::UnitKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::extract::ArtifactSchema;

/// Lifecycle status of a generation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    Pending,
    Generating,
    Done,
    Failed,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// What a unit's payload is expected to look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactShape {
    /// A JSON object; `fields` are recovered one by one while it is unclosed.
    Structured { fields: Vec<String> },
    /// Markup carried in `field`, or fenced as `language`, or bare.
    Raw { field: String, language: String },
}

impl ArtifactShape {
    /// Structured shape whose fields come from a schema type.
    pub fn structured<T: ArtifactSchema>() -> Self {
        Self::Structured {
            fields: T::STREAMED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn raw(field: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Raw {
            field: field.into(),
            language: language.into(),
        }
    }

    /// Default shape for a unit kind.
    pub fn for_kind(kind: UnitKind) -> Self {
        match kind {
            UnitKind::Outline => Self::structured::<Outline>(),
            UnitKind::Content => Self::structured::<SectionContent>(),
            UnitKind::Layout => Self::raw("html", "html"),
        }
    }
}

/// Best artifact recovered so far for a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    Structured { value: Value, is_partial: bool },
    Raw { markup: String },
}

impl Artifact {
    /// Text form used when the artifact is sent back for revision.
    pub fn to_text(&self) -> String {
        match self {
            Self::Structured { value, .. } => value.to_string(),
            Self::Raw { markup } => markup.clone(),
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Structured { value, .. } => Some(value),
            Self::Raw { .. } => None,
        }
    }

    pub fn as_markup(&self) -> Option<&str> {
        match self {
            Self::Structured { .. } => None,
            Self::Raw { markup } => Some(markup),
        }
    }
}

/// One request/stream/parse cycle of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationUnit {
    pub index: usize,
    pub kind: UnitKind,
    pub shape: ArtifactShape,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub status: UnitStatus,
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl GenerationUnit {
    /// A pending unit with the default shape for `kind`. The index is assigned
    /// by the pipeline.
    pub fn new(kind: UnitKind) -> Self {
        Self {
            index: 0,
            kind,
            shape: ArtifactShape::for_kind(kind),
            variables: BTreeMap::new(),
            status: UnitStatus::Pending,
            artifact: None,
            thought: String::new(),
            error_message: None,
        }
    }

    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn shape(mut self, shape: ArtifactShape) -> Self {
        self.shape = shape;
        self
    }

    /// Deserializes a structured artifact into `T`.
    pub fn artifact_as<T: ArtifactSchema>(&self) -> Option<T> {
        let value = self.artifact.as_ref()?.as_value()?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Document outline produced by the first unit of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outline {
    pub title: String,
    pub summary: String,
    pub sections: Vec<OutlineSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSection {
    pub title: String,
    pub summary: String,
}

impl ArtifactSchema for Outline {
    const STREAMED_FIELDS: &'static [&'static str] = &["title", "summary", "sections"];
}

/// Body of one content section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionContent {
    pub title: String,
    pub content: String,
}

impl ArtifactSchema for SectionContent {
    const STREAMED_FIELDS: &'static [&'static str] = &["title", "content"];
}

mod pipeline;
mod unit;

pub use pipeline::{Pipeline, Session};
pub use unit::{
    Artifact, ArtifactShape, GenerationUnit, Outline, OutlineSection, SectionContent,
    UnitStatus,
};

//! Pipeline shape: one outline, one content unit per outline section, one layout.

use docflow_core::{GenerationUnit, Outline, Pipeline, SectionContent};
use docflow_harness::UnitKind;
use serde_json::{Value, json};

pub const TOPIC_VAR: &str = "topic";
pub const AUDIENCE_VAR: &str = "audience";

/// A fresh pipeline holding only the outline unit.
pub fn new_pipeline(topic: &str, audience: Option<&str>) -> Pipeline {
    let mut outline = GenerationUnit::new(UnitKind::Outline).variable(TOPIC_VAR, topic);
    if let Some(audience) = audience {
        outline = outline.variable(AUDIENCE_VAR, audience);
    }
    Pipeline::new(vec![outline])
}

/// Units to append once every existing unit is done. Empty when the pipeline is
/// unfinished or already has its layout.
pub fn next_units(pipeline: &Pipeline) -> Vec<GenerationUnit> {
    if !pipeline.is_complete() {
        return Vec::new();
    }
    let units = pipeline.units();
    let Some(outline) = units
        .iter()
        .find(|u| u.kind == UnitKind::Outline)
        .and_then(|u| u.artifact_as::<Outline>())
    else {
        return Vec::new();
    };
    let has = |kind: UnitKind| units.iter().any(|u| u.kind == kind);

    if !has(UnitKind::Content) && !outline.sections.is_empty() {
        return content_units(&outline, topic(pipeline));
    }
    if !has(UnitKind::Layout) {
        return vec![layout_unit(&outline, pipeline)];
    }
    Vec::new()
}

fn topic(pipeline: &Pipeline) -> &str {
    pipeline
        .unit(0)
        .and_then(|u| u.variables.get(TOPIC_VAR))
        .map(String::as_str)
        .unwrap_or_default()
}

fn content_units(outline: &Outline, topic: &str) -> Vec<GenerationUnit> {
    outline
        .sections
        .iter()
        .enumerate()
        .map(|(position, section)| {
            GenerationUnit::new(UnitKind::Content)
                .variable(TOPIC_VAR, topic)
                .variable("document_title", outline.title.as_str())
                .variable("section_number", (position + 1).to_string())
                .variable("section_title", section.title.as_str())
                .variable("section_summary", section.summary.as_str())
        })
        .collect()
}

fn layout_unit(outline: &Outline, pipeline: &Pipeline) -> GenerationUnit {
    let sections: Vec<Value> = pipeline
        .units()
        .iter()
        .filter(|u| u.kind == UnitKind::Content)
        .filter_map(|u| u.artifact_as::<SectionContent>())
        .map(|s| json!({ "title": s.title, "content": s.content }))
        .collect();
    GenerationUnit::new(UnitKind::Layout)
        .variable("document_title", outline.title.as_str())
        .variable("document_summary", outline.summary.as_str())
        .variable("sections", Value::Array(sections).to_string())
}

/// Markup of the layout unit, when it has one.
pub fn layout_markup(pipeline: &Pipeline) -> Option<&str> {
    pipeline
        .units()
        .iter()
        .rev()
        .find(|u| u.kind == UnitKind::Layout)
        .and_then(|u| u.artifact.as_ref())
        .and_then(|a| a.as_markup())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::{Artifact, UnitStatus};

    fn finish(pipeline: &mut Pipeline, index: usize, artifact: Artifact) {
        let mut units = pipeline.units().to_vec();
        units[index].status = UnitStatus::Done;
        units[index].artifact = Some(artifact);
        *pipeline = Pipeline::new(units);
    }

    fn outline_done() -> Pipeline {
        let mut pipeline = new_pipeline("tide pools", Some("kids"));
        finish(
            &mut pipeline,
            0,
            Artifact::Structured {
                value: json!({
                    "title": "Tide Pools",
                    "summary": "Life between tides",
                    "sections": [
                        {"title": "Anemones", "summary": "Soft predators"},
                        {"title": "Crabs", "summary": "Armored scavengers"}
                    ]
                }),
                is_partial: false,
            },
        );
        pipeline
    }

    #[test]
    fn nothing_to_append_while_outline_is_pending() {
        let pipeline = new_pipeline("tide pools", None);
        assert!(next_units(&pipeline).is_empty());
        assert_eq!(
            pipeline.unit(0).unwrap().variables.get(TOPIC_VAR).map(String::as_str),
            Some("tide pools")
        );
    }

    #[test]
    fn outline_expands_into_content_units() {
        let pipeline = outline_done();
        let units = next_units(&pipeline);
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.kind == UnitKind::Content));
        assert_eq!(units[1].variables["section_title"], "Crabs");
        assert_eq!(units[1].variables["section_number"], "2");
        assert_eq!(units[0].variables[TOPIC_VAR], "tide pools");
    }

    #[test]
    fn outline_without_sections_goes_straight_to_layout() {
        let mut pipeline = new_pipeline("haiku", None);
        finish(
            &mut pipeline,
            0,
            Artifact::Structured {
                value: json!({"title": "Haiku", "summary": "Short", "sections": []}),
                is_partial: false,
            },
        );
        let units = next_units(&pipeline);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].kind, UnitKind::Layout);
        assert_eq!(units[0].variables["sections"], "[]");

        pipeline.push(units.into_iter().next().unwrap());
        finish(
            &mut pipeline,
            1,
            Artifact::Raw {
                markup: "<html></html>".into(),
            },
        );
        assert!(next_units(&pipeline).is_empty());
    }

    #[test]
    fn finished_content_adds_layout_then_nothing() {
        let mut pipeline = outline_done();
        for unit in next_units(&pipeline) {
            pipeline.push(unit);
        }
        for index in 1..=2 {
            finish(
                &mut pipeline,
                index,
                Artifact::Structured {
                    value: json!({"title": format!("S{index}"), "content": "body"}),
                    is_partial: false,
                },
            );
        }
        let layout = next_units(&pipeline);
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].kind, UnitKind::Layout);
        assert!(layout[0].variables["sections"].contains("S2"));

        pipeline.push(layout.into_iter().next().unwrap());
        assert_eq!(pipeline.unit(3).unwrap().status, UnitStatus::Pending);
        finish(
            &mut pipeline,
            3,
            Artifact::Raw {
                markup: "<html></html>".into(),
            },
        );
        assert!(next_units(&pipeline).is_empty());
        assert_eq!(layout_markup(&pipeline), Some("<html></html>"));
    }
}

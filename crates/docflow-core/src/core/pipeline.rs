use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::unit::{GenerationUnit, UnitStatus};

/// Conversation context shared by every unit of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub session_id: Option<String>,
}

impl Session {
    pub fn id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Records `id` if no session is established yet. Returns whether it was
    /// recorded; an established id is never overwritten.
    pub fn establish(&mut self, id: &str) -> bool {
        if self.session_id.is_some() || id.is_empty() {
            return false;
        }
        self.session_id = Some(id.to_string());
        true
    }
}

/// Ordered generation units plus their shared session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    units: Vec<GenerationUnit>,
    #[serde(default)]
    pub session: Session,
}

impl Pipeline {
    /// Builds a pipeline; units are reindexed in the given order.
    pub fn new(units: Vec<GenerationUnit>) -> Self {
        let mut pipeline = Self {
            id: Uuid::new_v4(),
            units,
            session: Session::default(),
        };
        for (index, unit) in pipeline.units.iter_mut().enumerate() {
            unit.index = index;
        }
        pipeline
    }

    /// Appends a later unit in `pending`. Returns its index.
    pub fn push(&mut self, mut unit: GenerationUnit) -> usize {
        let index = self.units.len();
        unit.index = index;
        unit.status = UnitStatus::Pending;
        unit.artifact = None;
        unit.error_message = None;
        self.units.push(unit);
        index
    }

    pub fn units(&self) -> &[GenerationUnit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&GenerationUnit> {
        self.units.get(index)
    }

    pub(crate) fn unit_mut(&mut self, index: usize) -> Option<&mut GenerationUnit> {
        self.units.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Restores a serialized pipeline. Resume coercion is applied.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut pipeline: Self = serde_json::from_str(json)?;
        pipeline.resume();
        Ok(pipeline)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Coerces every `generating` unit back to `pending` (a restored run has no
    /// live stream). Returns how many units were coerced.
    pub fn resume(&mut self) -> usize {
        let mut coerced = 0;
        for unit in &mut self.units {
            if unit.status == UnitStatus::Generating {
                unit.status = UnitStatus::Pending;
                coerced += 1;
            }
        }
        coerced
    }

    pub fn is_complete(&self) -> bool {
        self.units.iter().all(|u| u.status == UnitStatus::Done)
    }

    /// Index of the failed unit the pipeline is halted at, if any: the first
    /// unit that is not `done`, when it is `failed`.
    pub fn halted_at(&self) -> Option<usize> {
        self.first_unfinished()
            .filter(|u| u.status == UnitStatus::Failed)
            .map(|u| u.index)
    }

    pub(crate) fn first_unfinished(&self) -> Option<&GenerationUnit> {
        self.units.iter().find(|u| u.status != UnitStatus::Done)
    }

    pub fn generating(&self) -> Option<usize> {
        self.units
            .iter()
            .position(|u| u.status == UnitStatus::Generating)
    }
}

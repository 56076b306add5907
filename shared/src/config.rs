use crate::models::{ServiceLine, Stage};
use serde::{Deserialize, Serialize};

/// Global TCV band controlling stage *durations* (spec.md §3). Bands are
/// well-ordered by `min_tcv` and cover `[0, ∞)`; negative TCVs map to no
/// band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityCategory {
    pub id: i64,
    pub name: String,
    pub min_tcv: f64,
    /// `None` means unbounded.
    pub max_tcv: Option<f64>,
    pub stage_01_duration_weeks: u32,
    pub stage_02_duration_weeks: u32,
    pub stage_03_duration_weeks: u32,
    pub stage_04a_duration_weeks: u32,
    pub stage_04b_duration_weeks: u32,
    pub stage_05a_duration_weeks: u32,
    pub stage_05b_duration_weeks: u32,
    pub stage_06_duration_weeks: u32,
}

impl OpportunityCategory {
    pub fn duration_weeks(&self, stage: Stage) -> u32 {
        match stage {
            Stage::S01 => self.stage_01_duration_weeks,
            Stage::S02 => self.stage_02_duration_weeks,
            Stage::S03 => self.stage_03_duration_weeks,
            Stage::S04A => self.stage_04a_duration_weeks,
            Stage::S04B => self.stage_04b_duration_weeks,
            Stage::S05A => self.stage_05a_duration_weeks,
            Stage::S05B => self.stage_05b_duration_weeks,
            Stage::S06 => self.stage_06_duration_weeks,
        }
    }
}

/// Per-service-line TCV band controlling *FTE* (spec.md §3). Structured like
/// `OpportunityCategory` but scoped to one service line, without duration
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineCategory {
    pub id: i64,
    pub service_line: ServiceLine,
    pub name: String,
    pub min_tcv: f64,
    pub max_tcv: Option<f64>,
}

/// FTE template row: `(service_line, service_line_category, stage_name) →
/// fte_required`. At most one row per triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineStageEffort {
    pub service_line: ServiceLine,
    pub service_line_category: String,
    pub stage_name: Stage,
    pub fte_required: f64,
}

/// Per `(service_line, stage_name)`: the offering-count threshold and
/// increment applied above it. Absence of a row means "no multiplier
/// applies at this stage".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineOfferingThreshold {
    pub service_line: ServiceLine,
    pub stage_name: Stage,
    pub threshold_count: u32,
    pub increment_multiplier: f64,
}

/// Asserts that a line item whose `(internal_service, simplified_offering)`
/// matches this tuple is a distinct offering counted toward `service_line`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceLineOfferingMapping {
    pub service_line: ServiceLine,
    pub internal_service: String,
    pub simplified_offering: String,
}

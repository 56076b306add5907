use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Revenue-bearing service line codes. `{MW, ITOC}` is the resource-planned
/// subset that the scheduler ever generates timelines for; the rest only
/// ever appear in revenue breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceLine {
    Ces,
    Ins,
    Bps,
    Sec,
    Itoc,
    Mw,
}

impl ServiceLine {
    pub const REVENUE_BEARING: [ServiceLine; 6] = [
        ServiceLine::Ces,
        ServiceLine::Ins,
        ServiceLine::Bps,
        ServiceLine::Sec,
        ServiceLine::Itoc,
        ServiceLine::Mw,
    ];

    /// The subset the scheduler generates timelines for.
    pub const RESOURCE_PLANNED: [ServiceLine; 2] = [ServiceLine::Mw, ServiceLine::Itoc];

    pub fn is_resource_planned(self) -> bool {
        matches!(self, ServiceLine::Mw | ServiceLine::Itoc)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ServiceLine::Ces => "CES",
            ServiceLine::Ins => "INS",
            ServiceLine::Bps => "BPS",
            ServiceLine::Sec => "SEC",
            ServiceLine::Itoc => "ITOC",
            ServiceLine::Mw => "MW",
        }
    }

    pub fn parse(code: &str) -> Option<ServiceLine> {
        match code.to_ascii_uppercase().as_str() {
            "CES" => Some(ServiceLine::Ces),
            "INS" => Some(ServiceLine::Ins),
            "BPS" => Some(ServiceLine::Bps),
            "SEC" => Some(ServiceLine::Sec),
            "ITOC" => Some(ServiceLine::Itoc),
            "MW" => Some(ServiceLine::Mw),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The fixed, ordered sales stage code set. Unknown codes are treated as
/// `"01"` everywhere a stage is parsed (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum Stage {
    #[serde(rename = "01")]
    #[sqlx(rename = "01")]
    S01,
    #[serde(rename = "02")]
    #[sqlx(rename = "02")]
    S02,
    #[serde(rename = "03")]
    #[sqlx(rename = "03")]
    S03,
    #[serde(rename = "04A")]
    #[sqlx(rename = "04A")]
    S04A,
    #[serde(rename = "04B")]
    #[sqlx(rename = "04B")]
    S04B,
    #[serde(rename = "05A")]
    #[sqlx(rename = "05A")]
    S05A,
    #[serde(rename = "05B")]
    #[sqlx(rename = "05B")]
    S05B,
    #[serde(rename = "06")]
    #[sqlx(rename = "06")]
    S06,
}

pub const STAGE_ORDER: [Stage; 8] = [
    Stage::S01,
    Stage::S02,
    Stage::S03,
    Stage::S04A,
    Stage::S04B,
    Stage::S05A,
    Stage::S05B,
    Stage::S06,
];

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::S01 => "01",
            Stage::S02 => "02",
            Stage::S03 => "03",
            Stage::S04A => "04A",
            Stage::S04B => "04B",
            Stage::S05A => "05A",
            Stage::S05B => "05B",
            Stage::S06 => "06",
        }
    }

    /// Unknown or absent codes resolve to `"01"` — all stages remain.
    pub fn parse_or_first(code: Option<&str>) -> Stage {
        match code {
            Some(c) => Self::parse(c).unwrap_or(Stage::S01),
            None => Stage::S01,
        }
    }

    pub fn parse(code: &str) -> Option<Stage> {
        STAGE_ORDER.iter().find(|s| s.as_str() == code).copied()
    }

    pub fn index(self) -> usize {
        STAGE_ORDER.iter().position(|s| *s == self).expect("stage always in STAGE_ORDER")
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resource status lifecycle: machine-generated, human-reviewed, committed.
/// Bulk regeneration must never overwrite `Forecast` or `Planned` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text")]
pub enum ResourceStatus {
    Predicted,
    Forecast,
    Planned,
}

impl ResourceStatus {
    pub fn parse(value: &str) -> Option<ResourceStatus> {
        match value {
            "Predicted" => Some(ResourceStatus::Predicted),
            "Forecast" => Some(ResourceStatus::Forecast),
            "Planned" => Some(ResourceStatus::Planned),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceStatus::Predicted => "Predicted",
            ResourceStatus::Forecast => "Forecast",
            ResourceStatus::Planned => "Planned",
        };
        write!(f, "{}", s)
    }
}

/// Per-service-line revenue split on an opportunity. Missing/null values are
/// treated as zero for resource-planning purposes (spec.md §9).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub ces: Option<f64>,
    pub ins: Option<f64>,
    pub bps: Option<f64>,
    pub sec: Option<f64>,
    pub itoc: Option<f64>,
    pub mw: Option<f64>,
}

impl RevenueSplit {
    pub fn get(&self, service_line: ServiceLine) -> f64 {
        match service_line {
            ServiceLine::Ces => self.ces,
            ServiceLine::Ins => self.ins,
            ServiceLine::Bps => self.bps,
            ServiceLine::Sec => self.sec,
            ServiceLine::Itoc => self.itoc,
            ServiceLine::Mw => self.mw,
        }
        .unwrap_or(0.0)
    }
}

/// A sales opportunity as read from the upstream loader. The core never
/// creates, updates, or deletes these — only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub opportunity_id: String,
    pub tcv: f64,
    pub decision_date: Option<NaiveDate>,
    pub sales_stage: Option<String>,
    pub lead_offering: Option<ServiceLine>,
    pub revenue: RevenueSplit,
}

impl Opportunity {
    pub fn current_stage(&self) -> Stage {
        Stage::parse_or_first(self.sales_stage.as_deref())
    }
}

/// A child line item of an opportunity, carrying the offering taxonomy
/// fields the offering multiplier reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityLineItem {
    pub opportunity_id: String,
    pub internal_service: Option<String>,
    pub simplified_offering: Option<String>,
}

/// One materialized stage interval, as stored by the timeline persistor and
/// read by the portfolio aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityResourceTimeline {
    pub opportunity_id: String,
    pub service_line: ServiceLine,
    pub stage_name: Stage,
    pub stage_start_date: NaiveDate,
    pub stage_end_date: NaiveDate,
    pub duration_weeks: u32,
    pub fte_required: f64,
    pub total_effort_weeks: f64,
    pub category: Option<String>,
    pub resource_category: Option<String>,
    pub decision_date: NaiveDate,
    pub calculated_date: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub resource_status: ResourceStatus,
}

/// A single backward-scheduled stage interval for one service line, prior
/// to being assigned a resource status and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageInterval {
    pub service_line: ServiceLine,
    pub stage_name: Stage,
    pub stage_start_date: NaiveDate,
    pub stage_end_date: NaiveDate,
    pub duration_weeks: u32,
    pub fte_required: f64,
    pub total_effort_weeks: f64,
    pub resource_category: String,
}

/// The full per-opportunity timeline produced by `build_timeline`
/// (spec.md §4.E continued), before persistence.
#[derive(Debug, Clone, Default)]
pub struct TimelineBundle {
    pub category: Option<String>,
    pub per_service_line: Vec<(ServiceLine, Vec<StageInterval>)>,
    pub service_line_categories: Vec<(ServiceLine, String)>,
}

/// Filters accepted by the portfolio aggregator (spec.md §4.G) and by
/// `store::TimelineStore` queries that back it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioFilter {
    pub service_lines: Vec<ServiceLine>,
    pub categories: Vec<String>,
    pub stages: Vec<Stage>,
    /// Filters by the *opportunity's* current sales stage, not the row's
    /// stage name — used by the stage-resource timeline shape.
    pub opportunity_sales_stages: Vec<Stage>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl PortfolioFilter {
    pub fn matches(&self, row: &OpportunityResourceTimeline) -> bool {
        if !self.service_lines.is_empty() && !self.service_lines.contains(&row.service_line) {
            return false;
        }
        if !self.categories.is_empty() {
            match &row.category {
                Some(c) if self.categories.contains(c) => {}
                _ => return false,
            }
        }
        if !self.stages.is_empty() && !self.stages.contains(&row.stage_name) {
            return false;
        }
        true
    }
}

/// Partial update applied by `patch_interval` (spec.md §4.F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalPatch {
    pub stage_start_date: NaiveDate,
    pub stage_end_date: NaiveDate,
    pub duration_weeks: u32,
    pub fte_required: f64,
    pub resource_status: ResourceStatus,
}

/// Bucket granularity accepted by `portfolio_forecast` (spec.md §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Week,
    Month,
    Quarter,
}

impl Bucket {
    pub fn parse(value: &str) -> Option<Bucket> {
        match value.to_ascii_lowercase().as_str() {
            "week" => Some(Bucket::Week),
            "month" => Some(Bucket::Month),
            "quarter" => Some(Bucket::Quarter),
            _ => None,
        }
    }
}

impl TimelineBundle {
    pub fn total_fte(&self) -> f64 {
        self.per_service_line
            .iter()
            .flat_map(|(_, intervals)| intervals.iter())
            .map(|i| i.fte_required)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.per_service_line.iter().all(|(_, i)| i.is_empty())
    }
}

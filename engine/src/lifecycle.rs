//! Timeline persistor & lifecycle (spec.md §4.F): generation, status/data
//! patches, bulk regeneration with idempotent status handling, and the
//! supplemented generation-stats verb (SPEC_FULL §5).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    CoreError, CoreResult, IntervalPatch, Opportunity, OpportunityCategory,
    OpportunityResourceTimeline, ResourceStatus, ServiceLine, ServiceLineCategory,
    ServiceLineOfferingMapping, ServiceLineOfferingThreshold, ServiceLineStageEffort, Stage,
    TimelineBundle, STAGE_ORDER,
};
use store::{ConfigStore, EntityStore, TimelineStore};

use crate::category::{resolve_opportunity_category, resolve_service_line_category};
use crate::scheduler::{build_timeline, target_service_lines, SchedulingConfig};

/// A snapshot of every configuration row the scheduler could need across any
/// opportunity, loaded once per request (spec.md §4.A: "all reads can be
/// satisfied per-opportunity").
pub(crate) struct ConfigSnapshot {
    pub(crate) opportunity_categories: Vec<OpportunityCategory>,
    pub(crate) service_line_categories: Vec<ServiceLineCategory>,
    pub(crate) stage_effort: Vec<ServiceLineStageEffort>,
    pub(crate) offering_mappings: Vec<ServiceLineOfferingMapping>,
    pub(crate) offering_thresholds: Vec<ServiceLineOfferingThreshold>,
}

impl ConfigSnapshot {
    fn as_scheduling_config(&self) -> SchedulingConfig<'_> {
        SchedulingConfig {
            opportunity_categories: &self.opportunity_categories,
            service_line_categories: &self.service_line_categories,
            stage_effort: &self.stage_effort,
            offering_mappings: &self.offering_mappings,
            offering_thresholds: &self.offering_thresholds,
        }
    }
}

pub(crate) async fn load_snapshot(config: &dyn ConfigStore) -> CoreResult<ConfigSnapshot> {
    let opportunity_categories = config.opportunity_categories().await?;

    let mut service_line_categories = Vec::new();
    let mut stage_effort = Vec::new();
    let mut offering_mappings = Vec::new();
    let mut offering_thresholds = Vec::new();

    for sl in ServiceLine::RESOURCE_PLANNED {
        service_line_categories.extend(config.service_line_categories(sl).await?);
        stage_effort.extend(config.stage_effort(sl).await?);
        offering_mappings.extend(config.offering_mappings(sl).await?);
        for stage in STAGE_ORDER {
            if let Some(threshold) = config.offering_threshold(sl, stage).await? {
                offering_thresholds.push(threshold);
            }
        }
    }

    Ok(ConfigSnapshot {
        opportunity_categories,
        service_line_categories,
        stage_effort,
        offering_mappings,
        offering_thresholds,
    })
}

/// Per-service-line eligibility (spec.md §9 Open Questions: the
/// per-service-line form is canonical): has a decision date, resolves an
/// opportunity category, and has at least one target service line with both
/// a resolvable resource category and a stage-effort template.
pub(crate) fn is_eligible(opportunity: &Opportunity, snapshot: &ConfigSnapshot) -> bool {
    if opportunity.decision_date.is_none() {
        return false;
    }
    if resolve_opportunity_category(&snapshot.opportunity_categories, opportunity.tcv).is_none() {
        return false;
    }

    target_service_lines(opportunity).into_iter().any(|(sl, sl_tcv)| {
        match resolve_service_line_category(&snapshot.service_line_categories, sl, sl_tcv) {
            Some(resource_category) => snapshot
                .stage_effort
                .iter()
                .any(|e| e.service_line == sl && e.service_line_category == resource_category),
            None => false,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationAction {
    Generated,
    Updated,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedOpportunity {
    pub opportunity_id: String,
    pub action: GenerationAction,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkGenerationResult {
    pub generated: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub outcomes: Vec<ProcessedOpportunity>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total: u64,
    pub eligible: u64,
    pub existing: u64,
    pub predicted: u64,
}

pub struct Lifecycle {
    config: Arc<dyn ConfigStore>,
    entities: Arc<dyn EntityStore>,
    timelines: Arc<dyn TimelineStore>,
}

impl Lifecycle {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        entities: Arc<dyn EntityStore>,
        timelines: Arc<dyn TimelineStore>,
    ) -> Self {
        Self { config, entities, timelines }
    }

    async fn compute(&self, opportunity_id: &str) -> CoreResult<(Opportunity, TimelineBundle)> {
        let opportunity = self
            .entities
            .get_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(opportunity_id.to_string()))?;
        let line_items = self.entities.line_items(opportunity_id).await?;
        let snapshot = load_snapshot(self.config.as_ref()).await?;
        let bundle = build_timeline(&opportunity, &line_items, &snapshot.as_scheduling_config())?;
        Ok((opportunity, bundle))
    }

    /// `compute_timeline` / `calculate_and_store` (spec.md §6, §4.F). An
    /// uncategorized opportunity (no resolvable timeline category) yields an
    /// empty bundle with no error and nothing persisted; a categorized
    /// opportunity whose scheduled intervals sum to zero FTE fails with
    /// `ZeroEffortTimeline`.
    pub async fn calculate_and_store(
        &self,
        opportunity_id: &str,
        status: ResourceStatus,
    ) -> CoreResult<(TimelineBundle, usize)> {
        let (opportunity, bundle) = self.compute(opportunity_id).await?;

        if bundle.category.is_none() {
            return Ok((bundle, 0));
        }

        if bundle.total_fte() <= 0.0 {
            return Err(CoreError::ZeroEffortTimeline(opportunity_id.to_string()));
        }

        let now = Utc::now();
        let rows = to_timeline_rows(&opportunity, &bundle, status, now);
        let count = rows.len();
        self.timelines.replace_for_opportunity(opportunity_id, rows).await?;
        Ok((bundle, count))
    }

    pub async fn get_timeline(&self, opportunity_id: &str) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        if self.entities.get_opportunity(opportunity_id).await?.is_none() {
            return Err(CoreError::NotFound(opportunity_id.to_string()));
        }
        self.timelines.rows_for_opportunity(opportunity_id).await
    }

    pub async fn delete_timeline(&self, opportunity_id: &str) -> CoreResult<u64> {
        if self.entities.get_opportunity(opportunity_id).await?.is_none() {
            return Err(CoreError::NotFound(opportunity_id.to_string()));
        }
        let count = self.timelines.delete_for_opportunity(opportunity_id).await?;
        if count == 0 {
            return Err(CoreError::NoMatchingRows(opportunity_id.to_string()));
        }
        Ok(count)
    }

    pub async fn patch_status(
        &self,
        opportunity_id: &str,
        service_line: Option<ServiceLine>,
        stage: Option<Stage>,
        status: ResourceStatus,
    ) -> CoreResult<u64> {
        let now = Utc::now();
        let updated = self.timelines.update_status(opportunity_id, service_line, stage, status, now).await?;
        if updated == 0 {
            return Err(CoreError::NoMatchingRows(opportunity_id.to_string()));
        }
        Ok(updated)
    }

    pub async fn patch_interval(
        &self,
        opportunity_id: &str,
        service_line: ServiceLine,
        stage: Stage,
        patch: IntervalPatch,
    ) -> CoreResult<OpportunityResourceTimeline> {
        let now = Utc::now();
        self.timelines
            .update_interval(opportunity_id, service_line, stage, patch, now)
            .await?
            .ok_or_else(|| CoreError::NotFound(opportunity_id.to_string()))
    }

    pub async fn clear_predicted(&self) -> CoreResult<u64> {
        self.timelines.delete_by_status(ResourceStatus::Predicted).await
    }

    /// `generate_bulk` (spec.md §4.F, §6). Never fails as a whole; every
    /// opportunity gets an outcome and the counts are tallied from them.
    pub async fn generate_bulk(&self, regenerate_predicted: bool) -> CoreResult<BulkGenerationResult> {
        let opportunities = self.entities.list_opportunities().await?;
        let mut result = BulkGenerationResult::default();

        for opportunity in opportunities {
            let outcome = self.process_one(&opportunity, regenerate_predicted).await;
            match outcome.action {
                GenerationAction::Generated => result.generated += 1,
                GenerationAction::Updated => result.updated += 1,
                GenerationAction::Skipped => result.skipped += 1,
                GenerationAction::Error => result.errors += 1,
            }
            result.outcomes.push(outcome);
        }

        Ok(result)
    }

    async fn process_one(&self, opportunity: &Opportunity, regenerate_predicted: bool) -> ProcessedOpportunity {
        let opportunity_id = opportunity.opportunity_id.clone();

        let existing = match self.timelines.rows_for_opportunity(&opportunity_id).await {
            Ok(rows) => rows,
            Err(e) => {
                return ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Error,
                    reason: e.to_string(),
                }
            }
        };

        let snapshot = match load_snapshot(self.config.as_ref()).await {
            Ok(s) => s,
            Err(e) => {
                return ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Error,
                    reason: e.to_string(),
                }
            }
        };

        let eligible = is_eligible(opportunity, &snapshot);

        if existing.is_empty() {
            if !eligible {
                return ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Skipped,
                    reason: "opportunity is not eligible for generation".into(),
                };
            }
            return match self.calculate_and_store(&opportunity_id, ResourceStatus::Predicted).await {
                Ok((_, 0)) => ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Skipped,
                    reason: "scheduling produced an empty timeline".into(),
                },
                Ok(_) => ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Generated,
                    reason: "generated a new predicted timeline".into(),
                },
                Err(CoreError::ZeroEffortTimeline(_)) => ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Skipped,
                    reason: "scheduling produced zero total FTE".into(),
                },
                Err(e) => ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Error,
                    reason: e.to_string(),
                },
            };
        }

        let has_non_predicted = match self.timelines.has_non_predicted_rows(&opportunity_id).await {
            Ok(v) => v,
            Err(e) => {
                return ProcessedOpportunity {
                    opportunity_id,
                    action: GenerationAction::Error,
                    reason: e.to_string(),
                }
            }
        };
        if has_non_predicted {
            return ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Skipped,
                reason: "existing rows include a Forecast or Planned status".into(),
            };
        }

        if !regenerate_predicted {
            return ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Skipped,
                reason: "regenerate_predicted was not requested".into(),
            };
        }

        if !eligible {
            return ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Skipped,
                reason: "opportunity is no longer eligible for generation".into(),
            };
        }

        match self.calculate_and_store(&opportunity_id, ResourceStatus::Predicted).await {
            Ok(_) => ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Updated,
                reason: "regenerated the predicted timeline".into(),
            },
            Err(CoreError::ZeroEffortTimeline(_)) => ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Skipped,
                reason: "scheduling produced zero total FTE".into(),
            },
            Err(e) => ProcessedOpportunity {
                opportunity_id,
                action: GenerationAction::Error,
                reason: e.to_string(),
            },
        }
    }

    /// Supplemented `generation_stats` verb (SPEC_FULL §5, grounded on the
    /// original's `TimelineGenerationStats`).
    pub async fn generation_stats(&self) -> CoreResult<GenerationStats> {
        let opportunities = self.entities.list_opportunities().await?;
        let snapshot = load_snapshot(self.config.as_ref()).await?;
        let all_rows = self.timelines.all_rows().await?;

        let total = opportunities.len() as u64;
        let eligible = opportunities.iter().filter(|o| is_eligible(o, &snapshot)).count() as u64;

        let mut existing_ids = std::collections::HashSet::new();
        let mut predicted_ids = std::collections::HashSet::new();
        for row in &all_rows {
            existing_ids.insert(row.opportunity_id.as_str());
            if row.resource_status == ResourceStatus::Predicted {
                predicted_ids.insert(row.opportunity_id.as_str());
            }
        }

        Ok(GenerationStats {
            total,
            eligible,
            existing: existing_ids.len() as u64,
            predicted: predicted_ids.len() as u64,
        })
    }
}

fn to_timeline_rows(
    opportunity: &Opportunity,
    bundle: &TimelineBundle,
    status: ResourceStatus,
    now: chrono::DateTime<Utc>,
) -> Vec<OpportunityResourceTimeline> {
    let decision_date = opportunity
        .decision_date
        .expect("calculate_and_store already rejected missing decision dates");

    bundle
        .per_service_line
        .iter()
        .flat_map(|(service_line, intervals)| {
            let service_line = *service_line;
            intervals.iter().map(move |interval| OpportunityResourceTimeline {
                opportunity_id: opportunity.opportunity_id.clone(),
                service_line,
                stage_name: interval.stage_name,
                stage_start_date: interval.stage_start_date,
                stage_end_date: interval.stage_end_date,
                duration_weeks: interval.duration_weeks,
                fte_required: interval.fte_required,
                total_effort_weeks: interval.total_effort_weeks,
                category: bundle.category.clone(),
                resource_category: Some(interval.resource_category.clone()),
                decision_date,
                calculated_date: now,
                last_updated: now,
                resource_status: status,
            })
        })
        .collect()
}

//! Backward stage scheduling (spec.md §4.E): given a decision date, current
//! stage, category, and resource category, produces the backward-computed
//! timeline per service line.

use chrono::{Days, NaiveDate};
use shared::{
    CoreError, CoreResult, Opportunity, OpportunityCategory, OpportunityLineItem,
    ServiceLine, ServiceLineCategory, ServiceLineOfferingMapping, ServiceLineOfferingThreshold,
    ServiceLineStageEffort, Stage, StageInterval, TimelineBundle, STAGE_ORDER,
};

use crate::category::{resolve_opportunity_category, resolve_service_line_category};
use crate::multiplier::multiplier;

/// The suffix of the fixed stage order beginning at `current`; an unknown or
/// null current stage resolves to `"01"` upstream, so this never needs to
/// handle an out-of-band stage itself.
pub fn remaining_stages(current: Stage) -> &'static [Stage] {
    &STAGE_ORDER[current.index()..]
}

/// All configuration lookups needed to schedule any opportunity, bundled so
/// the scheduler stays a pure function of its inputs.
pub struct SchedulingConfig<'a> {
    pub opportunity_categories: &'a [OpportunityCategory],
    pub service_line_categories: &'a [ServiceLineCategory],
    pub stage_effort: &'a [ServiceLineStageEffort],
    pub offering_mappings: &'a [ServiceLineOfferingMapping],
    pub offering_thresholds: &'a [ServiceLineOfferingThreshold],
}

/// Backward-schedules one service line. Missing stage-effort rows skip
/// emission for that stage without advancing the cursor, preserving
/// chronology for the stages that do have a template (spec.md §4.E edge
/// cases).
pub fn schedule(
    decision_date: NaiveDate,
    current_stage: Stage,
    service_line: ServiceLine,
    timeline_category: &OpportunityCategory,
    resource_category: &str,
    stage_effort_rows: &[ServiceLineStageEffort],
    opportunity: &Opportunity,
    line_items: &[OpportunityLineItem],
    mappings: &[ServiceLineOfferingMapping],
    thresholds: &[ServiceLineOfferingThreshold],
) -> Vec<StageInterval> {
    let mut cursor = decision_date;
    let mut emitted = Vec::new();

    for &stage in remaining_stages(current_stage).iter().rev() {
        let duration_weeks = timeline_category.duration_weeks(stage);

        let Some(effort_row) = stage_effort_rows
            .iter()
            .find(|e| e.service_line == service_line && e.stage_name == stage && e.service_line_category == resource_category)
        else {
            tracing::warn!(
                opportunity_id = %opportunity.opportunity_id,
                %service_line,
                %stage,
                "no stage-effort row for resource category {resource_category}; skipping stage"
            );
            continue;
        };

        let threshold = thresholds.iter().find(|t| t.service_line == service_line && t.stage_name == stage);
        let m = multiplier(mappings, line_items, threshold, service_line);
        let fte = effort_row.fte_required * m;

        let end = cursor;
        let start = cursor - Days::new(duration_weeks as u64 * 7);
        cursor = start;

        emitted.push(StageInterval {
            service_line,
            stage_name: stage,
            stage_start_date: start,
            stage_end_date: end,
            duration_weeks,
            fte_required: fte,
            total_effort_weeks: duration_weeks as f64 * fte,
            resource_category: resource_category.to_string(),
        });
    }

    emitted.reverse();
    emitted
}

/// The service lines a timeline is built for: each resource-planned service
/// line with strictly positive revenue, falling back to the opportunity's
/// lead offering (at a nominal weight of 1.0) when none qualify (spec.md
/// §4.E continued, step 3).
pub fn target_service_lines(opportunity: &Opportunity) -> Vec<(ServiceLine, f64)> {
    let mut targets: Vec<(ServiceLine, f64)> = ServiceLine::RESOURCE_PLANNED
        .into_iter()
        .filter_map(|sl| {
            let revenue = opportunity.revenue.get(sl);
            (revenue > 0.0).then_some((sl, revenue))
        })
        .collect();

    if targets.is_empty() {
        if let Some(lead) = opportunity.lead_offering {
            if lead.is_resource_planned() {
                targets.push((lead, 1.0));
            }
        }
    }

    targets
}

/// Composes the full per-opportunity timeline across its target service
/// lines (spec.md §4.E continued).
pub fn build_timeline(
    opportunity: &Opportunity,
    line_items: &[OpportunityLineItem],
    config: &SchedulingConfig<'_>,
) -> CoreResult<TimelineBundle> {
    let Some(decision_date) = opportunity.decision_date else {
        return Err(CoreError::MissingDecisionDate(opportunity.opportunity_id.clone()));
    };

    let category = resolve_opportunity_category(config.opportunity_categories, opportunity.tcv);
    let Some(category) = category else {
        return Ok(TimelineBundle::default());
    };

    let timeline_category = config
        .opportunity_categories
        .iter()
        .find(|c| c.name == category)
        .expect("resolve_opportunity_category only returns names present in the input slice");

    let current_stage = opportunity.current_stage();
    let targets = target_service_lines(opportunity);

    let mut per_service_line = Vec::new();
    let mut service_line_categories = Vec::new();

    for (service_line, sl_tcv) in targets {
        let Some(resource_category) = resolve_service_line_category(config.service_line_categories, service_line, sl_tcv)
        else {
            tracing::info!(
                opportunity_id = %opportunity.opportunity_id,
                %service_line,
                "no service-line category resolves for tcv {sl_tcv}; skipping service line"
            );
            continue;
        };

        let intervals = schedule(
            decision_date,
            current_stage,
            service_line,
            timeline_category,
            &resource_category,
            config.stage_effort,
            opportunity,
            line_items,
            config.offering_mappings,
            config.offering_thresholds,
        );

        service_line_categories.push((service_line, resource_category));
        per_service_line.push((service_line, intervals));
    }

    Ok(TimelineBundle {
        category: Some(category),
        per_service_line,
        service_line_categories,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::RevenueSplit;

    fn category(name: &str, stage_04a_weeks: u32, stage_03_weeks: u32) -> OpportunityCategory {
        OpportunityCategory {
            id: 1,
            name: name.into(),
            min_tcv: 0.0,
            max_tcv: None,
            stage_01_duration_weeks: 0,
            stage_02_duration_weeks: 0,
            stage_03_duration_weeks: stage_03_weeks,
            stage_04a_duration_weeks: stage_04a_weeks,
            stage_04b_duration_weeks: 0,
            stage_05a_duration_weeks: 0,
            stage_05b_duration_weeks: 0,
            stage_06_duration_weeks: 0,
        }
    }

    fn opportunity(tcv: f64, decision_date: NaiveDate, stage: &str, mw_revenue: f64) -> Opportunity {
        Opportunity {
            opportunity_id: "opp-1".into(),
            tcv,
            decision_date: Some(decision_date),
            sales_stage: Some(stage.into()),
            lead_offering: Some(ServiceLine::Mw),
            revenue: RevenueSplit { mw: Some(mw_revenue), ..Default::default() },
        }
    }

    #[test]
    fn scenario_one_single_stage_no_multiplier() {
        let cat = category("Sub $5M", 4, 0);
        let opp = opportunity(3.0, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(), "04A", 3.0);
        let sl_cat = ServiceLineCategory {
            id: 1,
            service_line: ServiceLine::Mw,
            name: "Sub $5M".into(),
            min_tcv: 0.0,
            max_tcv: None,
        };
        let effort = ServiceLineStageEffort {
            service_line: ServiceLine::Mw,
            service_line_category: "Sub $5M".into(),
            stage_name: Stage::S04A,
            fte_required: 0.5,
        };
        let config = SchedulingConfig {
            opportunity_categories: &[cat],
            service_line_categories: &[sl_cat],
            stage_effort: &[effort],
            offering_mappings: &[],
            offering_thresholds: &[],
        };

        let bundle = build_timeline(&opp, &[], &config).unwrap();
        assert_eq!(bundle.per_service_line.len(), 1);
        let (sl, intervals) = &bundle.per_service_line[0];
        assert_eq!(*sl, ServiceLine::Mw);
        assert_eq!(intervals.len(), 1);
        let row = &intervals[0];
        assert_eq!(row.stage_name, Stage::S04A);
        assert_eq!(row.stage_start_date, NaiveDate::from_ymd_opt(2025, 5, 5).unwrap());
        assert_eq!(row.stage_end_date, NaiveDate::from_ymd_opt(2025, 6, 2).unwrap());
        assert_eq!(row.duration_weeks, 4);
        assert!((row.fte_required - 0.5).abs() < 1e-9);
        assert!((row.total_effort_weeks - 2.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_three_backward_chaining_across_two_stages() {
        let cat = category("Cat B", 15, 4);
        let opp = opportunity(30.0, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), "03", 30.0);
        let sl_cat = ServiceLineCategory {
            id: 1,
            service_line: ServiceLine::Mw,
            name: "Cat B".into(),
            min_tcv: 0.0,
            max_tcv: None,
        };
        let effort = vec![
            ServiceLineStageEffort {
                service_line: ServiceLine::Mw,
                service_line_category: "Cat B".into(),
                stage_name: Stage::S03,
                fte_required: 0.25,
            },
            ServiceLineStageEffort {
                service_line: ServiceLine::Mw,
                service_line_category: "Cat B".into(),
                stage_name: Stage::S04A,
                fte_required: 2.0,
            },
        ];
        let config = SchedulingConfig {
            opportunity_categories: &[cat],
            service_line_categories: &[sl_cat],
            stage_effort: &effort,
            offering_mappings: &[],
            offering_thresholds: &[],
        };

        let bundle = build_timeline(&opp, &[], &config).unwrap();
        let (_, intervals) = &bundle.per_service_line[0];
        let stage_03 = intervals.iter().find(|i| i.stage_name == Stage::S03).unwrap();
        let stage_04a = intervals.iter().find(|i| i.stage_name == Stage::S04A).unwrap();
        assert_eq!(stage_03.stage_start_date, NaiveDate::from_ymd_opt(2025, 8, 20).unwrap());
        assert_eq!(stage_03.stage_end_date, NaiveDate::from_ymd_opt(2025, 9, 17).unwrap());
        assert_eq!(stage_04a.stage_start_date, NaiveDate::from_ymd_opt(2025, 9, 17).unwrap());
        assert_eq!(stage_04a.stage_end_date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn scenario_six_uncategorized_opportunity_yields_empty_timeline() {
        let opp = opportunity(-2.0, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), "01", 5.0);
        let config = SchedulingConfig {
            opportunity_categories: &[],
            service_line_categories: &[],
            stage_effort: &[],
            offering_mappings: &[],
            offering_thresholds: &[],
        };

        let bundle = build_timeline(&opp, &[], &config).unwrap();
        assert!(bundle.is_empty());
    }

    #[test]
    fn missing_decision_date_fails() {
        let opp = Opportunity {
            opportunity_id: "opp-2".into(),
            tcv: 3.0,
            decision_date: None,
            sales_stage: Some("01".into()),
            lead_offering: None,
            revenue: RevenueSplit::default(),
        };
        let config = SchedulingConfig {
            opportunity_categories: &[],
            service_line_categories: &[],
            stage_effort: &[],
            offering_mappings: &[],
            offering_thresholds: &[],
        };
        assert!(matches!(build_timeline(&opp, &[], &config), Err(CoreError::MissingDecisionDate(_))));
    }
}

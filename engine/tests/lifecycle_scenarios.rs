//! Integration-style scenarios from spec.md §8, run against the in-memory
//! store so the lifecycle rules are exercised without a database.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use engine::Lifecycle;
use shared::{
    Opportunity, OpportunityCategory, ResourceStatus, RevenueSplit, ServiceLine,
    ServiceLineCategory, ServiceLineStageEffort, Stage,
};
use store::{MemoryConfigStore, MemoryEntityStore, MemoryTimelineStore};

fn category(name: &str, stage_03: u32, stage_04a: u32) -> OpportunityCategory {
    OpportunityCategory {
        id: 1,
        name: name.into(),
        min_tcv: 0.0,
        max_tcv: None,
        stage_01_duration_weeks: 1,
        stage_02_duration_weeks: 1,
        stage_03_duration_weeks: stage_03,
        stage_04a_duration_weeks: stage_04a,
        stage_04b_duration_weeks: 1,
        stage_05a_duration_weeks: 1,
        stage_05b_duration_weeks: 1,
        stage_06_duration_weeks: 1,
    }
}

fn sl_category(service_line: ServiceLine, name: &str) -> ServiceLineCategory {
    ServiceLineCategory { id: 1, service_line, name: name.into(), min_tcv: 0.0, max_tcv: None }
}

fn effort(service_line: ServiceLine, category: &str, stage: Stage, fte: f64) -> ServiceLineStageEffort {
    ServiceLineStageEffort { service_line, service_line_category: category.into(), stage_name: stage, fte_required: fte }
}

fn opportunity(id: &str, tcv: f64, decision_date: NaiveDate, stage: &str, mw_revenue: f64) -> Opportunity {
    Opportunity {
        opportunity_id: id.into(),
        tcv,
        decision_date: Some(decision_date),
        sales_stage: Some(stage.into()),
        lead_offering: Some(ServiceLine::Mw),
        revenue: RevenueSplit { mw: Some(mw_revenue), ..Default::default() },
    }
}

fn fixture_lifecycle(opportunities: Vec<Opportunity>) -> (Lifecycle, Arc<MemoryTimelineStore>) {
    let config = MemoryConfigStore {
        opportunity_categories: vec![category("Cat B", 4, 15)],
        service_line_categories: vec![sl_category(ServiceLine::Mw, "Cat B")],
        stage_effort: vec![
            effort(ServiceLine::Mw, "Cat B", Stage::S01, 0.1),
            effort(ServiceLine::Mw, "Cat B", Stage::S02, 0.1),
            effort(ServiceLine::Mw, "Cat B", Stage::S03, 0.25),
            effort(ServiceLine::Mw, "Cat B", Stage::S04A, 2.0),
            effort(ServiceLine::Mw, "Cat B", Stage::S04B, 0.5),
            effort(ServiceLine::Mw, "Cat B", Stage::S05A, 0.5),
            effort(ServiceLine::Mw, "Cat B", Stage::S05B, 0.5),
            effort(ServiceLine::Mw, "Cat B", Stage::S06, 0.25),
        ],
        offering_mappings: vec![],
        offering_thresholds: vec![],
    };

    let mut entities = MemoryEntityStore::default();
    for opportunity in opportunities {
        entities.opportunities.insert(opportunity.opportunity_id.clone(), opportunity);
    }

    let timelines = Arc::new(MemoryTimelineStore::default());
    let lifecycle = Lifecycle::new(Arc::new(config), Arc::new(entities), timelines.clone());
    (lifecycle, timelines)
}

#[tokio::test]
async fn scenario_four_status_preservation_under_regeneration() {
    let opp = opportunity("opp-x", 30.0, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), "03", 30.0);
    let (lifecycle, timelines) = fixture_lifecycle(vec![opp]);

    let (_, count) = lifecycle.calculate_and_store("opp-x", ResourceStatus::Predicted).await.unwrap();
    assert!(count > 0);

    // Mark stage 04A as Planned, as if a human had committed to it.
    lifecycle
        .patch_status("opp-x", Some(ServiceLine::Mw), Some(Stage::S04A), ResourceStatus::Planned)
        .await
        .unwrap();

    let before = timelines.rows_for_opportunity("opp-x").await.unwrap();

    let result = lifecycle.generate_bulk(true).await.unwrap();
    let outcome = result.outcomes.iter().find(|o| o.opportunity_id == "opp-x").unwrap();
    assert_eq!(outcome.action, engine::GenerationAction::Skipped);

    let after = timelines.rows_for_opportunity("opp-x").await.unwrap();
    assert_eq!(before.len(), after.len());
    for row in &after {
        let prior = before.iter().find(|r| r.stage_name == row.stage_name).unwrap();
        assert_eq!(prior.resource_status, row.resource_status);
        assert_eq!(prior.stage_start_date, row.stage_start_date);
        assert_eq!(prior.stage_end_date, row.stage_end_date);
    }
}

#[tokio::test]
async fn idempotent_bulk_generation() {
    let opp = opportunity("opp-y", 30.0, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), "03", 30.0);
    let (lifecycle, timelines) = fixture_lifecycle(vec![opp]);

    let first = lifecycle.generate_bulk(true).await.unwrap();
    assert_eq!(first.generated, 1);

    let rows_after_first = timelines.all_rows().await.unwrap();

    let second = lifecycle.generate_bulk(true).await.unwrap();
    assert_eq!(second.generated, 0);
    assert_eq!(second.updated, 1);

    let rows_after_second = timelines.all_rows().await.unwrap();
    assert_eq!(rows_after_first.len(), rows_after_second.len());
    for row in &rows_after_second {
        let prior = rows_after_first
            .iter()
            .find(|r| r.service_line == row.service_line && r.stage_name == row.stage_name)
            .unwrap();
        assert_eq!(prior.stage_start_date, row.stage_start_date);
        assert_eq!(prior.stage_end_date, row.stage_end_date);
        assert!((prior.fte_required - row.fte_required).abs() < 1e-9);
    }
}

#[tokio::test]
async fn timeline_rows_are_contiguous_and_unique_per_service_line_and_stage() {
    let opp = opportunity("opp-z", 30.0, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(), "03", 30.0);
    let (lifecycle, _timelines) = fixture_lifecycle(vec![opp]);

    let (bundle, _) = lifecycle.calculate_and_store("opp-z", ResourceStatus::Predicted).await.unwrap();
    let (_, intervals) = &bundle.per_service_line[0];

    let mut seen = HashMap::new();
    for interval in intervals {
        assert!(seen.insert(interval.stage_name, ()).is_none(), "duplicate stage in one service line");
    }

    let mut sorted = intervals.clone();
    sorted.sort_by_key(|i| i.stage_start_date);
    for pair in sorted.windows(2) {
        assert_eq!(pair[0].stage_end_date, pair[1].stage_start_date, "rows must chain contiguously");
    }
    assert_eq!(sorted.last().unwrap().stage_end_date, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
}

use chrono::NaiveDate;
use shared::{
    Bucket, OpportunityResourceTimeline, PortfolioFilter, ResourceStatus, ServiceLine, Stage,
};

fn sample_row(service_line: ServiceLine, stage: Stage, category: &str) -> OpportunityResourceTimeline {
    let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    OpportunityResourceTimeline {
        opportunity_id: "opp-1".into(),
        service_line,
        stage_name: stage,
        stage_start_date: day,
        stage_end_date: day,
        duration_weeks: 1,
        fte_required: 1.0,
        total_effort_weeks: 1.0,
        category: Some(category.into()),
        resource_category: Some(category.into()),
        decision_date: day,
        calculated_date: chrono::Utc::now(),
        last_updated: chrono::Utc::now(),
        resource_status: ResourceStatus::Predicted,
    }
}

#[test]
fn service_line_round_trips_through_as_str_and_parse() {
    for sl in ServiceLine::REVENUE_BEARING {
        assert_eq!(ServiceLine::parse(sl.as_str()), Some(sl));
    }
    assert_eq!(ServiceLine::parse("mw"), Some(ServiceLine::Mw));
    assert_eq!(ServiceLine::parse("nope"), None);
}

#[test]
fn stage_parse_is_case_sensitive_and_unknown_codes_fall_back_to_first() {
    assert_eq!(Stage::parse("04A"), Some(Stage::S04A));
    assert_eq!(Stage::parse("04a"), None);
    assert_eq!(Stage::parse_or_first(Some("bogus")), Stage::S01);
    assert_eq!(Stage::parse_or_first(None), Stage::S01);
}

#[test]
fn stage_index_follows_declaration_order() {
    assert_eq!(Stage::S01.index(), 0);
    assert_eq!(Stage::S06.index(), 7);
}

#[test]
fn resource_status_parse_rejects_unknown_values() {
    assert_eq!(ResourceStatus::parse("Planned"), Some(ResourceStatus::Planned));
    assert_eq!(ResourceStatus::parse("planned"), None);
}

#[test]
fn bucket_parse_is_case_insensitive() {
    assert_eq!(Bucket::parse("WEEK"), Some(Bucket::Week));
    assert_eq!(Bucket::parse("Quarter"), Some(Bucket::Quarter));
    assert_eq!(Bucket::parse("fortnight"), None);
}

#[test]
fn portfolio_filter_with_no_constraints_matches_everything() {
    let filter = PortfolioFilter::default();
    let row = sample_row(ServiceLine::Mw, Stage::S03, "Cat B");
    assert!(filter.matches(&row));
}

#[test]
fn portfolio_filter_excludes_rows_outside_requested_service_lines() {
    let filter = PortfolioFilter { service_lines: vec![ServiceLine::Itoc], ..Default::default() };
    let row = sample_row(ServiceLine::Mw, Stage::S03, "Cat B");
    assert!(!filter.matches(&row));
}

#[test]
fn portfolio_filter_excludes_rows_with_no_category_when_categories_requested() {
    let filter = PortfolioFilter { categories: vec!["Cat A".into()], ..Default::default() };
    let mut row = sample_row(ServiceLine::Mw, Stage::S03, "Cat B");
    row.category = None;
    assert!(!filter.matches(&row));
}

#[test]
fn opportunity_category_duration_weeks_dispatches_by_stage() {
    let category = shared::OpportunityCategory {
        id: 1,
        name: "Cat A".into(),
        min_tcv: 0.0,
        max_tcv: None,
        stage_01_duration_weeks: 1,
        stage_02_duration_weeks: 2,
        stage_03_duration_weeks: 3,
        stage_04a_duration_weeks: 4,
        stage_04b_duration_weeks: 5,
        stage_05a_duration_weeks: 6,
        stage_05b_duration_weeks: 7,
        stage_06_duration_weeks: 8,
    };
    assert_eq!(category.duration_weeks(Stage::S04A), 4);
    assert_eq!(category.duration_weeks(Stage::S06), 8);
}

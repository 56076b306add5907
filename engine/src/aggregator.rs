//! Portfolio aggregator (spec.md §4.G): expands stored stage intervals into
//! daily concurrent FTE per service line, then averages into weekly,
//! monthly, or quarterly buckets. Daily-averaged is canonical per spec.md §9
//! Open Questions.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::{Bucket, CoreResult, PortfolioFilter, ServiceLine, Stage};
use store::{ConfigStore, EntityStore, TimelineStore};

use crate::lifecycle::{is_eligible, load_snapshot};
use crate::scheduler::target_service_lines;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketPoint {
    pub label: String,
    pub start: NaiveDate,
    pub average_total_fte: f64,
    pub average_by_service_line: Vec<(ServiceLine, f64)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortfolioForecast {
    pub buckets: Vec<BucketPoint>,
    pub total_effort_weeks_by_service_line: Vec<(ServiceLine, f64)>,
    pub total_effort_weeks_by_stage: Vec<(Stage, f64)>,
    pub total_effort_weeks_by_category: Vec<(String, f64)>,
    pub opportunity_count: u64,
    pub missing_timelines: u64,
}

pub struct Aggregator {
    config: Arc<dyn ConfigStore>,
    entities: Arc<dyn EntityStore>,
    timelines: Arc<dyn TimelineStore>,
}

impl Aggregator {
    pub fn new(config: Arc<dyn ConfigStore>, entities: Arc<dyn EntityStore>, timelines: Arc<dyn TimelineStore>) -> Self {
        Self { config, entities, timelines }
    }

    pub async fn timeline_bounds(&self) -> CoreResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        self.timelines.bounds().await
    }

    pub async fn portfolio_forecast(&self, filter: &PortfolioFilter, bucket: Bucket) -> CoreResult<PortfolioForecast> {
        let rows = self.timelines.rows_for_filter(filter).await?;

        let rows = if filter.opportunity_sales_stages.is_empty() {
            rows
        } else {
            let mut current_stage_of = HashMap::new();
            for opportunity_id in rows.iter().map(|r| r.opportunity_id.clone()).collect::<HashSet<_>>() {
                if let Some(opportunity) = self.entities.get_opportunity(&opportunity_id).await? {
                    current_stage_of.insert(opportunity_id, opportunity.current_stage());
                }
            }
            rows.into_iter()
                .filter(|r| {
                    current_stage_of
                        .get(&r.opportunity_id)
                        .is_some_and(|stage| filter.opportunity_sales_stages.contains(stage))
                })
                .collect()
        };

        let window_start = filter.start.or_else(|| rows.iter().map(|r| r.stage_start_date).min());
        let window_end = filter.end.or_else(|| rows.iter().map(|r| r.stage_end_date).max());

        let buckets = match (window_start, window_end) {
            (Some(start), Some(end)) if start <= end => daily_average_buckets(&rows, start, end, bucket),
            _ => Vec::new(),
        };

        // Summary totals and the opportunity count are computed from the
        // unfiltered scan of all stored rows (spec.md §4.G step 5): they
        // give portfolio-wide context independent of the window/bucket the
        // caller is charting.
        let all_rows = self.timelines.all_rows().await?;

        let mut by_service_line: HashMap<ServiceLine, f64> = HashMap::new();
        let mut by_stage: HashMap<Stage, f64> = HashMap::new();
        let mut by_category: HashMap<String, f64> = HashMap::new();
        let mut opportunity_ids = HashSet::new();

        for row in &all_rows {
            *by_service_line.entry(row.service_line).or_default() += row.total_effort_weeks;
            *by_stage.entry(row.stage_name).or_default() += row.total_effort_weeks;
            if let Some(category) = &row.category {
                *by_category.entry(category.clone()).or_default() += row.total_effort_weeks;
            }
            opportunity_ids.insert(row.opportunity_id.clone());
        }

        let missing_timelines = self.missing_timelines(filter, &all_rows).await?;

        Ok(PortfolioForecast {
            buckets,
            total_effort_weeks_by_service_line: by_service_line.into_iter().collect(),
            total_effort_weeks_by_stage: by_stage.into_iter().collect(),
            total_effort_weeks_by_category: by_category.into_iter().collect(),
            opportunity_count: opportunity_ids.len() as u64,
            missing_timelines,
        })
    }

    /// Alternate output shape keyed by `(service_line, opportunity_current_stage)`
    /// rather than by service line alone (spec.md §4.G, final paragraph).
    pub async fn stage_resource_forecast(
        &self,
        filter: &PortfolioFilter,
        bucket: Bucket,
    ) -> CoreResult<Vec<((ServiceLine, Stage), Vec<BucketPoint>)>> {
        let rows = self.timelines.rows_for_filter(filter).await?;

        let mut current_stage_of = HashMap::new();
        for opportunity_id in rows.iter().map(|r| r.opportunity_id.clone()).collect::<HashSet<_>>() {
            if let Some(opportunity) = self.entities.get_opportunity(&opportunity_id).await? {
                current_stage_of.insert(opportunity_id, opportunity.current_stage());
            }
        }

        let mut by_key: HashMap<(ServiceLine, Stage), Vec<shared::OpportunityResourceTimeline>> = HashMap::new();
        for row in rows {
            let Some(&current_stage) = current_stage_of.get(&row.opportunity_id) else { continue };
            if !filter.opportunity_sales_stages.is_empty() && !filter.opportunity_sales_stages.contains(&current_stage) {
                continue;
            }
            by_key.entry((row.service_line, current_stage)).or_default().push(row);
        }

        let window_start = filter.start;
        let window_end = filter.end;

        let mut out = Vec::new();
        for (key, rows) in by_key {
            let start = window_start.or_else(|| rows.iter().map(|r| r.stage_start_date).min());
            let end = window_end.or_else(|| rows.iter().map(|r| r.stage_end_date).max());
            let buckets = match (start, end) {
                (Some(start), Some(end)) if start <= end => daily_average_buckets(&rows, start, end, bucket),
                _ => Vec::new(),
            };
            out.push((key, buckets));
        }
        out.sort_by_key(|(key, _)| (key.0, key.1.index()));
        Ok(out)
    }

    /// Count of opportunities that pass the eligibility predicate but have
    /// zero stored rows, subject to the same category/service-line filters
    /// (spec.md §4.G step 6).
    async fn missing_timelines(
        &self,
        filter: &PortfolioFilter,
        all_rows: &[shared::OpportunityResourceTimeline],
    ) -> CoreResult<u64> {
        let has_rows: HashSet<&str> = all_rows.iter().map(|r| r.opportunity_id.as_str()).collect();
        let opportunities = self.entities.list_opportunities().await?;
        let snapshot = load_snapshot(self.config.as_ref()).await?;

        let mut count = 0u64;
        for opportunity in &opportunities {
            if has_rows.contains(opportunity.opportunity_id.as_str()) {
                continue;
            }
            if !is_eligible(opportunity, &snapshot) {
                continue;
            }
            if !filter.service_lines.is_empty() {
                let targets: Vec<ServiceLine> = target_service_lines(opportunity).into_iter().map(|(sl, _)| sl).collect();
                if !targets.iter().any(|sl| filter.service_lines.contains(sl)) {
                    continue;
                }
            }
            if !filter.categories.is_empty() {
                let category = crate::category::resolve_opportunity_category(&snapshot.opportunity_categories, opportunity.tcv);
                match category {
                    Some(c) if filter.categories.contains(&c) => {}
                    _ => continue,
                }
            }
            count += 1;
        }
        Ok(count)
    }
}

fn bucket_key(date: NaiveDate, bucket: Bucket) -> (NaiveDate, String) {
    match bucket {
        Bucket::Week => {
            let monday = date - chrono::Days::new(date.weekday().num_days_from_monday() as u64);
            (monday, monday.format("%Y-%m-%d").to_string())
        }
        Bucket::Month => {
            let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("valid first-of-month");
            (start, format!("{:04}-{:02}", date.year(), date.month()))
        }
        Bucket::Quarter => {
            let quarter = (date.month() - 1) / 3 + 1;
            let first_month = (quarter - 1) * 3 + 1;
            let start = NaiveDate::from_ymd_opt(date.year(), first_month, 1).expect("valid quarter start");
            (start, format!("{:04}-Q{}", date.year(), quarter))
        }
    }
}

fn daily_average_buckets(
    rows: &[shared::OpportunityResourceTimeline],
    window_start: NaiveDate,
    window_end: NaiveDate,
    bucket: Bucket,
) -> Vec<BucketPoint> {
    let mut daily_total: HashMap<NaiveDate, f64> = HashMap::new();
    let mut daily_by_service_line: HashMap<NaiveDate, HashMap<ServiceLine, f64>> = HashMap::new();

    for row in rows {
        if row.stage_start_date > row.stage_end_date {
            continue;
        }
        let start = row.stage_start_date.max(window_start);
        let end = row.stage_end_date.min(window_end);
        if start > end {
            continue;
        }
        let mut d = start;
        while d <= end {
            *daily_total.entry(d).or_default() += row.fte_required;
            *daily_by_service_line.entry(d).or_default().entry(row.service_line).or_default() += row.fte_required;
            d += chrono::Days::new(1);
        }
    }

    let mut bucket_sums: HashMap<NaiveDate, f64> = HashMap::new();
    let mut bucket_sums_by_sl: HashMap<NaiveDate, HashMap<ServiceLine, f64>> = HashMap::new();
    let mut bucket_day_counts: HashMap<NaiveDate, u32> = HashMap::new();
    let mut bucket_labels: HashMap<NaiveDate, String> = HashMap::new();

    let mut d = window_start;
    while d <= window_end {
        let (key, label) = bucket_key(d, bucket);
        bucket_labels.entry(key).or_insert(label);
        *bucket_day_counts.entry(key).or_default() += 1;
        *bucket_sums.entry(key).or_default() += daily_total.get(&d).copied().unwrap_or(0.0);
        if let Some(by_sl) = daily_by_service_line.get(&d) {
            let entry = bucket_sums_by_sl.entry(key).or_default();
            for (sl, v) in by_sl {
                *entry.entry(*sl).or_default() += v;
            }
        }
        d += chrono::Days::new(1);
    }

    let mut points: Vec<BucketPoint> = bucket_sums
        .into_iter()
        .map(|(key, sum)| {
            let days = bucket_day_counts[&key] as f64;
            let average_by_service_line = bucket_sums_by_sl
                .get(&key)
                .into_iter()
                .flat_map(|m| m.iter())
                .map(|(sl, v)| (*sl, v / days))
                .collect();
            BucketPoint {
                label: bucket_labels.remove(&key).unwrap_or_default(),
                start: key,
                average_total_fte: sum / days,
                average_by_service_line,
            }
        })
        .collect();

    points.sort_by_key(|p| p.start);
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{OpportunityResourceTimeline, ResourceStatus, Stage};

    fn row(service_line: ServiceLine, start: NaiveDate, end: NaiveDate, fte: f64) -> OpportunityResourceTimeline {
        OpportunityResourceTimeline {
            opportunity_id: "opp".into(),
            service_line,
            stage_name: Stage::S04A,
            stage_start_date: start,
            stage_end_date: end,
            duration_weeks: 2,
            fte_required: fte,
            total_effort_weeks: fte * 2.0,
            category: None,
            resource_category: None,
            decision_date: end,
            calculated_date: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            last_updated: chrono::DateTime::from_timestamp(0, 0).unwrap(),
            resource_status: ResourceStatus::Predicted,
        }
    }

    #[test]
    fn scenario_five_weekly_overlap() {
        let a = row(
            ServiceLine::Mw,
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 19).unwrap(),
            1.0,
        );
        let mut b = row(
            ServiceLine::Mw,
            NaiveDate::from_ymd_opt(2025, 1, 13).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 26).unwrap(),
            1.0,
        );
        b.opportunity_id = "opp-b".into();

        let buckets = daily_average_buckets(
            &[a, b],
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 2).unwrap(),
            Bucket::Week,
        );

        // Week of 01-20..01-26 is covered by `b` only (`a` ends 01-19), so its
        // average is 1.0, not 2.0 — the two intervals overlap for exactly one
        // week (01-13..01-19).
        let totals: Vec<f64> = buckets.iter().map(|p| p.average_total_fte).collect();
        assert_eq!(totals, vec![1.0, 2.0, 1.0, 0.0]);
    }
}

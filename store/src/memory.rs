//! In-memory implementation of the store traits, used by `engine`'s test
//! suite so the lifecycle and aggregation rules can be exercised without a
//! database. Mirrors the locking style of `api::cache::CacheLayer` in the
//! teacher repo (a `tokio::sync::RwLock` guarding plain collections).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    CoreResult, IntervalPatch, Opportunity, OpportunityCategory, OpportunityLineItem,
    OpportunityResourceTimeline, PortfolioFilter, ResourceStatus, ServiceLine,
    ServiceLineCategory, ServiceLineOfferingMapping, ServiceLineOfferingThreshold,
    ServiceLineStageEffort, Stage,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::traits::{ConfigStore, EntityStore, TimelineStore};

#[derive(Default)]
pub struct MemoryConfigStore {
    pub opportunity_categories: Vec<OpportunityCategory>,
    pub service_line_categories: Vec<ServiceLineCategory>,
    pub stage_effort: Vec<ServiceLineStageEffort>,
    pub offering_mappings: Vec<ServiceLineOfferingMapping>,
    pub offering_thresholds: Vec<ServiceLineOfferingThreshold>,
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn opportunity_categories(&self) -> CoreResult<Vec<OpportunityCategory>> {
        Ok(self.opportunity_categories.clone())
    }

    async fn service_line_categories(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineCategory>> {
        Ok(self
            .service_line_categories
            .iter()
            .filter(|c| c.service_line == service_line)
            .cloned()
            .collect())
    }

    async fn stage_effort(&self, service_line: ServiceLine) -> CoreResult<Vec<ServiceLineStageEffort>> {
        Ok(self
            .stage_effort
            .iter()
            .filter(|e| e.service_line == service_line)
            .cloned()
            .collect())
    }

    async fn offering_mappings(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineOfferingMapping>> {
        Ok(self
            .offering_mappings
            .iter()
            .filter(|m| m.service_line == service_line)
            .cloned()
            .collect())
    }

    async fn offering_threshold(
        &self,
        service_line: ServiceLine,
        stage: Stage,
    ) -> CoreResult<Option<ServiceLineOfferingThreshold>> {
        Ok(self
            .offering_thresholds
            .iter()
            .find(|t| t.service_line == service_line && t.stage_name == stage)
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryEntityStore {
    pub opportunities: HashMap<String, Opportunity>,
    pub line_items: HashMap<String, Vec<OpportunityLineItem>>,
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn get_opportunity(&self, opportunity_id: &str) -> CoreResult<Option<Opportunity>> {
        Ok(self.opportunities.get(opportunity_id).cloned())
    }

    async fn list_opportunities(&self) -> CoreResult<Vec<Opportunity>> {
        Ok(self.opportunities.values().cloned().collect())
    }

    async fn line_items(&self, opportunity_id: &str) -> CoreResult<Vec<OpportunityLineItem>> {
        Ok(self.line_items.get(opportunity_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryTimelineStore {
    rows: RwLock<Vec<OpportunityResourceTimeline>>,
}

#[async_trait]
impl TimelineStore for MemoryTimelineStore {
    async fn insert_rows(&self, rows: Vec<OpportunityResourceTimeline>) -> CoreResult<()> {
        self.rows.write().await.extend(rows);
        Ok(())
    }

    async fn replace_for_opportunity(
        &self,
        opportunity_id: &str,
        rows: Vec<OpportunityResourceTimeline>,
    ) -> CoreResult<()> {
        let mut guard = self.rows.write().await;
        guard.retain(|r| r.opportunity_id != opportunity_id);
        guard.extend(rows);
        Ok(())
    }

    async fn delete_for_opportunity(&self, opportunity_id: &str) -> CoreResult<u64> {
        let mut guard = self.rows.write().await;
        let before = guard.len();
        guard.retain(|r| r.opportunity_id != opportunity_id);
        Ok((before - guard.len()) as u64)
    }

    async fn rows_for_opportunity(
        &self,
        opportunity_id: &str,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.opportunity_id == opportunity_id)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        opportunity_id: &str,
        service_line: Option<ServiceLine>,
        stage: Option<Stage>,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        let mut guard = self.rows.write().await;
        let mut updated = 0u64;
        for row in guard.iter_mut() {
            if row.opportunity_id == opportunity_id
                && service_line.map_or(true, |sl| row.service_line == sl)
                && stage.map_or(true, |s| row.stage_name == s)
            {
                row.resource_status = status;
                row.last_updated = now;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn update_interval(
        &self,
        opportunity_id: &str,
        service_line: ServiceLine,
        stage: Stage,
        patch: IntervalPatch,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<OpportunityResourceTimeline>> {
        let mut guard = self.rows.write().await;
        let row = guard.iter_mut().find(|r| {
            r.opportunity_id == opportunity_id && r.service_line == service_line && r.stage_name == stage
        });
        Ok(row.map(|r| {
            r.stage_start_date = patch.stage_start_date;
            r.stage_end_date = patch.stage_end_date;
            r.duration_weeks = patch.duration_weeks;
            r.fte_required = patch.fte_required;
            r.total_effort_weeks = patch.duration_weeks as f64 * patch.fte_required;
            r.resource_status = patch.resource_status;
            r.last_updated = now;
            r.clone()
        }))
    }

    async fn rows_for_filter(
        &self,
        filter: &PortfolioFilter,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        let guard = self.rows.read().await;
        Ok(guard
            .iter()
            .filter(|r| {
                filter.matches(r)
                    && filter.start.map_or(true, |s| r.stage_end_date >= s)
                    && filter.end.map_or(true, |e| r.stage_start_date <= e)
            })
            .cloned()
            .collect())
    }

    async fn all_rows(&self) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        Ok(self.rows.read().await.clone())
    }

    async fn delete_by_status(&self, status: ResourceStatus) -> CoreResult<u64> {
        let mut guard = self.rows.write().await;
        let before = guard.len();
        guard.retain(|r| r.resource_status != status);
        Ok((before - guard.len()) as u64)
    }

    async fn bounds(&self) -> CoreResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        let guard = self.rows.read().await;
        let earliest = guard.iter().map(|r| r.stage_start_date).min();
        let latest = guard.iter().map(|r| r.stage_end_date).max();
        Ok((earliest, latest))
    }

    async fn has_non_predicted_rows(&self, opportunity_id: &str) -> CoreResult<bool> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .any(|r| r.opportunity_id == opportunity_id && r.resource_status != ResourceStatus::Predicted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(opportunity_id: &str, service_line: ServiceLine, stage: Stage, status: ResourceStatus) -> OpportunityResourceTimeline {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        OpportunityResourceTimeline {
            opportunity_id: opportunity_id.into(),
            service_line,
            stage_name: stage,
            stage_start_date: day,
            stage_end_date: day,
            duration_weeks: 1,
            fte_required: 1.0,
            total_effort_weeks: 1.0,
            category: Some("Cat A".into()),
            resource_category: Some("Cat A".into()),
            decision_date: day,
            calculated_date: Utc::now(),
            last_updated: Utc::now(),
            resource_status: status,
        }
    }

    #[tokio::test]
    async fn replace_for_opportunity_only_touches_that_opportunity() {
        let store = MemoryTimelineStore::default();
        store
            .insert_rows(vec![
                row("a", ServiceLine::Mw, Stage::S01, ResourceStatus::Predicted),
                row("b", ServiceLine::Mw, Stage::S01, ResourceStatus::Predicted),
            ])
            .await
            .unwrap();

        store
            .replace_for_opportunity("a", vec![row("a", ServiceLine::Mw, Stage::S02, ResourceStatus::Predicted)])
            .await
            .unwrap();

        let all = store.all_rows().await.unwrap();
        assert_eq!(all.len(), 2);
        let a_rows = store.rows_for_opportunity("a").await.unwrap();
        assert_eq!(a_rows.len(), 1);
        assert_eq!(a_rows[0].stage_name, Stage::S02);
    }

    #[tokio::test]
    async fn update_status_respects_optional_filters() {
        let store = MemoryTimelineStore::default();
        store
            .insert_rows(vec![
                row("a", ServiceLine::Mw, Stage::S01, ResourceStatus::Predicted),
                row("a", ServiceLine::Itoc, Stage::S01, ResourceStatus::Predicted),
            ])
            .await
            .unwrap();

        let updated = store
            .update_status("a", Some(ServiceLine::Mw), None, ResourceStatus::Forecast, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let rows = store.rows_for_opportunity("a").await.unwrap();
        let mw_row = rows.iter().find(|r| r.service_line == ServiceLine::Mw).unwrap();
        let itoc_row = rows.iter().find(|r| r.service_line == ServiceLine::Itoc).unwrap();
        assert_eq!(mw_row.resource_status, ResourceStatus::Forecast);
        assert_eq!(itoc_row.resource_status, ResourceStatus::Predicted);
    }

    #[tokio::test]
    async fn delete_by_status_only_removes_matching_rows() {
        let store = MemoryTimelineStore::default();
        store
            .insert_rows(vec![
                row("a", ServiceLine::Mw, Stage::S01, ResourceStatus::Predicted),
                row("a", ServiceLine::Mw, Stage::S02, ResourceStatus::Planned),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_status(ResourceStatus::Predicted).await.unwrap();
        assert_eq!(deleted, 1);
        let remaining = store.all_rows().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].resource_status, ResourceStatus::Planned);
    }

    #[tokio::test]
    async fn bounds_reflects_min_start_and_max_end() {
        let store = MemoryTimelineStore::default();
        let mut early = row("a", ServiceLine::Mw, Stage::S01, ResourceStatus::Predicted);
        early.stage_start_date = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        early.stage_end_date = chrono::NaiveDate::from_ymd_opt(2025, 1, 8).unwrap();
        let mut late = row("a", ServiceLine::Mw, Stage::S02, ResourceStatus::Predicted);
        late.stage_start_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        late.stage_end_date = chrono::NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();

        store.insert_rows(vec![early, late]).await.unwrap();

        let (earliest, latest) = store.bounds().await.unwrap();
        assert_eq!(earliest, Some(chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert_eq!(latest, Some(chrono::NaiveDate::from_ymd_opt(2025, 3, 8).unwrap()));
    }
}

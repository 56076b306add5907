//! Postgres-backed implementations of the store traits, in the style of
//! `indexer::db::DatabaseWriter` in the teacher repo: a thin wrapper struct
//! around a `PgPool`, `sqlx::query_as` against row DTOs, errors mapped into
//! the core's own error type rather than leaked as `sqlx::Error`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    CoreError, CoreResult, IntervalPatch, Opportunity, OpportunityCategory, OpportunityLineItem,
    OpportunityResourceTimeline, PortfolioFilter, ResourceStatus, RevenueSplit, ServiceLine,
    ServiceLineCategory, ServiceLineOfferingMapping, ServiceLineOfferingThreshold,
    ServiceLineStageEffort, Stage,
};
use sqlx::{FromRow, PgPool, Row};

use crate::traits::{ConfigStore, EntityStore, TimelineStore};

fn db_err(context: &str, err: sqlx::Error) -> CoreError {
    tracing::error!(context, error = %err, "postgres store error");
    CoreError::PersistenceFailure(format!("{context}: {err}"))
}

// ─────────────────────────────────────────────────────────
// Configuration store
// ─────────────────────────────────────────────────────────

pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct OpportunityCategoryRow {
    id: i64,
    name: String,
    min_tcv: f64,
    max_tcv: Option<f64>,
    stage_01_duration_weeks: i32,
    stage_02_duration_weeks: i32,
    stage_03_duration_weeks: i32,
    stage_04a_duration_weeks: i32,
    stage_04b_duration_weeks: i32,
    stage_05a_duration_weeks: i32,
    stage_05b_duration_weeks: i32,
    stage_06_duration_weeks: i32,
}

impl From<OpportunityCategoryRow> for OpportunityCategory {
    fn from(r: OpportunityCategoryRow) -> Self {
        OpportunityCategory {
            id: r.id,
            name: r.name,
            min_tcv: r.min_tcv,
            max_tcv: r.max_tcv,
            stage_01_duration_weeks: r.stage_01_duration_weeks as u32,
            stage_02_duration_weeks: r.stage_02_duration_weeks as u32,
            stage_03_duration_weeks: r.stage_03_duration_weeks as u32,
            stage_04a_duration_weeks: r.stage_04a_duration_weeks as u32,
            stage_04b_duration_weeks: r.stage_04b_duration_weeks as u32,
            stage_05a_duration_weeks: r.stage_05a_duration_weeks as u32,
            stage_05b_duration_weeks: r.stage_05b_duration_weeks as u32,
            stage_06_duration_weeks: r.stage_06_duration_weeks as u32,
        }
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn opportunity_categories(&self) -> CoreResult<Vec<OpportunityCategory>> {
        let rows = sqlx::query_as::<_, OpportunityCategoryRow>(
            "SELECT id, name, min_tcv, max_tcv, \
             stage_01_duration_weeks, stage_02_duration_weeks, stage_03_duration_weeks, \
             stage_04a_duration_weeks, stage_04b_duration_weeks, stage_05a_duration_weeks, \
             stage_05b_duration_weeks, stage_06_duration_weeks \
             FROM opportunity_categories ORDER BY min_tcv",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("opportunity_categories", e))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn service_line_categories(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineCategory>> {
        let rows = sqlx::query(
            "SELECT id, service_line, name, min_tcv, max_tcv \
             FROM service_line_categories WHERE service_line = $1 ORDER BY min_tcv",
        )
        .bind(service_line)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("service_line_categories", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(ServiceLineCategory {
                    id: row.try_get("id").map_err(|e| db_err("service_line_categories.id", e))?,
                    service_line: row
                        .try_get("service_line")
                        .map_err(|e| db_err("service_line_categories.service_line", e))?,
                    name: row.try_get("name").map_err(|e| db_err("service_line_categories.name", e))?,
                    min_tcv: row.try_get("min_tcv").map_err(|e| db_err("service_line_categories.min_tcv", e))?,
                    max_tcv: row.try_get("max_tcv").map_err(|e| db_err("service_line_categories.max_tcv", e))?,
                })
            })
            .collect()
    }

    async fn stage_effort(&self, service_line: ServiceLine) -> CoreResult<Vec<ServiceLineStageEffort>> {
        let rows = sqlx::query(
            "SELECT service_line, service_line_category, stage_name, fte_required \
             FROM service_line_stage_effort \
             WHERE service_line = $1",
        )
        .bind(service_line)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("stage_effort", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(ServiceLineStageEffort {
                    service_line: row.try_get("service_line").map_err(|e| db_err("stage_effort.service_line", e))?,
                    service_line_category: row
                        .try_get("service_line_category")
                        .map_err(|e| db_err("stage_effort.service_line_category", e))?,
                    stage_name: row.try_get("stage_name").map_err(|e| db_err("stage_effort.stage_name", e))?,
                    fte_required: row.try_get("fte_required").map_err(|e| db_err("stage_effort.fte_required", e))?,
                })
            })
            .collect()
    }

    async fn offering_mappings(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineOfferingMapping>> {
        let rows = sqlx::query(
            "SELECT service_line, internal_service, simplified_offering \
             FROM service_line_offering_mappings WHERE service_line = $1",
        )
        .bind(service_line)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("offering_mappings", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(ServiceLineOfferingMapping {
                    service_line: row.try_get("service_line").map_err(|e| db_err("offering_mappings.service_line", e))?,
                    internal_service: row
                        .try_get("internal_service")
                        .map_err(|e| db_err("offering_mappings.internal_service", e))?,
                    simplified_offering: row
                        .try_get("simplified_offering")
                        .map_err(|e| db_err("offering_mappings.simplified_offering", e))?,
                })
            })
            .collect()
    }

    async fn offering_threshold(
        &self,
        service_line: ServiceLine,
        stage: Stage,
    ) -> CoreResult<Option<ServiceLineOfferingThreshold>> {
        let row = sqlx::query(
            "SELECT service_line, stage_name, threshold_count, increment_multiplier \
             FROM service_line_offering_thresholds WHERE service_line = $1 AND stage_name = $2",
        )
        .bind(service_line)
        .bind(stage)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("offering_threshold", e))?;

        row.map(|row| {
            Ok(ServiceLineOfferingThreshold {
                service_line: row.try_get("service_line").map_err(|e| db_err("offering_threshold.service_line", e))?,
                stage_name: row.try_get("stage_name").map_err(|e| db_err("offering_threshold.stage_name", e))?,
                threshold_count: {
                    let v: i32 = row.try_get("threshold_count").map_err(|e| db_err("offering_threshold.threshold_count", e))?;
                    v as u32
                },
                increment_multiplier: row
                    .try_get("increment_multiplier")
                    .map_err(|e| db_err("offering_threshold.increment_multiplier", e))?,
            })
        })
        .transpose()
    }
}

// ─────────────────────────────────────────────────────────
// Entity store
// ─────────────────────────────────────────────────────────

pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn opportunity_from_row(row: sqlx::postgres::PgRow) -> CoreResult<Opportunity> {
    Ok(Opportunity {
        opportunity_id: row.try_get("opportunity_id").map_err(|e| db_err("opportunity.opportunity_id", e))?,
        tcv: row.try_get("tcv").map_err(|e| db_err("opportunity.tcv", e))?,
        decision_date: row.try_get("decision_date").map_err(|e| db_err("opportunity.decision_date", e))?,
        sales_stage: row.try_get("sales_stage").map_err(|e| db_err("opportunity.sales_stage", e))?,
        lead_offering: row.try_get("lead_offering").map_err(|e| db_err("opportunity.lead_offering", e))?,
        revenue: RevenueSplit {
            ces: row.try_get("ces_millions").map_err(|e| db_err("opportunity.ces_millions", e))?,
            ins: row.try_get("ins_millions").map_err(|e| db_err("opportunity.ins_millions", e))?,
            bps: row.try_get("bps_millions").map_err(|e| db_err("opportunity.bps_millions", e))?,
            sec: row.try_get("sec_millions").map_err(|e| db_err("opportunity.sec_millions", e))?,
            itoc: row.try_get("itoc_millions").map_err(|e| db_err("opportunity.itoc_millions", e))?,
            mw: row.try_get("mw_millions").map_err(|e| db_err("opportunity.mw_millions", e))?,
        },
    })
}

const OPPORTUNITY_COLUMNS: &str = "opportunity_id, tcv, decision_date, sales_stage, lead_offering, \
     ces_millions, ins_millions, bps_millions, sec_millions, itoc_millions, mw_millions";

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get_opportunity(&self, opportunity_id: &str) -> CoreResult<Option<Opportunity>> {
        let row = sqlx::query(&format!(
            "SELECT {OPPORTUNITY_COLUMNS} FROM opportunities WHERE opportunity_id = $1"
        ))
        .bind(opportunity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("get_opportunity", e))?;

        row.map(opportunity_from_row).transpose()
    }

    async fn list_opportunities(&self) -> CoreResult<Vec<Opportunity>> {
        let rows = sqlx::query(&format!("SELECT {OPPORTUNITY_COLUMNS} FROM opportunities"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("list_opportunities", e))?;

        rows.into_iter().map(opportunity_from_row).collect()
    }

    async fn line_items(&self, opportunity_id: &str) -> CoreResult<Vec<OpportunityLineItem>> {
        let rows = sqlx::query(
            "SELECT opportunity_id, internal_service, simplified_offering \
             FROM opportunity_line_items WHERE opportunity_id = $1",
        )
        .bind(opportunity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("line_items", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(OpportunityLineItem {
                    opportunity_id: row.try_get("opportunity_id").map_err(|e| db_err("line_items.opportunity_id", e))?,
                    internal_service: row
                        .try_get("internal_service")
                        .map_err(|e| db_err("line_items.internal_service", e))?,
                    simplified_offering: row
                        .try_get("simplified_offering")
                        .map_err(|e| db_err("line_items.simplified_offering", e))?,
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────
// Timeline store
// ─────────────────────────────────────────────────────────

pub struct PgTimelineStore {
    pool: PgPool,
}

impl PgTimelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TIMELINE_COLUMNS: &str = "opportunity_id, service_line, stage_name, stage_start_date, \
     stage_end_date, duration_weeks, fte_required, total_effort_weeks, category, \
     resource_category, decision_date, calculated_date, last_updated, resource_status";

fn timeline_row_from_pg(row: sqlx::postgres::PgRow) -> CoreResult<OpportunityResourceTimeline> {
    Ok(OpportunityResourceTimeline {
        opportunity_id: row.try_get("opportunity_id").map_err(|e| db_err("timeline.opportunity_id", e))?,
        service_line: row.try_get("service_line").map_err(|e| db_err("timeline.service_line", e))?,
        stage_name: row.try_get("stage_name").map_err(|e| db_err("timeline.stage_name", e))?,
        stage_start_date: row.try_get("stage_start_date").map_err(|e| db_err("timeline.stage_start_date", e))?,
        stage_end_date: row.try_get("stage_end_date").map_err(|e| db_err("timeline.stage_end_date", e))?,
        duration_weeks: {
            let v: i32 = row.try_get("duration_weeks").map_err(|e| db_err("timeline.duration_weeks", e))?;
            v as u32
        },
        fte_required: row.try_get("fte_required").map_err(|e| db_err("timeline.fte_required", e))?,
        total_effort_weeks: row.try_get("total_effort_weeks").map_err(|e| db_err("timeline.total_effort_weeks", e))?,
        category: row.try_get("category").map_err(|e| db_err("timeline.category", e))?,
        resource_category: row.try_get("resource_category").map_err(|e| db_err("timeline.resource_category", e))?,
        decision_date: row.try_get("decision_date").map_err(|e| db_err("timeline.decision_date", e))?,
        calculated_date: row.try_get("calculated_date").map_err(|e| db_err("timeline.calculated_date", e))?,
        last_updated: row.try_get("last_updated").map_err(|e| db_err("timeline.last_updated", e))?,
        resource_status: row.try_get("resource_status").map_err(|e| db_err("timeline.resource_status", e))?,
    })
}

#[async_trait]
impl TimelineStore for PgTimelineStore {
    async fn insert_rows(&self, rows: Vec<OpportunityResourceTimeline>) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| db_err("insert_rows.begin", e))?;
        for row in rows {
            sqlx::query(&format!(
                "INSERT INTO opportunity_resource_timeline ({TIMELINE_COLUMNS}) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)"
            ))
            .bind(&row.opportunity_id)
            .bind(row.service_line)
            .bind(row.stage_name)
            .bind(row.stage_start_date)
            .bind(row.stage_end_date)
            .bind(row.duration_weeks as i32)
            .bind(row.fte_required)
            .bind(row.total_effort_weeks)
            .bind(&row.category)
            .bind(&row.resource_category)
            .bind(row.decision_date)
            .bind(row.calculated_date)
            .bind(row.last_updated)
            .bind(row.resource_status)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("insert_rows.insert", e))?;
        }
        tx.commit().await.map_err(|e| db_err("insert_rows.commit", e))?;
        Ok(())
    }

    async fn replace_for_opportunity(
        &self,
        opportunity_id: &str,
        rows: Vec<OpportunityResourceTimeline>,
    ) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| db_err("replace.begin", e))?;
        sqlx::query("DELETE FROM opportunity_resource_timeline WHERE opportunity_id = $1")
            .bind(opportunity_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace.delete", e))?;

        for row in rows {
            sqlx::query(&format!(
                "INSERT INTO opportunity_resource_timeline ({TIMELINE_COLUMNS}) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)"
            ))
            .bind(&row.opportunity_id)
            .bind(row.service_line)
            .bind(row.stage_name)
            .bind(row.stage_start_date)
            .bind(row.stage_end_date)
            .bind(row.duration_weeks as i32)
            .bind(row.fte_required)
            .bind(row.total_effort_weeks)
            .bind(&row.category)
            .bind(&row.resource_category)
            .bind(row.decision_date)
            .bind(row.calculated_date)
            .bind(row.last_updated)
            .bind(row.resource_status)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_err("replace.insert", e))?;
        }
        tx.commit().await.map_err(|e| db_err("replace.commit", e))?;
        Ok(())
    }

    async fn delete_for_opportunity(&self, opportunity_id: &str) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM opportunity_resource_timeline WHERE opportunity_id = $1")
            .bind(opportunity_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete_for_opportunity", e))?;
        Ok(result.rows_affected())
    }

    async fn rows_for_opportunity(
        &self,
        opportunity_id: &str,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        let rows = sqlx::query(&format!(
            "SELECT {TIMELINE_COLUMNS} FROM opportunity_resource_timeline \
             WHERE opportunity_id = $1 ORDER BY stage_start_date"
        ))
        .bind(opportunity_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_err("rows_for_opportunity", e))?;

        rows.into_iter().map(timeline_row_from_pg).collect()
    }

    async fn update_status(
        &self,
        opportunity_id: &str,
        service_line: Option<ServiceLine>,
        stage: Option<Stage>,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<u64> {
        let result = sqlx::query(
            "UPDATE opportunity_resource_timeline SET resource_status = $1, last_updated = $2 \
             WHERE opportunity_id = $3 \
             AND ($4::text IS NULL OR service_line = $4) \
             AND ($5::text IS NULL OR stage_name = $5)",
        )
        .bind(status)
        .bind(now)
        .bind(opportunity_id)
        .bind(service_line)
        .bind(stage)
        .execute(&self.pool)
        .await
        .map_err(|e| db_err("update_status", e))?;

        Ok(result.rows_affected())
    }

    async fn update_interval(
        &self,
        opportunity_id: &str,
        service_line: ServiceLine,
        stage: Stage,
        patch: IntervalPatch,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<OpportunityResourceTimeline>> {
        let total_effort_weeks = patch.duration_weeks as f64 * patch.fte_required;
        let row = sqlx::query(&format!(
            "UPDATE opportunity_resource_timeline SET \
             stage_start_date = $1, stage_end_date = $2, duration_weeks = $3, \
             fte_required = $4, total_effort_weeks = $5, resource_status = $6, last_updated = $7 \
             WHERE opportunity_id = $8 AND service_line = $9 AND stage_name = $10 \
             RETURNING {TIMELINE_COLUMNS}"
        ))
        .bind(patch.stage_start_date)
        .bind(patch.stage_end_date)
        .bind(patch.duration_weeks as i32)
        .bind(patch.fte_required)
        .bind(total_effort_weeks)
        .bind(patch.resource_status)
        .bind(now)
        .bind(opportunity_id)
        .bind(service_line)
        .bind(stage)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_err("update_interval", e))?;

        row.map(timeline_row_from_pg).transpose()
    }

    async fn rows_for_filter(
        &self,
        filter: &PortfolioFilter,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        // Filters are applied in-process over the broad scan; the table is
        // expected to be small enough per opportunity-portfolio that a
        // targeted WHERE clause buys little over ownership-free filtering,
        // matching the teacher's `capacity_handlers::get_capacity_plan`
        // pattern of fetching then filtering in Rust.
        let mut query = format!("SELECT {TIMELINE_COLUMNS} FROM opportunity_resource_timeline WHERE 1=1");
        if let Some(start) = filter.start {
            query.push_str(&format!(" AND stage_end_date >= '{start}'"));
        }
        if let Some(end) = filter.end {
            query.push_str(&format!(" AND stage_start_date <= '{end}'"));
        }
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("rows_for_filter", e))?;

        rows.into_iter()
            .map(timeline_row_from_pg)
            .collect::<CoreResult<Vec<_>>>()
            .map(|rows| rows.into_iter().filter(|r| filter.matches(r)).collect())
    }

    async fn all_rows(&self) -> CoreResult<Vec<OpportunityResourceTimeline>> {
        let rows = sqlx::query(&format!("SELECT {TIMELINE_COLUMNS} FROM opportunity_resource_timeline"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_err("all_rows", e))?;

        rows.into_iter().map(timeline_row_from_pg).collect()
    }

    async fn delete_by_status(&self, status: ResourceStatus) -> CoreResult<u64> {
        let result = sqlx::query("DELETE FROM opportunity_resource_timeline WHERE resource_status = $1")
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(|e| db_err("delete_by_status", e))?;
        Ok(result.rows_affected())
    }

    async fn bounds(&self) -> CoreResult<(Option<NaiveDate>, Option<NaiveDate>)> {
        let row = sqlx::query(
            "SELECT MIN(stage_start_date) AS earliest, MAX(stage_end_date) AS latest \
             FROM opportunity_resource_timeline",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("bounds", e))?;

        Ok((
            row.try_get("earliest").map_err(|e| db_err("bounds.earliest", e))?,
            row.try_get("latest").map_err(|e| db_err("bounds.latest", e))?,
        ))
    }

    async fn has_non_predicted_rows(&self, opportunity_id: &str) -> CoreResult<bool> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM opportunity_resource_timeline \
             WHERE opportunity_id = $1 AND resource_status != 'Predicted') AS present",
        )
        .bind(opportunity_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_err("has_non_predicted_rows", e))?;

        row.try_get("present").map_err(|e| db_err("has_non_predicted_rows.present", e))
    }
}

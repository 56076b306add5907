use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::{
    CoreResult, IntervalPatch, Opportunity, OpportunityCategory, OpportunityLineItem,
    OpportunityResourceTimeline, PortfolioFilter, ResourceStatus, ServiceLine,
    ServiceLineCategory, ServiceLineOfferingMapping, ServiceLineOfferingThreshold,
    ServiceLineStageEffort, Stage,
};

/// Read-only configuration tables (spec.md §4.A). Values change rarely; no
/// caching is required for correctness.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn opportunity_categories(&self) -> CoreResult<Vec<OpportunityCategory>>;
    async fn service_line_categories(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineCategory>>;
    /// All stage-effort rows for the service line, across every resource
    /// category — the caller filters by resolved category name (the
    /// category itself is only known after `resolve_service_line_category`
    /// runs, so the store cannot pre-filter on it).
    async fn stage_effort(&self, service_line: ServiceLine) -> CoreResult<Vec<ServiceLineStageEffort>>;
    async fn offering_mappings(
        &self,
        service_line: ServiceLine,
    ) -> CoreResult<Vec<ServiceLineOfferingMapping>>;
    async fn offering_threshold(
        &self,
        service_line: ServiceLine,
        stage: Stage,
    ) -> CoreResult<Option<ServiceLineOfferingThreshold>>;
}

/// Opportunity and line-item entities (spec.md §4.B). Written by the
/// upstream loader; the core only reads them.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_opportunity(&self, opportunity_id: &str) -> CoreResult<Option<Opportunity>>;
    async fn list_opportunities(&self) -> CoreResult<Vec<Opportunity>>;
    async fn line_items(&self, opportunity_id: &str) -> CoreResult<Vec<OpportunityLineItem>>;
}

/// Materialized timeline rows (spec.md §3, §4.F). All write operations on a
/// single opportunity are expected to be atomic (delete-then-insert visible
/// as one unit to readers).
#[async_trait]
pub trait TimelineStore: Send + Sync {
    async fn insert_rows(&self, rows: Vec<OpportunityResourceTimeline>) -> CoreResult<()>;

    async fn replace_for_opportunity(
        &self,
        opportunity_id: &str,
        rows: Vec<OpportunityResourceTimeline>,
    ) -> CoreResult<()>;

    async fn delete_for_opportunity(&self, opportunity_id: &str) -> CoreResult<u64>;

    async fn rows_for_opportunity(
        &self,
        opportunity_id: &str,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>>;

    async fn update_status(
        &self,
        opportunity_id: &str,
        service_line: Option<ServiceLine>,
        stage: Option<Stage>,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> CoreResult<u64>;

    async fn update_interval(
        &self,
        opportunity_id: &str,
        service_line: ServiceLine,
        stage: Stage,
        patch: IntervalPatch,
        now: DateTime<Utc>,
    ) -> CoreResult<Option<OpportunityResourceTimeline>>;

    async fn rows_for_filter(
        &self,
        filter: &PortfolioFilter,
    ) -> CoreResult<Vec<OpportunityResourceTimeline>>;

    async fn all_rows(&self) -> CoreResult<Vec<OpportunityResourceTimeline>>;

    async fn delete_by_status(&self, status: ResourceStatus) -> CoreResult<u64>;

    async fn bounds(&self) -> CoreResult<(Option<NaiveDate>, Option<NaiveDate>)>;

    /// True if the opportunity currently has at least one non-`Predicted`
    /// row — used to guard bulk regeneration (spec.md §8 Status
    /// preservation).
    async fn has_non_predicted_rows(&self, opportunity_id: &str) -> CoreResult<bool>;
}

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{Stage, ServiceLine};
use sqlx::PgPool;
use uuid::Uuid;

const CATEGORY_NAMES: &[&str] = &["Cat A", "Cat B", "Cat C", "Cat D"];
const CATEGORY_BANDS: &[(f64, Option<f64>)] =
    &[(0.0, Some(5.0)), (5.0, Some(20.0)), (20.0, Some(100.0)), (100.0, None)];

const INTERNAL_SERVICES: &[&str] = &["Managed Workplace", "IT Operations Center", "Cloud Migration", "Security Monitoring"];
const SIMPLIFIED_OFFERINGS: &[&str] = &["Endpoint Support", "Service Desk", "Network Ops", "Cloud Platform", "SOC Monitoring"];

/// Seeds the configuration tables that drive scheduling: TCV bands, the
/// per-stage FTE template, and the offering-count multiplier tables.
pub async fn seed_config(pool: &PgPool) -> Result<()> {
    for (idx, (name, (min_tcv, max_tcv))) in CATEGORY_NAMES.iter().zip(CATEGORY_BANDS.iter()).enumerate() {
        let id = idx as i64 + 1;
        sqlx::query(
            "INSERT INTO opportunity_categories \
             (id, name, min_tcv, max_tcv, stage_01_duration_weeks, stage_02_duration_weeks, \
              stage_03_duration_weeks, stage_04a_duration_weeks, stage_04b_duration_weeks, \
              stage_05a_duration_weeks, stage_05b_duration_weeks, stage_06_duration_weeks) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(name)
        .bind(min_tcv)
        .bind(max_tcv)
        .bind(1_i32)
        .bind(1_i32)
        .bind(2_i32 + idx as i32)
        .bind(10_i32 + idx as i32 * 5)
        .bind(1_i32)
        .bind(1_i32)
        .bind(1_i32)
        .bind(1_i32)
        .execute(pool)
        .await
        .context("seeding opportunity_categories")?;
    }

    for service_line in ServiceLine::RESOURCE_PLANNED {
        for (idx, (name, (min_tcv, max_tcv))) in CATEGORY_NAMES.iter().zip(CATEGORY_BANDS.iter()).enumerate() {
            let id = idx as i64 + 1 + (service_line as i64 * 100);
            sqlx::query(
                "INSERT INTO service_line_categories (id, service_line, name, min_tcv, max_tcv) \
                 VALUES ($1, $2, $3, $4, $5) ON CONFLICT (id) DO NOTHING",
            )
            .bind(id)
            .bind(service_line)
            .bind(name)
            .bind(min_tcv)
            .bind(max_tcv)
            .execute(pool)
            .await
            .context("seeding service_line_categories")?;

            for (stage_idx, stage) in shared::STAGE_ORDER.iter().enumerate() {
                let fte = 0.1 + (idx as f64 * 0.1) + (stage_idx as f64 * 0.15);
                sqlx::query(
                    "INSERT INTO service_line_stage_effort \
                     (service_line, service_line_category, stage_name, fte_required) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (service_line, service_line_category, stage_name) DO NOTHING",
                )
                .bind(service_line)
                .bind(name)
                .bind(*stage)
                .bind(fte)
                .execute(pool)
                .await
                .context("seeding service_line_stage_effort")?;
            }
        }

        for stage in [Stage::S03, Stage::S04A, Stage::S04B] {
            sqlx::query(
                "INSERT INTO service_line_offering_thresholds \
                 (service_line, stage_name, threshold_count, increment_multiplier) \
                 VALUES ($1, $2, $3, $4) ON CONFLICT (service_line, stage_name) DO NOTHING",
            )
            .bind(service_line)
            .bind(stage)
            .bind(4_i32)
            .bind(0.1_f64)
            .execute(pool)
            .await
            .context("seeding service_line_offering_thresholds")?;
        }

        for (internal_service, simplified_offering) in INTERNAL_SERVICES.iter().zip(SIMPLIFIED_OFFERINGS.iter()) {
            sqlx::query(
                "INSERT INTO service_line_offering_mappings (service_line, internal_service, simplified_offering) \
                 VALUES ($1, $2, $3) ON CONFLICT (service_line, internal_service, simplified_offering) DO NOTHING",
            )
            .bind(service_line)
            .bind(internal_service)
            .bind(simplified_offering)
            .execute(pool)
            .await
            .context("seeding service_line_offering_mappings")?;
        }
    }

    Ok(())
}

/// Seeds a handful of sample opportunities (and their line items) so the
/// timeline endpoints have something to compute against in a dev database.
/// The real opportunity and line-item data comes from an external CRM feed
/// this crate does not own; this is fixture data only.
pub async fn seed_opportunities(pool: &PgPool, count: usize, rng: &mut StdRng) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(count);

    for _ in 0..count {
        let opportunity_id = Uuid::new_v4().to_string();
        let tcv: f64 = rng.gen_range(1.0..150.0);
        let decision_date = Utc::now().date_naive() + Duration::days(rng.gen_range(30..400));
        let sales_stage = shared::STAGE_ORDER[rng.gen_range(0..shared::STAGE_ORDER.len())].as_str();
        let mw_revenue: f64 = rng.gen_range(0.0..tcv);
        let itoc_revenue: f64 = rng.gen_range(0.0..(tcv - mw_revenue).max(0.0));

        sqlx::query(
            "INSERT INTO opportunities \
             (opportunity_id, tcv, decision_date, sales_stage, lead_offering, \
              ces_millions, ins_millions, bps_millions, sec_millions, itoc_millions, mw_millions) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (opportunity_id) DO NOTHING",
        )
        .bind(&opportunity_id)
        .bind(tcv)
        .bind(decision_date)
        .bind(sales_stage)
        .bind(ServiceLine::Mw)
        .bind(0.0_f64)
        .bind(0.0_f64)
        .bind(0.0_f64)
        .bind(0.0_f64)
        .bind(itoc_revenue)
        .bind(mw_revenue)
        .execute(pool)
        .await
        .context("seeding opportunities")?;

        let line_item_count = rng.gen_range(1..4);
        for _ in 0..line_item_count {
            let internal_service = INTERNAL_SERVICES[rng.gen_range(0..INTERNAL_SERVICES.len())];
            let simplified_offering = SIMPLIFIED_OFFERINGS[rng.gen_range(0..SIMPLIFIED_OFFERINGS.len())];
            sqlx::query(
                "INSERT INTO opportunity_line_items (opportunity_id, internal_service, simplified_offering) \
                 VALUES ($1, $2, $3)",
            )
            .bind(&opportunity_id)
            .bind(internal_service)
            .bind(simplified_offering)
            .execute(pool)
            .await
            .context("seeding opportunity_line_items")?;
        }

        ids.push(opportunity_id);
    }

    Ok(ids)
}

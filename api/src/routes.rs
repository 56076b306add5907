// api/src/routes.rs
//
// Register all resource-timeline routes.
// Add to the main router:
//
//   use crate::routes::timeline_router;
//   let app = Router::new()
//       .merge(timeline_router())
//       ...
//       .with_state(state);

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::{
    handlers::{
        clear_predicted, compute_timeline, delete_timeline, generate_bulk, generation_stats,
        get_timeline, patch_interval, patch_status, portfolio_forecast, timeline_bounds,
    },
    state::AppState,
};

pub fn timeline_router() -> Router<AppState> {
    Router::new()
        .route(
            "/opportunities/:id/timeline",
            post(compute_timeline).get(get_timeline).delete(delete_timeline),
        )
        .route("/opportunities/:id/timeline/status", patch(patch_status))
        .route(
            "/opportunities/:id/timeline/:service_line/:stage",
            patch(patch_interval),
        )
        .route("/timelines/generate-bulk", post(generate_bulk))
        .route("/timelines/generation-stats", get(generation_stats))
        .route("/timelines/clear-predicted", post(clear_predicted))
        .route("/portfolio/forecast", post(portfolio_forecast))
        .route("/portfolio/timeline-bounds", get(timeline_bounds))
}

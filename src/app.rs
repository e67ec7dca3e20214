use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post, put},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/today", get(handlers::get_today))
        .route("/api/days/:date", get(handlers::get_day))
        .route("/api/days/:date/reset", post(handlers::reset_day))
        .route("/api/days/:date/sessions/:id", delete(handlers::delete_session))
        .route("/api/habits/:id", post(handlers::record_habit))
        .route("/api/timer", get(handlers::get_timer))
        .route("/api/timer/start", post(handlers::start_timer))
        .route("/api/timer/pause", post(handlers::pause_timer))
        .route("/api/timer/stop", post(handlers::stop_timer))
        .route("/api/timer/reconcile", post(handlers::reconcile_timer))
        .route("/api/timer/tag", post(handlers::select_tag))
        .route("/api/report", get(handlers::get_report))
        .route("/api/calendar", get(handlers::get_calendar))
        .route("/api/export", get(handlers::export_json))
        .route("/api/export.csv", get(handlers::export_csv))
        .route("/api/import", post(handlers::import))
        .route("/api/settings", get(handlers::get_settings).put(handlers::put_settings))
        .route("/api/tags", post(handlers::add_tag))
        .route("/api/tags/:name", put(handlers::update_tag))
        .with_state(state)
}

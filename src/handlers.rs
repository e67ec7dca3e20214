use crate::clock::parse_day_key;
use crate::errors::AppError;
use crate::migrate::normalize_settings;
use crate::models::{
    Backup, CalendarResponse, DayRecord, HabitRequest, HabitResponse, ImportReport,
    ReportResponse, Settings, StopResponse, Tag, TagRequest, TagSelectRequest, TimerView,
    TodayResponse,
};
use crate::state::AppState;
use crate::stats::{build_calendar, build_report_at, parse_month};
use crate::tracker::TagEdit;
use crate::ui::render_index;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use chrono::Datelike;
use serde::Deserialize;
use tracing::info;

const DEFAULT_RANGE: u32 = 7;
const MAX_RANGE: u32 = 366;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub range: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub month: Option<String>,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let tracker = state.tracker.lock().await;
    let date = tracker.today();
    let record = tracker.day(&date);
    Html(render_index(&date, &record, &tracker.timer()))
}

pub async fn get_today(State(state): State<AppState>) -> Json<TodayResponse> {
    let tracker = state.tracker.lock().await;
    let date = tracker.today();
    Json(TodayResponse {
        record: tracker.day(&date),
        timer: tracker.timer(),
        settings: tracker.settings(),
        date,
    })
}

pub async fn get_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayRecord>, AppError> {
    require_day_key(&date)?;
    Ok(Json(state.tracker.lock().await.day(&date)))
}

pub async fn record_habit(
    State(state): State<AppState>,
    Path(habit): Path<String>,
    Json(payload): Json<HabitRequest>,
) -> Result<Json<HabitResponse>, AppError> {
    let tracker = state.tracker.lock().await;
    if tracker.settings().habit(&habit).is_none() {
        return Err(AppError::not_found(format!("unknown habit '{habit}'")));
    }
    let change = tracker.record_habit(&habit, payload.delta)?;
    Ok(Json(HabitResponse {
        date: tracker.today(),
        habit,
        applied: change.applied,
        count: change.count,
    }))
}

pub async fn get_timer(State(state): State<AppState>) -> Json<TimerView> {
    Json(state.tracker.lock().await.timer())
}

pub async fn start_timer(State(state): State<AppState>) -> Result<Json<TimerView>, AppError> {
    let view = {
        let mut tracker = state.tracker.lock().await;
        tracker.start_timer()?;
        tracker.timer()
    };
    state.sync_ticker().await;
    Ok(Json(view))
}

pub async fn pause_timer(State(state): State<AppState>) -> Result<Json<TimerView>, AppError> {
    let view = {
        let mut tracker = state.tracker.lock().await;
        tracker.pause_timer()?;
        tracker.timer()
    };
    state.sync_ticker().await;
    Ok(Json(view))
}

pub async fn stop_timer(State(state): State<AppState>) -> Result<Json<StopResponse>, AppError> {
    let response = {
        let mut tracker = state.tracker.lock().await;
        let session = tracker.stop_timer()?;
        StopResponse {
            timer: tracker.timer(),
            session,
        }
    };
    state.sync_ticker().await;
    Ok(Json(response))
}

/// Hit by the page whenever it becomes visible again.
pub async fn reconcile_timer(State(state): State<AppState>) -> Json<TimerView> {
    let view = state.tracker.lock().await.reconcile_timer();
    state.sync_ticker().await;
    Json(view)
}

pub async fn select_tag(
    State(state): State<AppState>,
    Json(payload): Json<TagSelectRequest>,
) -> Result<Json<TimerView>, AppError> {
    let mut tracker = state.tracker.lock().await;
    if !tracker.select_tag(&payload.name) {
        return Err(AppError::conflict(
            "tag must exist and can only change while the timer is idle",
        ));
    }
    Ok(Json(tracker.timer()))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path((date, id)): Path<(String, i64)>,
) -> Result<Json<DayRecord>, AppError> {
    require_day_key(&date)?;
    let tracker = state.tracker.lock().await;
    if !tracker.delete_session(&date, id)? {
        return Err(AppError::not_found(format!("no session {id} on {date}")));
    }
    Ok(Json(tracker.day(&date)))
}

pub async fn reset_day(
    State(state): State<AppState>,
    Path(date): Path<String>,
) -> Result<Json<DayRecord>, AppError> {
    require_day_key(&date)?;
    let record = state.tracker.lock().await.reset_day(&date)?;
    state.sync_ticker().await;
    Ok(Json(record))
}

pub async fn get_report(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Json<ReportResponse> {
    let range = query.range.unwrap_or(DEFAULT_RANGE).clamp(1, MAX_RANGE);
    let tracker = state.tracker.lock().await;
    let repo = tracker.repository();
    Json(build_report_at(
        tracker.today_date(),
        range,
        &repo.load_days(),
        &repo.load_settings(),
    ))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let tracker = state.tracker.lock().await;
    let first = match query.month.as_deref() {
        Some(month) => parse_month(month)
            .ok_or_else(|| AppError::bad_request("month must look like YYYY-MM"))?,
        None => {
            let today = tracker.today_date();
            today.with_day(1).unwrap_or(today)
        }
    };
    let repo = tracker.repository();
    Ok(Json(build_calendar(
        first,
        &repo.load_days(),
        &repo.load_settings(),
    )))
}

pub async fn export_json(State(state): State<AppState>) -> Json<Backup> {
    Json(state.tracker.lock().await.export_all())
}

pub async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = state.tracker.lock().await;
    let disposition = format!("attachment; filename=\"report_{}.csv\"", tracker.today());
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        tracker.export_csv(),
    )
}

pub async fn import(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<ImportReport>), AppError> {
    let report = state.tracker.lock().await.import(&body)?;
    state.sync_ticker().await;
    if !report.success {
        return Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(report)));
    }
    info!(count = report.count, kind = ?report.kind, "import applied");
    Ok((StatusCode::OK, Json(report)))
}

pub async fn get_settings(State(state): State<AppState>) -> Json<Settings> {
    Json(state.tracker.lock().await.settings())
}

pub async fn put_settings(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<Settings>, AppError> {
    if !payload.is_object() {
        return Err(AppError::bad_request("settings must be a JSON object"));
    }
    let settings = normalize_settings(payload);
    state.tracker.lock().await.replace_settings(&settings)?;
    Ok(Json(settings))
}

pub async fn add_tag(
    State(state): State<AppState>,
    Json(payload): Json<TagRequest>,
) -> Result<Json<Settings>, AppError> {
    let tag = validated_tag(payload)?;
    let tracker = state.tracker.lock().await;
    match tracker.add_tag(tag)? {
        TagEdit::Saved => Ok(Json(tracker.settings())),
        TagEdit::Duplicate | TagEdit::Missing => Err(AppError::conflict("tag already exists")),
    }
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<TagRequest>,
) -> Result<Json<Settings>, AppError> {
    let tag = validated_tag(payload)?;
    let mut tracker = state.tracker.lock().await;
    match tracker.update_tag(&name, tag)? {
        TagEdit::Saved => Ok(Json(tracker.settings())),
        TagEdit::Duplicate => Err(AppError::conflict("tag already exists")),
        TagEdit::Missing => Err(AppError::not_found(format!("unknown tag '{name}'"))),
    }
}

fn validated_tag(payload: TagRequest) -> Result<Tag, AppError> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("tag name must not be empty"));
    }
    Ok(Tag {
        name: name.to_string(),
        color: payload.color.trim().to_string(),
    })
}

fn require_day_key(date: &str) -> Result<(), AppError> {
    parse_day_key(date)
        .map(|_| ())
        .ok_or_else(|| AppError::bad_request("date must look like YYYY-MM-DD"))
}

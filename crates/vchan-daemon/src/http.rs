use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use vchan_core::guide::{GuideChannel, GuideEntry};
use vchan_core::service::ChannelService;
use vchan_core::state::ChannelStatistics;
use vchan_core::{ScheduleError, SegmentKind};

const DEFAULT_GUIDE_HOURS: i64 = 24;
const MAX_GUIDE_HOURS: i64 = 24 * 14;

#[derive(Clone)]
struct HttpState {
    service: Arc<ChannelService>,
    cancel: CancellationToken,
}

#[derive(Deserialize)]
struct GuideQuery {
    hours: Option<i64>,
}

#[derive(Deserialize)]
struct RefreshQuery {
    channel: Option<String>,
}

#[derive(Serialize)]
struct GuideResponse {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    channels: Vec<GuideChannel>,
    programmes: Vec<GuideEntry>,
    /// Channels whose schedule could not be built, with the reason.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    errors: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct NowPlaying {
    channel: String,
    program_id: String,
    title: String,
    program_start: DateTime<Utc>,
    program_end: DateTime<Utc>,
    segment_index: usize,
    segment_kind: SegmentKind,
    item: String,
    path: Option<String>,
    offset_secs: f64,
    media_offset_secs: f64,
}

#[derive(Serialize)]
struct AutoGenerated {
    generated: usize,
}

pub fn start_server(
    bind_address: String,
    port: u16,
    service: Arc<ChannelService>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app_state = HttpState {
            service,
            cancel: cancel.clone(),
        };

        let app = Router::new()
            .route("/api/guide", get(get_guide))
            .route("/api/channels", get(list_channels))
            .route("/api/channels/:id/now", get(now_playing))
            .route("/api/channels/:id/stop", post(stop_channel))
            .route("/api/refresh", post(refresh))
            .route("/api/stats", get(stats))
            .route("/api/genres", get(genres))
            .route("/api/auto-generate", post(auto_generate))
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
            .with_state(app_state);

        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        let shutdown = async move { cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            error!("HTTP server error: {}", e);
        }
    })
}

async fn get_guide(
    State(state): State<HttpState>,
    Query(query): Query<GuideQuery>,
) -> Json<GuideResponse> {
    let hours = query
        .hours
        .unwrap_or(DEFAULT_GUIDE_HOURS)
        .clamp(1, MAX_GUIDE_HOURS);
    let start = Utc::now();
    let end = start + TimeDelta::hours(hours);

    let guide = state.service.guide(start, start, end, &state.cancel).await;

    let mut programmes = Vec::new();
    let mut errors = BTreeMap::new();
    for (channel_id, result) in guide {
        match result {
            Ok(programs) => programmes.extend(programs.iter().map(GuideEntry::from)),
            Err(e) => {
                errors.insert(channel_id, e.to_string());
            }
        }
    }
    info!("HTTP API: Guide for {}h, {} programmes", hours, programmes.len());

    Json(GuideResponse {
        start,
        end,
        channels: state.service.guide_channels().await,
        programmes,
        errors,
    })
}

async fn list_channels(State(state): State<HttpState>) -> Json<Vec<GuideChannel>> {
    Json(state.service.guide_channels().await)
}

async fn now_playing(
    State(state): State<HttpState>,
    Path(channel_id): Path<String>,
) -> Result<Json<NowPlaying>, StatusCode> {
    info!("HTTP API: Tune in to {}", channel_id);
    let tune_in = match state
        .service
        .tune_in(&channel_id, Utc::now(), &state.cancel)
        .await
    {
        Ok(Some(tune_in)) => tune_in,
        Ok(None) => return Err(StatusCode::NO_CONTENT),
        Err(ScheduleError::UnknownChannel(_)) => return Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(channel = %channel_id, "Tune in failed: {}", e);
            return Err(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    let program = &tune_in.program;
    Ok(Json(NowPlaying {
        channel: channel_id,
        program_id: program.id.clone(),
        title: program.item.name.clone(),
        program_start: program.start,
        program_end: program.end,
        segment_index: tune_in.segment_index,
        segment_kind: tune_in.segment.kind,
        item: tune_in.segment.item.name.clone(),
        path: tune_in
            .segment
            .item
            .path
            .as_ref()
            .map(|p| p.display().to_string()),
        offset_secs: tune_in.offset.as_secs_f64(),
        media_offset_secs: tune_in.media_offset.as_secs_f64(),
    }))
}

async fn stop_channel(State(state): State<HttpState>, Path(channel_id): Path<String>) -> StatusCode {
    if state.service.policy(&channel_id).await.is_none() {
        return StatusCode::NOT_FOUND;
    }
    info!("HTTP API: Stop {}", channel_id);
    state.service.stop_streaming(&channel_id).await;
    StatusCode::OK
}

async fn refresh(State(state): State<HttpState>, Query(query): Query<RefreshQuery>) -> StatusCode {
    info!("HTTP API: Refresh {:?}", query.channel);
    state.service.reset(query.channel.as_deref()).await;
    StatusCode::OK
}

async fn stats(State(state): State<HttpState>) -> Json<ChannelStatistics> {
    Json(state.service.statistics().await)
}

async fn genres(State(state): State<HttpState>) -> Result<Json<Vec<String>>, StatusCode> {
    state.service.library_genres().await.map(Json).map_err(|e| {
        error!("Failed to list genres: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })
}

async fn auto_generate(State(state): State<HttpState>) -> Result<Json<AutoGenerated>, StatusCode> {
    info!("HTTP API: Regenerate auto channels");
    match state.service.regenerate_auto_channels().await {
        Ok(generated) => Ok(Json(AutoGenerated { generated })),
        Err(e) => {
            error!("Auto channel generation failed: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

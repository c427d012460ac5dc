use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

use crate::{
    error::ApiError,
    flows::NutritionFlows,
    scan::{
        handlers::{read_image_field, UPLOAD_BODY_LIMIT},
        services::{
            identify_image, lookup_barcode, LookupOutcome, BARCODE_FLOW_FAILED, IMAGE_FLOW_FAILED,
        },
        BarcodeScanRequest,
    },
    state::AppState,
    validation::{BarcodeQuery, ImageQuery},
};

use super::dto::{SelectModeRequest, SessionView};
use super::machine::{Applied, ScanMode, Ticket};

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id", get(get_session).delete(delete_session))
        .route("/sessions/:id/mode", put(select_mode))
        .route("/sessions/:id/barcode", post(submit_barcode))
        .route("/sessions/:id/image", post(submit_image))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

#[instrument(skip(state))]
pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, HeaderMap, Json<SessionView>) {
    let view = state.sessions.create().await;
    info!(session_id = %view.id, "session created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/v1/sessions/{}", view.id).parse::<HeaderValue>() {
        headers.insert(header::LOCATION, location);
    }
    (StatusCode::CREATED, headers, Json(view))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.get(id).await?))
}

#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// PUT /sessions/:id/mode { "mode": "barcode" | "image" }
#[instrument(skip(state, body))]
pub async fn select_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SelectModeRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let ((), view) = state
        .sessions
        .update(id, |s| s.select_mode(body.mode))
        .await?;
    Ok(Json(view))
}

#[instrument(skip(state, body))]
pub async fn submit_barcode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<BarcodeScanRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let query = BarcodeQuery::parse(&body.barcode)?;
    dispatch(state, id, Submission::Barcode(query)).await
}

#[instrument(skip(state, mp))]
pub async fn submit_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mp: Multipart,
) -> Result<Json<SessionView>, ApiError> {
    let file = read_image_field(mp).await?;
    let photo = ImageQuery::parse(file.as_ref().map(|(b, ct)| (b.clone(), ct.as_str())))?;
    dispatch(state, id, Submission::Image(photo)).await
}

enum Submission {
    Barcode(BarcodeQuery),
    Image(ImageQuery),
}

impl Submission {
    fn mode(&self) -> ScanMode {
        match self {
            Submission::Barcode(_) => ScanMode::Barcode,
            Submission::Image(_) => ScanMode::Image,
        }
    }

    async fn run(&self, flows: &dyn NutritionFlows) -> LookupOutcome {
        match self {
            Submission::Barcode(query) => lookup_barcode(flows, query).await,
            Submission::Image(photo) => identify_image(flows, photo).await,
        }
    }

    fn timed_out(&self) -> LookupOutcome {
        let message = match self {
            Submission::Barcode(_) => BARCODE_FLOW_FAILED,
            Submission::Image(_) => IMAGE_FLOW_FAILED,
        };
        LookupOutcome::Failed {
            message: message.to_string(),
        }
    }
}

/// The lookup and its write-back run on their own task, so a client that
/// disconnects mid-request cannot leave the session in `Loading`. The flow
/// deadline bounds how long `Loading` can last.
async fn dispatch(
    state: AppState,
    id: Uuid,
    submission: Submission,
) -> Result<Json<SessionView>, ApiError> {
    let ticket = begin(&state, id, submission.mode()).await?;
    let deadline = Duration::from_secs(state.config.gemini.timeout_secs);

    let task = tokio::spawn(
        async move {
            let outcome =
                match tokio::time::timeout(deadline, submission.run(state.flows.as_ref())).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(session_id = %id, ?deadline, "scan exceeded flow deadline");
                        submission.timed_out()
                    }
                };
            finish(&state, id, ticket, outcome).await
        }
        .in_current_span(),
    );
    task.await?
}

async fn begin(state: &AppState, id: Uuid, mode: ScanMode) -> Result<Ticket, ApiError> {
    let (ticket, _) = state.sessions.update(id, |s| s.begin(mode)).await?;
    let ticket = ticket?;
    info!(session_id = %id, generation = ticket.generation(), ?mode, "scan dispatched");
    Ok(ticket)
}

async fn finish(
    state: &AppState,
    id: Uuid,
    ticket: Ticket,
    outcome: LookupOutcome,
) -> Result<Json<SessionView>, ApiError> {
    let (applied, view) = state
        .sessions
        .update(id, |s| s.complete(ticket, outcome))
        .await?;
    if applied == Applied::Stale {
        warn!(session_id = %id, generation = ticket.generation(), current = view.generation, "discarding stale result");
    }
    Ok(Json(view))
}

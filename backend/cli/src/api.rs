use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError,
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, error, warn};

use studysnap_core::{Event, ProblemId, ProblemItem, SnapError, StatusCounts, Subject};
use studysnap_media::{IntakeMode, UploadedFile};
use studysnap_session::StudySession;

/// Shared application state for API handlers.
pub struct AppState {
    pub session: StudySession,
    pub model: String,
    /// Body limit for photo uploads
    pub max_upload_bytes: usize,
}

/// Build the Axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/problems",
            get(list_problems)
                .post(submit_problems)
                .delete(clear_problems)
                .layer(upload_limit),
        )
        .route("/api/problems/:id", get(get_problem).delete(delete_problem))
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// JSON error body with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        // 413 when the upload limit is hit, 400 for malformed bodies
        Self::new(e.status(), e.body_text())
    }
}

impl From<SnapError> for ApiError {
    fn from(e: SnapError) -> Self {
        let status = match &e {
            SnapError::NotAnImage { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            SnapError::NoFiles => StatusCode::BAD_REQUEST,
            _ => {
                error!(error = %e, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, e.to_string())
    }
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "studysnap",
        "version": env!("CARGO_PKG_VERSION"),
        "model": state.model,
    }))
}

/// All problems, newest first, with per-status counts.
async fn list_problems(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.session.snapshot();
    let problems: Vec<&ProblemItem> = snapshot.iter().map(Arc::as_ref).collect();
    let counts = StatusCounts::tally(problems.iter().copied());
    Json(json!({ "problems": problems, "counts": counts }))
}

async fn get_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> Result<Json<Value>, ApiError> {
    state
        .session
        .get(&id)
        .map(|item| Json(json!(&*item)))
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("problem {} not found", id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitParams {
    pub subject: Option<String>,
    pub mode: Option<String>,
}

/// Upload photos (one multipart part per file) and start solving them.
async fn submit_problems(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SubmitParams>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let subject = match params.subject.as_deref() {
        Some(s) => s
            .parse::<Subject>()
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?,
        None => Subject::default(),
    };
    let mode = match params.mode.as_deref() {
        Some(m) => m
            .parse::<IntakeMode>()
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e))?,
        None => IntakeMode::default(),
    };

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let file_name = field
            .file_name()
            .or_else(|| field.name())
            .unwrap_or("upload")
            .to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        debug!(file = %file_name, size = bytes.len(), "Received upload part");
        files.push(UploadedFile::new(file_name, mime_type, bytes));
    }

    let ids = state.session.submit(files, mode, subject).await?;
    let status = if ids.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(json!({ "ids": ids, "accepted": ids.len() }))))
}

async fn delete_problem(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ProblemId>,
) -> Result<StatusCode, ApiError> {
    if state.session.delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("problem {} not found", id),
        ))
    }
}

async fn clear_problems(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let removed = state.session.clear().await?;
    Ok(Json(json!({ "removed": removed })))
}

/// WebSocket handler for real-time events.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sink, incoming) = socket.split();
    forward_events(sink, incoming, state.session.subscribe()).await;
    debug!("WebSocket client disconnected");
}

/// Send every event to the client until it goes away or the session stops.
async fn forward_events<S, R>(mut sink: S, mut incoming: R, events: broadcast::Receiver<Event>)
where
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let mut events = BroadcastStream::new(events);

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    // Client re-syncs through GET /api/problems
                    warn!(skipped, "WebSocket client lagged behind events");
                }
                None => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Pings are answered by the socket itself
                Some(Ok(_)) => {}
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures::channel::mpsc;
    use studysnap_core::EventKind;
    use studysnap_solver::{MockProvider, SolveResolver};
    use tokio::net::TcpListener;

    async fn spawn_app(provider: MockProvider) -> String {
        let session = StudySession::start(SolveResolver::new(Arc::new(provider), "mock-model"));
        let state = Arc::new(AppState {
            session,
            model: "mock-model".into(),
            max_upload_bytes: 32 * 1024 * 1024,
        });
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn part(name: &str, mime: &str, bytes: &'static [u8]) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(mime)
            .unwrap()
    }

    async fn settled(client: &reqwest::Client, base: &str) -> Value {
        for _ in 0..50 {
            let body: Value = client
                .get(format!("{}/api/problems", base))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if body["counts"]["analyzing"] == 0 {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("problems never settled");
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn_app(MockProvider::new("mock")).await;
        let body: Value = reqwest::get(format!("{}/api/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "mock-model");
    }

    #[tokio::test]
    async fn test_batch_upload_skips_non_images() {
        let base = spawn_app(MockProvider::new("mock").with_response("Step 1: add")).await;
        let client = reqwest::Client::new();
        let form = reqwest::multipart::Form::new()
            .part("file", part("a.png", "image/png", b"a"))
            .part("file", part("notes.txt", "text/plain", b"t"))
            .part("file", part("b.jpg", "image/jpeg", b"b"));

        let resp = client
            .post(format!("{}/api/problems?subject=math", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["accepted"], 2);

        let listing = settled(&client, &base).await;
        let problems = listing["problems"].as_array().unwrap();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0]["image"]["file_name"], "a.png");
        assert_eq!(problems[0]["subject"], "math");
        assert_eq!(problems[1]["status"], "completed");
        assert_eq!(problems[1]["solution"], "Step 1: add");
    }

    #[tokio::test]
    async fn test_photo_above_default_body_limit_is_accepted() {
        let base = spawn_app(MockProvider::new("mock").with_response("x = 3")).await;
        let client = reqwest::Client::new();
        let photo = reqwest::multipart::Part::bytes(vec![0xFFu8; 3 * 1024 * 1024])
            .file_name("IMG_0042.jpg")
            .mime_str("image/jpeg")
            .unwrap();
        let form = reqwest::multipart::Form::new().part("file", photo);

        let resp = client
            .post(format!("{}/api/problems", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        let listing = settled(&client, &base).await;
        assert_eq!(listing["problems"][0]["image"]["size_bytes"], 3 * 1024 * 1024);
        assert_eq!(listing["problems"][0]["solution"], "x = 3");
    }

    #[tokio::test]
    async fn test_single_mode_rejects_non_image() {
        let base = spawn_app(MockProvider::new("mock")).await;
        let form = reqwest::multipart::Form::new().part("file", part("essay.pdf", "application/pdf", b"%PDF"));
        let resp = reqwest::Client::new()
            .post(format!("{}/api/problems?mode=single", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("essay.pdf"));
    }

    #[tokio::test]
    async fn test_unknown_subject_is_bad_request() {
        let base = spawn_app(MockProvider::new("mock")).await;
        let form = reqwest::multipart::Form::new().part("file", part("a.png", "image/png", b"a"));
        let resp = reqwest::Client::new()
            .post(format!("{}/api/problems?subject=astrology", base))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_and_delete_problem() {
        let base = spawn_app(MockProvider::new("mock").with_delay(Duration::from_secs(60))).await;
        let client = reqwest::Client::new();
        let form = reqwest::multipart::Form::new().part("file", part("a.png", "image/png", b"a"));
        let body: Value = client
            .post(format!("{}/api/problems", base))
            .multipart(form)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let id = body["ids"][0].as_str().unwrap().to_string();

        let item: Value = client
            .get(format!("{}/api/problems/{}", base, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(item["status"], "analyzing");

        let resp = client
            .delete(format!("{}/api/problems/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NO_CONTENT);

        let resp = client
            .get(format!("{}/api/problems/{}", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_clear_reports_removed() {
        let base = spawn_app(MockProvider::new("mock").with_delay(Duration::from_secs(60))).await;
        let client = reqwest::Client::new();
        let form = reqwest::multipart::Form::new()
            .part("file", part("a.png", "image/png", b"a"))
            .part("file", part("b.png", "image/png", b"b"));
        client
            .post(format!("{}/api/problems", base))
            .multipart(form)
            .send()
            .await
            .unwrap();

        let body: Value = client
            .delete(format!("{}/api/problems", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["removed"], 2);
    }

    #[tokio::test]
    async fn test_events_forwarded_until_session_stops() {
        let (events_tx, events_rx) = broadcast::channel(8);
        let (sink, mut client) = mpsc::unbounded::<Message>();
        let task = tokio::spawn(forward_events(sink, futures::stream::pending(), events_rx));

        events_tx
            .send(Event::new(None, EventKind::CollectionCleared, json!({ "removed": 2 })))
            .unwrap();
        let Some(Message::Text(text)) = client.next().await else {
            panic!("expected a text frame");
        };
        let event: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(event["kind"], "collection_cleared");
        assert_eq!(event["payload"]["removed"], 2);

        drop(events_tx);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_socket_ends_when_client_leaves() {
        // The sender stays alive: no event ever arrives to notice the disconnect
        let (events_tx, _) = broadcast::channel::<Event>(8);

        let (sink, _client) = mpsc::unbounded::<Message>();
        let closed = futures::stream::iter(vec![Ok(Message::Close(None))]);
        tokio::time::timeout(
            Duration::from_secs(1),
            forward_events(sink, closed, events_tx.subscribe()),
        )
        .await
        .expect("close frame should end forwarding");

        let (sink, _client) = mpsc::unbounded::<Message>();
        let dropped = futures::stream::empty::<Result<Message, axum::Error>>();
        tokio::time::timeout(
            Duration::from_secs(1),
            forward_events(sink, dropped, events_tx.subscribe()),
        )
        .await
        .expect("dropped connection should end forwarding");

        assert_eq!(events_tx.receiver_count(), 0);
    }
}

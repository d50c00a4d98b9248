use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use morbles_shared::progress::validate_submission;
use morbles_shared::types::{Level, LevelId, NewLevel, Player, PlayerRecord, ProgressSubmission};
use morbles_shared::ValidationError;
use morbles_store::{Database, ProgressReport, StoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::directory::PlayerDirectory;
use crate::error::ServerError;
use crate::session::{clear_cookie, require_session, session_cookie, CurrentSession, SessionStore};
use crate::throttle::LoginThrottle;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub catalog: Arc<Catalog>,
    pub directory: Arc<PlayerDirectory>,
    pub sessions: SessionStore,
    pub login_throttle: LoginThrottle,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Wire every service around an opened database. Fails if the level
    /// catalog cannot be loaded.
    pub async fn new(db: Database, config: ServerConfig) -> Result<Self, StoreError> {
        let db = Arc::new(Mutex::new(db));
        let catalog = Arc::new(Catalog::load(db.clone()).await?);
        let directory = Arc::new(PlayerDirectory::new(db.clone(), config.registration_open));

        Ok(Self {
            db,
            catalog,
            directory,
            sessions: SessionStore::new(config.session_ttl_secs),
            login_throttle: LoginThrottle::default(),
            config: Arc::new(config),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let private = Router::new()
        .route("/logout", get(logout))
        .route("/me", get(me))
        .route("/status", get(status))
        .route("/levels", get(list_levels).post(create_level))
        .route("/levels/ids", get(level_ids))
        .route("/levels/next/:id", get(next_level_id))
        .route("/levels/:id", get(get_level).put(update_level))
        .route("/player", get(current_player))
        .route("/player/:id", get(get_player).put(put_player))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/login", post(login))
        .route("/admin/players", post(admin_create_player))
        .route("/admin/players/:id/admin", post(admin_set_player_admin))
        .route("/admin/levels/refresh", post(admin_refresh_catalog))
        .nest("/api", private)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config)),
        )
        .with_state(state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Serialize)]
struct ProgressResponse {
    player: Player,
    report: ProgressReport,
}

#[derive(Deserialize)]
struct AdminFlagRequest {
    admin: bool,
}

#[derive(Deserialize)]
struct CreatePlayerRequest {
    name: String,
}

fn parse_id(raw: &str) -> Result<u16, ValidationError> {
    raw.trim()
        .parse()
        .map_err(|_| ValidationError::MalformedId(raw.to_string()))
}

fn require_admin(current: &CurrentSession) -> Result<(), ServerError> {
    if current.player.admin {
        Ok(())
    } else {
        Err(ServerError::Forbidden("Admin rights required".into()))
    }
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Session endpoints ───

async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, ServerError> {
    if !state.login_throttle.check(&form.username).await {
        return Err(ServerError::TooManyRequests);
    }

    let player = state.directory.login(&form.username, &form.password).await?;
    let token = state.sessions.create(&player).await;
    let cookie = session_cookie(
        &token,
        state.config.client_domain.as_deref(),
        state.config.session_ttl_secs,
    );

    info!(player_id = player.id, "Player logged in");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "message": "Successfully authenticated user" })),
    )
        .into_response())
}

async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Response {
    state.sessions.remove(&current.token).await;
    info!(player_id = current.player.id, "Player logged out");
    (
        [(header::SET_COOKIE, clear_cookie(state.config.client_domain.as_deref()))],
        Json(serde_json::json!({ "message": "Successfully logged out" })),
    )
        .into_response()
}

async fn me(Extension(current): Extension<CurrentSession>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": current.player.name }))
}

async fn status() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "You are logged in" }))
}

// ─── Level endpoints ───

async fn list_levels(State(state): State<AppState>) -> Json<Vec<Level>> {
    Json(state.catalog.list().await)
}

async fn level_ids(State(state): State<AppState>) -> Json<Vec<LevelId>> {
    Json(state.catalog.ids().await)
}

async fn get_level(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Level>, ServerError> {
    let id = parse_id(&raw)?;
    state
        .catalog
        .by_id(id)
        .await
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("Level".into()))
}

async fn next_level_id(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<LevelId>, ServerError> {
    let id = parse_id(&raw)?;
    state
        .catalog
        .next_after(id)
        .await
        .map(|level| Json(level.id))
        .ok_or_else(|| ServerError::NotFound("Next level".into()))
}

/// Any player may submit a level; only admins may mark it official.
async fn create_level(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    body: Result<Json<NewLevel>, JsonRejection>,
) -> Result<Json<Level>, ServerError> {
    let Json(mut candidate) = body?;
    if candidate.is_official && !current.player.admin {
        debug!(player_id = current.player.id, "Dropping official flag on player submission");
        candidate.is_official = false;
    }
    let level = state.catalog.insert(candidate).await?;
    Ok(Json(level))
}

async fn update_level(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(raw): Path<String>,
    body: Result<Json<NewLevel>, JsonRejection>,
) -> Result<Json<Level>, ServerError> {
    let id = parse_id(&raw)?;
    require_admin(&current)?;
    let Json(replacement) = body?;
    state
        .catalog
        .update(id, replacement)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound("Level".into()))
}

// ─── Player endpoints ───

async fn current_player(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
) -> Result<Json<Player>, ServerError> {
    let player = state.directory.view(current.player, &state.catalog).await?;
    Ok(Json(player))
}

async fn get_player(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Player>, ServerError> {
    let id = parse_id(&raw)?;
    let record = state
        .directory
        .get(id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Player".into()))?;
    let player = state.directory.view(record, &state.catalog).await?;
    Ok(Json(player))
}

/// Write submitted level statuses for player `id`.
///
/// Answers 200 when every entry was applied and 409 otherwise; both carry the
/// per-entry report and the player view as stored afterwards.
async fn put_player(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentSession>,
    Path(raw): Path<String>,
    body: Result<Json<ProgressSubmission>, JsonRejection>,
) -> Result<Response, ServerError> {
    let id = parse_id(&raw)?;
    let Json(submission) = body?;
    if let Some(body_id) = submission.id {
        if body_id != id {
            return Err(ServerError::BadRequest(format!(
                "Body id {body_id} does not match path id {id}"
            )));
        }
    }
    if current.player.id != id && !current.player.admin {
        return Err(ServerError::Forbidden(
            "Cannot write another player's progress".into(),
        ));
    }

    let target = state
        .directory
        .get(id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Player".into()))?;

    let levels = state.catalog.list().await;
    validate_submission(&submission.level_statuses, &levels)?;

    let report = state.db.lock().await.apply_progress_with(
        state.config.write_mode,
        id,
        &submission.level_statuses,
    )?;

    let player = state.directory.view(target, &state.catalog).await?;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };

    info!(
        player_id = id,
        entries = report.entries.len(),
        complete = report.is_complete(),
        "Progress submitted"
    );
    Ok((status, Json(ProgressResponse { player, report })).into_response())
}

// ─── Admin endpoints ───

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

/// Provision a player by name. The player claims it by logging in, which also
/// works while registration is closed.
async fn admin_create_player(
    headers: HeaderMap,
    State(state): State<AppState>,
    body: Result<Json<CreatePlayerRequest>, JsonRejection>,
) -> Result<Json<PlayerRecord>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let Json(req) = body?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ValidationError::BlankField("name").into());
    }
    let player = state.directory.resolve(name).await?;
    info!(player_id = player.id, "Player provisioned by admin");
    Ok(Json(player))
}

async fn admin_set_player_admin(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(raw): Path<String>,
    body: Result<Json<AdminFlagRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let id = parse_id(&raw)?;
    let Json(req) = body?;

    if !state.directory.set_admin(id, req.admin).await? {
        return Err(ServerError::NotFound("Player".into()));
    }
    Ok(Json(serde_json::json!({ "id": id, "admin": req.admin })))
}

async fn admin_refresh_catalog(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let levels = state.catalog.refresh().await?;
    info!(levels, "Catalog refreshed by admin");
    Ok(Json(serde_json::json!({ "levels": levels })))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP server for the chat page
//!
//! Serves the HTML page (form posts + redirects) and a small JSON API
//! over the same sessions. Sessions are identified by a cookie.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agent::{AgentRegistry, AGENT_PROFILES};
use crate::config::Settings;
use crate::controller;
use crate::error::AppError;
use crate::render::{AgentOption, LatestResponse, PageRenderer, PageView, PAGE_TITLE};
use crate::session::{Notice, SessionHandle, SessionState, SessionStore, EXPORT_FILE_NAME};
use crate::storage::AgentStore;

const SESSION_COOKIE: &str = "session_id";

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct CredentialForm {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct RunForm {
    pub agent: String,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub agent: String,
    pub query: String,
    pub api_key: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// App State
/// =============================

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub store: AgentStore,
    pub settings: Arc<Settings>,
    pub renderer: Arc<PageRenderer>,
}

impl AppState {
    /// `default_registry` authorizes every session up front.
    pub fn new(
        settings: Settings,
        store: AgentStore,
        default_registry: Option<Arc<AgentRegistry>>,
    ) -> crate::Result<Self> {
        Ok(Self {
            sessions: SessionStore::new(default_registry, settings.session_idle_timeout),
            store,
            settings: Arc::new(settings),
            renderer: Arc::new(PageRenderer::new()?),
        })
    }

    /// SQLite-backed state; pre-authorized when the settings carry an API key.
    pub fn from_settings(settings: Settings) -> crate::Result<Self> {
        let store = AgentStore::sqlite(&settings.database_url)?;
        let default_registry = match settings.openai_api_key.as_deref() {
            Some(key) => Some(Arc::new(AgentRegistry::build(Some(key), &settings, &store)?)),
            None => {
                warn!("OPENAI_API_KEY not set; each session must enter a key");
                None
            }
        };
        Self::new(settings, store, default_registry)
    }

    async fn session(&self, headers: &HeaderMap) -> (SessionHandle, Option<HeaderValue>) {
        let (handle, created) = self.sessions.get_or_create(session_cookie(headers)).await;
        let cookie = if created {
            let id = handle.lock().id();
            HeaderValue::from_str(&format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, id
            ))
            .ok()
        } else {
            None
        };
        (handle, cookie)
    }
}

/// =============================
/// Helpers
/// =============================

fn session_cookie(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

fn with_cookie(response: impl IntoResponse, cookie: Option<HeaderValue>) -> Response {
    let mut response = response.into_response();
    if let Some(cookie) = cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

fn error_status(error: &AppError) -> StatusCode {
    match error {
        AppError::MissingCredential => StatusCode::UNAUTHORIZED,
        AppError::EmptyQuery | AppError::InvalidToolInput(_) => StatusCode::BAD_REQUEST,
        AppError::Busy => StatusCode::CONFLICT,
        AppError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

fn render_session(renderer: &PageRenderer, state: &mut SessionState) -> crate::Result<String> {
    let registry = state.registry();
    let mut notice = state.take_notice();
    if registry.is_none() && notice.is_none() {
        notice = Some(Notice::warning(AppError::MissingCredential.to_string()));
    }

    let agents = registry
        .as_ref()
        .map(|registry| {
            registry
                .agents()
                .map(|agent| AgentOption {
                    label: agent.profile().label,
                    name: agent.profile().name,
                })
                .collect()
        })
        .unwrap_or_default();

    let view = PageView {
        title: PAGE_TITLE,
        authorized: registry.is_some(),
        agents,
        selected: state.selected_label.as_deref(),
        notice,
        latest: state.latest().map(|(agent, turn)| LatestResponse {
            agent,
            response: &turn.response,
        }),
        history: state.turns(),
        processing: state.is_processing(),
    };

    renderer.render_page(&view)
}

fn page_response(state: &AppState, session: &SessionHandle, status: StatusCode) -> Response {
    let rendered = {
        let mut locked = session.lock();
        render_session(&state.renderer, &mut locked)
    };

    match rendered {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Page rendering failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Page rendering failed").into_response()
        }
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Page Endpoints
/// =============================

async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, cookie) = state.session(&headers).await;
    with_cookie(page_response(&state, &session, StatusCode::OK), cookie)
}

async fn set_credential(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<CredentialForm>,
) -> Response {
    let (session, cookie) = state.session(&headers).await;

    match AgentRegistry::build(Some(&form.api_key), &state.settings, &state.store) {
        Ok(registry) => {
            let mut locked = session.lock();
            info!(session_id = %locked.id(), "Session credential accepted");
            locked.set_registry(Arc::new(registry));
        }
        Err(e) if e.is_warning() => session.lock().flash(Notice::warning(e.to_string())),
        Err(e) => {
            error!("Agent construction failed: {}", e);
            session.lock().flash(Notice::error(e.to_string()));
        }
    }

    with_cookie(Redirect::to("/"), cookie)
}

async fn run_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<RunForm>,
) -> Response {
    let (session, cookie) = state.session(&headers).await;

    let registry = {
        let mut locked = session.lock();
        locked.selected_label = Some(form.agent.clone());
        locked.registry()
    };
    let Some(registry) = registry else {
        session
            .lock()
            .flash(Notice::warning(AppError::MissingCredential.to_string()));
        return with_cookie(Redirect::to("/"), cookie);
    };
    let Some(agent) = registry.get(&form.agent) else {
        session
            .lock()
            .flash(Notice::error(AppError::UnknownAgent(form.agent).to_string()));
        return with_cookie(Redirect::to("/"), cookie);
    };

    match controller::run(&session, agent.as_ref(), &form.query).await {
        Ok(_) => with_cookie(Redirect::to("/"), cookie),
        Err(e) if e.is_warning() => {
            session.lock().flash(Notice::warning(e.to_string()));
            with_cookie(Redirect::to("/"), cookie)
        }
        Err(e) => {
            error!(agent = agent.profile().name, "Agent invocation failed: {}", e);
            session.lock().flash(Notice::error(format!(
                "{} failed to answer: {}",
                agent.profile().name,
                e
            )));
            with_cookie(page_response(&state, &session, error_status(&e)), cookie)
        }
    }
}

async fn clear_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, cookie) = state.session(&headers).await;
    {
        let mut locked = session.lock();
        if locked.is_processing() {
            warn!(session_id = %locked.id(), "Clear rejected while a query is running");
            locked.flash(Notice::warning(AppError::Busy.to_string()));
        } else {
            locked.clear();
        }
    }
    with_cookie(Redirect::to("/"), cookie)
}

async fn export_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, cookie) = state.session(&headers).await;
    let body = session.lock().export_text();

    with_cookie(
        (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
                ),
            ],
            body,
        ),
        cookie,
    )
}

/// =============================
/// JSON Endpoints
/// =============================

async fn list_agents() -> Json<ApiResponse> {
    Json(ApiResponse::success(&AGENT_PROFILES[..]))
}

async fn api_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RunRequest>,
) -> Response {
    let (session, cookie) = state.session(&headers).await;

    let registry = match session.lock().registry() {
        Some(registry) => Ok(registry),
        None => AgentRegistry::build(req.api_key.as_deref(), &state.settings, &state.store)
            .map(Arc::new),
    };
    let registry = match registry {
        Ok(registry) => {
            session.lock().set_registry(Arc::clone(&registry));
            registry
        }
        Err(e) => {
            return with_cookie(
                (error_status(&e), Json(ApiResponse::error(e.to_string()))),
                cookie,
            );
        }
    };

    let Some(agent) = registry.get(&req.agent) else {
        let e = AppError::UnknownAgent(req.agent);
        return with_cookie(
            (error_status(&e), Json(ApiResponse::error(e.to_string()))),
            cookie,
        );
    };

    let response = match controller::run(&session, agent.as_ref(), &req.query).await {
        Ok(turn) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "agent": agent.profile().name,
                "query": turn.query,
                "response": turn.response,
            }))),
        ),
        Err(e) => {
            if !e.is_warning() {
                error!(agent = agent.profile().name, "Agent invocation failed: {}", e);
            }
            (error_status(&e), Json(ApiResponse::error(e.to_string())))
        }
    };
    with_cookie(response, cookie)
}

async fn api_history(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (session, cookie) = state.session(&headers).await;
    let data = {
        let locked = session.lock();
        serde_json::json!({
            "session_id": locked.id(),
            "created_at": locked.created_at,
            "turns": locked.turns(),
        })
    };
    with_cookie(Json(ApiResponse::success(data)), cookie)
}

/// =============================
/// Router
/// =============================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/credential", post(set_credential))
        .route("/run", post(run_form))
        .route("/clear", post(clear_history))
        .route("/export", get(export_history))
        .route("/health", get(health))
        .route("/api/agents", get(list_agents))
        .route("/api/run", post(api_run))
        .route("/api/history", get(api_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    state: AppState,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Chat server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

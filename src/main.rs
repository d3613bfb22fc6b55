use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use relic_gate::core::config::load_gate_config;
use relic_gate::session::{LoginDriver, SessionProfile};
use relic_gate::surface::cdp::CdpSurface;
use relic_gate::{AppState, GateEvent};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

/// Load the active account profile.
///
/// Resolution order: `RELIC_GATE_PROFILE` (path to a profile JSON) →
/// `~/.relic-gate/profile.json` → a blank profile filled from
/// `RELIC_GATE_LOGIN` / `RELIC_GATE_PASSWORD` / `RELIC_GATE_FLASH_PASSWORD`.
fn load_profile() -> SessionProfile {
    let mut candidates = Vec::new();
    if let Ok(p) = std::env::var("RELIC_GATE_PROFILE") {
        if !p.trim().is_empty() {
            candidates.push(std::path::PathBuf::from(p.trim()));
        }
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".relic-gate").join("profile.json"));
    }
    for path in candidates {
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str::<SessionProfile>(&raw).map_err(Into::into))
        {
            Ok(profile) => {
                info!("profile: loaded {}", path.display());
                return profile;
            }
            Err(e) => warn!("profile: {} unusable ({}), skipping", path.display(), e),
        }
    }

    let mut profile = SessionProfile::default();
    if let Ok(login) = std::env::var("RELIC_GATE_LOGIN") {
        profile.login = login;
    }
    if let Ok(password) = std::env::var("RELIC_GATE_PASSWORD") {
        profile.password = password;
    }
    if let Ok(flash) = std::env::var("RELIC_GATE_FLASH_PASSWORD") {
        profile.flash_password = flash;
    }
    profile.auto_login = profile.auto_login_ready()
        || (!profile.login.trim().is_empty() && !profile.password.trim().is_empty());
    profile
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_gate_config();
    let profile = load_profile();
    let state = Arc::new(AppState::new(config, profile)?);

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--login") {
        return run_login(state).await;
    }

    let port = parse_port_from_args().unwrap_or_else(|| state.config.resolve_listen_port());

    let app = Router::new()
        .fallback(forward)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = format!("127.0.0.1:{}", port);
    info!(
        "relic-gate listening on {} (upstream {})",
        addr,
        state.engine.game_host()
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Drive the unattended login sequence against a launched browser, then exit.
async fn run_login(state: Arc<AppState>) -> anyhow::Result<()> {
    let proxy_url = state.session.profile().proxy.map(|p| p.url);
    let (surface, mut events) = CdpSurface::launch(proxy_url.as_deref()).await?;
    let surface = Arc::new(surface);

    let mut driver = LoginDriver::new(surface, state.session.clone(), &state.config);
    driver.begin().await;

    while !driver.state().is_terminal() {
        match events.recv().await {
            Some(event) => driver.on_page_event(event).await,
            None => break,
        }
    }
    driver.teardown();
    info!("login finished: {:?}", driver.state());
    Ok(())
}

/// Forward one request upstream and filter the response on the way back.
async fn forward(State(state): State<Arc<AppState>>, req: Request) -> Response {
    match forward_inner(&state, req).await {
        Ok(resp) => resp,
        Err(e) => {
            warn!("upstream exchange failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("upstream error: {}", e)).into_response()
        }
    }
}

async fn forward_inner(state: &AppState, req: Request) -> anyhow::Result<Response> {
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let upstream_url = format!("http://{}{}", state.engine.game_host(), path_and_query);

    // Carry over the headers the game server actually cares about; the rest
    // of the identity comes from the shaped header set.
    let cookie = req
        .headers()
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let incoming_content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = axum::body::to_bytes(req.into_body(), 4 * 1024 * 1024).await?;

    let mut upstream = state.http_client.request(method, &upstream_url);
    for (name, value) in state.header_profile.outgoing_headers() {
        upstream = upstream.header(name, value);
    }
    if let Some(cookie) = cookie {
        upstream = upstream.header("Cookie", cookie);
    }
    if let Some(ct) = incoming_content_type {
        upstream = upstream.header("Content-Type", ct);
    }
    if !body.is_empty() {
        upstream = upstream.body(body.to_vec());
    }

    let resp = upstream.send().await?;
    let status = resp.status().as_u16();
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let set_cookies: Vec<String> = resp
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let bytes = resp.bytes().await?;

    let outcome = state
        .engine
        .filter(&upstream_url, &bytes, &content_type, &state.session);
    for event in &outcome.events {
        match event {
            GateEvent::Telemetry { hp, mp } => info!("telemetry: hp={} mp={}", hp, mp),
            GateEvent::DeepLink { kind, url } => info!("fight action {:?}: {}", kind, url),
            GateEvent::Trade(decision) => info!("trade decision: {:?}", decision),
        }
    }

    let mut builder = Response::builder().status(StatusCode::from_u16(status)?);
    if !outcome.content_type.is_empty() {
        builder = builder.header(
            "content-type",
            HeaderValue::from_str(&outcome.content_type)?,
        );
    }
    for cookie in set_cookies {
        builder = builder.header("set-cookie", HeaderValue::from_str(&cookie)?);
    }
    Ok(builder.body(Body::from(outcome.body))?)
}

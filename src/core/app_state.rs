use crate::core::config::GateConfig;
use crate::features::identity::{self, HeaderProfile};
use crate::filtering::FilterEngine;
use crate::session::profile::{SessionHandle, SessionProfile};
use std::sync::Arc;

/// Shared process state for the forwarding proxy. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub config: Arc<GateConfig>,
    pub engine: Arc<FilterEngine>,
    /// The active account. Profile UIs swap this out; the proxy and the
    /// login driver read through the handle.
    pub session: SessionHandle,
    /// Browser identity applied to every shaped upstream request, picked
    /// once at startup.
    pub header_profile: &'static HeaderProfile,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("game_host", &self.engine.game_host())
            .field("trading_enabled", &self.session.profile().trading.enabled)
            .finish()
    }
}

impl AppState {
    pub fn new(config: GateConfig, profile: SessionProfile) -> anyhow::Result<Self> {
        let session = SessionHandle::new(profile);
        let header_profile = identity::pick_header_profile();

        let mut builder = reqwest::Client::builder()
            .user_agent(header_profile.user_agent)
            .timeout(std::time::Duration::from_secs(30));

        if let Some(proxy) = &session.profile().proxy {
            let mut p = reqwest::Proxy::all(&proxy.url)?;
            if let (Some(user), Some(pass)) = (&proxy.username, &proxy.password) {
                p = p.basic_auth(user, pass);
            }
            builder = builder.proxy(p);
        }

        let engine = Arc::new(FilterEngine::new(&config));
        Ok(Self {
            http_client: builder.build()?,
            config: Arc::new(config),
            engine,
            session,
            header_profile,
        })
    }
}

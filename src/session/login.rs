//! Unattended login driver.
//!
//! Runs atop the surface's serial callback stream: every page-load-finished
//! event advances the state machine one step, issuing script probes into the
//! surface and, when a step succeeds, loading a synthetic auto-submitting
//! form. The driver must only ever be driven from that one stream, never
//! from the interception layer's I/O side.
//!
//! Stale-result guard: each navigation bumps an epoch counter; a probe result
//! carrying an older epoch is discarded. The one automatic retry in the whole
//! flow is a single scheduled reload on an empty page.

use crate::core::config::GateConfig;
use crate::session::forms;
use crate::session::profile::SessionHandle;
use crate::surface::{PageEvent, Surface};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Marker of the secondary-password gate in the post-login page.
const SECONDARY_PASSWORD_MARKER: &str = r#"name="flashpass""#;

/// The server reports login rejections through an inline script call.
const WARNING_CALL_PREFIX: &str = "show_warn('";
const WARNING_CALL_SUFFIX: &str = "')";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    AwaitingForm,
    FormSubmitted,
    AwaitingGameContent,
    AwaitingSecondaryPassword,
    SecondarySubmitted,
    Settled,
    Error(String),
}

impl LoginState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoginState::Settled | LoginState::Error(_))
    }
}

pub struct LoginDriver {
    surface: Arc<dyn Surface>,
    session: SessionHandle,
    game_host: String,
    entry_url: String,
    probe_timeout: Duration,
    reload_delay: Duration,
    state: LoginState,
    /// Monotonic navigation counter; bumped on every load-started event.
    epoch: u64,
    /// Set after `load_html`: the next load-finished event is the driver's
    /// own synthetic document rendering, not a server response, and must not
    /// be probed. The document's form submission produces the real
    /// navigation that follows.
    synthetic_load_pending: bool,
    /// The secondary password is submitted at most once per session.
    secondary_used: bool,
    /// The empty-page reload may fire once per session.
    reload_used: bool,
    reload_task: Option<JoinHandle<()>>,
}

impl LoginDriver {
    pub fn new(surface: Arc<dyn Surface>, session: SessionHandle, config: &GateConfig) -> Self {
        Self {
            surface,
            session,
            game_host: config.resolve_game_host(),
            entry_url: config.resolve_entry_url(),
            probe_timeout: config.resolve_probe_timeout(),
            reload_delay: config.resolve_empty_page_reload_delay(),
            state: LoginState::Idle,
            epoch: 0,
            synthetic_load_pending: false,
            secondary_used: false,
            reload_used: false,
            reload_task: None,
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    /// Start the sequence: navigate to the entry page and wait for its form.
    /// Refuses to start when auto-login is off or credentials are blank.
    pub async fn begin(&mut self) {
        let profile = self.session.profile();
        if !profile.auto_login_ready() {
            self.fail("credentials-blank");
            return;
        }
        info!("login: navigating to entry page {}", self.entry_url);
        if let Err(e) = self.surface.navigate(self.entry_url.clone()).await {
            self.fail(&format!("entry-navigation: {}", e));
            return;
        }
        self.transition(LoginState::AwaitingForm);
    }

    /// Feed one page-lifecycle event from the surface's serial stream.
    pub async fn on_page_event(&mut self, event: PageEvent) {
        if self.state.is_terminal() {
            return;
        }
        match event {
            PageEvent::LoadStarted => {
                // A new navigation supersedes any in-flight probe and any
                // scheduled reload.
                self.epoch += 1;
                self.cancel_reload();
            }
            PageEvent::LoadError { reason } => {
                self.fail(&format!("load-error: {}", reason));
            }
            PageEvent::LoadFinished => {
                if self.synthetic_load_pending {
                    // Our own synthetic document finished rendering. Probing
                    // it would read the driver's markers back (the flash form
                    // contains the very gate marker the next step scans for)
                    // and its body is visually empty. Wait for the navigation
                    // its form submission triggers.
                    self.synthetic_load_pending = false;
                    return;
                }
                match self.state.clone() {
                    LoginState::AwaitingForm => self.step_form().await,
                    LoginState::FormSubmitted
                    | LoginState::SecondarySubmitted
                    | LoginState::AwaitingGameContent => self.step_game_content().await,
                    LoginState::Idle
                    | LoginState::AwaitingSecondaryPassword
                    | LoginState::Settled
                    | LoginState::Error(_) => {}
                }
            }
        }
    }

    /// Invalidate everything in flight. Called on surface teardown and after
    /// the machine reaches a terminal state.
    pub fn teardown(&mut self) {
        self.epoch += 1;
        self.cancel_reload();
    }

    // ── steps ────────────────────────────────────────────────────────────

    async fn step_form(&mut self) {
        let epoch = self.epoch;

        let form_present = self
            .probe("document.forms['auth'] ? true : false")
            .await
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if self.stale(epoch) {
            return;
        }
        if !form_present {
            self.fail("form-not-found");
            return;
        }

        let markup = self.probe_markup().await;
        if self.stale(epoch) {
            return;
        }
        if let Some(message) =
            crate::filtering::literals::extract_between(&markup, WARNING_CALL_PREFIX, WARNING_CALL_SUFFIX)
        {
            self.fail(&format!("server-rejected: {}", message));
            return;
        }

        let profile = self.session.profile();
        if profile.login.trim().is_empty() || profile.password.trim().is_empty() {
            self.fail("credentials-blank");
            return;
        }

        let doc = forms::login_document(&self.game_host, &profile.login, &profile.password);
        if let Err(e) = self.surface.load_html(doc).await {
            self.fail(&format!("login-submit: {}", e));
            return;
        }
        self.synthetic_load_pending = true;
        self.transition(LoginState::FormSubmitted);
        self.transition(LoginState::AwaitingGameContent);
    }

    async fn step_game_content(&mut self) {
        if self.state == LoginState::FormSubmitted || self.state == LoginState::SecondarySubmitted {
            self.transition(LoginState::AwaitingGameContent);
        }
        let epoch = self.epoch;

        let markup = self.probe_markup().await;
        if self.stale(epoch) {
            return;
        }

        if markup.contains(SECONDARY_PASSWORD_MARKER) {
            if self.secondary_used {
                // The gate came back after we already answered it once. The
                // server did not accept the flash password; resubmitting the
                // same one would loop forever.
                self.fail("secondary-password-rejected");
                return;
            }
            self.transition(LoginState::AwaitingSecondaryPassword);
            let profile = self.session.profile();
            if profile.flash_password.trim().is_empty() {
                self.fail("secondary-password-required-but-absent");
                return;
            }
            let doc = forms::flash_password_document(&self.game_host, &profile.flash_password);
            if let Err(e) = self.surface.load_html(doc).await {
                self.fail(&format!("flash-submit: {}", e));
                return;
            }
            self.secondary_used = true;
            self.synthetic_load_pending = true;
            self.transition(LoginState::SecondarySubmitted);
            self.transition(LoginState::AwaitingGameContent);
            return;
        }

        let body_len = self
            .probe("document.body ? document.body.innerText.trim().length : 0")
            .await
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        if self.stale(epoch) {
            return;
        }

        if body_len == 0 {
            if self.reload_used {
                self.fail("empty-page");
                return;
            }
            self.reload_used = true;
            warn!(
                "login: empty page, scheduling one reload in {:?}",
                self.reload_delay
            );
            let surface = Arc::clone(&self.surface);
            let delay = self.reload_delay;
            self.reload_task = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = surface.reload().await {
                    warn!("login: scheduled reload failed: {}", e);
                }
            }));
            return;
        }

        self.transition(LoginState::Settled);
        info!("login: game content rendered, session settled");
    }

    // ── plumbing ─────────────────────────────────────────────────────────

    /// One evaluation round-trip. Timeout, a dropped channel, and an
    /// evaluation error all read as probe-negative, never as a crash.
    async fn probe(&self, js: &str) -> Option<Value> {
        let rx = self.surface.evaluate(js.to_string());
        match tokio::time::timeout(self.probe_timeout, rx).await {
            Ok(Ok(Ok(value))) => Some(value),
            Ok(Ok(Err(e))) => {
                warn!("login probe failed: {}", e);
                None
            }
            Ok(Err(_)) | Err(_) => None,
        }
    }

    async fn probe_markup(&self) -> String {
        self.probe("document.documentElement.outerHTML")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    fn stale(&self, epoch: u64) -> bool {
        if self.epoch != epoch {
            info!("login: discarding stale probe result (epoch {} < {})", epoch, self.epoch);
            return true;
        }
        false
    }

    fn transition(&mut self, next: LoginState) {
        if self.state != next {
            info!("login: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn fail(&mut self, reason: &str) {
        warn!("login: terminal error: {}", reason);
        self.state = LoginState::Error(reason.to_string());
        self.cancel_reload();
    }

    fn cancel_reload(&mut self) {
        if let Some(task) = self.reload_task.take() {
            task.abort();
        }
    }
}

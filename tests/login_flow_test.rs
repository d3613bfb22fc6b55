use async_trait::async_trait;
use relic_gate::core::config::GateConfig;
use relic_gate::session::{LoginDriver, LoginState, SessionHandle, SessionProfile};
use relic_gate::surface::{PageEvent, ProbeReceiver, Surface, SurfaceError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

/// Scriptable in-memory surface. Probe answers are keyed off the probe
/// script's content, the same way the real page would answer. `load_html`
/// makes the loaded document the rendered markup, as a real surface does.
#[derive(Default)]
struct FakeSurface {
    form_present: AtomicBool,
    markup: Mutex<String>,
    body_text_len: AtomicU64,
    /// When set, evaluation results never arrive (per-probe channel dropped).
    probes_hang: AtomicBool,
    loaded_documents: Mutex<Vec<String>>,
    navigations: Mutex<Vec<String>>,
    reloads: AtomicU64,
}

impl FakeSurface {
    fn set_markup(&self, markup: &str) {
        *self.markup.lock().unwrap() = markup.to_string();
    }

    fn loads(&self) -> Vec<String> {
        self.loaded_documents.lock().unwrap().clone()
    }

    fn navs(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

#[async_trait]
impl Surface for FakeSurface {
    fn evaluate(&self, js: String) -> ProbeReceiver {
        let (tx, rx) = oneshot::channel();
        if self.probes_hang.load(Ordering::SeqCst) {
            // Drop the sender: the receiver resolves to a closed-channel
            // error, which the driver must treat as probe-negative.
            return rx;
        }
        let result: Result<serde_json::Value, SurfaceError> = if js.contains("forms['auth']") {
            Ok(serde_json::Value::Bool(self.form_present.load(Ordering::SeqCst)))
        } else if js.contains("outerHTML") {
            Ok(serde_json::Value::String(self.markup.lock().unwrap().clone()))
        } else if js.contains("innerText") {
            Ok(serde_json::json!(self.body_text_len.load(Ordering::SeqCst)))
        } else {
            Ok(serde_json::Value::Null)
        };
        let _ = tx.send(result);
        rx
    }

    async fn load_html(&self, html: String) -> anyhow::Result<()> {
        // The loaded document becomes what the page shows, and a synthetic
        // document has no visible text.
        self.set_markup(&html);
        self.body_text_len.store(0, Ordering::SeqCst);
        self.loaded_documents.lock().unwrap().push(html);
        Ok(())
    }

    async fn navigate(&self, url: String) -> anyhow::Result<()> {
        self.navigations.lock().unwrap().push(url);
        Ok(())
    }

    async fn reload(&self) -> anyhow::Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn test_config() -> GateConfig {
    GateConfig {
        game_host: Some("game.test".to_string()),
        entry_url: Some("http://game.test/".to_string()),
        probe_timeout_ms: Some(200),
        empty_page_reload_ms: Some(10),
        ..Default::default()
    }
}

fn test_profile(flash: &str) -> SessionProfile {
    SessionProfile {
        login: "hero".to_string(),
        password: "secret".to_string(),
        flash_password: flash.to_string(),
        auto_login: true,
        ..Default::default()
    }
}

fn driver_with(surface: Arc<FakeSurface>, flash: &str) -> LoginDriver {
    LoginDriver::new(
        surface,
        SessionHandle::new(test_profile(flash)),
        &test_config(),
    )
}

async fn page_load(driver: &mut LoginDriver) {
    driver.on_page_event(PageEvent::LoadStarted).await;
    driver.on_page_event(PageEvent::LoadFinished).await;
}

/// Drive a driver through `begin`, the entry-page load (which submits the
/// login form) and the synthetic login document's own load event, then make
/// the fake show `markup` with `body_len` visible characters.
async fn settle_login_submission(
    driver: &mut LoginDriver,
    surface: &FakeSurface,
    markup: &str,
    body_len: u64,
) {
    driver.begin().await;
    page_load(driver).await;
    page_load(driver).await;
    surface.set_markup(markup);
    surface.body_text_len.store(body_len, Ordering::SeqCst);
}

#[tokio::test]
async fn full_login_without_secondary_password_settles() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "");
    driver.begin().await;
    assert_eq!(driver.state(), &LoginState::AwaitingForm);
    assert_eq!(surface.navs(), vec!["http://game.test/".to_string()]);

    // Entry page finished loading: form found, credentials submitted.
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::AwaitingGameContent);
    let loads = surface.loads();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].contains("player_nick"));
    assert!(loads[0].contains("hero"));

    // The synthetic document's own load event advances nothing.
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::AwaitingGameContent);

    // Game content rendered.
    surface.set_markup("<html><body>game frame</body></html>");
    surface.body_text_len.store(512, Ordering::SeqCst);
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::Settled);
}

#[tokio::test]
async fn server_warning_is_terminal_and_submits_nothing() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><script>show_warn('Неверный пароль')</script></html>");

    let mut driver = driver_with(surface.clone(), "");
    driver.begin().await;
    page_load(&mut driver).await;

    assert_eq!(
        driver.state(),
        &LoginState::Error("server-rejected: Неверный пароль".to_string())
    );
    assert!(surface.loads().is_empty());
}

#[tokio::test]
async fn missing_form_is_terminal() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(false, Ordering::SeqCst);

    let mut driver = driver_with(surface.clone(), "");
    driver.begin().await;
    page_load(&mut driver).await;

    assert_eq!(driver.state(), &LoginState::Error("form-not-found".to_string()));
}

#[tokio::test]
async fn secondary_password_gate_is_submitted_when_configured() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "fl4sh");
    settle_login_submission(
        &mut driver,
        &surface,
        r#"<html><form><input name="flashpass"></form></html>"#,
        20,
    )
    .await;
    page_load(&mut driver).await;

    assert_eq!(driver.state(), &LoginState::AwaitingGameContent);
    let loads = surface.loads();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].contains("flashpass"));
    assert!(loads[1].contains("fl4sh"));

    // The synthetic flash document renders, then the server answers with the
    // game page; the flash form must not go out a second time.
    page_load(&mut driver).await;
    surface.set_markup("<html><body>game frame</body></html>");
    surface.body_text_len.store(512, Ordering::SeqCst);
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::Settled);
    assert_eq!(surface.loads().len(), 2);
}

#[tokio::test]
async fn secondary_gate_without_configured_password_is_terminal() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "");
    settle_login_submission(
        &mut driver,
        &surface,
        r#"<html><input name="flashpass"></html>"#,
        20,
    )
    .await;
    page_load(&mut driver).await;

    assert_eq!(
        driver.state(),
        &LoginState::Error("secondary-password-required-but-absent".to_string())
    );
    assert_eq!(surface.loads().len(), 1);
}

#[tokio::test]
async fn own_flash_document_is_never_resubmitted() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "fl4sh");
    settle_login_submission(
        &mut driver,
        &surface,
        r#"<html><form><input name="flashpass"></form></html>"#,
        20,
    )
    .await;
    page_load(&mut driver).await;
    assert_eq!(surface.loads().len(), 2, "one login doc, one flash doc");

    // The rendered markup is now the driver's own flash document, which
    // contains the gate marker. However many load events follow, the flash
    // password must never go out again.
    for _ in 0..5 {
        page_load(&mut driver).await;
    }
    assert_eq!(surface.loads().len(), 2);
    assert!(driver.state().is_terminal());
}

#[tokio::test]
async fn gate_shown_again_after_submission_is_terminal() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "wrong");
    settle_login_submission(
        &mut driver,
        &surface,
        r#"<html><input name="flashpass"></html>"#,
        20,
    )
    .await;
    page_load(&mut driver).await;
    assert_eq!(surface.loads().len(), 2);

    // Synthetic flash document renders; then the server re-presents the gate
    // instead of the game.
    page_load(&mut driver).await;
    surface.set_markup(r#"<html><input name="flashpass"> wrong password</html>"#);
    surface.body_text_len.store(20, Ordering::SeqCst);
    page_load(&mut driver).await;

    assert_eq!(
        driver.state(),
        &LoginState::Error("secondary-password-rejected".to_string())
    );
    assert_eq!(surface.loads().len(), 2);
}

#[tokio::test]
async fn empty_page_reloads_once_then_errors() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "");
    settle_login_submission(&mut driver, &surface, "<html><body></body></html>", 0).await;

    // First empty page: a single in-place reload is scheduled, state holds.
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::AwaitingGameContent);

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(surface.reloads.load(Ordering::SeqCst), 1, "one reload expected");
    assert_eq!(surface.navs().len(), 1, "reload must not restart from the entry page");

    // Still empty after the reload: terminal.
    page_load(&mut driver).await;
    assert_eq!(driver.state(), &LoginState::Error("empty-page".to_string()));
}

#[tokio::test]
async fn synthetic_login_document_keeps_the_empty_page_retry() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = driver_with(surface.clone(), "");
    // The synthetic login document itself has no visible text; its load
    // event must not count as the empty page.
    settle_login_submission(&mut driver, &surface, "<html></html>", 0).await;

    page_load(&mut driver).await;
    assert_eq!(
        driver.state(),
        &LoginState::AwaitingGameContent,
        "the genuinely empty page still gets its retry"
    );
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(surface.reloads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_credentials_never_start_navigation() {
    let surface = Arc::new(FakeSurface::default());
    let mut driver = LoginDriver::new(
        surface.clone(),
        SessionHandle::new(SessionProfile::default()),
        &test_config(),
    );
    driver.begin().await;
    assert_eq!(driver.state(), &LoginState::Error("credentials-blank".to_string()));
    assert!(surface.navs().is_empty());
}

#[tokio::test]
async fn unanswered_probe_reads_as_negative_not_a_crash() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.probes_hang.store(true, Ordering::SeqCst);

    let mut driver = driver_with(surface.clone(), "");
    driver.begin().await;
    page_load(&mut driver).await;

    // The dropped probe channel counts as "no form seen".
    assert_eq!(driver.state(), &LoginState::Error("form-not-found".to_string()));
}

#[tokio::test]
async fn teardown_cancels_the_scheduled_reload() {
    let surface = Arc::new(FakeSurface::default());
    surface.form_present.store(true, Ordering::SeqCst);
    surface.set_markup("<html><form name=auth></form></html>");

    let mut driver = LoginDriver::new(
        surface.clone(),
        SessionHandle::new(test_profile("")),
        &GateConfig {
            empty_page_reload_ms: Some(60),
            ..test_config()
        },
    );
    driver.begin().await;
    page_load(&mut driver).await;
    page_load(&mut driver).await;

    surface.set_markup("<html></html>");
    surface.body_text_len.store(0, Ordering::SeqCst);
    page_load(&mut driver).await;

    driver.teardown();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(surface.reloads.load(Ordering::SeqCst), 0, "reload fired after teardown");
}

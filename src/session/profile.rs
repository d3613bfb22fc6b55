//! Per-account session state shared between the filter pipeline and the
//! login driver.
//!
//! A [`SessionHandle`] is the one mutable record the core touches. Profile
//! fields (credentials, toggles, trading config) come from an external store
//! and are read verbatim; the core itself only ever writes telemetry and the
//! compiled price table. Telemetry is advisory: two in-flight page
//! transforms may race and the later write simply wins. No ordering
//! guarantee is needed.

use crate::trading::price_table::{PriceTable, PriceTableError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TradingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// User-authored price table source, e.g. `1-100(*-50),101-200(*-40)`.
    #[serde(default)]
    pub table_source: String,
    /// Templates; `{price}` and `{item}` are substituted before sending.
    #[serde(default)]
    pub accept_message: String,
    #[serde(default)]
    pub decline_message: String,
    #[serde(default)]
    pub min_level: u32,
    #[serde(default)]
    pub allow_list: Vec<String>,
    #[serde(default)]
    pub deny_list: Vec<String>,
}

// Behavioral toggles, grouped by subsystem. The UI binds these directly;
// the core only reads them.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatToggles {
    #[serde(default)]
    pub show_system_messages: bool,
    #[serde(default)]
    pub show_private_messages: bool,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub autoscroll: bool,
    #[serde(default)]
    pub filter_profanity: bool,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default)]
    pub compact_mode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapToggles {
    #[serde(default)]
    pub auto_move: bool,
    #[serde(default)]
    pub show_coordinates: bool,
    #[serde(default)]
    pub remember_route: bool,
    #[serde(default)]
    pub confirm_long_routes: bool,
    #[serde(default)]
    pub show_terrain_hints: bool,
    #[serde(default)]
    pub fast_travel: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FishingToggles {
    #[serde(default)]
    pub auto_fishing: bool,
    #[serde(default)]
    pub pull_on_nibble: bool,
    #[serde(default)]
    pub rebait_automatically: bool,
    #[serde(default)]
    pub stop_on_full_inventory: bool,
    #[serde(default)]
    pub advisor_hints: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundToggles {
    #[serde(default)]
    pub master_enabled: bool,
    #[serde(default)]
    pub chat_beep: bool,
    #[serde(default)]
    pub fight_alerts: bool,
    #[serde(default)]
    pub trade_alerts: bool,
    #[serde(default)]
    pub low_hp_alarm: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CureSettings {
    #[serde(default)]
    pub auto_cure_enabled: bool,
    #[serde(default)]
    pub cure_in_fight: bool,
    #[serde(default)]
    pub use_big_potions: bool,
    /// Trigger auto-cure when HP falls below this fraction (0.0–1.0).
    #[serde(default)]
    pub hp_threshold: f64,
    #[serde(default)]
    pub mp_threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FastAttackToggles {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub show_buttons: bool,
    #[serde(default)]
    pub confirm_super_hits: bool,
    #[serde(default)]
    pub remember_last_style: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureToggles {
    #[serde(default)]
    pub chat: ChatToggles,
    #[serde(default)]
    pub map: MapToggles,
    #[serde(default)]
    pub fishing: FishingToggles,
    #[serde(default)]
    pub sound: SoundToggles,
    #[serde(default)]
    pub cure: CureSettings,
    #[serde(default)]
    pub fast_attack: FastAttackToggles,
}

/// One configured account. Serialized layout doubles as the JSON schema the
/// external profile store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionProfile {
    pub id: Uuid,
    pub login: String,
    pub password: String,
    /// Secondary ("flash") password, when the account has the extra gate.
    #[serde(default)]
    pub flash_password: String,
    #[serde(default)]
    pub auto_login: bool,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub toggles: FeatureToggles,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            login: String::new(),
            password: String::new(),
            flash_password: String::new(),
            auto_login: false,
            proxy: None,
            trading: TradingConfig::default(),
            toggles: FeatureToggles::default(),
        }
    }
}

impl SessionProfile {
    /// Auto-login requires non-blank primary credentials. The profile UI
    /// enforces this too; the login driver re-checks it before navigating.
    pub fn auto_login_ready(&self) -> bool {
        self.auto_login && !self.login.trim().is_empty() && !self.password.trim().is_empty()
    }
}

/// Live telemetry observed opportunistically by page transformers.
/// Last-write-wins across concurrent page loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Telemetry {
    pub current_hp: f64,
    pub current_mp: f64,
    #[serde(default)]
    pub last_chat_line: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Shared, lock-guarded session record. Cheap to clone (`Arc` inside).
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    profile: RwLock<SessionProfile>,
    telemetry: RwLock<Telemetry>,
    price_table: RwLock<Option<PriceTable>>,
}

impl SessionHandle {
    pub fn new(profile: SessionProfile) -> Self {
        let price_table = if profile.trading.table_source.trim().is_empty() {
            None
        } else {
            match PriceTable::compile(&profile.trading.table_source) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!("price table from profile {} did not compile: {}", profile.id, e);
                    None
                }
            }
        };
        Self {
            inner: Arc::new(SessionInner {
                profile: RwLock::new(profile),
                telemetry: RwLock::new(Telemetry::default()),
                price_table: RwLock::new(price_table),
            }),
        }
    }

    /// Clone of the current profile. Transformers take a point-in-time view;
    /// they must not hold the lock across a transform.
    pub fn profile(&self) -> SessionProfile {
        self.inner.profile.read().expect("profile lock poisoned").clone()
    }

    pub fn telemetry(&self) -> Telemetry {
        self.inner.telemetry.read().expect("telemetry lock poisoned").clone()
    }

    /// Record an HP/MP observation. Last write wins.
    pub fn record_hp_mp(&self, hp: f64, mp: f64) {
        let mut t = self.inner.telemetry.write().expect("telemetry lock poisoned");
        t.current_hp = hp;
        t.current_mp = mp;
        t.updated_at = Some(Utc::now());
    }

    pub fn record_chat_line(&self, line: &str) {
        let mut t = self.inner.telemetry.write().expect("telemetry lock poisoned");
        t.last_chat_line = line.to_string();
        t.updated_at = Some(Utc::now());
    }

    /// Recompile the trading price table from a new source string.
    ///
    /// On success the profile's `table_source` and the compiled table are
    /// replaced atomically from the caller's view. On failure the previous
    /// compiled table is discarded; a table the user just invalidated must
    /// not keep answering trades.
    pub fn set_trade_table(&self, source: &str) -> Result<(), PriceTableError> {
        match PriceTable::compile(source) {
            Ok(table) => {
                {
                    let mut p = self.inner.profile.write().expect("profile lock poisoned");
                    p.trading.table_source = source.to_string();
                }
                *self.inner.price_table.write().expect("table lock poisoned") = Some(table);
                info!("trade price table recompiled");
                Ok(())
            }
            Err(e) => {
                *self.inner.price_table.write().expect("table lock poisoned") = None;
                Err(e)
            }
        }
    }

    pub fn price_table(&self) -> Option<PriceTable> {
        self.inner.price_table.read().expect("table lock poisoned").clone()
    }
}

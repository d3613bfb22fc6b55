use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// GateConfig: file-based config loader (relic-gate.json) with env-var fallback
// ---------------------------------------------------------------------------

/// Raw deserialized shape of `relic-gate.json`. Every field is optional;
/// resolution order per field is JSON → env var → built-in default.
#[derive(serde::Deserialize, Default, Clone, Debug)]
pub struct GateConfig {
    /// Game server host, e.g. `www.neverlands.ru`.
    pub game_host: Option<String>,
    /// Entry page the login driver starts from. Defaults to `http://{game_host}/`.
    pub entry_url: Option<String>,
    /// Local listen port for the forwarding proxy.
    pub listen_port: Option<u16>,
    /// Delay before the single empty-page reload, in milliseconds.
    pub empty_page_reload_ms: Option<u64>,
    /// Per-probe timeout for script evaluation round-trips, in milliseconds.
    pub probe_timeout_ms: Option<u64>,
    /// Capacity of the rewritten-script cache.
    pub script_cache_capacity: Option<u64>,
    /// TTL of the rewritten-script cache, in seconds.
    pub script_cache_ttl_secs: Option<u64>,
}

impl GateConfig {
    /// Game host: JSON field → `RELIC_GATE_HOST` env var → `www.neverlands.ru`.
    pub fn resolve_game_host(&self) -> String {
        if let Some(h) = &self.game_host {
            if !h.trim().is_empty() {
                return h.trim().to_string();
            }
        }
        std::env::var("RELIC_GATE_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "www.neverlands.ru".to_string())
    }

    /// Entry URL: JSON field → `RELIC_GATE_ENTRY_URL` env var → host root.
    pub fn resolve_entry_url(&self) -> String {
        if let Some(u) = &self.entry_url {
            if !u.trim().is_empty() {
                return u.trim().to_string();
            }
        }
        std::env::var("RELIC_GATE_ENTRY_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("http://{}/", self.resolve_game_host()))
    }

    /// Listen port: JSON field → `RELIC_GATE_PORT` / `PORT` env vars → 8320.
    pub fn resolve_listen_port(&self) -> u16 {
        if let Some(p) = self.listen_port {
            return p;
        }
        for k in ["RELIC_GATE_PORT", "PORT"] {
            if let Ok(v) = std::env::var(k) {
                if let Ok(p) = v.trim().parse() {
                    return p;
                }
            }
        }
        8320
    }

    /// Empty-page reload delay. One reload only; a second empty page is
    /// terminal. Default: 1500 ms.
    pub fn resolve_empty_page_reload_delay(&self) -> Duration {
        let ms = self
            .empty_page_reload_ms
            .or_else(|| {
                std::env::var("RELIC_GATE_EMPTY_RELOAD_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(1500);
        Duration::from_millis(ms)
    }

    /// Per-probe evaluation timeout. A timed-out probe counts as negative,
    /// never as an error. Default: 5000 ms.
    pub fn resolve_probe_timeout(&self) -> Duration {
        let ms = self
            .probe_timeout_ms
            .or_else(|| {
                std::env::var("RELIC_GATE_PROBE_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(5000);
        Duration::from_millis(ms)
    }

    pub fn resolve_script_cache_capacity(&self) -> u64 {
        self.script_cache_capacity
            .or_else(|| {
                std::env::var("RELIC_GATE_SCRIPT_CACHE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(256)
    }

    pub fn resolve_script_cache_ttl(&self) -> Duration {
        let secs = self
            .script_cache_ttl_secs
            .or_else(|| {
                std::env::var("RELIC_GATE_SCRIPT_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(60 * 30);
        Duration::from_secs(secs)
    }
}

/// Candidate config file locations, most specific first.
fn config_paths() -> Vec<std::path::PathBuf> {
    let mut paths = Vec::new();
    if let Ok(explicit) = std::env::var("RELIC_GATE_CONFIG") {
        if !explicit.trim().is_empty() {
            paths.push(Path::new(explicit.trim()).to_path_buf());
        }
    }
    paths.push(Path::new("relic-gate.json").to_path_buf());
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".relic-gate").join("relic-gate.json"));
    }
    paths
}

/// Load `relic-gate.json` from the first location that parses. A missing or
/// malformed file is not an error; every field has an env/default fallback.
pub fn load_gate_config() -> GateConfig {
    for path in config_paths() {
        if !path.is_file() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<GateConfig>(&raw) {
                Ok(cfg) => {
                    tracing::info!("config: loaded {}", path.display());
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!("config: {} did not parse ({}), skipping", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("config: could not read {} ({})", path.display(), e);
            }
        }
    }
    GateConfig::default()
}

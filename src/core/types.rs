use serde::{Deserialize, Serialize};

/// A trade offer lifted from the trade page via fixed bracketing substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub seller: String,
    pub price: i64,
    pub item: String,
    pub level: u32,
}

/// The engine's answer to a trade offer. Issuing the actual accept/decline
/// navigation is the host's job; the engine only decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeDecision {
    Accept {
        offer: TradeOffer,
        counter_price: i64,
        message: String,
    },
    Decline {
        offer: TradeOffer,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepLinkKind {
    Rob,
    Pillage,
}

/// Side observation produced while transforming a page. Delivered alongside
/// the rewritten body; the host decides what to do with each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateEvent {
    Telemetry { hp: f64, mp: f64 },
    DeepLink { kind: DeepLinkKind, url: String },
    Trade(TradeDecision),
}

/// Result of one interception pass.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub body: Vec<u8>,
    pub content_type: String,
    /// False when the response bypassed the pipeline untouched.
    pub rewritten: bool,
    pub events: Vec<GateEvent>,
}

impl FilterOutcome {
    pub fn passthrough(body: Vec<u8>, content_type: &str) -> Self {
        Self {
            body,
            content_type: content_type.to_string(),
            rewritten: false,
            events: Vec::new(),
        }
    }
}

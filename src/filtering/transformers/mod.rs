//! Per-resource transformers.
//!
//! One transformer per known URL pattern, each a pure, total function:
//! `(url, decoded text, session) -> rewritten text + side events`. Which
//! transformer handles which URL is declared in [`crate::filtering::dispatch`].

pub mod html;
pub mod scripts;

use crate::core::types::GateEvent;
use crate::session::profile::SessionHandle;
use scripts::ScriptRewrite;

/// Output of one transform pass.
#[derive(Debug, Clone)]
pub struct Transformed {
    pub text: String,
    pub events: Vec<GateEvent>,
}

impl Transformed {
    pub fn text_only(text: String) -> Self {
        Self {
            text,
            events: Vec::new(),
        }
    }
}

/// Identifies the transformer a dispatch rule routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformerId {
    EntryPage,
    MainGamePage,
    CharacterInfoPage,
    ChatPage,
    TradePage,
    Script(ScriptRewrite),
}

impl TransformerId {
    /// Run the transformer. Total over arbitrary input text.
    pub fn apply(self, url: &str, text: &str, session: &SessionHandle) -> Transformed {
        match self {
            TransformerId::EntryPage => html::entry_page(url, text, session),
            TransformerId::MainGamePage => html::main_game_page(url, text, session),
            TransformerId::CharacterInfoPage => html::character_info_page(url, text, session),
            TransformerId::ChatPage => html::chat_page(url, text, session),
            TransformerId::TradePage => html::trade_page(url, text, session),
            TransformerId::Script(rewrite) => Transformed::text_only(rewrite.apply(text)),
        }
    }

    /// Whether the output is independent of body and session, and thus safe
    /// to cache per URL.
    pub fn cacheable(self) -> bool {
        matches!(self, TransformerId::Script(r) if r.is_static_replacement())
    }
}

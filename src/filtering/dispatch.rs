//! URL dispatch table, the data-driven replacement for "one big if-chain
//! over URL substrings".
//!
//! Rules are declared once, in precedence order (exact, then prefix, then
//! suffix, then contains); `route` walks them top to bottom and the first
//! match wins. Several patterns overlap deliberately (the specific
//! `shop.js` suffix rule sits above the broad `/js/shop` contains rule), so
//! declaration order is part of the contract. New resource types are added
//! by appending a rule, not by editing routing code.

use crate::filtering::transformers::scripts::ScriptRewrite;
use crate::filtering::transformers::TransformerId;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchRule {
    pub kind: MatchKind,
    pub pattern: &'static str,
    pub transformer: TransformerId,
}

impl DispatchRule {
    /// Exact rules compare the path alone, so `/index.php?cat=1` still hits
    /// the `/index.php` rule. The other kinds see path plus query.
    fn matches(&self, path: &str, target: &str) -> bool {
        match self.kind {
            MatchKind::Exact => path == self.pattern,
            MatchKind::Prefix => target.starts_with(self.pattern),
            MatchKind::Suffix => target.ends_with(self.pattern),
            MatchKind::Contains => target.contains(self.pattern),
        }
    }
}

/// The process-wide rule set. Order is significant.
pub const RULES: &[DispatchRule] = &[
    DispatchRule {
        kind: MatchKind::Exact,
        pattern: "/",
        transformer: TransformerId::EntryPage,
    },
    DispatchRule {
        kind: MatchKind::Exact,
        pattern: "/index.php",
        transformer: TransformerId::EntryPage,
    },
    DispatchRule {
        kind: MatchKind::Prefix,
        pattern: "/ch.php",
        transformer: TransformerId::ChatPage,
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/map.js",
        transformer: TransformerId::Script(ScriptRewrite::ReplaceMap),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/hpmp.js",
        transformer: TransformerId::Script(ScriptRewrite::ReplaceHpMp),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/ch_list.js",
        transformer: TransformerId::Script(ScriptRewrite::ReplaceChatList),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/ch_msg.js",
        transformer: TransformerId::Script(ScriptRewrite::PatchChatMessage),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/arena.js",
        transformer: TransformerId::Script(ScriptRewrite::PatchArena),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/pinfo.js",
        transformer: TransformerId::Script(ScriptRewrite::PatchCharacterInfo),
    },
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/hint.js",
        transformer: TransformerId::Script(ScriptRewrite::ShimHelpTips),
    },
    // shop.js must outrank the broad /js/shop pattern below, which also
    // catches shop2.js and the seasonal shop bundles.
    DispatchRule {
        kind: MatchKind::Suffix,
        pattern: "/js/shop.js",
        transformer: TransformerId::Script(ScriptRewrite::PatchShop),
    },
    DispatchRule {
        kind: MatchKind::Contains,
        pattern: "/js/shop",
        transformer: TransformerId::Script(ScriptRewrite::PatchShop),
    },
    DispatchRule {
        kind: MatchKind::Contains,
        pattern: "/js/building",
        transformer: TransformerId::Script(ScriptRewrite::PatchBuildingSet),
    },
    DispatchRule {
        kind: MatchKind::Contains,
        pattern: "pinfo.php",
        transformer: TransformerId::CharacterInfoPage,
    },
    DispatchRule {
        kind: MatchKind::Contains,
        pattern: "gameplay/trade",
        transformer: TransformerId::TradePage,
    },
    DispatchRule {
        kind: MatchKind::Contains,
        pattern: "main.php",
        transformer: TransformerId::MainGamePage,
    },
];

/// Whether a URL belongs to the game's domain. Everything else bypasses the
/// filter layer untouched.
pub fn is_game_host(url: &str, game_host: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    host.eq_ignore_ascii_case(game_host)
        || host
            .strip_prefix("www.")
            .map(|h| h.eq_ignore_ascii_case(game_host))
            .unwrap_or(false)
        || game_host
            .strip_prefix("www.")
            .map(|g| host.eq_ignore_ascii_case(g))
            .unwrap_or(false)
}

/// Route a URL to its transformer. `None` means pass-through.
pub fn route(url: &str, game_host: &str) -> Option<TransformerId> {
    if !is_game_host(url, game_host) {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path();
    let target = match parsed.query() {
        Some(q) => format!("{}?{}", path, q),
        None => path.to_string(),
    };
    RULES
        .iter()
        .find(|rule| rule.matches(path, &target))
        .map(|rule| rule.transformer)
}

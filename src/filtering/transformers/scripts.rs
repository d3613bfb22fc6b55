//! Filename-keyed script rewrites.
//!
//! The legacy desktop client shipped its own copies of a handful of the
//! game's scripts. Reproducing it inside a generic rendering surface means
//! either patching a fixed string in the served script or replacing the
//! script wholesale with a known-good substitute. There is no general rule:
//! every substitution below is tied to one filename and must stay
//! byte-for-byte stable, because the surrounding pages call into these
//! scripts by exact symbol.

/// Compatibility shim prepended to scripts that touch `window.external`
/// (the desktop client exposed a host object there; a plain surface does not).
pub const HOST_OBJECT_SHIM_JS: &str = r#"// relic-gate compatibility shim
if (typeof window.external === 'undefined' || !window.external.AddFavorite) {
    window.external = {
        AddFavorite: function () {},
        GateNotify: function (kind, payload) {
            try { console.log('[gate] ' + kind + ': ' + payload); } catch (e) {}
        }
    };
}
"#;

/// Wholesale replacement for `map.js`. The original draws the navigator map
/// with the plugin-era API; this substitute keeps the same entry points
/// (`map_init`, `map_move`, `map_cell`) but renders nothing and forwards
/// movement intents to the host notification channel.
pub const MAP_REPLACEMENT_JS: &str = r#"// relic-gate substitute: map.js
var map_ready = false;
function map_init() { map_ready = true; }
function map_move(dir, steps) {
    if (window.external && window.external.GateNotify) {
        window.external.GateNotify('map-move', dir + ':' + steps);
    }
}
function map_cell(x, y) {
    if (window.external && window.external.GateNotify) {
        window.external.GateNotify('map-cell', x + ',' + y);
    }
}
"#;

/// Wholesale replacement for `hpmp.js`. Keeps the `ins_hp` signature the
/// game pages call, writes the bar values into the DOM directly instead of
/// going through the plugin renderer.
pub const HPMP_REPLACEMENT_JS: &str = r#"// relic-gate substitute: hpmp.js
function ins_hp(a, b, c, d, hp, mp) {
    var el = document.getElementById('hpmp_bar');
    if (el) { el.innerHTML = hp + ' / ' + mp; }
}
"#;

/// Wholesale replacement for `ch_list.js` (chat roster). The original
/// depends on a frameset layout the surface no longer provides.
pub const CHAT_LIST_REPLACEMENT_JS: &str = r#"// relic-gate substitute: ch_list.js
function chat_list(users) {
    var el = document.getElementById('chat_users');
    if (!el) { return; }
    el.innerHTML = '';
    for (var i = 0; i < users.length; i++) {
        var row = document.createElement('div');
        row.appendChild(document.createTextNode(users[i]));
        el.appendChild(row);
    }
}
"#;

/// One fixed textual substitution inside a served script.
struct ScriptPatch {
    needle: &'static str,
    replacement: &'static str,
}

/// Kind of rewrite applied to a script resource. Which kind applies to which
/// filename is declared in the dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptRewrite {
    /// Serve a fixed substitute instead of the original body.
    ReplaceMap,
    ReplaceHpMp,
    ReplaceChatList,
    /// Patch a fixed literal in the chat-message script.
    PatchChatMessage,
    /// Patch the arena frame target out of the arena script.
    PatchArena,
    /// Patch the building-set popup call.
    PatchBuildingSet,
    /// Patch the shop purchase confirmation.
    PatchShop,
    /// Patch the character-info window opener.
    PatchCharacterInfo,
    /// Prepend the host-object shim to the help-tip script.
    ShimHelpTips,
}

impl ScriptRewrite {
    /// Apply the rewrite. Total: a patch whose needle is absent (the server
    /// changed the script) leaves the body unchanged.
    pub fn apply(self, body: &str) -> String {
        match self {
            ScriptRewrite::ReplaceMap => MAP_REPLACEMENT_JS.to_string(),
            ScriptRewrite::ReplaceHpMp => HPMP_REPLACEMENT_JS.to_string(),
            ScriptRewrite::ReplaceChatList => CHAT_LIST_REPLACEMENT_JS.to_string(),
            ScriptRewrite::PatchChatMessage => patch(
                body,
                &ScriptPatch {
                    needle: "parent.frames['chat'].document",
                    replacement: "document",
                },
            ),
            ScriptRewrite::PatchArena => patch(
                body,
                &ScriptPatch {
                    needle: "target=\"_blank\"",
                    replacement: "target=\"_self\"",
                },
            ),
            ScriptRewrite::PatchBuildingSet => patch(
                body,
                &ScriptPatch {
                    needle: "window.open(burl, 'building'",
                    replacement: "window.location.assign(burl); void(0, 'building'",
                },
            ),
            ScriptRewrite::PatchShop => patch(
                body,
                &ScriptPatch {
                    needle: "if (!confirm(shop_q)) return;",
                    replacement: "",
                },
            ),
            ScriptRewrite::PatchCharacterInfo => patch(
                body,
                &ScriptPatch {
                    needle: "window.open('pinfo.php?nick='",
                    replacement: "window.location.assign('pinfo.php?nick='",
                },
            ),
            ScriptRewrite::ShimHelpTips => format!("{}{}", HOST_OBJECT_SHIM_JS, body),
        }
    }

    /// Whether the rewrite's output depends on the served body at all.
    /// Wholesale replacements do not, so the engine can cache them per URL.
    pub fn is_static_replacement(self) -> bool {
        matches!(
            self,
            ScriptRewrite::ReplaceMap | ScriptRewrite::ReplaceHpMp | ScriptRewrite::ReplaceChatList
        )
    }
}

fn patch(body: &str, p: &ScriptPatch) -> String {
    if body.contains(p.needle) {
        body.replace(p.needle, p.replacement)
    } else {
        tracing::warn!("script patch needle not found, serving original body");
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wholesale_replacements_ignore_body() {
        assert_eq!(ScriptRewrite::ReplaceMap.apply("anything"), MAP_REPLACEMENT_JS);
        assert_eq!(ScriptRewrite::ReplaceHpMp.apply(""), HPMP_REPLACEMENT_JS);
    }

    #[test]
    fn patch_is_exact_and_falls_back_to_original() {
        let body = "x(); if (!confirm(shop_q)) return; y();";
        assert_eq!(ScriptRewrite::PatchShop.apply(body), "x();  y();");

        let unrelated = "function other() {}";
        assert_eq!(ScriptRewrite::PatchShop.apply(unrelated), unrelated);
    }

    #[test]
    fn shim_is_prepended_verbatim() {
        let out = ScriptRewrite::ShimHelpTips.apply("tip();");
        assert!(out.starts_with(HOST_OBJECT_SHIM_JS));
        assert!(out.ends_with("tip();"));
    }
}

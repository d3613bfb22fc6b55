//! Page-level transformers for the game's PHP-served HTML.
//!
//! Every function here is total over arbitrary input: content that does not
//! look like the expected page passes through with at most the DOCTYPE
//! stripped. A transform that bails half-way must leave the text it was
//! given, never a partial rewrite.

use crate::core::types::{DeepLinkKind, GateEvent, TradeDecision, TradeOffer};
use crate::filtering::literals;
use crate::filtering::transformers::Transformed;
use crate::session::profile::SessionHandle;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::{debug, info, warn};
use url::Url;

/// Inner content swapped into the empty wait-indicator element.
const WAIT_PLACEHOLDER: &str = "Обработка...";

/// Exact markup of the "return to game" button; its presence is the only
/// reliable signal that a page really is the trade-offer page.
const RETURN_TO_GAME_MARKUP: &str = r#"<input type="button" value="Вернуться в игру""#;

/// Positions inside the fight-action literal (`var flist = [...]`).
const FLIST_FIGHT_ID: usize = 0;
const FLIST_ACCESS_KEY: usize = 1;
const FLIST_PILLAGE_FLAG: usize = 9;
const FLIST_ROB_FLAG: usize = 10;

/// Strip every `<!DOCTYPE ...>` declaration, including ones carrying an
/// internal subset (`[...]`). The legacy markup only renders correctly in a
/// modern surface when served without a doctype. Idempotent.
pub fn strip_doctype(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(start) = find_doctype(rest) else {
            out.push_str(rest);
            return out;
        };
        out.push_str(&rest[..start]);
        let decl = &rest[start..];
        match doctype_end(decl) {
            Some(end) => rest = &decl[end..],
            None => {
                // Unterminated declaration: drop the remainder of the text,
                // the renderer could not have used it anyway.
                return out;
            }
        }
    }
}

fn find_doctype(text: &str) -> Option<usize> {
    let lower = text.to_ascii_lowercase();
    lower.find("<!doctype")
}

/// Index one past the `>` closing the declaration at the start of `decl`,
/// skipping any `[ ... ]` internal subset.
fn doctype_end(decl: &str) -> Option<usize> {
    let mut in_subset = false;
    for (i, c) in decl.char_indices() {
        match c {
            '[' => in_subset = true,
            ']' => in_subset = false,
            '>' if !in_subset => return Some(i + 1),
            _ => {}
        }
    }
    None
}

/// Entry page: no data to lift, only the doctype rewrite.
pub fn entry_page(url: &str, text: &str, _session: &SessionHandle) -> Transformed {
    let _ = url;
    Transformed::text_only(strip_doctype(text))
}

/// Character/profile info page: log the four embedded literals, mutate
/// nothing. The profile UI reads these through its own channel; the filter
/// layer only confirms they were seen.
pub fn character_info_page(url: &str, text: &str, _session: &SessionHandle) -> Transformed {
    let presents = literals::extract_between(text, "var presents = [", "];")
        .map(literals::parse_pseudo_array)
        .unwrap_or_default();
    let hpmp = literals::extract_between(text, "var hpmp = [", "];")
        .map(literals::parse_flat_array)
        .unwrap_or_default();
    let params = literals::extract_between(text, "var params = [", "];")
        .map(literals::parse_flat_array)
        .unwrap_or_default();
    let slots = literals::extract_between(text, "var slots = '", "';")
        .map(literals::parse_slot_records)
        .unwrap_or_default();

    info!(
        "character info page {}: presents={} hpmp={} params={} slots={}",
        url,
        presents.len(),
        hpmp.len(),
        params.len(),
        slots.len()
    );

    Transformed::text_only(strip_doctype(text))
}

/// Main game page: telemetry lift, rob/pillage deep links, wait-indicator
/// placeholder.
pub fn main_game_page(url: &str, text: &str, session: &SessionHandle) -> Transformed {
    let mut events = Vec::new();

    if literals::has_telemetry_markers(text) {
        for (hp, mp) in literals::scan_ins_hp(text) {
            session.record_hp_mp(hp, mp);
            events.push(GateEvent::Telemetry { hp, mp });
        }
    }

    if let Some(body) = literals::extract_between(text, "var flist = [", "];") {
        let fields = literals::parse_flat_array(body);
        for (index, kind) in [
            (FLIST_ROB_FLAG, DeepLinkKind::Rob),
            (FLIST_PILLAGE_FLAG, DeepLinkKind::Pillage),
        ] {
            let flag_set = fields.get(index).map(|f| !f.is_empty()).unwrap_or(false);
            if flag_set {
                if let Some(link) = fight_deep_link(url, kind, &fields) {
                    debug!("fight action available: {:?} -> {}", kind, link);
                    events.push(GateEvent::DeepLink { kind, url: link });
                }
            }
        }
    }

    let mut out = strip_doctype(text);
    let empty_wait = r#"<div id="wait_msg"></div>"#;
    if out.contains(empty_wait) {
        out = out.replace(
            empty_wait,
            &format!(r#"<div id="wait_msg">{}</div>"#, WAIT_PLACEHOLDER),
        );
    }

    Transformed { text: out, events }
}

/// Build the rob/pillage deep link from the fixed positional fields of the
/// fight-action row. `None` when the row is too short to address.
fn fight_deep_link(page_url: &str, kind: DeepLinkKind, fields: &[String]) -> Option<String> {
    let fight_id = fields.get(FLIST_FIGHT_ID)?;
    let key = fields.get(FLIST_ACCESS_KEY)?;
    if fight_id.is_empty() {
        return None;
    }
    let host = Url::parse(page_url).ok()?.host_str()?.to_string();
    let action = match kind {
        DeepLinkKind::Rob => "rob",
        DeepLinkKind::Pillage => "pillage",
    };
    Some(format!(
        "http://{}/main.php?post={}&fid={}&key={}",
        host,
        action,
        utf8_percent_encode(fight_id, NON_ALPHANUMERIC),
        utf8_percent_encode(key, NON_ALPHANUMERIC),
    ))
}

/// Chat frame page: remember the most recent chat line on the session.
/// The page is served as a stream of `chat_msg('...')` calls; the last one
/// is the newest message.
pub fn chat_page(url: &str, text: &str, session: &SessionHandle) -> Transformed {
    let _ = url;
    if let Some(start) = text.rfind("chat_msg('") {
        let tail = &text[start..];
        if let Some(line) = literals::extract_between(tail, "chat_msg('", "')") {
            if !line.is_empty() {
                session.record_chat_line(line);
            }
        }
    }
    Transformed::text_only(strip_doctype(text))
}

/// Trade page: lift the offer, decide accept/decline when trade automation
/// is on. The page text itself is not edited beyond the doctype strip.
pub fn trade_page(url: &str, text: &str, session: &SessionHandle) -> Transformed {
    let _ = url;
    let out = strip_doctype(text);

    // Pages other than the real offer page (item listings, confirmations)
    // share the URL; only the one with the return button carries an offer.
    if !text.contains(RETURN_TO_GAME_MARKUP) {
        return Transformed::text_only(out);
    }

    let Some(offer) = extract_offer(text) else {
        debug!("trade page without a parseable offer, passing through");
        return Transformed::text_only(out);
    };

    let profile = session.profile();
    if !profile.trading.enabled {
        return Transformed::text_only(out);
    }

    let decision = decide(&offer, session);
    info!(
        "trade offer from {} ({} for {}): {}",
        offer.seller,
        offer.price,
        offer.item,
        match &decision {
            Some(TradeDecision::Accept { counter_price, .. }) =>
                format!("accept at {}", counter_price),
            Some(TradeDecision::Decline { .. }) => "decline".to_string(),
            None => "no decision (no valid price table)".to_string(),
        }
    );

    Transformed {
        text: out,
        events: decision.into_iter().map(GateEvent::Trade).collect(),
    }
}

fn extract_offer(text: &str) -> Option<TradeOffer> {
    let seller = literals::extract_between(text, "Персонаж <b>", "</b>")?.trim();
    let price_raw = literals::extract_between(text, "по цене <b>", "</b>")?;
    let item = literals::extract_between(text, "предмет \"", "\"")?.trim();
    let level_raw = literals::extract_between(text, "(уровень ", ")")?;

    let price: i64 = price_raw
        .trim()
        .trim_end_matches(" NV")
        .trim()
        .parse()
        .ok()?;
    let level: u32 = level_raw.trim().parse().ok()?;

    if seller.is_empty() || item.is_empty() {
        return None;
    }
    Some(TradeOffer {
        seller: seller.to_string(),
        price,
        item: item.to_string(),
        level,
    })
}

fn decide(offer: &TradeOffer, session: &SessionHandle) -> Option<TradeDecision> {
    let profile = session.profile();
    let trading = &profile.trading;

    let listed = |list: &[String]| {
        list.iter()
            .any(|name| name.eq_ignore_ascii_case(&offer.seller))
    };

    let decline = |offer: &TradeOffer| TradeDecision::Decline {
        offer: offer.clone(),
        message: fill_template(&trading.decline_message, offer, offer.price),
    };

    if listed(&trading.deny_list) {
        return Some(decline(offer));
    }
    if !trading.allow_list.is_empty() && !listed(&trading.allow_list) {
        return Some(decline(offer));
    }
    if offer.level < trading.min_level {
        return Some(decline(offer));
    }

    let Some(table) = session.price_table() else {
        warn!("trade automation enabled but no valid price table is compiled");
        return None;
    };
    let counter = table.evaluate(offer.price);
    if counter > 0 {
        Some(TradeDecision::Accept {
            offer: offer.clone(),
            counter_price: counter,
            message: fill_template(&trading.accept_message, offer, counter),
        })
    } else {
        Some(decline(offer))
    }
}

fn fill_template(template: &str, offer: &TradeOffer, price: i64) -> String {
    template
        .replace("{price}", &price.to_string())
        .replace("{item}", &offer.item)
        .replace("{seller}", &offer.seller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::profile::SessionProfile;

    fn session() -> SessionHandle {
        SessionHandle::new(SessionProfile::default())
    }

    #[test]
    fn doctype_strip_handles_internal_subset() {
        let page = "<!DOCTYPE html [ <!ENTITY nbsp \"&#160;\"> ]><html></html>";
        assert_eq!(strip_doctype(page), "<html></html>");
    }

    #[test]
    fn doctype_strip_is_idempotent() {
        let page = "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\">\n<html></html>";
        let once = strip_doctype(page);
        assert_eq!(strip_doctype(&once), once);
    }

    #[test]
    fn main_page_updates_hp_mp_telemetry() {
        let s = session();
        let page = "<html><body onload='ins_hp(1,2,3,4,87.5,42.0)'></body></html>";
        let out = main_game_page("http://game.example/main.php", page, &s);
        let t = s.telemetry();
        assert_eq!((t.current_hp, t.current_mp), (87.5, 42.0));
        assert!(out
            .events
            .contains(&GateEvent::Telemetry { hp: 87.5, mp: 42.0 }));
    }

    #[test]
    fn main_page_synthesizes_rob_deep_link() {
        let s = session();
        let page = r#"<script>var flist = ["77","k9z","","","","","","","","","1"];</script>"#;
        let out = main_game_page("http://game.example/main.php", page, &s);
        let links: Vec<_> = out
            .events
            .iter()
            .filter_map(|e| match e {
                GateEvent::DeepLink { kind, url } => Some((kind, url.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(links.len(), 1);
        assert_eq!(*links[0].0, DeepLinkKind::Rob);
        assert_eq!(
            links[0].1,
            "http://game.example/main.php?post=rob&fid=77&key=k9z"
        );
    }

    #[test]
    fn wait_indicator_gets_placeholder() {
        let s = session();
        let page = r#"<div id="wait_msg"></div>"#;
        let out = main_game_page("http://game.example/main.php", page, &s);
        assert!(out.text.contains(WAIT_PLACEHOLDER));
    }

    #[test]
    fn trade_page_ignored_without_return_button() {
        let s = session();
        let page = "Персонаж <b>Вор</b> предлагает предмет \"Нож\" по цене <b>50 NV</b> (уровень 3)";
        let out = trade_page("http://game.example/gameplay/trade", page, &s);
        assert!(out.events.is_empty());
    }
}

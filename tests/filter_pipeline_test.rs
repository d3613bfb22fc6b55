use relic_gate::codec;
use relic_gate::core::config::GateConfig;
use relic_gate::core::types::{GateEvent, TradeDecision};
use relic_gate::filtering::transformers::scripts::MAP_REPLACEMENT_JS;
use relic_gate::filtering::FilterEngine;
use relic_gate::session::{SessionHandle, SessionProfile};

const HTML: &str = "text/html; charset=windows-1251";

fn engine() -> FilterEngine {
    FilterEngine::new(&GateConfig::default())
}

fn blank_session() -> SessionHandle {
    SessionHandle::new(SessionProfile::default())
}

#[test]
fn doctype_stripping_is_idempotent_through_the_engine() {
    let e = engine();
    let s = blank_session();
    let url = "http://www.neverlands.ru/main.php";
    let page = codec::encode("<!DOCTYPE html>\n<html><body>игра</body></html>");

    let once = e.filter(url, &page, HTML, &s);
    let twice = e.filter(url, &once.body, HTML, &s);
    assert_eq!(once.body, twice.body);
    assert!(!codec::decode(&once.body).to_lowercase().contains("doctype"));
}

#[test]
fn ins_hp_call_updates_session_telemetry() {
    let e = engine();
    let s = blank_session();
    let page = codec::encode("<html><script>ins_hp(1,2,3,4,87.5,42.0);</script></html>");

    let out = e.filter("http://www.neverlands.ru/main.php", &page, HTML, &s);
    let t = s.telemetry();
    assert_eq!(t.current_hp, 87.5);
    assert_eq!(t.current_mp, 42.0);
    assert!(out
        .events
        .contains(&GateEvent::Telemetry { hp: 87.5, mp: 42.0 }));
}

#[test]
fn cyrillic_content_survives_the_decode_transform_encode_cycle() {
    let e = engine();
    let s = blank_session();
    let text = "<html><body>Персонаж атакует противника</body></html>";
    let out = e.filter(
        "http://www.neverlands.ru/main.php",
        &codec::encode(text),
        HTML,
        &s,
    );
    assert_eq!(codec::decode(&out.body), text);
}

#[test]
fn map_script_is_replaced_wholesale_byte_for_byte() {
    let e = engine();
    let s = blank_session();
    let out = e.filter(
        "http://www.neverlands.ru/js/map.js",
        b"original_map_code();",
        "application/x-javascript",
        &s,
    );
    assert!(out.rewritten);
    assert_eq!(out.body, codec::encode(MAP_REPLACEMENT_JS));
}

fn trade_page(price: u32, level: u32) -> Vec<u8> {
    codec::encode(&format!(
        r#"<html><body>
<input type="button" value="Вернуться в игру" onclick="history.back()">
Персонаж <b>Торговец</b> предлагает вам предмет "Кинжал" по цене <b>{} NV</b> (уровень {})
</body></html>"#,
        price, level
    ))
}

fn trading_session() -> SessionHandle {
    let mut profile = SessionProfile::default();
    profile.trading.enabled = true;
    profile.trading.table_source = "1-100(*-50),101-200(*-40)".to_string();
    profile.trading.min_level = 3;
    profile.trading.accept_message = "Беру {item} за {price}".to_string();
    profile.trading.decline_message = "Не интересует".to_string();
    SessionHandle::new(profile)
}

#[test]
fn trade_offer_inside_a_range_is_accepted_with_bonus_applied() {
    let e = engine();
    let s = trading_session();
    let out = e.filter(
        "http://www.neverlands.ru/gameplay/trade",
        &trade_page(150, 5),
        HTML,
        &s,
    );

    let decisions: Vec<_> = out
        .events
        .iter()
        .filter_map(|ev| match ev {
            GateEvent::Trade(d) => Some(d),
            _ => None,
        })
        .collect();
    assert_eq!(decisions.len(), 1);
    match decisions[0] {
        TradeDecision::Accept {
            offer,
            counter_price,
            message,
        } => {
            assert_eq!(offer.seller, "Торговец");
            assert_eq!(offer.item, "Кинжал");
            assert_eq!(*counter_price, 110);
            assert_eq!(message, "Беру Кинжал за 110");
        }
        other => panic!("expected accept, got {:?}", other),
    }
}

#[test]
fn low_level_seller_is_declined() {
    let e = engine();
    let s = trading_session();
    let out = e.filter(
        "http://www.neverlands.ru/gameplay/trade",
        &trade_page(150, 1),
        HTML,
        &s,
    );
    assert!(matches!(
        out.events.as_slice(),
        [GateEvent::Trade(TradeDecision::Decline { .. })]
    ));
}

#[test]
fn trade_page_without_return_button_is_left_alone() {
    let e = engine();
    let s = trading_session();
    let page = codec::encode("Персонаж <b>Кто-то</b> предмет \"Нечто\" по цене <b>5 NV</b> (уровень 9)");
    let out = e.filter("http://www.neverlands.ru/gameplay/trade", &page, HTML, &s);
    assert!(out.events.is_empty());
}

#[test]
fn concurrent_telemetry_writes_last_write_wins() {
    let e = std::sync::Arc::new(engine());
    let s = blank_session();

    let mut handles = Vec::new();
    for hp in [10.0f64, 90.0f64] {
        let e = e.clone();
        let s = s.clone();
        handles.push(std::thread::spawn(move || {
            let page = codec::encode(&format!("<script>ins_hp(1,2,3,4,{},5.0);</script>", hp));
            for _ in 0..50 {
                e.filter("http://www.neverlands.ru/main.php", &page, HTML, &s);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let hp = s.telemetry().current_hp;
    assert!(hp == 10.0 || hp == 90.0, "unexpected hp {}", hp);
}

//! Outgoing header shaping.
//!
//! The interception layer forwards every upstream request with a coherent
//! browser identity: User-Agent plus the matching client-hint headers, drawn
//! once per session from a fixed profile list. Anything fancier (timing
//! jitter, per-request rotation) is out of scope; the upstream only needs a
//! consistent, plausible desktop browser.

use rand::prelude::*;

#[derive(Debug, Clone)]
pub struct HeaderProfile {
    pub user_agent: &'static str,
    pub sec_ch_ua: &'static str,
    pub sec_ch_ua_mobile: &'static str,
    pub sec_ch_ua_platform: &'static str,
}

const HEADER_PROFILES: &[HeaderProfile] = &[
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="131", "Not_A Brand";v="24", "Google Chrome";v="131""#,
        sec_ch_ua_mobile: "?0",
        sec_ch_ua_platform: "\"Windows\"",
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="131", "Not_A Brand";v="24", "Google Chrome";v="131""#,
        sec_ch_ua_mobile: "?0",
        sec_ch_ua_platform: "\"macOS\"",
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        sec_ch_ua: r#""Chromium";v="130", "Not_A Brand";v="24", "Google Chrome";v="130""#,
        sec_ch_ua_mobile: "?0",
        sec_ch_ua_platform: "\"Linux\"",
    },
    HeaderProfile {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
        sec_ch_ua: r#""Chromium";v="132", "Not_A Brand";v="24", "Microsoft Edge";v="132""#,
        sec_ch_ua_mobile: "?0",
        sec_ch_ua_platform: "\"Windows\"",
    },
];

/// Pick one profile for the lifetime of a session.
pub fn pick_header_profile() -> &'static HeaderProfile {
    let mut rng = rand::rng();
    let index = rng.random_range(0..HEADER_PROFILES.len());
    &HEADER_PROFILES[index]
}

impl HeaderProfile {
    /// Header set applied to every shaped upstream request.
    pub fn outgoing_headers(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("User-Agent", self.user_agent),
            ("sec-ch-ua", self.sec_ch_ua),
            ("sec-ch-ua-mobile", self.sec_ch_ua_mobile),
            ("sec-ch-ua-platform", self.sec_ch_ua_platform),
        ]
    }
}

//! Content interception: the single entry point every in-flight response
//! passes through.
//!
//! Pipeline: host gate → URL dispatch → windows-1251 decode → transformer →
//! re-encode. The pipeline is total by construction: any miss (foreign host,
//! no matching rule, binary payload) and any internal surprise returns the
//! original bytes unchanged. Nothing in here is allowed to break a page
//! render.
//!
//! Transforms run on the I/O side, one invocation per in-flight exchange,
//! potentially concurrently (a page and its scripts load in parallel).
//! Session telemetry writes are last-write-wins by contract, so no
//! cross-request coordination is needed here.

pub mod dispatch;
pub mod literals;
pub mod transformers;

use crate::codec;
use crate::core::config::GateConfig;
use crate::core::types::FilterOutcome;
use crate::session::profile::SessionHandle;
use moka::sync::Cache;
use tracing::debug;

pub struct FilterEngine {
    game_host: String,
    /// Rewritten bodies of static script replacements, keyed by URL. These
    /// rewrites ignore the served body, so caching skips a decode/encode per
    /// script request.
    script_cache: Cache<String, Vec<u8>>,
}

impl FilterEngine {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            game_host: config.resolve_game_host(),
            script_cache: Cache::builder()
                .max_capacity(config.resolve_script_cache_capacity())
                .time_to_live(config.resolve_script_cache_ttl())
                .build(),
        }
    }

    pub fn game_host(&self) -> &str {
        &self.game_host
    }

    /// Filter one response. Returns the original bytes untouched unless a
    /// dispatch rule matched and its transformer produced a rewrite.
    pub fn filter(
        &self,
        url: &str,
        body: &[u8],
        content_type: &str,
        session: &SessionHandle,
    ) -> FilterOutcome {
        if !codec::is_text_content_type(content_type) {
            return FilterOutcome::passthrough(body.to_vec(), content_type);
        }

        let Some(transformer) = dispatch::route(url, &self.game_host) else {
            return FilterOutcome::passthrough(body.to_vec(), content_type);
        };

        if transformer.cacheable() {
            if let Some(cached) = self.script_cache.get(url) {
                debug!("script rewrite cache hit: {}", url);
                return FilterOutcome {
                    body: cached,
                    content_type: content_type.to_string(),
                    rewritten: true,
                    events: Vec::new(),
                };
            }
        }

        let text = codec::decode(body);
        let transformed = transformer.apply(url, &text, session);
        let encoded = codec::encode(&transformed.text);

        if transformer.cacheable() {
            self.script_cache.insert(url.to_string(), encoded.clone());
        }

        debug!(
            "filtered {} ({} -> {} bytes, {} events)",
            url,
            body.len(),
            encoded.len(),
            transformed.events.len()
        );

        FilterOutcome {
            body: encoded,
            content_type: content_type.to_string(),
            rewritten: true,
            events: transformed.events,
        }
    }
}

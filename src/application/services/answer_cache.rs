use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::application::services::answer::AnswerResponse;
use crate::domain::value_objects::TenantId;

/// Process-local TTL cache for finished answers, keyed by request
/// fingerprint. Two identical requests inside the TTL return byte-identical
/// answers and citations; the stream path replays a hit as one event.
pub struct AnswerCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    response: AnswerResponse,
    expires_at: Instant,
}

impl AnswerCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic hash over everything that shapes the answer.
    pub fn fingerprint(
        tenant: &TenantId,
        query: &str,
        top_k: usize,
        rerank: bool,
        max_ctx_tokens: usize,
        model: &str,
    ) -> String {
        let normalized = normalize_query(query);
        let mut hasher = Sha256::new();
        hasher.update(tenant.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(normalized.as_bytes());
        hasher.update([0]);
        hasher.update(top_k.to_le_bytes());
        hasher.update([rerank as u8]);
        hasher.update(max_ctx_tokens.to_le_bytes());
        hasher.update([0]);
        hasher.update(model.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, fingerprint: &str) -> Option<AnswerResponse> {
        let mut entries = self.entries.lock().expect("answer cache poisoned");
        match entries.get(fingerprint) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.response.clone()),
            Some(_) => {
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, fingerprint: String, response: AnswerResponse) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock().expect("answer cache poisoned");
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            fingerprint,
            CacheEntry {
                response,
                expires_at: now + self.ttl,
            },
        );
    }
}

fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::answer::UsageReport;

    fn response(answer: &str) -> AnswerResponse {
        AnswerResponse {
            answer: answer.to_string(),
            citations: Vec::new(),
            usage: UsageReport {
                in_tokens: Some(10),
                out_tokens: Some(5),
                latency_ms: 12,
                provider: "local".to_string(),
                model: "extractive".to_string(),
            },
        }
    }

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    #[test]
    fn fingerprint_ignores_whitespace_and_case() {
        let a = AnswerCache::fingerprint(&tenant(), "What  is Beta?", 5, false, 1000, "m");
        let b = AnswerCache::fingerprint(&tenant(), "what is beta?", 5, false, 1000, "m");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_varies_with_inputs() {
        let base = AnswerCache::fingerprint(&tenant(), "q", 5, false, 1000, "m");
        assert_ne!(
            base,
            AnswerCache::fingerprint(&tenant(), "q", 6, false, 1000, "m")
        );
        assert_ne!(
            base,
            AnswerCache::fingerprint(&tenant(), "q", 5, true, 1000, "m")
        );
        assert_ne!(
            base,
            AnswerCache::fingerprint(&TenantId::new("other").unwrap(), "q", 5, false, 1000, "m")
        );
    }

    #[test]
    fn hit_within_ttl_returns_identical_response() {
        let cache = AnswerCache::new(Duration::from_secs(60));
        cache.put("fp".to_string(), response("grounded answer"));
        let hit = cache.get("fp").unwrap();
        assert_eq!(hit.answer, "grounded answer");
    }

    #[test]
    fn expired_entries_miss() {
        let cache = AnswerCache::new(Duration::from_millis(0));
        cache.put("fp".to_string(), response("x"));
        assert!(cache.get("fp").is_none());
    }
}

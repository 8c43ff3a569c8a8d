use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;
use regex::Regex;

use crate::gemini::GeminiClient;
use crate::knowledge::{capitalize, KnowledgeBase};

pub const GREETING: &str =
    "Hello! Welcome to the Jharkhand tourism chatbot. How can I help you today?";
const NO_MATCHING_PLACES: &str = "I couldn't find any places matching your interests.";

const DEFAULT_DAYS: usize = 3;
const DEFAULT_INTEREST: &str = "nature";

const GREETED_CAPACITY: usize = 10_000;
const GREETED_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Decides how an inbound chat message is answered: greeting, itinerary,
/// direct place lookup, or delegation to the generative model. Infallible —
/// the chat endpoint never surfaces an error to the caller.
pub struct ChatRouter {
    knowledge: Arc<KnowledgeBase>,
    gateway: GeminiClient,
    greeted: GreetedCache,
    itinerary_intent: Regex,
    day_count: Regex,
}

impl ChatRouter {
    pub fn new(knowledge: Arc<KnowledgeBase>, gateway: GeminiClient) -> Result<Self> {
        Ok(Self {
            knowledge,
            gateway,
            greeted: GreetedCache::new(GREETED_CAPACITY, GREETED_TTL),
            itinerary_intent: Regex::new(r"plan.*day")?,
            day_count: Regex::new(r"(\d+)\s*day")?,
        })
    }

    pub async fn handle(&self, user_id: &str, raw_message: &str) -> String {
        let message = raw_message.to_lowercase();

        // First contact consumes the message, whatever it says.
        if !self.greeted.remember(user_id) {
            return GREETING.to_string();
        }

        if message.contains("itinerary") || self.itinerary_intent.is_match(&message) {
            return self.build_itinerary(&message);
        }

        for (place, info) in self.knowledge.places() {
            if message.contains(place.as_str()) {
                let description = info.description.as_deref().unwrap_or("N/A");
                return format!("{}: {}", capitalize(place), description);
            }
        }

        self.gateway.generate_reply(&message).await
    }

    fn build_itinerary(&self, message: &str) -> String {
        let days = self
            .day_count
            .captures(message)
            .and_then(|caps| caps[1].parse::<usize>().ok())
            .unwrap_or(DEFAULT_DAYS);

        let mut interests: Vec<&str> = self
            .knowledge
            .interests()
            .iter()
            .filter(|(tag, _)| message.contains(tag))
            .map(|(tag, _)| *tag)
            .collect();
        if interests.is_empty() {
            interests.push(DEFAULT_INTEREST);
        }

        // Duplicates are kept; they just shorten the cycle through repeats.
        let mut candidates: Vec<&str> = interests
            .iter()
            .flat_map(|tag| self.knowledge.places_for_interest(tag))
            .copied()
            .collect();
        if candidates.is_empty() {
            candidates = self
                .knowledge
                .places()
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
        }
        if candidates.is_empty() {
            return NO_MATCHING_PLACES.to_string();
        }

        let mut blocks = Vec::with_capacity(days);
        for i in 0..days {
            let place = candidates[i % candidates.len()];
            let info = self.knowledge.get(place).cloned().unwrap_or_default();
            blocks.push(format!(
                "Day {}\n{} - {}\nBest time: {}\nActivities: {}",
                i + 1,
                capitalize(place),
                info.description.as_deref().unwrap_or("N/A"),
                info.best_time.as_deref().unwrap_or("N/A"),
                info.activities.as_deref().unwrap_or("N/A"),
            ));
        }
        blocks.join("\n\n")
    }
}

/// Bounded replacement for a grow-forever greeted-user set: holds at most
/// `capacity` ids, each for at most `ttl`. Two racing first messages from the
/// same id may both see "not greeted"; that duplication is harmless.
pub struct GreetedCache {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<GreetedInner>,
}

#[derive(Default)]
struct GreetedInner {
    seen: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl GreetedCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            inner: Mutex::new(GreetedInner::default()),
        }
    }

    /// Returns whether `id` had already been greeted, marking it greeted if
    /// not. Expired entries are dropped on access; when full, the oldest
    /// entry makes room.
    pub fn remember(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;

        while let Some(oldest) = inner.order.front() {
            let expired = inner
                .seen
                .get(oldest)
                .map_or(true, |at| now.duration_since(*at) >= self.ttl);
            if !expired {
                break;
            }
            if let Some(key) = inner.order.pop_front() {
                inner.seen.remove(&key);
            }
        }

        if inner.seen.contains_key(id) {
            return true;
        }

        if inner.seen.len() >= self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }

        inner.seen.insert(id.to_string(), now);
        inner.order.push_back(id.to_string());
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::PlaceInfo;

    fn place(description: &str, best_time: &str, activities: &str) -> PlaceInfo {
        PlaceInfo {
            description: Some(description.to_string()),
            best_time: Some(best_time.to_string()),
            activities: Some(activities.to_string()),
        }
    }

    fn test_knowledge() -> Arc<KnowledgeBase> {
        Arc::new(KnowledgeBase::new(vec![
            (
                "netarhat".to_string(),
                place("queen of chotanagpur", "october to february", "sunrise point"),
            ),
            (
                "betla".to_string(),
                place("national park", "november to march", "safari"),
            ),
            (
                "patratu".to_string(),
                place("valley and dam", "all year", "boating"),
            ),
            (
                "hundru".to_string(),
                place("waterfall", "monsoon", "photography"),
            ),
            (
                "deoghar".to_string(),
                place("temple town", "shravan", "darshan"),
            ),
        ]))
    }

    // The gateway is only reached on the fallback path; an unroutable base
    // URL keeps every failure local and immediate.
    fn test_router(knowledge: Arc<KnowledgeBase>) -> ChatRouter {
        let http = reqwest::Client::new();
        let gateway = GeminiClient::with_base_url(
            http,
            "test-key".to_string(),
            "http://127.0.0.1:1".to_string(),
        )
        .unwrap();
        ChatRouter::new(knowledge, gateway).unwrap()
    }

    #[tokio::test]
    async fn first_message_always_greets() {
        let router = test_router(test_knowledge());
        let reply = router.handle("alice", "plan a 5 day itinerary").await;
        assert_eq!(reply, GREETING);
    }

    #[tokio::test]
    async fn second_message_is_never_the_greeting() {
        let router = test_router(test_knowledge());
        router.handle("alice", "hello").await;
        let reply = router.handle("alice", "tell me about betla").await;
        assert_ne!(reply, GREETING);
    }

    #[tokio::test]
    async fn distinct_users_each_get_greeted() {
        let router = test_router(test_knowledge());
        router.handle("alice", "hi").await;
        assert_eq!(router.handle("bob", "hi").await, GREETING);
    }

    #[tokio::test]
    async fn five_day_wildlife_itinerary_cycles_the_single_place() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router
            .handle("u", "plan a 5 day trip focused on wildlife")
            .await;

        let blocks: Vec<&str> = reply.split("\n\n").collect();
        assert_eq!(blocks.len(), 5);
        for (i, block) in blocks.iter().enumerate() {
            assert!(block.starts_with(&format!("Day {}", i + 1)), "{block}");
            assert!(block.contains("Betla"), "{block}");
        }
    }

    #[tokio::test]
    async fn itinerary_defaults_to_three_days_and_nature() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router.handle("u", "itinerary").await;

        let blocks: Vec<&str> = reply.split("\n\n").collect();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].contains("Netarhat"));
        assert!(blocks[1].contains("Patratu"));
        assert!(blocks[2].contains("Hundru"));
    }

    #[tokio::test]
    async fn plan_day_phrase_triggers_itinerary_without_digits() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router.handle("u", "please plan a day trip for me").await;
        assert!(reply.contains("Day 1"));
        assert_eq!(reply.split("\n\n").count(), 3);
    }

    #[tokio::test]
    async fn multi_place_interest_cycles_in_order() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router.handle("u", "plan a 4 day nature trip").await;

        let blocks: Vec<&str> = reply.split("\n\n").collect();
        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].contains("Netarhat"));
        assert!(blocks[1].contains("Patratu"));
        assert!(blocks[2].contains("Hundru"));
        assert!(blocks[3].contains("Netarhat"));
    }

    #[tokio::test]
    async fn itinerary_renders_missing_fields_as_na() {
        let knowledge = Arc::new(KnowledgeBase::new(vec![(
            "netarhat".to_string(),
            PlaceInfo::default(),
        )]));
        let router = test_router(knowledge);
        router.handle("u", "hi").await;
        let reply = router.handle("u", "plan a 1 day nature trip").await;
        assert!(reply.contains("Netarhat - N/A"));
        assert!(reply.contains("Best time: N/A"));
        assert!(reply.contains("Activities: N/A"));
    }

    #[tokio::test]
    async fn empty_knowledge_base_still_plans_from_interest_tags() {
        // Interest tags are static, so the default "nature" tag supplies
        // candidate names even when the place file was missing; the blocks
        // just carry no detail.
        let knowledge = Arc::new(KnowledgeBase::new(Vec::new()));
        let router = test_router(knowledge);
        router.handle("u", "hi").await;
        let reply = router.handle("u", "plan a 2 day trip").await;
        assert!(reply.contains("Day 1"));
        assert!(reply.contains("Netarhat - N/A"));
    }

    #[tokio::test]
    async fn direct_lookup_returns_first_match_in_stored_order() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router
            .handle("u", "should I visit betla or netarhat first?")
            .await;
        // netarhat is stored first, so it wins even though betla appears
        // earlier in the message
        assert_eq!(reply, "Netarhat: queen of chotanagpur");
    }

    #[tokio::test]
    async fn lookup_is_case_insensitive_via_lowercasing() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        let reply = router.handle("u", "Tell me about DEOGHAR").await;
        assert_eq!(reply, "Deoghar: temple town");
    }

    #[tokio::test]
    async fn fallback_failures_become_a_fixed_apology() {
        let router = test_router(test_knowledge());
        router.handle("u", "hi").await;
        // no intent, no place name: falls through to the unreachable model
        let reply = router.handle("u", "what's the weather like?").await;
        assert_eq!(
            reply,
            "Sorry, an error occurred while contacting the AI model."
        );
    }

    #[test]
    fn greeted_cache_evicts_oldest_when_full() {
        let cache = GreetedCache::new(2, Duration::from_secs(60));
        assert!(!cache.remember("a"));
        assert!(!cache.remember("b"));
        assert!(!cache.remember("c")); // evicts a
        assert!(!cache.remember("a"));
        assert!(cache.remember("c"));
    }

    #[test]
    fn greeted_cache_expires_entries() {
        let cache = GreetedCache::new(16, Duration::from_millis(20));
        assert!(!cache.remember("a"));
        assert!(cache.remember("a"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.remember("a"));
    }
}

/// Conversation Preload Cache
///
/// Last known conversation list per user, shown immediately while the authoritative list
/// is fetched. Keyed strictly by user id so one account never sees another's entries.
use uuid::Uuid;

use crate::{api::error, configs::RedisCache, modules::conversation::model::ConversationSummary};

#[async_trait::async_trait]
pub trait ConversationCache: Send + Sync {
    async fn load(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<Vec<ConversationSummary>>, error::SystemError>;

    async fn store(
        &self,
        user_id: &Uuid,
        conversations: &[ConversationSummary],
    ) -> Result<(), error::SystemError>;

    async fn invalidate(&self, user_id: &Uuid) -> Result<(), error::SystemError>;
}

pub fn cache_key(user_id: &Uuid) -> String {
    format!("chat:preload:{}", user_id)
}

#[derive(Clone)]
pub struct RedisConversationCache {
    cache: RedisCache,
    ttl: usize,
}

impl RedisConversationCache {
    pub fn new(cache: RedisCache, ttl: usize) -> Self {
        Self { cache, ttl }
    }
}

#[async_trait::async_trait]
impl ConversationCache for RedisConversationCache {
    async fn load(
        &self,
        user_id: &Uuid,
    ) -> Result<Option<Vec<ConversationSummary>>, error::SystemError> {
        self.cache.get(&cache_key(user_id)).await
    }

    async fn store(
        &self,
        user_id: &Uuid,
        conversations: &[ConversationSummary],
    ) -> Result<(), error::SystemError> {
        self.cache.set(&cache_key(user_id), conversations, self.ttl).await
    }

    async fn invalidate(&self, user_id: &Uuid) -> Result<(), error::SystemError> {
        self.cache.delete(&cache_key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_per_user() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_ne!(cache_key(&a), cache_key(&b));
        assert!(cache_key(&a).ends_with(&a.to_string()));
    }
}

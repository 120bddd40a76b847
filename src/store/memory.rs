use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{AggregateRating, MediaType, RankedEntry, ScoreDelta, SentimentTier},
    services::{comparison::ComparisonSession, scoring::ScoreScale, tiers::UserTiers},
};

use super::{AggregateStore, RankingStore, SessionStore, TierMutation};

type UserSlot = Arc<Mutex<Vec<RankedEntry>>>;

/// Process-local ranking store with one mutex per user
pub struct InMemoryRankingStore {
    scale: ScoreScale,
    users: RwLock<HashMap<String, UserSlot>>,
}

impl InMemoryRankingStore {
    pub fn new(scale: ScoreScale) -> Self {
        Self {
            scale,
            users: RwLock::new(HashMap::new()),
        }
    }

    async fn user_slot(&self, user_id: &str) -> UserSlot {
        if let Some(slot) = self.users.read().await.get(user_id) {
            return slot.clone();
        }
        self.users
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Runs `f` against the user's tiers while holding the user's lock
    ///
    /// The stored entries are only replaced when `f` succeeds.
    async fn with_user<T>(
        &self,
        user_id: &str,
        f: impl FnOnce(&mut UserTiers) -> AppResult<T> + Send,
    ) -> AppResult<T> {
        let slot = self.user_slot(user_id).await;
        let mut stored = slot.lock().await;

        let mut tiers = UserTiers::load(user_id, stored.clone(), self.scale);
        let repaired = tiers.needs_repair_write();
        let result = f(&mut tiers)?;

        if repaired || !tiers.changed_entries().is_empty() || !tiers.removed_titles().is_empty() {
            *stored = tiers.into_entries();
        }

        Ok(result)
    }
}

#[async_trait::async_trait]
impl RankingStore for InMemoryRankingStore {
    async fn tier_entries(
        &self,
        user_id: &str,
        tier: SentimentTier,
    ) -> AppResult<Vec<RankedEntry>> {
        self.with_user(user_id, |tiers| Ok(tiers.tier(tier).to_vec()))
            .await
    }

    async fn user_entries(&self, user_id: &str) -> AppResult<Vec<RankedEntry>> {
        self.with_user(user_id, |tiers| {
            Ok(SentimentTier::ALL
                .iter()
                .flat_map(|tier| tiers.tier(*tier).to_vec())
                .collect())
        })
        .await
    }

    async fn find_entry(&self, user_id: &str, title_id: &str) -> AppResult<Option<RankedEntry>> {
        self.with_user(user_id, |tiers| Ok(tiers.find(title_id).cloned()))
            .await
    }

    async fn insert(
        &self,
        user_id: &str,
        tier: SentimentTier,
        index: usize,
        entry: RankedEntry,
    ) -> AppResult<TierMutation> {
        let title_id = entry.title_id.clone();
        self.with_user(user_id, |tiers| {
            let deltas = tiers.insert(tier, index, entry);
            Ok(TierMutation {
                tier_entries: tiers.tier(tier).to_vec(),
                entry: tiers.find(&title_id).cloned(),
                deltas: deltas.into_deltas(),
            })
        })
        .await
    }

    async fn remove(
        &self,
        user_id: &str,
        tier: SentimentTier,
        title_id: &str,
    ) -> AppResult<TierMutation> {
        self.with_user(user_id, |tiers| {
            let deltas = tiers.remove(tier, title_id)?;
            Ok(TierMutation {
                tier_entries: tiers.tier(tier).to_vec(),
                entry: None,
                deltas: deltas.into_deltas(),
            })
        })
        .await
    }

    async fn remove_all_for_user(&self, user_id: &str) -> AppResult<Vec<ScoreDelta>> {
        self.with_user(user_id, |tiers| Ok(tiers.remove_all().into_deltas()))
            .await
    }

    async fn title_scores(&self, title_id: &str) -> AppResult<Vec<(MediaType, f64)>> {
        let slots: Vec<UserSlot> = self.users.read().await.values().cloned().collect();

        let mut scores = Vec::new();
        for slot in slots {
            let entries = slot.lock().await;
            scores.extend(
                entries
                    .iter()
                    .filter(|entry| entry.title_id == title_id)
                    .map(|entry| (entry.media_type, entry.score)),
            );
        }
        Ok(scores)
    }
}

/// Process-local aggregates; every write is a single critical section
#[derive(Default)]
pub struct InMemoryAggregateStore {
    rows: Mutex<HashMap<String, AggregateRating>>,
}

impl InMemoryAggregateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn increment(
        &self,
        title_id: &str,
        media_type: MediaType,
        sum_delta: f64,
        count_delta: i64,
    ) -> AppResult<Option<AggregateRating>> {
        let mut rows = self.rows.lock().await;
        let (media_type, sum, count) = match rows.get(title_id) {
            Some(row) => (
                row.media_type,
                row.sum_of_scores + sum_delta,
                row.rating_count + count_delta,
            ),
            None => (media_type, sum_delta, count_delta),
        };

        if count <= 0 {
            rows.remove(title_id);
            return Ok(None);
        }

        let row = AggregateRating::from_totals(title_id, media_type, sum, count);
        rows.insert(title_id.to_string(), row.clone());
        Ok(Some(row))
    }

    async fn replace(
        &self,
        title_id: &str,
        media_type: MediaType,
        sum: f64,
        count: i64,
    ) -> AppResult<Option<AggregateRating>> {
        let mut rows = self.rows.lock().await;
        if count <= 0 {
            rows.remove(title_id);
            return Ok(None);
        }

        let row = AggregateRating::from_totals(title_id, media_type, sum, count);
        rows.insert(title_id.to_string(), row.clone());
        Ok(Some(row))
    }

    async fn get(&self, title_id: &str) -> AppResult<Option<AggregateRating>> {
        Ok(self.rows.lock().await.get(title_id).cloned())
    }

    async fn delete(&self, title_id: &str) -> AppResult<bool> {
        Ok(self.rows.lock().await.remove(title_id).is_some())
    }
}

struct StoredSession {
    session: ComparisonSession,
    expires_at: Instant,
}

/// Process-local session map with a fixed time-to-live per session
pub struct InMemorySessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

fn evict_expired(sessions: &mut HashMap<String, StoredSession>, user_id: &str) {
    let expired = sessions
        .get(user_id)
        .is_some_and(|stored| stored.expires_at <= Instant::now());
    if expired {
        tracing::debug!(user_id = %user_id, "Comparison session expired");
        sessions.remove(user_id);
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &ComparisonSession) -> AppResult<()> {
        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, &session.user_id);

        if sessions.contains_key(&session.user_id) {
            return Err(AppError::SessionConflict {
                user_id: session.user_id.clone(),
            });
        }

        sessions.insert(
            session.user_id.clone(),
            StoredSession {
                session: session.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, user_id: &str) -> AppResult<Option<ComparisonSession>> {
        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, user_id);
        Ok(sessions.get(user_id).map(|stored| stored.session.clone()))
    }

    async fn save(&self, session: &ComparisonSession) -> AppResult<()> {
        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, &session.user_id);

        match sessions.get_mut(&session.user_id) {
            Some(stored) if stored.session.id == session.id => {
                stored.session = session.clone();
                Ok(())
            }
            _ => Err(AppError::NoActiveSession(session.user_id.clone())),
        }
    }

    async fn remove(&self, user_id: &str) -> AppResult<bool> {
        let mut sessions = self.sessions.lock().await;
        evict_expired(&mut sessions, user_id);
        Ok(sessions.remove(user_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candidate;
    use tokio_test::{assert_err, assert_ok};

    fn entry(user: &str, title: &str, tier: SentimentTier) -> RankedEntry {
        RankedEntry::new(
            user,
            &Candidate {
                title_id: title.to_string(),
                media_type: MediaType::Movie,
            },
            tier,
        )
    }

    fn session(user: &str) -> ComparisonSession {
        ComparisonSession::begin(
            user,
            Candidate {
                title_id: "tt1".to_string(),
                media_type: MediaType::Movie,
            },
            SentimentTier::Liked,
            vec![],
        )
    }

    #[tokio::test]
    async fn test_insert_and_list_tier() {
        let store = InMemoryRankingStore::new(ScoreScale::default());
        store
            .insert("u1", SentimentTier::Liked, 0, entry("u1", "a", SentimentTier::Liked))
            .await
            .unwrap();
        let mutation = store
            .insert("u1", SentimentTier::Liked, 1, entry("u1", "b", SentimentTier::Liked))
            .await
            .unwrap();

        assert_eq!(mutation.tier_entries.len(), 2);
        assert_eq!(mutation.entry.unwrap().score, 8.5);

        let listed = store.tier_entries("u1", SentimentTier::Liked).await.unwrap();
        assert_eq!(listed[0].title_id, "a");
        assert_eq!(listed[1].rank_index, 1);
        assert!(store.tier_entries("u2", SentimentTier::Liked).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_remove_leaves_store_untouched() {
        let store = InMemoryRankingStore::new(ScoreScale::default());
        store
            .insert("u1", SentimentTier::Liked, 0, entry("u1", "a", SentimentTier::Liked))
            .await
            .unwrap();

        let err = store.remove("u1", SentimentTier::Liked, "zzz").await.unwrap_err();
        assert!(matches!(err, AppError::EntryNotFound { .. }));
        assert_eq!(store.user_entries("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_all_is_idempotent() {
        let store = InMemoryRankingStore::new(ScoreScale::default());
        for (i, title) in ["a", "b", "c"].iter().enumerate() {
            store
                .insert("u1", SentimentTier::Neutral, i, entry("u1", title, SentimentTier::Neutral))
                .await
                .unwrap();
        }

        assert_eq!(store.remove_all_for_user("u1").await.unwrap().len(), 3);
        assert!(store.remove_all_for_user("u1").await.unwrap().is_empty());
        assert!(store.user_entries("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_title_scores_span_users() {
        let store = InMemoryRankingStore::new(ScoreScale::default());
        store
            .insert("u1", SentimentTier::Liked, 0, entry("u1", "a", SentimentTier::Liked))
            .await
            .unwrap();
        store
            .insert("u2", SentimentTier::Disliked, 0, entry("u2", "a", SentimentTier::Disliked))
            .await
            .unwrap();

        let mut scores: Vec<f64> = store
            .title_scores("a")
            .await
            .unwrap()
            .into_iter()
            .map(|(_, s)| s)
            .collect();
        scores.sort_by(f64::total_cmp);
        assert_eq!(scores, vec![4.0, 10.0]);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_keep_tier_dense() {
        let store = Arc::new(InMemoryRankingStore::new(ScoreScale::default()));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .insert(
                        "u1",
                        SentimentTier::Liked,
                        0,
                        entry("u1", &format!("t{i}"), SentimentTier::Liked),
                    )
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let entries = store.tier_entries("u1", SentimentTier::Liked).await.unwrap();
        let indices: Vec<usize> = entries.iter().map(|e| e.rank_index).collect();
        assert_eq!(indices, (0..16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_aggregate_increment_deletes_at_zero() {
        let store = InMemoryAggregateStore::new();
        store.increment("a", MediaType::Movie, 8.5, 1).await.unwrap();
        let row = store.increment("a", MediaType::Movie, 8.5, 1).await.unwrap().unwrap();
        assert_eq!(row.sum_of_scores, 17.0);
        assert_eq!(row.rating_count, 2);

        store.increment("a", MediaType::Movie, -8.5, -1).await.unwrap();
        assert!(store.increment("a", MediaType::Movie, -8.5, -1).await.unwrap().is_none());
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_create_conflicts() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        assert_ok!(store.create(&session("u1")).await);
        let err = assert_err!(store.create(&session("u1")).await);
        assert!(matches!(err, AppError::SessionConflict { .. }));
        assert_ok!(store.create(&session("u2")).await);
    }

    #[tokio::test]
    async fn test_session_save_requires_same_session() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        let open = session("u1");
        store.create(&open).await.unwrap();
        assert_ok!(store.save(&open).await);
        assert_err!(store.save(&session("u1")).await);
    }

    #[tokio::test]
    async fn test_session_expires_after_ttl() {
        let store = InMemorySessionStore::new(Duration::from_millis(20));
        store.create(&session("u1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.get("u1").await.unwrap().is_none());
        assert_ok!(store.create(&session("u1")).await);
    }

    #[tokio::test]
    async fn test_session_remove_reports_presence() {
        let store = InMemorySessionStore::new(Duration::from_secs(60));
        store.create(&session("u1")).await.unwrap();
        assert!(store.remove("u1").await.unwrap());
        assert!(!store.remove("u1").await.unwrap());
    }
}

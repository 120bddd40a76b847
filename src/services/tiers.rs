use std::collections::{BTreeMap, BTreeSet};

use crate::{
    error::{AppError, AppResult},
    models::{DeltaSet, RankedEntry, SentimentTier},
    services::scoring::ScoreScale,
};

/// Checks that a tier's rank indices are exactly 0..N-1 in order
pub fn check_dense(user_id: &str, tier: SentimentTier, entries: &[RankedEntry]) -> AppResult<()> {
    for (expected, entry) in entries.iter().enumerate() {
        if entry.rank_index != expected {
            return Err(AppError::TierInvariantViolation {
                user_id: user_id.to_string(),
                tier,
                detail: format!(
                    "title {} has rank index {} at position {}",
                    entry.title_id, entry.rank_index, expected
                ),
            });
        }
    }
    Ok(())
}

/// One user's ranked titles, grouped by tier, plus the bookkeeping a store
/// needs to persist a mutation
///
/// Every mutation re-indexes and re-scores each tier it touches and records
/// per-title score deltas for the aggregate service.
#[derive(Debug)]
pub struct UserTiers {
    user_id: String,
    scale: ScoreScale,
    tiers: BTreeMap<SentimentTier, Vec<RankedEntry>>,
    touched: BTreeSet<SentimentTier>,
    removed: BTreeSet<String>,
    pending: DeltaSet,
}

impl UserTiers {
    /// Groups stored entries by tier, repairing any tier whose indices are not dense
    pub fn load(user_id: &str, entries: Vec<RankedEntry>, scale: ScoreScale) -> Self {
        let mut tiers: BTreeMap<SentimentTier, Vec<RankedEntry>> = BTreeMap::new();
        for entry in entries {
            tiers.entry(entry.tier).or_default().push(entry);
        }

        let mut loaded = Self {
            user_id: user_id.to_string(),
            scale,
            tiers: BTreeMap::new(),
            touched: BTreeSet::new(),
            removed: BTreeSet::new(),
            pending: DeltaSet::new(),
        };

        for (tier, mut entries) in tiers {
            entries.sort_by(|a, b| {
                a.rank_index
                    .cmp(&b.rank_index)
                    .then(a.created_at.cmp(&b.created_at))
            });

            if let Err(e) = check_dense(user_id, tier, &entries) {
                tracing::warn!(
                    user_id = %user_id,
                    tier = %tier,
                    error = %e,
                    "Repairing non-dense tier"
                );
                let mut deltas = DeltaSet::new();
                rescore(tier, &mut entries, &scale, &mut deltas);
                loaded.pending.extend(deltas);
                loaded.touched.insert(tier);
            }

            loaded.tiers.insert(tier, entries);
        }

        loaded
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn tier(&self, tier: SentimentTier) -> &[RankedEntry] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find(&self, title_id: &str) -> Option<&RankedEntry> {
        self.tiers
            .values()
            .flat_map(|entries| entries.iter())
            .find(|entry| entry.title_id == title_id)
    }

    /// Whether a load-time repair left changes that still need persisting
    pub fn needs_repair_write(&self) -> bool {
        !self.touched.is_empty()
    }

    /// Places `entry` at `index` in `tier`, replacing any entry the user already
    /// holds for the same title
    ///
    /// The index is clamped to the tier's length. Returns the deltas for every
    /// title whose score moved.
    pub fn insert(&mut self, tier: SentimentTier, index: usize, mut entry: RankedEntry) -> DeltaSet {
        let mut deltas = std::mem::take(&mut self.pending);

        let previous = self
            .find(&entry.title_id)
            .map(|existing| (existing.tier, existing.created_at));
        if let Some((previous_tier, created_at)) = previous {
            // Re-ranking keeps the original creation time
            entry.created_at = created_at;
            self.take_title(previous_tier, &entry.title_id, &mut deltas);
        } else {
            deltas.record(&entry.title_id, entry.media_type, None, None);
        }

        entry.user_id = self.user_id.clone();
        entry.tier = tier;
        self.removed.remove(&entry.title_id);

        let entries = self.tiers.entry(tier).or_default();
        let index = index.min(entries.len());
        entries.insert(index, entry);
        rescore(tier, entries, &self.scale, &mut deltas);
        self.touched.insert(tier);

        deltas
    }

    pub fn remove(&mut self, tier: SentimentTier, title_id: &str) -> AppResult<DeltaSet> {
        let held = self
            .tier(tier)
            .iter()
            .any(|entry| entry.title_id == title_id);
        if !held {
            return Err(AppError::EntryNotFound {
                user_id: self.user_id.clone(),
                title_id: title_id.to_string(),
            });
        }

        let mut deltas = std::mem::take(&mut self.pending);
        self.take_title(tier, title_id, &mut deltas);
        Ok(deltas)
    }

    /// Drops every entry; yields one (stored, none) delta per held title
    ///
    /// Pending repair deltas are merged first so each removal subtracts the
    /// score the aggregate actually holds.
    pub fn remove_all(&mut self) -> DeltaSet {
        let mut deltas = std::mem::take(&mut self.pending);
        for (tier, entries) in std::mem::take(&mut self.tiers) {
            for entry in entries {
                deltas.record(&entry.title_id, entry.media_type, Some(entry.score), None);
                self.removed.insert(entry.title_id);
            }
            self.touched.insert(tier);
        }
        deltas
    }

    /// Entries of every tier changed since load, for the store to write back
    pub fn changed_entries(&self) -> Vec<&RankedEntry> {
        self.touched
            .iter()
            .flat_map(|tier| self.tier(*tier).iter())
            .collect()
    }

    /// Titles deleted since load that must be removed from storage
    pub fn removed_titles(&self) -> Vec<String> {
        self.removed.iter().cloned().collect()
    }

    /// All entries, best tier first, in rank order
    pub fn into_entries(self) -> Vec<RankedEntry> {
        let mut tiers = self.tiers;
        SentimentTier::ALL
            .iter()
            .flat_map(|tier| tiers.remove(tier).unwrap_or_default())
            .collect()
    }

    fn take_title(&mut self, tier: SentimentTier, title_id: &str, deltas: &mut DeltaSet) {
        if let Some(entries) = self.tiers.get_mut(&tier) {
            if let Some(position) = entries.iter().position(|e| e.title_id == title_id) {
                let removed = entries.remove(position);
                deltas.record(&removed.title_id, removed.media_type, Some(removed.score), None);
                rescore(tier, entries, &self.scale, deltas);
                self.removed.insert(removed.title_id);
                self.touched.insert(tier);
            }
        }
    }
}

/// Re-indexes a tier 0..N-1 and recomputes every score from its new position
pub fn rescore(
    tier: SentimentTier,
    entries: &mut [RankedEntry],
    scale: &ScoreScale,
    deltas: &mut DeltaSet,
) {
    let size = entries.len();
    for (index, entry) in entries.iter_mut().enumerate() {
        let old_score = entry.score;
        entry.rank_index = index;
        entry.tier = tier;
        entry.score = scale.score(tier, index, size);
        deltas.record(&entry.title_id, entry.media_type, Some(old_score), Some(entry.score));
    }
}

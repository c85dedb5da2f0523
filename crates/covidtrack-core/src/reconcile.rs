//! Reconciliation of the three feeds into per-location records.
//!
//! The INFECTED feed enumerates the locations of a cycle. For each of them
//! the stored record is loaded (or created), its INFECTED series replaced,
//! and the DEAD/RECOVERED series taken from the first row with an equal
//! key. A location missing from a loaded DEAD or RECOVERED feed gets a
//! zero-filled series when it has none yet and keeps its stored one
//! otherwise. A feed that failed this cycle touches no series, so its
//! per-kind ingestion time does not advance. Locations that
//! appear only in DEAD or RECOVERED are not reconciled; they are counted in
//! the cycle report.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::FeedSource;
use crate::cache::LocationStore;
use crate::error::Result;
use crate::models::{FeedRow, LocationKey, LocationRecord, MetricKind, MetricSeries};
use crate::parser::FeedParser;

/// Parsed rows of one cycle, one list per kind.
#[derive(Debug, Clone, Default)]
pub struct Feeds {
    pub infected: Vec<FeedRow>,
    pub dead: Vec<FeedRow>,
    pub recovered: Vec<FeedRow>,
    /// Kinds whose feed could not be fetched or parsed this cycle.
    pub unavailable: Vec<MetricKind>,
}

impl Feeds {
    pub fn get(&self, kind: MetricKind) -> &[FeedRow] {
        match kind {
            MetricKind::Infected => &self.infected,
            MetricKind::Dead => &self.dead,
            MetricKind::Recovered => &self.recovered,
        }
    }

    pub fn is_available(&self, kind: MetricKind) -> bool {
        !self.unavailable.contains(&kind)
    }

    fn set(&mut self, kind: MetricKind, rows: Vec<FeedRow>) {
        match kind {
            MetricKind::Infected => self.infected = rows,
            MetricKind::Dead => self.dead = rows,
            MetricKind::Recovered => self.recovered = rows,
        }
    }
}

/// How one feed fared during a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeedOutcome {
    Loaded { kind: MetricKind, rows: usize },
    Failed { kind: MetricKind, reason: String },
}

impl FeedOutcome {
    pub fn kind(&self) -> MetricKind {
        match self {
            FeedOutcome::Loaded { kind, .. } | FeedOutcome::Failed { kind, .. } => *kind,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FeedOutcome::Failed { .. })
    }
}

/// Summary of one reconciliation cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub feeds: Vec<FeedOutcome>,
    pub created: usize,
    pub updated: usize,
    /// Keys seen in DEAD or RECOVERED but not in INFECTED.
    pub orphaned: Vec<LocationKey>,
}

impl CycleReport {
    pub fn reconciled(&self) -> usize {
        self.created + self.updated
    }

    pub fn degraded(&self) -> bool {
        self.feeds.iter().any(FeedOutcome::is_failed)
    }
}

/// What a DEAD or RECOVERED feed says about one location this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Companion<'a> {
    /// The feed loaded and has a row for the location.
    Row(&'a FeedRow),
    /// The feed loaded without a row for the location.
    Absent,
    /// The feed failed this cycle.
    Unavailable,
}

impl<'a> Companion<'a> {
    fn lookup(
        feeds: &Feeds,
        kind: MetricKind,
        index: &HashMap<&LocationKey, &'a FeedRow>,
        key: &LocationKey,
    ) -> Self {
        if !feeds.is_available(kind) {
            return Companion::Unavailable;
        }
        match index.get(key) {
            Some(&row) => Companion::Row(row),
            None => Companion::Absent,
        }
    }
}

/// Merge one cycle's rows for a location into its prior record.
pub fn merge_record(
    prior: Option<LocationRecord>,
    infected: &FeedRow,
    dead: Companion<'_>,
    recovered: Companion<'_>,
    now: DateTime<Utc>,
) -> LocationRecord {
    let mut record = prior.unwrap_or_else(|| LocationRecord::new(infected.key.clone()));
    record.key = infected.key.clone();
    record.set(
        MetricKind::Infected,
        MetricSeries::from_counts(infected.counts.clone(), now),
    );

    let history = infected.counts.len();
    for (kind, row) in [(MetricKind::Dead, dead), (MetricKind::Recovered, recovered)] {
        match row {
            Companion::Row(row) => {
                record.set(kind, MetricSeries::from_counts(row.counts.clone(), now))
            }
            // No row in a loaded feed means nothing reported, not unknown
            Companion::Absent if record.get(kind).is_none() => {
                record.set(kind, MetricSeries::zero_filled(history, now))
            }
            Companion::Absent | Companion::Unavailable => {}
        }
    }

    record.updated_on = Some(now);
    record
}

/// First row per key, in feed order.
fn first_match_index(rows: &[FeedRow]) -> HashMap<&LocationKey, &FeedRow> {
    let mut index = HashMap::with_capacity(rows.len());
    for row in rows {
        index.entry(&row.key).or_insert(row);
    }
    index
}

pub struct Reconciler {
    store: Arc<dyn LocationStore>,
    parser: FeedParser,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LocationStore>, parser: FeedParser) -> Self {
        Self { store, parser }
    }

    /// Fetch and parse all three feeds concurrently. A feed that cannot be
    /// fetched or parsed degrades to an empty list.
    pub async fn collect(&self, source: &dyn FeedSource) -> (Feeds, Vec<FeedOutcome>) {
        let (infected, dead, recovered) = tokio::join!(
            source.fetch(MetricKind::Infected),
            source.fetch(MetricKind::Dead),
            source.fetch(MetricKind::Recovered),
        );

        let mut feeds = Feeds::default();
        let mut outcomes = Vec::with_capacity(MetricKind::ALL.len());

        for (kind, fetched) in MetricKind::ALL.into_iter().zip([infected, dead, recovered]) {
            let parsed = match fetched {
                Ok(text) => self.parser.parse_feed(&text).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match parsed {
                Ok(rows) => {
                    debug!(feed = %kind, rows = rows.len(), "Feed parsed");
                    outcomes.push(FeedOutcome::Loaded { kind, rows: rows.len() });
                    feeds.set(kind, rows);
                }
                Err(reason) => {
                    warn!(feed = %kind, error = %reason, "Feed unavailable, treating as empty this cycle");
                    outcomes.push(FeedOutcome::Failed { kind, reason });
                    feeds.unavailable.push(kind);
                }
            }
        }

        (feeds, outcomes)
    }

    /// Merge parsed feeds into the store. Returns (created, updated, orphaned).
    pub async fn reconcile(
        &self,
        feeds: &Feeds,
        now: DateTime<Utc>,
    ) -> Result<(usize, usize, Vec<LocationKey>)> {
        let dead = first_match_index(&feeds.dead);
        let recovered = first_match_index(&feeds.recovered);

        let mut merged = Vec::with_capacity(feeds.infected.len());
        for row in &feeds.infected {
            let prior = self.store.find(&row.key).await?;
            let record = merge_record(
                prior,
                row,
                Companion::lookup(feeds, MetricKind::Dead, &dead, &row.key),
                Companion::lookup(feeds, MetricKind::Recovered, &recovered, &row.key),
                now,
            );
            debug!(location = %record.key, "Merged location record");
            merged.push(record);
        }

        let total = merged.len();
        let created = self.store.upsert_many(merged).await?;
        let updated = total - created;

        let anchored: HashSet<&LocationKey> = feeds.infected.iter().map(|r| &r.key).collect();
        let mut seen = HashSet::new();
        let orphaned: Vec<LocationKey> = feeds
            .dead
            .iter()
            .chain(&feeds.recovered)
            .map(|r| &r.key)
            .filter(|key| !anchored.contains(key) && seen.insert(*key))
            .cloned()
            .collect();

        if !orphaned.is_empty() {
            warn!(
                count = orphaned.len(),
                first = %orphaned[0],
                "Locations without an INFECTED row were not reconciled"
            );
        }

        Ok((created, updated, orphaned))
    }

    /// One full fetch-parse-merge-persist pass.
    pub async fn run(&self, source: &dyn FeedSource) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!("Starting reconciliation cycle");

        let (feeds, outcomes) = self.collect(source).await;
        if feeds.infected.is_empty() {
            warn!("INFECTED feed is empty, no locations will be reconciled this cycle");
        }

        let (created, updated, orphaned) = self.reconcile(&feeds, started_at).await?;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            feeds: outcomes,
            created,
            updated,
            orphaned,
        };
        info!(
            created = report.created,
            updated = report.updated,
            orphaned = report.orphaned.len(),
            degraded = report.degraded(),
            "Reconciliation cycle complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;

    fn row(state: &str, region: &str, counts: &[u64]) -> FeedRow {
        FeedRow {
            key: LocationKey::new(state, region),
            counts: counts.to_vec(),
        }
    }

    #[test]
    fn test_merge_italy_scenario() {
        let now = Utc::now();
        let infected = row("", "Italy", &[0, 1, 3]);
        let recovered = row("", "Italy", &[0, 0, 1]);

        let record = merge_record(
            None,
            &infected,
            Companion::Absent,
            Companion::Row(&recovered),
            now,
        );

        let infected = record.get(MetricKind::Infected).unwrap();
        assert_eq!(infected.latest_count, 3);
        assert_eq!(infected.difference_since_previous_day().unwrap(), 2);

        let dead = record.get(MetricKind::Dead).unwrap();
        assert_eq!(dead.latest_count, 0);
        assert_eq!(dead.past_counts, vec![0, 0, 0]);
        assert_eq!(dead.difference_since_previous_day().unwrap(), 0);

        let recovered = record.get(MetricKind::Recovered).unwrap();
        assert_eq!(recovered.latest_count, 1);
        assert_eq!(recovered.difference_since_previous_day().unwrap(), 1);

        assert_eq!(record.updated_on, Some(now));
    }

    #[test]
    fn test_merge_keeps_prior_series_when_feed_row_missing() {
        let earlier = Utc::now() - chrono::Duration::hours(12);
        let mut prior = LocationRecord::new(LocationKey::new("", "Italy"));
        prior.set(MetricKind::Dead, MetricSeries::from_counts(vec![0, 2], earlier));

        let now = Utc::now();
        let record = merge_record(
            Some(prior),
            &row("", "Italy", &[1, 4, 9]),
            Companion::Absent,
            Companion::Absent,
            now,
        );

        let dead = record.get(MetricKind::Dead).unwrap();
        assert_eq!(dead.past_counts, vec![0, 2]);
        assert_eq!(dead.updated_on, earlier);
        assert_eq!(record.get(MetricKind::Recovered).unwrap().past_counts, vec![0, 0, 0]);
    }

    #[test]
    fn test_merge_leaves_failed_feed_series_untouched() {
        let earlier = Utc::now() - chrono::Duration::hours(30);
        let mut prior = LocationRecord::new(LocationKey::new("", "Italy"));
        prior.set(MetricKind::Recovered, MetricSeries::from_counts(vec![0, 1], earlier));

        let now = Utc::now();
        let record = merge_record(
            Some(prior),
            &row("", "Italy", &[1, 4, 9]),
            Companion::Unavailable,
            Companion::Unavailable,
            now,
        );

        // Never ingested: stays unset instead of a zero series stamped `now`
        assert!(record.get(MetricKind::Dead).is_none());
        assert_eq!(record.get(MetricKind::Recovered).unwrap().updated_on, earlier);
        assert_eq!(record.get(MetricKind::Infected).unwrap().updated_on, now);
    }

    #[test]
    fn test_first_match_wins() {
        let rows = vec![row("", "Italy", &[1]), row("", "Italy", &[2])];
        let index = first_match_index(&rows);
        assert_eq!(index[&LocationKey::new("", "Italy")].counts, vec![1]);
    }

    #[tokio::test]
    async fn test_reconcile_exact_matching_and_orphans() {
        let store = Arc::new(MemoryStore::new());
        let reconciler = Reconciler::new(store.clone(), FeedParser::default());

        let feeds = Feeds {
            infected: vec![row("", "Italy", &[0, 1, 3]), row("Hubei", "China", &[5, 7])],
            // Case differs, so this must not match Italy
            dead: vec![row("", "italy", &[0, 1, 1]), row("Hubei", "China", &[1, 2])],
            recovered: vec![row("", "Atlantis", &[0, 1])],
            ..Feeds::default()
        };

        let (created, updated, orphaned) = reconciler.reconcile(&feeds, Utc::now()).await.unwrap();
        assert_eq!((created, updated), (2, 0));
        assert_eq!(
            orphaned,
            vec![LocationKey::new("", "italy"), LocationKey::new("", "Atlantis")]
        );

        let italy = store.find(&LocationKey::new("", "Italy")).await.unwrap().unwrap();
        assert_eq!(italy.latest(MetricKind::Dead), 0);
        let hubei = store.find(&LocationKey::new("Hubei", "China")).await.unwrap().unwrap();
        assert_eq!(hubei.latest(MetricKind::Dead), 2);
        assert_eq!(hubei.get(MetricKind::Recovered).unwrap().past_counts, vec![0, 0]);

        // Only INFECTED anchors a record
        assert!(store.find(&LocationKey::new("", "Atlantis")).await.unwrap().is_none());
    }
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use snafu::OptionExt;

use crate::config::*;
use crate::registry::RegionRegistry;
use crate::tally::compute_tally;

/// The snapshots produced so far, keyed by date, each with its tally.
///
/// The tally is always computed from the snapshot when it is added.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct History {
    entries: BTreeMap<NaiveDate, (Snapshot, Tally)>,
}

impl History {
    pub fn new() -> History {
        History::default()
    }

    /// Adds a snapshot, replacing any previous snapshot for the same date.
    pub fn push(&mut self, snapshot: Snapshot, registry: &RegionRegistry) -> ForecastResult<Tally> {
        let tally = compute_tally(&snapshot, registry)?;
        if self.entries.contains_key(&snapshot.date()) {
            debug!("History::push: replacing snapshot for {}", snapshot.date());
        }
        self.entries.insert(snapshot.date(), (snapshot, tally));
        Ok(tally)
    }

    pub fn get(&self, date: NaiveDate) -> ForecastResult<(&Snapshot, &Tally)> {
        self.entries
            .get(&date)
            .map(|(s, t)| (s, t))
            .context(MissingStateSnafu { date })
    }

    /// The two most recent entries, oldest first.
    #[allow(clippy::type_complexity)]
    pub fn latest_pair(&self) -> ForecastResult<((&Snapshot, &Tally), (&Snapshot, &Tally))> {
        let mut latest = self.entries.values().rev();
        match (latest.next(), latest.next()) {
            (Some((cur_s, cur_t)), Some((prev_s, prev_t))) => Ok(((prev_s, prev_t), (cur_s, cur_t))),
            _ => InsufficientHistorySnafu {
                available: self.entries.len(),
            }
            .fail(),
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use chrono::{Duration, NaiveDate};
use log::{debug, info, warn};
use snafu::Snafu;

use crate::builder::SnapshotBuilder;
use crate::config::*;
use crate::registry::{Region, RegionRegistry};

/// A failure of the retrieval collaborator. The aggregator retries it a bounded
/// number of times, then treats the stage as having no data.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("poll retrieval failed: {message}"))]
pub struct FetchError {
    message: String,
}

impl FetchError {
    pub fn new(message: &str) -> FetchError {
        FetchError {
            message: message.to_string(),
        }
    }
}

/// What the aggregator asks the retrieval collaborator for.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PollQuery {
    pub region: String,
    pub pairing: Pairing,
    /// First day of the window, inclusive.
    pub since: NaiveDate,
    /// Last day of the window, inclusive.
    pub until: NaiveDate,
}

/// The retrieval collaborator.
///
/// Implementations return the polls of one region for the requested pairing. They
/// may return polls outside of the window or an empty list: the aggregator does its
/// own filtering.
pub trait PollSource {
    fn fetch(&mut self, query: &PollQuery) -> Result<Vec<RawPoll>, FetchError>;
}

// One step of the escalation chain.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum Stage {
    // Average all the polls of the window, most recent poll on a tie.
    Average { weeks: u32 },
    // Most recent decisive poll of the window.
    FirstOnly { weeks: u32, pairing: Pairing },
    Historical,
}

impl Stage {
    fn provenance(&self) -> Provenance {
        match self {
            Stage::Average { .. }
            | Stage::FirstOnly {
                pairing: Pairing::Primary,
                ..
            } => Provenance::Primary,
            Stage::FirstOnly {
                pairing: Pairing::Secondary,
                ..
            } => Provenance::SecondaryCandidateFallback,
            Stage::Historical => Provenance::HistoricalFallback,
        }
    }
}

// The chain is finite: the doubling stops at the cap, and the chain always
// finishes with the historical baseline. The last window never exceeds the cap.
fn escalation_chain(rules: &AggregationRules) -> Vec<Stage> {
    let mut stages: Vec<Stage> = Vec::new();
    let cap = rules.max_window_weeks.max(1);
    let mut weeks = rules.initial_window_weeks.clamp(1, cap);
    loop {
        stages.push(Stage::Average { weeks });
        if weeks >= cap {
            break;
        }
        weeks = weeks.saturating_mul(2).min(cap);
    }
    stages.push(Stage::FirstOnly {
        weeks: rules.lookback_weeks,
        pairing: Pairing::Primary,
    });
    stages.push(Stage::FirstOnly {
        weeks: rules.lookback_weeks,
        pairing: Pairing::Secondary,
    });
    stages.push(Stage::Historical);
    stages
}

/// Resolves the prediction of one region as of `today`.
///
/// This never fails: when no stage of the chain finds a decisive poll, the
/// historical baseline of the region is returned.
pub fn aggregate_region<S: PollSource + ?Sized>(
    source: &mut S,
    region: &Region,
    today: NaiveDate,
    labels: &CandidateLabels,
    rules: &AggregationRules,
) -> StatePollingRecord {
    for stage in escalation_chain(rules) {
        let lead: Option<Lead> = match stage {
            Stage::Average { weeks } => {
                let polls = fetch_window(source, region, Pairing::Primary, today, weeks, rules);
                let res = average_polls(&polls, labels, Pairing::Primary);
                if res.is_none() {
                    debug!(
                        "aggregate_region: {}: no decisive polling in the last {} week(s)",
                        region.key, weeks
                    );
                }
                res
            }
            Stage::FirstOnly { weeks, pairing } => {
                let polls = fetch_window(source, region, pairing, today, weeks, rules);
                first_decisive_poll(&polls, labels, pairing)
            }
            Stage::Historical => {
                warn!(
                    "aggregate_region: {}: no decisive polling found, using the historical baseline",
                    region.key
                );
                Some(region.baseline)
            }
        };
        if let Some(lead) = lead {
            let record = StatePollingRecord {
                region: region.key.clone(),
                lead,
                provenance: stage.provenance(),
            };
            info!(
                "aggregate_region: {}: {:?} leads by {} ({:?} via {:?})",
                region.key,
                lead.leader,
                lead.margin,
                record.provenance,
                stage
            );
            return record;
        }
    }
    // The chain ends with the historical stage, which always resolves.
    StatePollingRecord {
        region: region.key.clone(),
        lead: region.baseline,
        provenance: Provenance::HistoricalFallback,
    }
}

/// Resolves every region of the registry and assembles the snapshot of `today`.
pub fn aggregate_snapshot<S: PollSource + ?Sized>(
    source: &mut S,
    registry: &RegionRegistry,
    today: NaiveDate,
    labels: &CandidateLabels,
    rules: &AggregationRules,
) -> ForecastResult<Snapshot> {
    info!(
        "aggregate_snapshot: processing {} regions as of {}",
        registry.len(),
        today
    );
    let mut builder = SnapshotBuilder::new(registry, today);
    for region in registry.regions() {
        let record = aggregate_region(source, region, today, labels, rules);
        builder.add_record(record)?;
    }
    builder.build()
}

// Queries the source, retrying failures a bounded number of times.
// The polls returned are restricted to the window and sorted most recent first.
fn fetch_window<S: PollSource + ?Sized>(
    source: &mut S,
    region: &Region,
    pairing: Pairing,
    today: NaiveDate,
    weeks: u32,
    rules: &AggregationRules,
) -> Vec<RawPoll> {
    let query = PollQuery {
        region: region.key.clone(),
        pairing,
        since: today - Duration::weeks(weeks as i64),
        until: today,
    };
    let max_attempts = rules.max_fetch_attempts.max(1);
    let mut attempt = 0;
    while attempt < max_attempts {
        attempt += 1;
        match source.fetch(&query) {
            Ok(polls) => return filter_window(polls, &query),
            Err(e) => {
                warn!(
                    "fetch_window: {}: attempt {}/{} failed: {}",
                    region.key, attempt, max_attempts, e
                );
            }
        }
    }
    warn!(
        "fetch_window: {}: giving up on {:?} polling for the last {} week(s)",
        region.key, pairing, weeks
    );
    Vec::new()
}

fn filter_window(polls: Vec<RawPoll>, query: &PollQuery) -> Vec<RawPoll> {
    let mut res: Vec<RawPoll> = polls
        .into_iter()
        .filter(|p| p.date >= query.since && p.date <= query.until)
        .collect();
    // Stable: polls of the same day keep the order of the source.
    res.sort_by(|p1, p2| p2.date.cmp(&p1.date));
    res
}

// The polls that qualify for the pairing, with their resolved leader.
// A dead heat qualifies with no leader. Negative or non-finite margins never qualify.
fn qualifying<'p>(
    polls: &'p [RawPoll],
    labels: &'p CandidateLabels,
    pairing: Pairing,
) -> impl Iterator<Item = (Option<Candidate>, &'p RawPoll)> + 'p {
    polls.iter().filter_map(move |p| {
        if !(p.margin.is_finite() && p.margin >= 0.0) {
            warn!("qualifying: skipping poll of {} with margin {}", p.date, p.margin);
            return None;
        }
        match p.leader.as_deref() {
            None | Some("") => Some((None, p)),
            Some(label) => labels.resolve(label, pairing).map(|c| (Some(c), p)),
        }
    })
}

/// The most recent poll with a leader, verbatim.
pub(crate) fn first_decisive_poll(
    polls: &[RawPoll],
    labels: &CandidateLabels,
    pairing: Pairing,
) -> Option<Lead> {
    qualifying(polls, labels, pairing).find_map(|(leader, p)| leader.map(|c| Lead::new(c, p.margin)))
}

/// Averages the signed margins of the polls.
///
/// If the average is an exact tie, the most recent decisive poll wins.
pub(crate) fn average_polls(
    polls: &[RawPoll],
    labels: &CandidateLabels,
    pairing: Pairing,
) -> Option<Lead> {
    let mut signed_total: f64 = 0.0;
    let mut polls_counted: u32 = 0;
    for (leader, p) in qualifying(polls, labels, pairing) {
        polls_counted += 1;
        match leader {
            Some(Candidate::B) => signed_total += p.margin,
            Some(Candidate::A) => signed_total -= p.margin,
            None => {}
        }
    }
    if polls_counted == 0 {
        return None;
    }
    match Lead::from_signed(signed_total) {
        Some(lead) => Some(Lead::new(lead.leader, lead.margin / polls_counted as f64)),
        None => {
            debug!(
                "average_polls: tie after averaging {} poll(s), using the most recent one",
                polls_counted
            );
            first_decisive_poll(polls, labels, pairing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn labels() -> CandidateLabels {
        CandidateLabels::new("X", "Y", "Z")
    }

    fn poll(date: &str, leader: &str, margin: f64) -> RawPoll {
        RawPoll {
            date: d(date),
            leader: if leader.is_empty() {
                None
            } else {
                Some(leader.to_string())
            },
            margin,
        }
    }

    fn region() -> Region {
        Region {
            key: "ohio".to_string(),
            weight: 17,
            baseline: Lead::new(Candidate::A, 8.0),
        }
    }

    // A fake collaborator holding polls per pairing, failing a fixed number of times first.
    struct FakeSource {
        polls: HashMap<Pairing, Vec<RawPoll>>,
        failures_left: u32,
        calls: Vec<PollQuery>,
    }

    impl FakeSource {
        fn new(primary: Vec<RawPoll>, secondary: Vec<RawPoll>) -> FakeSource {
            let mut polls = HashMap::new();
            polls.insert(Pairing::Primary, primary);
            polls.insert(Pairing::Secondary, secondary);
            FakeSource {
                polls,
                failures_left: 0,
                calls: Vec::new(),
            }
        }
    }

    impl PollSource for FakeSource {
        fn fetch(&mut self, query: &PollQuery) -> Result<Vec<RawPoll>, FetchError> {
            self.calls.push(query.clone());
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(FetchError::new("stale page"));
            }
            Ok(self.polls.get(&query.pairing).cloned().unwrap_or_default())
        }
    }

    #[test]
    fn chain_doubles_up_to_the_cap() {
        let stages = escalation_chain(&AggregationRules::DEFAULT_RULES);
        let weeks: Vec<u32> = stages
            .iter()
            .filter_map(|s| match s {
                Stage::Average { weeks } => Some(*weeks),
                _ => None,
            })
            .collect();
        assert_eq!(weeks, vec![1, 2, 4, 8, 16]);
        assert_eq!(stages.len(), 8);
        assert_eq!(stages.last(), Some(&Stage::Historical));
    }

    #[test]
    fn last_window_stops_at_the_cap() {
        let rules = AggregationRules {
            max_window_weeks: 10,
            lookback_weeks: 12,
            ..AggregationRules::DEFAULT_RULES
        };
        let weeks: Vec<u32> = escalation_chain(&rules)
            .iter()
            .filter_map(|s| match s {
                Stage::Average { weeks } => Some(*weeks),
                _ => None,
            })
            .collect();
        assert_eq!(weeks, vec![1, 2, 4, 8, 10]);
    }

    #[test]
    fn invalid_margins_do_not_qualify() {
        let polls = vec![
            poll("2024-09-10", "Y", -4.0),
            poll("2024-09-09", "X", f64::NAN),
            poll("2024-09-08", "X", 2.0),
        ];
        assert_eq!(
            first_decisive_poll(&polls, &labels(), Pairing::Primary),
            Some(Lead::new(Candidate::A, 2.0))
        );
        assert_eq!(
            average_polls(&polls, &labels(), Pairing::Primary),
            Some(Lead::new(Candidate::A, 2.0))
        );
    }

    #[test]
    fn average_of_the_week() {
        let polls = vec![
            poll("2024-09-10", "Y", 4.0),
            poll("2024-09-09", "X", 1.0),
            poll("2024-09-08", "", 0.0),
        ];
        let lead = average_polls(&polls, &labels(), Pairing::Primary).unwrap();
        assert_eq!(lead.leader, Candidate::B);
        // The dead heat counts in the denominator.
        assert_eq!(lead.margin, 1.0);
    }

    #[test]
    fn tie_goes_to_the_most_recent_poll() {
        let polls = vec![poll("2024-09-10", "X", 3.0), poll("2024-09-09", "Y", 3.0)];
        let lead = average_polls(&polls, &labels(), Pairing::Primary).unwrap();
        assert_eq!(lead, Lead::new(Candidate::A, 3.0));
    }

    #[test]
    fn only_dead_heats_give_nothing() {
        let polls = vec![poll("2024-09-10", "", 0.0)];
        assert_eq!(average_polls(&polls, &labels(), Pairing::Primary), None);
        assert_eq!(first_decisive_poll(&polls, &labels(), Pairing::Primary), None);
    }

    #[test]
    fn foreign_labels_do_not_qualify() {
        let polls = vec![poll("2024-09-10", "Z", 5.0), poll("2024-09-09", "X", 2.0)];
        assert_eq!(
            average_polls(&polls, &labels(), Pairing::Primary),
            Some(Lead::new(Candidate::A, 2.0))
        );
        assert_eq!(
            first_decisive_poll(&polls, &labels(), Pairing::Secondary),
            Some(Lead::new(Candidate::B, 5.0))
        );
    }

    #[test]
    fn widening_window_finds_older_polls() {
        let mut src = FakeSource::new(vec![poll("2024-08-20", "Y", 6.0)], vec![]);
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(rec.lead, Lead::new(Candidate::B, 6.0));
        assert_eq!(rec.provenance, Provenance::Primary);
        // 1 and 2 weeks were empty, 4 weeks found the poll.
        assert_eq!(src.calls.len(), 3);
        assert_eq!(src.calls[2].since, d("2024-08-13"));
    }

    #[test]
    fn year_long_first_only_search() {
        let polls = vec![poll("2024-01-20", "X", 2.0), poll("2024-02-20", "Y", 9.0)];
        let mut src = FakeSource::new(polls, vec![]);
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        // The most recent poll, not the average.
        assert_eq!(rec.lead, Lead::new(Candidate::B, 9.0));
        assert_eq!(rec.provenance, Provenance::Primary);
    }

    #[test]
    fn secondary_candidate_fallback() {
        let mut src = FakeSource::new(vec![], vec![poll("2024-03-01", "Z", 2.5)]);
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(rec.lead, Lead::new(Candidate::B, 2.5));
        assert_eq!(rec.provenance, Provenance::SecondaryCandidateFallback);
    }

    #[test]
    fn historical_fallback() {
        let mut src = FakeSource::new(
            vec![poll("2022-01-01", "Y", 3.0)],
            vec![poll("2023-01-01", "Z", 3.0)],
        );
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(rec.lead, Lead::new(Candidate::A, 8.0));
        assert_eq!(rec.provenance, Provenance::HistoricalFallback);
    }

    #[test]
    fn transient_failures_are_retried() {
        let mut src = FakeSource::new(vec![poll("2024-09-09", "X", 1.5)], vec![]);
        src.failures_left = 2;
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(rec.lead, Lead::new(Candidate::A, 1.5));
        assert_eq!(src.calls.len(), 3);
    }

    #[test]
    fn persistent_failures_fall_through_to_the_baseline() {
        let mut src = FakeSource::new(vec![poll("2024-09-09", "X", 1.5)], vec![]);
        src.failures_left = u32::MAX;
        let rules = AggregationRules::DEFAULT_RULES;
        let rec = aggregate_region(&mut src, &region(), d("2024-09-10"), &labels(), &rules);
        assert_eq!(rec.provenance, Provenance::HistoricalFallback);
        // Every stage except the historical one gave up after the maximum attempts.
        assert_eq!(src.calls.len(), 7 * rules.max_fetch_attempts as usize);
    }

    #[test]
    fn future_polls_are_ignored() {
        let mut src = FakeSource::new(vec![poll("2024-09-11", "Y", 7.0)], vec![]);
        let rec = aggregate_region(
            &mut src,
            &region(),
            d("2024-09-10"),
            &labels(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(rec.provenance, Provenance::HistoricalFallback);
    }
}

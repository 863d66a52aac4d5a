use chrono::NaiveDate;
use log::debug;
use snafu::OptionExt;

use crate::config::*;
use crate::history::History;

/// Which way a lead moved.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SwingDirection {
    Dropped,
    Increased,
}

/// A reportable difference between two consecutive snapshots.
#[derive(PartialEq, Debug, Clone)]
pub enum ChangeEvent {
    /// The leader of a region changed.
    LeaderFlip {
        region: String,
        from: Lead,
        to: Lead,
    },
    /// The leader stayed the same but the margin moved by more than the threshold,
    /// relative to the old margin.
    SignificantSwing {
        region: String,
        leader: Candidate,
        old_margin: f64,
        new_margin: f64,
        direction: SwingDirection,
    },
    /// The region moved between fallback tiers. Only four transitions are reported:
    /// historical to secondary, secondary to historical, secondary to primary and
    /// historical to primary.
    ProvenanceShift {
        region: String,
        from: Provenance,
        to: Provenance,
    },
    /// The number of electors resolved through a fallback tier changed.
    FallbackElectorsChanged {
        provenance: Provenance,
        old: u32,
        new: u32,
    },
    CandidateTotalChanged {
        candidate: Candidate,
        old: u32,
        new: u32,
    },
    /// Neither candidate total moved.
    TotalsUnchanged,
    OverallLeaderFlip {
        from: Outcome,
        to: Outcome,
    },
}

/// All the changes between two dates.
#[derive(PartialEq, Debug, Clone)]
pub struct ChangeReport {
    pub previous_date: NaiveDate,
    pub current_date: NaiveDate,
    pub events: Vec<ChangeEvent>,
}

fn is_notable_shift(from: Provenance, to: Provenance) -> bool {
    use Provenance::*;
    matches!(
        (from, to),
        (HistoricalFallback, SecondaryCandidateFallback)
            | (SecondaryCandidateFallback, HistoricalFallback)
            | (SecondaryCandidateFallback, Primary)
            | (HistoricalFallback, Primary)
    )
}

// Relative movement of a margin that kept the same leader.
// A zero old margin skips the check.
fn swing(old_margin: f64, new_margin: f64, threshold: f64) -> Option<SwingDirection> {
    if old_margin <= 0.0 {
        return None;
    }
    let relative = (new_margin - old_margin).abs() / old_margin;
    if relative <= threshold {
        return None;
    }
    if new_margin < old_margin {
        Some(SwingDirection::Dropped)
    } else {
        Some(SwingDirection::Increased)
    }
}

/// Compares two chronologically ordered (snapshot, tally) pairs.
pub fn detect_changes(
    previous: (&Snapshot, &Tally),
    current: (&Snapshot, &Tally),
    threshold: f64,
) -> ForecastResult<ChangeReport> {
    let (prev_snap, prev_tally) = previous;
    let (cur_snap, cur_tally) = current;
    let mut events: Vec<ChangeEvent> = Vec::new();

    for old in prev_snap.records() {
        let new = cur_snap.record(&old.region).context(MissingRegionSnafu {
            region: old.region.clone(),
            date: cur_snap.date(),
        })?;
        if old.leader() != new.leader() {
            events.push(ChangeEvent::LeaderFlip {
                region: old.region.clone(),
                from: old.lead,
                to: new.lead,
            });
        } else if let Some(direction) = swing(old.margin(), new.margin(), threshold) {
            events.push(ChangeEvent::SignificantSwing {
                region: old.region.clone(),
                leader: old.leader(),
                old_margin: old.margin(),
                new_margin: new.margin(),
                direction,
            });
        }
        if is_notable_shift(old.provenance, new.provenance) {
            events.push(ChangeEvent::ProvenanceShift {
                region: old.region.clone(),
                from: old.provenance,
                to: new.provenance,
            });
        }
    }

    for provenance in [
        Provenance::SecondaryCandidateFallback,
        Provenance::HistoricalFallback,
    ] {
        let (old, new) = (
            prev_tally.electors_via(provenance),
            cur_tally.electors_via(provenance),
        );
        if old != new {
            events.push(ChangeEvent::FallbackElectorsChanged { provenance, old, new });
        }
    }

    for candidate in [Candidate::B, Candidate::A] {
        let (old, new) = (prev_tally.votes_for(candidate), cur_tally.votes_for(candidate));
        if old != new {
            events.push(ChangeEvent::CandidateTotalChanged { candidate, old, new });
        }
    }
    if prev_tally.candidate_a == cur_tally.candidate_a
        && prev_tally.candidate_b == cur_tally.candidate_b
    {
        events.push(ChangeEvent::TotalsUnchanged);
    }

    if prev_tally.leader() != cur_tally.leader() {
        events.push(ChangeEvent::OverallLeaderFlip {
            from: prev_tally.leader(),
            to: cur_tally.leader(),
        });
    }

    debug!(
        "detect_changes: {} -> {}: {} event(s)",
        prev_snap.date(),
        cur_snap.date(),
        events.len()
    );
    Ok(ChangeReport {
        previous_date: prev_snap.date(),
        current_date: cur_snap.date(),
        events,
    })
}

/// The changes between the two most recent entries of the history.
pub fn what_changed(history: &History, threshold: f64) -> ForecastResult<ChangeReport> {
    let (previous, current) = history.latest_pair()?;
    detect_changes(previous, current, threshold)
}

// ******** Narrative *********

/// `new-hampshire` -> `New Hampshire`
pub fn display_region(key: &str) -> String {
    key.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Margins print with one decimal, unless they are whole numbers.
pub fn display_margin(margin: f64) -> String {
    if margin.fract() == 0.0 {
        format!("{}", margin as i64)
    } else {
        format!("{:.1}", margin)
    }
}

fn display_outcome(outcome: Outcome, labels: &CandidateLabels) -> String {
    match outcome {
        Outcome::Leading(c) => labels.label(c).to_string(),
        Outcome::Tie => "a tie".to_string(),
    }
}

fn display_source(provenance: Provenance, labels: &CandidateLabels) -> String {
    match provenance {
        Provenance::Primary => format!("{} polling", labels.candidate_b),
        Provenance::SecondaryCandidateFallback => {
            format!("{} polling", labels.secondary_candidate_b)
        }
        Provenance::HistoricalFallback => "the historical baseline".to_string(),
    }
}

impl ChangeEvent {
    /// One line of narrative for this event.
    pub fn narrate(&self, labels: &CandidateLabels) -> String {
        match self {
            ChangeEvent::LeaderFlip { region, from, to } => format!(
                "{} changed from {} (with a {} point lead) to {} (with a {} point lead)",
                display_region(region),
                labels.label(from.leader),
                display_margin(from.margin),
                labels.label(to.leader),
                display_margin(to.margin)
            ),
            ChangeEvent::SignificantSwing {
                region,
                leader,
                old_margin,
                new_margin,
                direction,
            } => format!(
                "{}'s lead in {} {} from {} to {}",
                labels.label(*leader),
                display_region(region),
                match direction {
                    SwingDirection::Dropped => "drops",
                    SwingDirection::Increased => "increases",
                },
                display_margin(*old_margin),
                display_margin(*new_margin)
            ),
            ChangeEvent::ProvenanceShift { region, from, to } => format!(
                "- {} switched from using {} to using {}",
                display_region(region),
                display_source(*from, labels),
                display_source(*to, labels)
            ),
            ChangeEvent::FallbackElectorsChanged { provenance, old, new } => format!(
                "Electoral votes where we used {} changed from {} to {}",
                display_source(*provenance, labels),
                old,
                new
            ),
            ChangeEvent::CandidateTotalChanged {
                candidate,
                old,
                new,
            } => format!("{} overall: {} -> {}", labels.label(*candidate), old, new),
            ChangeEvent::TotalsUnchanged => {
                "No changes in overall electoral vote counts".to_string()
            }
            ChangeEvent::OverallLeaderFlip { from, to } => format!(
                "The overall leader changed from {} to {}",
                display_outcome(*from, labels),
                display_outcome(*to, labels)
            ),
        }
    }
}

impl ChangeReport {
    pub fn narrate(&self, labels: &CandidateLabels) -> Vec<String> {
        self.events.iter().map(|e| e.narrate(labels)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SnapshotBuilder;
    use crate::registry::{Region, RegionRegistry};
    use crate::tally::compute_tally;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn registry() -> RegionRegistry {
        let r = |key: &str, weight: u32| Region {
            key: key.to_string(),
            weight,
            baseline: Lead::new(Candidate::A, 1.0),
        };
        RegionRegistry::new(vec![r("new-hampshire", 4), r("ohio", 17), r("iowa", 6)]).unwrap()
    }

    fn pair(
        reg: &RegionRegistry,
        date: &str,
        recs: &[(&str, Candidate, f64, Provenance)],
    ) -> (Snapshot, Tally) {
        let mut b = SnapshotBuilder::new(reg, d(date));
        for (region, c, m, p) in recs {
            b.add_lead(region, Lead::new(*c, *m), *p).unwrap();
        }
        let s = b.build().unwrap();
        let t = compute_tally(&s, reg).unwrap();
        (s, t)
    }

    fn labels() -> CandidateLabels {
        CandidateLabels::new("Trump", "Harris", "Biden")
    }

    use Candidate::*;
    use Provenance::*;

    #[test]
    fn swing_threshold() {
        assert_eq!(swing(10.0, 2.0, 0.75), Some(SwingDirection::Dropped));
        assert_eq!(swing(10.0, 3.0, 0.75), None);
        assert_eq!(swing(2.0, 10.0, 0.75), Some(SwingDirection::Increased));
        assert_eq!(swing(0.0, 10.0, 0.75), None);
    }

    #[test]
    fn region_level_events() {
        let reg = registry();
        let (s1, t1) = pair(
            &reg,
            "2024-09-01",
            &[
                ("new-hampshire", B, 4.5, Primary),
                ("ohio", A, 10.0, HistoricalFallback),
                ("iowa", A, 0.0, SecondaryCandidateFallback),
            ],
        );
        let (s2, t2) = pair(
            &reg,
            "2024-09-02",
            &[
                ("new-hampshire", A, 1.0, Primary),
                ("ohio", A, 2.0, Primary),
                ("iowa", A, 5.0, HistoricalFallback),
            ],
        );
        let report = detect_changes((&s1, &t1), (&s2, &t2), DEFAULT_SWING_THRESHOLD).unwrap();
        assert_eq!(report.previous_date, d("2024-09-01"));
        let lines = report.narrate(&labels());
        assert_eq!(
            lines,
            vec![
                "- Iowa switched from using Biden polling to using the historical baseline",
                "New Hampshire changed from Harris (with a 4.5 point lead) to Trump (with a 1 point lead)",
                "Trump's lead in Ohio drops from 10 to 2",
                "- Ohio switched from using the historical baseline to using Harris polling",
                "Electoral votes where we used Biden polling changed from 6 to 0",
                "Electoral votes where we used the historical baseline changed from 17 to 6",
                "Harris overall: 4 -> 0",
                "Trump overall: 23 -> 27",
            ]
        );
    }

    #[test]
    fn only_four_provenance_shifts_are_reported() {
        let reg = registry();
        let all = [Primary, SecondaryCandidateFallback, HistoricalFallback];
        let notable = [
            (HistoricalFallback, SecondaryCandidateFallback),
            (SecondaryCandidateFallback, HistoricalFallback),
            (SecondaryCandidateFallback, Primary),
            (HistoricalFallback, Primary),
        ];
        for from in all {
            for to in all {
                let (s1, t1) = pair(
                    &reg,
                    "2024-09-01",
                    &[
                        ("new-hampshire", B, 4.0, from),
                        ("ohio", A, 10.0, Primary),
                        ("iowa", A, 3.0, Primary),
                    ],
                );
                let (s2, t2) = pair(
                    &reg,
                    "2024-09-02",
                    &[
                        ("new-hampshire", B, 4.0, to),
                        ("ohio", A, 10.0, Primary),
                        ("iowa", A, 3.0, Primary),
                    ],
                );
                let report = detect_changes((&s1, &t1), (&s2, &t2), 0.75).unwrap();
                let shifts: Vec<&ChangeEvent> = report
                    .events
                    .iter()
                    .filter(|e| matches!(e, ChangeEvent::ProvenanceShift { .. }))
                    .collect();
                if notable.contains(&(from, to)) {
                    assert_eq!(
                        shifts,
                        vec![&ChangeEvent::ProvenanceShift {
                            region: "new-hampshire".to_string(),
                            from,
                            to,
                        }],
                        "{:?} -> {:?}",
                        from,
                        to
                    );
                } else {
                    assert!(shifts.is_empty(), "{:?} -> {:?}", from, to);
                }
            }
        }
    }

    #[test]
    fn tie_as_a_prior_state() {
        let reg = RegionRegistry::new(vec![
            Region {
                key: "r1".to_string(),
                weight: 2,
                baseline: Lead::new(A, 1.0),
            },
            Region {
                key: "r2".to_string(),
                weight: 2,
                baseline: Lead::new(B, 1.0),
            },
        ])
        .unwrap();
        let (s1, t1) = pair(&reg, "2024-09-01", &[("r1", A, 1.0, Primary), ("r2", B, 1.0, Primary)]);
        let (s2, t2) = pair(&reg, "2024-09-02", &[("r1", B, 1.0, Primary), ("r2", B, 1.0, Primary)]);
        let report = detect_changes((&s1, &t1), (&s2, &t2), 0.75).unwrap();
        assert_eq!(
            report.events.last(),
            Some(&ChangeEvent::OverallLeaderFlip {
                from: Outcome::Tie,
                to: Outcome::Leading(B)
            })
        );
        assert_eq!(
            report.events.last().unwrap().narrate(&labels()),
            "The overall leader changed from a tie to Harris"
        );
    }

    #[test]
    fn unchanged_totals() {
        let reg = registry();
        let recs = [
            ("new-hampshire", B, 4.0, Primary),
            ("ohio", A, 10.0, Primary),
            ("iowa", A, 3.0, Primary),
        ];
        let (s1, t1) = pair(&reg, "2024-09-01", &recs);
        let (s2, t2) = pair(&reg, "2024-09-02", &recs);
        let report = detect_changes((&s1, &t1), (&s2, &t2), 0.75).unwrap();
        assert_eq!(report.events, vec![ChangeEvent::TotalsUnchanged]);
    }

    #[test]
    fn not_enough_history() {
        let reg = registry();
        let mut h = History::new();
        assert_eq!(
            what_changed(&h, 0.75),
            Err(ForecastError::InsufficientHistory { available: 0 })
        );
        let (s1, _) = pair(
            &reg,
            "2024-09-01",
            &[
                ("new-hampshire", B, 4.0, Primary),
                ("ohio", A, 10.0, Primary),
                ("iowa", A, 3.0, Primary),
            ],
        );
        h.push(s1, &reg).unwrap();
        assert_eq!(
            what_changed(&h, 0.75),
            Err(ForecastError::InsufficientHistory { available: 1 })
        );
    }

    #[test]
    fn display_helpers() {
        assert_eq!(display_region("district-of-columbia"), "District Of Columbia");
        assert_eq!(display_region("ohio"), "Ohio");
        assert_eq!(display_margin(3.0), "3");
        assert_eq!(display_margin(2.26), "2.3");
        assert_eq!(display_margin(0.5), "0.5");
    }
}

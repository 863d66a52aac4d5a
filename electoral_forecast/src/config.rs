// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::NaiveDate;
use snafu::Snafu;

/// One of the two candidates of the contest.
///
/// The display names are not part of the core: they live in [CandidateLabels].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Candidate {
    A,
    B,
}

impl Candidate {
    pub fn other(self) -> Candidate {
        match self {
            Candidate::A => Candidate::B,
            Candidate::B => Candidate::A,
        }
    }
}

/// The candidate pairing a poll was run with.
///
/// Polls for the secondary pairing substitute the secondary label for
/// candidate B.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Pairing {
    Primary,
    Secondary,
}

/// The names under which the candidates appear in the raw polls.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateLabels {
    pub candidate_a: String,
    pub candidate_b: String,
    /// The name used for candidate B in the older, secondary pairing.
    pub secondary_candidate_b: String,
}

impl CandidateLabels {
    pub fn new(candidate_a: &str, candidate_b: &str, secondary_candidate_b: &str) -> CandidateLabels {
        CandidateLabels {
            candidate_a: candidate_a.to_string(),
            candidate_b: candidate_b.to_string(),
            secondary_candidate_b: secondary_candidate_b.to_string(),
        }
    }

    pub fn label(&self, candidate: Candidate) -> &str {
        match candidate {
            Candidate::A => self.candidate_a.as_str(),
            Candidate::B => self.candidate_b.as_str(),
        }
    }

    /// The label used for candidate B in polls of the given pairing.
    pub fn pairing_label(&self, pairing: Pairing) -> &str {
        match pairing {
            Pairing::Primary => self.candidate_b.as_str(),
            Pairing::Secondary => self.secondary_candidate_b.as_str(),
        }
    }

    /// Resolves a raw leader label for polls of the given pairing.
    /// Labels belonging to neither side of the pairing resolve to nothing.
    pub fn resolve(&self, label: &str, pairing: Pairing) -> Option<Candidate> {
        if label == self.candidate_a {
            Some(Candidate::A)
        } else if label == self.pairing_label(pairing) {
            Some(Candidate::B)
        } else {
            None
        }
    }
}

/// A raw poll entry, as handed over by the retrieval collaborator.
#[derive(PartialEq, Debug, Clone)]
pub struct RawPoll {
    pub date: NaiveDate,
    /// The leading candidate label. `None` for a poll showing a dead heat.
    pub leader: Option<String>,
    /// The lead in percentage points.
    pub margin: f64,
}

// ******** Output data structures *********

/// Which tier of the escalation chain produced a prediction.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum Provenance {
    Primary,
    SecondaryCandidateFallback,
    HistoricalFallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Primary => "primary",
            Provenance::SecondaryCandidateFallback => "secondary-candidate-fallback",
            Provenance::HistoricalFallback => "historical-fallback",
        }
    }

    pub fn parse(s: &str) -> Option<Provenance> {
        match s {
            "primary" => Some(Provenance::Primary),
            "secondary-candidate-fallback" => Some(Provenance::SecondaryCandidateFallback),
            "historical-fallback" => Some(Provenance::HistoricalFallback),
            _ => None,
        }
    }
}

/// A lead: who is ahead and by how many points.
///
/// The margin is always non-negative, the sign convention lives in the leader.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Lead {
    pub leader: Candidate,
    pub margin: f64,
}

impl Lead {
    pub fn new(leader: Candidate, margin: f64) -> Lead {
        debug_assert!(margin >= 0.0, "negative margin {}", margin);
        Lead { leader, margin }
    }

    /// Builds a lead out of a signed sum, in which candidate B counts positively.
    /// Returns nothing for an exact tie.
    pub(crate) fn from_signed(signed: f64) -> Option<Lead> {
        if signed > 0.0 {
            Some(Lead::new(Candidate::B, signed))
        } else if signed < 0.0 {
            Some(Lead::new(Candidate::A, -signed))
        } else {
            None
        }
    }
}

/// The prediction for a single region.
#[derive(PartialEq, Debug, Clone)]
pub struct StatePollingRecord {
    pub region: String,
    pub lead: Lead,
    pub provenance: Provenance,
}

impl StatePollingRecord {
    pub fn leader(&self) -> Candidate {
        self.lead.leader
    }

    pub fn margin(&self) -> f64 {
        self.lead.margin
    }
}

/// A dated prediction covering every registered region exactly once.
///
/// Snapshots can only be created through the [crate::builder::SnapshotBuilder]
/// or by the interpolation functions, and are immutable afterwards.
#[derive(PartialEq, Debug, Clone)]
pub struct Snapshot {
    pub(crate) date: NaiveDate,
    pub(crate) records: BTreeMap<String, StatePollingRecord>,
    pub(crate) interpolated: bool,
}

impl Snapshot {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_interpolated(&self) -> bool {
        self.interpolated
    }

    pub fn record(&self, region: &str) -> Option<&StatePollingRecord> {
        self.records.get(region)
    }

    /// All the records, ordered by region key.
    pub fn records(&self) -> impl Iterator<Item = &StatePollingRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The overall state of the race.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Outcome {
    Leading(Candidate),
    Tie,
}

impl Outcome {
    fn from_totals<T: PartialOrd>(a: T, b: T) -> Outcome {
        if a > b {
            Outcome::Leading(Candidate::A)
        } else if b > a {
            Outcome::Leading(Candidate::B)
        } else {
            Outcome::Tie
        }
    }
}

/// The weighted elector totals of a snapshot.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub struct Tally {
    pub candidate_a: u32,
    pub candidate_b: u32,
    /// Electors from regions resolved by polling of the primary pairing.
    pub primary_electors: u32,
    /// Electors from regions resolved by the secondary candidate pairing.
    pub secondary_fallback_electors: u32,
    /// Electors from regions resolved by the historical baseline.
    pub historical_fallback_electors: u32,
}

impl Tally {
    pub const EMPTY: Tally = Tally {
        candidate_a: 0,
        candidate_b: 0,
        primary_electors: 0,
        secondary_fallback_electors: 0,
        historical_fallback_electors: 0,
    };

    pub fn votes_for(&self, candidate: Candidate) -> u32 {
        match candidate {
            Candidate::A => self.candidate_a,
            Candidate::B => self.candidate_b,
        }
    }

    pub fn electors_via(&self, provenance: Provenance) -> u32 {
        match provenance {
            Provenance::Primary => self.primary_electors,
            Provenance::SecondaryCandidateFallback => self.secondary_fallback_electors,
            Provenance::HistoricalFallback => self.historical_fallback_electors,
        }
    }

    pub fn total(&self) -> u32 {
        self.candidate_a + self.candidate_b
    }

    pub fn leader(&self) -> Outcome {
        Outcome::from_totals(self.candidate_a, self.candidate_b)
    }
}

/// Elector totals interpolated for an animation frame.
///
/// They are not derived from the frame's snapshot and may disagree with it.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct BlendedTally {
    pub candidate_a: f64,
    pub candidate_b: f64,
}

impl BlendedTally {
    pub fn votes_for(&self, candidate: Candidate) -> f64 {
        match candidate {
            Candidate::A => self.candidate_a,
            Candidate::B => self.candidate_b,
        }
    }

    pub fn leader(&self) -> Outcome {
        Outcome::from_totals(self.candidate_a, self.candidate_b)
    }
}

impl From<&Tally> for BlendedTally {
    fn from(t: &Tally) -> Self {
        BlendedTally {
            candidate_a: t.candidate_a as f64,
            candidate_b: t.candidate_b as f64,
        }
    }
}

/// Errors that prevent a snapshot, a tally or an interpolation from being produced.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ForecastError {
    #[snafu(display("region {region:?} is not present in the registry"))]
    UnknownRegion { region: String },
    #[snafu(display("snapshot for {date} has no record for region {region:?}"))]
    MissingRegion { region: String, date: NaiveDate },
    #[snafu(display("region {region:?} appears more than once in the snapshot for {date}"))]
    DuplicateRegion { region: String, date: NaiveDate },
    #[snafu(display("region {region:?} has an invalid margin {margin}"))]
    InvalidMargin { region: String, margin: f64 },
    #[snafu(display("no snapshot is available for {date}"))]
    MissingState { date: NaiveDate },
    #[snafu(display("at least two snapshots are required, only {available} available"))]
    InsufficientHistory { available: usize },
    #[snafu(display("region {region:?} is registered twice"))]
    DuplicateRegistryRegion { region: String },
    #[snafu(display("region {region:?} has no electors"))]
    ZeroWeight { region: String },
    #[snafu(display("{count} frames requested, at most {max} frames can be told apart"))]
    TooManyFrames { count: usize, max: usize },
}

pub type ForecastResult<T> = Result<T, ForecastError>;

// ********* Configuration **********

/// Relative margin change above which a lead movement is reported.
pub const DEFAULT_SWING_THRESHOLD: f64 = 0.75;

/// Parameters of the escalation chain.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AggregationRules {
    /// The first averaging window.
    pub initial_window_weeks: u32,
    /// The averaging window doubles until it reaches this cap.
    pub max_window_weeks: u32,
    /// The window of the first-only searches done after averaging gave nothing.
    pub lookback_weeks: u32,
    /// How many times a failing retrieval is attempted per stage.
    pub max_fetch_attempts: u32,
}

impl AggregationRules {
    pub const DEFAULT_RULES: AggregationRules = AggregationRules {
        initial_window_weeks: 1,
        max_window_weeks: 16,
        lookback_weeks: 52,
        max_fetch_attempts: 3,
    };
}

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Candidate::A => write!(f, "candidate A"),
            Candidate::B => write!(f, "candidate B"),
        }
    }
}

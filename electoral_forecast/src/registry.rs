use std::collections::HashMap;

use snafu::ensure;

use crate::config::*;

/// An electoral subdivision.
#[derive(PartialEq, Debug, Clone)]
pub struct Region {
    pub key: String,
    /// The number of electors. Always positive.
    pub weight: u32,
    /// The result of the previous contest, used when no polling is available.
    pub baseline: Lead,
}

/// The immutable table of regions for a run.
///
/// It is built once and passed explicitly to the components that need it.
#[derive(PartialEq, Debug, Clone)]
pub struct RegionRegistry {
    regions: Vec<Region>,
    index: HashMap<String, usize>,
}

// (key, electors, previous winner, previous margin in points)
const US_REGIONS: [(&str, u32, Candidate, f64); 51] = [
    ("alabama", 9, Candidate::A, 25.5),
    ("alaska", 3, Candidate::A, 10.1),
    ("arizona", 11, Candidate::B, 0.3),
    ("arkansas", 6, Candidate::A, 27.7),
    ("california", 54, Candidate::B, 29.2),
    ("colorado", 10, Candidate::B, 13.5),
    ("connecticut", 7, Candidate::B, 20.4),
    ("delaware", 3, Candidate::B, 19.0),
    ("florida", 30, Candidate::A, 3.4),
    ("georgia", 16, Candidate::B, 0.2),
    ("hawaii", 4, Candidate::B, 29.5),
    ("idaho", 4, Candidate::A, 30.8),
    ("illinois", 19, Candidate::B, 17.0),
    ("indiana", 11, Candidate::A, 16.1),
    ("iowa", 6, Candidate::A, 8.2),
    ("kansas", 6, Candidate::A, 14.7),
    ("kentucky", 8, Candidate::A, 26.0),
    ("louisiana", 8, Candidate::A, 19.6),
    ("maine", 4, Candidate::B, 9.1),
    ("maryland", 10, Candidate::B, 33.2),
    ("massachusetts", 11, Candidate::B, 33.5),
    ("michigan", 15, Candidate::B, 2.8),
    ("minnesota", 10, Candidate::B, 7.1),
    ("mississippi", 6, Candidate::A, 16.5),
    ("missouri", 10, Candidate::A, 15.4),
    ("montana", 4, Candidate::A, 16.4),
    ("nebraska", 5, Candidate::A, 19.1),
    ("nevada", 6, Candidate::B, 2.4),
    ("new-hampshire", 4, Candidate::B, 7.4),
    ("new-jersey", 14, Candidate::B, 15.9),
    ("new-mexico", 5, Candidate::B, 10.8),
    ("new-york", 28, Candidate::B, 23.1),
    ("north-carolina", 16, Candidate::A, 1.3),
    ("north-dakota", 3, Candidate::A, 34.1),
    ("ohio", 17, Candidate::A, 8.0),
    ("oklahoma", 7, Candidate::A, 33.1),
    ("oregon", 8, Candidate::B, 16.1),
    ("pennsylvania", 19, Candidate::B, 1.2),
    ("rhode-island", 4, Candidate::B, 20.8),
    ("south-carolina", 9, Candidate::A, 11.7),
    ("south-dakota", 3, Candidate::A, 26.2),
    ("tennessee", 11, Candidate::A, 23.2),
    ("texas", 40, Candidate::A, 5.6),
    ("utah", 6, Candidate::A, 20.5),
    ("vermont", 3, Candidate::B, 35.4),
    ("virginia", 13, Candidate::B, 10.1),
    ("washington", 12, Candidate::B, 19.2),
    ("district-of-columbia", 3, Candidate::B, 86.8),
    ("west-virginia", 4, Candidate::A, 38.9),
    ("wisconsin", 10, Candidate::B, 0.6),
    ("wyoming", 3, Candidate::A, 43.4),
];

impl RegionRegistry {
    /// Builds a registry out of arbitrary regions.
    ///
    /// Fails if a key appears twice. Regions with a zero weight are rejected as well,
    /// since they could never influence a tally.
    pub fn new(regions: Vec<Region>) -> ForecastResult<RegionRegistry> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (idx, r) in regions.iter().enumerate() {
            ensure!(r.weight > 0, ZeroWeightSnafu { region: &r.key });
            ensure!(
                index.insert(r.key.clone(), idx).is_none(),
                DuplicateRegistryRegionSnafu { region: &r.key }
            );
        }
        Ok(RegionRegistry { regions, index })
    }

    /// The 50 states and the federal district, with the previous contest as baseline.
    pub fn united_states() -> RegionRegistry {
        let regions: Vec<Region> = US_REGIONS
            .iter()
            .map(|(key, weight, leader, margin)| Region {
                key: key.to_string(),
                weight: *weight,
                baseline: Lead::new(*leader, *margin),
            })
            .collect();
        let index = regions
            .iter()
            .enumerate()
            .map(|(idx, r)| (r.key.clone(), idx))
            .collect();
        RegionRegistry { regions, index }
    }

    pub fn get(&self, key: &str) -> Option<&Region> {
        self.index.get(key).and_then(|idx| self.regions.get(*idx))
    }

    pub fn weight(&self, key: &str) -> Option<u32> {
        self.get(key).map(|r| r.weight)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// The regions, in registration order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn total_weight(&self) -> u32 {
        self.regions.iter().map(|r| r.weight).sum()
    }
}

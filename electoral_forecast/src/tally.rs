use log::debug;
use snafu::OptionExt;

use crate::config::*;
use crate::registry::RegionRegistry;

/// Sums the electors of every region into the totals of the leading candidates.
///
/// A tied total is a valid outcome, see [Tally::leader].
pub fn compute_tally(snapshot: &Snapshot, registry: &RegionRegistry) -> ForecastResult<Tally> {
    let mut tally = Tally::EMPTY;
    for rec in snapshot.records() {
        let weight = registry.weight(&rec.region).context(UnknownRegionSnafu {
            region: rec.region.clone(),
        })?;
        match rec.leader() {
            Candidate::A => tally.candidate_a += weight,
            Candidate::B => tally.candidate_b += weight,
        }
        match rec.provenance {
            Provenance::Primary => tally.primary_electors += weight,
            Provenance::SecondaryCandidateFallback => tally.secondary_fallback_electors += weight,
            Provenance::HistoricalFallback => tally.historical_fallback_electors += weight,
        }
    }
    debug!("compute_tally: {}: {:?}", snapshot.date(), tally);
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SnapshotBuilder;
    use crate::registry::Region;
    use chrono::NaiveDate;

    fn region(key: &str, weight: u32) -> Region {
        Region {
            key: key.to_string(),
            weight,
            baseline: Lead::new(Candidate::A, 1.0),
        }
    }

    #[test]
    fn weighted_totals() {
        let reg = RegionRegistry::new(vec![region("r1", 3), region("r2", 2)]).unwrap();
        let mut b = SnapshotBuilder::new(&reg, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        b.add_lead("r1", Lead::new(Candidate::A, 1.0), Provenance::Primary)
            .unwrap();
        b.add_lead(
            "r2",
            Lead::new(Candidate::B, 3.0),
            Provenance::SecondaryCandidateFallback,
        )
        .unwrap();
        let t = compute_tally(&b.build().unwrap(), &reg).unwrap();
        assert_eq!(t.candidate_a, 3);
        assert_eq!(t.candidate_b, 2);
        assert_eq!(t.primary_electors, 3);
        assert_eq!(t.secondary_fallback_electors, 2);
        assert_eq!(t.historical_fallback_electors, 0);
        assert_eq!(t.leader(), Outcome::Leading(Candidate::A));
    }

    #[test]
    fn tie_is_an_outcome() {
        let reg = RegionRegistry::new(vec![region("r1", 2), region("r2", 2)]).unwrap();
        let mut b = SnapshotBuilder::new(&reg, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        b.add_lead("r1", Lead::new(Candidate::A, 1.0), Provenance::Primary)
            .unwrap();
        b.add_lead("r2", Lead::new(Candidate::B, 1.0), Provenance::HistoricalFallback)
            .unwrap();
        let t = compute_tally(&b.build().unwrap(), &reg).unwrap();
        assert_eq!(t.leader(), Outcome::Tie);
        assert_eq!(t.total(), reg.total_weight());
    }

    #[test]
    fn snapshot_from_another_registry() {
        let reg = RegionRegistry::new(vec![region("r1", 2)]).unwrap();
        let other = RegionRegistry::new(vec![region("r9", 2)]).unwrap();
        let mut b = SnapshotBuilder::new(&reg, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());
        b.add_lead("r1", Lead::new(Candidate::A, 1.0), Provenance::Primary)
            .unwrap();
        let res = compute_tally(&b.build().unwrap(), &other);
        assert!(matches!(res, Err(ForecastError::UnknownRegion { .. })));
    }
}

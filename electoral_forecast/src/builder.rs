pub use crate::config::*;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use snafu::ensure;

use crate::registry::RegionRegistry;

/// A builder for assembling snapshots.
///
/// Every record is checked against the registry when it is added, and the
/// snapshot is only released once all the registered regions are covered.
///
/// ```
/// use chrono::NaiveDate;
/// use electoral_forecast::builder::SnapshotBuilder;
/// use electoral_forecast::registry::{Region, RegionRegistry};
/// use electoral_forecast::*;
///
/// let registry = RegionRegistry::new(vec![Region {
///     key: "vermont".to_string(),
///     weight: 3,
///     baseline: Lead::new(Candidate::B, 35.4),
/// }]).unwrap();
/// let date = NaiveDate::from_ymd_opt(2024, 8, 24).unwrap();
///
/// let mut builder = SnapshotBuilder::new(&registry, date);
/// builder.add_lead("vermont", Lead::new(Candidate::B, 30.0), Provenance::Primary)?;
/// let snapshot = builder.build()?;
/// assert_eq!(snapshot.len(), 1);
/// # Ok::<(), ForecastError>(())
/// ```
pub struct SnapshotBuilder<'a> {
    registry: &'a RegionRegistry,
    date: NaiveDate,
    interpolated: bool,
    records: BTreeMap<String, StatePollingRecord>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(registry: &'a RegionRegistry, date: NaiveDate) -> SnapshotBuilder<'a> {
        SnapshotBuilder {
            registry,
            date,
            interpolated: false,
            records: BTreeMap::new(),
        }
    }

    /// Marks the snapshot as synthetic.
    pub fn interpolated(self, interpolated: bool) -> SnapshotBuilder<'a> {
        SnapshotBuilder {
            interpolated,
            ..self
        }
    }

    /// Adds the prediction of one region.
    pub fn add_lead(
        &mut self,
        region: &str,
        lead: Lead,
        provenance: Provenance,
    ) -> ForecastResult<()> {
        self.add_record(StatePollingRecord {
            region: region.to_string(),
            lead,
            provenance,
        })
    }

    pub fn add_record(&mut self, record: StatePollingRecord) -> ForecastResult<()> {
        ensure!(
            self.registry.contains(&record.region),
            UnknownRegionSnafu {
                region: record.region.clone()
            }
        );
        ensure!(
            record.lead.margin >= 0.0 && record.lead.margin.is_finite(),
            InvalidMarginSnafu {
                region: record.region.clone(),
                margin: record.lead.margin
            }
        );
        ensure!(
            !self.records.contains_key(&record.region),
            DuplicateRegionSnafu {
                region: record.region.clone(),
                date: self.date
            }
        );
        self.records.insert(record.region.clone(), record);
        Ok(())
    }

    /// Releases the snapshot. Fails if a registered region has no record.
    pub fn build(self) -> ForecastResult<Snapshot> {
        if let Some(missing) = self
            .registry
            .regions()
            .iter()
            .find(|r| !self.records.contains_key(&r.key))
        {
            return MissingRegionSnafu {
                region: missing.key.clone(),
                date: self.date,
            }
            .fail();
        }
        debug!(
            "SnapshotBuilder::build: {} regions for {} (interpolated: {})",
            self.records.len(),
            self.date,
            self.interpolated
        );
        Ok(Snapshot {
            date: self.date,
            records: self.records,
            interpolated: self.interpolated,
        })
    }
}

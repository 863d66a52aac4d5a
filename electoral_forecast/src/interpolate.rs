//! Synthetic snapshots between two known ones.
//!
//! Two different laws are provided and they are not interchangeable:
//! - [reconstruct_midpoint] fills a missing day. The tally of the new snapshot is
//!   recomputed from it.
//! - [blend_frames] produces the frames of an animated transition. The lead of a
//!   region crosses zero exactly at `alpha = 0.5` when the leader changes, and the
//!   tally of a frame is interpolated directly from the two tallies. The totals
//!   shown for a frame may therefore disagree with the map of that frame.
//!
//! Both laws only agree at their shared endpoints.

use chrono::{Duration, NaiveDate};
use log::debug;
use snafu::{ensure, OptionExt};

use crate::builder::SnapshotBuilder;
use crate::config::*;
use crate::registry::RegionRegistry;
use crate::tally::compute_tally;

/// Frames are keyed by their position in whole percents, so a transition holds at most
/// this many distinct frames.
pub const MAX_FRAME_COUNT: usize = 101;

/// The key of an animation frame: the date it starts from and the position in the
/// transition, in percent.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct FrameKey {
    pub base_date: NaiveDate,
    pub alpha_pct: u32,
}

impl FrameKey {
    pub fn new(base_date: NaiveDate, alpha: f64) -> FrameKey {
        FrameKey {
            base_date,
            alpha_pct: (alpha.clamp(0.0, 1.0) * 100.0).round() as u32,
        }
    }
}

/// One frame of an animated transition.
#[derive(PartialEq, Debug, Clone)]
pub struct BlendedFrame {
    pub key: FrameKey,
    pub alpha: f64,
    pub snapshot: Snapshot,
    pub tally: BlendedTally,
}

/// The day halfway between two dates (rounded towards the earlier one).
pub fn midpoint_date(d1: NaiveDate, d2: NaiveDate) -> NaiveDate {
    let (first, last) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
    first + Duration::days((last - first).num_days() / 2)
}

/// The lead halfway between two leads.
///
/// With the same leader, the margins are averaged. Otherwise the larger margin keeps
/// the lead, with half of the difference between the two margins.
pub fn midpoint_lead(before: Lead, after: Lead) -> Lead {
    if before.leader == after.leader {
        Lead::new(
            before.leader,
            before.margin + (after.margin - before.margin) / 2.0,
        )
    } else {
        let leader = if before.margin > after.margin {
            before.leader
        } else {
            after.leader
        };
        Lead::new(leader, (before.margin - after.margin).abs() / 2.0)
    }
}

/// Reconstructs the snapshot of a missing day out of the days around it.
///
/// The tally is computed from the reconstructed snapshot.
pub fn reconstruct_midpoint(
    before: &Snapshot,
    after: &Snapshot,
    date: NaiveDate,
    registry: &RegionRegistry,
) -> ForecastResult<(Snapshot, Tally)> {
    debug!(
        "reconstruct_midpoint: {} between {} and {}",
        date, before.date, after.date
    );
    let mut builder = SnapshotBuilder::new(registry, date).interpolated(true);
    for b in before.records() {
        let a = after.record(&b.region).context(MissingRegionSnafu {
            region: b.region.clone(),
            date: after.date,
        })?;
        let lead = midpoint_lead(b.lead, a.lead);
        // The provenance follows the record that provided the leader.
        let provenance = if b.leader() != a.leader() && lead.leader == b.leader() {
            b.provenance
        } else {
            a.provenance
        };
        builder.add_lead(&b.region, lead, provenance)?;
    }
    let snapshot = builder.build()?;
    let tally = compute_tally(&snapshot, registry)?;
    Ok((snapshot, tally))
}

/// The lead of a region at position `alpha` of an animated transition.
/// `alpha` is clamped to [0, 1].
pub fn blend_lead(from: Lead, to: Lead, alpha: f64) -> Lead {
    let alpha = alpha.clamp(0.0, 1.0);
    if from.leader == to.leader {
        if from.margin == to.margin {
            from
        } else {
            Lead::new(
                from.leader,
                from.margin * (1.0 - alpha) + to.margin * alpha,
            )
        }
    } else if alpha < 0.5 {
        Lead::new(from.leader, from.margin * (0.5 - alpha) / 0.5)
    } else {
        Lead::new(to.leader, to.margin * (alpha - 0.5) / 0.5)
    }
}

/// The totals of a frame, interpolated linearly between the two tallies.
pub fn blend_tally(from: &Tally, to: &Tally, alpha: f64) -> BlendedTally {
    let f = BlendedTally::from(from);
    if from.candidate_a == to.candidate_a && from.candidate_b == to.candidate_b {
        return f;
    }
    let t = BlendedTally::from(to);
    BlendedTally {
        candidate_a: f.candidate_a * (1.0 - alpha) + t.candidate_a * alpha,
        candidate_b: f.candidate_b * (1.0 - alpha) + t.candidate_b * alpha,
    }
}

/// A single frame of the transition from `from` to `to`, at position `alpha` in [0, 1].
pub fn blend_frame(
    from: (&Snapshot, &Tally),
    to: (&Snapshot, &Tally),
    alpha: f64,
) -> ForecastResult<BlendedFrame> {
    let (from_snap, from_tally) = from;
    let (to_snap, to_tally) = to;
    let alpha = alpha.clamp(0.0, 1.0);
    let key = FrameKey::new(from_snap.date, alpha);

    let snapshot = if from_snap.records == to_snap.records {
        Snapshot {
            date: from_snap.date,
            records: from_snap.records.clone(),
            interpolated: true,
        }
    } else {
        let mut records = from_snap.records.clone();
        for (region, rec) in records.iter_mut() {
            let target = to_snap.record(region).context(MissingRegionSnafu {
                region: region.clone(),
                date: to_snap.date,
            })?;
            rec.lead = blend_lead(rec.lead, target.lead, alpha);
            if alpha >= 0.5 {
                rec.provenance = target.provenance;
            }
        }
        Snapshot {
            date: from_snap.date,
            records,
            interpolated: true,
        }
    };
    // Both snapshots cover the same regions: `to` cannot have extra ones.
    if to_snap.records.len() != snapshot.records.len() {
        if let Some(extra) = to_snap
            .records
            .keys()
            .find(|k| !snapshot.records.contains_key(*k))
        {
            return MissingRegionSnafu {
                region: extra.clone(),
                date: from_snap.date,
            }
            .fail();
        }
    }

    Ok(BlendedFrame {
        key,
        alpha,
        snapshot,
        tally: blend_tally(from_tally, to_tally, alpha),
    })
}

/// The alpha positions of `count` evenly spaced frames, both ends included.
pub fn frame_alphas(count: usize) -> Vec<f64> {
    match count {
        0 => vec![],
        1 => vec![0.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// The `count` frames of the animated transition from `from` to `to`.
///
/// Fails if `count` is larger than [MAX_FRAME_COUNT]: two frames would share a key.
pub fn blend_frames(
    from: (&Snapshot, &Tally),
    to: (&Snapshot, &Tally),
    count: usize,
) -> ForecastResult<Vec<BlendedFrame>> {
    ensure!(
        count <= MAX_FRAME_COUNT,
        TooManyFramesSnafu {
            count,
            max: MAX_FRAME_COUNT
        }
    );
    debug!(
        "blend_frames: {} frames from {} to {}",
        count, from.0.date, to.0.date
    );
    frame_alphas(count)
        .into_iter()
        .map(|alpha| blend_frame(from, to, alpha))
        .collect()
}

// Reading and writing snapshots, tallies and frames as JSON files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use electoral_forecast::builder::SnapshotBuilder;
use electoral_forecast::history::History;
use electoral_forecast::interpolate::BlendedFrame;
use electoral_forecast::registry::RegionRegistry;
use electoral_forecast::*;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use snafu::ResultExt;

use crate::evsim::io_common::*;
use crate::evsim::*;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct RegionEntry {
    pub leader: String,
    pub margin: f64,
    pub provenance: String,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub date: String,
    pub interpolated: bool,
    pub regions: BTreeMap<String, RegionEntry>,
}

pub fn snapshot_to_file(snapshot: &Snapshot, labels: &CandidateLabels) -> SnapshotFile {
    SnapshotFile {
        date: format_date(snapshot.date()),
        interpolated: snapshot.is_interpolated(),
        regions: snapshot
            .records()
            .map(|rec| {
                (
                    rec.region.clone(),
                    RegionEntry {
                        leader: labels.label(rec.leader()).to_string(),
                        margin: rec.margin(),
                        provenance: rec.provenance.as_str().to_string(),
                    },
                )
            })
            .collect(),
    }
}

/// Rebuilds a snapshot, checking it against the registry.
pub fn snapshot_from_file(
    file: &SnapshotFile,
    path: &str,
    registry: &RegionRegistry,
    labels: &CandidateLabels,
) -> EvsimResult<Snapshot> {
    let date = parse_date(&file.date)?;
    let mut builder = SnapshotBuilder::new(registry, date).interpolated(file.interpolated);
    for (region, entry) in file.regions.iter() {
        // Records of the secondary fallback may carry the secondary label.
        let leader = labels
            .resolve(&entry.leader, Pairing::Primary)
            .or_else(|| labels.resolve(&entry.leader, Pairing::Secondary));
        let leader = match leader {
            Some(c) => c,
            None => {
                return InvalidStoreSnafu {
                    path,
                    message: format!("unknown leader {:?} for {}", entry.leader, region),
                }
                .fail()
            }
        };
        let provenance = match Provenance::parse(&entry.provenance) {
            Some(p) => p,
            None => {
                return InvalidStoreSnafu {
                    path,
                    message: format!("unknown provenance {:?} for {}", entry.provenance, region),
                }
                .fail()
            }
        };
        let record = StatePollingRecord {
            region: region.clone(),
            lead: Lead {
                leader,
                margin: entry.margin,
            },
            provenance,
        };
        builder.add_record(record).context(ForecastSnafu)?;
    }
    builder.build().context(ForecastSnafu)
}

fn totals_to_json<T: Into<JSValue>>(a: T, b: T, labels: &CandidateLabels) -> JSMap<String, JSValue> {
    let mut totals: JSMap<String, JSValue> = JSMap::new();
    totals.insert(labels.candidate_a.clone(), a.into());
    totals.insert(labels.candidate_b.clone(), b.into());
    totals
}

fn outcome_to_json(outcome: Outcome, labels: &CandidateLabels) -> JSValue {
    match outcome {
        Outcome::Leading(c) => json!(labels.label(c)),
        Outcome::Tie => json!("tie"),
    }
}

pub fn tally_to_json(date: NaiveDate, tally: &Tally, labels: &CandidateLabels) -> JSValue {
    let mut by_provenance: JSMap<String, JSValue> = JSMap::new();
    for p in [
        Provenance::Primary,
        Provenance::SecondaryCandidateFallback,
        Provenance::HistoricalFallback,
    ] {
        by_provenance.insert(p.as_str().to_string(), json!(tally.electors_via(p)));
    }
    json!({
        "date": format_date(date),
        "totals": totals_to_json(tally.candidate_a, tally.candidate_b, labels),
        "electorsByProvenance": by_provenance,
        "leader": outcome_to_json(tally.leader(), labels),
    })
}

pub fn blended_tally_to_json(frame: &BlendedFrame, labels: &CandidateLabels) -> JSValue {
    json!({
        "date": format_date(frame.key.base_date),
        "alpha": frame.alpha,
        "totals": totals_to_json(frame.tally.candidate_a, frame.tally.candidate_b, labels),
        "leader": outcome_to_json(frame.tally.leader(), labels),
    })
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> EvsimResult<T> {
    let path_s = path.display().to_string();
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu {
        path: path_s.clone(),
    })?;
    serde_json::from_str(&contents).context(ParsingJsonSnafu { path: path_s })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> EvsimResult<()> {
    let pretty = serde_json::to_string_pretty(value).context(WritingJsonSnafu {})?;
    fs::write(path, pretty).context(WritingFileSnafu {
        path: path.display().to_string(),
    })?;
    debug!("write_json: wrote {:?}", path);
    Ok(())
}

pub fn write_snapshot(
    dir: &Path,
    snapshot: &Snapshot,
    labels: &CandidateLabels,
) -> EvsimResult<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(snapshot_file_name(snapshot.date()));
    write_json(&path, &snapshot_to_file(snapshot, labels))?;
    Ok(path)
}

pub fn write_tally(
    dir: &Path,
    date: NaiveDate,
    tally: &Tally,
    labels: &CandidateLabels,
) -> EvsimResult<PathBuf> {
    ensure_dir(dir)?;
    let path = dir.join(tally_file_name(date));
    write_json(&path, &tally_to_json(date, tally, labels))?;
    Ok(path)
}

/// Loads the snapshot of a date. A missing file is a missing state.
pub fn load_snapshot(
    dir: &Path,
    date: NaiveDate,
    registry: &RegionRegistry,
    labels: &CandidateLabels,
) -> EvsimResult<Snapshot> {
    let path = dir.join(snapshot_file_name(date));
    if !path.is_file() {
        return Err(EvsimError::Forecast {
            source: ForecastError::MissingState { date },
        });
    }
    let file: SnapshotFile = read_json(&path)?;
    snapshot_from_file(&file, &path.display().to_string(), registry, labels)
}

/// Loads all the snapshots of the directory, with their tallies.
pub fn load_history(
    dir: &Path,
    registry: &RegionRegistry,
    labels: &CandidateLabels,
) -> EvsimResult<History> {
    let mut history = History::new();
    if !dir.is_dir() {
        info!("load_history: {:?} does not exist", dir);
        return Ok(history);
    }
    let entries = fs::read_dir(dir).context(ListingDirSnafu {
        path: dir.display().to_string(),
    })?;
    for entry_r in entries {
        let entry = entry_r.context(ListingDirSnafu {
            path: dir.display().to_string(),
        })?;
        let name = simplify_file_name(&entry.path());
        if let Some(date) = snapshot_file_date(&name) {
            let snapshot = load_snapshot(dir, date, registry, labels)?;
            history.push(snapshot, registry).context(ForecastSnafu)?;
        }
    }
    info!("load_history: {} snapshots in {:?}", history.len(), dir);
    Ok(history)
}

/// Removes the frames of a previous batch. Returns how many files were removed.
/// Snapshot and tally files in the same directory are kept.
pub fn clear_frames(dir: &Path) -> EvsimResult<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let entries = fs::read_dir(dir).context(ListingDirSnafu {
        path: dir.display().to_string(),
    })?;
    let mut removed = 0;
    for entry_r in entries {
        let entry = entry_r.context(ListingDirSnafu {
            path: dir.display().to_string(),
        })?;
        let path = entry.path();
        if path.is_file() && frame_file_key(&simplify_file_name(&path)).is_some() {
            fs::remove_file(&path).context(WritingFileSnafu {
                path: path.display().to_string(),
            })?;
            removed += 1;
        }
    }
    debug!("clear_frames: removed {} files from {:?}", removed, dir);
    Ok(removed)
}

pub fn write_frame(
    dir: &Path,
    frame: &BlendedFrame,
    labels: &CandidateLabels,
) -> EvsimResult<(PathBuf, PathBuf)> {
    ensure_dir(dir)?;
    let snapshot_path = dir.join(frame_snapshot_file_name(&frame.key));
    write_json(&snapshot_path, &snapshot_to_file(&frame.snapshot, labels))?;
    let tally_path = dir.join(frame_tally_file_name(&frame.key));
    write_json(&tally_path, &blended_tally_to_json(frame, labels))?;
    Ok((snapshot_path, tally_path))
}

use log::{debug, info, warn};

use electoral_forecast::aggregator::aggregate_snapshot;
use electoral_forecast::changes::what_changed;
use electoral_forecast::interpolate::{blend_frames, midpoint_date, reconstruct_midpoint};
use electoral_forecast::registry::RegionRegistry;
use electoral_forecast::*;
use snafu::{prelude::*, Snafu};

use std::path::{Path, PathBuf};

use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::evsim::config_reader::*;
use crate::evsim::io_common::*;
use crate::evsim::io_csv::CsvPollSource;
use crate::evsim::io_store::*;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_store;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EvsimError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    WritingJson { source: serde_json::Error },
    #[snafu(display("Error writing {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error listing directory {path}"))]
    ListingDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno} of {path}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Line {lineno} of {path}: {message}"))]
    CsvLineInvalid {
        path: String,
        lineno: usize,
        message: String,
    },
    #[snafu(display("Invalid date {value:?}, expected YYYY-MM-DD"))]
    ParsingDate {
        source: chrono::ParseError,
        value: String,
    },
    #[snafu(display("Invalid file {path}: {message}"))]
    InvalidStore { path: String, message: String },
    #[snafu(display("{source}"))]
    Forecast { source: ForecastError },
    #[snafu(display("Missing parent directory for {path}"))]
    MissingParentDir { path: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type EvsimResult<T> = Result<T, EvsimError>;

/// Everything a command needs, resolved from the configuration file.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub contest_name: String,
    pub labels: CandidateLabels,
    pub rules: RunRules,
    pub registry: RegionRegistry,
    pub results_dir: PathBuf,
    pub tallies_dir: PathBuf,
    pub transitions_dir: PathBuf,
}

impl Workspace {
    pub fn load(config_path: &str) -> EvsimResult<Workspace> {
        let config_p = Path::new(config_path);
        let config = read_config(config_p)?;
        info!("config: {:?}", config);

        let rules = validate_rules(&config.rules)?;
        let labels = validate_candidates(&config.candidates)?;

        let root_p = config_p
            .parent()
            .context(MissingParentDirSnafu { path: config_path })?;
        let settings = &config.output_settings;
        let results_dir = resolve_dir(root_p, &settings.results_directory, "polling_results");
        let tallies_dir =
            resolve_dir(root_p, &settings.tallies_directory, "electoral_vote_counts");
        let transitions_dir = resolve_dir(
            root_p,
            &settings.transitions_directory,
            "transition_frames",
        );
        // Frames of a previous batch are deleted wholesale.
        for (name, dir) in [
            ("resultsDirectory", &results_dir),
            ("talliesDirectory", &tallies_dir),
        ] {
            if same_dir(dir, &transitions_dir) {
                whatever!(
                    "transitionsDirectory must differ from {} ({:?})",
                    name,
                    dir
                );
            }
        }
        Ok(Workspace {
            contest_name: settings.contest_name.clone(),
            labels,
            rules,
            registry: RegionRegistry::united_states(),
            results_dir,
            tallies_dir,
            transitions_dir,
        })
    }

    fn persist(&self, snapshot: &Snapshot, tally: &Tally) -> EvsimResult<JSValue> {
        let snapshot_path = write_snapshot(&self.results_dir, snapshot, &self.labels)?;
        let tally_path = write_tally(&self.tallies_dir, snapshot.date(), tally, &self.labels)?;
        info!("wrote {:?} and {:?}", snapshot_path, tally_path);
        Ok(tally_to_json(snapshot.date(), tally, &self.labels))
    }
}

fn date_or_today(date: &Option<String>) -> EvsimResult<chrono::NaiveDate> {
    match date {
        Some(d) => parse_date(d),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Aggregates the polls of every region as of a date, and stores the snapshot and its tally.
///
/// If a reference tally is provided, the computed tally must match it.
pub fn run_simulate(
    config_path: &str,
    polls_path: &str,
    date: &Option<String>,
    reference_path: &Option<String>,
) -> EvsimResult<(Snapshot, Tally)> {
    let ws = Workspace::load(config_path)?;
    let today = date_or_today(date)?;
    info!("{}: simulating as of {}", ws.contest_name, today);

    let mut source = CsvPollSource::read(Path::new(polls_path), &ws.labels)?;
    let snapshot = aggregate_snapshot(
        &mut source,
        &ws.registry,
        today,
        &ws.labels,
        &ws.rules.aggregation,
    )
    .context(ForecastSnafu)?;
    let tally = compute_tally(&snapshot, &ws.registry).context(ForecastSnafu)?;
    info!(
        "{}: {} {}, {} {} ({} electors from {} polling, {} from the historical baseline)",
        today,
        ws.labels.candidate_a,
        tally.candidate_a,
        ws.labels.candidate_b,
        tally.candidate_b,
        tally.secondary_fallback_electors,
        ws.labels.secondary_candidate_b,
        tally.historical_fallback_electors
    );

    let tally_js = ws.persist(&snapshot, &tally)?;
    let pretty_js_stats = serde_json::to_string_pretty(&tally_js).context(WritingJsonSnafu {})?;
    println!("stats:{}", pretty_js_stats);

    // The reference tally, if provided for comparison
    if let Some(reference_p) = reference_path {
        let reference: JSValue = read_json(Path::new(reference_p))?;
        debug!("reference: {:?}", reference);
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(WritingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_stats {
            warn!("Found differences with the reference tally");
            print_diff(
                pretty_js_reference.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between the computed tally and the reference tally")
        }
    }
    Ok((snapshot, tally))
}

/// Fills a missing day between two stored snapshots.
pub fn run_interpolate(
    config_path: &str,
    before: &str,
    after: &str,
    date: &Option<String>,
) -> EvsimResult<(Snapshot, Tally)> {
    let ws = Workspace::load(config_path)?;
    let before_d = parse_date(before)?;
    let after_d = parse_date(after)?;
    let target = match date {
        Some(d) => parse_date(d)?,
        None => midpoint_date(before_d, after_d),
    };
    info!("interpolating {} between {} and {}", target, before_d, after_d);

    let before_s = load_snapshot(&ws.results_dir, before_d, &ws.registry, &ws.labels)?;
    let after_s = load_snapshot(&ws.results_dir, after_d, &ws.registry, &ws.labels)?;
    let (snapshot, tally) =
        reconstruct_midpoint(&before_s, &after_s, target, &ws.registry).context(ForecastSnafu)?;
    ws.persist(&snapshot, &tally)?;
    Ok((snapshot, tally))
}

/// Writes the frames of the transition between two stored snapshots.
pub fn run_animate(
    config_path: &str,
    from: &str,
    to: &str,
    frames: &Option<usize>,
) -> EvsimResult<Vec<PathBuf>> {
    let ws = Workspace::load(config_path)?;
    let count = match frames {
        Some(n) => check_frame_count("--frames", *n)?,
        None => ws.rules.frame_count,
    };
    let from_d = parse_date(from)?;
    let to_d = parse_date(to)?;

    let from_s = load_snapshot(&ws.results_dir, from_d, &ws.registry, &ws.labels)?;
    let to_s = load_snapshot(&ws.results_dir, to_d, &ws.registry, &ws.labels)?;
    let from_t = compute_tally(&from_s, &ws.registry).context(ForecastSnafu)?;
    let to_t = compute_tally(&to_s, &ws.registry).context(ForecastSnafu)?;

    let frames =
        blend_frames((&from_s, &from_t), (&to_s, &to_t), count).context(ForecastSnafu)?;
    let removed = clear_frames(&ws.transitions_dir)?;
    if removed > 0 {
        info!("removed {} frame files of a previous transition", removed);
    }
    let mut written: Vec<PathBuf> = Vec::new();
    for frame in frames.iter() {
        let (snapshot_p, tally_p) = write_frame(&ws.transitions_dir, frame, &ws.labels)?;
        written.push(snapshot_p);
        written.push(tally_p);
    }
    info!(
        "wrote {} frames from {} to {} in {:?}",
        frames.len(),
        from_d,
        to_d,
        ws.transitions_dir
    );
    Ok(written)
}

/// Describes what changed between the two most recent stored snapshots.
pub fn run_changes(config_path: &str, threshold: &Option<f64>) -> EvsimResult<Vec<String>> {
    let ws = Workspace::load(config_path)?;
    let threshold = match threshold {
        Some(t) if *t > 0.0 => *t,
        Some(t) => {
            whatever!("--threshold must be positive, got {}", t)
        }
        None => ws.rules.swing_threshold,
    };
    let history = load_history(&ws.results_dir, &ws.registry, &ws.labels)?;
    let report = what_changed(&history, threshold).context(ForecastSnafu)?;
    let mut lines = vec![format!(
        "Changes from {} to {}:",
        report.previous_date, report.current_date
    )];
    lines.extend(report.narrate(&ws.labels));
    Ok(lines)
}

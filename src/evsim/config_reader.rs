use std::fs;
use std::path::Path;

use electoral_forecast::interpolate::MAX_FRAME_COUNT;
use electoral_forecast::{AggregationRules, CandidateLabels, DEFAULT_SWING_THRESHOLD};
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::{whatever, ResultExt};

use crate::evsim::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "contestName")]
    pub contest_name: String,
    #[serde(rename = "resultsDirectory")]
    pub results_directory: Option<String>,
    #[serde(rename = "talliesDirectory")]
    pub tallies_directory: Option<String>,
    #[serde(rename = "transitionsDirectory")]
    pub transitions_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct CandidatesConfig {
    #[serde(rename = "candidateA")]
    pub candidate_a: String,
    #[serde(rename = "candidateB")]
    pub candidate_b: String,
    #[serde(rename = "secondaryCandidateB")]
    pub secondary_candidate_b: String,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(rename = "initialWindowWeeks")]
    pub initial_window_weeks: Option<u32>,
    #[serde(rename = "maxWindowWeeks")]
    pub max_window_weeks: Option<u32>,
    #[serde(rename = "lookbackWeeks")]
    pub lookback_weeks: Option<u32>,
    #[serde(rename = "maxFetchAttempts")]
    pub max_fetch_attempts: Option<u32>,
    #[serde(rename = "swingThreshold")]
    pub swing_threshold: Option<f64>,
    #[serde(rename = "transitionFrameCount")]
    pub transition_frame_count: Option<usize>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EvsimConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub candidates: CandidatesConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// The validated rules of a run.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct RunRules {
    pub aggregation: AggregationRules,
    pub swing_threshold: f64,
    pub frame_count: usize,
}

pub const DEFAULT_FRAME_COUNT: usize = 10;

pub fn read_config(path: &Path) -> EvsimResult<EvsimConfig> {
    let path_s = path.display().to_string();
    let config_str = fs::read_to_string(path).context(OpeningJsonSnafu {
        path: path_s.clone(),
    })?;
    let config: EvsimConfig =
        serde_json::from_str(&config_str).context(ParsingJsonSnafu { path: path_s })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

pub fn validate_rules(rules: &RulesConfig) -> EvsimResult<RunRules> {
    let defaults = AggregationRules::DEFAULT_RULES;
    let aggregation = AggregationRules {
        initial_window_weeks: match rules.initial_window_weeks {
            None => defaults.initial_window_weeks,
            Some(x) if x > 0 => x,
            Some(x) => {
                whatever!("initialWindowWeeks must be positive, got {}", x)
            }
        },
        max_window_weeks: match rules.max_window_weeks {
            None => defaults.max_window_weeks,
            Some(x) if x > 0 => x,
            Some(x) => {
                whatever!("maxWindowWeeks must be positive, got {}", x)
            }
        },
        lookback_weeks: rules.lookback_weeks.unwrap_or(defaults.lookback_weeks),
        max_fetch_attempts: match rules.max_fetch_attempts {
            None => defaults.max_fetch_attempts,
            Some(x) if x > 0 => x,
            Some(x) => {
                whatever!("maxFetchAttempts must be positive, got {}", x)
            }
        },
    };
    if aggregation.initial_window_weeks > aggregation.max_window_weeks {
        whatever!(
            "initialWindowWeeks ({}) is larger than maxWindowWeeks ({})",
            aggregation.initial_window_weeks,
            aggregation.max_window_weeks
        );
    }
    if aggregation.lookback_weeks < aggregation.max_window_weeks {
        whatever!(
            "lookbackWeeks ({}) is shorter than maxWindowWeeks ({})",
            aggregation.lookback_weeks,
            aggregation.max_window_weeks
        );
    }
    let swing_threshold = match rules.swing_threshold {
        None => DEFAULT_SWING_THRESHOLD,
        Some(x) if x > 0.0 && x.is_finite() => x,
        Some(x) => {
            whatever!("swingThreshold must be positive, got {}", x)
        }
    };
    let frame_count = match rules.transition_frame_count {
        None => DEFAULT_FRAME_COUNT,
        Some(x) => check_frame_count("transitionFrameCount", x)?,
    };
    Ok(RunRules {
        aggregation,
        swing_threshold,
        frame_count,
    })
}

/// Frames are told apart by their position in whole percents.
pub fn check_frame_count(name: &str, count: usize) -> EvsimResult<usize> {
    if count == 0 {
        whatever!("{} must be positive", name);
    }
    if count > MAX_FRAME_COUNT {
        whatever!(
            "{} is {}, at most {} frames can be written",
            name,
            count,
            MAX_FRAME_COUNT
        );
    }
    Ok(count)
}

pub fn validate_candidates(candidates: &CandidatesConfig) -> EvsimResult<CandidateLabels> {
    let names = [
        candidates.candidate_a.trim(),
        candidates.candidate_b.trim(),
        candidates.secondary_candidate_b.trim(),
    ];
    if let Some(empty) = names.iter().position(|n| n.is_empty()) {
        whatever!("candidate label #{} is empty", empty + 1);
    }
    for (idx, n) in names.iter().enumerate() {
        if names[idx + 1..].contains(n) {
            whatever!("candidate label {:?} is used more than once", n);
        }
    }
    Ok(CandidateLabels::new(names[0], names[1], names[2]))
}

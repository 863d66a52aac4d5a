use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use electoral_forecast::interpolate::FrameKey;
use log::debug;
use snafu::ResultExt;

use crate::evsim::*;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_date(value: &str) -> EvsimResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).context(ParsingDateSnafu { value })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Resolves a directory of the configuration against the directory of the config file.
pub fn resolve_dir(root: &Path, configured: &Option<String>, default: &str) -> PathBuf {
    let dir = configured.as_deref().unwrap_or(default);
    let p = Path::new(dir);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

/// Whether two directories are the same, following symbolic links when they exist.
pub fn same_dir(d1: &Path, d2: &Path) -> bool {
    match (fs::canonicalize(d1), fs::canonicalize(d2)) {
        (Ok(c1), Ok(c2)) => c1 == c2,
        _ => d1 == d2,
    }
}

pub fn ensure_dir(dir: &Path) -> EvsimResult<()> {
    fs::create_dir_all(dir).context(WritingFileSnafu {
        path: dir.display().to_string(),
    })
}

pub fn snapshot_file_name(date: NaiveDate) -> String {
    format!("polling_results_{}.json", format_date(date))
}

pub fn tally_file_name(date: NaiveDate) -> String {
    format!("electoral_votes_{}.json", format_date(date))
}

pub fn frame_snapshot_file_name(key: &FrameKey) -> String {
    format!(
        "polling_results_{}_{}.json",
        key.alpha_pct,
        format_date(key.base_date)
    )
}

pub fn frame_tally_file_name(key: &FrameKey) -> String {
    format!(
        "electoral_votes_{}_{}.json",
        key.alpha_pct,
        format_date(key.base_date)
    )
}

/// The date of a snapshot file name, if it follows `polling_results_<date>.json`.
/// Frame files do not match.
pub fn snapshot_file_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name
        .strip_prefix("polling_results_")?
        .strip_suffix(".json")?;
    let res = NaiveDate::parse_from_str(date, DATE_FORMAT).ok();
    if res.is_none() {
        debug!("snapshot_file_date: skipping {:?}", file_name);
    }
    res
}

/// The key of a frame file name, if it follows `polling_results_<pct>_<date>.json`
/// or `electoral_votes_<pct>_<date>.json`. Snapshot and tally files do not match.
pub fn frame_file_key(file_name: &str) -> Option<FrameKey> {
    let rest = file_name
        .strip_prefix("polling_results_")
        .or_else(|| file_name.strip_prefix("electoral_votes_"))?
        .strip_suffix(".json")?;
    let (pct, date) = rest.split_once('_')?;
    if pct.is_empty() || !pct.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(FrameKey {
        base_date: NaiveDate::parse_from_str(date, DATE_FORMAT).ok()?,
        alpha_pct: pct.parse().ok()?,
    })
}

/// Converts a region name as it appears in poll data to a registry key:
/// `New Hampshire` -> `new-hampshire`.
pub fn region_key(name: &str) -> String {
    name.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<String>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        let date = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();
        assert_eq!(snapshot_file_name(date), "polling_results_2024-09-03.json");
        assert_eq!(tally_file_name(date), "electoral_votes_2024-09-03.json");
        let key = FrameKey::new(date, 0.56);
        assert_eq!(
            frame_snapshot_file_name(&key),
            "polling_results_56_2024-09-03.json"
        );
        assert_eq!(snapshot_file_date("polling_results_2024-09-03.json"), Some(date));
        assert_eq!(snapshot_file_date("polling_results_56_2024-09-03.json"), None);
        assert_eq!(snapshot_file_date("electoral_votes_2024-09-03.json"), None);
        assert_eq!(frame_file_key("polling_results_56_2024-09-03.json"), Some(key));
        assert_eq!(frame_file_key(&frame_tally_file_name(&key)), Some(key));
        assert_eq!(frame_file_key("polling_results_2024-09-03.json"), None);
        assert_eq!(frame_file_key("electoral_votes_2024-09-03.json"), None);
        assert_eq!(frame_file_key("polling_results_x_2024-09-03.json"), None);
    }

    #[test]
    fn same_directories() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        fs::create_dir_all(&data).unwrap();
        assert!(same_dir(&data, &dir.path().join("./data")));
        assert!(!same_dir(&data, &dir.path().join("frames")));
    }

    #[test]
    fn region_names() {
        assert_eq!(region_key("New Hampshire"), "new-hampshire");
        assert_eq!(region_key("ohio"), "ohio");
        assert_eq!(region_key(" District of  Columbia "), "district-of-columbia");
    }

    #[test]
    fn dates() {
        assert!(parse_date("2024-13-01").is_err());
        assert_eq!(
            format_date(parse_date(" 2024-02-29").unwrap()),
            "2024-02-29"
        );
    }
}

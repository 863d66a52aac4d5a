// Poll source backed by a CSV file.

use std::collections::HashMap;
use std::path::Path;

use electoral_forecast::aggregator::{FetchError, PollQuery, PollSource};
use electoral_forecast::{CandidateLabels, RawPoll};
use log::{debug, info};
use snafu::{OptionExt, ResultExt};

use crate::evsim::io_common::{parse_date, region_key, simplify_file_name};
use crate::evsim::*;

const COLUMNS: [&str; 5] = ["region", "date", "opponent", "leader", "margin"];

/// Polls loaded from a file with the columns `region,date,opponent,leader,margin`.
///
/// `opponent` is the label standing for candidate B in the poll, which tells the
/// pairing. An empty `leader` is a dead heat.
#[derive(Debug, Clone)]
pub struct CsvPollSource {
    labels: CandidateLabels,
    // (region key, opponent label) -> polls in file order
    polls: HashMap<(String, String), Vec<RawPoll>>,
}

impl CsvPollSource {
    pub fn read(path: &Path, labels: &CandidateLabels) -> EvsimResult<CsvPollSource> {
        let path_s = path.display().to_string();
        let rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .context(CsvOpenSnafu {
                path: path_s.clone(),
            })?;

        let mut polls: HashMap<(String, String), Vec<RawPoll>> = HashMap::new();
        let mut count = 0;
        for (idx, line_r) in rdr.into_records().enumerate() {
            // The header is line 1.
            let lineno = idx + 2;
            let line = line_r.context(CsvLineParseSnafu {
                path: path_s.clone(),
                lineno,
            })?;
            let field = |col: usize| {
                line.get(col).context(CsvLineInvalidSnafu {
                    path: path_s.clone(),
                    lineno,
                    message: format!("missing column {}", COLUMNS[col]),
                })
            };
            let region = region_key(field(0)?);
            let date = parse_date(field(1)?)?;
            let opponent = field(2)?.to_string();
            let leader = match field(3)? {
                "" => None,
                x => Some(x.to_string()),
            };
            let margin_s = field(4)?;
            let margin: f64 = match margin_s.parse::<f64>() {
                Ok(x) if x >= 0.0 && x.is_finite() => x,
                _ => {
                    return CsvLineInvalidSnafu {
                        path: path_s.clone(),
                        lineno,
                        message: format!("invalid margin {:?}", margin_s),
                    }
                    .fail()
                }
            };
            debug!(
                "CsvPollSource::read: {}:{}: {} {} {:?} vs {} by {}",
                simplify_file_name(path),
                lineno,
                region,
                date,
                leader,
                opponent,
                margin
            );
            polls
                .entry((region, opponent))
                .or_default()
                .push(RawPoll {
                    date,
                    leader,
                    margin,
                });
            count += 1;
        }
        info!("CsvPollSource::read: {} polls read from {:?}", count, path_s);
        Ok(CsvPollSource {
            labels: labels.clone(),
            polls,
        })
    }

    /// The number of polls loaded.
    pub fn len(&self) -> usize {
        self.polls.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.is_empty()
    }
}

impl PollSource for CsvPollSource {
    fn fetch(&mut self, query: &PollQuery) -> Result<Vec<RawPoll>, FetchError> {
        let opponent = self.labels.pairing_label(query.pairing).to_string();
        Ok(self
            .polls
            .get(&(query.region.clone(), opponent))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use electoral_forecast::Pairing;
    use std::io::Write;

    fn labels() -> CandidateLabels {
        CandidateLabels::new("Trump", "Harris", "Biden")
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn query(region: &str, pairing: Pairing) -> PollQuery {
        PollQuery {
            region: region.to_string(),
            pairing,
            since: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    #[test]
    fn read_polls() {
        let f = write_csv(
            "region,date,opponent,leader,margin\n\
             New Hampshire,2024-08-30,Harris,Harris,4.5\n\
             new-hampshire,2024-08-29,Harris,,0\n\
             new-hampshire,2024-03-01,Biden,Trump,1\n",
        );
        let mut source = CsvPollSource::read(f.path(), &labels()).unwrap();
        assert_eq!(source.len(), 3);
        let primary = source.fetch(&query("new-hampshire", Pairing::Primary)).unwrap();
        assert_eq!(primary.len(), 2);
        assert_eq!(primary[0].leader.as_deref(), Some("Harris"));
        assert_eq!(primary[1].leader, None);
        let secondary = source
            .fetch(&query("new-hampshire", Pairing::Secondary))
            .unwrap();
        assert_eq!(secondary.len(), 1);
        assert!(source.fetch(&query("ohio", Pairing::Primary)).unwrap().is_empty());
    }

    #[test]
    fn negative_margin() {
        let f = write_csv("region,date,opponent,leader,margin\nohio,2024-08-30,Harris,Trump,-3\n");
        let res = CsvPollSource::read(f.path(), &labels());
        assert!(matches!(res, Err(EvsimError::CsvLineInvalid { lineno: 2, .. })));
    }

    #[test]
    fn bad_date() {
        let f = write_csv("region,date,opponent,leader,margin\nohio,08/30/2024,Harris,Trump,3\n");
        let res = CsvPollSource::read(f.path(), &labels());
        assert!(matches!(res, Err(EvsimError::ParsingDate { .. })));
    }
}

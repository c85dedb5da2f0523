//! CSV row parsing for the daily time-series feeds.
//!
//! Every feed shares one layout: a header row naming the location columns,
//! a few descriptive columns, then one column per day from a fixed offset to
//! the last column. The last column is "today".

use csv::{ReaderBuilder, StringRecord};

use crate::error::{Result, TrackerError};
use crate::models::{FeedRow, LocationKey};

/// Index of the first daily-count column.
pub const DEFAULT_FIRST_DATA_COLUMN: usize = 5;

/// Header names accepted for the state/province column.
const STATE_HEADERS: [&str; 2] = ["Province/State", "Province_State"];

/// Header names accepted for the country/region column.
const REGION_HEADERS: [&str; 2] = ["Country/Region", "Country_Region"];

/// Positions of the location-key columns, resolved from a header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedColumns {
    pub state: usize,
    pub region: usize,
}

impl FeedColumns {
    pub fn resolve(headers: &StringRecord) -> Result<Self> {
        let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h.trim()));

        let state = find(&STATE_HEADERS[..])
            .ok_or_else(|| TrackerError::malformed(1, format!("missing {} column", STATE_HEADERS[0])))?;
        let region = find(&REGION_HEADERS[..])
            .ok_or_else(|| TrackerError::malformed(1, format!("missing {} column", REGION_HEADERS[0])))?;

        Ok(Self { state, region })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeedParser {
    first_data_column: usize,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new(DEFAULT_FIRST_DATA_COLUMN)
    }
}

impl FeedParser {
    pub fn new(first_data_column: usize) -> Self {
        Self { first_data_column }
    }

    pub fn first_data_column(&self) -> usize {
        self.first_data_column
    }

    /// Parse one data row into a location key and its daily counts.
    pub fn parse_row(&self, columns: FeedColumns, record: &StringRecord, line: u64) -> Result<FeedRow> {
        let state = record
            .get(columns.state)
            .ok_or_else(|| TrackerError::malformed(line, "row has no state column"))?;
        let region = record
            .get(columns.region)
            .ok_or_else(|| TrackerError::malformed(line, "row has no region column"))?;

        if record.len() <= self.first_data_column {
            return Err(TrackerError::malformed(
                line,
                format!(
                    "row has {} columns, daily counts start at column {}",
                    record.len(),
                    self.first_data_column
                ),
            ));
        }

        let counts = record
            .iter()
            .enumerate()
            .skip(self.first_data_column)
            .map(|(column, cell)| {
                cell.trim().parse::<u64>().map_err(|_| {
                    TrackerError::malformed(
                        line,
                        format!("column {} is not a non-negative integer: {:?}", column, cell),
                    )
                })
            })
            .collect::<Result<Vec<u64>>>()?;

        Ok(FeedRow {
            key: LocationKey::new(state, region),
            counts,
        })
    }

    /// Parse a whole feed document. The first malformed row fails the feed.
    pub fn parse_feed(&self, text: &str) -> Result<Vec<FeedRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = reader.headers().map_err(csv_error)?.clone();
        let columns = FeedColumns::resolve(&headers)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(csv_error)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            rows.push(self.parse_row(columns, &record, line)?);
        }
        Ok(rows)
    }
}

fn csv_error(err: csv::Error) -> TrackerError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    TrackerError::malformed(line, err.to_string())
}

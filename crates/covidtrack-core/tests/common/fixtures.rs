use chrono::{DateTime, Utc};
use covidtrack_core::{LocationKey, LocationRecord, MetricKind, MetricSeries};

/// Header of a feed with three days of counts starting at column 5.
pub const HEADER: &str = "Province/State,Country/Region,Lat,Long,1/21/20,1/22/20,1/23/20,1/24/20";

/// Build a feed document from `(state, region, counts)` rows.
pub fn csv_feed(rows: &[(&str, &str, [u64; 3])]) -> String {
    let mut text = String::from(HEADER);
    for (state, region, counts) in rows {
        let region = if region.contains(',') {
            format!("\"{}\"", region)
        } else {
            region.to_string()
        };
        text.push_str(&format!(
            "\n{},{},0.0,0.0,0,{},{},{}",
            state, region, counts[0], counts[1], counts[2]
        ));
    }
    text
}

/// A record whose series were all ingested at `updated_on`.
#[allow(dead_code)]
pub fn record_updated_at(region: &str, infected: &[u64], updated_on: DateTime<Utc>) -> LocationRecord {
    let mut record = LocationRecord::new(LocationKey::new("", region));
    record.set(
        MetricKind::Infected,
        MetricSeries::from_counts(infected.to_vec(), updated_on),
    );
    for kind in [MetricKind::Dead, MetricKind::Recovered] {
        record.set(kind, MetricSeries::zero_filled(infected.len(), updated_on));
    }
    record.updated_on = Some(updated_on);
    record
}

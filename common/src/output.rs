// Measurement output consumption
//
// The external process writes either a single JSON object or an array of
// objects. Missing upstream data is a normal condition between runs, so
// every failure here degrades to an empty record set rather than an error.

use crate::models::MeasurementRecord;
use serde::Deserialize;
use std::path::Path;
use tracing::{instrument, warn};

/// The output file may hold one record or a whole run history.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OutputPayload {
    Many(Vec<MeasurementRecord>),
    One(MeasurementRecord),
}

/// Read and parse the measurement output file.
///
/// Soft-fails to an empty vec (with a warning) when the file is missing,
/// empty, or not valid JSON; a single object is normalized into a
/// one-element vec. Never returns an error to the caller.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_measurements<P: AsRef<Path>>(path: P) -> Vec<MeasurementRecord> {
    let path = path.as_ref();

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, "Measurement output file not readable");
            return Vec::new();
        }
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        warn!("Measurement output file is empty");
        return Vec::new();
    }

    match serde_json::from_str::<OutputPayload>(trimmed) {
        Ok(OutputPayload::Many(records)) => records,
        Ok(OutputPayload::One(record)) => vec![record],
        Err(e) => {
            warn!(error = %e, "Measurement output file contains invalid JSON");
            Vec::new()
        }
    }
}

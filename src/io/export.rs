//! CSV export of recorded epoch verdicts.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::conformance::recorder::Epoch;

/// Column header for the verdict table.
const HEADER: &str = "index,label,start_s,end_s,passed,\
                       olrt_min,olrt_max,ss_min,ss_max,ss_margin";

/// Exports recorded epochs to a CSV file at the given path.
///
/// Writes a header row followed by one data row per epoch, in recording
/// order. Produces deterministic output for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(epochs: &[Epoch], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(epochs, buf)
}

/// Writes recorded epochs as CSV to any writer.
///
/// Band edges and margin are left empty for epochs that were not
/// evaluated.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(epochs: &[Epoch], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    let num = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
    for (i, e) in epochs.iter().enumerate() {
        let c = e.criteria.as_ref();
        wtr.write_record(&[
            i.to_string(),
            e.label.clone(),
            format!("{:.3}", e.start),
            format!("{:.3}", e.end),
            e.passed.to_string(),
            num(c.map(|c| c.olrt.min)),
            num(c.map(|c| c.olrt.max)),
            num(c.map(|c| c.steady_state.min)),
            num(c.map(|c| c.steady_state.max)),
            num(e.ss_margin),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

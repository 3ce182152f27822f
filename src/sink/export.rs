//! Write stored records to flat files.

use std::io::{self, Write};

use crate::models::CandidateRecord;

/// CSV columns, in output order.
pub const CSV_HEADER: [&str; 8] = [
    "source_id",
    "fingerprint",
    "author",
    "rating",
    "text",
    "raw_date",
    "normalized_date",
    "observed_at",
];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(w: &mut W, row: &[&str]) -> io::Result<()> {
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            w.write_all(b",")?;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            w.write_all(cell.as_bytes())?;
        }
    }
    w.write_all(b"\n")
}

/// Write records as CSV with a header row.
pub fn write_csv<W: Write>(mut w: W, records: &[CandidateRecord]) -> io::Result<()> {
    write_row(&mut w, &CSV_HEADER)?;
    for r in records {
        let rating = r.rating.to_string();
        let observed_at = r.observed_at.to_rfc3339();
        write_row(
            &mut w,
            &[
                &r.source_id,
                &r.fingerprint,
                &r.author,
                &rating,
                &r.text,
                &r.raw_date,
                &r.normalized_date,
                &observed_at,
            ],
        )?;
    }
    w.flush()
}

/// Write records as JSON lines.
pub fn write_json_lines<W: Write>(mut w: W, records: &[CandidateRecord]) -> io::Result<()> {
    for r in records {
        serde_json::to_writer(&mut w, r)?;
        w.write_all(b"\n")?;
    }
    w.flush()
}

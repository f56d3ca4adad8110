use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::JobPosting;

pub const CSV_COLUMNS: [&str; 7] = [
    "title",
    "job_url",
    "posted_date",
    "location",
    "short_description",
    "section",
    "scraped_at",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => OutputFormat::Csv,
            _ => OutputFormat::Json,
        }
    }
}

/// Swaps a `.json` suffix for `.csv`, or appends `.csv` when the path has
/// neither.
pub fn csv_output_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.ends_with(".csv") {
        path.to_path_buf()
    } else if let Some(stem) = raw.strip_suffix(".json") {
        PathBuf::from(format!("{stem}.csv"))
    } else {
        PathBuf::from(format!("{raw}.csv"))
    }
}

pub fn write_json<W: Write>(postings: &[JobPosting], mut writer: W) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(&mut writer, postings)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(postings: &[JobPosting], writer: W) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    writer.write_record(CSV_COLUMNS)?;
    for posting in postings {
        writer.serialize(posting)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn save(postings: &[JobPosting], path: &Path, format: OutputFormat) -> Result<(), ExportError> {
    let file = BufWriter::new(File::create(path)?);
    match format {
        OutputFormat::Json => write_json(postings, file),
        OutputFormat::Csv => write_csv(postings, file),
    }?;
    log::info!("Saved {} job(s) to {}", postings.len(), path.display());
    Ok(())
}

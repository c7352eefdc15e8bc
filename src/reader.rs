/*!
 * CSV reader for visit exports
 *
 * Loads a delimited file into a [`RawTable`] without interpreting any cell.
 * Header matching, date parsing and flag parsing all happen later in the
 * normalizer, so the reader accepts any header set.
 */

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use csv::ReaderBuilder;
use tracing::{info, warn};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    Result, PerfError, ErrorContext,
    config::EngineConfig,
    data_types::RawTable,
};

/// Reader for visit export files
pub struct VisitReader {
    /// Field delimiter
    delimiter: u8,
    /// Whether to skip unreadable rows (true) or fail on the first one (false)
    skip_invalid_records: bool,
    /// Whether to show progress bar
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for VisitReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitReader {
    /// Create a reader for comma-separated files
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    /// Reader set up from engine configuration
    pub fn from_config(config: &EngineConfig) -> Self {
        #[cfg(not(feature = "progress"))]
        let _ = config;

        Self {
            #[cfg(feature = "progress")]
            show_progress_bar: config.enable_progress_bar,
            ..Self::new()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Enable or disable skipping unreadable rows
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load a file into a raw table
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<RawTable> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(PerfError::file_not_found_with_suggestion(path.to_path_buf()));
        }

        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let start_time = Instant::now();

        let table = self.read_with_context(file, Some(path), file_size)?;

        info!(
            path = %path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "loaded visit records"
        );
        Ok(table)
    }

    /// Read a table from any reader, e.g. an uploaded buffer
    pub fn read_from<R: Read>(&self, source: R) -> Result<RawTable> {
        self.read_with_context(source, None, 0)
    }

    fn read_with_context<R: Read>(&self, source: R, path: Option<&Path>, size_hint: u64) -> Result<RawTable> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(source);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| csv_error(e, path, Some(1)))?
            .iter()
            .map(|s| s.to_string())
            .collect();

        #[cfg(feature = "progress")]
        let progress_bar = self.progress_bar(size_hint);
        #[cfg(not(feature = "progress"))]
        let _ = size_hint;

        let mut rows = Vec::new();
        let mut skipped = 0usize;

        for result in reader.records() {
            match result {
                Ok(record) => {
                    #[cfg(feature = "progress")]
                    if let Some(ref pb) = progress_bar {
                        pb.set_position(record.position().map_or(0, |p| p.byte()));
                    }
                    rows.push(record.iter().map(|s| s.to_string()).collect());
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line() as usize);
                    let error = csv_error(e, path, line);
                    if self.skip_invalid_records {
                        skipped += 1;
                        warn!(%error, "skipping unreadable row");
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message("Loading complete");
        }

        if skipped > 0 {
            warn!(skipped, "skipped unreadable rows");
        }

        Ok(RawTable::new(headers, rows))
    }

    #[cfg(feature = "progress")]
    fn progress_bar(&self, size: u64) -> Option<ProgressBar> {
        if !self.show_progress_bar || size == 0 {
            return None;
        }
        let pb = ProgressBar::new(size);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }
}

fn csv_error(error: csv::Error, path: Option<&Path>, line: Option<usize>) -> PerfError {
    PerfError::CsvParse {
        message: format!("CSV error: {}", error),
        line,
        context: ErrorContext {
            file_path: path.map(Path::to_path_buf),
            line_number: line,
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_keeps_cells_verbatim() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "诊疗医生,身份证号,就诊日期").unwrap();
        writeln!(file, "Dr. A,110101,2024-03-01 09:00:00").unwrap();
        writeln!(file, "Dr. B,110102,").unwrap();
        file.flush().unwrap();

        let table = VisitReader::new().load(file.path()).unwrap();
        assert_eq!(table.headers, vec!["诊疗医生", "身份证号", "就诊日期"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), Some("2024-03-01 09:00:00"));
        assert_eq!(table.cell(1, 2), None);
    }

    #[test]
    fn test_short_rows_are_accepted() {
        let data = "provider,patient_id,visit_date\nA,1\nB,2,2024-03-01\n";
        let table = VisitReader::new().read_from(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 2), Some("2024-03-01"));
    }

    #[test]
    fn test_custom_delimiter() {
        let data = "provider;visit_date\nA;2024-03-01\n";
        let table = VisitReader::new().with_delimiter(b';').read_from(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["provider", "visit_date"]);
        assert_eq!(table.cell(0, 0), Some("A"));
    }

    #[test]
    fn test_invalid_utf8_row() {
        let mut data = b"provider,visit_date\n".to_vec();
        data.extend_from_slice(&[0xff, 0xfe, b',', b'x', b'\n']);
        data.extend_from_slice(b"B,2024-03-01\n");

        let err = VisitReader::new().read_from(data.as_slice()).unwrap_err();
        assert!(matches!(err, PerfError::CsvParse { .. }));

        let table = VisitReader::new()
            .with_skip_invalid_records(true)
            .read_from(data.as_slice())
            .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let err = VisitReader::new().load("/no/such/visits.csv").unwrap_err();
        assert!(matches!(err, PerfError::FileNotFound { .. }));
    }
}

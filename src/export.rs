/*!
 * Export of computed reports
 *
 * CSV export writes one file per table (statistics plus each subset that
 * exists); JSON export writes all tables into a single document. File names
 * carry the window so exports of different periods never collide.
 */

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::info;

use crate::columns::{CellValue, HeaderStyle};
use crate::constants::EXPORT_DATETIME_FORMAT;
use crate::data_types::{DateWindow, MetricGroups, NewRegistrationRow, SigningRow};
use crate::engine::PerformanceReport;
use crate::schema::VisitField;
use crate::subsets::SubsetTables;
use crate::{ExportFormat, PerfError, Result};

/// Trait for report exporters
pub trait ReportExporter {
    /// Export `report` into `dir`, returning the files written
    fn export(&self, report: &PerformanceReport, dir: &Path, stem: &str) -> Result<Vec<PathBuf>>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

/// Exporter for a format chosen at runtime
pub fn exporter_for(format: ExportFormat, style: HeaderStyle) -> Box<dyn ReportExporter> {
    match format {
        ExportFormat::Csv => Box::new(CsvExporter::new().with_header_style(style)),
        ExportFormat::Json => Box::new(JsonExporter::new().with_header_style(style)),
    }
}

fn prepare_dir(dir: &Path) -> Result<()> {
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

fn field_header(field: VisitField, style: HeaderStyle) -> &'static str {
    match style {
        HeaderStyle::English => field.canonical_name(),
        HeaderStyle::Chinese => field.source_label(),
    }
}

/// CSV exporter, one file per table
pub struct CsvExporter {
    /// Field delimiter
    pub delimiter: u8,
    /// Header language
    pub header_style: HeaderStyle,
}

impl Default for CsvExporter {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header_style: HeaderStyle::English,
        }
    }
}

impl CsvExporter {
    /// Create a new CSV exporter
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_header_style(mut self, style: HeaderStyle) -> Self {
        self.header_style = style;
        self
    }

    /// `<stem>_<table>_<start>_<end>.csv`
    pub fn file_name(stem: &str, table: &str, window: &DateWindow) -> String {
        format!("{}_{}_{}.csv", stem, table, window.file_tag())
    }

    fn write_table<I>(&self, path: &Path, headers: &[&str], rows: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_path(path)
            .map_err(write_error)?;

        writer.write_record(headers).map_err(write_error)?;
        for row in rows {
            writer.write_record(&row).map_err(write_error)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_registrations(&self, path: &Path, rows: &[NewRegistrationRow]) -> Result<()> {
        let headers = [
            field_header(VisitField::Provider, self.header_style),
            field_header(VisitField::PatientId, self.header_style),
            field_header(VisitField::RegistrationDate, self.header_style),
            field_header(VisitField::VisitDate, self.header_style),
        ];
        self.write_table(
            path,
            &headers,
            rows.iter().map(|r| {
                vec![
                    r.provider.clone(),
                    r.patient_id.clone(),
                    r.registration_date.format(EXPORT_DATETIME_FORMAT).to_string(),
                    r.visit_date.format(EXPORT_DATETIME_FORMAT).to_string(),
                ]
            }),
        )
    }

    fn write_signings(&self, path: &Path, rows: &[SigningRow]) -> Result<()> {
        let headers = [
            field_header(VisitField::Provider, self.header_style),
            field_header(VisitField::PatientId, self.header_style),
            field_header(VisitField::SigningDate, self.header_style),
        ];
        self.write_table(
            path,
            &headers,
            rows.iter().map(|r| {
                vec![
                    r.provider.clone(),
                    r.patient_id.clone(),
                    r.signing_date.format(EXPORT_DATETIME_FORMAT).to_string(),
                ]
            }),
        )
    }
}

fn write_error(error: csv::Error) -> PerfError {
    PerfError::Export {
        message: error.to_string(),
        format: ExportFormat::Csv,
        suggestion: Some("Check that the output directory is writable".to_string()),
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, report: &PerformanceReport, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        prepare_dir(dir)?;
        let window = &report.window;
        let mut written = Vec::new();

        let table = report.table();
        let headers = table.headers(self.header_style);
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
        let path = dir.join(Self::file_name(stem, "statistics", window));
        self.write_table(
            &path,
            &header_refs,
            table.rows.iter().map(|row| row.iter().map(CellValue::to_field).collect()),
        )?;
        written.push(path);

        if let Some(rows) = &report.subsets.new_registrations {
            let path = dir.join(Self::file_name(stem, "new_registrations", window));
            self.write_registrations(&path, rows)?;
            written.push(path);
        }
        if let Some(rows) = &report.subsets.new_signings {
            let path = dir.join(Self::file_name(stem, "new_signings", window));
            self.write_signings(&path, rows)?;
            written.push(path);
        }
        if let Some(rows) = &report.subsets.health_hut_signings {
            let path = dir.join(Self::file_name(stem, "health_hut_signings", window));
            self.write_signings(&path, rows)?;
            written.push(path);
        }

        info!(files = written.len(), dir = %dir.display(), "exported report as CSV");
        Ok(written)
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }
}

/// JSON exporter, one document per report
pub struct JsonExporter {
    /// Whether to pretty-print the JSON
    pub pretty_print: bool,
    /// Header language for the statistics table
    pub header_style: HeaderStyle,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self {
            pretty_print: true,
            header_style: HeaderStyle::English,
        }
    }
}

#[derive(Serialize)]
struct StatisticsDocument<'a> {
    columns: Vec<String>,
    rows: &'a [Vec<CellValue>],
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    window: DateWindow,
    groups: MetricGroups,
    statistics: StatisticsDocument<'a>,
    subsets: &'a SubsetTables,
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Set pretty printing
    pub fn with_pretty_print(mut self, pretty: bool) -> Self {
        self.pretty_print = pretty;
        self
    }

    pub fn with_header_style(mut self, style: HeaderStyle) -> Self {
        self.header_style = style;
        self
    }

    /// Render the report document as a JSON value
    pub fn to_value(&self, report: &PerformanceReport) -> Result<serde_json::Value> {
        let table = report.table();
        let document = ReportDocument {
            window: report.window,
            groups: report.groups,
            statistics: StatisticsDocument {
                columns: table.headers(self.header_style),
                rows: &table.rows,
            },
            subsets: &report.subsets,
        };
        Ok(serde_json::to_value(&document)?)
    }
}

impl ReportExporter for JsonExporter {
    fn export(&self, report: &PerformanceReport, dir: &Path, stem: &str) -> Result<Vec<PathBuf>> {
        prepare_dir(dir)?;
        let path = dir.join(format!("{}_{}.json", stem, report.window.file_tag()));
        let value = self.to_value(report)?;

        let writer = BufWriter::new(File::create(&path)?);
        if self.pretty_print {
            serde_json::to_writer_pretty(writer, &value)?;
        } else {
            serde_json::to_writer(writer, &value)?;
        }

        info!(path = %path.display(), "exported report as JSON");
        Ok(vec![path])
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }
}

/*!
 * Column organization and flat table rendering
 *
 * The statistics table always comes out in the same topical order: identity
 * and visit count, then registration columns, then signing columns. Columns
 * outside that list (added by the surrounding layer) follow in the order they
 * were added.
 */

use std::fmt;
use serde::{Deserialize, Serialize};

use crate::aggregate::ProviderStatistics;
use crate::data_types::MetricGroups;
use crate::{PerfError, Result};

/// Language used for rendered column headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderStyle {
    #[default]
    English,
    Chinese,
}

/// Optional metric group a column belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnGroup {
    Base,
    NewRegistrations,
    NewSignings,
}

/// A column of the statistics table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Provider,
    VisitCount,
    RegisteredLocally,
    RegisteredExternally,
    RemainingUnregistered,
    RegistrationRate,
    RegistrationRank,
    NewRegistrations,
    NewRegistrationRate,
    NewRegistrationRank,
    SignedLocally,
    SignedExternally,
    HealthHutSigned,
    RemainingUnsigned,
    SigningRate,
    SigningRank,
    NewSignings,
    NewSigningRate,
    NewSigningRank,
    NewSigningCountRank,
    NewHealthHutSignings,
    /// Column added by a caller, kept after the known ones
    Extra(String),
}

/// Fixed output order of the known columns
pub static COLUMN_ORDER: [Column; 21] = [
    Column::Provider,
    Column::VisitCount,
    Column::RegisteredLocally,
    Column::RegisteredExternally,
    Column::RemainingUnregistered,
    Column::RegistrationRate,
    Column::RegistrationRank,
    Column::NewRegistrations,
    Column::NewRegistrationRate,
    Column::NewRegistrationRank,
    Column::SignedLocally,
    Column::SignedExternally,
    Column::HealthHutSigned,
    Column::RemainingUnsigned,
    Column::SigningRate,
    Column::SigningRank,
    Column::NewSignings,
    Column::NewSigningRate,
    Column::NewSigningRank,
    Column::NewSigningCountRank,
    Column::NewHealthHutSignings,
];

/// Order in which the pipeline stages add columns: aggregation, subset
/// merges, then ranking
static PRODUCTION_ORDER: [Column; 21] = [
    Column::Provider,
    Column::VisitCount,
    Column::RegisteredLocally,
    Column::RegisteredExternally,
    Column::SignedLocally,
    Column::SignedExternally,
    Column::HealthHutSigned,
    Column::RemainingUnregistered,
    Column::RemainingUnsigned,
    Column::RegistrationRate,
    Column::SigningRate,
    Column::NewRegistrations,
    Column::NewRegistrationRate,
    Column::NewSignings,
    Column::NewSigningRate,
    Column::NewHealthHutSignings,
    Column::RegistrationRank,
    Column::SigningRank,
    Column::NewRegistrationRank,
    Column::NewSigningRank,
    Column::NewSigningCountRank,
];

impl Column {
    /// Stable snake_case identifier, also the English header
    pub fn key(&self) -> &str {
        match self {
            Column::Provider => "provider",
            Column::VisitCount => "visit_count",
            Column::RegisteredLocally => "registered_locally",
            Column::RegisteredExternally => "registered_externally",
            Column::RemainingUnregistered => "remaining_unregistered",
            Column::RegistrationRate => "registration_rate",
            Column::RegistrationRank => "registration_rank",
            Column::NewRegistrations => "new_registrations",
            Column::NewRegistrationRate => "new_registration_rate",
            Column::NewRegistrationRank => "new_registration_rank",
            Column::SignedLocally => "signed_locally",
            Column::SignedExternally => "signed_externally",
            Column::HealthHutSigned => "health_hut_signed",
            Column::RemainingUnsigned => "remaining_unsigned",
            Column::SigningRate => "signing_rate",
            Column::SigningRank => "signing_rank",
            Column::NewSignings => "new_signings",
            Column::NewSigningRate => "new_signing_rate",
            Column::NewSigningRank => "new_signing_rank",
            Column::NewSigningCountRank => "new_signing_count_rank",
            Column::NewHealthHutSignings => "new_health_hut_signings",
            Column::Extra(name) => name,
        }
    }

    /// Header in the dashboard's original language
    pub fn chinese_label(&self) -> &str {
        match self {
            Column::Provider => "诊疗医生",
            Column::VisitCount => "就诊人数",
            Column::RegisteredLocally => "本机构建档人数",
            Column::RegisteredExternally => "外机构建档人数",
            Column::RemainingUnregistered => "未建档人数",
            Column::RegistrationRate => "建档率",
            Column::RegistrationRank => "建档率排名",
            Column::NewRegistrations => "新建档人数",
            Column::NewRegistrationRate => "新建档率",
            Column::NewRegistrationRank => "新建档率排名",
            Column::SignedLocally => "本机构签约人数",
            Column::SignedExternally => "外机构签约人数",
            Column::HealthHutSigned => "健康小屋签约人数",
            Column::RemainingUnsigned => "未签约人数",
            Column::SigningRate => "签约率",
            Column::SigningRank => "签约率排名",
            Column::NewSignings => "新签约人数",
            Column::NewSigningRate => "新签约率",
            Column::NewSigningRank => "新签约率排名",
            Column::NewSigningCountRank => "新签约人数排名",
            Column::NewHealthHutSignings => "健康小屋新签约人数",
            Column::Extra(name) => name,
        }
    }

    pub fn header(&self, style: HeaderStyle) -> &str {
        match style {
            HeaderStyle::English => self.key(),
            HeaderStyle::Chinese => self.chinese_label(),
        }
    }

    /// Parse an English key back into a known column
    pub fn from_key(key: &str) -> Option<Column> {
        COLUMN_ORDER.iter().find(|c| c.key() == key).cloned()
    }

    pub fn group(&self) -> ColumnGroup {
        match self {
            Column::NewRegistrations | Column::NewRegistrationRate | Column::NewRegistrationRank => {
                ColumnGroup::NewRegistrations
            }
            Column::NewSignings
            | Column::NewSigningRate
            | Column::NewSigningRank
            | Column::NewSigningCountRank
            | Column::NewHealthHutSignings => ColumnGroup::NewSignings,
            _ => ColumnGroup::Base,
        }
    }

    /// Whether the column exists for an input with these metric groups
    pub fn is_available(&self, groups: MetricGroups) -> bool {
        match self.group() {
            ColumnGroup::Base => true,
            ColumnGroup::NewRegistrations => groups.new_registrations,
            ColumnGroup::NewSignings => groups.new_signings,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Column::Extra(_))
    }

    /// Cell of this column for one provider. `None` for caller-added
    /// columns and for columns of an absent metric group.
    pub fn cell(&self, stats: &ProviderStatistics) -> Option<CellValue> {
        let reg = stats.new_registrations;
        let sign = stats.new_signings;
        let value = match self {
            Column::Provider => CellValue::Text(stats.provider.clone()),
            Column::VisitCount => CellValue::Count(stats.visit_count),
            Column::RegisteredLocally => CellValue::Count(stats.registered_locally),
            Column::RegisteredExternally => CellValue::Count(stats.registered_externally),
            Column::RemainingUnregistered => CellValue::Count(stats.remaining_unregistered),
            Column::RegistrationRate => CellValue::Rate(stats.registration_rate),
            Column::RegistrationRank => CellValue::Rank(stats.registration_rank),
            Column::NewRegistrations => CellValue::Count(reg?.count),
            Column::NewRegistrationRate => CellValue::Rate(reg?.rate),
            Column::NewRegistrationRank => CellValue::Rank(reg?.rank),
            Column::SignedLocally => CellValue::Count(stats.signed_locally),
            Column::SignedExternally => CellValue::Count(stats.signed_externally),
            Column::HealthHutSigned => CellValue::Count(stats.health_hut_signed),
            Column::RemainingUnsigned => CellValue::Count(stats.remaining_unsigned),
            Column::SigningRate => CellValue::Rate(stats.signing_rate),
            Column::SigningRank => CellValue::Rank(stats.signing_rank),
            Column::NewSignings => CellValue::Count(sign?.count),
            Column::NewSigningRate => CellValue::Rate(sign?.rate),
            Column::NewSigningRank => CellValue::Rank(sign?.rate_rank),
            Column::NewSigningCountRank => CellValue::Rank(sign?.count_rank),
            Column::NewHealthHutSignings => CellValue::Count(sign?.health_hut_count),
            Column::Extra(_) => return None,
        };
        Some(value)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One cell of a rendered table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Count(u64),
    Rate(f64),
    Rank(u32),
}

impl CellValue {
    /// Numeric value, `None` for text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Text(_) => None,
            CellValue::Count(n) => Some(*n as f64),
            CellValue::Rate(r) => Some(*r),
            CellValue::Rank(r) => Some(f64::from(*r)),
        }
    }

    /// Raw value for file export; rates stay fractions
    pub fn to_field(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Count(n) => n.to_string(),
            CellValue::Rate(r) => r.to_string(),
            CellValue::Rank(r) => r.to_string(),
        }
    }
}

/// Rates display as percentages
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Count(n) => write!(f, "{}", n),
            CellValue::Rate(r) => write!(f, "{:.2}%", r * 100.0),
            CellValue::Rank(r) => write!(f, "{}", r),
        }
    }
}

/// Known columns in fixed order, then any other columns in the order given
pub fn organize_columns(columns: &[Column]) -> Vec<Column> {
    let known = COLUMN_ORDER.iter().filter(|c| columns.contains(c)).cloned();
    let extra = columns.iter().filter(|c| !c.is_known()).cloned();
    known.chain(extra).collect()
}

/// Flat statistics table, one row per provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
}

impl StatisticsTable {
    /// Render statistics with the columns the metric groups allow, organized
    pub fn from_statistics(stats: &[ProviderStatistics], groups: MetricGroups) -> Self {
        let columns: Vec<Column> = PRODUCTION_ORDER
            .iter()
            .filter(|c| c.is_available(groups))
            .cloned()
            .collect();

        let rows = stats
            .iter()
            .map(|s| {
                columns
                    .iter()
                    .filter_map(|c| c.cell(s))
                    .collect::<Vec<CellValue>>()
            })
            .collect();

        StatisticsTable { columns, rows }.organized()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &Column) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn get(&self, row: usize, column: &Column) -> Option<&CellValue> {
        self.rows.get(row)?.get(self.column_index(column)?)
    }

    pub fn headers(&self, style: HeaderStyle) -> Vec<String> {
        self.columns.iter().map(|c| c.header(style).to_string()).collect()
    }

    /// Append a column with one value per row
    pub fn push_column(&mut self, column: Column, values: Vec<CellValue>) -> Result<()> {
        if self.column_index(&column).is_some() {
            return Err(PerfError::Custom {
                message: format!("Column '{}' already exists", column),
                suggestion: None,
            });
        }
        if values.len() != self.rows.len() {
            return Err(PerfError::Custom {
                message: format!(
                    "Column '{}' has {} values for {} rows",
                    column,
                    values.len(),
                    self.rows.len()
                ),
                suggestion: Some("Supply exactly one value per provider row".to_string()),
            });
        }

        self.columns.push(column);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// The same table with its columns in the fixed order
    pub fn organized(self) -> Self {
        let order = organize_columns(&self.columns);
        let indices: Vec<usize> = order
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();

        let rows = self
            .rows
            .into_iter()
            .map(|row| indices.iter().filter_map(|&i| row.get(i).cloned()).collect())
            .collect();

        StatisticsTable { columns: order, rows }
    }
}

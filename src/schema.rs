/*!
 * Schema definitions for visit record tables
 *
 * Maps the logical visit fields onto whatever headers the input table
 * carries. Every field answers to its canonical snake_case name and to the
 * header used by the original registration dashboard; configuration can add
 * further aliases.
 */

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use serde::{Deserialize, Serialize};

use crate::{PerfError, Result};

/// Logical columns of a visit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitField {
    Provider,
    PatientId,
    VisitDate,
    RegistrationDate,
    SigningDate,
    RegisteredLocally,
    RegisteredExternally,
    SignedLocally,
    SignedExternally,
    TeamName,
}

impl VisitField {
    /// All fields in schema order
    pub const ALL: [VisitField; 10] = [
        VisitField::Provider,
        VisitField::PatientId,
        VisitField::VisitDate,
        VisitField::RegistrationDate,
        VisitField::SigningDate,
        VisitField::RegisteredLocally,
        VisitField::RegisteredExternally,
        VisitField::SignedLocally,
        VisitField::SignedExternally,
        VisitField::TeamName,
    ];

    /// The four origin indicator fields
    pub const ORIGIN_FLAGS: [VisitField; 4] = [
        VisitField::RegisteredLocally,
        VisitField::RegisteredExternally,
        VisitField::SignedLocally,
        VisitField::SignedExternally,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            VisitField::Provider => "provider",
            VisitField::PatientId => "patient_id",
            VisitField::VisitDate => "visit_date",
            VisitField::RegistrationDate => "registration_date",
            VisitField::SigningDate => "signing_date",
            VisitField::RegisteredLocally => "registered_locally",
            VisitField::RegisteredExternally => "registered_externally",
            VisitField::SignedLocally => "signed_locally",
            VisitField::SignedExternally => "signed_externally",
            VisitField::TeamName => "team_name",
        }
    }

    /// Header used by the original dashboard exports
    pub fn source_label(&self) -> &'static str {
        match self {
            VisitField::Provider => "诊疗医生",
            VisitField::PatientId => "身份证号",
            VisitField::VisitDate => "就诊日期",
            VisitField::RegistrationDate => "建档日期",
            VisitField::SigningDate => "签约日期",
            VisitField::RegisteredLocally => "是否本机构建档",
            VisitField::RegisteredExternally => "是否外机构建档",
            VisitField::SignedLocally => "是否本机构签约",
            VisitField::SignedExternally => "是否外机构签约",
            VisitField::TeamName => "团队名称",
        }
    }

    /// Whether the computation is undefined without this field
    pub fn is_required(&self) -> bool {
        !matches!(
            self,
            VisitField::RegistrationDate | VisitField::SigningDate | VisitField::TeamName
        )
    }

    /// Look a field up by its canonical name
    pub fn from_canonical(name: &str) -> Option<Self> {
        let name = normalize_header(name);
        Self::ALL.into_iter().find(|f| f.canonical_name() == name)
    }
}

impl fmt::Display for VisitField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.canonical_name(), self.source_label())
    }
}

/// Trim, drop a UTF-8 byte order mark and lowercase a header
pub fn normalize_header(header: &str) -> String {
    header.trim().trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Column positions resolved against a concrete header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    indices: HashMap<VisitField, usize>,
}

impl ColumnMap {
    /// Position of a field in the row, if the input carries it
    pub fn get(&self, field: VisitField) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    pub fn has(&self, field: VisitField) -> bool {
        self.indices.contains_key(&field)
    }
}

/// Visit table schema
pub struct VisitSchema;

impl VisitSchema {
    /// Canonical column names in schema order
    pub fn column_names() -> Vec<&'static str> {
        VisitField::ALL.iter().map(|f| f.canonical_name()).collect()
    }

    /// Fields that must be present in every input
    pub fn required_fields() -> Vec<VisitField> {
        VisitField::ALL.into_iter().filter(|f| f.is_required()).collect()
    }

    /// Resolve header positions for every known field.
    ///
    /// `extra_aliases` is keyed by canonical field name. When several headers
    /// match one field the leftmost wins. Fails with a schema error listing
    /// every required field that matched no header.
    pub fn resolve(
        headers: &[String],
        extra_aliases: &BTreeMap<String, Vec<String>>,
    ) -> Result<ColumnMap> {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
        let mut indices = HashMap::new();

        for field in VisitField::ALL {
            let mut accepted = vec![
                field.canonical_name().to_string(),
                normalize_header(field.source_label()),
            ];
            if let Some(aliases) = extra_aliases.get(field.canonical_name()) {
                accepted.extend(aliases.iter().map(|a| normalize_header(a)));
            }

            if let Some(index) = normalized.iter().position(|h| accepted.contains(h)) {
                indices.insert(field, index);
            }
        }

        let missing: Vec<String> = Self::required_fields()
            .into_iter()
            .filter(|f| !indices.contains_key(f))
            .map(|f| f.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(PerfError::missing_columns(missing, headers));
        }

        Ok(ColumnMap { indices })
    }
}

use std::collections::HashMap;

pub const FIELD_DELIMITER: char = '|';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    CallType,
    ANumber,
    BNumber,
    CNumber,
    Date,
    Duration,
    LacCi,
    Imei,
    ImeiType,
    Imsi,
    SiteName,
    Latitude,
    Longitude,
}

impl Column {
    const POSITIONAL: [Column; 8] = [
        Self::CallType,
        Self::ANumber,
        Self::BNumber,
        Self::CNumber,
        Self::Date,
        Self::Duration,
        Self::LacCi,
        Self::Imei,
    ];

    const REQUIRED: [Column; 5] = [
        Self::CallType,
        Self::ANumber,
        Self::BNumber,
        Self::Date,
        Self::Duration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CallType => "call_type",
            Self::ANumber => "anumber",
            Self::BNumber => "bnumber",
            Self::CNumber => "cnumber",
            Self::Date => "date",
            Self::Duration => "duration",
            Self::LacCi => "lac_ci",
            Self::Imei => "imei",
            Self::ImeiType => "imei_type",
            Self::Imsi => "imsi",
            Self::SiteName => "sitename",
            Self::Latitude => "latitude",
            Self::Longitude => "longitude",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "call_type" => Some(Self::CallType),
            "anumber" => Some(Self::ANumber),
            "bnumber" => Some(Self::BNumber),
            "cnumber" => Some(Self::CNumber),
            "date" => Some(Self::Date),
            "duration" => Some(Self::Duration),
            "lac_ci" => Some(Self::LacCi),
            "imei" => Some(Self::Imei),
            "imei_type" => Some(Self::ImeiType),
            "imsi" => Some(Self::Imsi),
            "sitename" => Some(Self::SiteName),
            "latitude" => Some(Self::Latitude),
            "longitude" => Some(Self::Longitude),
            _ => None,
        }
    }
}

/// Column layout of one input file: either the fixed positional layout or
/// the one announced by a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSchema {
    width: usize,
    positions: HashMap<Column, usize>,
}

impl RecordSchema {
    pub fn positional() -> Self {
        let positions = Column::POSITIONAL
            .iter()
            .enumerate()
            .map(|(index, column)| (*column, index))
            .collect();
        Self {
            width: Column::POSITIONAL.len(),
            positions,
        }
    }

    /// Unknown header names still count toward the row width but map to no
    /// column.
    pub fn from_header(line: &str) -> Result<Self, String> {
        let names: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        let mut positions = HashMap::new();

        for (index, name) in names.iter().enumerate() {
            if let Some(column) = Column::from_header(name) {
                if positions.insert(column, index).is_some() {
                    return Err(format!("duplicate header column '{}'", column.as_str()));
                }
            }
        }

        let missing: Vec<&str> = Column::REQUIRED
            .iter()
            .filter(|column| !positions.contains_key(column))
            .map(|column| column.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!(
                "header is missing required columns: {}",
                missing.join(", ")
            ));
        }

        Ok(Self {
            width: names.len(),
            positions,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn position(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    pub fn field<'a>(&self, fields: &[&'a str], column: Column) -> Option<&'a str> {
        self.position(column)
            .and_then(|index| fields.get(index))
            .map(|value| value.trim())
    }
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::positional()
    }
}

pub fn is_header_line(line: &str) -> bool {
    line.split(FIELD_DELIMITER)
        .next()
        .is_some_and(|first| first.trim().eq_ignore_ascii_case(Column::CallType.as_str()))
}

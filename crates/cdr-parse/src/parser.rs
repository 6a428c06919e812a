use std::str::Lines;

use cdr_config::ParserConfig;
use cdr_core::{Record, RecordDetails};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{Column, FIELD_DELIMITER, RecordSchema, is_header_line};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectKind {
    MalformedRow,
    InvalidDuration,
    InvalidTimestamp,
}

impl RejectKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MalformedRow => "MalformedRow",
            Self::InvalidDuration => "InvalidDuration",
            Self::InvalidTimestamp => "InvalidTimestamp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("malformed row: {detail}")]
    MalformedRow { detail: String },
    #[error("invalid duration '{value}'")]
    InvalidDuration { value: String },
    #[error("invalid timestamp '{value}'")]
    InvalidTimestamp { value: String },
}

impl RejectReason {
    pub fn kind(&self) -> RejectKind {
        match self {
            Self::MalformedRow { .. } => RejectKind::MalformedRow,
            Self::InvalidDuration { .. } => RejectKind::InvalidDuration,
            Self::InvalidTimestamp { .. } => RejectKind::InvalidTimestamp,
        }
    }

    fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedRow {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {reason}")]
pub struct RejectedLine {
    pub line_number: usize,
    pub reason: RejectReason,
    pub raw: String,
}

impl RejectedLine {
    pub fn kind(&self) -> RejectKind {
        self.reason.kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    placeholders: Vec<String>,
    timestamp_format: String,
}

impl ParserOptions {
    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            placeholders: config
                .placeholders
                .iter()
                .map(|value| value.trim().to_ascii_uppercase())
                .filter(|value| !value.is_empty())
                .collect(),
            timestamp_format: config.timestamp_format.clone(),
        }
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        let value = value.trim();
        value.is_empty()
            || self
                .placeholders
                .iter()
                .any(|placeholder| placeholder.eq_ignore_ascii_case(value))
    }
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::from_config(&ParserConfig::default())
    }
}

/// Turns one delimited row into a validated [`Record`]. Pure: no state is
/// carried between rows.
#[derive(Debug, Clone, Default)]
pub struct RecordParser {
    options: ParserOptions,
    schema: RecordSchema,
}

impl RecordParser {
    pub fn new(options: ParserOptions, schema: RecordSchema) -> Self {
        Self { options, schema }
    }

    pub fn parse(&self, line: &str) -> Result<Record, RejectReason> {
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != self.schema.width() {
            return Err(RejectReason::malformed(format!(
                "expected {} fields, found {}",
                self.schema.width(),
                fields.len()
            )));
        }

        let a_number = self
            .identifier(&fields, Column::ANumber)
            .ok_or_else(|| RejectReason::malformed("anumber is empty or a placeholder"))?;

        let raw_duration = self.schema.field(&fields, Column::Duration).unwrap_or("");
        let duration_seconds =
            parse_duration(raw_duration).ok_or_else(|| RejectReason::InvalidDuration {
                value: raw_duration.to_owned(),
            })?;

        let raw_timestamp = self.schema.field(&fields, Column::Date).unwrap_or("");
        let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, &self.options.timestamp_format)
            .map_err(|_| RejectReason::InvalidTimestamp {
                value: raw_timestamp.to_owned(),
            })?;

        Ok(Record {
            call_type: self
                .schema
                .field(&fields, Column::CallType)
                .unwrap_or("")
                .to_owned(),
            a_number,
            b_number: self.identifier(&fields, Column::BNumber),
            c_number: self.identifier(&fields, Column::CNumber),
            timestamp,
            duration_seconds,
            location_code: self.identifier(&fields, Column::LacCi),
            imei: self.identifier(&fields, Column::Imei),
            details: RecordDetails {
                imei_type: self.identifier(&fields, Column::ImeiType),
                imsi: self.identifier(&fields, Column::Imsi),
                site_name: self.identifier(&fields, Column::SiteName),
                latitude: self.identifier(&fields, Column::Latitude),
                longitude: self.identifier(&fields, Column::Longitude),
            },
        })
    }

    pub fn parse_line(&self, line_number: usize, line: &str) -> Result<Record, RejectedLine> {
        self.parse(line).map_err(|reason| RejectedLine {
            line_number,
            reason,
            raw: line.to_owned(),
        })
    }

    fn identifier(&self, fields: &[&str], column: Column) -> Option<String> {
        self.schema
            .field(fields, column)
            .filter(|value| !self.options.is_placeholder(value))
            .map(str::to_owned)
    }
}

/// Parses a single positional row with default options.
pub fn parse_line(line: &str) -> Result<Record, RejectedLine> {
    RecordParser::default().parse_line(1, line)
}

/// Lazily parses file content. A leading `CALL_TYPE|...` row switches the
/// stream to header-mapped columns; blank lines are skipped without being
/// reported.
pub fn parse_lines(input: &str, options: ParserOptions) -> RecordStream<'_> {
    RecordStream {
        lines: input.lines(),
        line_number: 0,
        seen_content: false,
        parser: RecordParser::new(options, RecordSchema::positional()),
    }
}

pub struct RecordStream<'a> {
    lines: Lines<'a>,
    line_number: usize,
    seen_content: bool,
    parser: RecordParser,
}

impl Iterator for RecordStream<'_> {
    type Item = Result<Record, RejectedLine>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            if !self.seen_content {
                self.seen_content = true;
                if is_header_line(line) {
                    match RecordSchema::from_header(line) {
                        Ok(schema) => {
                            self.parser.schema = schema;
                            continue;
                        }
                        Err(detail) => {
                            tracing::debug!(
                                line = self.line_number,
                                detail = %detail,
                                "unusable header row, keeping positional columns"
                            );
                            return Some(Err(RejectedLine {
                                line_number: self.line_number,
                                reason: RejectReason::malformed(detail),
                                raw: line.to_owned(),
                            }));
                        }
                    }
                }
            }

            let parsed = self.parser.parse_line(self.line_number, line);
            if let Err(rejected) = &parsed {
                tracing::debug!(
                    line = rejected.line_number,
                    kind = rejected.kind().as_str(),
                    reason = %rejected.reason,
                    "rejected CDR row"
                );
            }
            return Some(parsed);
        }
    }
}

fn parse_duration(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }

    // Exporters sometimes write whole seconds as "60.0".
    let (whole, fraction) = value.split_once('.')?;
    if whole.is_empty() || fraction.is_empty() || !fraction.chars().all(|ch| ch == '0') {
        return None;
    }
    whole.parse::<u64>().ok()
}

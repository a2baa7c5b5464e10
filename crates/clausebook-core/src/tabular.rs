//! Tabular codec for clause libraries: CSV both ways, XLSX on read.
//!
//! Columns are matched by header name, in any order. Both the canonical
//! snake_case names and the headers of the legacy library spreadsheets are
//! accepted. Columns that aren't recognised (row numbers, `version_number`)
//! are ignored on read.

use std::{collections::HashMap, io};

use calamine::{Reader as _, Xlsx};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  clause::{Clause, ClauseRecord},
};

// ─── Columns ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
  Uuid,
  Title,
  Body,
  PhoneticFull,
  PhoneticInitials,
  InsuranceType,
  Company,
  LibraryTag,
}

const REQUIRED: [Column; 8] = [
  Column::Uuid,
  Column::Title,
  Column::Body,
  Column::PhoneticFull,
  Column::PhoneticInitials,
  Column::InsuranceType,
  Column::Company,
  Column::LibraryTag,
];

impl Column {
  fn name(self) -> &'static str {
    match self {
      Self::Uuid => "uuid",
      Self::Title => "title",
      Self::Body => "body",
      Self::PhoneticFull => "phonetic_full",
      Self::PhoneticInitials => "phonetic_initials",
      Self::InsuranceType => "insurance_type",
      Self::Company => "company",
      Self::LibraryTag => "library_tag",
    }
  }

  fn from_header(header: &str) -> Option<Self> {
    let header = header.trim().trim_start_matches('\u{feff}');
    let lowered = header.to_ascii_lowercase();
    let column = match lowered.as_str() {
      "uuid" => Self::Uuid,
      "title" | "扩展条款标题" => Self::Title,
      "body" | "扩展条款正文" => Self::Body,
      "phonetic_full" | "quanpin" => Self::PhoneticFull,
      "phonetic_initials" | "pinyin" => Self::PhoneticInitials,
      "insurance_type" | "险种" => Self::InsuranceType,
      "company" | "保险公司" => Self::Company,
      "library_tag" | "年度版本" => Self::LibraryTag,
      _ => return None,
    };
    Some(column)
  }
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// Parse a CSV clause library.
///
/// Fails with [`Error::Validation`] if a required column is missing or a row
/// has an empty or malformed uuid. Batch-level checks (duplicates, empty
/// content) are left to [`crate::import::validate_batch`].
pub fn read_records<R: io::Read>(reader: R) -> Result<Vec<ClauseRecord>> {
  let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
  let headers: Vec<String> = rdr.headers()?.iter().map(str::to_owned).collect();
  let rows = rdr
    .records()
    .map(|row| -> Result<Vec<String>> { Ok(row?.iter().map(str::to_owned).collect()) });
  records_from_rows(&headers, rows)
}

/// Parse the first worksheet of an XLSX clause library.
///
/// The first row holds the headers; the same aliases and row checks as
/// [`read_records`] apply.
pub fn read_xlsx_records<R: io::Read + io::Seek>(reader: R) -> Result<Vec<ClauseRecord>> {
  let mut workbook = Xlsx::new(reader)?;
  let sheet = workbook
    .worksheet_range_at(0)
    .ok_or_else(|| Error::Validation("workbook has no worksheets".into()))??;

  let mut rows = sheet
    .rows()
    .map(|row| row.iter().map(ToString::to_string).collect::<Vec<_>>());
  let Some(headers) = rows.next() else {
    return Err(Error::Validation("worksheet is empty".into()));
  };
  records_from_rows(&headers, rows.map(Ok))
}

fn records_from_rows<I>(headers: &[String], rows: I) -> Result<Vec<ClauseRecord>>
where
  I: IntoIterator<Item = Result<Vec<String>>>,
{
  let mut positions: HashMap<Column, usize> = HashMap::new();
  for (idx, header) in headers.iter().enumerate() {
    if let Some(column) = Column::from_header(header) {
      positions.entry(column).or_insert(idx);
    }
  }

  let missing: Vec<&str> = REQUIRED
    .iter()
    .filter(|c| !positions.contains_key(c))
    .map(|c| c.name())
    .collect();
  if !missing.is_empty() {
    return Err(Error::Validation(format!(
      "missing column(s): {}",
      missing.join(", ")
    )));
  }

  let mut records = Vec::new();
  for (idx, row) in rows.into_iter().enumerate() {
    let row = row?;
    let line = idx + 1;
    let cell = |column: Column| -> String {
      row.get(positions[&column]).cloned().unwrap_or_default()
    };

    let raw_uuid = cell(Column::Uuid);
    let raw_uuid = raw_uuid.trim();
    if raw_uuid.is_empty() {
      return Err(Error::Validation(format!("row {line}: uuid is empty")));
    }
    let clause_uuid = Uuid::parse_str(raw_uuid).map_err(|e| {
      Error::Validation(format!("row {line}: invalid uuid {raw_uuid:?}: {e}"))
    })?;

    records.push(ClauseRecord {
      clause_uuid,
      title: cell(Column::Title),
      body: cell(Column::Body),
      phonetic_full: cell(Column::PhoneticFull),
      phonetic_initials: cell(Column::PhoneticInitials),
      insurance_type: cell(Column::InsuranceType),
      company: cell(Column::Company),
      library_tag: cell(Column::LibraryTag),
    });
  }

  tracing::debug!(rows = records.len(), "parsed clause library");
  Ok(records)
}

// ─── Write ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Row<'a> {
  uuid:              Uuid,
  title:             &'a str,
  body:              &'a str,
  phonetic_full:     &'a str,
  phonetic_initials: &'a str,
  insurance_type:    &'a str,
  company:           &'a str,
  library_tag:       &'a str,
  version_number:    u32,
}

/// Write clauses as CSV in the canonical column layout, plus the current
/// `version_number`. The output can be fed back to [`read_records`].
pub fn write_records<W: io::Write>(writer: W, clauses: &[Clause]) -> Result<()> {
  let mut wtr = csv::Writer::from_writer(writer);
  for clause in clauses {
    wtr.serialize(Row {
      uuid:              clause.clause_uuid,
      title:             &clause.title,
      body:              &clause.body,
      phonetic_full:     &clause.phonetic_full,
      phonetic_initials: &clause.phonetic_initials,
      insurance_type:    &clause.insurance_type,
      company:           &clause.company,
      library_tag:       &clause.library_tag,
      version_number:    clause.version_number,
    })?;
  }
  wtr.flush().map_err(csv::Error::from)?;
  Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

//! Rendering of clause exports and policy documents.
//!
//! Renderers only read; they never mutate the records they are given.

use std::{fmt::Write as _, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  clause::Clause,
  policy::{Policy, PolicyDetails, SelectedClause},
  tabular,
};

/// Target format for clause exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
  /// Re-importable CSV.
  #[default]
  Csv,
  Json,
  Markdown,
}

impl ExportFormat {
  pub fn extension(self) -> &'static str {
    match self {
      Self::Csv => "csv",
      Self::Json => "json",
      Self::Markdown => "md",
    }
  }

  pub fn media_type(self) -> &'static str {
    match self {
      Self::Csv => "text/csv; charset=utf-8",
      Self::Json => "application/json",
      Self::Markdown => "text/markdown; charset=utf-8",
    }
  }
}

impl FromStr for ExportFormat {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_ascii_lowercase().as_str() {
      "csv" | "tabular" => Ok(Self::Csv),
      "json" => Ok(Self::Json),
      "markdown" | "md" => Ok(Self::Markdown),
      other => Err(Error::Validation(format!("unknown export format: {other:?}"))),
    }
  }
}

/// Render `clauses` in the given format, preserving their order.
pub fn export(clauses: &[Clause], format: ExportFormat) -> Result<String> {
  match format {
    ExportFormat::Csv => {
      let mut buf = Vec::new();
      tabular::write_records(&mut buf, clauses)?;
      String::from_utf8(buf).map_err(|e| Error::Validation(e.to_string()))
    }
    ExportFormat::Json => Ok(serde_json::to_string_pretty(clauses)?),
    ExportFormat::Markdown => Ok(clauses_markdown(clauses)),
  }
}

/// One numbered section per clause: title, body, then its tags.
pub fn clauses_markdown(clauses: &[Clause]) -> String {
  let mut out = String::new();
  for (i, clause) in clauses.iter().enumerate() {
    let _ = write!(
      out,
      "# {}. {}\n\n{}\n\nInsurance type: {}\n\nCompany: {}\n\nLibrary: {}\n\n---\n\n",
      i + 1,
      clause.title,
      clause.body.trim_end(),
      clause.insurance_type,
      clause.company,
      clause.library_tag,
    );
  }
  out
}

/// The policy document: heading, description, the insurance details that
/// have been filled in, then a numbered list of the bound clause wording
/// under "Special provisions".
pub fn policy_markdown(policy: &Policy, selection: &[SelectedClause]) -> String {
  let mut out = format!("# {}\n\n", policy.name);
  if !policy.description.trim().is_empty() {
    let _ = write!(out, "{}\n\n", policy.description.trim_end());
  }
  details_markdown(&mut out, &policy.details);

  out.push_str("## Special provisions\n\n");
  if selection.is_empty() {
    out.push_str("_No clauses selected._\n");
    return out;
  }

  for (i, clause) in selection.iter().enumerate() {
    let _ = writeln!(out, "{}. **{}**", i + 1, clause.title);
    for line in clause.body.lines() {
      if line.trim().is_empty() {
        out.push('\n');
      } else {
        let _ = writeln!(out, "   {line}");
      }
    }
    out.push('\n');
  }
  out
}

// ─── Insurance details ───────────────────────────────────────────────────────

/// Append one section per non-empty part of `details`.
fn details_markdown(out: &mut String, details: &PolicyDetails) {
  if !details.policyholder.trim().is_empty() {
    let _ = write!(out, "## Policyholder\n\nName: {}\n\n", details.policyholder.trim());
  }

  let insured = &details.insured;
  if *insured != Default::default() {
    let contact = &insured.contact;
    let _ = write!(
      out,
      "## Insured\n\n\
       Name: {}\n\
       ID type: {} ID number: {}\n\
       Contact: {} Phone: {} Email: {}\n\
       Address: {} Postal code: {}\n\n",
      insured.name,
      insured.id_type.label(),
      insured.id_number,
      contact.name,
      contact.phone,
      contact.email,
      contact.address,
      contact.postal_code,
    );
  }

  if details.property != Default::default() {
    let _ = write!(
      out,
      "## Insured property\n\nName: {}\nAddress: {}\n\n",
      details.property.name, details.property.address
    );
  }

  let has_main_cover = !details.material_loss.is_empty()
    || !details.liability.is_empty()
    || !details.deductibles.is_empty();
  if has_main_cover {
    out.push_str("## Main cover\n\n");
  }

  if !details.material_loss.is_empty() {
    out.push_str("### Part 1: Material loss\n\n");
    table(
      out,
      &["Category", "Sum insured (CNY)", "Rate (%)", "Premium (CNY)"],
      details.material_loss.iter().map(|row| {
        vec![
          cell(&row.category),
          amount(row.sum_insured, 2),
          amount(row.rate_percent, 4),
          amount(row.premium, 2),
        ]
      }),
    );
  }

  if !details.liability.is_empty() {
    out.push_str("### Part 2: Third-party liability\n\n");
    table(
      out,
      &["Limit", "Limit amount (CNY)", "Premium (CNY)"],
      details.liability.iter().map(|row| {
        vec![cell(&row.limit_name), amount(row.limit, 2), amount(row.premium, 2)]
      }),
    );
  }

  if !details.deductibles.is_empty() {
    out.push_str("### Deductibles\n\n");
    table(
      out,
      &["Item", "Deductible / terms"],
      details
        .deductibles
        .iter()
        .map(|row| vec![cell(&row.item), cell(&row.terms)]),
    );
  }

  for section in &details.other_info {
    if section.rows.is_empty() {
      continue;
    }
    let _ = write!(out, "## {}\n\n", section.name.trim());
    table(
      out,
      &["Item", "Description"],
      section
        .rows
        .iter()
        .map(|row| vec![cell(&row.item), cell(&row.description)]),
    );
  }
}

fn table(out: &mut String, headers: &[&str], rows: impl Iterator<Item = Vec<String>>) {
  let _ = writeln!(out, "| {} |", headers.join(" | "));
  let _ = writeln!(out, "|{}", "---|".repeat(headers.len()));
  for row in rows {
    let _ = writeln!(out, "| {} |", row.join(" | "));
  }
  out.push('\n');
}

/// A table cell: pipes escaped, line breaks kept as `<br>`.
fn cell(text: &str) -> String {
  text.trim().replace('|', "\\|").replace('\n', "<br>")
}

fn amount(value: Option<f64>, decimals: usize) -> String {
  value.map(|v| format!("{v:.decimals$}")).unwrap_or_default()
}

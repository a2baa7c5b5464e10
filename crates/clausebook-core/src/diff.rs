//! Display-level line diff between two versions of a clause.
//!
//! A plain longest-common-subsequence over the lines left once the shared
//! head and tail are stripped. When the remaining table would exceed
//! [`MAX_TABLE_CELLS`], the differing middle is shown as one removed block
//! followed by one added block; this is for showing changes, not merging.

use serde::Serialize;

/// Upper bound on the LCS table (`old lines × new lines` after trimming).
pub const MAX_TABLE_CELLS: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "line", rename_all = "snake_case")]
pub enum DiffLine {
  Same(String),
  Removed(String),
  Added(String),
}

/// Compute the line diff that turns `old` into `new`.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
  let a: Vec<&str> = old.lines().collect();
  let b: Vec<&str> = new.lines().collect();

  let head = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
  let tail = a[head..]
    .iter()
    .rev()
    .zip(b[head..].iter().rev())
    .take_while(|(x, y)| x == y)
    .count();
  let (mid_a, mid_b) = (&a[head..a.len() - tail], &b[head..b.len() - tail]);

  let mut out = Vec::with_capacity(a.len().max(b.len()));
  out.extend(a[..head].iter().map(|l| DiffLine::Same((*l).to_owned())));

  let cells = (mid_a.len() + 1).saturating_mul(mid_b.len() + 1);
  if cells > MAX_TABLE_CELLS {
    tracing::debug!(old = mid_a.len(), new = mid_b.len(), "diff too large, replacing block");
    out.extend(mid_a.iter().map(|l| DiffLine::Removed((*l).to_owned())));
    out.extend(mid_b.iter().map(|l| DiffLine::Added((*l).to_owned())));
  } else {
    lcs_diff(mid_a, mid_b, &mut out);
  }

  out.extend(a[a.len() - tail..].iter().map(|l| DiffLine::Same((*l).to_owned())));
  out
}

fn lcs_diff(a: &[&str], b: &[&str], out: &mut Vec<DiffLine>) {
  // lcs[i][j] = length of the LCS of a[i..] and b[j..]
  let mut lcs = vec![vec![0u32; b.len() + 1]; a.len() + 1];
  for i in (0..a.len()).rev() {
    for j in (0..b.len()).rev() {
      lcs[i][j] = if a[i] == b[j] {
        lcs[i + 1][j + 1] + 1
      } else {
        lcs[i + 1][j].max(lcs[i][j + 1])
      };
    }
  }

  let (mut i, mut j) = (0, 0);
  while i < a.len() && j < b.len() {
    if a[i] == b[j] {
      out.push(DiffLine::Same(a[i].to_owned()));
      i += 1;
      j += 1;
    } else if lcs[i + 1][j] >= lcs[i][j + 1] {
      out.push(DiffLine::Removed(a[i].to_owned()));
      i += 1;
    } else {
      out.push(DiffLine::Added(b[j].to_owned()));
      j += 1;
    }
  }
  out.extend(a[i..].iter().map(|l| DiffLine::Removed((*l).to_owned())));
  out.extend(b[j..].iter().map(|l| DiffLine::Added((*l).to_owned())));
}

/// Render a diff with `-`/`+`/` ` line prefixes.
pub fn render_unified(lines: &[DiffLine]) -> String {
  let mut out = String::new();
  for line in lines {
    let (prefix, text) = match line {
      DiffLine::Same(t) => (' ', t),
      DiffLine::Removed(t) => ('-', t),
      DiffLine::Added(t) => ('+', t),
    };
    out.push(prefix);
    out.push_str(text);
    out.push('\n');
  }
  out
}

pub fn has_changes(lines: &[DiffLine]) -> bool {
  lines.iter().any(|l| !matches!(l, DiffLine::Same(_)))
}

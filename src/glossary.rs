/*!
 * Glossary entry table and its delimited wire codec.
 *
 * The service exchanges glossary entries as a tab- or comma-separated blob,
 * one source/target pair per line. This module owns the conversion in both
 * directions and all entry validation; entries are validated when the table
 * is built, never lazily, and never by the remote service.
 */

use std::collections::HashSet;

use crate::errors::GlossaryError;

/// Delimiter between source and target term on one line
pub const TSV_DELIMITER: char = '\t';
/// Alternative delimiter accepted when parsing comma-separated blobs
pub const CSV_DELIMITER: char = ',';

/// Ordered, duplicate-free table of source/target term pairs.
///
/// Serialization is deterministic: entries keep their insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntries {
    entries: Vec<(String, String)>,
    /// False when the caller skipped validation (e.g. re-parsing data the
    /// service already validated)
    checked: bool,
}

impl GlossaryEntries {
    /// Build a table from source/target pairs, validating every term
    pub fn from_pairs<I, S, T>(pairs: I) -> Result<Self, GlossaryError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (line, (source, target)) in pairs.into_iter().enumerate() {
            let source = source.into().trim().to_string();
            let target = target.into().trim().to_string();
            validate_term(&source, "source term")?;
            validate_term(&target, "target term")?;
            if !seen.insert(source.clone()) {
                return Err(GlossaryError::DuplicateSource {
                    line: line + 1,
                    term: source,
                });
            }
            entries.push((source, target));
        }

        if entries.is_empty() {
            return Err(GlossaryError::NoEntries);
        }

        Ok(GlossaryEntries {
            entries,
            checked: true,
        })
    }

    /// Parse a tab-separated entry blob with full validation
    pub fn from_tsv(blob: &str) -> Result<Self, GlossaryError> {
        Self::parse(blob, TSV_DELIMITER, false)
    }

    /// Parse a comma-separated entry blob with full validation
    pub fn from_csv(blob: &str) -> Result<Self, GlossaryError> {
        Self::parse(blob, CSV_DELIMITER, false)
    }

    /// Parse a delimited entry blob.
    ///
    /// Lines are split on CR, LF or CRLF; blank lines are skipped. The first
    /// delimiter occurrence on a line splits source from target; a second
    /// occurrence inside the target makes the row ambiguous and is rejected.
    /// `skip_checks` disables term validation and the empty-table check for
    /// blobs already validated server-side; structural errors (missing
    /// delimiter, ambiguous row, duplicate source) are always reported.
    pub fn parse(blob: &str, delimiter: char, skip_checks: bool) -> Result<Self, GlossaryError> {
        let mut entries = Vec::new();
        let mut seen = HashSet::new();

        for (line_number, line) in split_lines(blob) {
            if line.trim().is_empty() {
                continue;
            }

            let (source, target) = match line.split_once(delimiter) {
                Some(pair) => pair,
                None => return Err(GlossaryError::MissingDelimiter { line: line_number }),
            };
            if target.contains(delimiter) {
                return Err(GlossaryError::AmbiguousRow { line: line_number });
            }

            let source = source.trim().to_string();
            let target = target.trim().to_string();
            if !skip_checks {
                validate_term(&source, "source term")?;
                validate_term(&target, "target term")?;
            }
            if !seen.insert(source.clone()) {
                return Err(GlossaryError::DuplicateSource {
                    line: line_number,
                    term: source,
                });
            }
            entries.push((source, target));
        }

        if entries.is_empty() && !skip_checks {
            return Err(GlossaryError::NoEntries);
        }

        Ok(GlossaryEntries {
            entries,
            checked: !skip_checks,
        })
    }

    /// Serialize to the tab-separated wire format, in insertion order.
    ///
    /// An empty table is rejected unless checks were skipped when the table
    /// was built.
    pub fn to_tsv(&self) -> Result<String, GlossaryError> {
        if self.entries.is_empty() && self.checked {
            return Err(GlossaryError::NoEntries);
        }

        let lines: Vec<String> = self
            .entries
            .iter()
            .map(|(source, target)| format!("{}{}{}", source, TSV_DELIMITER, target))
            .collect();
        Ok(lines.join("\n"))
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate source/target pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(source, target)| (source.as_str(), target.as_str()))
    }

    /// Target term for a source term, if present
    pub fn get(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == source)
            .map(|(_, target)| target.as_str())
    }
}

/// Reject empty terms and terms containing control or line-breaking characters
fn validate_term(term: &str, kind: &str) -> Result<(), GlossaryError> {
    if term.is_empty() {
        return Err(GlossaryError::InvalidTerm {
            term: term.to_string(),
            reason: format!("{} is empty after trimming", kind),
        });
    }

    for c in term.chars() {
        // char::is_control covers the C0 and C1 ranges; the Unicode line and
        // paragraph separators are category Zl/Zp and need their own check
        if c.is_control() || c == '\u{2028}' || c == '\u{2029}' {
            return Err(GlossaryError::InvalidTerm {
                term: term.to_string(),
                reason: format!("{} contains control or line-separator character", kind),
            });
        }
    }

    Ok(())
}

/// Split a blob into (1-based line number, line) pairs, treating CR, LF and
/// CRLF uniformly as one line break
fn split_lines(blob: &str) -> Vec<(usize, &str)> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut line_number = 1;
    let bytes = blob.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        let b = bytes[index];
        if b == b'\n' || b == b'\r' {
            lines.push((line_number, &blob[start..index]));
            line_number += 1;
            if b == b'\r' && bytes.get(index + 1) == Some(&b'\n') {
                index += 1;
            }
            start = index + 1;
        }
        index += 1;
    }
    if start < bytes.len() {
        lines.push((line_number, &blob[start..]));
    }

    lines
}

//! Sidecar text format
//!
//! ```text
//! === INFO ===
//! Selected: true
//! Rating: 4
//! Last Modified: 2024-03-01T09:30:00.000Z
//! Modified By: Ana <a@x.com>
//! Converted Path: shoot/clip_converted.mp4
//! Conversion Date: 2024-03-01T09:35:12.004Z
//!
//! === TAGS ===
//! hero
//!
//! === COMMENTS ===
//! [2024-03-01T09:30:00.000Z] Ana: nice shot
//!
//! === NOTES ===
//! free text
//! ```
//!
//! Parsing is line based and lenient: lines are trimmed, blank lines are
//! skipped, unknown sections and keys are ignored, and a rating outside
//! 1-5 is dropped. Formatting always produces the whole file.
//!
//! [`canonicalize`] reduces a record to what parsing can give back, so a
//! write followed by a read returns the same record and no field value can
//! smuggle in extra lines or section headers.

use super::{Metadata, MAX_RATING, MIN_RATING};

const INFO: &str = "INFO";
const TAGS: &str = "TAGS";
const COMMENTS: &str = "COMMENTS";
const NOTES: &str = "NOTES";

const SELECTED_KEY: &str = "Selected: ";
const RATING_KEY: &str = "Rating: ";
const LAST_MODIFIED_KEY: &str = "Last Modified: ";
const MODIFIED_BY_KEY: &str = "Modified By: ";
const CONVERTED_PATH_KEY: &str = "Converted Path: ";
const CONVERSION_DATE_KEY: &str = "Conversion Date: ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    /// Lines before the first header
    Preamble,
    Info,
    Tags,
    Comments,
    Notes,
    Unknown,
}

impl Section {
    fn from_header(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            INFO => Section::Info,
            TAGS => Section::Tags,
            COMMENTS => Section::Comments,
            NOTES => Section::Notes,
            _ => Section::Unknown,
        }
    }
}

/// Section name of a `=== NAME ===` header line
fn header_name(line: &str) -> Option<&str> {
    line.strip_prefix("=== ")?.strip_suffix(" ===")
}

/// Parse sidecar text into a record
pub fn parse_sidecar(content: &str) -> Metadata {
    let mut metadata = Metadata::default();
    let mut section = Section::Preamble;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(name) = header_name(trimmed) {
            section = Section::from_header(name);
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match section {
            Section::Info => parse_info_line(&mut metadata, trimmed),
            Section::Tags => metadata.tags.push(trimmed.to_string()),
            Section::Comments => metadata.comments.push(trimmed.to_string()),
            Section::Notes => match metadata.notes.as_mut() {
                Some(notes) => {
                    notes.push('\n');
                    notes.push_str(trimmed);
                }
                None => metadata.notes = Some(trimmed.to_string()),
            },
            Section::Preamble | Section::Unknown => {}
        }
    }

    metadata
}

fn parse_info_line(metadata: &mut Metadata, line: &str) {
    if let Some(value) = line.strip_prefix(SELECTED_KEY) {
        metadata.selected = Some(value == "true");
    } else if let Some(value) = line.strip_prefix(RATING_KEY) {
        metadata.rating = value
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|r| (MIN_RATING..=MAX_RATING).contains(r));
    } else if let Some(value) = line.strip_prefix(LAST_MODIFIED_KEY) {
        metadata.last_modified = Some(value.to_string());
    } else if let Some(value) = line.strip_prefix(MODIFIED_BY_KEY) {
        metadata.modified_by = Some(value.to_string());
    } else if let Some(value) = line.strip_prefix(CONVERTED_PATH_KEY) {
        metadata.converted_path = Some(value.to_string());
    } else if let Some(value) = line.strip_prefix(CONVERSION_DATE_KEY) {
        metadata.conversion_date = Some(value.to_string());
    }
}

/// Reduce a record to the form `parse_sidecar(format_sidecar(..))` returns
///
/// Single-line values have line breaks folded into spaces and are trimmed;
/// empty values are dropped. Notes keep their line structure but each line is
/// trimmed and blank lines are dropped. Tag and note lines that would read
/// back as a section header are dropped.
pub fn canonicalize(mut metadata: Metadata) -> Metadata {
    metadata.tags = canonical_lines(metadata.tags);
    metadata.comments = canonical_lines(metadata.comments);
    metadata.notes = metadata.notes.and_then(|notes| {
        let lines: Vec<&str> = notes
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && header_name(l).is_none())
            .collect();
        (!lines.is_empty()).then(|| lines.join("\n"))
    });
    metadata.last_modified = canonical_value(metadata.last_modified);
    metadata.modified_by = canonical_value(metadata.modified_by);
    metadata.converted_path = canonical_value(metadata.converted_path);
    metadata.conversion_date = canonical_value(metadata.conversion_date);
    metadata
}

/// Fold line breaks into single spaces and trim
pub fn single_line(value: &str) -> String {
    value
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonical_value(value: Option<String>) -> Option<String> {
    value.map(|v| single_line(&v)).filter(|v| !v.is_empty())
}

fn canonical_lines(lines: Vec<String>) -> Vec<String> {
    lines
        .iter()
        .map(|l| single_line(l))
        .filter(|l| !l.is_empty() && header_name(l).is_none())
        .collect()
}

/// Render a record as sidecar text
///
/// Only present INFO fields are written; TAGS, COMMENTS and NOTES sections
/// are omitted when empty.
pub fn format_sidecar(metadata: &Metadata) -> String {
    let mut content = format!("=== {} ===\n", INFO);

    if let Some(selected) = metadata.selected {
        content.push_str(&format!("{}{}\n", SELECTED_KEY, selected));
    }
    if let Some(rating) = metadata.rating {
        content.push_str(&format!("{}{}\n", RATING_KEY, rating));
    }
    push_info(&mut content, LAST_MODIFIED_KEY, metadata.last_modified.as_deref());
    push_info(&mut content, MODIFIED_BY_KEY, metadata.modified_by.as_deref());
    push_info(&mut content, CONVERTED_PATH_KEY, metadata.converted_path.as_deref());
    push_info(&mut content, CONVERSION_DATE_KEY, metadata.conversion_date.as_deref());

    push_section(&mut content, TAGS, &metadata.tags);
    push_section(&mut content, COMMENTS, &metadata.comments);

    if let Some(notes) = metadata.notes.as_deref().filter(|n| !n.is_empty()) {
        content.push_str(&format!("\n=== {} ===\n", NOTES));
        content.push_str(notes);
        content.push('\n');
    }

    content
}

fn push_info(content: &mut String, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        content.push_str(key);
        content.push_str(value);
        content.push('\n');
    }
}

fn push_section(content: &mut String, name: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    content.push_str(&format!("\n=== {} ===\n", name));
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
}

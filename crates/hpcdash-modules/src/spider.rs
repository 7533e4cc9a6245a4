//! Parse `module spider` output for family descriptions.
//!
//! Lmod prints one block per family, each introduced by a header line fenced
//! between two dashed rules:
//!
//! ```text
//! ----------------------------------------------------------------------------
//!   GCC: GCC/11.2.0
//! ----------------------------------------------------------------------------
//!     Description:
//!       The GNU Compiler Collection includes front ends for C, C++,
//!       Objective-C, Fortran, Java, and Ada.
//!
//!     Dependencies: ...
//! ```

use hpcdash_parsers::{normalize_whitespace, strip_ansi};
use std::collections::BTreeMap;

const DESCRIPTION_FIELD: &str = "Description:";

/// Field labels that end a multi-line description.
const TERMINATING_FIELDS: [&str; 6] = [
    "Dependencies:",
    "Versions:",
    "Properties:",
    "Extensions:",
    "Other possible modules matches:",
    "You will need to load",
];

/// Fold a spider header name to its family.
///
/// Names with more than two `/` segments drop the last one
/// (`foo/1.2/extra` → `foo/1.2`); anything shorter is its own family.
pub fn fold_family_name(name: &str) -> &str {
    if name.split('/').count() > 2 {
        name.rsplit_once('/').map(|(parent, _)| parent).unwrap_or(name)
    } else {
        name
    }
}

fn is_rule(line: &str) -> bool {
    let line = line.trim();
    line.len() >= 8 && line.chars().all(|c| c == '-')
}

fn ends_description(line: &str) -> bool {
    line.is_empty() || is_rule(line) || TERMINATING_FIELDS.iter().any(|f| line.starts_with(f))
}

/// Pull the `Description:` field out of one block of spider output.
///
/// Continuation lines are joined and whitespace normalized; returns an empty
/// string when the block has no description.
pub fn extract_description(text: &str) -> String {
    let lines: Vec<String> = text.lines().map(|l| strip_ansi(l).into_owned()).collect();
    description_from_lines(&lines)
}

fn description_from_lines<S: AsRef<str>>(lines: &[S]) -> String {
    let mut rest = lines.iter().map(|l| l.as_ref().trim());

    let Some(first) = rest
        .by_ref()
        .find_map(|line| line.strip_prefix(DESCRIPTION_FIELD))
    else {
        return String::new();
    };

    let mut parts = vec![first];
    parts.extend(rest.take_while(|line| !ends_description(line)));
    normalize_whitespace(&parts.join(" "))
}

/// Parse multi-family spider output into `family → description`.
///
/// Family keys are the first token of each header with any trailing `:`
/// removed, folded with [`fold_family_name`]. Families without a
/// `Description:` field map to an empty string.
pub fn parse_descriptions(raw: &str) -> BTreeMap<String, String> {
    let lines: Vec<String> = raw.lines().map(|l| strip_ansi(l).into_owned()).collect();

    let headers: Vec<(usize, &str)> = (1..lines.len().saturating_sub(1))
        .filter(|&i| is_rule(&lines[i - 1]) && is_rule(&lines[i + 1]))
        .filter_map(|i| {
            let token = lines[i].split_whitespace().next()?;
            let token = token.strip_suffix(':').unwrap_or(token);
            (!token.is_empty()).then_some((i, token))
        })
        .collect();

    let mut descriptions = BTreeMap::new();
    for (n, (start, name)) in headers.iter().enumerate() {
        let body_start = start + 2;
        let body_end = headers
            .get(n + 1)
            .map(|(next, _)| next - 1)
            .unwrap_or(lines.len());
        let body = lines.get(body_start..body_end).unwrap_or_default();

        let family = fold_family_name(name).to_string();
        let description = description_from_lines(body);
        // A family can appear twice (per-version pages); keep the first
        // non-empty description.
        let entry = descriptions.entry(family).or_insert_with(String::new);
        if entry.is_empty() {
            *entry = description;
        }
    }
    descriptions
}

/// Description for `family` from its own `module spider <family>` output.
///
/// Prefers the block whose folded header names the family, then any block
/// with a description, then a bare `Description:` field.
pub fn family_description(family: &str, text: &str) -> String {
    let mut blocks = parse_descriptions(text);
    if let Some(description) = blocks.remove(family).filter(|d| !d.is_empty()) {
        return description;
    }
    if let Some(description) = blocks
        .remove(fold_family_name(family))
        .filter(|d| !d.is_empty())
    {
        return description;
    }
    blocks
        .into_values()
        .find(|d| !d.is_empty())
        .unwrap_or_else(|| extract_description(text))
}

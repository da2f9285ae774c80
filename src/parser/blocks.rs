use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static OPEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:<!--)?\s*extract:").unwrap());
static OPEN_COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<!--\s*extract:").unwrap());
static CLOSE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)(?:<!--)?\s*endextract").unwrap());

const COMMENT_OPEN: &str = "<!-- ";

/// Marker problems found while scanning. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MarkerIssue {
    /// `endextract` seen while no region was open.
    UnexpectedClose { line: usize },
    /// Input ended inside a region opened at `line`.
    Unterminated { line: usize, depth: usize },
}

impl MarkerIssue {
    pub fn line(&self) -> usize {
        match self {
            MarkerIssue::UnexpectedClose { line } | MarkerIssue::Unterminated { line, .. } => *line,
        }
    }
}

impl std::fmt::Display for MarkerIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerIssue::UnexpectedClose { line } => {
                write!(f, "line {}: endextract without an open region", line)
            }
            MarkerIssue::Unterminated { line, depth } => write!(
                f,
                "line {}: region never closed ({} marker(s) still open at end of input)",
                line, depth
            ),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scan {
    pub blocks: Vec<String>,
    pub issues: Vec<MarkerIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Open,
    Close,
}

fn classify(line: &str) -> Option<Marker> {
    if OPEN_RE.is_match(line) {
        Some(Marker::Open)
    } else if CLOSE_RE.is_match(line) {
        Some(Marker::Close)
    } else {
        None
    }
}

/// True if `text` holds at least one opening marker anywhere.
pub fn contains_marker(text: &str) -> bool {
    OPEN_RE.is_match(text)
}

/// True if `line` is an opening or closing marker line.
pub fn is_marker_line(line: &str) -> bool {
    classify(line).is_some()
}

/// Split on `\n`, dropping one trailing `\r` per line.
pub fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
}

/// Extract every region in `text`, outer regions first.
///
/// A single forward pass with a depth counter yields the top-level regions.
/// Each region is then stripped of its first and last line and the same pass
/// is re-run on what is left ("re-scan decomposition"), so nested regions come
/// out after all of their enclosing level, in the order their parents were
/// visited.
pub fn scan(text: &str) -> Scan {
    let (blocks, issues) = scan_level(text);

    let mut out = blocks.clone();
    for block in &blocks {
        out.extend(rescan_inner(block));
    }

    Scan { blocks: out, issues }
}

pub fn scan_blocks(text: &str) -> Vec<String> {
    scan(text).blocks
}

fn rescan_inner(block: &str) -> Vec<String> {
    let lines: Vec<&str> = split_lines(block).collect();
    if lines.len() < 2 {
        return Vec::new();
    }
    let inner = lines[1..lines.len() - 1].join("\n");
    if !contains_marker(&inner) {
        return Vec::new();
    }
    let (blocks, _) = scan_level(&inner);
    let mut out = blocks.clone();
    for nested in &blocks {
        out.extend(rescan_inner(nested));
    }
    out
}

/// One linear pass: top-level regions only, nested markers kept verbatim.
fn scan_level(text: &str) -> (Vec<String>, Vec<MarkerIssue>) {
    let mut blocks: Vec<Vec<String>> = Vec::new();
    let mut issues = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut collecting = false;
    let mut opened_at = 0usize;

    for (idx, raw) in split_lines(text).enumerate() {
        let mut line = raw.to_string();

        match classify(raw) {
            Some(Marker::Open) => {
                if !collecting {
                    opened_at = idx + 1;
                }
                collecting = true;
                // multiline comments leave the opener on a previous line
                if !OPEN_COMMENT_RE.is_match(raw) {
                    line = format!("{}{}", COMMENT_OPEN, raw);
                }
                depth += 1;
            }
            Some(Marker::Close) => {
                if depth == 0 {
                    issues.push(MarkerIssue::UnexpectedClose { line: idx + 1 });
                    continue;
                }
                depth -= 1;
            }
            None => {}
        }

        if collecting {
            current.push(line);
        }

        if depth == 0 && collecting {
            collecting = false;
            blocks.push(std::mem::take(&mut current));
        }
    }

    if collecting {
        issues.push(MarkerIssue::Unterminated { line: opened_at, depth });
        blocks.push(current);
    }

    let blocks = blocks.into_iter().map(|lines| lines.join("\n")).collect();
    (blocks, issues)
}

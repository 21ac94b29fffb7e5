//! Conflict marker parsing.
//!
//! A conflicted worktree file is split into plain text segments and hunks.
//! Each hunk keeps its raw marker text so an unresolved hunk renders back
//! byte for byte.

use serde::{Deserialize, Serialize};

use crate::errors::ConflictError;

const START: &str = "<<<<<<<";
const BASE: &str = "|||||||";
const MIDDLE: &str = "=======";
const END: &str = ">>>>>>>";

/// How a hunk has been resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    #[default]
    Unresolved,
    Ours,
    Theirs,
    Both,
}

/// Labels written after the start and end markers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HunkMarkers {
    pub ours_label: String,
    pub theirs_label: String,
}

/// One conflicting region.
///
/// Side lines keep their line terminators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub markers: HunkMarkers,
    pub ours_lines: Vec<String>,
    /// Present for diff3-style markers.
    #[serde(default)]
    pub base_lines: Vec<String>,
    pub theirs_lines: Vec<String>,
    pub resolution: Resolution,
    /// 1-based line of the start marker.
    pub start_line: usize,
    raw: String,
    eof_without_newline: bool,
}

impl Hunk {
    /// Text this hunk contributes to the document.
    pub fn render(&self) -> String {
        let mut out = match self.resolution {
            Resolution::Unresolved => return self.raw.clone(),
            Resolution::Ours => self.ours_lines.concat(),
            Resolution::Theirs => self.theirs_lines.concat(),
            Resolution::Both => join_sides(&self.ours_lines, &self.theirs_lines),
        };
        if self.eof_without_newline && out.ends_with('\n') {
            out.pop();
        }
        out
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution != Resolution::Unresolved
    }

    /// The marker text exactly as it appeared in the file.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Concatenate two line runs, keeping the seam on a line boundary.
pub(crate) fn join_sides<S: AsRef<str>>(first: &[S], second: &[S]) -> String {
    let mut out: String = first.iter().map(|l| l.as_ref()).collect();
    if !second.is_empty() && !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.extend(second.iter().map(|l| l.as_ref()));
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Hunk(usize),
}

/// A conflicted file split into text and hunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDocument {
    segments: Vec<Segment>,
    hunks: Vec<Hunk>,
}

#[derive(Clone, Copy)]
enum ParseState {
    Text,
    Ours,
    Base,
    Theirs,
}

fn strip_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// The label after a marker, if `line` is that marker.
fn marker_label<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = strip_eol(line).strip_prefix(marker)?;
    if rest.is_empty() {
        Some("")
    } else {
        rest.strip_prefix(' ')
    }
}

impl ConflictDocument {
    pub fn parse(content: &str) -> Result<Self, ConflictError> {
        let mut segments = Vec::new();
        let mut hunks = Vec::new();
        let mut text = String::new();
        let mut state = ParseState::Text;
        let mut current: Option<Hunk> = None;

        for (idx, line) in content.split_inclusive('\n').enumerate() {
            match state {
                ParseState::Text => {
                    if let Some(label) = marker_label(line, START) {
                        if !text.is_empty() {
                            segments.push(Segment::Text(std::mem::take(&mut text)));
                        }
                        current = Some(Hunk {
                            markers: HunkMarkers {
                                ours_label: label.to_string(),
                                theirs_label: String::new(),
                            },
                            ours_lines: Vec::new(),
                            base_lines: Vec::new(),
                            theirs_lines: Vec::new(),
                            resolution: Resolution::Unresolved,
                            start_line: idx + 1,
                            raw: line.to_string(),
                            eof_without_newline: false,
                        });
                        state = ParseState::Ours;
                    } else {
                        text.push_str(line);
                    }
                }
                ParseState::Ours | ParseState::Base | ParseState::Theirs => {
                    let Some(hunk) = current.as_mut() else {
                        break;
                    };
                    hunk.raw.push_str(line);
                    match state {
                        ParseState::Ours if marker_label(line, BASE).is_some() => {
                            state = ParseState::Base;
                        }
                        ParseState::Ours | ParseState::Base if strip_eol(line) == MIDDLE => {
                            state = ParseState::Theirs;
                        }
                        ParseState::Ours => hunk.ours_lines.push(line.to_string()),
                        ParseState::Base => hunk.base_lines.push(line.to_string()),
                        ParseState::Theirs => {
                            if let Some(label) = marker_label(line, END) {
                                hunk.markers.theirs_label = label.to_string();
                                hunk.eof_without_newline = !line.ends_with('\n');
                                segments.push(Segment::Hunk(hunks.len()));
                                if let Some(done) = current.take() {
                                    hunks.push(done);
                                }
                                state = ParseState::Text;
                            } else {
                                hunk.theirs_lines.push(line.to_string());
                            }
                        }
                        ParseState::Text => {}
                    }
                }
            }
        }

        if let Some(open) = current {
            return Err(ConflictError::UnterminatedMarker {
                line: open.start_line,
            });
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments, hunks })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Hunk(idx) => {
                    if let Some(hunk) = self.hunks.get(*idx) {
                        out.push_str(&hunk.render());
                    }
                }
            }
        }
        out
    }

    pub fn hunks(&self) -> &[Hunk] {
        &self.hunks
    }

    pub(crate) fn hunks_mut(&mut self) -> &mut [Hunk] {
        &mut self.hunks
    }

    pub fn into_hunks(self) -> Vec<Hunk> {
        self.hunks
    }
}

/// Whether `content` still carries conflict markers. An unterminated
/// marker block counts.
pub fn contains_conflict_markers(content: &str) -> bool {
    match ConflictDocument::parse(content) {
        Ok(doc) => !doc.hunks().is_empty(),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "top\n<<<<<<< HEAD\nours 1\nours 2\n=======\ntheirs\n>>>>>>> feature\nbottom\n";

    #[test]
    fn test_parse_single_hunk() {
        let doc = ConflictDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.hunks().len(), 1);
        let hunk = &doc.hunks()[0];
        assert_eq!(hunk.markers.ours_label, "HEAD");
        assert_eq!(hunk.markers.theirs_label, "feature");
        assert_eq!(hunk.ours_lines, vec!["ours 1\n", "ours 2\n"]);
        assert_eq!(hunk.theirs_lines, vec!["theirs\n"]);
        assert_eq!(hunk.start_line, 2);
        assert_eq!(doc.render(), SAMPLE);
    }

    #[test]
    fn test_parse_diff3_base_section() {
        let content = "<<<<<<< ours\na\n||||||| base\nbase\n=======\nb\n>>>>>>> theirs\n";
        let doc = ConflictDocument::parse(content).unwrap();
        let hunk = &doc.hunks()[0];
        assert_eq!(hunk.base_lines, vec!["base\n"]);
        assert_eq!(hunk.ours_lines, vec!["a\n"]);
        assert_eq!(hunk.theirs_lines, vec!["b\n"]);
        assert_eq!(doc.render(), content);
    }

    #[test]
    fn test_resolution_renders_chosen_side() {
        let mut doc = ConflictDocument::parse(SAMPLE).unwrap();
        doc.hunks_mut()[0].resolution = Resolution::Theirs;
        assert_eq!(doc.render(), "top\ntheirs\nbottom\n");
        doc.hunks_mut()[0].resolution = Resolution::Both;
        assert_eq!(doc.render(), "top\nours 1\nours 2\ntheirs\nbottom\n");
    }

    #[test]
    fn test_end_marker_without_newline() {
        let content = "a\n<<<<<<< HEAD\nx\n=======\ny\n>>>>>>> other";
        let mut doc = ConflictDocument::parse(content).unwrap();
        assert_eq!(doc.render(), content);
        doc.hunks_mut()[0].resolution = Resolution::Ours;
        assert_eq!(doc.render(), "a\nx");
        doc.hunks_mut()[0].resolution = Resolution::Both;
        assert_eq!(doc.render(), "a\nx\ny");
    }

    #[test]
    fn test_crlf_markers() {
        let content = "<<<<<<< HEAD\r\nx\r\n=======\r\ny\r\n>>>>>>> b\r\n";
        let doc = ConflictDocument::parse(content).unwrap();
        assert_eq!(doc.hunks().len(), 1);
        assert_eq!(doc.hunks()[0].ours_lines, vec!["x\r\n"]);
    }

    #[test]
    fn test_unterminated_marker_is_error() {
        let err = ConflictDocument::parse("a\n<<<<<<< HEAD\nx\n=======\ny\n").unwrap_err();
        assert!(matches!(err, ConflictError::UnterminatedMarker { line: 2 }));
        assert!(contains_conflict_markers("a\n<<<<<<< HEAD\nx\n"));
    }

    #[test]
    fn test_lookalike_lines_are_text() {
        let content = "<<<<<<<< not a marker\n=======\n>>>>>>>>\n";
        assert!(!contains_conflict_markers(content));
        assert!(!contains_conflict_markers("plain\ntext"));
    }
}

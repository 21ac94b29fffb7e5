//! Conflict handling for interrupted replays.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- mapping index stages to status codes and telling
//!    textual conflicts from add/delete ones.
//! 2. **Parsing** -- reading marker blocks into hunks without losing bytes.
//! 3. **Resolution** -- hunk-by-hunk sessions with undo, whole-file
//!    strategies, and the gate that keeps markers out of the index.

pub mod detector;
pub mod gate;
pub mod markers;
pub mod merger;
pub mod session;

pub use detector::{ConflictSides, ConflictedFile, Stage, StatusCode};
pub use gate::{ConflictGate, GateVerdict, StatusCache};
pub use markers::{contains_conflict_markers, ConflictDocument, Hunk, HunkMarkers, Resolution};
pub use merger::Merger;
pub use session::{HunkSession, Side};

//! Line-level three-way merge for strategy previews.
//!
//! A diff3 walk over the base, "ours" (current) and "theirs" (incoming)
//! versions of a file, settled the way `git merge-file` settles it. Line
//! diffs come from the `similar` crate; lines keep their terminators so
//! files without a trailing newline merge losslessly.

use similar::{capture_diff_slices, Algorithm, DiffOp};

use super::markers::join_sides;
use crate::models::MergeStrategy;

#[derive(Debug)]
enum Chunk<'a> {
    Clean(Vec<&'a str>),
    Conflict {
        ours: &'a [&'a str],
        theirs: &'a [&'a str],
    },
}

/// Stateless three-way merge engine.
pub struct Merger;

impl Merger {
    /// Merge and settle every conflicting region with `strategy`, the way
    /// `git merge-file --ours|--theirs|--union` does.
    pub fn merge_with_strategy(base: &str, ours: &str, theirs: &str, strategy: MergeStrategy) -> String {
        let (b, o, t) = (lines(base), lines(ours), lines(theirs));
        let mut merged = String::new();
        for chunk in diff3(&b, &o, &t) {
            match chunk {
                Chunk::Clean(lines) => append_run(&mut merged, &lines.concat()),
                Chunk::Conflict { ours, theirs } => {
                    let resolved = match strategy {
                        MergeStrategy::Ours => ours.concat(),
                        MergeStrategy::Theirs => theirs.concat(),
                        MergeStrategy::Union => join_sides(ours, theirs),
                    };
                    append_run(&mut merged, &resolved);
                }
            }
        }
        merged
    }
}

/// Append a run of lines, starting it on a fresh line.
fn append_run(merged: &mut String, run: &str) {
    if run.is_empty() {
        return;
    }
    if !merged.is_empty() && !merged.ends_with('\n') {
        merged.push('\n');
    }
    merged.push_str(run);
}

fn lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

/// For every base line, the index of the matching line in `other`.
fn matching_lines(base: &[&str], other: &[&str]) -> Vec<Option<usize>> {
    let mut matches = vec![None; base.len()];
    for op in capture_diff_slices(Algorithm::Myers, base, other) {
        if let DiffOp::Equal {
            old_index,
            new_index,
            len,
        } = op
        {
            for k in 0..len {
                matches[old_index + k] = Some(new_index + k);
            }
        }
    }
    matches
}

fn diff3<'a>(base: &'a [&'a str], ours: &'a [&'a str], theirs: &'a [&'a str]) -> Vec<Chunk<'a>> {
    let in_ours = matching_lines(base, ours);
    let in_theirs = matching_lines(base, theirs);
    let (mut ib, mut io, mut it) = (0usize, 0usize, 0usize);
    let mut chunks = Vec::new();

    while ib < base.len() || io < ours.len() || it < theirs.len() {
        // Stable run: base lines present at the same offset on both sides.
        let mut k = 0;
        while ib + k < base.len()
            && in_ours[ib + k] == Some(io + k)
            && in_theirs[ib + k] == Some(it + k)
        {
            k += 1;
        }
        if k > 0 {
            chunks.push(Chunk::Clean(base[ib..ib + k].to_vec()));
            ib += k;
            io += k;
            it += k;
            continue;
        }

        // Unstable run up to the next base line both sides still share.
        let next = (ib..base.len()).find(|&j| in_ours[j].is_some() && in_theirs[j].is_some());
        let (eb, eo, et) = match next {
            Some(j) => (j, in_ours[j].unwrap_or(ours.len()), in_theirs[j].unwrap_or(theirs.len())),
            None => (base.len(), ours.len(), theirs.len()),
        };
        let (b, o, t) = (&base[ib..eb], &ours[io..eo], &theirs[it..et]);
        if o == b {
            chunks.push(Chunk::Clean(t.to_vec()));
        } else if t == b || o == t {
            chunks.push(Chunk::Clean(o.to_vec()));
        } else {
            chunks.push(Chunk::Conflict { ours: o, theirs: t });
        }
        ib = eb;
        io = eo;
        it = et;
    }
    chunks
}

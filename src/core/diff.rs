//! File Diff Matcher
//!
//! Reconciles the old and new file lists of a comparison into FileDiff
//! records. Files are paired by exact path first, then by a unique basename
//! (directory reorganizations between releases). A basename shared by several
//! new files is never guessed; the old file is reported as deleted instead.
//!
//! Output order: old-file order, then unmatched new files in their order.

use std::collections::HashMap;
use tracing::debug;

use crate::models::types::{basename, FileDiff, SourceFile};
use crate::utils::render::{DiffRenderer, OutputFormat};

/// Match two file lists into per-file diff records
pub fn match_files(
    old_files: &[SourceFile],
    new_files: &[SourceFile],
    renderer: &dyn DiffRenderer,
) -> Vec<FileDiff> {
    let by_path: HashMap<&str, usize> = new_files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();

    let mut by_basename: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, file) in new_files.iter().enumerate() {
        by_basename.entry(file.basename()).or_default().push(i);
    }

    let mut consumed = vec![false; new_files.len()];

    // Exact paths are claimed before any basename guess
    let mut matches: Vec<Option<usize>> = old_files
        .iter()
        .map(|old| {
            let index = by_path.get(old.name.as_str()).copied()?;
            if consumed[index] {
                return None;
            }
            consumed[index] = true;
            Some(index)
        })
        .collect();

    for (old, slot) in old_files.iter().zip(matches.iter_mut()) {
        if slot.is_some() {
            continue;
        }
        let candidates: Vec<usize> = by_basename
            .get(basename(&old.name))
            .map(|all| all.iter().copied().filter(|&i| !consumed[i]).collect())
            .unwrap_or_default();

        match candidates.as_slice() {
            [only] => {
                consumed[*only] = true;
                *slot = Some(*only);
            }
            [] => {}
            _ => debug!(
                "Ambiguous basename for {} ({} candidates), not matching",
                old.name,
                candidates.len()
            ),
        }
    }

    let mut diffs = Vec::with_capacity(old_files.len() + new_files.len());
    for (old, matched) in old_files.iter().zip(matches) {
        match matched {
            Some(index) => diffs.push(matched_pair(old, &new_files[index], renderer)),
            None => diffs.push(deleted(old, renderer)),
        }
    }

    diffs.extend(
        new_files
            .iter()
            .zip(consumed)
            .filter(|(_, used)| !used)
            .map(|(new, _)| added(new, renderer)),
    );

    diffs
}

fn matched_pair(old: &SourceFile, new: &SourceFile, renderer: &dyn DiffRenderer) -> FileDiff {
    let file_name = if old.name == new.name {
        old.name.clone()
    } else {
        format!("{} → {}", old.name, new.name)
    };
    let has_diff = old.content != new.content;

    let mut diff = FileDiff {
        file_name,
        old_content: Some(old.content.clone()),
        new_content: Some(new.content.clone()),
        has_diff,
        diff_html: String::new(),
        diff_html_unified: String::new(),
        unified_diff: String::new(),
    };
    if has_diff {
        render_into(&mut diff, &old.name, &new.name, &old.content, &new.content, renderer);
    }
    diff
}

fn deleted(old: &SourceFile, renderer: &dyn DiffRenderer) -> FileDiff {
    let mut diff = FileDiff {
        file_name: old.name.clone(),
        old_content: Some(old.content.clone()),
        new_content: None,
        has_diff: true,
        diff_html: String::new(),
        diff_html_unified: String::new(),
        unified_diff: String::new(),
    };
    render_into(&mut diff, &old.name, &old.name, &old.content, "", renderer);
    diff
}

fn added(new: &SourceFile, renderer: &dyn DiffRenderer) -> FileDiff {
    let mut diff = FileDiff {
        file_name: new.name.clone(),
        old_content: None,
        new_content: Some(new.content.clone()),
        has_diff: true,
        diff_html: String::new(),
        diff_html_unified: String::new(),
        unified_diff: String::new(),
    };
    render_into(&mut diff, &new.name, &new.name, "", &new.content, renderer);
    diff
}

fn render_into(
    diff: &mut FileDiff,
    old_name: &str,
    new_name: &str,
    old: &str,
    new: &str,
    renderer: &dyn DiffRenderer,
) {
    let unified = renderer.unified_diff(old_name, new_name, old, new);
    diff.diff_html = renderer.render(&unified, OutputFormat::SideBySide);
    diff.diff_html_unified = renderer.render(&unified, OutputFormat::LineByLine);
    diff.unified_diff = unified;
}

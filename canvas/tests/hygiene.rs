//! Hygiene — scans the crate source for patterns that are banned in
//! production code.
//!
//! The canvas crate sits in the host's paint path and the observer's decode
//! path; a stray panic in either takes the whole session down with it. Each
//! pattern has a budget of zero. The budget can only ratchet down: to add an
//! occurrence you must first remove one somewhere else.
#![allow(clippy::absurd_extreme_comparisons)]

use std::fs;
use std::path::Path;

// Process-killing patterns.
const MAX_UNWRAP: usize = 0;
const MAX_EXPECT: usize = 0;
const MAX_PANIC: usize = 0;
const MAX_UNREACHABLE: usize = 0;
const MAX_TODO: usize = 0;
const MAX_UNIMPLEMENTED: usize = 0;

// Errors dropped without inspection.
const MAX_SILENT_DISCARD: usize = 0;
const MAX_DOT_OK: usize = 0;

// Structure.
const MAX_ALLOW_DEAD_CODE: usize = 0;

struct ScannedFile {
    path: String,
    content: String,
}

/// Production `.rs` files under `src/`; `_test.rs` companions are exempt.
fn production_sources() -> Vec<ScannedFile> {
    let mut files = Vec::new();
    walk(Path::new("src"), &mut files);
    files
}

fn walk(dir: &Path, out: &mut Vec<ScannedFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            if name == "target" || name == "tests" {
                continue;
            }
            walk(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") {
            let path_str = path.to_string_lossy().to_string();
            if path_str.ends_with("_test.rs") {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&path) {
                out.push(ScannedFile { path: path_str, content });
            }
        }
    }
}

fn hits_for(files: &[ScannedFile], pattern: &str) -> Vec<(String, usize)> {
    files
        .iter()
        .filter_map(|file| {
            let count = file
                .content
                .lines()
                .filter(|line| line.contains(pattern))
                .count();
            if count > 0 {
                Some((file.path.clone(), count))
            } else {
                None
            }
        })
        .collect()
}

fn assert_budget(pattern: &str, max: usize) {
    let files = production_sources();
    let hits = hits_for(&files, pattern);
    let count: usize = hits.iter().map(|(_, c)| c).sum();
    let listing = hits
        .iter()
        .map(|(path, count)| format!("  {path}: {count}"))
        .collect::<Vec<_>>()
        .join("\n");
    assert!(
        count <= max,
        "`{pattern}` budget exceeded: found {count}, max {max}.\n{listing}"
    );
}

#[test]
fn unwrap_budget() {
    assert_budget(".unwrap()", MAX_UNWRAP);
}

#[test]
fn expect_budget() {
    assert_budget(".expect(", MAX_EXPECT);
}

#[test]
fn panic_budget() {
    assert_budget("panic!(", MAX_PANIC);
}

#[test]
fn unreachable_budget() {
    assert_budget("unreachable!(", MAX_UNREACHABLE);
}

#[test]
fn todo_budget() {
    assert_budget("todo!(", MAX_TODO);
}

#[test]
fn unimplemented_budget() {
    assert_budget("unimplemented!(", MAX_UNIMPLEMENTED);
}

#[test]
fn silent_discard_budget() {
    assert_budget("let _ =", MAX_SILENT_DISCARD);
}

#[test]
fn dot_ok_budget() {
    assert_budget(".ok()", MAX_DOT_OK);
}

#[test]
fn allow_dead_code_budget() {
    assert_budget("#[allow(dead_code)]", MAX_ALLOW_DEAD_CODE);
}

//! Input expansion: files, directories, recursion, and glob filters.
//!
//! `--in` accepts files and directories, repeatable. Directories expand to
//! their files — one level by default, the whole tree with `--recursive` —
//! and expanded candidates are filtered by the `--glob` filename patterns.
//! A file passed directly bypasses the glob filter: naming a file is already
//! an explicit choice.
//!
//! The result is deduplicated and deterministically ordered: inputs in the
//! order given, directory contents sorted by path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("input not found: {0}")]
    NotFound(String),
    #[error("no input files resolved from --in/--glob")]
    NoneResolved,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Expand `--in` arguments into a deduplicated, ordered list of files.
pub fn expand_inputs(
    inputs: &[PathBuf],
    recursive: bool,
    globs: &[String],
) -> Result<Vec<PathBuf>, InputError> {
    let patterns: Vec<&str> = globs
        .iter()
        .map(|g| g.trim())
        .filter(|g| !g.is_empty())
        .collect();

    let matches = |path: &Path| -> bool {
        if patterns.is_empty() {
            return true;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        patterns.iter().any(|pat| glob_match(pat, name))
    };

    let mut resolved: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for raw in inputs {
        if !raw.exists() {
            return Err(InputError::NotFound(raw.display().to_string()));
        }

        if raw.is_file() {
            let path = absolutize(raw);
            if seen.insert(path.clone()) {
                resolved.push(path);
            }
            continue;
        }
        if !raw.is_dir() {
            continue;
        }

        let mut candidates: Vec<PathBuf> = if recursive {
            let mut files = Vec::new();
            for entry in WalkDir::new(raw) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
            files
        } else {
            std::fs::read_dir(raw)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect()
        };
        candidates.sort();

        for candidate in candidates {
            if !matches(&candidate) {
                continue;
            }
            let path = absolutize(&candidate);
            if seen.insert(path.clone()) {
                resolved.push(path);
            }
        }
    }

    if resolved.is_empty() {
        return Err(InputError::NoneResolved);
    }
    Ok(resolved)
}

/// Absolute, symlink-resolved form when obtainable, absolute otherwise.
pub(crate) fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

/// Filename glob matching: `*`, `?`, and `[...]` classes (with `!` negation
/// and `a-z` ranges). Case-sensitive, matched against the name only.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    match_here(&pattern, &name)
}

fn match_here(pattern: &[char], name: &[char]) -> bool {
    let Some((&first, rest)) = pattern.split_first() else {
        return name.is_empty();
    };

    match first {
        '*' => (0..=name.len()).any(|skip| match_here(rest, &name[skip..])),
        '?' => !name.is_empty() && match_here(rest, &name[1..]),
        '[' => {
            let Some(close) = rest.iter().position(|&c| c == ']') else {
                // Unclosed class: treat '[' as a literal.
                return name.first() == Some(&'[') && match_here(rest, &name[1..]);
            };
            let (class, after) = rest.split_at(close);
            let Some((&c, remaining_name)) = name.split_first() else {
                return false;
            };
            class_matches(class, c) && match_here(&after[1..], remaining_name)
        }
        literal => name.first() == Some(&literal) && match_here(rest, &name[1..]),
    }
}

fn class_matches(class: &[char], c: char) -> bool {
    let (negated, class) = match class.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, class),
    };

    let mut hit = false;
    let mut i = 0;
    while i < class.len() {
        if i + 2 < class.len() && class[i + 1] == '-' {
            if class[i] <= c && c <= class[i + 2] {
                hit = true;
            }
            i += 3;
        } else {
            if class[i] == c {
                hit = true;
            }
            i += 1;
        }
    }
    hit != negated
}

//! Finds the app bundle inside a mounted disk image.

use std::path::{Path, PathBuf};

// Images are attacker-suppliable in principle; keep the fallback scan
// shallow so a malformed image cannot trigger a pathological walk.
const MAX_DEPTH: usize = 3;

/// Search `mount_root` for an entry named `expected_name`.
///
/// Checks the mount root directly first (the common disk image layout),
/// then falls back to a depth-limited recursive scan. Absence is a
/// normal outcome, reported as `None`.
pub fn locate_bundle(mount_root: &Path, expected_name: &str) -> Option<PathBuf> {
    let direct = mount_root.join(expected_name);
    if direct.exists() {
        return Some(direct);
    }
    search(mount_root, expected_name, MAX_DEPTH)
}

fn search(dir: &Path, expected_name: &str, depth: usize) -> Option<PathBuf> {
    if depth == 0 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_name() == expected_name {
            return Some(path);
        }
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    for sub in subdirs {
        if let Some(found) = search(&sub, expected_name, depth - 1) {
            return Some(found);
        }
    }
    None
}

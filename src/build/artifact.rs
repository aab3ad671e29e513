// ABOUTME: Build artifact scanning: file count, total size, and content hash.
// ABOUTME: Walks the artifact tree in sorted order so the hash is stable.

use crate::types::ContentHash;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};

/// A verified, non-empty build output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub file_count: usize,
    pub total_size: u64,
    pub hash: ContentHash,
}

impl BuildArtifact {
    /// Scan a directory. Returns `Ok(None)` if it holds no regular files.
    pub fn scan(path: &Path) -> io::Result<Option<Self>> {
        let files = walk_files(path)?;
        if files.is_empty() {
            return Ok(None);
        }

        let mut hasher = Sha256::new();
        let mut total_size = 0u64;
        for relative in &files {
            let content = std::fs::read(path.join(relative))?;
            total_size += content.len() as u64;
            hash_entry(&mut hasher, relative, &content);
        }

        Ok(Some(Self {
            path: path.to_path_buf(),
            file_count: files.len(),
            total_size,
            hash: ContentHash::from_digest(hasher),
        }))
    }
}

/// Feed one file into an artifact hash. Callers must visit files in
/// [`walk_files`] order.
pub fn hash_entry(hasher: &mut Sha256, relative: &Path, content: &[u8]) {
    hasher.update(relative.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update((content.len() as u64).to_le_bytes());
    hasher.update(content);
}

/// All regular files below `root`, as sorted paths relative to `root`.
///
/// Symlinks to files are followed; symlinked directories are not descended.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_into(root, Path::new(""), &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_into(root: &Path, relative: &Path, files: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries = std::fs::read_dir(root.join(relative))?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let child = relative.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            walk_into(root, &child, files)?;
        } else if file_type.is_file() {
            files.push(child);
        } else if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_file() => files.push(child),
                _ => tracing::debug!("Skipping symlink {}", entry.path().display()),
            }
        }
    }
    Ok(())
}

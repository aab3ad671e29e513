// ABOUTME: Packs a build artifact into an in-memory tar stream.
// ABOUTME: Re-hashes what it packs so only the verified build output is shipped.

use crate::build::{BuildArtifact, hash_entry, walk_files};
use crate::types::ContentHash;
use sha2::{Digest, Sha256};
use std::io;

/// Build a tar archive of every regular file in the artifact.
///
/// The archive is hashed from the same bytes that go into it. If the
/// directory no longer matches the hash taken when the build was verified,
/// packing fails with `InvalidData`.
pub async fn pack(artifact: &BuildArtifact) -> io::Result<Vec<u8>> {
    let artifact = artifact.clone();
    tokio::task::spawn_blocking(move || pack_blocking(&artifact))
        .await
        .map_err(io::Error::other)?
}

fn pack_blocking(artifact: &BuildArtifact) -> io::Result<Vec<u8>> {
    let root = &artifact.path;
    let mut builder = tar::Builder::new(Vec::new());
    let mut hasher = Sha256::new();

    for relative in walk_files(root)? {
        let full = root.join(&relative);
        let content = std::fs::read(&full)?;
        hash_entry(&mut hasher, &relative, &content);

        let mut header = tar::Header::new_gnu();
        header.set_metadata_in_mode(&std::fs::metadata(&full)?, tar::HeaderMode::Deterministic);
        header.set_size(content.len() as u64);
        builder.append_data(&mut header, &relative, content.as_slice())?;
    }

    let packed = ContentHash::from_digest(hasher);
    if packed != artifact.hash {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "artifact {} changed since it was built: expected {}, found {}",
                root.display(),
                artifact.hash,
                packed
            ),
        ));
    }
    builder.into_inner()
}

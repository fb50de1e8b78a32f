//! # Persist
//!
//! Writes a resolved secret value to a destination path, only when the
//! content differs.
//!
//! The value is first written to a temp file inside a controlled directory,
//! read back and hashed, then compared against the destination. The temp
//! file is removed on every exit path when the `NamedTempFile` drops.

use crate::observability::metrics;
use crate::provider::Payload;
use crate::reconciler::ReconcilerError;
use sha2::{Digest, Sha256};
use nix::unistd::{access, AccessFlags};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// SHA-256 of everything readable from `reader`
fn sha256_hex(reader: &mut impl Read) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Copy `payload` to `dest` unless `dest` already holds the same bytes
///
/// Returns whether a copy happened.
///
/// # Errors
/// `ReconcilerError::Io` when the temp file cannot be created, written or
/// read back, when `dest` (or its directory, for a new file) is not
/// accessible, or when the copy fails.
pub fn persist_to_file(tmp_dir: &Path, dest: &Path, payload: &Payload) -> Result<bool, ReconcilerError> {
    let mut temp = tempfile::NamedTempFile::new_in(tmp_dir)
        .map_err(|e| ReconcilerError::io("Failed to create temporary content file", e))?;
    let temp_path = temp.path().to_path_buf();

    temp.write_all(payload.as_bytes())
        .and_then(|()| temp.flush())
        .map_err(|e| ReconcilerError::io("Failed to create temporary content file", e))?;

    let checksum_src = File::open(&temp_path)
        .and_then(|mut file| sha256_hex(&mut file))
        .map_err(|e| {
            ReconcilerError::io(format!("Source '{}' is not readable", temp_path.display()), e)
        })?;

    let checksum_dest = if dest.exists() {
        access(dest, AccessFlags::W_OK).map_err(|errno| {
            ReconcilerError::io(format!("Destination '{}' is not writable", dest.display()), errno.into())
        })?;
        let checksum = access(dest, AccessFlags::R_OK)
            .map_err(std::io::Error::from)
            .and_then(|()| File::open(dest))
            .and_then(|mut file| sha256_hex(&mut file))
            .map_err(|e| {
                ReconcilerError::io(format!("Destination '{}' is not readable", dest.display()), e)
            })?;
        Some(checksum)
    } else {
        let dir = match dest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dir.is_dir() || access(dir, AccessFlags::W_OK).is_err() {
            return Err(ReconcilerError::io_message(format!(
                "Destination dir '{}' is not writable",
                dir.display()
            )));
        }
        None
    };

    if checksum_dest.as_deref() == Some(checksum_src.as_str()) {
        debug!("Destination {} already up to date", dest.display());
        return Ok(false);
    }

    // Truncate-and-write keeps the destination's existing permissions
    File::open(&temp_path)
        .and_then(|mut source| {
            let mut target = File::create(dest)?;
            std::io::copy(&mut source, &mut target)?;
            target.sync_all()
        })
        .map_err(|e| {
            ReconcilerError::io(
                format!("Failed to copy {} to {}", temp_path.display(), dest.display()),
                e,
            )
        })?;

    metrics::increment_file_writes();
    info!("Wrote secret value to {}", dest.display());
    Ok(true)
}

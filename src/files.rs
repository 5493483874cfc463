//! Reading certificate, key, container and CA material from disk.
//!
//! Everything is read synchronously and in full. Failures are classified
//! into [`TlsContextError::FileNotFound`] and [`TlsContextError::IoError`].

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::error::TlsContextError;
use crate::sensitive::SensitiveBytes;

/// Read a whole file that holds no secrets (certificates, CA bundles).
pub(crate) fn read(path: &Path) -> Result<Vec<u8>, TlsContextError> {
    std::fs::read(path).map_err(|e| TlsContextError::io(path, e))
}

const SENSITIVE_CHUNK: usize = 4096;

/// Read a whole file holding secret material. Every buffer the contents
/// pass through is wiped, including ones outgrown while reading.
pub(crate) fn read_sensitive(path: &Path) -> Result<SensitiveBytes, TlsContextError> {
    let mut file = File::open(path).map_err(|e| TlsContextError::io(path, e))?;
    let hint = file
        .metadata()
        .map(|m| m.len() as usize)
        .unwrap_or_default();
    let mut buf = Zeroizing::new(Vec::with_capacity(hint + 1));
    let mut chunk = Zeroizing::new([0u8; SENSITIVE_CHUNK]);
    loop {
        let n = match file.read(&mut chunk[..]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TlsContextError::io(path, e)),
        };
        if buf.capacity() - buf.len() < n {
            // Move into a larger buffer ourselves; the old one is wiped on drop.
            let mut grown = Zeroizing::new(Vec::with_capacity((buf.len() + n) * 2));
            grown.extend_from_slice(&buf);
            buf = grown;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(SensitiveBytes::from(buf))
}

/// Regular files directly inside `dir`, in name order.
pub(crate) fn regular_files(dir: &Path) -> Result<Vec<PathBuf>, TlsContextError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| TlsContextError::io(dir, e))? {
        let entry = entry.map_err(|e| TlsContextError::io(dir, e))?;
        let path = entry.path();
        // Follows symlinks, as hashed CA directories are made of them.
        match std::fs::metadata(&path) {
            Ok(md) if md.is_file() => files.push(path),
            Ok(_) => (),
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    files.sort();
    Ok(files)
}

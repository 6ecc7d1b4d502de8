// src/cert/operations.rs
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use uuid::Uuid;

use super::types::SignedCertificateArtifact;

/// Writes a role's certificate and key as a unit.
///
/// Both files go to temporary names in `output_dir` first and are renamed
/// over `<stem>.crt` / `<stem>.key` only once both writes succeeded, so a
/// failure never leaves a fresh key next to a stale certificate.
pub fn write_pair(
    output_dir: &Path,
    stem: &str,
    cert_pem: &[u8],
    key_pem: &[u8],
) -> io::Result<SignedCertificateArtifact> {
    fs::create_dir_all(output_dir)?;

    let cert_path = output_dir.join(format!("{}.crt", stem));
    let key_path = output_dir.join(format!("{}.key", stem));

    let staged_key = stage(output_dir, stem, key_pem, true)?;
    let staged_cert = match stage(output_dir, stem, cert_pem, false) {
        Ok(path) => path,
        Err(e) => {
            let _ = fs::remove_file(&staged_key);
            return Err(e);
        }
    };

    if let Err(e) = fs::rename(&staged_key, &key_path) {
        let _ = fs::remove_file(&staged_key);
        let _ = fs::remove_file(&staged_cert);
        return Err(e);
    }
    if let Err(e) = fs::rename(&staged_cert, &cert_path) {
        // The new key is already in place; drop the pair rather than
        // leave it next to a certificate for a different key.
        let _ = fs::remove_file(&staged_cert);
        let _ = fs::remove_file(&key_path);
        let _ = fs::remove_file(&cert_path);
        return Err(e);
    }

    Ok(SignedCertificateArtifact {
        role: stem.to_string(),
        cert_path,
        key_path,
    })
}

fn stage(dir: &Path, stem: &str, content: &[u8], private: bool) -> io::Result<PathBuf> {
    let path = dir.join(format!(".{}.{}.tmp", stem, Uuid::new_v4()));
    if let Err(e) = fs::write(&path, content) {
        let _ = fs::remove_file(&path);
        return Err(e);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if private {
            if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(0o600)) {
                let _ = fs::remove_file(&path);
                return Err(e);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = private;

    Ok(path)
}

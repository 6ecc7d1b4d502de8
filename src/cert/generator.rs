// src/cert/generator.rs
use std::path::Path;
use std::sync::Arc;

use super::ca::CaMaterial;
use super::openssl::{generate_private_key, sign_certificate, KEY_SIZE};
use super::operations::write_pair;
use super::types::{CertificateRole, SignedCertificateArtifact};
use crate::error::CertError;

/// Signs certificates for catalog roles and persists them.
pub trait CertGenerator {
    fn generate_and_persist(
        &self,
        role: &CertificateRole,
        output_dir: &Path,
    ) -> Result<SignedCertificateArtifact, CertError>;
}

/// Issues RSA certificates from the cluster's infrastructure CA.
pub struct InfraGenerator {
    ca: Arc<CaMaterial>,
    key_size: u32,
}

impl InfraGenerator {
    pub fn new(ca: Arc<CaMaterial>) -> Self {
        Self {
            ca,
            key_size: KEY_SIZE,
        }
    }
}

impl CertGenerator for InfraGenerator {
    fn generate_and_persist(
        &self,
        role: &CertificateRole,
        output_dir: &Path,
    ) -> Result<SignedCertificateArtifact, CertError> {
        let key = generate_private_key(self.key_size)
            .map_err(|e| CertError::generation(role.name(), e))?;
        let cert = sign_certificate(role, &key, &self.ca).map_err(|e| match e {
            CertError::Config(_) => e,
            other => CertError::generation(role.name(), other),
        })?;

        let cert_pem = cert
            .to_pem()
            .map_err(|e| CertError::generation(role.name(), e))?;
        let key_pem = key
            .private_key_to_pem_pkcs8()
            .map_err(|e| CertError::generation(role.name(), e))?;

        write_pair(output_dir, role.file_stem(), &cert_pem, &key_pem)
            .map_err(|e| CertError::generation(role.name(), format!("writing files: {}", e)))
    }
}

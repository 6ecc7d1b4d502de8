// Throwaway CAs for unit tests.
use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{
        extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier},
        X509NameBuilder, X509,
    },
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::cert::CaMaterial;

pub struct TestCa {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        Self::build(common_name, true)
    }

    /// A CA lacking the subject key identifier extension, as older tooling
    /// produced them.
    pub fn without_key_id(common_name: &str) -> Self {
        Self::build(common_name, false)
    }

    fn build(common_name: &str, key_id: bool) -> Self {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", common_name).unwrap();
        let name = name.build();

        let mut serial = BigNum::new().unwrap();
        serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder
            .set_serial_number(&serial.to_asn1_integer().unwrap())
            .unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(3650).unwrap())
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        if key_id {
            let ski = SubjectKeyIdentifier::new()
                .build(&builder.x509v3_context(None, None))
                .unwrap();
            builder.append_extension(ski).unwrap();
        }
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Self {
            cert: builder.build(),
            key,
        }
    }

    /// Writes `ca.crt` and `ca.key` under `dir` and returns their paths.
    pub fn write_to(&self, dir: &Path) -> (PathBuf, PathBuf) {
        fs::create_dir_all(dir).unwrap();
        let cert_path = dir.join("ca.crt");
        let key_path = dir.join("ca.key");
        fs::write(&cert_path, self.cert.to_pem().unwrap()).unwrap();
        fs::write(&key_path, self.key.private_key_to_pem_pkcs8().unwrap()).unwrap();
        (cert_path, key_path)
    }

    pub fn material(&self) -> CaMaterial {
        CaMaterial::from_parts(self.cert.clone(), self.key.clone()).unwrap()
    }
}

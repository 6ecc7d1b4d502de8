// src/cert/openssl.rs
use chrono::{Duration, Utc};
use openssl::{
    asn1::Asn1Time,
    bn::{BigNum, MsbOption},
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    x509::{
        extension::{
            AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage as ExtKeyUsageExt,
            KeyUsage as KeyUsageExt, SubjectAlternativeName, SubjectKeyIdentifier,
        },
        X509NameBuilder, X509,
    },
};

use super::ca::CaMaterial;
use super::types::{CertificateRole, ExtendedKeyUsage, KeyUsage};
use crate::error::CertError;

pub const KEY_SIZE: u32 = 2048;

/// Longest lifetime a node certificate may be issued for.
const MAX_VALIDITY_DAYS: i64 = 100 * 365;

/// Converts a validity value and its unit (`d`/`day(s)`, `m`/`minute(s)`).
pub fn validity_duration(validity: u32, unit: &str) -> Result<Duration, CertError> {
    let lifetime = match unit {
        "d" | "day" | "days" => Duration::try_days(i64::from(validity)),
        "m" | "minute" | "minutes" => Duration::try_minutes(i64::from(validity)),
        other => {
            return Err(CertError::Config(format!(
                "unknown validity unit {:?}, expected d or m",
                other
            )))
        }
    };

    match lifetime {
        Some(lifetime) if lifetime.num_days() <= MAX_VALIDITY_DAYS => Ok(lifetime),
        _ => Err(CertError::Config(format!(
            "validity {}{} exceeds the {} day limit",
            validity, unit, MAX_VALIDITY_DAYS
        ))),
    }
}

pub fn generate_private_key(bits: u32) -> Result<PKey<Private>, CertError> {
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

/// Builds the role's certificate for `key` and signs it with the CA.
pub fn sign_certificate(
    role: &CertificateRole,
    key: &PKey<Private>,
    ca: &CaMaterial,
) -> Result<X509, CertError> {
    let lifetime = validity_duration(role.validity, &role.unit)?;
    if role.common_name.is_empty() {
        return Err(CertError::Config(format!(
            "certificate {} has no common name",
            role.name()
        )));
    }
    let template = role.template();

    let mut name = X509NameBuilder::new()?;
    name.append_entry_by_text("CN", &role.common_name)?;
    if let Some(org) = template.organization {
        name.append_entry_by_text("O", org)?;
    }
    let name = name.build();

    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;

    let now = Utc::now();
    let expires = now.checked_add_signed(lifetime).ok_or_else(|| {
        CertError::Config(format!("validity of {} runs past the calendar", role.name()))
    })?;
    let not_before = Asn1Time::from_unix(now.timestamp())?;
    let not_after = Asn1Time::from_unix(expires.timestamp())?;
    let serial = serial.to_asn1_integer()?;

    let mut builder = X509::builder()?;
    builder.set_version(2)?;
    builder.set_serial_number(&serial)?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(ca.cert().subject_name())?;
    builder.set_pubkey(key)?;
    builder.set_not_before(&not_before)?;
    builder.set_not_after(&not_after)?;

    builder.append_extension(BasicConstraints::new().critical().build()?)?;

    let mut usage = KeyUsageExt::new();
    usage.critical();
    for u in template.key_usage {
        match u {
            KeyUsage::DigitalSignature => usage.digital_signature(),
            KeyUsage::KeyEncipherment => usage.key_encipherment(),
        };
    }
    builder.append_extension(usage.build()?)?;

    if !template.extended_key_usage.is_empty() {
        let mut ext_usage = ExtKeyUsageExt::new();
        for u in template.extended_key_usage {
            match u {
                ExtendedKeyUsage::ServerAuth => ext_usage.server_auth(),
                ExtendedKeyUsage::ClientAuth => ext_usage.client_auth(),
            };
        }
        builder.append_extension(ext_usage.build()?)?;
    }

    if !role.dns_names.is_empty() || !role.ip_addresses.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in &role.dns_names {
            san.dns(dns);
        }
        for ip in &role.ip_addresses {
            san.ip(&ip.to_string());
        }
        let san = san.build(&builder.x509v3_context(Some(ca.cert()), None))?;
        builder.append_extension(san)?;
    }

    let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(Some(ca.cert()), None))?;
    builder.append_extension(ski)?;
    // OpenSSL cannot derive an authority key id from a CA without an SKI.
    if ca.cert().subject_key_id().is_some() {
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(ca.cert()), None))?;
        builder.append_extension(aki)?;
    }

    builder.sign(ca.key(), MessageDigest::sha256())?;
    Ok(builder.build())
}

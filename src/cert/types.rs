// cert/types.rs
use std::net::IpAddr;
use std::path::PathBuf;

use crate::types::{CertKind, DependencyScope};

/// Static description of a certificate role, compiled into the catalog.
#[derive(Debug, Clone, Copy)]
pub struct RoleTemplate {
    pub name: &'static str,
    pub kind: CertKind,
    pub scope: DependencyScope,
    pub organization: Option<&'static str>,
    pub key_usage: &'static [KeyUsage],
    pub extended_key_usage: &'static [ExtendedKeyUsage],
    /// The cluster's Kubernetes service IP belongs in this role's SANs.
    pub service_ip_san: bool,
}

impl RoleTemplate {
    pub fn instantiate(&self) -> CertificateRole {
        CertificateRole {
            template: *self,
            common_name: String::new(),
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            validity: 0,
            unit: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedKeyUsage {
    ServerAuth,
    ClientAuth,
}

/// A catalog role with its subject fields filled in for one invocation.
#[derive(Debug, Clone)]
pub struct CertificateRole {
    template: RoleTemplate,
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub validity: u32,
    pub unit: String,
}

impl CertificateRole {
    pub fn name(&self) -> &'static str {
        self.template.name
    }

    pub fn kind(&self) -> CertKind {
        self.template.kind
    }

    pub fn template(&self) -> &RoleTemplate {
        &self.template
    }

    /// Replaces the subject fields with a copy of `subject`.
    pub fn apply_subject(&mut self, subject: &ResolvedSubject) {
        self.common_name = subject.common_name.clone();
        self.dns_names = subject.dns_names.clone();
        self.ip_addresses = subject.ip_addresses.clone();
    }

    pub fn add_dns(&mut self, name: &str) {
        push_unique(&mut self.dns_names, name.to_string());
    }

    pub fn add_ip(&mut self, ip: IpAddr) {
        push_unique(&mut self.ip_addresses, ip);
    }

    pub fn file_stem(&self) -> &'static str {
        self.template.name
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSubject {
    pub common_name: String,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
}

impl ResolvedSubject {
    pub fn add_dns(&mut self, name: &str) {
        push_unique(&mut self.dns_names, name.to_string());
    }

    pub fn add_ip(&mut self, ip: IpAddr) {
        push_unique(&mut self.ip_addresses, ip);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificateArtifact {
    pub role: String,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if !list.contains(&value) {
        list.push(value);
    }
}

// src/cert/mod.rs
mod ca;
pub mod catalog;
mod generator;
mod openssl;
pub mod operations;
pub mod san;
pub mod subject;
mod types;
pub mod verification;

pub use self::openssl::validity_duration;
pub use ca::CaMaterial;
pub use catalog::{eligible_roles, RoleFilter};
pub use generator::{CertGenerator, InfraGenerator};
pub use subject::{InterfaceProbe, SubjectResolver, SystemInterfaceProbe};
pub use types::{CertificateRole, ResolvedSubject, SignedCertificateArtifact};

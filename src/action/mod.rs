// src/action/mod.rs
mod create;
mod renew;

pub use create::Create;
pub use renew::Renew;

use std::sync::Arc;

use crate::cert::{
    san, verification, CaMaterial, CertGenerator, CertificateRole, InfraGenerator, InterfaceProbe,
    SignedCertificateArtifact, SubjectResolver, SystemInterfaceProbe,
};
use crate::config::Configuration;
use crate::error::{CertError, RoleFailure};

/// Lifecycle position of an action. Phases only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Configured,
    PreRun,
    Run,
    PostRun,
    Done,
}

/// One CLI operation: configure, then pre-run, run and post-run.
pub trait Action {
    fn base(&self) -> &BaseAction;
    fn base_mut(&mut self) -> &mut BaseAction;

    fn name(&self) -> &str {
        self.base().name
    }

    fn pre_run(&mut self) -> Result<(), CertError> {
        self.base_mut().pre_run()
    }

    fn run(&mut self) -> Result<(), CertError>;

    fn post_run(&mut self) -> Result<(), CertError> {
        self.base_mut().post_run()
    }
}

/// Drives every phase in order and stops at the first failing one.
pub fn execute(action: &mut dyn Action) -> Result<(), CertError> {
    action.base_mut().enter(Phase::PreRun);
    action.pre_run()?;
    action.base_mut().enter(Phase::Run);
    action.run()?;
    action.base_mut().enter(Phase::PostRun);
    action.post_run()?;
    action.base_mut().enter(Phase::Done);
    Ok(())
}

/// State and behaviour shared by every action.
pub struct BaseAction {
    name: &'static str,
    phase: Phase,
    cfg: Configuration,
    ca: Option<Arc<CaMaterial>>,
    generator: Box<dyn CertGenerator>,
    resolver: SubjectResolver,
    artifacts: Vec<SignedCertificateArtifact>,
}

impl BaseAction {
    /// Loads the CA named in `cfg`. Any problem with the CA material fails
    /// here, before a single role is attempted.
    pub fn new(name: &'static str, mut cfg: Configuration) -> Result<Self, CertError> {
        cfg.expand_paths();
        cfg.validate()?;

        let ca = Arc::new(CaMaterial::load(&cfg.ca_cert, &cfg.ca_key)?);
        let generator = Box::new(InfraGenerator::new(Arc::clone(&ca)));
        let mut base = Self::with_generator(
            name,
            cfg,
            generator,
            Box::new(SystemInterfaceProbe::default()),
        );
        base.ca = Some(ca);
        Ok(base)
    }

    pub fn with_generator(
        name: &'static str,
        cfg: Configuration,
        generator: Box<dyn CertGenerator>,
        probe: Box<dyn InterfaceProbe>,
    ) -> Self {
        let resolver = SubjectResolver::new(cfg.cluster.clone(), probe);
        Self {
            name,
            phase: Phase::Configured,
            cfg,
            ca: None,
            generator,
            resolver,
            artifacts: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &Configuration {
        &self.cfg
    }

    /// Artifacts written so far, in catalog order.
    pub fn artifacts(&self) -> &[SignedCertificateArtifact] {
        &self.artifacts
    }

    fn enter(&mut self, next: Phase) {
        debug_assert!(next > self.phase, "{:?} cannot follow {:?}", next, self.phase);
        self.phase = next;
    }

    fn pre_run(&mut self) -> Result<(), CertError> {
        tracing::debug!("***** {} PreRun *****", self.name.to_uppercase());

        if given_host(&self.cfg.host).is_none() {
            match hostname::get() {
                Ok(name) => {
                    let name = name.to_string_lossy().into_owned();
                    tracing::debug!("get local hostname: {}", name);
                    self.cfg.host = Some(name);
                }
                Err(e) => tracing::warn!("failed to get local hostname: {}", e),
            }
        }

        self.cfg.debug();

        if given_host(&self.cfg.host).is_none() {
            return Err(CertError::Config(
                "host is not set and the local hostname is unknown".to_string(),
            ));
        }
        Ok(())
    }

    fn post_run(&mut self) -> Result<(), CertError> {
        tracing::debug!("***** {} PostRun *****", self.name.to_uppercase());

        let Some(ca) = &self.ca else {
            return Ok(());
        };
        for artifact in &self.artifacts {
            match verification::inspect_certificate(&artifact.cert_path, ca) {
                Ok(info) => {
                    tracing::debug!(
                        "{}: subject={} issuer={} serial={} sha256={}",
                        info.path.display(),
                        info.subject,
                        info.issuer,
                        info.serial,
                        info.fingerprint
                    );
                    tracing::debug!(
                        "{}: valid {} to {}, DNS {:?} IPs {:?}",
                        artifact.role,
                        info.not_before.format("%Y-%m-%d %H:%M:%S"),
                        info.not_after.format("%Y-%m-%d %H:%M:%S"),
                        info.dns_names,
                        info.ip_addresses
                    );
                    if !info.signed_by_ca {
                        tracing::warn!("{} does not verify against the CA", artifact.role);
                    }
                }
                Err(e) => tracing::warn!("cannot inspect {}: {}", artifact.cert_path.display(), e),
            }
        }
        Ok(())
    }

    /// Resolves the node's subject once and issues every role in `roles`.
    ///
    /// `prepare` runs on each role after the shared subject is applied and
    /// before signing. A failing role is recorded and the loop moves on; all
    /// failures come back together as `CertError::Aggregate`.
    fn iterate(
        &mut self,
        roles: Vec<CertificateRole>,
        prepare: &mut dyn FnMut(&mut CertificateRole),
    ) -> Result<(), CertError> {
        let host = given_host(&self.cfg.host)
            .map(str::to_string)
            .ok_or_else(|| CertError::Config("host is not set".to_string()))?;
        let subject = self
            .resolver
            .resolve(&host, self.cfg.node_type.is_control_plane());
        let overrides = san::parse(&self.cfg.server_cert_san);
        if !overrides.is_empty() {
            tracing::debug!("SAN overrides: {:?}", overrides);
        }
        let service_ip = overrides.service_ip.or_else(|| {
            self.cfg
                .cluster
                .kube_service_ip
                .as_deref()
                .and_then(|ip| ip.trim().parse().ok())
        });

        let mut failures = Vec::new();
        for mut role in roles {
            role.apply_subject(&subject);
            for dns in &overrides.dns {
                role.add_dns(dns);
            }
            for ip in overrides.valid_ips() {
                role.add_ip(ip);
            }
            if role.template().service_ip_san {
                if let Some(ip) = service_ip {
                    role.add_ip(ip);
                }
            }
            role.validity = self.cfg.validity;
            role.unit = self.cfg.unit.clone();
            prepare(&mut role);

            tracing::debug!("cert {} CN: {}", role.name(), role.common_name);
            tracing::debug!("cert {} DNS: {:?}", role.name(), role.dns_names);
            tracing::debug!("cert {} IPs: {:?}", role.name(), role.ip_addresses);

            match self
                .generator
                .generate_and_persist(&role, &self.cfg.output_dir)
            {
                Ok(artifact) => {
                    tracing::info!(
                        "generated {} ({})",
                        role.name(),
                        artifact.cert_path.display()
                    );
                    self.artifacts.push(artifact);
                }
                Err(e) => {
                    tracing::error!("{}: {}", role.name(), e);
                    failures.push(RoleFailure {
                        role: role.name().to_string(),
                        error: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CertError::Aggregate(failures))
        }
    }
}

/// The configured host, unless it is missing or blank.
fn given_host(host: &Option<String>) -> Option<&str> {
    host.as_deref().map(str::trim).filter(|h| !h.is_empty())
}

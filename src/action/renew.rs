// src/action/renew.rs
use super::{Action, BaseAction};
use crate::cert::{eligible_roles, verification, CertificateRole, RoleFilter};
use crate::cluster::{secrets::secret_name, SecretStore};
use crate::config::Configuration;
use crate::error::CertError;

/// Re-issues a subset of the node's certificates with the same CA.
///
/// On the master node the certificates already stored in the cluster are
/// consulted first so that renewal keeps every name they were issued for.
pub struct Renew {
    base: BaseAction,
    filter: RoleFilter,
    store: Box<dyn SecretStore>,
}

impl Renew {
    pub fn new(
        cfg: Configuration,
        filter: RoleFilter,
        store: Box<dyn SecretStore>,
    ) -> Result<Self, CertError> {
        filter.validate()?;
        Ok(Self {
            base: BaseAction::new("renew", cfg)?,
            filter,
            store,
        })
    }

    #[cfg(test)]
    fn from_base(base: BaseAction, filter: RoleFilter, store: Box<dyn SecretStore>) -> Self {
        Self {
            base,
            filter,
            store,
        }
    }
}

impl Action for Renew {
    fn base(&self) -> &BaseAction {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseAction {
        &mut self.base
    }

    fn run(&mut self) -> Result<(), CertError> {
        tracing::debug!("***** {} Run *****", self.name().to_uppercase());

        let roles = self.filter.apply(eligible_roles(self.base.cfg.node_type));
        if roles.is_empty() {
            tracing::warn!(
                "no certificate matches the renewal filter on a {} node",
                self.base.cfg.node_type
            );
            return Ok(());
        }

        if !self.base.cfg.env.run_on_master {
            return self.base.iterate(roles, &mut |_| {});
        }

        tracing::debug!("renew certificate secrets on master node");
        let namespace = self.base.cfg.env.namespace.clone();
        let store = self.store.as_ref();
        self.base
            .iterate(roles, &mut |role| merge_issued(store, &namespace, role))
    }
}

/// Adds the SANs of the certificate currently stored for `role`.
/// Anything missing or unreadable only costs a warning.
fn merge_issued(store: &dyn SecretStore, namespace: &str, role: &mut CertificateRole) {
    let pem = match store.issued_certificate(namespace, role.name()) {
        Ok(Some(pem)) => pem,
        Ok(None) => {
            tracing::warn!(
                "secret {}/{} not found, generating fresh {} certificate",
                namespace,
                secret_name(role.name()),
                role.name()
            );
            return;
        }
        Err(e) => {
            tracing::warn!("cannot read issued {} certificate: {}", role.name(), e);
            return;
        }
    };

    match verification::subject_alt_names(&pem) {
        Ok((dns, ips)) => {
            tracing::debug!("{} was issued for DNS {:?} IPs {:?}", role.name(), dns, ips);
            for name in &dns {
                role.add_dns(name);
            }
            for ip in ips {
                role.add_ip(ip);
            }
        }
        Err(e) => tracing::warn!("ignoring issued {} certificate: {}", role.name(), e),
    }
}

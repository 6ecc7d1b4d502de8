// src/cert/subject.rs
use std::net::{IpAddr, Ipv4Addr, SocketAddrV4};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::types::ResolvedSubject;
use crate::config::ClusterAddresses;

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Finds a local address to add to a control-plane certificate.
pub trait InterfaceProbe: Send + Sync {
    fn first_ipv4(&self) -> Option<Ipv4Addr>;
}

/// Enumerates the host's interfaces, giving up after `timeout`.
pub struct SystemInterfaceProbe {
    timeout: Duration,
}

impl SystemInterfaceProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemInterfaceProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl InterfaceProbe for SystemInterfaceProbe {
    fn first_ipv4(&self) -> Option<Ipv4Addr> {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("ifaddrs-probe".to_string())
            .spawn(move || {
                let _ = tx.send(scan_interfaces());
            });
        if let Err(e) = spawned {
            tracing::warn!("network introspection unavailable: {}", e);
            return None;
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                tracing::warn!("network introspection failed: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "network introspection timed out after {}ms",
                    self.timeout.as_millis()
                );
                None
            }
        }
    }
}

fn scan_interfaces() -> nix::Result<Option<Ipv4Addr>> {
    let addrs = nix::ifaddrs::getifaddrs()?;
    for ifaddr in addrs {
        let Some(sin) = ifaddr.address.as_ref().and_then(|a| a.as_sockaddr_in()) else {
            continue;
        };
        let ip = *SocketAddrV4::from(*sin).ip();
        if !ip.is_loopback() && !ip.is_unspecified() {
            tracing::debug!("using address {} of interface {}", ip, ifaddr.interface_name);
            return Ok(Some(ip));
        }
    }
    Ok(None)
}

/// Derives CN and SANs for a node from its address and the cluster addresses.
pub struct SubjectResolver {
    cluster: ClusterAddresses,
    probe: Box<dyn InterfaceProbe>,
}

impl SubjectResolver {
    pub fn new(cluster: ClusterAddresses, probe: Box<dyn InterfaceProbe>) -> Self {
        Self { cluster, probe }
    }

    pub fn resolve(&self, address: &str, is_control_plane: bool) -> ResolvedSubject {
        let ipv4 = address.parse::<Ipv4Addr>().ok();
        let mut subject = ResolvedSubject {
            common_name: match ipv4 {
                Some(_) => format!("host-{}", address),
                None => address.to_string(),
            },
            ..ResolvedSubject::default()
        };

        if !is_control_plane {
            return subject;
        }

        if let Some(vip) = present(&self.cluster.virtual_ip) {
            match vip.parse::<IpAddr>() {
                Ok(ip) => subject.add_ip(ip),
                Err(_) => tracing::warn!("ignoring cluster virtual IP {:?}: not an IP address", vip),
            }
        }
        if let Some(lb) = present(&self.cluster.load_balancer) {
            match lb.parse::<IpAddr>() {
                Ok(ip) => subject.add_ip(ip),
                Err(_) => subject.add_dns(lb),
            }
        }

        match ipv4 {
            Some(ip) => subject.add_ip(IpAddr::V4(ip)),
            None => {
                subject.add_dns(address);
                if let Some(short) = address.split('.').next().filter(|s| !s.is_empty()) {
                    subject.add_dns(short);
                }
                if let Some(local) = self.probe.first_ipv4() {
                    subject.add_ip(IpAddr::V4(local));
                }
            }
        }

        subject
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedProbe(pub Option<Ipv4Addr>);

    impl InterfaceProbe for FixedProbe {
        fn first_ipv4(&self) -> Option<Ipv4Addr> {
            self.0
        }
    }

    fn resolver(cluster: ClusterAddresses, local: Option<Ipv4Addr>) -> SubjectResolver {
        SubjectResolver::new(cluster, Box::new(FixedProbe(local)))
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn ipv4_addresses_get_host_prefixed_cn() {
        let r = resolver(ClusterAddresses::default(), None);
        for addr in ["10.0.0.5", "192.168.1.1", "0.0.0.0"] {
            assert_eq!(r.resolve(addr, false).common_name, format!("host-{}", addr));
            assert_eq!(r.resolve(addr, true).common_name, format!("host-{}", addr));
        }
    }

    #[test]
    fn other_addresses_are_their_own_cn() {
        let r = resolver(ClusterAddresses::default(), None);
        for addr in ["node1.cluster.local", "2001:db8::1", "not_a_host!", "10.0.0"] {
            assert_eq!(r.resolve(addr, false).common_name, addr);
            assert_eq!(r.resolve(addr, true).common_name, addr);
        }
    }

    #[test]
    fn worker_gets_no_sans() {
        let cluster = ClusterAddresses {
            virtual_ip: Some("10.0.0.1".to_string()),
            load_balancer: Some("lb.example".to_string()),
            kube_service_ip: None,
        };
        let subject = resolver(cluster, Some(Ipv4Addr::new(10, 1, 1, 1))).resolve("worker1.example", false);
        assert!(subject.dns_names.is_empty());
        assert!(subject.ip_addresses.is_empty());
    }

    #[test]
    fn control_plane_without_cluster_addresses_has_only_address_entries() {
        let cluster = ClusterAddresses {
            virtual_ip: Some(String::new()),
            load_balancer: Some("  ".to_string()),
            kube_service_ip: None,
        };
        let subject = resolver(cluster, None).resolve("10.0.0.5", true);
        assert_eq!(subject.dns_names, Vec::<String>::new());
        assert_eq!(subject.ip_addresses, vec![ip("10.0.0.5")]);

        let subject = resolver(ClusterAddresses::default(), None).resolve("cp.example.com", true);
        assert_eq!(subject.dns_names, vec!["cp.example.com", "cp"]);
        assert!(subject.ip_addresses.is_empty());
        assert!(subject.dns_names.iter().all(|d| !d.is_empty()));
    }

    #[test]
    fn control_plane_fqdn_with_virtual_ip() {
        let cluster = ClusterAddresses {
            virtual_ip: Some("10.0.0.1".to_string()),
            ..ClusterAddresses::default()
        };
        let subject = resolver(cluster, Some(Ipv4Addr::new(172, 16, 0, 4))).resolve("node1.cluster.local", true);
        assert_eq!(subject.common_name, "node1.cluster.local");
        assert_eq!(subject.dns_names, vec!["node1.cluster.local", "node1"]);
        assert_eq!(subject.ip_addresses, vec![ip("10.0.0.1"), ip("172.16.0.4")]);
    }

    #[test]
    fn load_balancer_is_classified_once() {
        let by_ip = ClusterAddresses {
            load_balancer: Some("192.0.2.10".to_string()),
            ..ClusterAddresses::default()
        };
        let subject = resolver(by_ip, None).resolve("10.0.0.5", true);
        assert_eq!(subject.ip_addresses, vec![ip("192.0.2.10"), ip("10.0.0.5")]);
        assert!(subject.dns_names.is_empty());

        let by_name = ClusterAddresses {
            load_balancer: Some("api.cluster.example".to_string()),
            ..ClusterAddresses::default()
        };
        let subject = resolver(by_name, None).resolve("10.0.0.5", true);
        assert_eq!(subject.dns_names, vec!["api.cluster.example"]);
        assert_eq!(subject.ip_addresses, vec![ip("10.0.0.5")]);
    }

    #[test]
    fn single_label_host_is_not_duplicated() {
        let subject = resolver(ClusterAddresses::default(), None).resolve("master", true);
        assert_eq!(subject.dns_names, vec!["master"]);
    }

    #[test]
    fn system_probe_never_returns_loopback() {
        if let Some(found) = SystemInterfaceProbe::default().first_ipv4() {
            assert!(!found.is_loopback());
        }
    }
}

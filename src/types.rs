// types.rs
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::CertError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Worker,
    #[default]
    #[serde(alias = "controlplane")]
    ControlPlane,
}

impl NodeType {
    pub fn is_control_plane(self) -> bool {
        self == NodeType::ControlPlane
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Worker => write!(f, "worker"),
            NodeType::ControlPlane => write!(f, "control-plane"),
        }
    }
}

impl FromStr for NodeType {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "worker" => Ok(NodeType::Worker),
            "control-plane" | "controlplane" => Ok(NodeType::ControlPlane),
            other => Err(CertError::Config(format!("unknown node type: {}", other))),
        }
    }
}

/// Which class of node needs a certificate role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyScope {
    WorkerOnly,
    ControlPlaneOnly,
    Both,
}

impl DependencyScope {
    pub fn includes(self, node_type: NodeType) -> bool {
        match (self, node_type) {
            (DependencyScope::Both, _) => true,
            (DependencyScope::WorkerOnly, NodeType::Worker) => true,
            (DependencyScope::WorkerOnly, NodeType::ControlPlane) => false,
            (DependencyScope::ControlPlaneOnly, NodeType::ControlPlane) => true,
            (DependencyScope::ControlPlaneOnly, NodeType::Worker) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertKind {
    Internal,
    External,
}

impl fmt::Display for CertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertKind::Internal => write!(f, "internal"),
            CertKind::External => write!(f, "external"),
        }
    }
}

impl FromStr for CertKind {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "internal" => Ok(CertKind::Internal),
            "external" => Ok(CertKind::External),
            other => Err(CertError::Config(format!("unknown certificate kind: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_truth_table() {
        assert!(DependencyScope::WorkerOnly.includes(NodeType::Worker));
        assert!(!DependencyScope::WorkerOnly.includes(NodeType::ControlPlane));
        assert!(DependencyScope::ControlPlaneOnly.includes(NodeType::ControlPlane));
        assert!(!DependencyScope::ControlPlaneOnly.includes(NodeType::Worker));
        assert!(DependencyScope::Both.includes(NodeType::Worker));
        assert!(DependencyScope::Both.includes(NodeType::ControlPlane));
    }

    #[test]
    fn node_type_accepts_both_spellings() {
        assert_eq!("controlplane".parse::<NodeType>().unwrap(), NodeType::ControlPlane);
        assert_eq!("Control-Plane".parse::<NodeType>().unwrap(), NodeType::ControlPlane);
        assert_eq!("worker".parse::<NodeType>().unwrap(), NodeType::Worker);
        assert!("master".parse::<NodeType>().is_err());
    }
}

// src/main.rs
mod action;
mod cert;
mod cluster;
mod config;
mod error;
mod types;
mod utils;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

use action::{execute, Action, Create, Renew};
use cert::RoleFilter;
use cluster::KubectlSecretStore;
use config::Configuration;
use error::CertError;
use types::{CertKind, NodeType};

#[derive(Parser)]
#[command(name = "certmng", version, about = "Issue and renew cluster node certificates")]
pub struct Args {
    /// JSON or YAML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(short, long)]
    pub debug: bool,
    /// Append log output to this file as well
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// Write the effective configuration to this file before running
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Issue every certificate the node type needs
    Create(CertOptions),
    /// Re-issue internal (or selected) certificates with the same CA
    Renew {
        #[command(flatten)]
        cert: CertOptions,
        #[command(flatten)]
        renew: RenewOptions,
    },
}

/// Flags shared by both commands. Only flags actually given replace the
/// values read from the configuration file.
#[derive(ClapArgs)]
pub struct CertOptions {
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,
    #[arg(long)]
    pub ca_key: Option<PathBuf>,
    #[arg(long, value_parser = parse_node_type)]
    pub node_type: Option<NodeType>,
    /// Node address: an IPv4 literal or a hostname (defaults to the local hostname)
    #[arg(long)]
    pub host: Option<String>,
    /// Extra SANs, e.g. "DNS:api.example.com,IP:10.0.0.9,K8SSVCIP:10.96.0.1"
    #[arg(long)]
    pub server_cert_san: Option<String>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    #[arg(short = 'V', long)]
    pub validity: Option<u32>,
    /// Validity unit: d (days) or m (minutes)
    #[arg(long)]
    pub unit: Option<String>,
    #[arg(long)]
    pub virtual_ip: Option<String>,
    #[arg(long)]
    pub load_balancer: Option<String>,
    #[arg(long)]
    pub kube_service_ip: Option<String>,
}

#[derive(ClapArgs)]
pub struct RenewOptions {
    #[arg(long, value_enum, default_value = "internal")]
    pub kind: KindArg,
    /// Renew only the named role; repeat for several
    #[arg(long = "role")]
    pub roles: Vec<String>,
    /// Merge the SANs of certificates already stored in the cluster
    #[arg(long, env = "CERTMNG_RUN_ON_MASTER")]
    pub run_on_master: bool,
    #[arg(long)]
    pub namespace: Option<String>,
    /// kubeconfig used to read stored certificates
    #[arg(long)]
    pub kubeconfig: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Internal,
    External,
    All,
}

impl KindArg {
    fn kind(self) -> Option<CertKind> {
        match self {
            KindArg::Internal => Some(CertKind::Internal),
            KindArg::External => Some(CertKind::External),
            KindArg::All => None,
        }
    }
}

fn parse_node_type(s: &str) -> Result<NodeType, String> {
    s.parse().map_err(|e: CertError| e.to_string())
}

impl CertOptions {
    fn apply(&self, cfg: &mut Configuration) {
        if let Some(v) = &self.ca_cert {
            cfg.ca_cert = v.clone();
        }
        if let Some(v) = &self.ca_key {
            cfg.ca_key = v.clone();
        }
        if let Some(v) = self.node_type {
            cfg.node_type = v;
        }
        if let Some(v) = &self.host {
            cfg.host = Some(v.clone());
        }
        if let Some(v) = &self.server_cert_san {
            cfg.server_cert_san = v.clone();
        }
        if let Some(v) = &self.output_dir {
            cfg.output_dir = v.clone();
        }
        if let Some(v) = self.validity {
            cfg.validity = v;
        }
        if let Some(v) = &self.unit {
            cfg.unit = v.clone();
        }
        if let Some(v) = &self.virtual_ip {
            cfg.cluster.virtual_ip = Some(v.clone());
        }
        if let Some(v) = &self.load_balancer {
            cfg.cluster.load_balancer = Some(v.clone());
        }
        if let Some(v) = &self.kube_service_ip {
            cfg.cluster.kube_service_ip = Some(v.clone());
        }
    }
}

impl RenewOptions {
    fn apply(&self, cfg: &mut Configuration) {
        if self.run_on_master {
            cfg.env.run_on_master = true;
        }
        if let Some(ns) = &self.namespace {
            cfg.env.namespace = ns.clone();
        }
    }

    fn filter(&self) -> RoleFilter {
        RoleFilter {
            kind: self.kind.kind(),
            names: self.roles.clone(),
        }
    }
}

/// File values first, then whatever the command line supplies.
fn build_configuration(args: &Args) -> Result<Configuration, CertError> {
    let mut cfg = match &args.config {
        Some(path) => Configuration::load_from_file(path)?,
        None => Configuration::default(),
    };

    match &args.command {
        Command::Create(opts) => opts.apply(&mut cfg),
        Command::Renew { cert, renew } => {
            cert.apply(&mut cfg);
            renew.apply(&mut cfg);
        }
    }
    Ok(cfg)
}

fn build_action(args: &Args, cfg: Configuration) -> Result<Box<dyn Action>, CertError> {
    Ok(match &args.command {
        Command::Create(_) => Box::new(Create::new(cfg)?),
        Command::Renew { renew, .. } => {
            let store = KubectlSecretStore::new(renew.kubeconfig.clone());
            Box::new(Renew::new(cfg, renew.filter(), Box::new(store))?)
        }
    })
}

fn report(action: &dyn Action, result: &Result<(), CertError>) {
    let artifacts = action.base().artifacts();
    for artifact in artifacts {
        eprintln!("  ok      {:<32} {}", artifact.role, artifact.cert_path.display());
    }

    match result {
        Ok(()) => eprintln!(
            "{}: {} certificate(s) issued into {}",
            action.name(),
            artifacts.len(),
            action.base().config().output_dir.display()
        ),
        Err(CertError::Aggregate(failures)) => {
            for failure in failures {
                eprintln!("  failed  {:<32} {}", failure.role, failure.error);
            }
            eprintln!(
                "{}: {} issued, {} failed",
                action.name(),
                artifacts.len(),
                failures.len()
            );
        }
        Err(e) => eprintln!(
            "{} failed during {:?}: {}",
            action.name(),
            action.base().phase(),
            e
        ),
    }
}

fn run(args: Args) -> Result<(), CertError> {
    let cfg = build_configuration(&args)?;
    if let Some(path) = &args.save_config {
        cfg.save_to_file(path)?;
        tracing::info!("configuration saved to {}", path.display());
    }

    let mut action = build_action(&args, cfg)?;
    let result = execute(&mut *action);
    report(&*action, &result);
    result
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = utils::logging::init(args.debug, args.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

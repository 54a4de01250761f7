//! Definitions of CLI arguments and commands for deploy scripts

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    chain::Chain,
    commands::{deploy, status, transfer_owners},
    config::{AddressOverrides, EndpointArgs, Network},
    constants::{DEFAULT_ARTIFACTS_DIR, DEFAULT_DEPLOYMENTS_DIR},
    errors::ScriptError,
    steps::{StepRunner, UnsupportedPolicy},
};

/// Deploy the buyback contracts and hand them to the multisig
#[derive(Parser)]
pub struct Cli {
    /// The network to deploy to
    #[arg(short, long, value_enum, env = "NETWORK", default_value_t = Network::Localhost)]
    pub network: Network,

    /// RPC endpoint and keys
    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Overrides for the external addresses the contracts are configured with
    #[command(flatten)]
    pub addresses: AddressOverrides,

    /// Directory holding the deployment records, one subdirectory per network
    #[arg(long, default_value = DEFAULT_DEPLOYMENTS_DIR)]
    pub deployments_dir: PathBuf,

    /// Directory holding the compiled contract artifacts
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// File to write transactions awaiting the multisig to,
    /// defaults to `<deployments-dir>/<network>.pending.json`
    #[arg(long)]
    pub pending_actions: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// The deploy script commands
#[derive(Subcommand)]
pub enum Command {
    /// Run the deployment steps
    Deploy(DeployArgs),
    /// Make the multisig the owner of every deployed contract
    TransferOwners(ReconcileArgs),
    /// Print the deployment records and live ownership, sending nothing
    Status,
}

impl Command {
    /// Whether the command may send transactions
    pub fn is_read_only(&self) -> bool {
        matches!(self, Command::Status)
    }

    /// Run the command
    pub async fn run(self, runner: &mut StepRunner<impl Chain>) -> Result<(), ScriptError> {
        match self {
            Command::Deploy(args) => deploy(args, runner).await,
            Command::TransferOwners(args) => transfer_owners(args, runner).await,
            Command::Status => status(runner).await,
        }
    }
}

/// Run the deployment steps
#[derive(Args)]
pub struct DeployArgs {
    /// Only run the steps with these tags, plus those producing records they need
    #[arg(short, long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Ownership reconciliation options
    #[command(flatten)]
    pub reconcile: ReconcileArgs,
}

/// Options for handing ownership to the multisig
#[derive(Args)]
pub struct ReconcileArgs {
    /// Skip contracts without two-phase ownership instead of stopping at the first one
    #[arg(long)]
    pub continue_on_unsupported: bool,
}

impl ReconcileArgs {
    /// The policy for contracts without ownership support
    pub fn policy(&self) -> UnsupportedPolicy {
        if self.continue_on_unsupported {
            UnsupportedPolicy::SkipContract
        } else {
            UnsupportedPolicy::StopAll
        }
    }
}

use buyback_scripts::{
    artifacts::ArtifactStore,
    chain::Chain,
    cli::Cli,
    config::NamedAddresses,
    deployments::DeploymentStore,
    errors::ScriptError,
    steps::StepRunner,
    utils::{default_pending_actions_path, network_deployments_dir, setup_client},
};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), ScriptError> {
    // Values in `.env` back the environment-sourced arguments
    dotenvy::dotenv().ok();

    let Cli {
        network,
        endpoint,
        addresses,
        deployments_dir,
        artifacts_dir,
        pending_actions,
        command,
    } = Cli::parse();

    tracing_subscriber::fmt().pretty().init();

    let client = setup_client(network, &endpoint).await?;
    let chain_id = client.chain_id();
    let addresses = NamedAddresses::resolve(chain_id, &addresses)?;
    let deployments =
        DeploymentStore::load(network_deployments_dir(&deployments_dir, network), chain_id)?;

    let read_only = command.is_read_only();
    let mut runner =
        StepRunner::new(client, addresses, ArtifactStore::new(artifacts_dir), deployments);
    let result = command.run(&mut runner).await;

    // Whatever was deferred before a failure still needs executing
    if !read_only {
        let path = pending_actions
            .unwrap_or_else(|| default_pending_actions_path(&deployments_dir, network));
        runner.pending().write(&path, chain_id)?;
    }

    result
}

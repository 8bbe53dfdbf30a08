use anyhow::Result;
use binding_mcp::{
    codegen::BindingGenerator, config::Config, ethereum::artifact::ContractArtifact,
    server::BindingMcpServer,
};
use clap::{Arg, Command};
use std::path::PathBuf;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (important for MCP stdio servers)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let matches = Command::new("binding-mcp")
        .version("0.1.0")
        .about("MCP server for contract bindings built from deployment artifacts")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to configuration file"),
        )
        .arg(
            Arg::new("network")
                .short('n')
                .long("network")
                .value_name("NETWORK")
                .help("Default network to use (development, live, testnet, staging)"),
        )
        .arg(
            Arg::new("rpc-url")
                .short('r')
                .long("rpc-url")
                .value_name("URL")
                .help("RPC endpoint URL for the default network"),
        )
        .arg(
            Arg::new("artifacts")
                .short('a')
                .long("artifacts")
                .value_name("DIR")
                .help("Directory of contract artifacts"),
        )
        .arg(
            Arg::new("allow-writes")
                .long("allow-writes")
                .help("Allow write operations (transactions and deployments)")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .help("Generate a sample configuration file and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config-path")
                .long("config-path")
                .help("Print the default configuration file path and exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("generate-bindings")
                .long("generate-bindings")
                .value_name("ARTIFACT")
                .help("Generate a Rust binding module from an artifact and exit"),
        )
        .arg(
            Arg::new("out-dir")
                .long("out-dir")
                .value_name("DIR")
                .requires("generate-bindings")
                .help("Write the generated binding here instead of stdout"),
        )
        .get_matches();

    // Handle special commands first
    if matches.get_flag("generate-config") {
        let sample_config = Config::generate_sample();
        println!("{}", sample_config);
        return Ok(());
    }

    if matches.get_flag("config-path") {
        match Config::default_config_path() {
            Ok(path) => {
                println!("{}", path.display());
                return Ok(());
            }
            Err(e) => {
                error!("Could not determine default config path: {}", e);
                return Err(e);
            }
        }
    }

    if let Some(artifact_path) = matches.get_one::<String>("generate-bindings") {
        let artifact = ContractArtifact::load_from_file(artifact_path).await?;
        let generator = BindingGenerator::new(&artifact)?;
        match matches.get_one::<String>("out-dir") {
            Some(out_dir) => {
                let path = generator.write_to(&PathBuf::from(out_dir)).await?;
                println!("{}", path.display());
            }
            None => println!("{}", generator.render()),
        }
        return Ok(());
    }

    // Load configuration
    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let mut config = Config::load_or_default(config_path).await;

    // Override with command line arguments
    if let Some(network) = matches.get_one::<String>("network") {
        config.default_network = network.clone();
    }

    if let Some(rpc_url) = matches.get_one::<String>("rpc-url") {
        if let Some(network_config) = config.networks.get_mut(&config.default_network) {
            network_config.rpc_url = rpc_url.clone();
        }
    }

    if let Some(dir) = matches.get_one::<String>("artifacts") {
        config.artifacts.dir = PathBuf::from(dir);
    }

    if matches.get_flag("allow-writes") {
        config.security.allow_write_operations = true;
    }

    config.validate()?;

    info!("Starting binding MCP server");
    info!("Default network: {}", config.default_network);
    info!("Artifacts: {}", config.artifacts.dir.display());
    info!(
        "Write operations allowed: {}",
        config.security.allow_write_operations
    );

    let server = BindingMcpServer::new(config).await?;

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}

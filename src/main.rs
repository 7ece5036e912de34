//! agentscope CLI binary entry point.

use agentscope::cli::{run, Cli, Commands};
use agentscope::config::AgentScopeConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();

    let result = match &cli.command {
        Commands::Format(args) => run::handle_format(args),
        Commands::Chat(args) => match AgentScopeConfig::load(cli.config.as_deref()) {
            Ok(config) => run::handle_chat(args, &config).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

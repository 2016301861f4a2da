use clap::Parser;
use lifeline::adapter::inbound::cli::command::{CheckCommand, Cli, Commands};
use lifeline::adapter::inbound::cli::output::{self, OutputConfig};
use lifeline::adapter::inbound::cli::{check, run};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    // Only ring is compiled in; installing fails harmlessly if already set.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();
    cli.color.apply();
    output::configure(OutputConfig::new(cli.json, cli.quiet, cli.verbose));

    let result = match &cli.command {
        Commands::Run(args) => run::execute(args).await,
        Commands::Check(CheckCommand::Config(args)) => check::config::execute_config(&args.config),
        Commands::Check(CheckCommand::Connection(args)) => {
            check::connection::execute_connection(&args.config).await
        }
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

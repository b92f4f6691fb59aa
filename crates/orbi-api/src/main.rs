//! Orbi relay entry point.
//!
//! Binary name: `orbi`
//!
//! Parses CLI arguments, loads configuration (file, then environment and
//! flags), opens the database and dispatches to the command handler.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, MessageCommand, SessionCommand};
use orbi_infra::config::{default_data_dir, load_config};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn,orbi=info",
        1 => "info,orbi=debug",
        _ => "trace",
    };
    orbi_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "orbi", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = default_data_dir();
    let mut config = load_config(&data_dir).await;
    cli.settings.apply(&mut config);

    let state = AppState::init(data_dir, config).await?;

    let result = match cli.command {
        Commands::Serve => cli::serve::serve(state, &cli.settings).await,
        Commands::Sweep => cli::sweep::sweep(&state, cli.json).await,
        Commands::Message { action } => match action {
            MessageCommand::Show { hash } => {
                cli::message::show_message(&state, &hash, cli.json).await
            }
        },
        Commands::Sessions { action } => match action {
            SessionCommand::List { user_id } => {
                cli::session::list_sessions(&state, user_id, cli.json).await
            }
        },
        Commands::Completions { .. } => Ok(()),
    };

    orbi_observe::shutdown_tracing();
    result
}

mod config;
mod credentials;
mod gateway;
mod messenger;
mod names;
mod output;
mod realtime;
mod session;

use std::path::PathBuf;

use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::gateway::GatewayClient;
use crate::messenger::Messenger;
use crate::session::Session;

#[derive(Parser)]
#[command(
    name = "threadline",
    version,
    about = "Chat in your group threads from the terminal",
    after_help = "Type a thread id to start, then type messages. Enter 'switch' to change threads.\nClose the input (Ctrl-D) to exit."
)]
struct Cli {
    #[arg(long, value_name = "PATH", help = "Path to the saved app state (defaults to ./appState.json)")]
    app_state: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();
    install_panic_hook();

    if let Err(error) = run().await {
        eprintln!("{}", output::fatal_line(&error.to_string()));
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = Config::load().with_app_state_path(cli.app_state);

    let credentials = CredentialStore::new(config.app_state_path.clone())
        .load()
        .map_err(|error| format!("Error reading app state: {error}"))?;

    let client = GatewayClient::login(&config, &credentials)
        .await
        .map_err(|error| format!("Error logging in: {error}"))?;
    println!("{}", output::logged_in_line());

    let events = match client.subscribe().await {
        Ok(events) => Some(events),
        Err(error) => {
            error!(%error, "error subscribing to messages; incoming messages will not be shown");
            None
        }
    };

    let mut session = Session::new(Some(client));
    session.prefetch_thread_names(config.thread_list_limit).await;
    info!(cached = session.names().len(), "session ready");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, events, &mut stdout).await?;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Panics in spawned tasks are otherwise only visible as a dropped channel.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic| {
        error!("unhandled panic: {panic}");
    }));
}

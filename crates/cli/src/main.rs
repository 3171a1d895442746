use clap::{Parser, Subcommand};
use ingest_protocol::event_models::ProgressEventRequest;
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "ingest-progress", version, about = "Progress event ingestion and aggregation")]
struct Cli {
    /// Project root holding `.ingest-progress/config.toml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP ingestion server on an in-memory store.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Replay a JSONL file of progress events and print the resulting runs.
    Replay {
        file: PathBuf,

        /// User id applied to events that carry none.
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Send a single progress event to the ingestion endpoint.
    Push {
        #[arg(long)]
        endpoint: Option<String>,

        #[arg(long)]
        run_id: Option<String>,

        #[arg(long)]
        file_no: Option<String>,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        step: String,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        processed: Option<u64>,

        #[arg(long)]
        total: Option<u64>,

        #[arg(long)]
        event_type: Option<String>,
    },

    /// Print the effective configuration.
    Config {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init_subscriber(logging::Verbosity::from_flags(cli.verbose, cli.quiet));

    match cli.command {
        Command::Serve { bind } => commands::serve(&cli.root, bind).await,
        Command::Replay { file, user, json } => {
            let report = commands::replay(&cli.root, &file, user.as_deref()).await?;
            commands::print_replay(&report, json)
        }
        Command::Push {
            endpoint,
            run_id,
            file_no,
            user,
            step,
            status,
            processed,
            total,
            event_type,
        } => {
            let request = ProgressEventRequest {
                run_id,
                file_no,
                current_step: Some(step),
                status,
                processed,
                total,
                event_type,
                ..ProgressEventRequest::default()
            };
            commands::push(&cli.root, endpoint, request, user.as_deref()).await
        }
        Command::Config { json } => commands::show_config(&cli.root, json),
    }
}

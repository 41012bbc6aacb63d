use crate::commands::{run_moderation, run_search, ModerationArgs, SearchArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use estate_hub::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "estate-hub",
    about = "Run the property listing service or moderate its data directory from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Apply an administrator decision directly to the data directory
    Moderate {
        #[command(subcommand)]
        command: ModerateCommand,
    },
    /// Run a relevance search against the active listings
    Search(SearchArgs),
}

#[derive(Subcommand, Debug)]
pub(crate) enum ModerateCommand {
    /// Approve a pending listing and publish it
    Approve(ModerationArgs),
    /// Reject a pending listing
    Reject {
        #[command(flatten)]
        args: ModerationArgs,
        /// Reason appended to the owner's notification
        #[arg(long)]
        reason: Option<String>,
    },
    /// Block a user
    Block(ModerationArgs),
    /// Unblock a user
    Unblock(ModerationArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Moderate { command } => run_moderation(command),
        Command::Search(args) => run_search(args),
    }
}

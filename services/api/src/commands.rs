use crate::cli::ModerateCommand;
use crate::infra::build_marketplace;
use chrono::{DateTime, Utc};
use clap::Args;
use estate_hub::access::Actor;
use estate_hub::config::AppConfig;
use estate_hub::error::AppError;
use estate_hub::moderation::{BlockOutcome, TransitionOutcome};
use estate_hub::ops::{Operation, OperationOutput};
use estate_hub::search::SearchOutcome;
use estate_hub::telemetry;

#[derive(Args, Debug)]
pub(crate) struct ModerationArgs {
    /// Listing id for approve/reject, user id for block/unblock
    pub(crate) id: u64,
    /// Administrator user id performing the action (must be listed in ESTATE_ADMIN_IDS)
    #[arg(long = "as")]
    pub(crate) admin: u64,
}

#[derive(Args, Debug)]
pub(crate) struct SearchArgs {
    /// Free-text query
    pub(crate) query: String,
    /// Client identifier recorded in the query log
    #[arg(long, default_value = "cli")]
    pub(crate) client: String,
    /// Print at most this many results
    #[arg(long, default_value_t = 10)]
    pub(crate) limit: usize,
}

pub(crate) fn run_moderation(command: ModerateCommand) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;
    let marketplace = build_marketplace(&config);

    let (admin, operation) = match command {
        ModerateCommand::Approve(args) => (args.admin, Operation::ModerationApprove { id: args.id }),
        ModerateCommand::Reject { args, reason } => (
            args.admin,
            Operation::ModerationReject {
                id: args.id,
                reason,
            },
        ),
        ModerateCommand::Block(args) => (args.admin, Operation::UserBlock { user_id: args.id }),
        ModerateCommand::Unblock(args) => {
            (args.admin, Operation::UserUnblock { user_id: args.id })
        }
    };

    match marketplace.execute(Actor::new(admin), operation)? {
        OperationOutput::Transition(outcome) => render_transition(&outcome),
        OperationOutput::Block(outcome) => render_block(&outcome),
        other => println!("{other:?}"),
    }
    Ok(())
}

pub(crate) fn run_search(args: SearchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;
    let marketplace = build_marketplace(&config);

    let operation = Operation::Search {
        query: args.query,
        client: args.client,
    };
    if let OperationOutput::Search(outcome) = marketplace.execute(Actor::new(0), operation)? {
        render_search(&outcome, args.limit);
    }
    Ok(())
}

fn render_transition(outcome: &TransitionOutcome) {
    let listing = outcome.listing();
    if !outcome.was_applied() {
        println!(
            "Listing #{} is already {}; nothing changed",
            listing.id, listing.status
        );
        return;
    }
    let decided_at = listing.approved_at.or(listing.rejected_at);
    println!(
        "Listing #{} \"{}\" is now {} ({})",
        listing.id,
        listing.title,
        listing.status,
        format_timestamp(decided_at)
    );
}

fn render_block(outcome: &BlockOutcome) {
    let state = if outcome.blocked { "blocked" } else { "unblocked" };
    if outcome.changed {
        println!("User {} {}", outcome.user_id, state);
    } else {
        println!("User {} was already {}", outcome.user_id, state);
    }
}

fn render_search(outcome: &SearchOutcome, limit: usize) {
    println!(
        "Search \"{}\": {} result(s)",
        outcome.query,
        outcome.results.len()
    );
    for scored in outcome.results.iter().take(limit) {
        let listing = &scored.listing;
        println!(
            "  {:>6.1}  #{:<5} {} | {} | {} | {:.0}",
            scored.score,
            listing.id,
            listing.title,
            listing.location,
            listing.property_type,
            listing.price
        );
    }

    if !outcome.suggestions.is_empty() {
        println!("Suggestions: {}", outcome.suggestions.join(", "));
    }

    let ranges: Vec<String> = outcome
        .facets
        .price_ranges
        .iter()
        .filter(|range| range.count > 0)
        .map(|range| format!("{}: {}", range.label, range.count))
        .collect();
    if !ranges.is_empty() {
        println!("Price ranges: {}", ranges.join(", "));
    }
}

fn format_timestamp(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "no timestamp".to_string())
}

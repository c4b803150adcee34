use std::{collections::HashMap, fs, process::ExitCode, sync::Arc};

use clap::Parser;
use rating_balancer::{
    api::{LookupError, RankClient},
    args::Args,
    config::{BalanceConfig, ConfigError},
    database::{memory::MemoryStore, StoreError},
    host::{roster::RosterHost, Teams},
    model::{
        balancer::TeamSnapshot,
        structures::{participant::ParticipantId, team::Team}
    },
    service::{BalanceService, ServiceError}
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read roster: {0}")]
    Roster(#[from] std::io::Error),

    #[error("Invalid roster: {0}")]
    RosterFormat(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Balance service crashed: {0}")]
    Runtime(#[from] tokio::task::JoinError)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&args.log_level))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "rating-balancer failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = args.config(BalanceConfig::from_env()?);
    let category = args.category();

    let teams: Teams = serde_json::from_str(&fs::read_to_string(&args.roster)?)?;
    let store = match &args.store {
        Some(path) => MemoryStore::load(path)?,
        None => MemoryStore::new()
    };
    let lookup = RankClient::new(&config.api_root, config.lookup_timeout)?;

    info!(
        red = teams.red.len(),
        blue = teams.blue.len(),
        %category,
        "Loaded roster"
    );

    let service = BalanceService::new(config, RosterHost::from_teams(teams.clone(), category), store, Arc::new(lookup));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let ratings = handle.resolve(teams.everyone(), category).await?;
    let snapshot = TeamSnapshot::from_teams(&teams);

    let result = if args.apply {
        handle.balance(snapshot, category).await.map(|outcome| {
            format!(
                "Balanced with {} switch(es) and {} move(s)",
                outcome.swaps.len(),
                outcome.moved.len()
            )
        })
    } else {
        handle.suggest(snapshot, category).await.map(|suggestion| match suggestion {
            Some(s) => format!(
                "Suggested switch: {} with {} (improves the gap by {:.1})",
                name_of(&teams, s.red),
                name_of(&teams, s.blue),
                s.improvement
            ),
            None => "No switch would improve the teams".to_string()
        })
    };

    handle.shutdown()?;
    let (host, store) = runner.await?;

    if let Some(path) = &args.store {
        store.save(path)?;
    }

    let summary = result?;
    print_teams(&host.teams, &ratings);
    println!("{}", summary);

    Ok(())
}

fn print_teams(teams: &Teams, ratings: &HashMap<ParticipantId, i32>) {
    for team in [Team::Red, Team::Blue] {
        let members = teams.members(team);
        let total: i64 = members.iter().filter_map(|p| ratings.get(&p.id)).map(|r| *r as i64).sum();
        let average = if members.is_empty() {
            0.0
        } else {
            total as f64 / members.len() as f64
        };

        println!("{} (average {:.0})", team, average);
        for participant in members {
            let rating = ratings
                .get(&participant.id)
                .map(|r| r.to_string())
                .unwrap_or_else(|| "?".to_string());
            println!("  {:<24} {}", participant.name, rating);
        }
    }
}

fn name_of(teams: &Teams, id: ParticipantId) -> String {
    teams
        .red
        .iter()
        .chain(teams.blue.iter())
        .find(|p| p.id == id)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| id.to_string())
}

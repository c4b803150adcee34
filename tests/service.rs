mod common;

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use common::init_test_env;
use rating_balancer::{
    config::BalanceConfig,
    database::{memory::MemoryStore, rating_key, KeyValueStore},
    host::{roster::RosterHost, ChatChannel},
    model::{
        balancer::TeamSnapshot,
        structures::{category::Category, participant::ParticipantId}
    },
    service::{BalanceService, ServiceError},
    session::events::{EventResponse, GameEvent},
    utils::test_utils::StubLookup
};

fn named_roster() -> RosterHost {
    let mut host = RosterHost::new();
    host.add_red(1, "alpha");
    host.add_red(2, "bravo");
    host.add_blue(3, "charlie");
    host.add_blue(4, "delta");
    host
}

fn stub() -> StubLookup {
    StubLookup::new()
        .with_rating("alpha", Category::Ca, 1400)
        .with_rating("bravo", Category::Ca, 1200)
        .with_rating("charlie", Category::Ca, 1000)
        .with_rating("delta", Category::Ca, 1000)
}

#[tokio::test]
async fn test_resolve_through_lookup() {
    init_test_env();
    let stub = stub();
    let service = BalanceService::new(BalanceConfig::default(), named_roster(), MemoryStore::new(), Arc::new(stub.clone()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let ratings = handle
        .resolve(vec![ParticipantId(1), ParticipantId(3)], Category::Ca)
        .await
        .unwrap();

    assert_eq!(ratings[&ParticipantId(1)], 1400);
    assert_eq!(ratings[&ParticipantId(3)], 1000);
    assert_eq!(stub.calls(), vec![vec!["alpha", "charlie"]]);

    handle.shutdown().unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_concurrent_requests_share_one_lookup() {
    init_test_env();
    let stub = stub();
    let service = BalanceService::new(BalanceConfig::default(), named_roster(), MemoryStore::new(), Arc::new(stub.clone()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let everyone = vec![ParticipantId(1), ParticipantId(2), ParticipantId(3), ParticipantId(4)];
    let (first, second) = tokio::join!(
        handle.resolve(everyone.clone(), Category::Ca),
        handle.resolve(everyone, Category::Ca)
    );

    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(stub.calls().len(), 1);

    handle.shutdown().unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_balance_applies_swaps_on_host() {
    init_test_env();
    let host = named_roster();
    let snapshot = TeamSnapshot::from_teams(&host.teams);
    let service = BalanceService::new(BalanceConfig::default(), host, MemoryStore::new(), Arc::new(stub()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let outcome = handle.balance(snapshot, Category::Ca).await.unwrap();

    assert_eq!(outcome.swaps.len(), 1);
    assert_abs_diff_eq!(outcome.red_average, 1100.0);
    assert_abs_diff_eq!(outcome.blue_average, 1200.0);

    handle.shutdown().unwrap();
    let (host, _) = runner.await.unwrap();
    assert_eq!(host.switches, vec![(ParticipantId(1), ParticipantId(3))]);
}

#[tokio::test]
async fn test_balance_rejects_odd_total() {
    init_test_env();
    let mut host = named_roster();
    host.add_blue(5, "echo");
    let snapshot = TeamSnapshot::from_teams(&host.teams);
    let service = BalanceService::new(BalanceConfig::default(), host, MemoryStore::new(), Arc::new(stub()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let result = handle.balance(snapshot, Category::Ca).await;
    assert!(matches!(result, Err(ServiceError::Balance(_))));

    handle.shutdown().unwrap();
    runner.await.unwrap();
}

#[tokio::test]
async fn test_suggest_with_failing_lookup() {
    init_test_env();
    let host = named_roster();
    let snapshot = TeamSnapshot::from_teams(&host.teams);
    let service = BalanceService::new(BalanceConfig::default(), host, MemoryStore::new(), Arc::new(StubLookup::failing()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    // Everyone falls back to the default rating, so nothing improves
    let suggestion = handle.suggest(snapshot, Category::Ca).await.unwrap();
    assert_eq!(suggestion, None);

    handle.shutdown().unwrap();
    let (host, _) = runner.await.unwrap();
    assert!(host.said("No ca rating found for alpha."));
}

#[tokio::test]
async fn test_events_and_commands() {
    init_test_env();
    let mut host = named_roster();
    host.add_blue(5, "echo");
    let mut kv = MemoryStore::new();
    for (id, rating) in [(1, 1400), (2, 1200), (3, 1000), (4, 1000), (5, 1100)] {
        kv.set(&rating_key(ParticipantId(id), Category::Ca), &rating.to_string());
    }
    let service = BalanceService::new(BalanceConfig::default(), host, kv, Arc::new(StubLookup::new()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    let response = handle
        .event(GameEvent::VoteCalled {
            caller: ParticipantId(1),
            vote: "shuffle".to_string(),
            args: String::new()
        })
        .await
        .unwrap();
    assert_eq!(response, EventResponse::Stop);

    handle.command(ParticipantId(1), ChatChannel::Chat, &["!teams"]).unwrap();
    handle.command(ParticipantId(1), ChatChannel::Chat, &["!setrating", "x"]).unwrap();
    handle.command(ParticipantId(1), ChatChannel::Chat, &["!elos"]).unwrap();

    handle.shutdown().unwrap();
    let (host, _) = runner.await.unwrap();

    assert!(host.said("Both teams should have the same number of players."));
    assert!(host.said("Usage: !setrating <id> <rating>"));
    assert!(host.said("blue: charlie (1000), delta (1000), echo (1100)"));
}

#[tokio::test]
async fn test_handle_after_shutdown() {
    init_test_env();
    let service = BalanceService::new(BalanceConfig::default(), named_roster(), MemoryStore::new(), Arc::new(stub()));
    let handle = service.handle();
    let runner = tokio::spawn(service.run());

    handle.shutdown().unwrap();
    runner.await.unwrap();

    let result = handle.resolve(vec![ParticipantId(1)], Category::Ca).await;
    assert!(matches!(result, Err(ServiceError::Closed)));
}

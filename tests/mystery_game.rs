#![allow(non_snake_case)]

mod common;

use common::{
    FakeContract,
    FakeMystery,
    player,
    stt,
};
use spectra::{
    errors::GameError,
    game::{
        GameClient,
        GameKind,
        Phase,
        RoundOutcome,
    },
    session::Color,
};
use std::time::Duration;

fn connected(contract: FakeContract) -> (FakeMystery, GameClient<FakeMystery>) {
    let gateway = FakeMystery::new(contract);
    let mut client = GameClient::new(gateway.clone());
    client.connect(gateway.clone(), player());
    (gateway, client)
}

#[tokio::test(start_paused = true)]
async fn start__waits_for_slow_activation() {
    // given
    let mut contract = FakeContract::new(player());
    contract.activate_after_reads = Some(3);
    let (gateway, mut client) = connected(contract);
    let started_at = tokio::time::Instant::now();

    // when
    client.start("0.01").await.unwrap();

    // then
    assert_eq!(gateway.state().read_calls, 3);
    assert!(started_at.elapsed() >= Duration::from_secs(6));
    assert_eq!(client.phase(), Phase::Active);
    assert_eq!(client.view().progress, Some((0, 3)));
}

#[tokio::test(start_paused = true)]
async fn start__gives_up_after_five_reads() {
    // given
    let mut contract = FakeContract::new(player());
    contract.activate_after_reads = None;
    let (gateway, mut client) = connected(contract);

    // when
    let err = client.start("0.01").await.unwrap_err();

    // then
    assert_eq!(err, GameError::StartNotConfirmed(GameKind::Mystery));
    assert_eq!(err.to_string(), "Failed to start mystery game. Please try again.");
    assert_eq!(gateway.state().read_calls, 5);
    assert_eq!(gateway.state().start_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn act__correct_color_advances_sequence() {
    // given
    let (_gateway, mut client) = connected(FakeContract::new(player()));
    client.start("0.01").await.unwrap();

    // when
    client.act(Color::Red).await.unwrap();

    // then
    let result = client.result().unwrap();
    assert_eq!(result.outcome, RoundOutcome::Won);
    assert_eq!(result.message, "Correct! You chose Red. Progress: 1/3");
    assert_eq!(client.view().progress, Some((1, 3)));
    assert_eq!(client.view().selection, Some(Color::Red));
}

#[tokio::test(start_paused = true)]
async fn act__wrong_color_reports_mysteries_solved() {
    // given
    let (_gateway, mut client) =
        connected(FakeContract::new(player()).with_active_session(stt("0.02"), 1));
    client.refresh().await;

    // when
    client.act(Color::Yellow).await.unwrap();

    // then
    let result = client.result().unwrap();
    assert_eq!(result.outcome, RoundOutcome::Lost);
    assert_eq!(result.message, "Wrong! Game Over! Mysteries Solved: 1");
    assert!(client.view().can_claim);
    assert_eq!(client.potential_reward(), alloy::primitives::U256::ZERO);
}

#[tokio::test(start_paused = true)]
async fn act__waits_settle_delay_before_reread() {
    // given
    let (gateway, mut client) =
        connected(FakeContract::new(player()).with_active_session(stt("0.01"), 0));
    client.refresh().await;
    let reads_before = gateway.state().read_calls;
    let before = tokio::time::Instant::now();

    // when
    client.act(Color::Red).await.unwrap();

    // then
    assert!(before.elapsed() >= client.timings().settle_delay);
    assert_eq!(gateway.state().read_calls, reads_before + 1);
}

use crate::gateway::StakedGame;
use alloy::primitives::{
    Address,
    U256,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::time::Duration;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

pub enum PollCommand {
    FetchNow,
    Shutdown,
}

/// One background read of a player's session.
#[derive(Clone, Debug)]
pub struct PollUpdate<S> {
    pub player: Address,
    pub session: Option<S>,
    pub potential_reward: U256,
}

pub struct PollHandle {
    cmd_tx: mpsc::UnboundedSender<PollCommand>,
    task: JoinHandle<Result<()>>,
}

impl PollHandle {
    pub fn fetch_now(&self) {
        let _ = self.cmd_tx.send(PollCommand::FetchNow);
    }

    pub fn shutdown(self) {
        let _ = self.cmd_tx.send(PollCommand::Shutdown);
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the refresh worker for one game view. Each tick awaits its reads
/// before the next tick is taken, and late ticks are skipped, so at most one
/// read is ever outstanding.
pub fn spawn_poller<G, E, F>(
    gateway: G,
    player: Address,
    interval: Duration,
    events: mpsc::UnboundedSender<E>,
    wrap: F,
) -> PollHandle
where
    G: StakedGame,
    E: Send + 'static,
    F: Fn(PollUpdate<G::Session>) -> E + Send + Sync + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(poll_worker(gateway, player, interval, cmd_rx, events, wrap));
    PollHandle { cmd_tx, task }
}

async fn poll_worker<G, E, F>(
    gateway: G,
    player: Address,
    interval: Duration,
    mut cmd_rx: mpsc::UnboundedReceiver<PollCommand>,
    events: mpsc::UnboundedSender<E>,
    wrap: F,
) -> Result<()>
where
    G: StakedGame,
    F: Fn(PollUpdate<G::Session>) -> E,
{
    async fn fetch<G, E, F>(
        gateway: &G,
        player: Address,
        events: &mpsc::UnboundedSender<E>,
        wrap: &F,
    ) -> Result<()>
    where
        G: StakedGame,
        F: Fn(PollUpdate<G::Session>) -> E,
    {
        let session = gateway.read_state(player).await;
        let potential_reward = match &session {
            Some(_) => gateway.read_potential_reward(player).await,
            None => U256::ZERO,
        };
        debug!(game = ?G::KIND, %player, found = session.is_some(), "polled session");
        events
            .send(wrap(PollUpdate {
                player,
                session,
                potential_reward,
            }))
            .map_err(|_| eyre!("poll receiver dropped"))
    }

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = fetch(&gateway, player, &events, &wrap).await {
                    warn!(?err, "stopping poll worker");
                    break;
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(PollCommand::FetchNow) => {
                        if let Err(err) = fetch(&gateway, player, &events, &wrap).await {
                            warn!(?err, "stopping poll worker");
                            break;
                        }
                        ticker.reset();
                    }
                    Some(PollCommand::Shutdown) | None => break,
                }
            }
        }
    }
    Ok(())
}

use crate::{
    errors::GameError,
    gateway::StakedGame,
    session::{
        Color,
        GameSession,
        parse_stake,
    },
};
use alloy::primitives::{
    Address,
    U256,
};
use chrono::{
    DateTime,
    Utc,
};
use std::time::Duration;
use tokio::time;
use tracing::{
    info,
    warn,
};

pub const CLAIM_SUCCESS_NOTICE: &str = "Reward claimed successfully!";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameKind {
    Survival,
    Mystery,
}

impl GameKind {
    pub const ALL: [GameKind; 2] = [GameKind::Survival, GameKind::Mystery];

    pub fn name(self) -> &'static str {
        match self {
            GameKind::Survival => "Spectrum Survival",
            GameKind::Mystery => "Chromatic Mystery",
        }
    }

    pub fn tagline(self) -> &'static str {
        match self {
            GameKind::Survival => "Dodge the Spectrum",
            GameKind::Mystery => "Unravel the Color Code",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GameKind::Survival => {
                "Test your luck against the blockchain. Choose the right color and multiply your rewards by 1.2x each round. One wrong choice and it's game over!"
            }
            GameKind::Mystery => {
                "Solve mysterious color patterns by making strategic selections. Each mystery has a hidden sequence. Crack the code and earn rewards for each correct guess!"
            }
        }
    }

    pub fn difficulty(self) -> &'static str {
        match self {
            GameKind::Survival => "Medium",
            GameKind::Mystery => "Hard",
        }
    }

    pub fn risk(self) -> &'static str {
        match self {
            GameKind::Survival => "High",
            GameKind::Mystery => "Medium",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Idle,
    Starting,
    Active,
    RoundWon,
    RoundLost,
    Claimable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction<S> {
    Starting,
    Acting(S),
    Claiming,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    Won,
    Lost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    pub outcome: RoundOutcome,
    pub message: String,
}

#[derive(Clone, Copy, Debug)]
pub struct GameTimings {
    /// Wait between a mined action and the reread that settles it.
    pub settle_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for GameTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Everything the board needs to render one game, detached from the
/// gateway type.
#[derive(Clone, Debug)]
pub struct GameView {
    pub kind: GameKind,
    pub phase: Phase,
    pub player: Option<Address>,
    pub stake: Option<U256>,
    pub score: Option<u64>,
    pub active: bool,
    pub last_round_at: Option<DateTime<Utc>>,
    pub progress: Option<(u8, usize)>,
    pub potential_reward: U256,
    pub pending: Option<PendingAction<Color>>,
    pub selection: Option<Color>,
    pub result: Option<RoundResult>,
    pub notice: Option<String>,
    pub error: Option<String>,
    pub can_claim: bool,
}

/// Client-side state for one staked game.
///
/// The cached session is only ever replaced by a gateway read; the client
/// never edits score, stake or the active flag itself.
pub struct GameClient<G: StakedGame> {
    gateway: G,
    timings: GameTimings,
    player: Option<Address>,
    session: Option<G::Session>,
    potential_reward: U256,
    pending: Option<PendingAction<G::Selection>>,
    selection: Option<G::Selection>,
    result: Option<RoundResult>,
    notice: Option<String>,
    error: Option<GameError>,
}

impl<G: StakedGame> GameClient<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_timings(gateway, GameTimings::default())
    }

    pub fn with_timings(gateway: G, timings: GameTimings) -> Self {
        Self {
            gateway,
            timings,
            player: None,
            session: None,
            potential_reward: U256::ZERO,
            pending: None,
            selection: None,
            result: None,
            notice: None,
            error: None,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn timings(&self) -> GameTimings {
        self.timings
    }

    pub fn player(&self) -> Option<Address> {
        self.player
    }

    pub fn session(&self) -> Option<&G::Session> {
        self.session.as_ref()
    }

    pub fn potential_reward(&self) -> U256 {
        self.potential_reward
    }

    pub fn selection(&self) -> Option<G::Selection> {
        self.selection
    }

    pub fn result(&self) -> Option<&RoundResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&GameError> {
        self.error.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Binds the client to a new gateway and player. Cached state from a
    /// previous account is dropped.
    pub fn connect(&mut self, gateway: G, player: Address) {
        self.gateway = gateway;
        self.player = Some(player);
        self.clear_board();
        self.error = None;
    }

    pub fn disconnect(&mut self) {
        self.player = None;
        self.clear_board();
        self.error = None;
    }

    pub fn phase(&self) -> Phase {
        if self.player.is_none() {
            return Phase::Disconnected;
        }
        match (&self.pending, &self.result) {
            (Some(PendingAction::Starting), _) => Phase::Starting,
            (_, Some(result)) if result.outcome == RoundOutcome::Won => Phase::RoundWon,
            (_, Some(_)) => Phase::RoundLost,
            _ => match &self.session {
                Some(s) if s.active() => Phase::Active,
                Some(s) if s.score() > 0 => Phase::Claimable,
                _ => Phase::Idle,
            },
        }
    }

    pub fn can_claim(&self) -> bool {
        self.player.is_some()
            && (self.result.is_some() || self.session.as_ref().is_some_and(|s| s.score() > 0))
    }

    pub fn can_act(&self) -> bool {
        self.phase() == Phase::Active && self.pending.is_none()
    }

    /// Stakes `stake` (decimal STT) and waits until the contract reports an
    /// active session, within the game's confirmation budget.
    pub async fn start(&mut self, stake: &str) -> Result<(), GameError> {
        self.begin(PendingAction::Starting);
        self.result = None;
        let outcome = self.run_start(stake).await;
        self.finish(outcome)
    }

    async fn run_start(&mut self, stake: &str) -> Result<(), GameError> {
        let player = self.player.ok_or(GameError::NotConnected)?;
        let wei = parse_stake(stake)?;
        self.gateway.start(wei).await?;

        let confirmation = G::START_CONFIRMATION;
        for attempt in 1..=confirmation.attempts {
            time::sleep(confirmation.interval).await;
            let Some(session) = self.gateway.read_state(player).await else {
                continue;
            };
            let active = session.active();
            self.session = Some(session);
            if active {
                info!(game = ?G::KIND, %player, attempt, "session started");
                self.potential_reward = self.gateway.read_potential_reward(player).await;
                return Ok(());
            }
        }
        Err(GameError::StartNotConfirmed(G::KIND))
    }

    /// Submits one color choice, waits for the chain to settle and reports
    /// the round from a fresh read.
    pub async fn act(&mut self, selection: G::Selection) -> Result<(), GameError> {
        if !self.can_act() {
            let err = if self.result.is_some() {
                GameError::Other("Continue to the next round before choosing again.".to_string())
            } else {
                GameError::NotActive
            };
            self.error = Some(err.clone());
            return Err(err);
        }
        self.begin(PendingAction::Acting(selection));
        self.selection = Some(selection);
        let outcome = self.run_act(selection).await;
        if outcome.is_err() {
            self.selection = None;
        }
        self.finish(outcome)
    }

    async fn run_act(&mut self, selection: G::Selection) -> Result<(), GameError> {
        let player = self.player.ok_or(GameError::NotConnected)?;
        self.gateway.act(selection).await?;
        time::sleep(self.timings.settle_delay).await;

        let current = self.gateway.read_state(player).await;
        let outcome = G::round_outcome(self.session.as_ref(), current.as_ref());
        let reward = match outcome {
            RoundOutcome::Won => self.gateway.read_potential_reward(player).await,
            RoundOutcome::Lost => U256::ZERO,
        };
        let message = G::describe_round(outcome, selection, current.as_ref(), reward);
        info!(game = ?G::KIND, ?outcome, %message, "round settled");

        self.potential_reward = reward;
        self.session = current;
        self.result = Some(RoundResult { outcome, message });
        Ok(())
    }

    /// Leaves a won round's banner and re-enables the palette.
    pub fn continue_round(&mut self) {
        if self
            .result
            .as_ref()
            .is_some_and(|r| r.outcome == RoundOutcome::Won)
        {
            self.result = None;
            self.selection = None;
        }
    }

    pub async fn claim(&mut self) -> Result<(), GameError> {
        if !self.can_claim() {
            let err = if self.player.is_none() {
                GameError::NotConnected
            } else {
                GameError::NothingToClaim
            };
            self.error = Some(err.clone());
            return Err(err);
        }
        self.begin(PendingAction::Claiming);
        let outcome = self.gateway.claim().await.map(|tx_hash| {
            info!(game = ?G::KIND, %tx_hash, "reward claimed");
        });
        if outcome.is_ok() {
            self.clear_board();
            self.notice = Some(CLAIM_SUCCESS_NOTICE.to_string());
        }
        self.finish(outcome)
    }

    /// Clears the local board; the chain is not touched.
    pub fn new_game(&mut self) {
        self.clear_board();
        self.error = None;
    }

    /// Reads state and reward immediately, outside the poll schedule.
    pub async fn refresh(&mut self) {
        let Some(player) = self.player else {
            return;
        };
        let session = self.gateway.read_state(player).await;
        let reward = self.gateway.read_potential_reward(player).await;
        self.apply_poll(player, session, reward);
    }

    /// Applies a background read. Advisory only: it never settles a round,
    /// and a failed read keeps the previous snapshot on screen.
    pub fn apply_poll(&mut self, player: Address, session: Option<G::Session>, reward: U256) {
        if self.player != Some(player) {
            return;
        }
        if let Some(session) = session {
            self.session = Some(session);
            self.potential_reward = reward;
        }
    }

    pub fn view(&self) -> GameView {
        let session = self.session.as_ref();
        GameView {
            kind: G::KIND,
            phase: self.phase(),
            player: self.player,
            stake: session.map(|s| s.stake()),
            score: session.map(|s| s.score()),
            active: session.is_some_and(|s| s.active()),
            last_round_at: session.and_then(|s| s.last_round_at()),
            progress: session.and_then(|s| s.progress()),
            potential_reward: self.potential_reward,
            pending: self.pending.map(|p| match p {
                PendingAction::Starting => PendingAction::Starting,
                PendingAction::Acting(sel) => PendingAction::Acting(sel.into()),
                PendingAction::Claiming => PendingAction::Claiming,
            }),
            selection: self.selection.map(Into::into),
            result: self.result.clone(),
            notice: self.notice.clone(),
            error: self.error.as_ref().map(ToString::to_string),
            can_claim: self.can_claim(),
        }
    }

    fn begin(&mut self, action: PendingAction<G::Selection>) {
        self.pending = Some(action);
        self.error = None;
        self.notice = None;
    }

    fn finish(&mut self, outcome: Result<(), GameError>) -> Result<(), GameError> {
        self.pending = None;
        if let Err(err) = &outcome {
            warn!(game = ?G::KIND, %err, "action failed");
            self.error = Some(err.clone());
        }
        outcome
    }

    fn clear_board(&mut self) {
        self.session = None;
        self.potential_reward = U256::ZERO;
        self.pending = None;
        self.selection = None;
        self.result = None;
        self.notice = None;
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn game_kind__lobby_cards_differ_by_game() {
        assert_eq!(GameKind::Survival.name(), "Spectrum Survival");
        assert_eq!(GameKind::Mystery.tagline(), "Unravel the Color Code");
        assert_eq!(GameKind::Survival.risk(), "High");
        assert_eq!(GameKind::Mystery.difficulty(), "Hard");
    }

    #[test]
    fn game_timings__default_to_two_second_settle_and_five_second_poll() {
        // when
        let timings = GameTimings::default();

        // then
        assert_eq!(timings.settle_delay, Duration::from_secs(2));
        assert_eq!(timings.poll_interval, Duration::from_secs(5));
    }
}

#![allow(dead_code)]

use alloy::primitives::{
    Address,
    TxHash,
    U256,
};
use spectra::{
    chain::{
        ChainDescriptor,
        WalletTransport,
    },
    errors::GameError,
    game::{
        GameKind,
        RoundOutcome,
    },
    gateway::{
        MysteryGateway,
        StakedGame,
        StartConfirmation,
        SurvivalGateway,
    },
    session::{
        Color,
        MysterySession,
        SurvivalSession,
    },
    wallet::{
        ProviderError,
        UNRECOGNIZED_CHAIN,
        WalletProvider,
    },
};
use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

pub fn player() -> Address {
    Address::repeat_byte(0xa1)
}

pub fn stt(amount: &str) -> U256 {
    spectra::session::parse_stake(amount).unwrap()
}

/// Scripted contract shared by both fake gateways.
#[derive(Debug)]
pub struct FakeContract {
    pub player: Address,
    pub stake: U256,
    pub score: u64,
    pub active: bool,
    pub target: Color,
    pub sequence: Vec<Color>,
    pub progress: u8,
    pub last_round_timestamp: u64,
    pub reward_per_point: U256,

    pub start_calls: u32,
    pub act_calls: u32,
    pub claim_calls: u32,
    pub read_calls: u32,
    pub reward_calls: u32,

    pub start_error: Option<GameError>,
    pub act_error: Option<GameError>,
    pub claim_error: Option<GameError>,
    pub fail_reads: bool,

    /// Reads that must happen after a start before the session shows active.
    /// `None` means the session never activates.
    pub activate_after_reads: Option<u32>,
    pending_activation: Option<u32>,

    pub read_delay: Duration,
    pub in_flight: u32,
    pub max_in_flight: u32,
}

impl FakeContract {
    pub fn new(player: Address) -> Self {
        Self {
            player,
            stake: U256::ZERO,
            score: 0,
            active: false,
            target: Color::Blue,
            sequence: vec![Color::Red, Color::Green, Color::Violet],
            progress: 0,
            last_round_timestamp: 0,
            reward_per_point: stt("0.01"),
            start_calls: 0,
            act_calls: 0,
            claim_calls: 0,
            read_calls: 0,
            reward_calls: 0,
            start_error: None,
            act_error: None,
            claim_error: None,
            fail_reads: false,
            activate_after_reads: Some(0),
            pending_activation: None,
            read_delay: Duration::ZERO,
            in_flight: 0,
            max_in_flight: 0,
        }
    }

    /// Puts the contract straight into an active session.
    pub fn with_active_session(mut self, stake: U256, score: u64) -> Self {
        self.stake = stake;
        self.score = score;
        self.active = true;
        self.progress = u8::try_from(score).unwrap_or(u8::MAX);
        self.last_round_timestamp = 1_700_000_000;
        self
    }

    fn start(&mut self, stake: U256) -> Result<TxHash, GameError> {
        self.start_calls += 1;
        if let Some(err) = self.start_error.clone() {
            return Err(err);
        }
        self.stake = stake;
        self.score = 0;
        self.progress = 0;
        self.active = false;
        self.pending_activation = self.activate_after_reads;
        if self.pending_activation == Some(0) {
            self.active = true;
            self.pending_activation = None;
        }
        Ok(TxHash::repeat_byte(0x01))
    }

    fn act(&mut self, correct: bool) -> Result<TxHash, GameError> {
        self.act_calls += 1;
        if let Some(err) = self.act_error.clone() {
            return Err(err);
        }
        if !self.active {
            return Err(GameError::NotActive);
        }
        self.last_round_timestamp += 30;
        if correct {
            self.score += 1;
            self.progress += 1;
        } else {
            self.active = false;
        }
        Ok(TxHash::repeat_byte(0x02))
    }

    fn claim(&mut self) -> Result<TxHash, GameError> {
        self.claim_calls += 1;
        if let Some(err) = self.claim_error.clone() {
            return Err(err);
        }
        self.stake = U256::ZERO;
        self.score = 0;
        self.progress = 0;
        self.active = false;
        Ok(TxHash::repeat_byte(0x03))
    }

    /// Counts a read and applies any delayed activation. Returns `false` when
    /// reads are scripted to fail.
    fn observe_read(&mut self) -> bool {
        self.read_calls += 1;
        if let Some(remaining) = self.pending_activation {
            if remaining <= 1 {
                self.active = true;
                self.pending_activation = None;
            } else {
                self.pending_activation = Some(remaining - 1);
            }
        }
        !self.fail_reads
    }

    fn reward(&mut self) -> U256 {
        self.reward_calls += 1;
        if self.active || self.score > 0 {
            self.stake + self.reward_per_point * U256::from(self.score)
        } else {
            U256::ZERO
        }
    }

    fn survival_session(&self) -> SurvivalSession {
        SurvivalSession {
            player: self.player,
            stake: self.stake,
            score: self.score,
            active: self.active,
            last_round_timestamp: self.last_round_timestamp,
        }
    }

    fn mystery_session(&self) -> MysterySession {
        MysterySession {
            player: self.player,
            stake: self.stake,
            score: self.score,
            active: self.active,
            current_mystery_index: self.progress,
            last_round_timestamp: self.last_round_timestamp,
            mystery_sequence: self.sequence.clone(),
            sequence_progress: self.progress,
        }
    }

    fn mystery_target(&self) -> Option<Color> {
        self.sequence.get(usize::from(self.progress)).copied()
    }
}

pub type SharedContract = Arc<Mutex<FakeContract>>;

pub fn shared(contract: FakeContract) -> SharedContract {
    Arc::new(Mutex::new(contract))
}

async fn timed_read<T>(contract: &SharedContract, read: impl FnOnce(&FakeContract) -> T) -> Option<T> {
    let delay = {
        let mut c = contract.lock().unwrap();
        c.in_flight += 1;
        c.max_in_flight = c.max_in_flight.max(c.in_flight);
        c.read_delay
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    let mut c = contract.lock().unwrap();
    c.in_flight -= 1;
    c.observe_read().then(|| read(&c))
}

#[derive(Clone)]
pub struct FakeSurvival {
    pub contract: SharedContract,
}

impl FakeSurvival {
    pub fn new(contract: FakeContract) -> Self {
        Self {
            contract: shared(contract),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeContract> {
        self.contract.lock().unwrap()
    }
}

impl StakedGame for FakeSurvival {
    type Selection = Color;
    type Session = SurvivalSession;

    const KIND: GameKind = GameKind::Survival;
    const START_CONFIRMATION: StartConfirmation = SurvivalGateway::START_CONFIRMATION;

    async fn start(&self, stake: U256) -> Result<TxHash, GameError> {
        self.state().start(stake)
    }

    async fn act(&self, selection: Color) -> Result<TxHash, GameError> {
        let mut c = self.state();
        let correct = selection == c.target;
        c.act(correct)
    }

    async fn claim(&self) -> Result<TxHash, GameError> {
        self.state().claim()
    }

    async fn read_state(&self, _player: Address) -> Option<SurvivalSession> {
        timed_read(&self.contract, FakeContract::survival_session).await
    }

    async fn read_potential_reward(&self, _player: Address) -> U256 {
        self.state().reward()
    }

    fn describe_round(
        outcome: RoundOutcome,
        selection: Color,
        current: Option<&SurvivalSession>,
        potential_reward: U256,
    ) -> String {
        SurvivalGateway::describe_round(outcome, selection, current, potential_reward)
    }
}

#[derive(Clone)]
pub struct FakeMystery {
    pub contract: SharedContract,
}

impl FakeMystery {
    pub fn new(contract: FakeContract) -> Self {
        Self {
            contract: shared(contract),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeContract> {
        self.contract.lock().unwrap()
    }
}

impl StakedGame for FakeMystery {
    type Selection = Color;
    type Session = MysterySession;

    const KIND: GameKind = GameKind::Mystery;
    const START_CONFIRMATION: StartConfirmation = MysteryGateway::START_CONFIRMATION;

    async fn start(&self, stake: U256) -> Result<TxHash, GameError> {
        self.state().start(stake)
    }

    async fn act(&self, selection: Color) -> Result<TxHash, GameError> {
        let mut c = self.state();
        let correct = c.mystery_target() == Some(selection);
        c.act(correct)
    }

    async fn claim(&self) -> Result<TxHash, GameError> {
        self.state().claim()
    }

    async fn read_state(&self, _player: Address) -> Option<MysterySession> {
        timed_read(&self.contract, FakeContract::mystery_session).await
    }

    async fn read_potential_reward(&self, _player: Address) -> U256 {
        self.state().reward()
    }

    fn describe_round(
        outcome: RoundOutcome,
        selection: Color,
        current: Option<&MysterySession>,
        potential_reward: U256,
    ) -> String {
        MysteryGateway::describe_round(outcome, selection, current, potential_reward)
    }
}

#[derive(Debug)]
pub struct WalletState {
    pub accounts: Vec<Address>,
    pub chain_id: u64,
    pub known_chains: Vec<u64>,
    pub request_error: Option<ProviderError>,
    pub accounts_error: Option<ProviderError>,
    pub switch_error: Option<ProviderError>,
    pub add_error: Option<ProviderError>,
    pub calls: Vec<&'static str>,
}

/// In-memory EIP-1193 wallet that records every request it receives.
#[derive(Clone)]
pub struct FakeWallet {
    pub inner: Arc<Mutex<WalletState>>,
}

impl FakeWallet {
    pub fn on_chain(chain_id: u64, accounts: Vec<Address>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WalletState {
                accounts,
                chain_id,
                known_chains: vec![chain_id],
                request_error: None,
                accounts_error: None,
                switch_error: None,
                add_error: None,
                calls: Vec::new(),
            })),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, WalletState> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }
}

impl WalletProvider for FakeWallet {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let mut w = self.state();
        w.calls.push("eth_accounts");
        match w.accounts_error.clone() {
            Some(err) => Err(err),
            None => Ok(w.accounts.clone()),
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        let mut w = self.state();
        w.calls.push("eth_requestAccounts");
        match w.request_error.clone() {
            Some(err) => Err(err),
            None => Ok(w.accounts.clone()),
        }
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let mut w = self.state();
        w.calls.push("eth_chainId");
        Ok(w.chain_id)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let mut w = self.state();
        w.calls.push("wallet_switchEthereumChain");
        if let Some(err) = w.switch_error.clone() {
            return Err(err);
        }
        if !w.known_chains.contains(&chain_id) {
            return Err(ProviderError::new(
                UNRECOGNIZED_CHAIN,
                "Unrecognized chain ID",
            ));
        }
        w.chain_id = chain_id;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        let mut w = self.state();
        w.calls.push("wallet_addEthereumChain");
        if let Some(err) = w.add_error.clone() {
            return Err(err);
        }
        w.known_chains.push(chain.id);
        Ok(())
    }

    fn transport(&self) -> WalletTransport {
        WalletTransport::Unavailable
    }
}

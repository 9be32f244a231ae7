use crate::{
    MYSTERY_CONTRACT_ADDRESS,
    SURVIVAL_CONTRACT_ADDRESS,
    chain::{
        ReadClient,
        WriteClient,
    },
    errors::{
        GameError,
        Operation,
    },
    game::{
        GameKind,
        RoundOutcome,
    },
    mystery_types::ChromaticMystery::{
        self,
        ChromaticMysteryInstance,
    },
    session::{
        Color,
        GameSession,
        MysterySession,
        SurvivalSession,
        format_stt,
    },
    survival_types::SpectraGame::{
        self,
        SpectraGameInstance,
    },
};
use alloy::{
    network::{
        Ethereum,
        ReceiptResponse,
    },
    primitives::{
        Address,
        TxHash,
        U256,
    },
    providers::{
        DynProvider,
        PendingTransactionBuilder,
    },
};
use std::{
    fmt::{
        Debug,
        Display,
    },
    future::Future,
    time::Duration,
};
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// How many reads to spend confirming that a freshly started session is
/// active, and how long to wait before each of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartConfirmation {
    pub attempts: u32,
    pub interval: Duration,
}

/// A staked, session-based game reached through a contract.
///
/// Writes wait for a mined receipt bounded by [`RECEIPT_TIMEOUT`] and map
/// every failure to a [`GameError`]. Reads never fail: they degrade to
/// `None` or zero so background refreshes cannot break the view.
pub trait StakedGame: Clone + Send + Sync + 'static {
    type Selection: Copy + Debug + PartialEq + Send + Sync + 'static + From<Color> + Into<Color>;
    type Session: GameSession;

    const KIND: GameKind;
    const START_CONFIRMATION: StartConfirmation;

    fn start(&self, stake: U256) -> impl Future<Output = Result<TxHash, GameError>> + Send;

    fn act(
        &self,
        selection: Self::Selection,
    ) -> impl Future<Output = Result<TxHash, GameError>> + Send;

    fn claim(&self) -> impl Future<Output = Result<TxHash, GameError>> + Send;

    fn read_state(
        &self,
        player: Address,
    ) -> impl Future<Output = Option<Self::Session>> + Send;

    fn read_potential_reward(&self, player: Address) -> impl Future<Output = U256> + Send;

    /// A round is lost whenever the session is no longer active after the
    /// action settles, whatever deactivated it.
    fn round_outcome(
        _previous: Option<&Self::Session>,
        current: Option<&Self::Session>,
    ) -> RoundOutcome {
        if current.is_some_and(|s| s.active()) {
            RoundOutcome::Won
        } else {
            RoundOutcome::Lost
        }
    }

    fn describe_round(
        outcome: RoundOutcome,
        selection: Self::Selection,
        current: Option<&Self::Session>,
        potential_reward: U256,
    ) -> String;
}

fn write_failure(op: Operation, err: impl Display) -> GameError {
    let failure = err.to_string();
    warn!(?op, %failure, "transaction failed");
    GameError::classify(op, &failure)
}

/// Waits for `receipt` for at most `limit`. Elapsing maps to
/// [`GameError::TransactionTimeout`]; the transaction itself is left alone.
pub async fn await_receipt<R, E, F>(op: Operation, limit: Duration, receipt: F) -> Result<R, GameError>
where
    E: Display,
    F: Future<Output = Result<R, E>>,
{
    match time::timeout(limit, receipt).await {
        Ok(Ok(receipt)) => Ok(receipt),
        Ok(Err(err)) => Err(write_failure(op, err)),
        Err(_) => {
            warn!(?op, timeout_secs = limit.as_secs(), "no receipt before timeout");
            Err(GameError::TransactionTimeout)
        }
    }
}

async fn confirm(
    op: Operation,
    pending: PendingTransactionBuilder<Ethereum>,
) -> Result<TxHash, GameError> {
    let tx_hash = *pending.tx_hash();
    info!(?op, %tx_hash, "transaction submitted");
    let receipt = await_receipt(op, RECEIPT_TIMEOUT, pending.get_receipt()).await?;
    settle_receipt(op, tx_hash, &receipt)
}

/// A mined receipt only counts as success when its status flag is set.
fn settle_receipt<R: ReceiptResponse>(
    op: Operation,
    tx_hash: TxHash,
    receipt: &R,
) -> Result<TxHash, GameError> {
    if !receipt.status() {
        warn!(?op, %tx_hash, "transaction reverted");
        return Err(GameError::TransactionReverted(op));
    }
    info!(
        ?op,
        %tx_hash,
        block = receipt.block_number().unwrap_or_default(),
        gas_used = receipt.gas_used(),
        "transaction confirmed"
    );
    Ok(tx_hash)
}

#[derive(Clone)]
struct Signer<C> {
    contract: C,
    account: Address,
}

#[derive(Clone)]
pub struct SurvivalGateway {
    reader: SpectraGameInstance<DynProvider>,
    writer: Option<Signer<SpectraGameInstance<DynProvider>>>,
}

impl SurvivalGateway {
    pub fn new(read: &ReadClient, write: Option<&WriteClient>) -> Self {
        Self::at(SURVIVAL_CONTRACT_ADDRESS, read, write)
    }

    pub fn at(address: Address, read: &ReadClient, write: Option<&WriteClient>) -> Self {
        Self {
            reader: SpectraGame::new(address, read.provider().clone()),
            writer: write.map(|w| Signer {
                contract: SpectraGame::new(address, w.provider().clone()),
                account: w.account(),
            }),
        }
    }

    fn signer(&self) -> Result<&Signer<SpectraGameInstance<DynProvider>>, GameError> {
        self.writer.as_ref().ok_or(GameError::NotConnected)
    }
}

impl StakedGame for SurvivalGateway {
    type Selection = Color;
    type Session = SurvivalSession;

    const KIND: GameKind = GameKind::Survival;
    const START_CONFIRMATION: StartConfirmation = StartConfirmation {
        attempts: 1,
        interval: Duration::from_secs(2),
    };

    async fn start(&self, stake: U256) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let call = signer
            .contract
            .startGame()
            .value(stake)
            .from(signer.account);
        match call.estimate_gas().await {
            Ok(gas) => debug!(gas, "startGame gas estimate"),
            Err(err) => warn!(%err, "startGame gas estimation failed; submitting anyway"),
        }
        let pending = call
            .send()
            .await
            .map_err(|err| write_failure(Operation::Start, err))?;
        confirm(Operation::Start, pending).await
    }

    async fn act(&self, selection: Color) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let pending = signer
            .contract
            .chooseColor(selection.id())
            .from(signer.account)
            .send()
            .await
            .map_err(|err| write_failure(Operation::Act, err))?;
        confirm(Operation::Act, pending).await
    }

    async fn claim(&self) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let pending = signer
            .contract
            .claimReward()
            .from(signer.account)
            .send()
            .await
            .map_err(|err| write_failure(Operation::Claim, err))?;
        confirm(Operation::Claim, pending).await
    }

    async fn read_state(&self, player: Address) -> Option<SurvivalSession> {
        match self.reader.getGame(player).call().await {
            Ok(game) => Some(game.into()),
            Err(err) => {
                warn!(%player, %err, "getGame failed");
                None
            }
        }
    }

    async fn read_potential_reward(&self, player: Address) -> U256 {
        self.reader
            .getPotentialReward(player)
            .call()
            .await
            .unwrap_or_else(|err| {
                warn!(%player, %err, "getPotentialReward failed");
                U256::ZERO
            })
    }

    fn describe_round(
        outcome: RoundOutcome,
        selection: Color,
        current: Option<&SurvivalSession>,
        potential_reward: U256,
    ) -> String {
        let score = current.map(|s| s.score).unwrap_or_default();
        match outcome {
            RoundOutcome::Won => format!(
                "Correct! You chose {}. Score: {score}. Potential Reward: {} STT",
                selection.name(),
                format_stt(potential_reward)
            ),
            RoundOutcome::Lost => format!("Wrong! Game Over! Final Score: {score}"),
        }
    }
}

#[derive(Clone)]
pub struct MysteryGateway {
    reader: ChromaticMysteryInstance<DynProvider>,
    writer: Option<Signer<ChromaticMysteryInstance<DynProvider>>>,
}

impl MysteryGateway {
    pub fn new(read: &ReadClient, write: Option<&WriteClient>) -> Self {
        Self::at(MYSTERY_CONTRACT_ADDRESS, read, write)
    }

    pub fn at(address: Address, read: &ReadClient, write: Option<&WriteClient>) -> Self {
        Self {
            reader: ChromaticMystery::new(address, read.provider().clone()),
            writer: write.map(|w| Signer {
                contract: ChromaticMystery::new(address, w.provider().clone()),
                account: w.account(),
            }),
        }
    }

    fn signer(&self) -> Result<&Signer<ChromaticMysteryInstance<DynProvider>>, GameError> {
        self.writer.as_ref().ok_or(GameError::NotConnected)
    }
}

impl StakedGame for MysteryGateway {
    type Selection = Color;
    type Session = MysterySession;

    const KIND: GameKind = GameKind::Mystery;
    const START_CONFIRMATION: StartConfirmation = StartConfirmation {
        attempts: 5,
        interval: Duration::from_secs(2),
    };

    async fn start(&self, stake: U256) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let call = signer
            .contract
            .startMystery()
            .value(stake)
            .from(signer.account);
        match call.estimate_gas().await {
            Ok(gas) => debug!(gas, "startMystery gas estimate"),
            Err(err) => warn!(%err, "startMystery gas estimation failed; submitting anyway"),
        }
        let pending = call
            .send()
            .await
            .map_err(|err| write_failure(Operation::Start, err))?;
        confirm(Operation::Start, pending).await
    }

    async fn act(&self, selection: Color) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let pending = signer
            .contract
            .guessMysteryColor(selection.id())
            .from(signer.account)
            .send()
            .await
            .map_err(|err| write_failure(Operation::Act, err))?;
        confirm(Operation::Act, pending).await
    }

    async fn claim(&self) -> Result<TxHash, GameError> {
        let signer = self.signer()?;
        let pending = signer
            .contract
            .claimMysteryReward()
            .from(signer.account)
            .send()
            .await
            .map_err(|err| write_failure(Operation::Claim, err))?;
        confirm(Operation::Claim, pending).await
    }

    async fn read_state(&self, player: Address) -> Option<MysterySession> {
        match self.reader.getMystery(player).call().await {
            Ok(raw) => Some(raw.into()),
            Err(err) => {
                warn!(%player, %err, "getMystery failed");
                None
            }
        }
    }

    async fn read_potential_reward(&self, player: Address) -> U256 {
        self.reader
            .getPotentialReward(player)
            .call()
            .await
            .unwrap_or_else(|err| {
                warn!(%player, %err, "getPotentialReward failed");
                U256::ZERO
            })
    }

    fn describe_round(
        outcome: RoundOutcome,
        selection: Color,
        current: Option<&MysterySession>,
        _potential_reward: U256,
    ) -> String {
        match (outcome, current) {
            (RoundOutcome::Won, Some(session)) => format!(
                "Correct! You chose {}. Progress: {}/{}",
                selection.name(),
                session.sequence_progress,
                session.mystery_sequence.len()
            ),
            (RoundOutcome::Won, None) => format!("Correct! You chose {}.", selection.name()),
            (RoundOutcome::Lost, session) => format!(
                "Wrong! Game Over! Mysteries Solved: {}",
                session.map(|s| s.score).unwrap_or_default()
            ),
        }
    }
}

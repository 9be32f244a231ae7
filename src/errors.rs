use crate::game::GameKind;
use std::fmt;

/// Write-path operation a failure came from. The revert text shown to the
/// player depends on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Start,
    Act,
    Claim,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameError {
    WalletUnavailable,
    ConnectionRejected,
    NoAccounts,
    NetworkMismatch { expected: u64, actual: u64 },
    NetworkAddFailed { network: String, reason: String },
    NotConnected,
    InvalidStake,
    NotActive,
    NothingToClaim,
    InsufficientFunds,
    UserRejected,
    TransactionReverted(Operation),
    TransactionTimeout,
    GasEstimation,
    Network,
    StartNotConfirmed(GameKind),
    Other(String),
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::WalletUnavailable => {
                write!(f, "No wallet provider found. Start a wallet bridge or pass --keystore.")
            }
            GameError::ConnectionRejected => write!(f, "Wallet connection rejected by user."),
            GameError::NoAccounts => write!(f, "Wallet returned no accounts."),
            GameError::NetworkMismatch { expected, actual } => write!(
                f,
                "Wallet is on chain {actual}, expected chain {expected}. Switch networks and try again."
            ),
            GameError::NetworkAddFailed { network, reason } => {
                write!(f, "Failed to add {network} network: {reason}")
            }
            GameError::NotConnected => write!(f, "No account connected"),
            GameError::InvalidStake => write!(f, "Stake must be at least 0.01 STT"),
            GameError::NotActive => write!(f, "No active game. Start a game first."),
            GameError::NothingToClaim => write!(f, "Nothing to claim yet."),
            GameError::InsufficientFunds => {
                write!(f, "Insufficient STT balance. Please get more STT from the faucet.")
            }
            GameError::UserRejected => write!(f, "Transaction rejected by user."),
            GameError::TransactionReverted(Operation::Start) => write!(
                f,
                "Contract rejected the transaction. This may be due to: insufficient balance, contract issue, or network problem. Please check the contract on the explorer."
            ),
            GameError::TransactionReverted(Operation::Act) => {
                write!(f, "Game ended or invalid color choice.")
            }
            GameError::TransactionReverted(Operation::Claim) => {
                write!(f, "Claim rejected by the contract. There may be no reward to claim.")
            }
            GameError::TransactionTimeout => {
                write!(f, "Transaction took too long. Please try again.")
            }
            GameError::GasEstimation => {
                write!(f, "Gas estimation failed. Please try again or check your balance.")
            }
            GameError::Network => write!(
                f,
                "Network connection failed. Please check your internet connection and try again."
            ),
            GameError::StartNotConfirmed(GameKind::Survival) => {
                write!(f, "Game failed to start. Please try again.")
            }
            GameError::StartNotConfirmed(GameKind::Mystery) => {
                write!(f, "Failed to start mystery game. Please try again.")
            }
            GameError::Other(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for GameError {}

impl GameError {
    /// Maps the text of a failed write to the user-facing catalog.
    ///
    /// Matching is case-insensitive and ordered; the first substring that
    /// hits wins. Unmatched failures keep their original text.
    pub fn classify(op: Operation, failure: &str) -> GameError {
        let text = failure.to_lowercase();
        let rejected = text.contains("user rejected") || text.contains("user denied");
        let no_funds = text.contains("insufficient funds");
        let reverted = text.contains("reverted");
        let network = text.contains("eth_chainid")
            || text.contains("error sending request")
            || text.contains("connection refused");
        let timeout = text.contains("timeout") || text.contains("timed out");

        match op {
            Operation::Start => {
                if reverted {
                    GameError::TransactionReverted(op)
                } else if network {
                    GameError::Network
                } else if no_funds {
                    GameError::InsufficientFunds
                } else if rejected {
                    GameError::UserRejected
                } else if timeout {
                    GameError::TransactionTimeout
                } else if text.contains("gas") {
                    GameError::GasEstimation
                } else {
                    GameError::Other(failure.to_string())
                }
            }
            Operation::Act | Operation::Claim => {
                if network {
                    GameError::Network
                } else if timeout {
                    GameError::TransactionTimeout
                } else if rejected {
                    GameError::UserRejected
                } else if no_funds {
                    GameError::InsufficientFunds
                } else if reverted {
                    GameError::TransactionReverted(op)
                } else {
                    GameError::Other(failure.to_string())
                }
            }
        }
    }
}

use alloy::primitives::{
    Address,
    address,
};

pub mod chain;
pub mod errors;
pub mod game;
pub mod gateway;
pub mod poller;
pub mod session;
pub mod storage;
pub mod wallet;

/// Deployed Spectrum Survival contract on Somnia testnet.
pub const SURVIVAL_CONTRACT_ADDRESS: Address =
    address!("0x0889DD96EC1f23930D111e7011BA9947FDCcC77b");

/// Deployed Chromatic Mystery contract on Somnia testnet.
pub const MYSTERY_CONTRACT_ADDRESS: Address =
    address!("0xb4ff3973F012a4b3709DE4083924930E1fD4ab11");

pub mod survival_types {
    alloy::sol! {
        #[sol(rpc)]
        contract SpectraGame {
            struct Game {
                address player;
                uint256 stake;
                uint256 score;
                bool active;
                uint256 lastRoundTimestamp;
            }

            event GameStarted(address indexed player, uint256 stake);
            event ColorChosen(address indexed player, uint8 colorId, bool survived, uint8 randomColor);
            event RoundSurvived(address indexed player, uint256 newScore, uint256 potentialReward);
            event GameLost(address indexed player, uint256 finalScore, uint8 chosenColor, uint8 randomColor);
            event RewardClaimed(address indexed player, uint256 reward);

            function startGame() external payable;
            function chooseColor(uint8 colorId) external;
            function claimReward() external;
            function getGame(address player) external view returns (Game memory);
            function getPotentialReward(address player) external view returns (uint256);
            function calculateReward(uint256 stake, uint256 score) external pure returns (uint256);
        }
    }
}

pub mod mystery_types {
    alloy::sol! {
        #[sol(rpc)]
        contract ChromaticMystery {
            struct MysterySession {
                address player;
                uint256 stake;
                uint256 score;
                bool active;
                uint8 currentMysteryIndex;
                uint256 lastRoundTimestamp;
                uint8[] mysterySequence;
                uint8 sequenceProgress;
            }

            event MysteryStarted(address indexed player, uint256 stake);
            event MysteryGuessSubmitted(address indexed player, uint8 guessedColor, bool correct);
            event MysterySequenceSolved(address indexed player, uint256 newScore, uint256 potentialReward);
            event MysteryGameLost(address indexed player, uint256 finalScore);
            event MysteryRewardClaimed(address indexed player, uint256 reward);

            function startMystery() external payable;
            function guessMysteryColor(uint8 colorId) external;
            function claimMysteryReward() external;
            function getMystery(address player) external view returns (MysterySession memory);
            function getMysterySequence(address player) external view returns (uint8[] memory);
            function getSequenceProgress(address player) external view returns (uint8);
            function getPotentialReward(address player) external view returns (uint256);
            function calculateReward(uint256 stake, uint256 score) external pure returns (uint256);
        }
    }
}

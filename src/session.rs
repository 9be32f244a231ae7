use crate::{
    errors::GameError,
    mystery_types::ChromaticMystery,
    survival_types::SpectraGame,
};
use alloy::primitives::{
    Address,
    U256,
    utils::{
        format_ether,
        parse_ether,
    },
};
use chrono::{
    DateTime,
    Utc,
};

/// 0.01 STT in wei.
pub const MIN_STAKE_WEI: u64 = 10_000_000_000_000_000;
pub const DEFAULT_STAKE: &str = "0.01";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red = 1,
    Blue = 2,
    Green = 3,
    Yellow = 4,
    Violet = 5,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::Red,
        Color::Blue,
        Color::Green,
        Color::Yellow,
        Color::Violet,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Color> {
        Color::ALL.into_iter().find(|c| c.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            Color::Red => "Red",
            Color::Blue => "Blue",
            Color::Green => "Green",
            Color::Yellow => "Yellow",
            Color::Violet => "Violet",
        }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Color::Red => (0xff, 0x44, 0x44),
            Color::Blue => (0x44, 0x44, 0xff),
            Color::Green => (0x44, 0xff, 0x44),
            Color::Yellow => (0xff, 0xff, 0x44),
            Color::Violet => (0xff, 0x44, 0xff),
        }
    }

    pub fn next(self) -> Color {
        let idx = (self.id() as usize) % Color::ALL.len();
        Color::ALL[idx]
    }

    pub fn prev(self) -> Color {
        let len = Color::ALL.len();
        let idx = (self.id() as usize + len - 2) % len;
        Color::ALL[idx]
    }
}

/// Read-only view of a contract-held session, shared by both games.
pub trait GameSession: Clone + std::fmt::Debug + Send + Sync + 'static {
    fn stake(&self) -> U256;
    fn score(&self) -> u64;
    fn active(&self) -> bool;
    fn last_round_timestamp(&self) -> u64;

    /// `(solved, total)` for games with a hidden sequence.
    fn progress(&self) -> Option<(u8, usize)> {
        None
    }

    fn last_round_at(&self) -> Option<DateTime<Utc>> {
        match self.last_round_timestamp() {
            0 => None,
            secs => DateTime::from_timestamp(i64::try_from(secs).ok()?, 0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurvivalSession {
    pub player: Address,
    pub stake: U256,
    pub score: u64,
    pub active: bool,
    pub last_round_timestamp: u64,
}

impl From<SpectraGame::Game> for SurvivalSession {
    fn from(game: SpectraGame::Game) -> Self {
        Self {
            player: game.player,
            stake: game.stake,
            score: game.score.saturating_to(),
            active: game.active,
            last_round_timestamp: game.lastRoundTimestamp.saturating_to(),
        }
    }
}

impl GameSession for SurvivalSession {
    fn stake(&self) -> U256 {
        self.stake
    }

    fn score(&self) -> u64 {
        self.score
    }

    fn active(&self) -> bool {
        self.active
    }

    fn last_round_timestamp(&self) -> u64 {
        self.last_round_timestamp
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MysterySession {
    pub player: Address,
    pub stake: U256,
    pub score: u64,
    pub active: bool,
    pub current_mystery_index: u8,
    pub last_round_timestamp: u64,
    pub mystery_sequence: Vec<Color>,
    pub sequence_progress: u8,
}

impl From<ChromaticMystery::MysterySession> for MysterySession {
    fn from(raw: ChromaticMystery::MysterySession) -> Self {
        Self {
            player: raw.player,
            stake: raw.stake,
            score: raw.score.saturating_to(),
            active: raw.active,
            current_mystery_index: raw.currentMysteryIndex,
            last_round_timestamp: raw.lastRoundTimestamp.saturating_to(),
            mystery_sequence: raw
                .mysterySequence
                .into_iter()
                .filter_map(Color::from_id)
                .collect(),
            sequence_progress: raw.sequenceProgress,
        }
    }
}

impl GameSession for MysterySession {
    fn stake(&self) -> U256 {
        self.stake
    }

    fn score(&self) -> u64 {
        self.score
    }

    fn active(&self) -> bool {
        self.active
    }

    fn last_round_timestamp(&self) -> u64 {
        self.last_round_timestamp
    }

    fn progress(&self) -> Option<(u8, usize)> {
        Some((self.sequence_progress, self.mystery_sequence.len()))
    }
}

/// Parses a decimal STT amount into wei, rejecting anything under 0.01.
pub fn parse_stake(input: &str) -> Result<U256, GameError> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(GameError::InvalidStake);
    }
    let wei = parse_ether(trimmed).map_err(|_| GameError::InvalidStake)?;
    if wei < U256::from(MIN_STAKE_WEI) {
        return Err(GameError::InvalidStake);
    }
    Ok(wei)
}

/// Renders a wei amount as STT without trailing zeros.
pub fn format_stt(wei: U256) -> String {
    let full = format_ether(wei);
    match full.split_once('.') {
        Some((whole, fraction)) => match fraction.trim_end_matches('0') {
            "" => whole.to_string(),
            fraction => format!("{whole}.{fraction}"),
        },
        None => full,
    }
}

pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}…{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_stake__accepts_minimum() {
        // when
        let wei = parse_stake("0.01").unwrap();

        // then
        assert_eq!(wei, U256::from(MIN_STAKE_WEI));
    }

    #[test]
    fn parse_stake__rejects_below_minimum_and_garbage() {
        for input in ["0.009", "0", "", "  ", "abc", "-1", "0.0099999"] {
            assert_eq!(parse_stake(input), Err(GameError::InvalidStake), "{input:?}");
        }
    }

    #[test]
    fn format_stt__trims_trailing_zeros() {
        assert_eq!(format_stt(U256::ZERO), "0");
        assert_eq!(format_stt(U256::from(MIN_STAKE_WEI)), "0.01");
        assert_eq!(format_stt(U256::from(1_200_000_000_000_000_000u64)), "1.2");
        assert_eq!(format_stt(parse_ether("3").unwrap()), "3");
    }

    #[test]
    fn format_stt__keeps_full_precision_of_large_amounts() {
        // given
        let wei = parse_ether("1000000").unwrap() + U256::from(1u8);

        // when
        let rendered = format_stt(wei);

        // then
        assert_eq!(rendered, "1000000.000000000000000001");
    }

    #[test]
    fn color__ids_round_trip_and_cycle() {
        assert_eq!(Color::from_id(1), Some(Color::Red));
        assert_eq!(Color::from_id(5), Some(Color::Violet));
        assert_eq!(Color::from_id(0), None);
        assert_eq!(Color::from_id(6), None);
        assert_eq!(Color::Violet.next(), Color::Red);
        assert_eq!(Color::Red.prev(), Color::Violet);
        assert_eq!(Color::Blue.prev(), Color::Red);
    }

    #[test]
    fn short_address__keeps_prefix_and_suffix() {
        // given
        let address = Address::repeat_byte(0x12);

        // when
        let short = short_address(&address);

        // then
        assert!(short.starts_with("0x"));
        assert!(short.ends_with("1212"));
        assert_eq!(short.chars().count(), 11);
    }

    #[test]
    fn mystery_session__reports_progress_against_sequence_length() {
        // given
        let raw = ChromaticMystery::MysterySession {
            player: Address::ZERO,
            stake: U256::from(MIN_STAKE_WEI),
            score: U256::from(1u8),
            active: true,
            currentMysteryIndex: 0,
            lastRoundTimestamp: U256::from(1_700_000_000u64),
            mysterySequence: vec![1, 3, 5],
            sequenceProgress: 2,
        };

        // when
        let session = MysterySession::from(raw);

        // then
        assert_eq!(session.progress(), Some((2, 3)));
        assert!(session.last_round_at().is_some());
    }

    proptest! {
        #[test]
        fn parse_stake__accepts_every_whole_cent_from_one(cents in 1u64..1_000_000) {
            let input = format!("{}.{:02}", cents / 100, cents % 100);
            let wei = parse_stake(&input).unwrap();
            prop_assert_eq!(wei, U256::from(cents) * U256::from(MIN_STAKE_WEI));
            prop_assert_eq!(parse_stake(&format_stt(wei)).unwrap(), wei);
        }

        #[test]
        fn parse_stake__rejects_every_amount_under_minimum(wei in 0u64..MIN_STAKE_WEI) {
            let input = format_stt(U256::from(wei));
            prop_assert_eq!(parse_stake(&input), Err(GameError::InvalidStake));
        }
    }
}

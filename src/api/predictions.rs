use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type PredictionId = u64;
pub type Wei = U256;

/// A prediction market as recorded by the contract. Read-only from our side,
/// only `prize_pool` and `total_participants` grow until resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    pub id: PredictionId,
    pub creator: Address,
    pub question: String,
    pub options: Vec<String>,
    pub entry_fee: Wei,
    pub prize_pool: Wei,
    pub end_time: DateTime<Utc>,
    pub resolution_time: DateTime<Utc>,
    pub resolved: bool,
    /// Index into `options`, set once `resolved` flips to true.
    pub winning_option: Option<u32>,
    pub active: bool,
    pub total_participants: u64,
}

/// A user's entry on one prediction. The contract stores a zero timestamp
/// for "never predicted", which decodes to `placed_at = None`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPrediction {
    pub option: u32,
    pub placed_at: Option<DateTime<Utc>>,
    pub claimed: bool,
}
impl UserPrediction {
    pub fn is_placed(&self) -> bool {
        self.placed_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrizeStatus {
    pub has_won: bool,
    pub prize_amount: Wei,
    pub claimed: bool,
}

/// Per-option tallies. The contract reports percentages in basis points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionStats {
    pub label: String,
    pub count: u64,
    pub percentage_bps: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub total_predictions: u64,
    pub correct_predictions: u64,
    pub current_streak: u64,
    pub longest_streak: u64,
    pub total_winnings: Wei,
    pub accuracy_bps: u32,
    pub has_streak_saver: bool,
    pub total_points: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub wallet: Address,
    pub points: u64,
    pub streak: u64,
}

/// Lifecycle of a prediction as seen from the outside. Driven entirely by
/// the clock and by resolve transactions someone else may send.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketPhase {
    Active,
    PendingResolution,
    EmergencyEligible,
    Resolved,
}

/// Status of one user's entry on one prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BetStatus {
    Active,
    PendingResolution,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResolveRole {
    Creator,
    Participant,
}

/// A market that needs a resolution action from the viewing wallet.
/// Produced by the dashboard scan, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketToResolve {
    pub id: PredictionId,
    pub question: String,
    pub options: Vec<String>,
    pub total_participants: u64,
    pub prize_pool: Wei,
    pub end_time: DateTime<Utc>,
    pub resolution_time: DateTime<Utc>,
    pub is_emergency: bool,
    pub user_role: ResolveRole,
}

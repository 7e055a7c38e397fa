use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketOverview {
    pub prediction: Prediction,
    pub options: Vec<OptionStats>,
    pub phase: MarketPhase,
}

/// One participated bet, as shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetOverview {
    pub prediction: PredictionId,
    pub question: String,
    pub option: u32,
    pub option_label: String,
    pub entry_fee: Wei,
    pub placed_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BetStatus,
    pub prize_amount: Option<Wei>,
    pub claimed: bool,
    pub total_participants: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActivityKind {
    BetPlaced,
    BetWon,
    BetLost,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub prediction: PredictionId,
    pub kind: ActivityKind,
    pub question: String,
    pub option_label: String,
    pub amount: Wei,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Achievement {
    pub title: String,
    pub description: String,
    pub unlocked: bool,
}

/// Everything one dashboard refresh produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardResponse {
    pub stats: UserStats,
    pub balance: Wei,
    pub bets: Vec<BetOverview>,
    pub unclaimed_prizes: usize,
    pub closing_soon: usize,
    pub activity: Vec<ActivityEntry>,
    pub achievements: Vec<Achievement>,
    pub to_resolve: Vec<MarketToResolve>,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NewPredictionRequest {
    pub question: String,
    pub options: Vec<String>,
    pub entry_fee: Wei,
    pub initial_prize_pool: Wei,
    pub end_time: DateTime<Utc>,
    /// Defaults to two hours after `end_time` when not given.
    pub resolution_time: Option<DateTime<Utc>>,
}

/// Orderings for the market list.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum MarketSort {
    Popular,
    ClosingSoon,
    Newest,
    Volume,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SubmitPredictionRequest {
    pub prediction: PredictionId,
    pub option: u32,
    /// What the user offered to stake. Must equal the market's entry fee
    /// exactly, checked before anything is sent to chain.
    pub amount: Wei,
}

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::bail;

use super::*;

impl Display for MarketPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Active => "Active",
            Self::PendingResolution => "Closed - awaiting resolution",
            Self::EmergencyEligible => "Closed - emergency resolution open",
            Self::Resolved => "Resolved",
        };
        write!(f, "{}", output)
    }
}
impl Display for BetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Active => "Active",
            Self::PendingResolution => "Pending resolution",
            Self::Won => "Won",
            Self::Lost => "Lost",
        };
        write!(f, "{}", output)
    }
}
impl Display for ResolveRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Creator => "Creator",
            Self::Participant => "Participant",
        };
        write!(f, "{}", output)
    }
}
impl Display for ActivityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::BetPlaced => "Bet placed",
            Self::BetWon => "Bet won",
            Self::BetLost => "Bet lost",
        };
        write!(f, "{}", output)
    }
}
impl Display for MarketSort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Popular => "popular",
            Self::ClosingSoon => "closing-soon",
            Self::Newest => "newest",
            Self::Volume => "volume",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for MarketSort {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "popular" => Ok(Self::Popular),
            "closing-soon" => Ok(Self::ClosingSoon),
            "newest" => Ok(Self::Newest),
            "volume" => Ok(Self::Volume),
            e => bail!("Unknown sort order: {}", e),
        }
    }
}
impl Default for MarketSort {
    fn default() -> Self {
        MarketSort::Popular
    }
}

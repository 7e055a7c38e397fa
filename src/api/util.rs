use alloy_primitives::{utils::format_ether, Address};
use chrono::{DateTime, Utc};

use super::Wei;

pub const TOKEN_SYMBOL: &str = "STT";

/// Wei amount as a decimal token string, trailing zeros trimmed.
pub fn format_token(amount: Wei) -> String {
    let formatted = format_ether(amount);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, TOKEN_SYMBOL)
}

pub fn short_address(address: &Address) -> String {
    let hex = address.to_string();
    format!("{}...{}", &hex[..6], &hex[hex.len() - 4..])
}

pub fn format_time_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = end - now;
    if remaining.num_seconds() <= 0 {
        return "Closed".to_string();
    }
    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    if days > 0 {
        format!("Closes in {}d {}h", days, hours)
    } else if hours > 0 {
        format!("Closes in {}h {}m", hours, minutes)
    } else {
        format!("Closes in {}m", minutes.max(1))
    }
}

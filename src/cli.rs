#![allow(unused)]
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{utils::parse_ether, Address};
use anyhow::{Context, Result};
use api::*;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

use crate::config::Settings;
use crate::contract::RpcMarket;
use crate::funpredict::FunPredict;
use crate::rpc::Provider;
use crate::wallet::RpcWallet;

mod api;
mod config;
mod contract;
mod funpredict;
mod rpc;
mod wallet;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    /// Configuration file, defaults to funpredict.toml next to the binary.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Overrides the configured JSON-RPC endpoint.
    #[arg(short, long)]
    url: Option<String>,
    /// Overrides the configured contract address.
    #[arg(long)]
    contract: Option<Address>,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List markets, active ones by default.
    Markets {
        #[arg(short, long, default_value_t = MarketSort::Popular)]
        sort: MarketSort,
        /// Include closed and resolved markets.
        #[arg(short, long)]
        all: bool,
    },
    /// Everything about one market.
    Market {
        #[arg(short, long)]
        prediction: PredictionId,
    },
    /// Create a market, funding its initial prize pool.
    Create {
        #[arg(short, long)]
        question: String,
        /// Comma separated option labels.
        #[arg(short, long, default_value = "Yes,No")]
        options: String,
        /// Decimal token amount, e.g. 0.001.
        #[arg(short, long)]
        entry_fee: String,
        /// Decimal token amount, e.g. 0.01.
        #[arg(short, long)]
        prize_pool: String,
        /// RFC 3339, e.g. 2027-01-01T12:00:00Z. At least 1 hour from now.
        #[arg(long)]
        end_time: DateTime<Utc>,
        /// Defaults to two hours after the end time.
        #[arg(long)]
        resolution_time: Option<DateTime<Utc>>,
    },
    /// Stake the entry fee on one option.
    Predict {
        #[arg(short, long)]
        prediction: PredictionId,
        #[arg(short, long)]
        option: u32,
        /// Decimal token amount, must match the entry fee exactly.
        #[arg(short, long)]
        amount: String,
    },
    /// Stats, bets and pending resolutions for a wallet.
    Dashboard {
        /// Defaults to the wallet's first account.
        #[arg(long)]
        user: Option<Address>,
    },
    /// Resolve an ended market you created.
    Resolve {
        #[arg(short, long)]
        prediction: PredictionId,
        #[arg(short, long)]
        winning_option: u32,
    },
    /// Resolve a market whose creator sat out the grace period.
    EmergencyResolve {
        #[arg(short, long)]
        prediction: PredictionId,
        #[arg(short, long)]
        winning_option: u32,
    },
    Leaderboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    Builder::default()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .write_style(WriteStyle::Always)
        .init();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        settings.rpc_url = url;
    }
    if let Some(contract) = cli.contract {
        settings.contract = contract;
    }
    let provider = Arc::new(Provider::new(settings.rpc_url.clone()));
    let market = RpcMarket::new(provider.clone(), &settings);
    let wallet = RpcWallet::new(provider);
    let app = FunPredict::new(Box::new(market), Box::new(wallet), settings);

    match cli.command {
        Commands::Markets { sort, all } => {
            let markets = app.markets(sort, all).await?;
            println!(
                "{} {} found",
                markets.len(),
                if markets.len() == 1 { "market" } else { "markets" }
            );
            for market in &markets {
                println!();
                print_market(market);
            }
        }
        Commands::Market { prediction } => {
            let market = app.market_detail(prediction).await?;
            print_market(&market);
            print_market_details(&market);
        }
        Commands::Create {
            question,
            options,
            entry_fee,
            prize_pool,
            end_time,
            resolution_time,
        } => {
            let request = NewPredictionRequest {
                question,
                options: split_options(&options),
                entry_fee: parse_ether(&entry_fee)
                    .context("Invalid entry fee format. Use decimal format (e.g. 0.001)")?,
                initial_prize_pool: parse_ether(&prize_pool)
                    .context("Invalid prize pool format. Use decimal format (e.g. 0.01)")?,
                end_time,
                resolution_time,
            };
            let id = app.create_prediction(request).await?;
            println!("Market created successfully! ID: {}", id);
        }
        Commands::Predict {
            prediction,
            option,
            amount,
        } => {
            let request = SubmitPredictionRequest {
                prediction,
                option,
                amount: parse_ether(&amount)
                    .context("Invalid amount format. Use decimal format (e.g. 0.001)")?,
            };
            let hash = app.submit_prediction(request).await?;
            println!("Prediction submitted: {}", hash);
        }
        Commands::Dashboard { user } => {
            let dashboard = app.dashboard(user).await?;
            print_dashboard(&dashboard);
        }
        Commands::Resolve {
            prediction,
            winning_option,
        } => {
            let hash = app.resolve(prediction, winning_option).await?;
            println!("Resolved prediction {}: {}", prediction, hash);
        }
        Commands::EmergencyResolve {
            prediction,
            winning_option,
        } => {
            let hash = app.emergency_resolve(prediction, winning_option).await?;
            println!("Emergency-resolved prediction {}: {}", prediction, hash);
        }
        Commands::Leaderboard => {
            let entries = app.leaderboard().await?;
            if entries.is_empty() {
                println!("There is no data on the blockchain yet.");
            }
            for entry in entries {
                println!(
                    "{:>4}. {} {:>6} points (streak {})",
                    entry.rank, entry.wallet, entry.points, entry.streak
                );
            }
        }
    }
    Ok(())
}

fn split_options(options: &str) -> Vec<String> {
    options
        .split(',')
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect()
}

fn print_market(market: &MarketOverview) {
    let prediction = &market.prediction;
    println!("#{} {} [{}]", prediction.id, prediction.question, market.phase);
    println!(
        "    {} | {} participants | pool {}",
        format_time_remaining(prediction.end_time, Utc::now()),
        prediction.total_participants,
        format_token(prediction.prize_pool)
    );
    for option in &market.options {
        println!(
            "    {:>3}% {} ({} predictions)",
            option.percentage_bps / 100,
            option.label,
            option.count
        );
    }
}

fn print_market_details(market: &MarketOverview) {
    let prediction = &market.prediction;
    println!("    Entry fee: {}", format_token(prediction.entry_fee));
    println!("    Created by: {}", short_address(&prediction.creator));
    println!("    Closes: {}", prediction.end_time);
    println!("    Resolution due: {}", prediction.resolution_time);
    if let Some(winner) = prediction.winning_option {
        if let Some(label) = prediction.options.get(winner as usize) {
            println!("    Winner: {}", label);
        }
    }
}

fn print_dashboard(dashboard: &DashboardResponse) {
    let stats = &dashboard.stats;
    let win_rate = if stats.total_predictions > 0 {
        stats.correct_predictions as f64 / stats.total_predictions as f64 * 100.0
    } else {
        0.0
    };
    println!("Predictions: {}", stats.total_predictions);
    println!(
        "Win rate: {:.0}% ({} / {} correct)",
        win_rate, stats.correct_predictions, stats.total_predictions
    );
    println!("Total winnings: {}", format_token(stats.total_winnings));
    println!("Wallet balance: {}", format_token(dashboard.balance));
    println!(
        "Streak: {} (longest {}){}",
        stats.current_streak,
        stats.longest_streak,
        if stats.has_streak_saver {
            " - streak saver ready"
        } else {
            ""
        }
    );
    println!(
        "Accuracy: {:.1}% | Points: {}",
        stats.accuracy_bps as f64 / 100.0,
        stats.total_points
    );

    // The first scan entry decides how the banner is framed.
    match dashboard.to_resolve.first() {
        Some(first) if first.user_role == ResolveRole::Creator => {
            println!();
            println!(
                "You have {} market(s) waiting for your resolution:",
                dashboard.to_resolve.len()
            );
        }
        Some(_) => {
            println!();
            println!(
                "{} market(s) you joined are awaiting resolution:",
                dashboard.to_resolve.len()
            );
        }
        None => {}
    }
    for entry in &dashboard.to_resolve {
        println!(
            "    #{} {} [{}{}]",
            entry.id,
            entry.question,
            entry.user_role,
            if entry.is_emergency {
                ", emergency resolution open"
            } else {
                ""
            }
        );
    }

    if dashboard.unclaimed_prizes > 0 {
        println!();
        println!("{} unclaimed prize(s)", dashboard.unclaimed_prizes);
    }
    if dashboard.closing_soon > 0 {
        println!("{} bet(s) closing within 24 hours", dashboard.closing_soon);
    }

    println!();
    println!("Bets:");
    for bet in &dashboard.bets {
        println!(
            "    #{} {} - {} at {} [{}]{}",
            bet.prediction,
            bet.question,
            bet.option_label,
            format_token(bet.entry_fee),
            bet.status,
            match bet.prize_amount {
                Some(prize) if !bet.claimed => format!(" prize {} unclaimed", format_token(prize)),
                Some(prize) => format!(" prize {}", format_token(prize)),
                None => String::new(),
            }
        );
    }

    println!();
    println!("Recent activity:");
    for activity in &dashboard.activity {
        println!(
            "    {} {} on \"{}\" ({})",
            activity.kind,
            format_token(activity.amount),
            activity.question,
            activity.timestamp
        );
    }

    println!();
    println!("Achievements:");
    for achievement in &dashboard.achievements {
        println!(
            "    [{}] {} - {}",
            if achievement.unlocked { "x" } else { " " },
            achievement.title,
            achievement.description
        );
    }
}

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{sol, Revert, SolCall, SolError, SolEvent};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use thiserror::Error;

use crate::api::*;
use crate::config::Settings;
use crate::rpc::{Provider, ProviderError, TransactionReceipt, TransactionRequest};

sol! {
    event PredictionCreated(uint256 indexed id, address indexed creator, string question);

    function predictionCounter() external view returns (uint256);
    function getPrediction(uint256 id) external view returns (
        uint256 id_,
        address creator,
        string question,
        string[] options,
        uint256 entryFee,
        uint256 prizePool,
        uint256 endTime,
        uint256 resolutionTime,
        bool resolved,
        uint256 winningOption,
        bool active,
        uint256 totalParticipants
    );
    function getUserPrediction(uint256 id, address user) external view returns (
        uint256 option,
        uint256 timestamp,
        bool claimed
    );
    function getUserPrizeStatus(uint256 id, address user) external view returns (
        bool hasWon,
        uint256 prizeAmount,
        bool claimed
    );
    function getAllOptionStats(uint256 id) external view returns (
        uint256[] counts,
        uint256[] percentages
    );
    function getUserStats(address user) external view returns (
        uint256 totalPredictions,
        uint256 correctPredictions,
        uint256 currentStreak,
        uint256 longestStreak,
        uint256 totalWinnings,
        uint256 accuracyPercentage,
        bool hasStreakSaver,
        uint256 totalPoints
    );
    function getUserParticipatedPredictions(address user) external view returns (uint256[] ids);
    function getPointsLeaderboard() external view returns (
        address[] users,
        uint256[] points,
        uint256[] streaks
    );

    function createPrediction(
        string question,
        string[] options,
        uint256 entryFee,
        uint256 endTime,
        uint256 resolutionTime
    ) external payable;
    function submitPrediction(uint256 id, uint256 option) external payable;
    function resolvePrediction(uint256 id, uint256 winningOption) external;
    function emergencyResolvePrediction(uint256 id, uint256 winningOption) external;
}

/// Revert reasons the contract is known to emit, as typed kinds. Anything
/// the table doesn't recognize stays readable through `Other`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContractError {
    #[error("end time must be in the future")]
    EndTimeInPast,
    #[error("resolution time must be after end time")]
    ResolutionBeforeEnd,
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("at least 2 options are required")]
    TooFewOptions,
    #[error("entry fee must be greater than 0")]
    ZeroEntryFee,
    #[error("an initial prize pool must be provided")]
    MissingPrizePool,
    #[error("prediction must last at least 1 hour")]
    PredictionTooShort,
    #[error("resolution period must be at least 1 hour")]
    ResolutionPeriodTooShort,
    #[error("{0}")]
    Other(String),
}

fn classify_reason(reason: &str) -> ContractError {
    // Exact contract strings first.
    match reason {
        "End time must be in future" => return ContractError::EndTimeInPast,
        "Resolution time must be after end time" => return ContractError::ResolutionBeforeEnd,
        "Question cannot be empty" => return ContractError::EmptyQuestion,
        "Must have at least 2 options" => return ContractError::TooFewOptions,
        "Entry fee must be greater than 0" => return ContractError::ZeroEntryFee,
        "Must provide initial prize pool" => return ContractError::MissingPrizePool,
        "Prediction must last at least 1 hour" => return ContractError::PredictionTooShort,
        "Resolution period must be at least 1 hour" => {
            return ContractError::ResolutionPeriodTooShort
        }
        _ => {}
    }
    // Last resort for nodes that mangle the reason into a longer message.
    if reason.contains("End time must be in future") {
        ContractError::EndTimeInPast
    } else if reason.contains("Resolution time must be after end time") {
        ContractError::ResolutionBeforeEnd
    } else if reason.contains("Question cannot be empty") {
        ContractError::EmptyQuestion
    } else if reason.contains("Must have at least 2 options") {
        ContractError::TooFewOptions
    } else if reason.contains("Entry fee must be greater than 0") {
        ContractError::ZeroEntryFee
    } else if reason.contains("Must provide initial prize pool") {
        ContractError::MissingPrizePool
    } else if reason.contains("Prediction must last at least 1 hour") {
        ContractError::PredictionTooShort
    } else if reason.contains("Resolution period must be at least 1 hour") {
        ContractError::ResolutionPeriodTooShort
    } else {
        ContractError::Other(reason.to_string())
    }
}

/// Turns a failed gas estimation into the revert reason it carries, if any.
pub fn decode_revert(error: &ProviderError) -> Option<ContractError> {
    if let ProviderError::Rpc { message, data, .. } = error {
        if let Some(data) = data {
            if let Ok(revert) = Revert::abi_decode(data, true) {
                return Some(classify_reason(&revert.reason));
            }
        }
        return Some(classify_reason(message));
    }
    None
}

fn to_u64(value: U256) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("contract returned out of range value {}", value))
}

fn to_u32(value: U256) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("contract returned out of range value {}", value))
}

fn timestamp(value: U256) -> Result<DateTime<Utc>> {
    let secs = to_u64(value)?;
    DateTime::from_timestamp(secs as i64, 0)
        .with_context(|| format!("contract returned invalid timestamp {}", secs))
}

/// The deployed PrizePoolPrediction contract, seen through the operations
/// this front end consumes. All durable state lives behind this trait.
#[async_trait]
pub trait PredictionMarket {
    async fn prediction_count(&self) -> Result<u64>;
    async fn prediction(&self, id: PredictionId) -> Result<Prediction>;
    async fn user_prediction(&self, id: PredictionId, user: Address) -> Result<UserPrediction>;
    async fn prize_status(&self, id: PredictionId, user: Address) -> Result<PrizeStatus>;
    async fn option_counts(&self, id: PredictionId) -> Result<(Vec<u64>, Vec<u32>)>;
    async fn user_stats(&self, user: Address) -> Result<UserStats>;
    async fn participated_predictions(&self, user: Address) -> Result<Vec<PredictionId>>;
    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>>;

    async fn create_prediction(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
        entry_fee: Wei,
        end_time: DateTime<Utc>,
        resolution_time: DateTime<Utc>,
        initial_pool: Wei,
    ) -> Result<PredictionId>;
    async fn submit_prediction(
        &self,
        from: Address,
        id: PredictionId,
        option: u32,
        stake: Wei,
    ) -> Result<B256>;
    async fn resolve_prediction(
        &self,
        from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256>;
    async fn emergency_resolve(
        &self,
        from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256>;
}

pub struct RpcMarket {
    provider: Arc<Provider>,
    address: Address,
    receipt_poll: Duration,
    receipt_timeout: Duration,
}

impl RpcMarket {
    pub fn new(provider: Arc<Provider>, settings: &Settings) -> Self {
        Self {
            provider,
            address: settings.contract,
            receipt_poll: Duration::from_millis(settings.receipt_poll_ms),
            receipt_timeout: Duration::from_secs(settings.receipt_timeout_secs),
        }
    }

    async fn call<C: SolCall>(&self, call: C) -> Result<C::Return> {
        let data = self
            .provider
            .call(self.address, call.abi_encode().into())
            .await
            .with_context(|| format!("read call {} failed", C::SIGNATURE))?;
        C::abi_decode_returns(&data, true)
            .with_context(|| format!("could not decode response of {}", C::SIGNATURE))
    }

    /// Estimates gas first so a revert reason surfaces before the wallet is
    /// even asked to sign, then sends and waits for the receipt.
    async fn send<C: SolCall>(
        &self,
        from: Address,
        call: C,
        value: Option<Wei>,
    ) -> Result<TransactionReceipt> {
        let tx = TransactionRequest {
            from: Some(from),
            to: self.address,
            value,
            data: call.abi_encode().into(),
        };
        if let Err(error) = self.provider.estimate_gas(&tx).await {
            if let Some(reason) = decode_revert(&error) {
                return Err(anyhow!(reason).context("transaction would fail"));
            }
            return Err(error.into());
        }
        let hash = self.provider.send_transaction(&tx).await?;
        debug!("submitted {} as {}", C::SIGNATURE, hash);
        let receipt = self
            .provider
            .wait_for_receipt(hash, self.receipt_poll, self.receipt_timeout)
            .await?;
        if !receipt.succeeded() {
            bail!("transaction {} reverted on chain", hash);
        }
        Ok(receipt)
    }
}

#[async_trait]
impl PredictionMarket for RpcMarket {
    async fn prediction_count(&self) -> Result<u64> {
        let ret = self.call(predictionCounterCall {}).await?;
        to_u64(ret._0)
    }

    async fn prediction(&self, id: PredictionId) -> Result<Prediction> {
        let ret = self.call(getPredictionCall { id: U256::from(id) }).await?;
        let resolved = ret.resolved;
        Ok(Prediction {
            id: to_u64(ret.id_)?,
            creator: ret.creator,
            question: ret.question,
            options: ret.options,
            entry_fee: ret.entryFee,
            prize_pool: ret.prizePool,
            end_time: timestamp(ret.endTime)?,
            resolution_time: timestamp(ret.resolutionTime)?,
            resolved,
            winning_option: if resolved {
                Some(to_u32(ret.winningOption)?)
            } else {
                None
            },
            active: ret.active,
            total_participants: to_u64(ret.totalParticipants)?,
        })
    }

    async fn user_prediction(&self, id: PredictionId, user: Address) -> Result<UserPrediction> {
        let ret = self
            .call(getUserPredictionCall {
                id: U256::from(id),
                user,
            })
            .await?;
        // Zero timestamp is the contract's "never predicted" marker.
        let placed_at = if ret.timestamp == U256::ZERO {
            None
        } else {
            Some(timestamp(ret.timestamp)?)
        };
        Ok(UserPrediction {
            option: to_u32(ret.option)?,
            placed_at,
            claimed: ret.claimed,
        })
    }

    async fn prize_status(&self, id: PredictionId, user: Address) -> Result<PrizeStatus> {
        let ret = self
            .call(getUserPrizeStatusCall {
                id: U256::from(id),
                user,
            })
            .await?;
        Ok(PrizeStatus {
            has_won: ret.hasWon,
            prize_amount: ret.prizeAmount,
            claimed: ret.claimed,
        })
    }

    async fn option_counts(&self, id: PredictionId) -> Result<(Vec<u64>, Vec<u32>)> {
        let ret = self
            .call(getAllOptionStatsCall { id: U256::from(id) })
            .await?;
        let counts = ret
            .counts
            .into_iter()
            .map(to_u64)
            .collect::<Result<Vec<_>>>()?;
        let percentages = ret
            .percentages
            .into_iter()
            .map(to_u32)
            .collect::<Result<Vec<_>>>()?;
        Ok((counts, percentages))
    }

    async fn user_stats(&self, user: Address) -> Result<UserStats> {
        let ret = self.call(getUserStatsCall { user }).await?;
        Ok(UserStats {
            total_predictions: to_u64(ret.totalPredictions)?,
            correct_predictions: to_u64(ret.correctPredictions)?,
            current_streak: to_u64(ret.currentStreak)?,
            longest_streak: to_u64(ret.longestStreak)?,
            total_winnings: ret.totalWinnings,
            accuracy_bps: to_u32(ret.accuracyPercentage)?,
            has_streak_saver: ret.hasStreakSaver,
            total_points: to_u64(ret.totalPoints)?,
        })
    }

    async fn participated_predictions(&self, user: Address) -> Result<Vec<PredictionId>> {
        let ret = self.call(getUserParticipatedPredictionsCall { user }).await?;
        ret.ids.into_iter().map(to_u64).collect()
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        let ret = self.call(getPointsLeaderboardCall {}).await?;
        ret.users
            .into_iter()
            .zip(ret.points)
            .zip(ret.streaks)
            .enumerate()
            .map(|(index, ((wallet, points), streak))| {
                Ok(LeaderboardEntry {
                    rank: index as u32 + 1,
                    wallet,
                    points: to_u64(points)?,
                    streak: to_u64(streak)?,
                })
            })
            .collect()
    }

    async fn create_prediction(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
        entry_fee: Wei,
        end_time: DateTime<Utc>,
        resolution_time: DateTime<Utc>,
        initial_pool: Wei,
    ) -> Result<PredictionId> {
        let call = createPredictionCall {
            question,
            options,
            entryFee: entry_fee,
            endTime: U256::from(end_time.timestamp()),
            resolutionTime: U256::from(resolution_time.timestamp()),
        };
        let receipt = self.send(from, call, Some(initial_pool)).await?;
        for log in &receipt.logs {
            if log.address != self.address {
                continue;
            }
            if let Ok(event) =
                PredictionCreated::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            {
                return to_u64(event.id);
            }
        }
        // Logs can come back in a shape we fail to decode. The counter was
        // just bumped by our own creation, so it identifies the prediction.
        warn!("no creation event in receipt, reading the counter instead");
        self.prediction_count().await
    }

    async fn submit_prediction(
        &self,
        from: Address,
        id: PredictionId,
        option: u32,
        stake: Wei,
    ) -> Result<B256> {
        let call = submitPredictionCall {
            id: U256::from(id),
            option: U256::from(option),
        };
        let receipt = self.send(from, call, Some(stake)).await?;
        Ok(receipt.transaction_hash)
    }

    async fn resolve_prediction(
        &self,
        from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256> {
        let call = resolvePredictionCall {
            id: U256::from(id),
            winningOption: U256::from(winning_option),
        };
        let receipt = self.send(from, call, None).await?;
        Ok(receipt.transaction_hash)
    }

    async fn emergency_resolve(
        &self,
        from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256> {
        let call = emergencyResolvePredictionCall {
            id: U256::from(id),
            winningOption: U256::from(winning_option),
        };
        let receipt = self.send(from, call, None).await?;
        Ok(receipt.transaction_hash)
    }
}

/// In-memory market for tests, same idea as a zeroed chain: unknown user
/// records decode to their defaults, unknown predictions are errors.
#[derive(Default)]
pub struct TestMarket {
    state: Mutex<TestState>,
}

#[derive(Default)]
struct TestState {
    counter: u64,
    predictions: HashMap<PredictionId, Prediction>,
    user_predictions: HashMap<(PredictionId, Address), UserPrediction>,
    prizes: HashMap<(PredictionId, Address), PrizeStatus>,
    stats: HashMap<Address, UserStats>,
    leaderboard: Vec<LeaderboardEntry>,
    failing: HashSet<PredictionId>,
    fail_counter: bool,
    fail_participated: bool,
}

impl TestMarket {
    pub fn add_prediction(&self, prediction: Prediction) {
        let mut state = self.state.lock().unwrap();
        state.counter = state.counter.max(prediction.id);
        state.predictions.insert(prediction.id, prediction);
    }
    pub fn add_user_prediction(
        &self,
        id: PredictionId,
        user: Address,
        user_prediction: UserPrediction,
    ) {
        let mut state = self.state.lock().unwrap();
        state.user_predictions.insert((id, user), user_prediction);
    }
    pub fn add_prize(&self, id: PredictionId, user: Address, prize: PrizeStatus) {
        self.state.lock().unwrap().prizes.insert((id, user), prize);
    }
    pub fn set_stats(&self, user: Address, stats: UserStats) {
        self.state.lock().unwrap().stats.insert(user, stats);
    }
    /// Makes `prediction(id)` fail, for exercising the skip-and-continue
    /// policy of batched scans.
    pub fn fail_on(&self, id: PredictionId) {
        self.state.lock().unwrap().failing.insert(id);
    }
    pub fn fail_counter(&self) {
        self.state.lock().unwrap().fail_counter = true;
    }
    pub fn fail_participated(&self) {
        self.state.lock().unwrap().fail_participated = true;
    }
}

#[async_trait]
impl PredictionMarket for TestMarket {
    async fn prediction_count(&self) -> Result<u64> {
        let state = self.state.lock().unwrap();
        if state.fail_counter {
            bail!("simulated counter failure");
        }
        Ok(state.counter)
    }

    async fn prediction(&self, id: PredictionId) -> Result<Prediction> {
        let state = self.state.lock().unwrap();
        if state.failing.contains(&id) {
            bail!("simulated fetch failure for prediction {}", id);
        }
        state
            .predictions
            .get(&id)
            .cloned()
            .with_context(|| format!("unknown prediction {}", id))
    }

    async fn user_prediction(&self, id: PredictionId, user: Address) -> Result<UserPrediction> {
        let state = self.state.lock().unwrap();
        Ok(state
            .user_predictions
            .get(&(id, user))
            .copied()
            .unwrap_or_default())
    }

    async fn prize_status(&self, id: PredictionId, user: Address) -> Result<PrizeStatus> {
        let state = self.state.lock().unwrap();
        Ok(state.prizes.get(&(id, user)).copied().unwrap_or_default())
    }

    async fn option_counts(&self, id: PredictionId) -> Result<(Vec<u64>, Vec<u32>)> {
        let state = self.state.lock().unwrap();
        let prediction = state
            .predictions
            .get(&id)
            .with_context(|| format!("unknown prediction {}", id))?;
        let mut counts = vec![0u64; prediction.options.len()];
        for (&(entry_id, _), user_prediction) in state.user_predictions.iter() {
            if entry_id == id && user_prediction.is_placed() {
                if let Some(count) = counts.get_mut(user_prediction.option as usize) {
                    *count += 1;
                }
            }
        }
        let total: u64 = counts.iter().sum();
        let percentages = counts
            .iter()
            .map(|count| {
                if total == 0 {
                    0
                } else {
                    (count * 10000 / total) as u32
                }
            })
            .collect();
        Ok((counts, percentages))
    }

    async fn user_stats(&self, user: Address) -> Result<UserStats> {
        let state = self.state.lock().unwrap();
        Ok(state.stats.get(&user).copied().unwrap_or_default())
    }

    async fn participated_predictions(&self, user: Address) -> Result<Vec<PredictionId>> {
        let state = self.state.lock().unwrap();
        if state.fail_participated {
            bail!("simulated participated-id lookup failure");
        }
        let mut ids: Vec<PredictionId> = state
            .user_predictions
            .iter()
            .filter(|(&(_, entry_user), user_prediction)| {
                entry_user == user && user_prediction.is_placed()
            })
            .map(|(&(id, _), _)| id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        Ok(self.state.lock().unwrap().leaderboard.clone())
    }

    async fn create_prediction(
        &self,
        from: Address,
        question: String,
        options: Vec<String>,
        entry_fee: Wei,
        end_time: DateTime<Utc>,
        resolution_time: DateTime<Utc>,
        initial_pool: Wei,
    ) -> Result<PredictionId> {
        let mut state = self.state.lock().unwrap();
        state.counter += 1;
        let id = state.counter;
        state.predictions.insert(
            id,
            Prediction {
                id,
                creator: from,
                question,
                options,
                entry_fee,
                prize_pool: initial_pool,
                end_time,
                resolution_time,
                resolved: false,
                winning_option: None,
                active: true,
                total_participants: 0,
            },
        );
        Ok(id)
    }

    async fn submit_prediction(
        &self,
        from: Address,
        id: PredictionId,
        option: u32,
        stake: Wei,
    ) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        let prediction = state
            .predictions
            .get_mut(&id)
            .with_context(|| format!("unknown prediction {}", id))?;
        prediction.prize_pool += stake;
        prediction.total_participants += 1;
        state.user_predictions.insert(
            (id, from),
            UserPrediction {
                option,
                placed_at: Some(Utc::now()),
                claimed: false,
            },
        );
        Ok(B256::with_last_byte(id as u8))
    }

    async fn resolve_prediction(
        &self,
        _from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256> {
        let mut state = self.state.lock().unwrap();
        let prediction = state
            .predictions
            .get_mut(&id)
            .with_context(|| format!("unknown prediction {}", id))?;
        prediction.resolved = true;
        prediction.winning_option = Some(winning_option);
        Ok(B256::with_last_byte(id as u8))
    }

    async fn emergency_resolve(
        &self,
        from: Address,
        id: PredictionId,
        winning_option: u32,
    ) -> Result<B256> {
        self.resolve_prediction(from, id, winning_option).await
    }
}

use std::collections::HashSet;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use futures_util::future::join_all;
use log::{debug, warn};

use crate::api::*;
use crate::config::Settings;
use crate::contract::PredictionMarket;
use crate::wallet::Wallet;

const ACTIVITY_FEED_LEN: usize = 10;

/// Where a prediction stands, seen from outside. Time and other people's
/// resolve transactions drive it, we only observe.
pub fn market_phase(prediction: &Prediction, now: DateTime<Utc>, grace: Duration) -> MarketPhase {
    if prediction.resolved {
        MarketPhase::Resolved
    } else if now > prediction.resolution_time + grace {
        MarketPhase::EmergencyEligible
    } else if now > prediction.end_time {
        MarketPhase::PendingResolution
    } else {
        MarketPhase::Active
    }
}

/// Status of a placed bet. Won/lost comes from comparing the chosen option
/// against the winning one, nothing else.
pub fn bet_status(
    prediction: &Prediction,
    user_prediction: &UserPrediction,
    now: DateTime<Utc>,
) -> BetStatus {
    if prediction.resolved {
        if prediction.winning_option == Some(user_prediction.option) {
            BetStatus::Won
        } else {
            BetStatus::Lost
        }
    } else if now > prediction.end_time {
        BetStatus::PendingResolution
    } else {
        BetStatus::Active
    }
}

/// Decides whether one prediction needs a resolution action from the viewer
/// and in which role. `None` means the viewer has no business resolving it.
pub fn classify_market(
    prediction: &Prediction,
    viewer: Address,
    participated: &HashSet<PredictionId>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Option<MarketToResolve> {
    let is_ended = now > prediction.end_time;
    if !is_ended || prediction.resolved || !prediction.active {
        return None;
    }
    let user_role = if prediction.creator == viewer {
        ResolveRole::Creator
    } else if participated.contains(&prediction.id) {
        ResolveRole::Participant
    } else {
        return None;
    };
    Some(MarketToResolve {
        id: prediction.id,
        question: prediction.question.clone(),
        options: prediction.options.clone(),
        total_participants: prediction.total_participants,
        prize_pool: prediction.prize_pool,
        end_time: prediction.end_time,
        resolution_time: prediction.resolution_time,
        is_emergency: now > prediction.resolution_time + grace,
        user_role,
    })
}

/// Runs [`classify_market`] over a window of records, keeping their order.
/// Callers pass records newest first and that is the order they get back.
pub fn classify_markets(
    records: &[Prediction],
    viewer: Address,
    participated: &HashSet<PredictionId>,
    now: DateTime<Utc>,
    grace: Duration,
) -> Vec<MarketToResolve> {
    records
        .iter()
        .filter_map(|record| classify_market(record, viewer, participated, now, grace))
        .collect()
}

/// Ids the resolution scan visits: the most recent `window` ids, newest
/// first, never below id 1.
pub fn scan_window(counter: u64, window: u64) -> impl Iterator<Item = PredictionId> {
    let lower = counter.saturating_sub(window).max(1);
    (lower..=counter).rev()
}

/// Pre-flight checks matching what the contract enforces, so bad requests
/// never reach the chain. Returns the effective resolution time (two hours
/// after the end when none was given).
pub fn validate_new_prediction(
    request: &NewPredictionRequest,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    if request.question.trim().is_empty() {
        bail!("Question cannot be empty");
    }
    let options = request
        .options
        .iter()
        .filter(|option| !option.trim().is_empty())
        .count();
    if options < 2 {
        bail!("At least 2 options are required");
    }
    if request.entry_fee == Wei::ZERO {
        bail!("Entry fee must be greater than 0");
    }
    if request.initial_prize_pool == Wei::ZERO {
        bail!("Initial prize pool must be greater than 0");
    }
    if request.end_time <= now {
        bail!("End time must be in the future");
    }
    if request.end_time <= now + Duration::hours(1) {
        bail!("End time must be at least 1 hour from now");
    }
    let resolution_time = request
        .resolution_time
        .unwrap_or(request.end_time + Duration::hours(2));
    if resolution_time <= request.end_time {
        bail!("Resolution time must be after end time");
    }
    if resolution_time <= request.end_time + Duration::hours(1) {
        bail!("Resolution time must be at least 1 hour after end time");
    }
    Ok(resolution_time)
}

pub fn sort_markets(markets: &mut [MarketOverview], sort: MarketSort) {
    match sort {
        MarketSort::Popular => markets.sort_by(|a, b| {
            b.prediction
                .total_participants
                .cmp(&a.prediction.total_participants)
                .then(b.prediction.id.cmp(&a.prediction.id))
        }),
        MarketSort::ClosingSoon => markets.sort_by(|a, b| {
            a.prediction
                .end_time
                .cmp(&b.prediction.end_time)
                .then(b.prediction.id.cmp(&a.prediction.id))
        }),
        MarketSort::Newest => markets.sort_by(|a, b| b.prediction.id.cmp(&a.prediction.id)),
        MarketSort::Volume => markets.sort_by(|a, b| {
            b.prediction
                .prize_pool
                .cmp(&a.prediction.prize_pool)
                .then(b.prediction.id.cmp(&a.prediction.id))
        }),
    }
}

pub fn achievements(stats: &UserStats) -> Vec<Achievement> {
    let one_token = Wei::from(10u64).pow(Wei::from(18u64));
    vec![
        Achievement {
            title: "Streak Master".to_string(),
            description: format!("Achieved a {} prediction streak", stats.longest_streak),
            unlocked: stats.longest_streak >= 3,
        },
        Achievement {
            title: "Sharp Predictor".to_string(),
            description: format!("{:.1}% accuracy rate", stats.accuracy_bps as f64 / 100.0),
            unlocked: stats.accuracy_bps >= 7000 && stats.total_predictions >= 5,
        },
        Achievement {
            title: "Active Trader".to_string(),
            description: format!("Made {} predictions", stats.total_predictions),
            unlocked: stats.total_predictions >= 10,
        },
        Achievement {
            title: "Point Collector".to_string(),
            description: format!("Earned {} points", stats.total_points),
            unlocked: stats.total_points >= 100,
        },
        Achievement {
            title: "Big Winner".to_string(),
            description: format!("Total winnings: {}", format_token(stats.total_winnings)),
            unlocked: stats.total_winnings >= one_token,
        },
        Achievement {
            title: "First Steps".to_string(),
            description: "Made your first prediction".to_string(),
            unlocked: stats.total_predictions >= 1,
        },
    ]
}

/// Latest bets as a feed. Won bets show the prize, everything else the fee.
pub fn recent_activity(bets: &[BetOverview]) -> Vec<ActivityEntry> {
    bets.iter()
        .take(ACTIVITY_FEED_LEN)
        .map(|bet| {
            let (kind, amount) = match bet.status {
                BetStatus::Won => (
                    ActivityKind::BetWon,
                    bet.prize_amount.unwrap_or(bet.entry_fee),
                ),
                BetStatus::Lost => (ActivityKind::BetLost, bet.entry_fee),
                _ => (ActivityKind::BetPlaced, bet.entry_fee),
            };
            ActivityEntry {
                prediction: bet.prediction,
                kind,
                question: bet.question.clone(),
                option_label: bet.option_label.clone(),
                amount,
                timestamp: bet.placed_at,
            }
        })
        .collect()
}

/// The application core: all flows the pages drive, over the contract and
/// wallet collaborators. Nothing here persists anything.
pub struct FunPredict {
    contract: Arc<Box<dyn PredictionMarket + Send + Sync>>,
    wallet: Arc<Box<dyn Wallet + Send + Sync>>,
    settings: Settings,
}

impl FunPredict {
    pub fn new(
        contract: Box<dyn PredictionMarket + Send + Sync>,
        wallet: Box<dyn Wallet + Send + Sync>,
        settings: Settings,
    ) -> Self {
        Self {
            contract: Arc::new(contract),
            wallet: Arc::new(wallet),
            settings,
        }
    }

    async fn signer(&self) -> Result<Address> {
        let accounts = self
            .wallet
            .accounts()
            .await
            .context("could not get account access")?;
        accounts
            .first()
            .copied()
            .context("the wallet exposes no accounts")
    }

    pub async fn markets(&self, sort: MarketSort, all: bool) -> Result<Vec<MarketOverview>> {
        let counter = self
            .contract
            .prediction_count()
            .await
            .context("failed to get the prediction count")?;
        let now = Utc::now();
        let fetches = (1..=counter).rev().map(|id| self.fetch_overview(id, now));
        let mut markets: Vec<MarketOverview> =
            join_all(fetches).await.into_iter().flatten().collect();
        if !all {
            markets.retain(|market| market.phase == MarketPhase::Active && market.prediction.active);
        }
        sort_markets(&mut markets, sort);
        Ok(markets)
    }

    pub async fn market_detail(&self, id: PredictionId) -> Result<MarketOverview> {
        self.try_fetch_overview(id, Utc::now()).await
    }

    async fn fetch_overview(&self, id: PredictionId, now: DateTime<Utc>) -> Option<MarketOverview> {
        match self.try_fetch_overview(id, now).await {
            Ok(market) => Some(market),
            Err(e) => {
                warn!("skipping prediction {}: {:#}", id, e);
                None
            }
        }
    }

    async fn try_fetch_overview(
        &self,
        id: PredictionId,
        now: DateTime<Utc>,
    ) -> Result<MarketOverview> {
        let prediction = self.contract.prediction(id).await?;
        let (counts, percentages) = self.contract.option_counts(id).await?;
        let options = prediction
            .options
            .iter()
            .enumerate()
            .map(|(index, label)| OptionStats {
                label: label.clone(),
                count: counts.get(index).copied().unwrap_or(0),
                percentage_bps: percentages.get(index).copied().unwrap_or(0),
            })
            .collect();
        let phase = market_phase(&prediction, now, self.settings.emergency_grace());
        Ok(MarketOverview {
            prediction,
            options,
            phase,
        })
    }

    pub async fn create_prediction(&self, request: NewPredictionRequest) -> Result<PredictionId> {
        let resolution_time = validate_new_prediction(&request, Utc::now())?;
        let from = self.signer().await?;
        let balance = self.wallet.balance(from).await?;
        if balance < request.initial_prize_pool {
            bail!(
                "Insufficient balance: funding the prize pool takes {} but the wallet holds {}",
                format_token(request.initial_prize_pool),
                format_token(balance)
            );
        }
        let options = request
            .options
            .iter()
            .map(|option| option.trim().to_string())
            .filter(|option| !option.is_empty())
            .collect();
        let id = self
            .contract
            .create_prediction(
                from,
                request.question.trim().to_string(),
                options,
                request.entry_fee,
                request.end_time,
                resolution_time,
                request.initial_prize_pool,
            )
            .await?;
        debug!("created prediction {}", id);
        Ok(id)
    }

    pub async fn submit_prediction(&self, request: SubmitPredictionRequest) -> Result<B256> {
        let now = Utc::now();
        let prediction = self.contract.prediction(request.prediction).await?;
        if !prediction.active {
            bail!("Prediction {} is inactive", prediction.id);
        }
        match market_phase(&prediction, now, self.settings.emergency_grace()) {
            MarketPhase::Active => {}
            phase => bail!(
                "Prediction {} is closed for entries ({})",
                prediction.id,
                phase
            ),
        }
        if request.option as usize >= prediction.options.len() {
            bail!(
                "Option index {} is out of range, the prediction has {} options",
                request.option,
                prediction.options.len()
            );
        }
        if request.amount != prediction.entry_fee {
            bail!(
                "Entry fee must be exactly {}",
                format_token(prediction.entry_fee)
            );
        }
        let from = self.signer().await?;
        let existing = self
            .contract
            .user_prediction(request.prediction, from)
            .await?;
        if existing.is_placed() {
            bail!("You have already made a prediction on this market");
        }
        let balance = self.wallet.balance(from).await?;
        if balance < prediction.entry_fee {
            bail!(
                "Insufficient balance: the entry fee is {} but the wallet holds {}",
                format_token(prediction.entry_fee),
                format_token(balance)
            );
        }
        self.contract
            .submit_prediction(from, request.prediction, request.option, request.amount)
            .await
    }

    /// The creator path. Emergency resolution takes over once the grace
    /// window has opened.
    pub async fn resolve(&self, id: PredictionId, winning_option: u32) -> Result<B256> {
        let now = Utc::now();
        let prediction = self.contract.prediction(id).await?;
        let from = self.signer().await?;
        self.check_resolvable(&prediction, winning_option, now)?;
        if prediction.creator != from {
            bail!("Only the creator can resolve prediction {}", id);
        }
        if now > prediction.resolution_time + self.settings.emergency_grace() {
            bail!(
                "The emergency window for prediction {} is open, use emergency-resolve",
                id
            );
        }
        self.contract
            .resolve_prediction(from, id, winning_option)
            .await
    }

    /// Anyone may call this once the creator has been absent for the whole
    /// grace period.
    pub async fn emergency_resolve(&self, id: PredictionId, winning_option: u32) -> Result<B256> {
        let now = Utc::now();
        let prediction = self.contract.prediction(id).await?;
        let from = self.signer().await?;
        self.check_resolvable(&prediction, winning_option, now)?;
        let opens = prediction.resolution_time + self.settings.emergency_grace();
        if now <= opens {
            bail!(
                "Emergency resolution for prediction {} opens at {}",
                id,
                opens
            );
        }
        self.contract
            .emergency_resolve(from, id, winning_option)
            .await
    }

    fn check_resolvable(
        &self,
        prediction: &Prediction,
        winning_option: u32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if prediction.resolved {
            bail!("Prediction {} is already resolved", prediction.id);
        }
        if !prediction.active {
            bail!("Prediction {} is inactive", prediction.id);
        }
        if now <= prediction.end_time {
            bail!("Prediction {} has not ended yet", prediction.id);
        }
        if winning_option as usize >= prediction.options.len() {
            bail!(
                "Option index {} is out of range, the prediction has {} options",
                winning_option,
                prediction.options.len()
            );
        }
        Ok(())
    }

    /// The resolution scan. Counter and participated-set failures abort the
    /// whole refresh, a single record failing only costs that record.
    pub async fn markets_to_resolve(&self, viewer: Address) -> Result<Vec<MarketToResolve>> {
        let now = Utc::now();
        let counter = self
            .contract
            .prediction_count()
            .await
            .context("failed to get the prediction count")?;
        let participated: HashSet<PredictionId> = self
            .contract
            .participated_predictions(viewer)
            .await
            .context("failed to get participated predictions")?
            .into_iter()
            .collect();
        let ids: Vec<PredictionId> =
            scan_window(counter, self.settings.resolution_scan_window).collect();
        let fetches = ids.iter().map(|&id| self.contract.prediction(id));
        let mut records = Vec::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(join_all(fetches).await) {
            match result {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping prediction {} in the resolution scan: {:#}", id, e),
            }
        }
        Ok(classify_markets(
            &records,
            viewer,
            &participated,
            now,
            self.settings.emergency_grace(),
        ))
    }

    pub async fn dashboard(&self, viewer: Option<Address>) -> Result<DashboardResponse> {
        let viewer = match viewer {
            Some(viewer) => viewer,
            None => self.signer().await?,
        };
        let now = Utc::now();
        let stats = self
            .contract
            .user_stats(viewer)
            .await
            .context("failed to get user stats")?;
        let balance = self.wallet.balance(viewer).await?;
        let participated = self
            .contract
            .participated_predictions(viewer)
            .await
            .context("failed to get participated predictions")?;
        let fetches = participated.iter().map(|&id| self.fetch_bet(id, viewer, now));
        let mut bets: Vec<BetOverview> = join_all(fetches).await.into_iter().flatten().collect();
        bets.sort_by(|a, b| {
            b.placed_at
                .cmp(&a.placed_at)
                .then(b.prediction.cmp(&a.prediction))
        });
        let unclaimed_prizes = bets
            .iter()
            .filter(|bet| bet.status == BetStatus::Won && !bet.claimed)
            .count();
        let closing_soon = bets
            .iter()
            .filter(|bet| {
                bet.status == BetStatus::Active && bet.end_time <= now + Duration::hours(24)
            })
            .count();
        let activity = recent_activity(&bets);
        let achievements = achievements(&stats);
        let to_resolve = self.markets_to_resolve(viewer).await?;
        Ok(DashboardResponse {
            stats,
            balance,
            bets,
            unclaimed_prizes,
            closing_soon,
            activity,
            achievements,
            to_resolve,
        })
    }

    async fn fetch_bet(
        &self,
        id: PredictionId,
        viewer: Address,
        now: DateTime<Utc>,
    ) -> Option<BetOverview> {
        match self.try_fetch_bet(id, viewer, now).await {
            Ok(bet) => bet,
            Err(e) => {
                warn!("skipping bet on prediction {}: {:#}", id, e);
                None
            }
        }
    }

    async fn try_fetch_bet(
        &self,
        id: PredictionId,
        viewer: Address,
        now: DateTime<Utc>,
    ) -> Result<Option<BetOverview>> {
        let prediction = self.contract.prediction(id).await?;
        let user_prediction = self.contract.user_prediction(id, viewer).await?;
        let placed_at = match user_prediction.placed_at {
            Some(placed_at) => placed_at,
            // The participated list said yes but the record says no bet.
            None => return Ok(None),
        };
        let prize = self.contract.prize_status(id, viewer).await?;
        let status = bet_status(&prediction, &user_prediction, now);
        Ok(Some(BetOverview {
            prediction: id,
            question: prediction.question,
            option: user_prediction.option,
            option_label: prediction
                .options
                .get(user_prediction.option as usize)
                .cloned()
                .unwrap_or_default(),
            entry_fee: prediction.entry_fee,
            placed_at,
            end_time: prediction.end_time,
            status,
            prize_amount: prize.has_won.then_some(prize.prize_amount),
            claimed: user_prediction.claimed,
            total_participants: prediction.total_participants,
        }))
    }

    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.contract.leaderboard().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::contract::TestMarket;
    use crate::wallet::TestWallet;

    fn address(last: u8) -> Address {
        Address::with_last_byte(last)
    }

    fn grace() -> Duration {
        Duration::days(7)
    }

    fn settings() -> Settings {
        Settings {
            rpc_url: String::new(),
            contract: Address::ZERO,
            resolution_scan_window: 50,
            emergency_grace_secs: 7 * 24 * 3600,
            receipt_poll_ms: 1,
            receipt_timeout_secs: 1,
        }
    }

    fn prediction(id: PredictionId, creator: Address, now: DateTime<Utc>) -> Prediction {
        // Ended an hour ago, resolution due in an hour.
        Prediction {
            id,
            creator,
            question: format!("Question {}?", id),
            options: vec!["Yes".to_string(), "No".to_string()],
            entry_fee: Wei::from(1000u64),
            prize_pool: Wei::from(5000u64),
            end_time: now - Duration::hours(1),
            resolution_time: now + Duration::hours(1),
            resolved: false,
            winning_option: None,
            active: true,
            total_participants: 2,
        }
    }

    fn app(market: TestMarket, wallet: TestWallet) -> FunPredict {
        FunPredict::new(Box::new(market), Box::new(wallet), settings())
    }

    #[test]
    fn classifier_skips_running_resolved_and_inactive_markets() {
        let now = Utc::now();
        let creator = address(1);
        let participated = HashSet::new();

        let mut running = prediction(1, creator, now);
        running.end_time = now + Duration::hours(1);
        assert_eq!(
            classify_market(&running, creator, &participated, now, grace()),
            None
        );

        let mut resolved = prediction(2, creator, now);
        resolved.resolved = true;
        resolved.winning_option = Some(0);
        assert_eq!(
            classify_market(&resolved, creator, &participated, now, grace()),
            None
        );

        let mut inactive = prediction(3, creator, now);
        inactive.active = false;
        assert_eq!(
            classify_market(&inactive, creator, &participated, now, grace()),
            None
        );
    }

    #[test]
    fn classifier_assigns_roles() {
        let now = Utc::now();
        let creator = address(1);
        let participant = address(2);
        let unrelated = address(3);
        let record = prediction(7, creator, now);
        let participated: HashSet<PredictionId> = [7].into_iter().collect();

        let as_creator = classify_market(&record, creator, &participated, now, grace()).unwrap();
        assert_eq!(as_creator.user_role, ResolveRole::Creator);

        let as_participant =
            classify_market(&record, participant, &participated, now, grace()).unwrap();
        assert_eq!(as_participant.user_role, ResolveRole::Participant);

        let empty = HashSet::new();
        assert_eq!(
            classify_market(&record, unrelated, &empty, now, grace()),
            None
        );
    }

    #[test]
    fn viewer_comparison_ignores_address_casing() {
        let now = Utc::now();
        let lower: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
            .parse()
            .unwrap();
        let checksummed: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045"
            .parse()
            .unwrap();
        let record = prediction(1, lower, now);
        let participated = HashSet::new();
        let entry = classify_market(&record, checksummed, &participated, now, grace()).unwrap();
        assert_eq!(entry.user_role, ResolveRole::Creator);
    }

    #[test]
    fn creator_role_wins_even_when_participating() {
        let now = Utc::now();
        let creator = address(1);
        let record = prediction(7, creator, now);
        let participated: HashSet<PredictionId> = [7].into_iter().collect();
        let entry = classify_market(&record, creator, &participated, now, grace()).unwrap();
        assert_eq!(entry.user_role, ResolveRole::Creator);
    }

    #[test]
    fn emergency_opens_strictly_after_the_grace_period() {
        let now = Utc::now();
        let creator = address(1);
        let participated = HashSet::new();

        // Exactly at the threshold: not yet an emergency.
        let mut record = prediction(1, creator, now);
        record.resolution_time = now - grace();
        let entry = classify_market(&record, creator, &participated, now, grace()).unwrap();
        assert!(!entry.is_emergency);

        // One second past it: emergency.
        record.resolution_time = now - grace() - Duration::seconds(1);
        let entry = classify_market(&record, creator, &participated, now, grace()).unwrap();
        assert!(entry.is_emergency);
    }

    #[test]
    fn bet_status_covers_every_case() {
        let now = Utc::now();
        let placed = UserPrediction {
            option: 1,
            placed_at: Some(now - Duration::hours(2)),
            claimed: false,
        };

        let mut record = prediction(1, address(1), now);
        record.resolved = true;
        record.winning_option = Some(1);
        assert_eq!(bet_status(&record, &placed, now), BetStatus::Won);

        record.winning_option = Some(0);
        assert_eq!(bet_status(&record, &placed, now), BetStatus::Lost);

        record.resolved = false;
        record.winning_option = None;
        assert_eq!(bet_status(&record, &placed, now), BetStatus::PendingResolution);

        record.end_time = now + Duration::hours(1);
        assert_eq!(bet_status(&record, &placed, now), BetStatus::Active);
    }

    #[test]
    fn phase_follows_the_record_lifecycle() {
        let now = Utc::now();
        let mut record = prediction(1, address(1), now);

        record.end_time = now + Duration::hours(1);
        assert_eq!(market_phase(&record, now, grace()), MarketPhase::Active);

        record.end_time = now - Duration::hours(1);
        assert_eq!(
            market_phase(&record, now, grace()),
            MarketPhase::PendingResolution
        );

        record.resolution_time = now - grace() - Duration::seconds(1);
        assert_eq!(
            market_phase(&record, now, grace()),
            MarketPhase::EmergencyEligible
        );

        record.resolved = true;
        record.winning_option = Some(0);
        assert_eq!(market_phase(&record, now, grace()), MarketPhase::Resolved);
    }

    #[test]
    fn scan_window_clamps_at_id_one() {
        let ids: Vec<PredictionId> = scan_window(5, 50).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);

        let ids: Vec<PredictionId> = scan_window(0, 50).collect();
        assert!(ids.is_empty());

        let ids: Vec<PredictionId> = scan_window(100, 50).collect();
        assert_eq!(ids.first(), Some(&100));
        assert_eq!(ids.last(), Some(&50));
    }

    #[tokio::test]
    async fn scan_returns_newest_first_and_covers_short_histories() {
        let now = Utc::now();
        let creator = address(1);
        let market = TestMarket::default();
        for id in 1..=5 {
            market.add_prediction(prediction(id, creator, now));
        }
        let app = app(market, TestWallet::default());
        let entries = app.markets_to_resolve(creator).await.unwrap();
        let ids: Vec<PredictionId> = entries.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn failing_record_is_skipped_not_fatal() {
        let now = Utc::now();
        let creator = address(1);
        let market = TestMarket::default();
        for id in 1..=3 {
            market.add_prediction(prediction(id, creator, now));
        }
        market.fail_on(2);
        let app = app(market, TestWallet::default());
        let entries = app.markets_to_resolve(creator).await.unwrap();
        let ids: Vec<PredictionId> = entries.iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[tokio::test]
    async fn counter_or_participated_failure_aborts_the_scan() {
        let now = Utc::now();
        let creator = address(1);

        let market = TestMarket::default();
        market.add_prediction(prediction(1, creator, now));
        market.fail_counter();
        let app_counter = app(market, TestWallet::default());
        assert!(app_counter.markets_to_resolve(creator).await.is_err());

        let market = TestMarket::default();
        market.add_prediction(prediction(1, creator, now));
        market.fail_participated();
        let app_participated = app(market, TestWallet::default());
        assert!(app_participated.markets_to_resolve(creator).await.is_err());
    }

    #[tokio::test]
    async fn classifier_is_idempotent_over_an_unchanged_snapshot() {
        let now = Utc::now();
        let creator = address(1);
        let market = TestMarket::default();
        for id in 1..=4 {
            market.add_prediction(prediction(id, creator, now));
        }
        let app = app(market, TestWallet::default());
        let first = app.markets_to_resolve(creator).await.unwrap();
        let second = app.markets_to_resolve(creator).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn end_time_boundary_is_exclusive() {
        let now = Utc::now();
        let request = NewPredictionRequest {
            question: "Will it compile?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            entry_fee: Wei::from(1u64),
            initial_prize_pool: Wei::from(1u64),
            end_time: now + Duration::seconds(3600),
            resolution_time: None,
        };
        let rejected = validate_new_prediction(&request, now);
        assert!(rejected
            .unwrap_err()
            .to_string()
            .contains("at least 1 hour"));

        let accepted = NewPredictionRequest {
            end_time: now + Duration::seconds(3601),
            ..request
        };
        let resolution = validate_new_prediction(&accepted, now).unwrap();
        assert_eq!(resolution, accepted.end_time + Duration::hours(2));
    }

    #[test]
    fn invalid_requests_never_reach_the_chain() {
        let now = Utc::now();
        let valid = NewPredictionRequest {
            question: "A question".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            entry_fee: Wei::from(1u64),
            initial_prize_pool: Wei::from(1u64),
            end_time: now + Duration::hours(2),
            resolution_time: None,
        };
        assert!(validate_new_prediction(&valid, now).is_ok());

        let empty_question = NewPredictionRequest {
            question: "   ".to_string(),
            ..valid.clone()
        };
        assert!(validate_new_prediction(&empty_question, now).is_err());

        let one_option = NewPredictionRequest {
            options: vec!["Yes".to_string(), "  ".to_string()],
            ..valid.clone()
        };
        assert!(validate_new_prediction(&one_option, now).is_err());

        let free_entry = NewPredictionRequest {
            entry_fee: Wei::ZERO,
            ..valid.clone()
        };
        assert!(validate_new_prediction(&free_entry, now).is_err());

        let short_resolution = NewPredictionRequest {
            resolution_time: Some(valid.end_time + Duration::minutes(30)),
            ..valid.clone()
        };
        assert!(validate_new_prediction(&short_resolution, now).is_err());

        let past_end = NewPredictionRequest {
            end_time: now - Duration::hours(1),
            ..valid
        };
        assert!(validate_new_prediction(&past_end, now).is_err());
    }

    #[tokio::test]
    async fn create_flow_reports_the_new_id() {
        let creator = address(1);
        let wallet = TestWallet::default();
        wallet.fund(creator, Wei::from(10u64).pow(Wei::from(18u64)));
        let app = app(TestMarket::default(), wallet);

        let request = NewPredictionRequest {
            question: "Will SOL hit $2,000 by 01-Jan-2027?".to_string(),
            options: vec!["Yes".to_string(), "No".to_string()],
            entry_fee: Wei::from(1000u64),
            initial_prize_pool: Wei::from(5000u64),
            end_time: Utc::now() + Duration::hours(2),
            resolution_time: None,
        };
        let id = app.create_prediction(request.clone()).await.unwrap();
        assert_eq!(id, 1);

        let detail = app.market_detail(id).await.unwrap();
        assert_eq!(detail.prediction.creator, creator);
        assert_eq!(
            detail.prediction.resolution_time,
            request.end_time + Duration::hours(2)
        );
        assert_eq!(detail.phase, MarketPhase::Active);
    }

    #[tokio::test]
    async fn submissions_enforce_exact_fee_and_no_duplicates() {
        let now = Utc::now();
        let creator = address(1);
        let bettor = address(2);
        let market = TestMarket::default();
        let mut open = prediction(1, creator, now);
        open.end_time = now + Duration::hours(3);
        market.add_prediction(open);
        let wallet = TestWallet::default();
        wallet.fund(bettor, Wei::from(10_000u64));
        let app = app(market, wallet);

        let wrong_amount = SubmitPredictionRequest {
            prediction: 1,
            option: 0,
            amount: Wei::from(999u64),
        };
        let error = app.submit_prediction(wrong_amount).await.unwrap_err();
        assert!(error.to_string().contains("exactly"));

        let request = SubmitPredictionRequest {
            prediction: 1,
            option: 0,
            amount: Wei::from(1000u64),
        };
        app.submit_prediction(request.clone()).await.unwrap();
        let error = app.submit_prediction(request).await.unwrap_err();
        assert!(error.to_string().contains("already"));
    }

    #[tokio::test]
    async fn resolve_paths_respect_the_emergency_window() {
        let now = Utc::now();
        let creator = address(1);
        let stranger = address(2);

        // Standard path: creator only, before the window opens.
        let market = TestMarket::default();
        market.add_prediction(prediction(1, creator, now));
        let wallet = TestWallet::default();
        wallet.fund(stranger, Wei::from(1u64));
        let app_stranger = app(market, wallet);
        let error = app_stranger.resolve(1, 0).await.unwrap_err();
        assert!(error.to_string().contains("creator"));
        let error = app_stranger.emergency_resolve(1, 0).await.unwrap_err();
        assert!(error.to_string().contains("opens at"));

        // Emergency path: anyone, once the creator sat out the grace period.
        let market = TestMarket::default();
        let mut stale = prediction(2, creator, now);
        stale.end_time = now - Duration::days(9);
        stale.resolution_time = now - grace() - Duration::seconds(1);
        market.add_prediction(stale);
        let wallet = TestWallet::default();
        wallet.fund(stranger, Wei::from(1u64));
        let app_stranger = app(market, wallet);
        app_stranger.emergency_resolve(2, 1).await.unwrap();
        let resolved = app_stranger.market_detail(2).await.unwrap();
        assert!(resolved.prediction.resolved);
        assert_eq!(resolved.prediction.winning_option, Some(1));
    }

    #[test]
    fn market_sorting_orders_are_deterministic() {
        let now = Utc::now();
        let overview = |id: PredictionId, participants: u64, pool: u64, end: DateTime<Utc>| {
            let mut record = prediction(id, address(1), now);
            record.total_participants = participants;
            record.prize_pool = Wei::from(pool);
            record.end_time = end;
            MarketOverview {
                prediction: record,
                options: vec![],
                phase: MarketPhase::Active,
            }
        };
        let mut markets = vec![
            overview(1, 5, 100, now + Duration::hours(3)),
            overview(2, 9, 50, now + Duration::hours(1)),
            overview(3, 5, 300, now + Duration::hours(2)),
        ];

        sort_markets(&mut markets, MarketSort::Popular);
        let ids: Vec<u64> = markets.iter().map(|m| m.prediction.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        sort_markets(&mut markets, MarketSort::ClosingSoon);
        let ids: Vec<u64> = markets.iter().map(|m| m.prediction.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        sort_markets(&mut markets, MarketSort::Newest);
        let ids: Vec<u64> = markets.iter().map(|m| m.prediction.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        sort_markets(&mut markets, MarketSort::Volume);
        let ids: Vec<u64> = markets.iter().map(|m| m.prediction.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn dashboard_composes_bets_and_the_resolution_banner() {
        let now = Utc::now();
        let creator = address(1);
        let bettor = address(2);
        let market = TestMarket::default();

        // One resolved market the bettor won, one still pending.
        let mut won = prediction(1, creator, now);
        won.resolved = true;
        won.winning_option = Some(0);
        market.add_prediction(won);
        market.add_user_prediction(
            1,
            bettor,
            UserPrediction {
                option: 0,
                placed_at: Some(now - Duration::days(2)),
                claimed: false,
            },
        );
        market.add_prize(
            1,
            bettor,
            PrizeStatus {
                has_won: true,
                prize_amount: Wei::from(2000u64),
                claimed: false,
            },
        );

        market.add_prediction(prediction(2, creator, now));
        market.add_user_prediction(
            2,
            bettor,
            UserPrediction {
                option: 1,
                placed_at: Some(now - Duration::days(1)),
                claimed: false,
            },
        );
        market.set_stats(
            bettor,
            UserStats {
                total_predictions: 2,
                correct_predictions: 1,
                current_streak: 1,
                longest_streak: 1,
                total_winnings: Wei::from(2000u64),
                accuracy_bps: 5000,
                has_streak_saver: false,
                total_points: 30,
            },
        );
        let wallet = TestWallet::default();
        wallet.fund(bettor, Wei::from(500u64));
        let app = app(market, wallet);

        let dashboard = app.dashboard(Some(bettor)).await.unwrap();
        assert_eq!(dashboard.bets.len(), 2);
        // Newest placement first.
        assert_eq!(dashboard.bets[0].prediction, 2);
        assert_eq!(dashboard.bets[0].status, BetStatus::PendingResolution);
        assert_eq!(dashboard.bets[1].status, BetStatus::Won);
        assert_eq!(dashboard.unclaimed_prizes, 1);
        assert_eq!(dashboard.activity.len(), 2);
        assert_eq!(dashboard.activity[0].kind, ActivityKind::BetPlaced);
        assert_eq!(dashboard.activity[1].kind, ActivityKind::BetWon);
        assert_eq!(dashboard.activity[1].amount, Wei::from(2000u64));

        // The pending market is the bettor's to chase as a participant.
        assert_eq!(dashboard.to_resolve.len(), 1);
        assert_eq!(dashboard.to_resolve[0].id, 2);
        assert_eq!(dashboard.to_resolve[0].user_role, ResolveRole::Participant);
    }

    #[test]
    fn achievements_unlock_at_their_thresholds() {
        let fresh = achievements(&UserStats::default());
        assert!(fresh.iter().all(|achievement| !achievement.unlocked));

        let veteran = UserStats {
            total_predictions: 12,
            correct_predictions: 10,
            current_streak: 4,
            longest_streak: 6,
            total_winnings: Wei::from(10u64).pow(Wei::from(18u64)),
            accuracy_bps: 8333,
            has_streak_saver: true,
            total_points: 150,
        };
        let unlocked = achievements(&veteran);
        assert!(unlocked.iter().all(|achievement| achievement.unlocked));
    }
}

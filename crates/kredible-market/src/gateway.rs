//! Loan matching gateway
//!
//! Orchestrates the market's state machines:
//!
//! ```text
//! LoanRequest:   pending -> funded -> repaid
//!                   |          `---> defaulted
//!                   `-> cancelled
//! LenderOffer:   active -> inactive          (one-way, on match)
//! AvailableLoan: available -> taken
//! LoanMatch:     active -> repaid | defaulted
//! ```
//!
//! Validation happens before any write, and every transition is a
//! conditional update on the record's status: two racing callers cannot
//! both win, and the loser observes the new state and fails with no side
//! effects. A won transition creates the match aggregate, both parties'
//! transaction records, and the counterparty stat updates.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument, warn};

use kredible_common::{
    collateral_for, AvailabilityStatus, AvailableLoan, CreditTier, KredibleError, LenderOffer,
    LoanMatch, LoanRequest, LoanTransaction, MatchSource, MatchStatus, OfferStatus, RequestStatus,
    Result, User, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE,
};
use kredible_score::CreditScoreEngine;
use kredible_store::Ledger;

use crate::config::MarketConfig;
use crate::feed::PriceFeed;

/// Market operations over the platform ledger
pub struct LoanMatchingGateway {
    ledger: Ledger,
    feed: Arc<dyn PriceFeed>,
    config: MarketConfig,
    scorer: Option<CreditScoreEngine>,
}

impl LoanMatchingGateway {
    pub fn new(ledger: Ledger, feed: Arc<dyn PriceFeed>) -> Self {
        Self {
            ledger,
            feed,
            config: MarketConfig::default(),
            scorer: None,
        }
    }

    /// Override the market configuration
    pub fn with_config(mut self, config: MarketConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a scoring engine; the acting party's score is then refreshed
    /// (stale-guarded) after each market operation
    pub fn with_scorer(mut self, scorer: CreditScoreEngine) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Submit a borrower's ask. Collateral is sized from the borrower's
    /// tier LTV and the current feed price, and stays fixed afterwards.
    #[instrument(skip(self))]
    pub async fn create_loan_request(
        &self,
        borrower: &str,
        amount: Decimal,
        duration_days: u32,
    ) -> Result<LoanRequest> {
        if amount <= Decimal::ZERO {
            return Err(KredibleError::invalid_input("loan amount must be positive"));
        }
        if duration_days == 0 {
            return Err(KredibleError::invalid_input("duration must be positive"));
        }

        let mut user = self.require_user(borrower).await?;
        let tier = CreditTier::for_score(user.credit_score);
        let price = self.feed.price().await?;
        let collateral = collateral_for(amount, tier.ltv(), price)?;

        let request = LoanRequest::new(
            borrower,
            user.credit_score,
            amount,
            collateral,
            tier.ltv(),
            tier.apr(),
            duration_days,
        );
        self.ledger.loan_requests.insert(&request).await?;

        user.loan_opened();
        self.save_user(&user).await?;
        self.refresh_score(borrower).await;

        debug!(request = %request.id, tier = %tier, "loan request created");
        Ok(request)
    }

    /// Fund a pending request as a lender.
    ///
    /// The pending -> funded swap is the race guard: exactly one funder
    /// wins, and only the winner creates the match, the transaction
    /// records, and the stat updates.
    #[instrument(skip(self))]
    pub async fn fund_loan(&self, funder: &str, request_id: &str) -> Result<LoanMatch> {
        let mut funder_user = self.require_user(funder).await?;
        let request = self
            .ledger
            .loan_requests
            .get(request_id)
            .await?
            .ok_or_else(|| KredibleError::not_found("loan request", request_id))?;
        if request.borrower == funder {
            return Err(KredibleError::invalid_input(
                "cannot fund your own loan request",
            ));
        }

        let m = LoanMatch::new(
            MatchSource::Request {
                id: request.id.clone(),
            },
            funder,
            request.borrower.clone(),
            request.amount,
            request.apr,
            request.duration_days,
            Utc::now(),
        );

        let won = self
            .ledger
            .loan_requests
            .update_if(
                request_id,
                "status",
                serde_json::to_value(RequestStatus::Pending)?,
                json!({
                    "status": RequestStatus::Funded,
                    "funded_by": funder,
                    "due_date": m.due_date,
                }),
            )
            .await?;
        if !won {
            return Err(KredibleError::invalid_state(
                "loan request",
                request_id,
                "only a pending request can be funded",
            ));
        }

        self.ledger.loan_matches.insert(&m).await?;

        let borrower_name = self.display_name(&request.borrower).await;
        self.ledger
            .lending_transactions
            .insert(&LoanTransaction::lent(&m, borrower_name))
            .await?;
        self.ledger
            .borrowing_transactions
            .insert(&LoanTransaction::borrowed(&m, funder_user.name.clone()))
            .await?;

        funder_user.record_lent(request.amount)?;
        funder_user.loan_opened();
        self.save_user(&funder_user).await?;
        self.refresh_score(funder).await;

        debug!(
            request = %request_id,
            loan_match = %m.id,
            interest = %m.interest(),
            "loan funded"
        );
        Ok(m)
    }

    /// Take a market listing as a borrower
    #[instrument(skip(self))]
    pub async fn take_loan(&self, taker: &str, loan_id: &str) -> Result<LoanMatch> {
        let mut taker_user = self.require_user(taker).await?;
        let loan = self
            .ledger
            .available_loans
            .get(loan_id)
            .await?
            .ok_or_else(|| KredibleError::not_found("available loan", loan_id))?;
        if loan.lender == taker {
            return Err(KredibleError::invalid_input("cannot take your own offer"));
        }
        if taker_user.credit_score < loan.min_credit_score {
            return Err(KredibleError::invalid_input(format!(
                "credit score {} is below the offer minimum {}",
                taker_user.credit_score, loan.min_credit_score
            )));
        }

        let m = LoanMatch::new(
            MatchSource::AvailableLoan {
                id: loan.id.clone(),
            },
            loan.lender.clone(),
            taker,
            loan.amount,
            loan.apr,
            loan.duration_days,
            Utc::now(),
        );

        let won = self
            .ledger
            .available_loans
            .update_if(
                loan_id,
                "status",
                serde_json::to_value(AvailabilityStatus::Available)?,
                json!({"status": AvailabilityStatus::Taken}),
            )
            .await?;
        if !won {
            return Err(KredibleError::invalid_state(
                "available loan",
                loan_id,
                "listing is already taken",
            ));
        }

        // The backing offer retires with its listing
        match self
            .ledger
            .lending_offers
            .update_if(
                loan_id,
                "status",
                serde_json::to_value(OfferStatus::Active)?,
                json!({"status": OfferStatus::Inactive}),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!(offer = %loan_id, "offer was not active when its listing was taken"),
            Err(err) => warn!(offer = %loan_id, error = %err, "offer retirement failed"),
        }

        self.ledger.loan_matches.insert(&m).await?;

        let lender_name = self.display_name(&loan.lender).await;
        self.ledger
            .lending_transactions
            .insert(&LoanTransaction::lent(&m, taker_user.name.clone()))
            .await?;
        self.ledger
            .borrowing_transactions
            .insert(&LoanTransaction::borrowed(&m, lender_name))
            .await?;

        taker_user.record_borrowed(loan.amount)?;
        taker_user.loan_opened();
        self.save_user(&taker_user).await?;
        self.refresh_score(taker).await;

        debug!(
            loan = %loan_id,
            loan_match = %m.id,
            interest = %m.interest(),
            "loan taken"
        );
        Ok(m)
    }

    /// Publish a lender's standing offer and its market listing
    #[instrument(skip(self))]
    pub async fn create_lender_offer(
        &self,
        lender: &str,
        amount: Decimal,
        interest_rate: f64,
        max_duration_days: u32,
        min_credit_score: u16,
    ) -> Result<LenderOffer> {
        if amount <= Decimal::ZERO {
            return Err(KredibleError::invalid_input(
                "offer amount must be positive",
            ));
        }
        if interest_rate <= 0.0 {
            return Err(KredibleError::invalid_input(
                "interest rate must be positive",
            ));
        }
        if max_duration_days == 0 {
            return Err(KredibleError::invalid_input("duration must be positive"));
        }
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&min_credit_score) {
            return Err(KredibleError::invalid_input(format!(
                "minimum score must be within {MIN_CREDIT_SCORE}-{MAX_CREDIT_SCORE}"
            )));
        }

        self.require_user(lender).await?;

        let offer = LenderOffer::new(
            lender,
            amount,
            interest_rate,
            max_duration_days,
            min_credit_score,
        );
        self.ledger.lending_offers.insert(&offer).await?;
        self.ledger
            .available_loans
            .insert(&AvailableLoan::from_offer(&offer, self.config.default_max_ltv))
            .await?;

        debug!(offer = %offer.id, "lender offer created");
        Ok(offer)
    }

    /// Withdraw a still-pending request; only its borrower may cancel
    #[instrument(skip(self))]
    pub async fn cancel_loan_request(&self, borrower: &str, request_id: &str) -> Result<()> {
        let mut user = self.require_user(borrower).await?;
        let request = self
            .ledger
            .loan_requests
            .get(request_id)
            .await?
            .ok_or_else(|| KredibleError::not_found("loan request", request_id))?;
        if request.borrower != borrower {
            return Err(KredibleError::invalid_input(
                "only the requesting borrower can cancel",
            ));
        }

        let won = self
            .ledger
            .loan_requests
            .update_if(
                request_id,
                "status",
                serde_json::to_value(RequestStatus::Pending)?,
                json!({"status": RequestStatus::Cancelled}),
            )
            .await?;
        if !won {
            return Err(KredibleError::invalid_state(
                "loan request",
                request_id,
                "only a pending request can be cancelled",
            ));
        }

        user.loan_closed();
        self.save_user(&user).await?;
        debug!(request = %request_id, "loan request cancelled");
        Ok(())
    }

    /// Settle an active match as repaid: both transaction records and the
    /// originating request follow, positions close, borrower reputation
    /// grows
    #[instrument(skip(self))]
    pub async fn repay_loan(&self, match_id: &str) -> Result<()> {
        let m = self.transition_match(match_id, MatchStatus::Repaid).await?;
        self.close_positions(&m, true).await;
        self.refresh_score(&m.borrower).await;
        debug!(loan_match = %match_id, "loan repaid");
        Ok(())
    }

    /// Write an active match off as defaulted, mirrored to both records
    /// and the originating request
    #[instrument(skip(self))]
    pub async fn mark_defaulted(&self, match_id: &str) -> Result<()> {
        let m = self
            .transition_match(match_id, MatchStatus::Defaulted)
            .await?;
        self.close_positions(&m, false).await;
        self.refresh_score(&m.borrower).await;
        debug!(loan_match = %match_id, "loan defaulted");
        Ok(())
    }

    /// Swap an active match into a terminal state and propagate it to the
    /// per-party records and the originating request
    async fn transition_match(&self, match_id: &str, status: MatchStatus) -> Result<LoanMatch> {
        let m = self
            .ledger
            .loan_matches
            .get(match_id)
            .await?
            .ok_or_else(|| KredibleError::not_found("loan match", match_id))?;

        let won = self
            .ledger
            .loan_matches
            .update_if(
                match_id,
                "status",
                serde_json::to_value(MatchStatus::Active)?,
                json!({"status": status}),
            )
            .await?;
        if !won {
            return Err(KredibleError::invalid_state(
                "loan match",
                match_id,
                "only an active loan can be settled",
            ));
        }

        self.sync_match_records(match_id, status).await;

        if let MatchSource::Request { id } = &m.source {
            let request_status = match status {
                MatchStatus::Repaid => RequestStatus::Repaid,
                _ => RequestStatus::Defaulted,
            };
            match self
                .ledger
                .loan_requests
                .update_if(
                    id,
                    "status",
                    serde_json::to_value(RequestStatus::Funded)?,
                    json!({"status": request_status}),
                )
                .await
            {
                Ok(true) => {}
                Ok(false) => warn!(request = %id, "originating request was not in funded state"),
                Err(err) => warn!(request = %id, error = %err, "request settlement failed"),
            }
        }

        Ok(m)
    }

    /// Mirror a match transition onto both parties' transaction records
    async fn sync_match_records(&self, match_id: &str, status: MatchStatus) {
        for collection in [
            &self.ledger.lending_transactions,
            &self.ledger.borrowing_transactions,
        ] {
            match collection.find_by("match_id", json!(match_id)).await {
                Ok(records) => {
                    for record in records {
                        if let Err(err) = collection
                            .update_fields(&record.id, json!({"status": status}))
                            .await
                        {
                            warn!(
                                collection = collection.name(),
                                record = %record.id,
                                error = %err,
                                "match record sync failed"
                            );
                        }
                    }
                }
                Err(err) => warn!(
                    collection = collection.name(),
                    error = %err,
                    "match record lookup failed"
                ),
            }
        }
    }

    /// Close both parties' open positions for a settled match.
    ///
    /// The lender only holds a position when they funded a request; taking
    /// an offer-derived listing never opened one on the lender's side.
    async fn close_positions(&self, m: &LoanMatch, repaid: bool) {
        self.close_position(&m.borrower, repaid).await;
        if matches!(m.source, MatchSource::Request { .. }) {
            self.close_position(&m.lender, false).await;
        }
    }

    async fn close_position(&self, wallet: &str, bump_reputation: bool) {
        match self.ledger.user_by_wallet(wallet).await {
            Ok(Some(mut user)) => {
                user.loan_closed();
                if bump_reputation {
                    user.repayment_recorded();
                }
                if let Err(err) = self.save_user(&user).await {
                    warn!(%wallet, error = %err, "position close failed");
                }
            }
            Ok(None) => warn!(%wallet, "settled match references unknown user"),
            Err(err) => warn!(%wallet, error = %err, "position close lookup failed"),
        }
    }

    /// Best-effort score refresh for the acting party after an operation.
    ///
    /// Goes through the staleness guard, so a fresh cached score is left
    /// alone; failures are logged and never fail the market operation that
    /// triggered them.
    async fn refresh_score(&self, wallet: &str) {
        let Some(scorer) = &self.scorer else {
            return;
        };
        match self.ledger.user_by_wallet(wallet).await {
            Ok(Some(user)) => {
                if let Err(err) = scorer.current_score(&user.id).await {
                    warn!(%wallet, error = %err, "score refresh failed");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%wallet, error = %err, "score refresh lookup failed"),
        }
    }

    async fn require_user(&self, wallet: &str) -> Result<User> {
        self.ledger
            .user_by_wallet(wallet)
            .await?
            .ok_or_else(|| KredibleError::not_found("user", wallet))
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        self.ledger
            .users
            .update_fields(&user.id, serde_json::to_value(user)?)
            .await
    }

    async fn display_name(&self, wallet: &str) -> String {
        match self.ledger.user_by_wallet(wallet).await {
            Ok(Some(user)) => user.name,
            Ok(None) => String::new(),
            Err(err) => {
                warn!(%wallet, error = %err, "display name lookup failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::MockPriceFeed;
    use kredible_store::InMemoryStore;
    use rust_decimal_macros::dec;

    async fn seeded_gateway(feed: Arc<dyn PriceFeed>) -> (LoanMatchingGateway, Ledger) {
        let ledger = Ledger::new(Arc::new(InMemoryStore::new()));
        ledger
            .users
            .insert(&User::new("GAXB...K2M4", "Alice", None))
            .await
            .unwrap();
        (
            LoanMatchingGateway::new(ledger.clone(), feed),
            ledger,
        )
    }

    #[tokio::test]
    async fn test_validation_precedes_feed_and_writes() {
        // An invalid amount must fail before the price feed is consulted
        let mut feed = MockPriceFeed::new();
        feed.expect_price().never();

        let (gateway, ledger) = seeded_gateway(Arc::new(feed)).await;
        let err = gateway
            .create_loan_request("GAXB...K2M4", dec!(0), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, KredibleError::InvalidInput(_)));

        let err = gateway
            .create_loan_request("GAXB...K2M4", dec!(1000), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, KredibleError::InvalidInput(_)));

        assert!(ledger.open_requests(10).await.unwrap().is_empty());
        let user = ledger.user_by_wallet("GAXB...K2M4").await.unwrap().unwrap();
        assert_eq!(user.active_loans, 0);
    }

    #[tokio::test]
    async fn test_feed_failure_leaves_no_partial_writes() {
        let mut feed = MockPriceFeed::new();
        feed.expect_price()
            .returning(|| Err(KredibleError::Storage("feed offline".to_string())));

        let (gateway, ledger) = seeded_gateway(Arc::new(feed)).await;
        let err = gateway
            .create_loan_request("GAXB...K2M4", dec!(1000), 30)
            .await
            .unwrap_err();
        assert!(matches!(err, KredibleError::Storage(_)));

        assert!(ledger.open_requests(10).await.unwrap().is_empty());
        let user = ledger.user_by_wallet("GAXB...K2M4").await.unwrap().unwrap();
        assert_eq!(user.active_loans, 0);
    }

    #[tokio::test]
    async fn test_offer_validation() {
        let (gateway, ledger) = seeded_gateway(Arc::new(MockPriceFeed::new())).await;

        for result in [
            gateway
                .create_lender_offer("GAXB...K2M4", dec!(0), 6.5, 30, 600)
                .await,
            gateway
                .create_lender_offer("GAXB...K2M4", dec!(5000), 0.0, 30, 600)
                .await,
            gateway
                .create_lender_offer("GAXB...K2M4", dec!(5000), 6.5, 0, 600)
                .await,
            gateway
                .create_lender_offer("GAXB...K2M4", dec!(5000), 6.5, 30, 299)
                .await,
            gateway
                .create_lender_offer("GAXB...K2M4", dec!(5000), 6.5, 30, 851)
                .await,
        ] {
            assert!(matches!(result, Err(KredibleError::InvalidInput(_))));
        }

        assert!(ledger.active_offers(10).await.unwrap().is_empty());
        assert!(ledger.open_listings(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let (gateway, _ledger) = seeded_gateway(Arc::new(MockPriceFeed::new())).await;
        let err = gateway
            .create_lender_offer("GXXX", dec!(5000), 6.5, 30, 600)
            .await
            .unwrap_err();
        assert!(matches!(err, KredibleError::NotFound { .. }));
    }
}

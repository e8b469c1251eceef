//! Credit scoring engine
//!
//! Computes a user's credit score from five weighted factors, persists the
//! result (with its breakdown) onto the user document, and serves cached
//! scores until they go stale.
//!
//! A sub-score that depends on a store lookup degrades to a neutral 0 when
//! the lookup fails: the engine always returns a best-effort score and only
//! raises an error for a missing user.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, instrument, warn};

use kredible_common::{
    CreditFactor, CreditScore, Impact, KredibleError, MatchStatus, Result, User,
    MAX_CREDIT_SCORE, MIN_CREDIT_SCORE,
};
use kredible_store::Ledger;

use crate::staleness::StalenessPolicy;
use crate::{
    NEW_CREDIT_WINDOW_DAYS, SCORE_RECENTER, WEIGHT_CREDIT_MIX, WEIGHT_CREDIT_UTILIZATION,
    WEIGHT_HISTORY_LENGTH, WEIGHT_NEW_CREDIT, WEIGHT_PAYMENT_HISTORY,
};

/// Multi-factor credit scorer over the platform ledger
pub struct CreditScoreEngine {
    ledger: Ledger,
    staleness: StalenessPolicy,
}

impl CreditScoreEngine {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            staleness: StalenessPolicy::default(),
        }
    }

    /// Override the staleness policy
    pub fn with_staleness(mut self, staleness: StalenessPolicy) -> Self {
        self.staleness = staleness;
        self
    }

    /// Serve the cached score when fresh, recompute when stale or absent
    pub async fn current_score(&self, user_id: &str) -> Result<CreditScore> {
        let user = self.require_user(user_id).await?;

        if self.staleness.is_stale(user.score_updated_at) {
            return self.compute_score(user_id).await;
        }

        // Fresh but breakdown-less documents still serve the stored number
        Ok(match user.score_details {
            Some(details) => details,
            None => CreditScore {
                score: user.credit_score,
                max_score: MAX_CREDIT_SCORE,
                factors: Vec::new(),
                last_updated: user.score_updated_at.unwrap_or_else(Utc::now),
            },
        })
    }

    /// Compute the score from scratch and persist it onto the user
    #[instrument(skip(self))]
    pub async fn compute_score(&self, user_id: &str) -> Result<CreditScore> {
        let user = self.require_user(user_id).await?;

        let mut factors = Vec::with_capacity(5);

        let payment = self.payment_history(&user.wallet_address).await;
        factors.push(CreditFactor::new(
            "Payment History",
            positive_or_negative(payment),
            "Based on completed loan payments",
            payment,
        ));

        let utilization = utilization_score(user.total_borrowed, user.total_lent);
        factors.push(CreditFactor::new(
            "Credit Utilization",
            positive_or_negative(utilization),
            "Based on current borrowing vs total borrowed",
            utilization,
        ));

        let history = history_length_score(months_since(user.created_at));
        factors.push(CreditFactor::new(
            "Credit History Length",
            positive_or_neutral(history),
            "Based on time since first loan",
            history,
        ));

        let mix = self.credit_mix(&user.wallet_address).await;
        factors.push(CreditFactor::new(
            "Credit Mix",
            positive_or_neutral(mix),
            "Based on variety of loan types",
            mix,
        ));

        let new_credit = self.new_credit(&user.wallet_address).await;
        factors.push(CreditFactor::new(
            "New Credit",
            positive_or_negative(new_credit),
            "Based on recent loan applications",
            new_credit,
        ));

        let score = CreditScore::new(
            composite(payment, utilization, history, mix, new_credit),
            factors,
        );
        self.persist(&user, &score).await?;

        debug!(
            wallet = %user.wallet_address,
            score = score.score,
            "credit score computed"
        );
        Ok(score)
    }

    /// Manual score override for admin and test use
    pub async fn set_score(&self, user_id: &str, score: u16) -> Result<CreditScore> {
        let user = self.require_user(user_id).await?;

        let score = CreditScore::new(
            score,
            vec![CreditFactor::new(
                "Manual Update",
                Impact::Neutral,
                "Credit score updated manually",
                0.0,
            )],
        );
        self.persist(&user, &score).await?;
        Ok(score)
    }

    async fn require_user(&self, user_id: &str) -> Result<User> {
        self.ledger
            .users
            .get(user_id)
            .await?
            .ok_or_else(|| KredibleError::not_found("user", user_id))
    }

    async fn persist(&self, user: &User, score: &CreditScore) -> Result<()> {
        self.ledger
            .users
            .update_fields(
                &user.id,
                json!({
                    "credit_score": score.score,
                    "score_details": score,
                    "score_updated_at": score.last_updated,
                    "version": user.version + 1,
                }),
            )
            .await
    }

    async fn payment_history(&self, wallet: &str) -> f64 {
        match self.ledger.borrowing_by_borrower(wallet).await {
            Ok(transactions) => {
                let total = transactions.len();
                let completed = transactions
                    .iter()
                    .filter(|t| t.status == MatchStatus::Repaid)
                    .count();
                let defaulted = transactions
                    .iter()
                    .filter(|t| t.status == MatchStatus::Defaulted)
                    .count();
                payment_history_score(completed, defaulted, total)
            }
            Err(err) => {
                warn!(%wallet, error = %err, "payment history lookup failed, degrading to neutral");
                0.0
            }
        }
    }

    async fn credit_mix(&self, wallet: &str) -> f64 {
        let lookups = async {
            let has_lending = !self.ledger.lending_by_lender(wallet).await?.is_empty();
            let has_borrowing = !self.ledger.borrowing_by_borrower(wallet).await?.is_empty();
            Ok::<_, KredibleError>(credit_mix_score(has_lending, has_borrowing))
        };
        match lookups.await {
            Ok(score) => score,
            Err(err) => {
                warn!(%wallet, error = %err, "credit mix lookup failed, degrading to neutral");
                0.0
            }
        }
    }

    async fn new_credit(&self, wallet: &str) -> f64 {
        match self.ledger.requests_by_borrower(wallet).await {
            Ok(requests) => {
                let cutoff = Utc::now() - Duration::days(NEW_CREDIT_WINDOW_DAYS);
                let recent = requests.iter().filter(|r| r.created_at > cutoff).count();
                new_credit_score(recent)
            }
            Err(err) => {
                warn!(%wallet, error = %err, "new credit lookup failed, degrading to neutral");
                0.0
            }
        }
    }
}

fn positive_or_negative(value: f64) -> Impact {
    if value >= 0.0 {
        Impact::Positive
    } else {
        Impact::Negative
    }
}

fn positive_or_neutral(value: f64) -> Impact {
    if value >= 0.0 {
        Impact::Positive
    } else {
        Impact::Neutral
    }
}

fn months_since(created_at: DateTime<Utc>) -> f64 {
    (Utc::now() - created_at).num_days() as f64 / 30.0
}

/// Completion rate rewarded, default rate penalized twice as hard.
/// No borrowing history at all is neutral.
pub fn payment_history_score(completed: usize, defaulted: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let completed_ratio = completed as f64 / total as f64;
    let defaulted_ratio = defaulted as f64 / total as f64;
    (completed_ratio * 100.0 - defaulted_ratio * 200.0).clamp(-100.0, 100.0)
}

/// Share of borrowing in total volume; lower is better
pub fn utilization_score(total_borrowed: Decimal, total_lent: Decimal) -> f64 {
    if total_borrowed <= Decimal::ZERO {
        return 50.0;
    }
    let borrowed = total_borrowed.to_f64().unwrap_or(f64::MAX);
    let lent = total_lent.to_f64().unwrap_or(0.0).max(0.0);
    let ratio = borrowed / (borrowed + lent);

    if ratio <= 0.3 {
        100.0
    } else if ratio <= 0.5 {
        50.0
    } else if ratio <= 0.7 {
        0.0
    } else {
        -50.0
    }
}

/// Months of account age, in coarse bands
pub fn history_length_score(months: f64) -> f64 {
    if months >= 60.0 {
        100.0
    } else if months >= 36.0 {
        75.0
    } else if months >= 24.0 {
        50.0
    } else if months >= 12.0 {
        25.0
    } else {
        0.0
    }
}

/// Rewarded for activity on both sides of the market
pub fn credit_mix_score(has_lending: bool, has_borrowing: bool) -> f64 {
    match (has_lending, has_borrowing) {
        (true, true) => 100.0,
        (true, false) | (false, true) => 50.0,
        (false, false) => 0.0,
    }
}

/// Loan applications in the trailing window; many recent asks penalized
pub fn new_credit_score(recent_requests: usize) -> f64 {
    match recent_requests {
        0 => 50.0,
        1 => 25.0,
        2..=3 => 0.0,
        _ => -50.0,
    }
}

/// Weighted sum, re-centered and clamped into the published range
pub fn composite(payment: f64, utilization: f64, history: f64, mix: f64, new_credit: f64) -> u16 {
    let total = payment * WEIGHT_PAYMENT_HISTORY
        + utilization * WEIGHT_CREDIT_UTILIZATION
        + history * WEIGHT_HISTORY_LENGTH
        + mix * WEIGHT_CREDIT_MIX
        + new_credit * WEIGHT_NEW_CREDIT;
    let raw = (total + SCORE_RECENTER).round();
    raw.clamp(f64::from(MIN_CREDIT_SCORE), f64::from(MAX_CREDIT_SCORE)) as u16
}

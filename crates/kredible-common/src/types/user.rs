//! User aggregate - the platform's account root
//!
//! A user is keyed by wallet address: the address is assigned at first
//! wallet connection and never changes. Cumulative lending/borrowing totals
//! feed the credit utilization factor, and the cached score breakdown lives
//! on the user document until it goes stale.
//!
//! Mutations bump a version counter for optimistic concurrency; accounts
//! are never hard-deleted in normal flow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{KredibleError, Result};
use crate::types::credit::CreditScore;
use crate::NEUTRAL_CREDIT_SCORE;

/// Which side of the market a user participates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Borrower,
    Lender,
    Both,
}

/// Platform account, keyed by wallet address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Document id
    pub id: String,

    /// Wallet address - globally unique identity key
    pub wallet_address: String,

    /// Display name collected at registration
    pub name: String,

    /// Contact email, optional
    pub email: Option<String>,

    /// Market participation
    pub role: UserRole,

    /// Current credit score (300-850)
    pub credit_score: u16,

    /// Cached factor breakdown from the last computation
    pub score_details: Option<CreditScore>,

    /// When the score was last computed; `None` forces a computation
    pub score_updated_at: Option<DateTime<Utc>>,

    /// Cumulative amount extended as a lender
    pub total_lent: Decimal,

    /// Cumulative amount received as a borrower
    pub total_borrowed: Decimal,

    /// Reputation counter, bumped on successful repayments
    pub reputation: u32,

    /// Open loan positions (either side)
    pub active_loans: u32,

    /// Account creation timestamp
    pub created_at: DateTime<Utc>,

    /// Timestamp of last modification
    pub updated_at: DateTime<Utc>,

    /// Version for optimistic concurrency control
    pub version: u64,
}

impl User {
    /// Create a fresh account for a newly connected wallet.
    ///
    /// The score starts at the engine's re-centering baseline with no
    /// computation timestamp, so the first score read always computes a
    /// real one.
    pub fn new(
        wallet_address: impl Into<String>,
        name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            wallet_address: wallet_address.into(),
            name: name.into(),
            email,
            role: UserRole::Both,
            credit_score: NEUTRAL_CREDIT_SCORE,
            score_details: None,
            score_updated_at: None,
            total_lent: Decimal::ZERO,
            total_borrowed: Decimal::ZERO,
            reputation: 0,
            active_loans: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Record an amount extended as a lender
    pub fn record_lent(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(KredibleError::invalid_input("lent amount must be positive"));
        }
        self.total_lent += amount;
        self.touch();
        Ok(())
    }

    /// Record an amount received as a borrower
    pub fn record_borrowed(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(KredibleError::invalid_input(
                "borrowed amount must be positive",
            ));
        }
        self.total_borrowed += amount;
        self.touch();
        Ok(())
    }

    /// A loan position opened (request created or loan taken/funded)
    pub fn loan_opened(&mut self) {
        self.active_loans += 1;
        self.touch();
    }

    /// A loan position closed (repaid, defaulted, or cancelled)
    pub fn loan_closed(&mut self) {
        self.active_loans = self.active_loans.saturating_sub(1);
        self.touch();
    }

    /// A loan was repaid on time
    pub fn repayment_recorded(&mut self) {
        self.reputation += 1;
        self.touch();
    }

    /// Attach a freshly computed score
    pub fn apply_score(&mut self, score: &CreditScore) {
        self.credit_score = score.score;
        self.score_updated_at = Some(score.last_updated);
        self.score_details = Some(score.clone());
        self.touch();
    }

    /// Check against an expected version for optimistic concurrency
    pub fn check_version(&self, expected: u64) -> Result<()> {
        if self.version != expected {
            return Err(KredibleError::VersionConflict {
                expected,
                found: self.version,
            });
        }
        Ok(())
    }

    /// Update version and timestamp
    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User({}, score={}, lent={}, borrowed={})",
            self.wallet_address, self.credit_score, self.total_lent, self.total_borrowed
        )
    }
}

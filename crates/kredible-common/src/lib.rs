//! # Kredible Common
//!
//! Shared types, errors, and credit math for the Kredible peer-to-peer
//! lending core.
//!
//! ## Core Types
//!
//! - [`User`]: wallet-keyed account aggregate with cumulative totals
//! - [`CreditScore`] / [`CreditFactor`]: computed score with its breakdown
//! - [`CreditTier`]: four risk bands fixing LTV ceiling and APR
//! - [`LoanRequest`] / [`LenderOffer`] / [`AvailableLoan`]: market records
//! - [`LoanMatch`] / [`LoanTransaction`]: funded-loan aggregate and the
//!   per-party ledger entries derived from it
//!
//! ## Credit math
//!
//! - [`collateral_for`]: collateral units from amount, LTV, and feed price
//! - [`simple_interest`]: `amount * apr/100 * days/365`
//! - [`normalized_apr`]: linear APR over the full score range, for display

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{KredibleError, Result};
pub use types::{
    credit::{
        collateral_for, normalized_apr, score_band, CreditFactor, CreditScore, CreditTier,
        Impact, ScoreBand,
    },
    loan::{
        simple_interest, AvailabilityStatus, AvailableLoan, Direction, LenderOffer, LoanMatch,
        LoanRequest, LoanTransaction, MatchSource, MatchStatus, OfferStatus, RequestStatus,
    },
    user::{User, UserRole},
    wallet::{ProfileInfo, WalletError},
};

/// Kredible version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lowest possible credit score
pub const MIN_CREDIT_SCORE: u16 = 300;

/// Highest possible credit score
pub const MAX_CREDIT_SCORE: u16 = 850;

/// Baseline the scoring engine re-centers around; also the score a fresh
/// account starts from until its first computation
pub const NEUTRAL_CREDIT_SCORE: u16 = 500;

/// Days a cached credit score stays fresh before it must be recomputed
pub const SCORE_MAX_AGE_DAYS: i64 = 30;

/// LTV ceiling advertised on offer-derived market listings (percent)
pub const DEFAULT_MAX_LTV: f64 = 80.0;

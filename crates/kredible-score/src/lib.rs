//! # Kredible Score
//!
//! Multi-factor credit scoring engine for the Kredible lending platform.
//!
//! ## Scoring Formula
//!
//! ```text
//! score = clamp(round(0.35*P + 0.30*U + 0.15*H + 0.10*M + 0.10*N) + 500, 300, 850)
//! ```
//!
//! Where each factor is a bounded sub-score:
//! - P: Payment history (completed vs defaulted borrowing transactions)
//! - U: Credit utilization (borrowed vs total volume)
//! - H: History length (months since account creation)
//! - M: Credit mix (lending and/or borrowing activity)
//! - N: New credit (loan applications in the trailing window)
//!
//! A computed score carries its full factor breakdown and is cached on the
//! user document; [`StalenessPolicy`] decides when a cached score must be
//! recomputed.

pub mod engine;
pub mod staleness;

pub use engine::CreditScoreEngine;
pub use staleness::StalenessPolicy;

/// Weight of the payment history factor
pub const WEIGHT_PAYMENT_HISTORY: f64 = 0.35;

/// Weight of the credit utilization factor
pub const WEIGHT_CREDIT_UTILIZATION: f64 = 0.30;

/// Weight of the history length factor
pub const WEIGHT_HISTORY_LENGTH: f64 = 0.15;

/// Weight of the credit mix factor
pub const WEIGHT_CREDIT_MIX: f64 = 0.10;

/// Weight of the new credit factor
pub const WEIGHT_NEW_CREDIT: f64 = 0.10;

/// Offset the weighted factor sum is re-centered by
pub const SCORE_RECENTER: f64 = 500.0;

/// Trailing window for the new-credit factor
pub const NEW_CREDIT_WINDOW_DAYS: i64 = 180;

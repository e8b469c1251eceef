//! # Kredible Market
//!
//! Loan matching for the Kredible lending platform: borrowers submit
//! requests sized by their credit tier, lenders publish offers that become
//! market listings, and the gateway moves both through their state machines
//! while keeping the paired per-party transaction records in sync.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                 LoanMatchingGateway                    │
//! │  create_loan_request   fund_loan   take_loan   ...     │
//! │        │                   │            │              │
//! │  CreditTier + PriceFeed    └── LoanMatch aggregate ──┐ │
//! │  (collateral sizing)           + paired transaction  │ │
//! │                                  records             │ │
//! └──────────────┬───────────────────────────────────────┼─┘
//!                │                                       │
//!         ┌──────┴───────┐                        ┌──────┴──────┐
//!         │   AuthFlow   │                        │   Ledger    │
//!         │ (wallet auth │                        │ (document   │
//!         │  + profile   │                        │  store)     │
//!         │  prompts)    │                        └─────────────┘
//!         └──────────────┘
//! ```
//!
//! All operations are short-lived in-process calls; there is no wire
//! protocol and no background worker.

pub mod auth;
pub mod config;
pub mod feed;
pub mod gateway;

pub use auth::{
    AuthFlow, AuthOutcome, ProfilePrompts, ProfileRequest, SimulatedWallet, WalletConnector,
};
pub use config::MarketConfig;
pub use feed::{FixedPriceFeed, PriceFeed};
pub use gateway::LoanMatchingGateway;

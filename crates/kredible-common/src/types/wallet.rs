//! Wallet collaborator types
//!
//! The platform treats a wallet address as the stable identity key; the
//! wallet itself (key custody, signing) lives behind a collaborator trait in
//! the market crate. Only the error and profile types are shared here.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wallet collaborator errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("no wallet is connected")]
    NotConnected,

    #[error("wallet connection failed: {0}")]
    ConnectionFailed(String),

    #[error("transaction signing failed: {0}")]
    SigningFailed(String),

    #[error("request rejected by the wallet owner")]
    Rejected,
}

/// Profile data collected when a new wallet registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInfo {
    pub name: String,
    pub email: Option<String>,
}

impl ProfileInfo {
    pub fn new(name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            name: name.into(),
            email,
        }
    }
}

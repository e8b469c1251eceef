//! Core data types for the Kredible lending platform

pub mod credit;
pub mod loan;
pub mod user;
pub mod wallet;

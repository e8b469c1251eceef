//! Typed collection handles
//!
//! [`Collection<T>`] serializes on write and deserializes on read, which
//! makes it the schema boundary: a document that does not match the record
//! type fails loudly here instead of leaking shapeless data into domain
//! code. [`Ledger`] bundles the platform's collections together with the
//! named queries the services run against them.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use kredible_common::{
    AvailabilityStatus, AvailableLoan, KredibleError, LenderOffer, LoanMatch, LoanRequest,
    LoanTransaction, OfferStatus, RequestStatus, Result, User,
};

use crate::store::{DocumentStore, Filter, Order};

/// Collection names
pub mod names {
    pub const USERS: &str = "users";
    pub const LOAN_REQUESTS: &str = "loan_requests";
    pub const LENDING_OFFERS: &str = "lending_offers";
    pub const AVAILABLE_LOANS: &str = "available_loans";
    pub const LOAN_MATCHES: &str = "loan_matches";
    pub const LENDING_TRANSACTIONS: &str = "lending_transactions";
    pub const BORROWING_TRANSACTIONS: &str = "borrowing_transactions";
}

/// Typed handle over one document collection
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T> Collection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn DocumentStore>, name: &'static str) -> Self {
        Self {
            store,
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn decode(&self, value: Value) -> Result<T> {
        serde_json::from_value(value).map_err(|e| {
            KredibleError::Serialization(format!("{}: {e}", self.name))
        })
    }

    /// Persist a record, returning its document id
    pub async fn insert(&self, record: &T) -> Result<String> {
        let doc = serde_json::to_value(record)?;
        Ok(self.store.insert(self.name, doc).await?)
    }

    /// Fetch and decode a record by id
    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        match self.store.get_by_id(self.name, id).await? {
            Some(value) => Ok(Some(self.decode(value)?)),
            None => Ok(None),
        }
    }

    /// All records whose `field` equals `value`
    pub async fn find_by(&self, field: &str, value: Value) -> Result<Vec<T>> {
        let values = self.store.get_by_field(self.name, field, &value).await?;
        values.into_iter().map(|v| self.decode(v)).collect()
    }

    /// Merge the patch's top-level fields into the document
    pub async fn update_fields(&self, id: &str, patch: Value) -> Result<()> {
        Ok(self.store.update(self.name, id, patch).await?)
    }

    /// Conditional update; returns whether the guard held and the patch
    /// was applied
    pub async fn update_if(
        &self,
        id: &str,
        guard_field: &str,
        expected: Value,
        patch: Value,
    ) -> Result<bool> {
        Ok(self
            .store
            .update_if(self.name, id, guard_field, &expected, patch)
            .await?)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        Ok(self.store.delete(self.name, id).await?)
    }

    /// Filtered, ordered, limited scan
    pub async fn query(
        &self,
        filters: &[Filter],
        order: Option<&Order>,
        limit: Option<usize>,
    ) -> Result<Vec<T>> {
        let values = self.store.query(self.name, filters, order, limit).await?;
        values.into_iter().map(|v| self.decode(v)).collect()
    }
}

/// The platform's collections plus the named queries the services use.
///
/// Timestamps serialize as RFC 3339 strings, so ordering by `created_at`
/// is chronological.
#[derive(Clone)]
pub struct Ledger {
    pub users: Collection<User>,
    pub loan_requests: Collection<LoanRequest>,
    pub lending_offers: Collection<LenderOffer>,
    pub available_loans: Collection<AvailableLoan>,
    pub loan_matches: Collection<LoanMatch>,
    pub lending_transactions: Collection<LoanTransaction>,
    pub borrowing_transactions: Collection<LoanTransaction>,
}

impl Ledger {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: Collection::new(Arc::clone(&store), names::USERS),
            loan_requests: Collection::new(Arc::clone(&store), names::LOAN_REQUESTS),
            lending_offers: Collection::new(Arc::clone(&store), names::LENDING_OFFERS),
            available_loans: Collection::new(Arc::clone(&store), names::AVAILABLE_LOANS),
            loan_matches: Collection::new(Arc::clone(&store), names::LOAN_MATCHES),
            lending_transactions: Collection::new(Arc::clone(&store), names::LENDING_TRANSACTIONS),
            borrowing_transactions: Collection::new(store, names::BORROWING_TRANSACTIONS),
        }
    }

    /// Look a user up by wallet address, the platform identity key
    pub async fn user_by_wallet(&self, wallet_address: &str) -> Result<Option<User>> {
        let mut found = self
            .users
            .find_by("wallet_address", Value::String(wallet_address.to_string()))
            .await?;
        let first = found.drain(..).next();
        Ok(first)
    }

    /// Pending loan requests, newest first
    pub async fn open_requests(&self, limit: usize) -> Result<Vec<LoanRequest>> {
        self.loan_requests
            .query(
                &[Filter::eq("status", serde_json::to_value(RequestStatus::Pending)?)],
                Some(&Order::desc("created_at")),
                Some(limit),
            )
            .await
    }

    /// A borrower's loan requests, newest first
    pub async fn requests_by_borrower(&self, wallet_address: &str) -> Result<Vec<LoanRequest>> {
        self.loan_requests
            .query(
                &[Filter::eq("borrower", Value::String(wallet_address.to_string()))],
                Some(&Order::desc("created_at")),
                None,
            )
            .await
    }

    /// Active lender offers, newest first
    pub async fn active_offers(&self, limit: usize) -> Result<Vec<LenderOffer>> {
        self.lending_offers
            .query(
                &[Filter::eq("status", serde_json::to_value(OfferStatus::Active)?)],
                Some(&Order::desc("created_at")),
                Some(limit),
            )
            .await
    }

    /// A lender's offers, newest first
    pub async fn offers_by_lender(&self, wallet_address: &str) -> Result<Vec<LenderOffer>> {
        self.lending_offers
            .query(
                &[Filter::eq("lender", Value::String(wallet_address.to_string()))],
                Some(&Order::desc("created_at")),
                None,
            )
            .await
    }

    /// Untaken market listings, newest first
    pub async fn open_listings(&self, limit: usize) -> Result<Vec<AvailableLoan>> {
        self.available_loans
            .query(
                &[Filter::eq(
                    "status",
                    serde_json::to_value(AvailabilityStatus::Available)?,
                )],
                Some(&Order::desc("created_at")),
                Some(limit),
            )
            .await
    }

    /// Lender-side ledger entries for a wallet, newest first
    pub async fn lending_by_lender(&self, wallet_address: &str) -> Result<Vec<LoanTransaction>> {
        self.lending_transactions
            .query(
                &[Filter::eq("owner", Value::String(wallet_address.to_string()))],
                Some(&Order::desc("start_date")),
                None,
            )
            .await
    }

    /// Borrower-side ledger entries for a wallet, newest first
    pub async fn borrowing_by_borrower(&self, wallet_address: &str) -> Result<Vec<LoanTransaction>> {
        self.borrowing_transactions
            .query(
                &[Filter::eq("owner", Value::String(wallet_address.to_string()))],
                Some(&Order::desc("start_date")),
                None,
            )
            .await
    }
}

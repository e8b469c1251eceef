//! Market records - requests, offers, matches, and ledger entries
//!
//! Life cycles:
//! - LoanRequest: pending -> funded -> repaid, with defaulted and cancelled
//!   as absorbing states reachable from pending (cancelled) or funded
//!   (defaulted)
//! - LenderOffer: active -> inactive, one-way on match
//! - AvailableLoan: available -> taken, the market-facing view of an offer
//! - LoanMatch: active -> repaid | overdue | defaulted; the single aggregate
//!   created per match, referenced by both parties' transaction records

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Loan request life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Funded,
    Repaid,
    Defaulted,
    Cancelled,
}

/// Lender offer life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Inactive,
}

/// Market listing life cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Available,
    Taken,
}

/// Funded loan life cycle, shared by the match and its transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Active,
    Repaid,
    Overdue,
    Defaulted,
}

/// Which side of a match a transaction record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Lent,
    Borrowed,
}

/// Simple interest over the loan term: `amount * apr/100 * days/365`
pub fn simple_interest(amount: Decimal, apr: f64, duration_days: u32) -> Decimal {
    let fraction = apr / 100.0 * f64::from(duration_days) / 365.0;
    amount * Decimal::try_from(fraction).unwrap_or_default()
}

/// A borrower's ask on the market
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRequest {
    pub id: String,

    /// Borrower's wallet address
    pub borrower: String,

    /// Borrower's score at request time
    pub borrower_score: u16,

    /// Requested principal (loan currency)
    pub amount: Decimal,

    /// Collateral asset units locked against the loan.
    ///
    /// Fixed from amount, LTV, and the feed price at request time; it does
    /// not re-adjust to later price moves.
    pub collateral: f64,

    /// LTV the request was sized at (percent)
    pub ltv: f64,

    /// APR from the borrower's tier (percent, annualized)
    pub apr: f64,

    pub duration_days: u32,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,

    /// Funder's wallet address once funded
    pub funded_by: Option<String>,

    /// Repayment deadline once funded
    pub due_date: Option<DateTime<Utc>>,
}

impl LoanRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        borrower: impl Into<String>,
        borrower_score: u16,
        amount: Decimal,
        collateral: f64,
        ltv: f64,
        apr: f64,
        duration_days: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            borrower: borrower.into(),
            borrower_score,
            amount,
            collateral,
            ltv,
            apr,
            duration_days,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            funded_by: None,
            due_date: None,
        }
    }
}

/// A lender's standing offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LenderOffer {
    pub id: String,

    /// Lender's wallet address
    pub lender: String,

    /// Amount available to lend
    pub amount: Decimal,

    /// Asked rate (percent, annualized)
    pub interest_rate: f64,

    /// Longest term the lender accepts
    pub max_duration_days: u32,

    /// Floor on the borrower's credit score
    pub min_credit_score: u16,

    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

impl LenderOffer {
    pub fn new(
        lender: impl Into<String>,
        amount: Decimal,
        interest_rate: f64,
        max_duration_days: u32,
        min_credit_score: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            lender: lender.into(),
            amount,
            interest_rate,
            max_duration_days,
            min_credit_score,
            status: OfferStatus::Active,
            created_at: Utc::now(),
        }
    }
}

/// Market-facing view of an offer, what borrowers browse and take.
///
/// Shares its id with the offer it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableLoan {
    pub id: String,
    pub lender: String,
    pub amount: Decimal,
    pub apr: f64,
    pub duration_days: u32,
    pub min_credit_score: u16,

    /// LTV ceiling advertised on the listing (percent)
    pub max_ltv: f64,

    pub status: AvailabilityStatus,
    pub created_at: DateTime<Utc>,
}

impl AvailableLoan {
    /// Derive the market listing for a freshly created offer
    pub fn from_offer(offer: &LenderOffer, max_ltv: f64) -> Self {
        Self {
            id: offer.id.clone(),
            lender: offer.lender.clone(),
            amount: offer.amount,
            apr: offer.interest_rate,
            duration_days: offer.max_duration_days,
            min_credit_score: offer.min_credit_score,
            max_ltv,
            status: AvailabilityStatus::Available,
            created_at: Utc::now(),
        }
    }
}

/// What a match was struck against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchSource {
    /// A lender funded a borrower's request
    Request { id: String },
    /// A borrower took an offer-derived listing
    AvailableLoan { id: String },
}

/// The single aggregate created when a loan is struck.
///
/// Both parties' transaction records carry this match's id and are only
/// transitioned through it, so the two sides cannot drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanMatch {
    pub id: String,
    pub source: MatchSource,

    /// Lender's wallet address
    pub lender: String,

    /// Borrower's wallet address
    pub borrower: String,

    pub amount: Decimal,
    pub apr: f64,
    pub duration_days: u32,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: MatchStatus,
}

impl LoanMatch {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: MatchSource,
        lender: impl Into<String>,
        borrower: impl Into<String>,
        amount: Decimal,
        apr: f64,
        duration_days: u32,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source,
            lender: lender.into(),
            borrower: borrower.into(),
            amount,
            apr,
            duration_days,
            start_date,
            due_date: start_date + Duration::days(i64::from(duration_days)),
            status: MatchStatus::Active,
        }
    }

    /// Interest over the full term, at simple interest
    pub fn interest(&self) -> Decimal {
        simple_interest(self.amount, self.apr, self.duration_days)
    }

    /// Still active but past its due date.
    ///
    /// Overdue is derived at read time; settlement transitions only move
    /// between active and the terminal states.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == MatchStatus::Active && now > self.due_date
    }
}

/// One party's ledger entry for a match: interest earned on the lent side,
/// interest owed on the borrowed side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTransaction {
    pub id: String,

    /// The match this record belongs to
    pub match_id: String,

    pub direction: Direction,

    /// Whose ledger this entry sits in
    pub owner: String,

    /// The other party's wallet address
    pub counterparty: String,

    /// The other party's display name
    pub counterparty_name: String,

    pub amount: Decimal,
    pub apr: f64,
    pub duration_days: u32,
    pub start_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: MatchStatus,

    /// Precomputed simple interest: earned for [`Direction::Lent`], owed
    /// for [`Direction::Borrowed`]
    pub interest: Decimal,
}

impl LoanTransaction {
    /// Lender-side record for a match
    pub fn lent(m: &LoanMatch, counterparty_name: impl Into<String>) -> Self {
        Self::from_match(m, Direction::Lent, counterparty_name)
    }

    /// Borrower-side record for a match
    pub fn borrowed(m: &LoanMatch, counterparty_name: impl Into<String>) -> Self {
        Self::from_match(m, Direction::Borrowed, counterparty_name)
    }

    fn from_match(m: &LoanMatch, direction: Direction, counterparty_name: impl Into<String>) -> Self {
        let (owner, counterparty) = match direction {
            Direction::Lent => (m.lender.clone(), m.borrower.clone()),
            Direction::Borrowed => (m.borrower.clone(), m.lender.clone()),
        };
        Self {
            id: Uuid::new_v4().to_string(),
            match_id: m.id.clone(),
            direction,
            owner,
            counterparty,
            counterparty_name: counterparty_name.into(),
            amount: m.amount,
            apr: m.apr,
            duration_days: m.duration_days,
            start_date: m.start_date,
            due_date: m.due_date,
            status: m.status,
            interest: m.interest(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_simple_interest() {
        // 1000 at 7% over 30 days
        let interest = simple_interest(dec!(1000), 7.0, 30);
        assert!((interest - dec!(5.75)).abs() < dec!(0.01));

        // 5000 at 6.5% over 30 days
        let interest = simple_interest(dec!(5000), 6.5, 30);
        assert!((interest - dec!(26.71)).abs() < dec!(0.01));
    }

    #[test]
    fn test_available_loan_shares_offer_id() {
        let offer = LenderOffer::new("GAXB...K2M4", dec!(5000), 6.5, 30, 600);
        let listing = AvailableLoan::from_offer(&offer, 80.0);

        assert_eq!(listing.id, offer.id);
        assert_eq!(listing.apr, offer.interest_rate);
        assert_eq!(listing.status, AvailabilityStatus::Available);
        assert_eq!(listing.max_ltv, 80.0);
    }

    #[test]
    fn test_match_due_date() {
        let start = Utc::now();
        let m = LoanMatch::new(
            MatchSource::Request { id: "r1".into() },
            "lender",
            "borrower",
            dec!(1000),
            7.0,
            30,
            start,
        );
        assert_eq!(m.due_date, start + Duration::days(30));
        assert_eq!(m.status, MatchStatus::Active);
    }

    #[test]
    fn test_overdue_is_derived() {
        let start = Utc::now() - Duration::days(45);
        let m = LoanMatch::new(
            MatchSource::Request { id: "r1".into() },
            "lender",
            "borrower",
            dec!(1000),
            7.0,
            30,
            start,
        );
        assert!(m.is_overdue(Utc::now()));
        assert!(!m.is_overdue(start + Duration::days(29)));

        let mut repaid = m.clone();
        repaid.status = MatchStatus::Repaid;
        assert!(!repaid.is_overdue(Utc::now()));
    }

    #[test]
    fn test_transaction_sides() {
        let m = LoanMatch::new(
            MatchSource::Request { id: "r1".into() },
            "lender-addr",
            "borrower-addr",
            dec!(1000),
            7.0,
            30,
            Utc::now(),
        );

        let lent = LoanTransaction::lent(&m, "Bob");
        assert_eq!(lent.owner, "lender-addr");
        assert_eq!(lent.counterparty, "borrower-addr");
        assert_eq!(lent.direction, Direction::Lent);
        assert_eq!(lent.match_id, m.id);
        assert!((lent.interest - dec!(5.75)).abs() < dec!(0.01));

        let borrowed = LoanTransaction::borrowed(&m, "Alice");
        assert_eq!(borrowed.owner, "borrower-addr");
        assert_eq!(borrowed.counterparty, "lender-addr");
        assert_eq!(borrowed.interest, lent.interest);
    }
}

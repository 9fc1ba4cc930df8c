use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

// ---------------------------------------------------------------------------
// YearMonth – calendar-month period key
// ---------------------------------------------------------------------------

/// Days between 0001-01-01 (CE) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A calendar-month period. Two timestamps falling in the same month map to
/// equal `YearMonth` values regardless of day or time. Internally stored as
/// the first day of the month so ordering and Parquet `Date32` conversion
/// come for free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    pub fn from_datetime(ts: NaiveDateTime) -> Self {
        let date = ts.date();
        // day 1 exists in every valid month
        YearMonth(date.with_day(1).unwrap_or(date))
    }

    /// First day of the month.
    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Days since 1970-01-01 for the first of the month (Arrow `Date32`).
    pub fn days_from_epoch(&self) -> i32 {
        self.0.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
    }

    /// Inverse of [`days_from_epoch`](Self::days_from_epoch).
    pub fn from_days_since_epoch(days: i32) -> Option<Self> {
        NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map(|d| YearMonth(d.with_day(1).unwrap_or(d)))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

// ---------------------------------------------------------------------------
// Transaction rows
// ---------------------------------------------------------------------------

/// One row of the raw input file. Invoice and customer ids stay opaque
/// strings so leading zeros and cancellation prefixes survive intact.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub invoice: String,
    /// Missing in the raw data for guest checkouts; such rows are dropped
    /// by the cleaner.
    pub customer_id: Option<String>,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub invoice_date: NaiveDateTime,
    pub country: String,
}

/// A transaction that survived cleaning. The customer id is guaranteed
/// present and quantity/price are guaranteed positive by construction.
#[derive(Debug, Clone)]
pub struct CleanedTransaction {
    pub invoice: String,
    pub customer_id: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub invoice_date: NaiveDateTime,
    pub country: String,
}

// ---------------------------------------------------------------------------
// Derived tables
// ---------------------------------------------------------------------------

/// One retained transaction projected for the sales snapshot.
/// Invariants: `quantity > 0`, `total_price > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesFact {
    pub country: String,
    pub customer_id: String,
    pub invoice_year_month: YearMonth,
    pub description: String,
    pub quantity: i64,
    pub total_price: Decimal,
}

/// Customer-value segment, labeled from the (R_Score, F_Score) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    Hibernating,
    AtRisk,
    CannotLose,
    AboutToSleep,
    NeedsAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    pub fn label(&self) -> &'static str {
        match self {
            Segment::Hibernating => "Hibernating",
            Segment::AtRisk => "At Risk",
            Segment::CannotLose => "Cannot Lose",
            Segment::AboutToSleep => "About to Sleep",
            Segment::NeedsAttention => "Needs Attention",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::Promising => "Promising",
            Segment::NewCustomers => "New Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::Champions => "Champions",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Hibernating" => Some(Segment::Hibernating),
            "At Risk" => Some(Segment::AtRisk),
            "Cannot Lose" => Some(Segment::CannotLose),
            "About to Sleep" => Some(Segment::AboutToSleep),
            "Needs Attention" => Some(Segment::NeedsAttention),
            "Loyal Customers" => Some(Segment::LoyalCustomers),
            "Promising" => Some(Segment::Promising),
            "New Customers" => Some(Segment::NewCustomers),
            "Potential Loyalists" => Some(Segment::PotentialLoyalists),
            "Champions" => Some(Segment::Champions),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One row per distinct customer with at least one retained transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRfm {
    pub customer_id: String,
    /// Days between the snapshot date and the latest purchase; always ≥ 1.
    pub recency: i64,
    /// Count of distinct invoice ids, not line items.
    pub frequency: i64,
    pub monetary: Decimal,
    pub r_score: u8,
    pub f_score: u8,
    pub m_score: u8,
    pub segment: Segment,
}

// ---------------------------------------------------------------------------
// PipelineOutput – the immutable run result
// ---------------------------------------------------------------------------

/// The two derived tables of one pipeline run. Constructed once, read-only
/// afterwards; the presentation layer filters it by exact match on country
/// or customer id.
#[derive(Debug)]
pub struct PipelineOutput {
    pub sales: Vec<SalesFact>,
    pub customers: Vec<CustomerRfm>,
}

impl PipelineOutput {
    /// Sales facts for a single country (exact match).
    pub fn sales_for_country<'a>(
        &'a self,
        country: &'a str,
    ) -> impl Iterator<Item = &'a SalesFact> {
        self.sales.iter().filter(move |fact| fact.country == country)
    }

    /// RFM row for one customer, if present.
    pub fn customer(&self, customer_id: &str) -> Option<&CustomerRfm> {
        self.customers
            .iter()
            .find(|row| row.customer_id == customer_id)
    }
}

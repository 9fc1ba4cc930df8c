use rust_decimal::Decimal;

use super::model::{CleanedTransaction, SalesFact, YearMonth};

/// Project cleaned transactions into the sales-facts table: per-row revenue
/// plus the invoice timestamp truncated to a calendar-month period.
pub fn derive_sales_facts(rows: &[CleanedTransaction]) -> Vec<SalesFact> {
    rows.iter()
        .map(|row| SalesFact {
            country: row.country.clone(),
            customer_id: row.customer_id.clone(),
            invoice_year_month: YearMonth::from_datetime(row.invoice_date),
            description: row.description.clone(),
            quantity: row.quantity,
            total_price: total_price(row),
        })
        .collect()
}

/// Exact line total. Decimal arithmetic so large runs never accumulate
/// float rounding error.
pub fn total_price(row: &CleanedTransaction) -> Decimal {
    Decimal::from(row.quantity) * row.unit_price
}

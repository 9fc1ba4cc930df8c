use rust_decimal::Decimal;

use super::model::{CleanedTransaction, RawTransaction};

/// Description keywords flagging administrative, non-product line items.
/// Matching is substring, case-insensitive.
pub const NON_PRODUCT_KEYWORDS: [&str; 10] = [
    "adjustment",
    "manual",
    "postage",
    "discount",
    "bank charges",
    "credit",
    "write off",
    "carriage",
    "dotcom",
    "amazon fee",
];

/// Invoices prefixed with this marker are cancellations/returns. They are
/// excluded entirely, never netted against sales.
pub const CANCELLATION_MARKER: char = 'C';

/// Per-rule counts of dropped rows. A dropped row is attributed to the
/// first rule that rejected it, in the order of the fields below; since the
/// rules are independent predicates the surviving set does not depend on
/// that order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub missing_customer: usize,
    pub non_product: usize,
    pub cancelled: usize,
    pub non_positive: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.missing_customer + self.non_product + self.cancelled + self.non_positive
    }
}

/// Keep only genuine product sales: rows with a customer id, a description
/// free of administrative keywords, a non-cancelled invoice, and positive
/// quantity and unit price.
pub fn clean(rows: Vec<RawTransaction>) -> (Vec<CleanedTransaction>, CleanReport) {
    let mut report = CleanReport::default();
    let mut kept = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(customer_id) = row.customer_id else {
            report.missing_customer += 1;
            continue;
        };
        if is_non_product(&row.description) {
            report.non_product += 1;
            continue;
        }
        if row.invoice.starts_with(CANCELLATION_MARKER) {
            report.cancelled += 1;
            continue;
        }
        if row.quantity <= 0 || row.unit_price <= Decimal::ZERO {
            report.non_positive += 1;
            continue;
        }
        kept.push(CleanedTransaction {
            invoice: row.invoice,
            customer_id,
            description: row.description,
            quantity: row.quantity,
            unit_price: row.unit_price,
            invoice_date: row.invoice_date,
            country: row.country,
        });
    }

    (kept, report)
}

/// True when the description names an administrative entry rather than a
/// product (postage, manual adjustments, fees, ...).
pub fn is_non_product(description: &str) -> bool {
    let lower = description.to_lowercase();
    NON_PRODUCT_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn row(
        invoice: &str,
        customer: Option<&str>,
        description: &str,
        quantity: i64,
        price: &str,
    ) -> RawTransaction {
        RawTransaction {
            invoice: invoice.to_string(),
            customer_id: customer.map(str::to_string),
            description: description.to_string(),
            quantity,
            unit_price: price.parse().unwrap(),
            invoice_date: dt(2010, 12, 1),
            country: "United Kingdom".to_string(),
        }
    }

    fn dt(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn keeps_valid_product_rows() {
        let (kept, report) = clean(vec![row("536365", Some("17850"), "PARTY BUNTING", 6, "4.95")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(report.dropped(), 0);
        assert_eq!(kept[0].customer_id, "17850");
    }

    #[test]
    fn drops_rows_without_customer() {
        let (kept, report) = clean(vec![row("536365", None, "PARTY BUNTING", 6, "4.95")]);
        assert!(kept.is_empty());
        assert_eq!(report.missing_customer, 1);
    }

    #[test]
    fn drops_every_banned_keyword_case_insensitively() {
        for keyword in NON_PRODUCT_KEYWORDS {
            let description = format!("Some {} entry", keyword.to_uppercase());
            let (kept, report) = clean(vec![row("1", Some("c"), &description, 1, "1.00")]);
            assert!(kept.is_empty(), "'{description}' should be dropped");
            assert_eq!(report.non_product, 1);
        }
    }

    #[test]
    fn manual_adjustment_fee_is_dropped_despite_valid_amounts() {
        let (kept, report) = clean(vec![row(
            "536365",
            Some("17850"),
            "Manual adjustment fee",
            3,
            "10.00",
        )]);
        assert!(kept.is_empty());
        assert_eq!(report.non_product, 1);
    }

    #[test]
    fn cancelled_invoices_are_dropped_despite_positive_amounts() {
        let (kept, report) = clean(vec![row("C123456", Some("17850"), "PARTY BUNTING", 6, "4.95")]);
        assert!(kept.is_empty());
        assert_eq!(report.cancelled, 1);
    }

    #[test]
    fn drops_non_positive_quantity_and_price() {
        let (kept, report) = clean(vec![
            row("1", Some("c"), "REFUND ROW", -2, "4.95"),
            row("2", Some("c"), "FREE SAMPLE", 1, "0.00"),
            row("3", Some("c"), "DATA ENTRY ZERO", 0, "4.95"),
        ]);
        assert!(kept.is_empty());
        assert_eq!(report.non_positive, 3);
    }

    #[test]
    fn survivors_satisfy_all_invariants() {
        let rows = vec![
            row("536365", Some("17850"), "WHITE METAL LANTERN", 6, "3.39"),
            row("C536366", Some("17850"), "WHITE METAL LANTERN", 6, "3.39"),
            row("536367", None, "WHITE METAL LANTERN", 6, "3.39"),
            row("536368", Some("17850"), "POSTAGE", 1, "18.00"),
            row("536369", Some("17850"), "WHITE METAL LANTERN", -6, "3.39"),
        ];
        let total = rows.len();
        let (kept, report) = clean(rows);

        assert_eq!(kept.len(), 1);
        assert_eq!(report.dropped(), total - kept.len());
        for tx in &kept {
            assert!(tx.quantity > 0);
            assert!(tx.unit_price > Decimal::ZERO);
            assert!(!tx.invoice.starts_with(CANCELLATION_MARKER));
            assert!(!is_non_product(&tx.description));
        }
    }
}

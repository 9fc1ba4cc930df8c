use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use chrono::{Duration, NaiveDateTime};
use log::info;
use rust_decimal::Decimal;

use super::error::PipelineError;
use super::facts::total_price;
use super::model::{CleanedTransaction, CustomerRfm, Segment};

// ---------------------------------------------------------------------------
// Per-customer aggregation
// ---------------------------------------------------------------------------

struct CustomerAgg<'a> {
    customer_id: &'a str,
    last_purchase: NaiveDateTime,
    invoices: HashSet<&'a str>,
    monetary: Decimal,
}

/// Compute one RFM row per distinct customer.
///
/// The snapshot date is one day past the latest invoice timestamp, so the
/// most recent buyer still has recency ≥ 1. Frequency counts distinct
/// invoice ids, never line items. Customers are grouped in first-seen input
/// order; the frequency quintiles depend on that ordering for tie-breaking.
pub fn compute_rfm(rows: &[CleanedTransaction]) -> Result<Vec<CustomerRfm>, PipelineError> {
    let latest = rows
        .iter()
        .map(|row| row.invoice_date)
        .max()
        .ok_or(PipelineError::EmptyAfterCleaning)?;
    let snapshot = latest + Duration::days(1);

    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut aggs: Vec<CustomerAgg> = Vec::new();
    for row in rows {
        let slot = *slots.entry(row.customer_id.as_str()).or_insert_with(|| {
            aggs.push(CustomerAgg {
                customer_id: row.customer_id.as_str(),
                last_purchase: row.invoice_date,
                invoices: HashSet::new(),
                monetary: Decimal::ZERO,
            });
            aggs.len() - 1
        });
        let agg = &mut aggs[slot];
        agg.last_purchase = agg.last_purchase.max(row.invoice_date);
        agg.invoices.insert(row.invoice.as_str());
        agg.monetary += total_price(row);
    }

    let recency: Vec<i64> = aggs
        .iter()
        .map(|a| (snapshot - a.last_purchase).num_days())
        .collect();
    let frequency: Vec<i64> = aggs.iter().map(|a| a.invoices.len() as i64).collect();
    let monetary: Vec<Decimal> = aggs.iter().map(|a| a.monetary).collect();

    let r_bins = quintile_bins(&recency, TieRule::MergeEqual, "recency")?;
    let f_bins = quintile_bins(&frequency, TieRule::FirstSeen, "frequency")?;
    let m_bins = quintile_bins(&monetary, TieRule::MergeEqual, "monetary")?;

    let mut out = Vec::with_capacity(aggs.len());
    for (i, agg) in aggs.iter().enumerate() {
        // recency scoring is inverted: the most recent buyers score 5
        let r_score = 6 - r_bins[i];
        let f_score = f_bins[i];
        let m_score = m_bins[i];
        let segment = segment_for(r_score, f_score)
            .ok_or(PipelineError::UnlabeledScores { r: r_score, f: f_score })?;
        out.push(CustomerRfm {
            customer_id: agg.customer_id.to_string(),
            recency: recency[i],
            frequency: frequency[i],
            monetary: monetary[i],
            r_score,
            f_score,
            m_score,
            segment,
        });
    }

    info!(
        "computed RFM for {} customers (snapshot date {snapshot})",
        out.len()
    );
    Ok(out)
}

// ---------------------------------------------------------------------------
// Quintile scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TieRule {
    /// Equal values are split across bins by stable first-seen order
    /// (rank "first"). Used for frequency, where many customers share
    /// identical invoice counts.
    FirstSeen,
    /// Equal values all land in the bin of their lowest rank, matching
    /// quantile-edge semantics. Used for recency and monetary.
    MergeEqual,
}

/// Assign each value a quintile bin in 1..=5 over the whole population.
///
/// Bins follow rank interpolation: with values ranked ascending (0-based
/// rank `p`, population `n`), bin = max(1, ceil(5p / (n-1))). Boundaries are
/// a property of the run's own distribution, not absolute thresholds.
fn quintile_bins<T: Ord>(
    values: &[T],
    ties: TieRule,
    metric: &'static str,
) -> Result<Vec<u8>, PipelineError> {
    let n = values.len();
    if n < 2 {
        return Err(PipelineError::DegenerateDistribution {
            metric,
            reason: format!("need at least 2 customers, got {n}"),
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    // stable sort keeps first-seen order among ties
    order.sort_by(|&a, &b| values[a].cmp(&values[b]));

    if ties == TieRule::MergeEqual && values[order[0]] == values[order[n - 1]] {
        return Err(PipelineError::DegenerateDistribution {
            metric,
            reason: "all customers share one value; quintile edges are undefined".to_string(),
        });
    }

    let mut bins = vec![0u8; n];
    let mut prev_bin = 1u8;
    for (pos, &idx) in order.iter().enumerate() {
        let mut bin = if pos == 0 {
            1
        } else {
            ((5 * pos + n - 2) / (n - 1)) as u8
        };
        if ties == TieRule::MergeEqual && pos > 0 && values[idx] == values[order[pos - 1]] {
            bin = prev_bin;
        }
        bins[idx] = bin;
        prev_bin = bin;
    }
    Ok(bins)
}

// ---------------------------------------------------------------------------
// Segment rules
// ---------------------------------------------------------------------------

type SegmentRule = (RangeInclusive<u8>, RangeInclusive<u8>, Segment);

/// Ordered (R_Score, F_Score) → segment rules, first match wins. M_Score
/// never participates. The ten rules together cover every pair in
/// 1..=5 × 1..=5 (see the exhaustiveness test below).
const SEGMENT_RULES: [SegmentRule; 10] = [
    (1..=2, 1..=2, Segment::Hibernating),
    (1..=2, 3..=4, Segment::AtRisk),
    (1..=2, 5..=5, Segment::CannotLose),
    (3..=3, 1..=2, Segment::AboutToSleep),
    (3..=3, 3..=3, Segment::NeedsAttention),
    (3..=4, 4..=5, Segment::LoyalCustomers),
    (4..=4, 1..=1, Segment::Promising),
    (5..=5, 1..=1, Segment::NewCustomers),
    (4..=5, 2..=3, Segment::PotentialLoyalists),
    (5..=5, 4..=5, Segment::Champions),
];

/// Label a customer from the R/F score pair.
pub fn segment_for(r_score: u8, f_score: u8) -> Option<Segment> {
    SEGMENT_RULES
        .iter()
        .find(|(r, f, _)| r.contains(&r_score) && f.contains(&f_score))
        .map(|&(_, _, segment)| segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn tx(customer: &str, invoice: &str, date: NaiveDateTime, price: &str) -> CleanedTransaction {
        CleanedTransaction {
            invoice: invoice.to_string(),
            customer_id: customer.to_string(),
            description: "PARTY BUNTING".to_string(),
            quantity: 1,
            unit_price: price.parse().unwrap(),
            invoice_date: date,
            country: "United Kingdom".to_string(),
        }
    }

    /// Five customers with strictly increasing recency, frequency and spend
    /// so every metric has distinct values.
    fn five_customer_rows() -> Vec<CleanedTransaction> {
        let mut rows = Vec::new();
        for (i, customer) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            let day = 1 + i as u32 * 5;
            for inv in 0..=i {
                rows.push(tx(
                    customer,
                    &format!("{customer}-{inv}"),
                    dt(2011, 1, day + inv as u32, 9),
                    &format!("{}.00", i + 1),
                ));
            }
        }
        rows
    }

    #[test]
    fn frequency_counts_distinct_invoices_not_line_items() {
        let mut rows = five_customer_rows();
        // customer "x": 2 invoices with 3 line items each
        for inv in ["900001", "900002"] {
            for _ in 0..3 {
                rows.push(tx("x", inv, dt(2011, 2, 1, 9), "2.00"));
            }
        }
        let result = compute_rfm(&rows).unwrap();
        let x = result.iter().find(|c| c.customer_id == "x").unwrap();
        assert_eq!(x.frequency, 2);
    }

    #[test]
    fn recency_is_at_least_one() {
        let result = compute_rfm(&five_customer_rows()).unwrap();
        assert!(result.iter().all(|c| c.recency >= 1));
    }

    #[test]
    fn most_recent_customer_scores_r5() {
        let result = compute_rfm(&five_customer_rows()).unwrap();
        let most_recent = result.iter().min_by_key(|c| c.recency).unwrap();
        assert_eq!(most_recent.recency, 1);
        assert_eq!(most_recent.r_score, 5);
    }

    #[test]
    fn monetary_is_exact_sum_of_line_totals() {
        let result = compute_rfm(&five_customer_rows()).unwrap();
        let e = result.iter().find(|c| c.customer_id == "e").unwrap();
        // five invoices of 1 × 5.00
        assert_eq!(e.monetary, Decimal::new(2500, 2));
    }

    #[test]
    fn quintiles_partition_population_evenly() {
        let values: Vec<i64> = (1..=10).collect();
        let bins = quintile_bins(&values, TieRule::MergeEqual, "recency").unwrap();
        for bin in 1..=5u8 {
            assert_eq!(bins.iter().filter(|&&b| b == bin).count(), 2);
        }
    }

    #[test]
    fn all_scores_stay_in_range() {
        let values: Vec<i64> = (0..137).map(|i| i * 3 + 1).collect();
        let bins = quintile_bins(&values, TieRule::MergeEqual, "monetary").unwrap();
        assert!(bins.iter().all(|&b| (1..=5).contains(&b)));
    }

    #[test]
    fn merge_equal_gives_tied_values_one_bin() {
        let values: Vec<i64> = vec![1, 5, 5, 7, 9, 11];
        let bins = quintile_bins(&values, TieRule::MergeEqual, "monetary").unwrap();
        assert_eq!(bins, vec![1, 1, 1, 3, 4, 5]);
    }

    #[test]
    fn first_seen_splits_ties_in_input_order() {
        let values: Vec<i64> = vec![3, 3, 3, 3, 3];
        let bins = quintile_bins(&values, TieRule::FirstSeen, "frequency").unwrap();
        assert_eq!(bins, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn identical_population_is_degenerate_for_merged_metrics() {
        let values: Vec<i64> = vec![4, 4, 4, 4];
        let err = quintile_bins(&values, TieRule::MergeEqual, "recency").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DegenerateDistribution { metric: "recency", .. }
        ));
    }

    #[test]
    fn single_customer_is_degenerate() {
        let rows = vec![tx("a", "1", dt(2011, 1, 1, 9), "1.00")];
        let err = compute_rfm(&rows).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateDistribution { .. }));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = compute_rfm(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyAfterCleaning));
    }

    #[test]
    fn segment_rules_cover_all_25_score_pairs() {
        for r in 1..=5u8 {
            for f in 1..=5u8 {
                assert!(
                    segment_for(r, f).is_some(),
                    "no rule covers R={r}, F={f}"
                );
            }
        }
    }

    #[test]
    fn segment_spot_checks() {
        assert_eq!(segment_for(5, 5), Some(Segment::Champions));
        assert_eq!(segment_for(5, 4), Some(Segment::Champions));
        assert_eq!(segment_for(1, 1), Some(Segment::Hibernating));
        assert_eq!(segment_for(2, 2), Some(Segment::Hibernating));
        assert_eq!(segment_for(1, 4), Some(Segment::AtRisk));
        assert_eq!(segment_for(2, 5), Some(Segment::CannotLose));
        assert_eq!(segment_for(3, 1), Some(Segment::AboutToSleep));
        assert_eq!(segment_for(3, 3), Some(Segment::NeedsAttention));
        assert_eq!(segment_for(3, 4), Some(Segment::LoyalCustomers));
        assert_eq!(segment_for(4, 5), Some(Segment::LoyalCustomers));
        assert_eq!(segment_for(4, 1), Some(Segment::Promising));
        assert_eq!(segment_for(5, 1), Some(Segment::NewCustomers));
        assert_eq!(segment_for(4, 2), Some(Segment::PotentialLoyalists));
        assert_eq!(segment_for(5, 3), Some(Segment::PotentialLoyalists));
    }

    #[test]
    fn segment_ignores_monetary_score() {
        // Two populations identical in R/F structure but with very different
        // spend: every customer keeps the same segment.
        let cheap = compute_rfm(&five_customer_rows()).unwrap();
        let pricey_rows: Vec<CleanedTransaction> = five_customer_rows()
            .into_iter()
            .map(|mut t| {
                t.unit_price *= Decimal::from(1000);
                t
            })
            .collect();
        let pricey = compute_rfm(&pricey_rows).unwrap();
        for (a, b) in cheap.iter().zip(&pricey) {
            assert_eq!(a.customer_id, b.customer_id);
            assert_eq!(a.segment, b.segment);
        }
    }
}

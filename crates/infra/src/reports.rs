//! Read-only reporting over the ledger.
//!
//! Aggregation only: these queries consume committed movements and add no
//! new invariants. Units/revenue are derived from `SALE_OFFLINE` rows net of
//! their `CANCEL_SALE` reversals; rows without a price snapshot contribute
//! units but no revenue.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use stockbook_core::ProductId;

/// Optional closed-open time window for report queries.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ReportRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ReportRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        if let Some(from) = self.from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if at >= to {
                return false;
            }
        }
        true
    }
}

/// Shop-wide sales totals over a window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SalesSummary {
    /// Units sold net of cancellations.
    pub units_sold: i64,
    /// Gross revenue in cents, net of cancellations.
    pub gross_revenue_cents: i64,
    pub sales: i64,
    pub cancellations: i64,
}

/// Per-day totals (UTC calendar days), ascending by day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub day: NaiveDate,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

/// Per-product totals, descending by revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTotal {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: i64,
    pub revenue_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn range_bounds_are_closed_open() {
        let from = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        let range = ReportRange {
            from: Some(from),
            to: Some(to),
        };

        assert!(range.contains(from));
        assert!(!range.contains(to));
        assert!(range.contains(from + chrono::Duration::days(10)));
        assert!(!range.contains(from - chrono::Duration::seconds(1)));
    }

    #[test]
    fn unbounded_range_contains_everything() {
        let range = ReportRange::default();
        assert!(range.contains(Utc::now()));
    }
}

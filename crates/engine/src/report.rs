use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tradesync_core::*;

/// Outcome of one successful sync: the orders plus how the run went.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub exchange: ExchangeName,
    pub window: SyncWindow,
    /// Orders in the order the exchange served them.
    pub orders: Vec<Order>,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Earliest order timestamp, whatever the fetch direction.
    pub fn first_datetime(&self) -> Option<DateTime<Utc>> {
        self.orders.iter().map(|o| o.datetime).min()
    }

    pub fn last_datetime(&self) -> Option<DateTime<Utc>> {
        self.orders.iter().map(|o| o.datetime).max()
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            exchange: self.exchange,
            start: self.window.start,
            end: self.window.end,
            orders: self.order_count(),
            first_datetime: self.first_datetime(),
            last_datetime: self.last_datetime(),
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Serializable digest of a [`SyncReport`], without the order payloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub exchange: ExchangeName,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub orders: usize,
    pub first_datetime: Option<DateTime<Utc>>,
    pub last_datetime: Option<DateTime<Utc>>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tradesync_exchanges_common::scripted::sample_orders;

    #[test]
    fn test_bounds_ignore_fetch_direction() {
        let mut orders = sample_orders(ExchangeName::Kraken, 0, 3);
        orders.reverse();
        let window = SyncWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let report = SyncReport {
            exchange: ExchangeName::Kraken,
            window,
            orders,
            elapsed: Duration::from_millis(6000),
        };

        let summary = report.summary();
        assert_eq!(summary.orders, 3);
        assert_eq!(summary.first_datetime, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(summary.last_datetime, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap()));
        assert_eq!(summary.elapsed_ms, 6000);
    }

    #[test]
    fn test_empty_report() {
        let now = Utc::now();
        let report = SyncReport {
            exchange: ExchangeName::Bitstamp,
            window: SyncWindow::new(now, now).unwrap(),
            orders: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(report.order_count(), 0);
        assert_eq!(report.first_datetime(), None);
        assert_eq!(report.last_datetime(), None);
    }
}

use chrono::NaiveDate;
use log::info;

use crate::expiry::{dynamic_status, ExpiryBand};
use crate::models::SavedProduct;

/// Where urgent-stock summaries go. Fire-and-forget; implementations swallow
/// their own failures. Actual OS notification display lives outside this
/// crate.
pub trait AlertSink: Send + Sync {
    fn urgent_stock(&self, count: usize);
}

/// Default sink: a log line, useful for the CLI and headless deployments.
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn urgent_stock(&self, count: usize) {
        info!("{count} tracked product(s) are expired or expiring within a week");
    }
}

/// Products that are expired or expiring within the week, in input order.
pub fn urgent_products<'a>(
    products: &'a [SavedProduct],
    today: NaiveDate,
) -> Vec<&'a SavedProduct> {
    products
        .iter()
        .filter(|p| {
            matches!(
                dynamic_status(p.record.expiry_date.as_deref(), today).band,
                ExpiryBand::Expired | ExpiryBand::Soon
            )
        })
        .collect()
}

/// Notify the sink when anything urgent exists. Returns the urgent count;
/// the sink is not bothered when there is nothing to report.
pub fn dispatch_urgent(sink: &dyn AlertSink, products: &[SavedProduct], today: NaiveDate) -> usize {
    let urgent = urgent_products(products, today);
    if !urgent.is_empty() {
        sink.urgent_stock(urgent.len());
    }
    urgent.len()
}

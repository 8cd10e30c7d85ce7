//! Rule-based order risk score in `[0, 1]`.

use crate::orders::ShopifyOrder;

/// Orders above this total are considered high value.
pub const HIGH_VALUE_THRESHOLD: f64 = 5000.0;

const COUNTRY_MISMATCH_WEIGHT: f64 = 0.3;
const HIGH_VALUE_WEIGHT: f64 = 0.4;

/// Score an order.
///
/// - billing and shipping country differ: +0.3 (two absent countries match)
/// - total above 5000: +0.4
pub fn score(order: &ShopifyOrder) -> f64 {
    let mut score = 0.0_f64;

    if order.billing_country != order.shipping_country {
        score += COUNTRY_MISMATCH_WEIGHT;
    }
    if order.amount > HIGH_VALUE_THRESHOLD {
        score += HIGH_VALUE_WEIGHT;
    }

    f64::clamp(score, 0.0, 1.0)
}

//! Daily rate splitting across concurrent task assignments.
//!
//! A worker present on N eligible tasks earns `rate / N` on each. Shares are
//! allocated in whole cents: leftover cents go to the assignments with the
//! lowest task ids, so the shares always sum to the full rate and the same
//! inputs always produce the same shares.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::WorkLog;

const CENT: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Splits a daily rate into `assignments` shares that sum to the rate.
///
/// The rate is first rounded to cents. Returns an empty vector when there
/// are no assignments.
///
/// # Examples
///
/// ```
/// use labor_cost_engine::calculation::split_daily_rate;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let shares = split_daily_rate(Decimal::from_str("90.00").unwrap(), 3);
/// assert_eq!(shares, vec![Decimal::from_str("30.00").unwrap(); 3]);
///
/// let shares = split_daily_rate(Decimal::from_str("100").unwrap(), 3);
/// let total: Decimal = shares.iter().sum();
/// assert_eq!(total, Decimal::from_str("100").unwrap());
/// assert_eq!(shares[0], Decimal::from_str("33.34").unwrap());
/// ```
pub fn split_daily_rate(rate: Decimal, assignments: usize) -> Vec<Decimal> {
    if assignments == 0 {
        return Vec::new();
    }

    let total = rate.round_dp(2);
    let count = Decimal::from(assignments as u64);
    let base = (total / count).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let leftover_cents = ((total - base * count) / CENT).to_usize().unwrap_or(0);

    (0..assignments)
        .map(|i| if i < leftover_cents { base + CENT } else { base })
        .collect()
}

/// Recomputes the correct split for every work log of one worker and date.
///
/// Logs are ordered by task id, the rate is split across all of them, and
/// a corrected copy is returned for every log whose stored share differs
/// from its recomputed share by more than `tolerance`, or whose split
/// factor or original rate is stale.
pub fn reconcile_split(
    logs: &[WorkLog],
    daily_rate: Decimal,
    tolerance: Decimal,
    now: DateTime<Utc>,
) -> Vec<WorkLog> {
    let mut ordered: Vec<&WorkLog> = logs.iter().collect();
    ordered.sort_by(|a, b| a.task_id.cmp(&b.task_id));

    let shares = split_daily_rate(daily_rate, ordered.len());
    let split_factor = ordered.len() as u32;

    ordered
        .into_iter()
        .zip(shares)
        .filter(|(log, share)| {
            (log.daily_rate - *share).abs() > tolerance
                || log.split_factor != split_factor
                || log.original_daily_rate != daily_rate
        })
        .map(|(log, share)| WorkLog {
            daily_rate: share,
            original_daily_rate: daily_rate,
            split_factor,
            updated_at: now,
            ..log.clone()
        })
        .collect()
}

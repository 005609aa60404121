//! Order numbers
//!
//! "P" + 14-digit timestamp + 4-digit sub-second tiebreaker + 6-digit
//! random suffix. The number doubles as the gateway's out_trade_no.

use chrono::{DateTime, TimeZone, Timelike};
use rand::Rng;

pub const ORDER_NUMBER_LEN: usize = 25;

pub fn generate<Tz>(now: DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format_number(now, suffix)
}

fn format_number<Tz>(now: DateTime<Tz>, suffix: u32) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "P{}{:04}{:06}",
        now.format("%Y%m%d%H%M%S"),
        now.nanosecond() % 10_000,
        suffix % 1_000_000
    )
}

/// Shape check for inbound callbacks
pub fn is_well_formed(number: &str) -> bool {
    number.len() == ORDER_NUMBER_LEN
        && number.starts_with('P')
        && number[1..].bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use std::collections::HashSet;

    #[test]
    fn layout() {
        let zone = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = zone
            .with_ymd_and_hms(2025, 3, 9, 7, 5, 2)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();
        assert_eq!(format_number(at, 42), "P202503090705026789000042");
        assert!(is_well_formed(&format_number(at, 42)));
    }

    #[test]
    fn generated_numbers_are_well_formed_and_distinct() {
        let numbers: HashSet<_> = (0..500).map(|_| generate(Utc::now())).collect();
        assert!(numbers.len() > 490);
        assert!(numbers.iter().all(|n| is_well_formed(n)));
    }

    #[test]
    fn rejects_malformed() {
        assert!(!is_well_formed("X202503090705026789000042"));
        assert!(!is_well_formed("P2025"));
        assert!(!is_well_formed("P20250309070502678900004a"));
    }
}

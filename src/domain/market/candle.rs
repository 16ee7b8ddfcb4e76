use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::asset::TradingPair;

/// One OHLCV bucket for a trading pair. A candle is in-progress until its
/// bucket boundary is crossed, at which point it is closed and immutable;
/// this type makes no distinction in representation, only in how callers
/// treat it (mutate in place while in-progress, move by value once closed).
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub pair: TradingPair,
    pub start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub base_volume: Decimal,
    pub counter_volume: Decimal,
}

impl Candle {
    /// Begins a new in-progress candle from the first trade row observed.
    pub fn open_with(
        pair: TradingPair,
        start: DateTime<Utc>,
        price: Decimal,
        base_amount: Decimal,
        counter_amount: Decimal,
    ) -> Self {
        Self {
            pair,
            start,
            open: price,
            high: price,
            low: price,
            close: price,
            base_volume: base_amount,
            counter_volume: counter_amount,
        }
    }

    /// Folds one more trade row into this in-progress candle.
    pub fn update(&mut self, price: Decimal, base_amount: Decimal, counter_amount: Decimal) {
        self.close = price;
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.base_volume += base_amount;
        self.counter_volume += counter_amount;
    }

    /// Merges a subsequent same-bucket candle into this aggregate, per the
    /// fan-out's merge rule: close tracks the later candle, high/low widen,
    /// volumes sum.
    pub fn merge(&mut self, next: &Candle) {
        self.close = next.close;
        if next.high > self.high {
            self.high = next.high;
        }
        if next.low < self.low {
            self.low = next.low;
        }
        self.base_volume += next.base_volume;
        self.counter_volume += next.counter_volume;
    }

    /// `low ≤ open, close ≤ high` and both volumes non-negative.
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.base_volume >= Decimal::ZERO
            && self.counter_volume >= Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::asset::Asset;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::issued("USD", "IssuerA"))
    }

    #[test]
    fn scenario_1_three_trades_same_minute_then_a_new_minute() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut candle = Candle::open_with(pair(), start, dec!(0.10), dec!(100), dec!(10));
        candle.update(dec!(0.12), dec!(50), dec!(6));
        candle.update(dec!(0.11), dec!(200), dec!(22));

        assert_eq!(candle.open, dec!(0.10));
        assert_eq!(candle.high, dec!(0.12));
        assert_eq!(candle.low, dec!(0.10));
        assert_eq!(candle.close, dec!(0.11));
        assert_eq!(candle.base_volume, dec!(350));
        assert!(candle.is_valid());
    }

    #[test]
    fn merge_identity_matches_folding_rows_directly() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut folded = Candle::open_with(pair(), start, dec!(1), dec!(1), dec!(1));
        folded.update(dec!(2), dec!(1), dec!(1));
        folded.update(dec!(0.5), dec!(1), dec!(1));

        let mut first = Candle::open_with(pair(), start, dec!(1), dec!(1), dec!(1));
        let mut second = Candle::open_with(pair(), start, dec!(2), dec!(1), dec!(1));
        second.update(dec!(0.5), dec!(1), dec!(1));
        first.merge(&second);

        assert_eq!(folded, first);
    }

    #[test]
    fn invalid_when_low_above_open() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut c = Candle::open_with(pair(), start, dec!(1), dec!(0), dec!(0));
        c.low = dec!(2);
        assert!(!c.is_valid());
    }
}

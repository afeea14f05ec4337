//! Delta codec: raw `{price, qty}` entries to book side mutations.
//!
//! Parsing and applying are split so a caller can parse every side of a
//! message first and only touch book state once the whole message is known
//! to be valid.

use rust_decimal::Decimal;

use super::side::{BookSide, PriceLevel};
use crate::error::Error;
use crate::types::messages::{parse_decimal, RawLevel};

/// Parse raw entries into decimal `(price, size)` pairs
///
/// # Errors
///
/// Returns [`Error::MalformedMessage`] if a price or quantity is not a
/// decimal, or a quantity is negative.
pub fn parse_levels(raw: &[RawLevel]) -> Result<Vec<PriceLevel>, Error> {
    raw.iter().map(parse_level).collect()
}

fn parse_level(raw: &RawLevel) -> Result<PriceLevel, Error> {
    let price = parse_decimal(&raw.price)
        .ok_or_else(|| Error::malformed(format!("invalid level price {:?}", raw.price)))?;
    let size = parse_decimal(&raw.qty)
        .ok_or_else(|| Error::malformed(format!("invalid level qty {:?}", raw.qty)))?;
    if size < Decimal::ZERO {
        return Err(Error::malformed(format!("negative level qty {:?}", raw.qty)));
    }
    Ok((price, size))
}

/// Apply parsed levels to a side in order
///
/// Size 0 removes the price level, any other size inserts or overwrites it.
/// Entries need not be sorted; when a price repeats the last entry wins.
pub fn apply_deltas(side: &mut BookSide, levels: &[PriceLevel]) {
    for &(price, size) in levels {
        side.store(price, size);
    }
}

/// Parse and apply raw entries in one step
///
/// The side is left untouched if any entry fails to parse.
///
/// # Errors
///
/// See [`parse_levels`].
pub fn apply_raw(side: &mut BookSide, raw: &[RawLevel]) -> Result<(), Error> {
    let levels = parse_levels(raw)?;
    apply_deltas(side, &levels);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::side::SideKind;
    use rust_decimal_macros::dec;

    fn raw(levels: &[(&str, &str)]) -> Vec<RawLevel> {
        levels.iter().map(|(p, q)| RawLevel::new(*p, *q)).collect()
    }

    #[test]
    fn test_apply_is_idempotent() {
        let levels = raw(&[("100", "1"), ("101", "2"), ("99", "0.5")]);

        let mut once = BookSide::new(SideKind::Bids);
        apply_raw(&mut once, &levels).unwrap();

        let mut twice = BookSide::new(SideKind::Bids);
        apply_raw(&mut twice, &levels).unwrap();
        apply_raw(&mut twice, &levels).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_zero_size_in_same_message_removes() {
        let mut asks = BookSide::new(SideKind::Asks);
        apply_raw(&mut asks, &raw(&[("100", "3"), ("101", "1"), ("100", "0")])).unwrap();

        assert_eq!(asks.get(&dec!(100)), None);
        assert_eq!(asks.get(&dec!(101)), Some(dec!(1)));
    }

    #[test]
    fn test_last_write_wins() {
        let mut bids = BookSide::new(SideKind::Bids);
        apply_raw(&mut bids, &raw(&[("100", "3"), ("100.0", "4")])).unwrap();

        assert_eq!(bids.len(), 1);
        assert_eq!(bids.get(&dec!(100)), Some(dec!(4)));
    }

    #[test]
    fn test_decimal_precision_is_kept() {
        let mut bids = BookSide::new(SideKind::Bids);
        apply_raw(&mut bids, &raw(&[("58292000", "0.10450000000000000001")])).unwrap();
        assert_eq!(
            bids.get(&dec!(58292000)),
            Some(dec!(0.10450000000000000001))
        );
    }

    #[test]
    fn test_bad_entry_leaves_side_untouched() {
        let mut asks = BookSide::new(SideKind::Asks);
        asks.store(dec!(5), dec!(1));

        let result = apply_raw(&mut asks, &raw(&[("6", "1"), ("7", "lots")]));
        assert!(matches!(result, Err(Error::MalformedMessage(_))));
        assert_eq!(asks.len(), 1);

        assert!(parse_levels(&raw(&[("6", "-1")])).is_err());
    }
}

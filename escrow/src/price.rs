//! The interface to the price oracle, and the collateralization math that
//! uses it.

use crate::error::Error;

/// A source of the bitcoin price.
pub trait PriceFeed {
    /// The value of one satoshi, in the unit that custody bonds are
    /// denominated in.
    fn satoshi_price(&self) -> Result<u128, Error>;
}

/// The value of the custody bonds as a percentage of the value of the
/// deposited bitcoin.
///
/// A lot with no value, because either the lot size or the price is
/// zero, is treated as infinitely collateralized.
pub fn collateralization_percent(bonded_value: u128, lot_size: u64, satoshi_price: u128) -> u128 {
    let lot_value = u128::from(lot_size).saturating_mul(satoshi_price);
    if lot_value == 0 {
        return u128::MAX;
    }
    bonded_value.saturating_mul(100) / lot_value
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(150, 100, 1 => 150; "over collateralized")]
    #[test_case(1249, 1000, 1 => 124; "rounds down")]
    #[test_case(0, 100, 1 => 0; "no bonds")]
    #[test_case(10, 0, 1 => u128::MAX; "empty lot")]
    #[test_case(10, 100, 0 => u128::MAX; "worthless bitcoin")]
    fn computes_percentages(bonded: u128, lot: u64, price: u128) -> u128 {
        collateralization_percent(bonded, lot, price)
    }
}

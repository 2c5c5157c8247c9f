//! Donation classification over explorer transactions.
//!
//! A transaction is a donation when the monitored address receives value and
//! did not fund any of the inputs. Spending from the monitored wallet (including
//! change outputs back to it) is never a donation.

use rust_decimal::Decimal;

use super::types::Transaction;

/// Decimal places between koinu and whole DOGE (1 DOGE = 10^8 koinu)
pub const DOGE_DECIMALS: u32 = 8;

/// Convert an amount in koinu to whole DOGE without rounding
#[must_use]
pub fn to_whole_units(amount: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(amount), DOGE_DECIMALS)
}

/// Whether `tx` is an inbound donation to `monitored`.
///
/// An input from the monitored address takes precedence over any matching output.
#[must_use]
pub fn is_donation(tx: &Transaction, monitored: &str) -> bool {
    let spends_from_monitored = tx
        .inputs
        .iter()
        .any(|input| input.addresses.iter().any(|a| a == monitored));
    if spends_from_monitored {
        return false;
    }

    tx.outputs
        .iter()
        .any(|output| output.addresses.iter().any(|a| a == monitored))
}

/// Sum of every output paying `monitored`, in whole DOGE
#[must_use]
pub fn donation_amount(tx: &Transaction, monitored: &str) -> Decimal {
    // more than one output can pay the same address
    let koinu: u128 = tx
        .outputs
        .iter()
        .filter(|output| output.addresses.iter().any(|a| a == monitored))
        .map(|output| u128::from(output.value))
        .sum();
    Decimal::from_i128_with_scale(koinu as i128, DOGE_DECIMALS)
}

/// First address of the first input. Multi-input transactions are attributed to that address only.
#[must_use]
pub fn attributed_sender(tx: &Transaction) -> Option<&str> {
    tx.inputs
        .first()
        .and_then(|input| input.addresses.first())
        .map(String::as_str)
}

//! Timestamps, decimals, currency amounts and percentages.
//!
//! Run with: cargo run --example extended_types

use btoon::{from_slice, to_vec, Currency, Decimal, Percentage, Timestamp};
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Invoice {
    number: String,
    issued: Timestamp,
    subtotal: Decimal,
    tax_rate: Percentage,
    total: Currency,
}

fn main() -> Result<(), Box<dyn Error>> {
    let invoice = Invoice {
        number: "INV-0042".to_string(),
        issued: Timestamp::new(1_718_000_000_000_000_000, Some(120))?,
        subtotal: Decimal::new(12345, 2),
        tax_rate: Percentage::from_ratio(Decimal::new(19, 2)),
        total: Currency::new(Decimal::new(14691, 2), "EUR")?,
    };

    let bytes = to_vec(&invoice)?;
    println!("{} bytes", bytes.len());

    let back: Invoice = from_slice(&bytes)?;
    assert_eq!(invoice, back);

    println!("issued:   {}", back.issued);
    println!("subtotal: {}", back.subtotal);
    println!("tax:      {}", back.tax_rate);
    println!("total:    {}", back.total);
    println!("✓ Exact round-trip, no floating point involved");
    Ok(())
}

//! Lists of uniform maps are stored column by column.
//!
//! Run with: cargo run --example tabular

use btoon::tabular::{analyze, ColumnData, TabularBlock};
use btoon::{decode, encode_with_options, to_value, EncodeOptions};
use serde::Serialize;
use std::error::Error;

#[derive(Serialize)]
struct Trade {
    symbol: &'static str,
    quantity: i64,
    price: f64,
    note: Option<&'static str>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let trades = vec![
        Trade { symbol: "AAPL", quantity: 100, price: 189.5, note: None },
        Trade { symbol: "MSFT", quantity: 250, price: 411.25, note: Some("block") },
        Trade { symbol: "NVDA", quantity: 40, price: 903.1, note: None },
        Trade { symbol: "AMZN", quantity: 75, price: 178.0, note: None },
    ];
    let value = to_value(&trades)?;

    if let Some(shape) = value.as_list().and_then(|rows| analyze(rows, 2)) {
        println!("Tabular eligible: {} rows", shape.rows);
        for column in &shape.columns {
            println!("  {:<10} {:<8} nullable={}", column.name, column.kind.name(), column.nullable);
        }
    }

    let columnar = encode_with_options(&value, &EncodeOptions::new())?;
    let row_major = encode_with_options(&value, &EncodeOptions::new().with_auto_tabular(false))?;
    println!("\nColumnar:  {} bytes", columnar.len());
    println!("Row-major: {} bytes", row_major.len());
    assert_eq!(decode(&columnar)?, decode(&row_major)?);

    let rows = value.as_list().map(Vec::as_slice).unwrap_or_default();
    if let Some(block) = TabularBlock::from_rows(rows) {
        if let Some(ColumnData::Int(quantities)) = block.column("quantity").map(|c| &c.data) {
            let total: i64 = quantities.iter().flatten().sum();
            println!("\nTotal quantity: {}", total);
        }
    }

    println!("✓ Columnar and row-major decode to the same rows");
    Ok(())
}

//! Basic BTOON serialization and deserialization.
//!
//! Run with: cargo run --example simple

use btoon::{decode, from_slice, to_vec};
use serde::{Deserialize, Serialize};
use std::error::Error;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct User {
    id: u32,
    name: String,
    email: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let user = User {
        id: 42,
        name: "Alice Johnson".to_string(),
        email: "alice@example.com".to_string(),
    };

    let bytes = to_vec(&user)?;
    println!("{} bytes: {:02x?}\n", bytes.len(), bytes);

    // The same buffer read as an untyped value tree
    println!("As a value: {}\n", decode(&bytes)?);

    let user_back: User = from_slice(&bytes)?;
    assert_eq!(user, user_back);
    println!("✓ Round-trip successful");

    Ok(())
}

//! Prints a bcrypt hash for ADMIN_PASSWORD_HASH.
//!
//! Usage: `cargo run --bin hash-password <PASSWORD> [COST]`

use std::env;

use storefront_backend::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};

fn main() {
    let mut args = env::args().skip(1);
    let password = args.next().unwrap_or_else(|| {
        eprintln!("Usage: cargo run --bin hash-password <PASSWORD> [COST]");
        std::process::exit(1);
    });
    let cost = match args.next() {
        Some(raw) => match raw.parse::<u32>() {
            Ok(cost) if (MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) => cost,
            _ => {
                eprintln!(
                    "Cost must be a number between {} and {}",
                    MIN_BCRYPT_COST, MAX_BCRYPT_COST
                );
                std::process::exit(1);
            }
        },
        None => bcrypt::DEFAULT_COST,
    };

    match bcrypt::hash(&password, cost) {
        Ok(hashed) => {
            println!("\nCost     : {}", cost);
            println!("Hash     : {}\n", hashed);
            println!("# Paste this into your .env:");
            println!("ADMIN_PASSWORD_HASH={}", hashed);
        }
        Err(e) => {
            eprintln!("Error hashing password: {}", e);
            std::process::exit(1);
        }
    }
}

//! `dealpush derive-id` – print the id derived from a sku or name.

use dealpush_core::record;

pub fn run_derive_id(sku: Option<&str>, name: &str) {
    println!("{}", record::derive_id(sku, name));
}

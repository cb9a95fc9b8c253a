//! Collaborator-owned data models (cart rows, addresses)
//!
//! These live in the relational store that stands in for the excluded
//! storefront services; the engine only reads/clears them.

mod address;
mod cart;

pub use address::{Address, AddressCreate};
pub use cart::CartItem;

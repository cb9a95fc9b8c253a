//! Service layer
//!
//! - [`cart`] — cart rows with write-time stock checks
//! - [`address`] — ownership-checked address resolution
//! - [`notifier`] — fire-and-forget domain event broadcast

pub mod address;
pub mod cart;
pub mod notifier;

pub use address::AddressService;
pub use cart::CartService;
pub use notifier::{DomainEvent, Notifier};

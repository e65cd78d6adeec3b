//! Domain types shared by every layer: catalog items, accounts, orders,
//! and the provenance tag.

pub mod account;
pub mod item;
pub mod source;

pub use account::{AccountInfo, LineItem, Order, UserProfile};
pub use item::{Item, ItemSet};
pub use source::Source;

//! Item data model
//!
//! Items are what adapters produce: a typed attribute bag with a unique
//! attribute, tags, and declarative links to other items.

#[allow(clippy::module_inception)]
mod item;
mod query;

pub use item::{Attributes, Health, Item, ItemError};
pub use query::{BlastPropagation, LinkedItemQuery, Query, QueryMethod};

//! Repository layer — entity-scoped database operations.
//!
//! Free functions over a borrowed connection; validation and event
//! emission live one level up in the domain modules.

mod catalog;
mod event;
mod group;
mod patient;
mod payment;
mod treatment;

pub use catalog::*;
pub use event::*;
pub use group::*;
pub use patient::*;
pub use payment::*;
pub use treatment::*;

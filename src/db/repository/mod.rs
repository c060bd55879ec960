//! Repository layer: entity-scoped database operations.

mod alert;
mod chat;
mod doctor;
mod employer;
pub(crate) mod filter;
mod patient;
mod user;
mod vitals;

pub use alert::*;
pub use chat::*;
pub use doctor::*;
pub use employer::*;
pub use filter::Page;
pub use patient::*;
pub use user::*;
pub use vitals::*;

pub mod alert;
pub mod chat;
pub mod doctor;
pub mod employer;
pub mod enums;
pub mod patient;
pub mod user;
pub mod validation;
pub mod vitals;

pub use alert::*;
pub use chat::*;
pub use doctor::*;
pub use employer::*;
pub use enums::*;
pub use patient::*;
pub use user::*;
pub use validation::*;
pub use vitals::*;

//! Database models and the stores that persist them.

pub mod token;
pub mod user;
pub mod workout;

pub use token::*;
pub use user::*;
pub use workout::*;

pub mod enums;
pub mod filters;
pub mod schedule;
pub mod user;

pub use enums::*;
pub use filters::*;
pub use schedule::*;
pub use user::*;

//! Repository layer: entity-scoped database operations.
//!
//! Functions take a borrowed `Connection`, so callers may pass a plain
//! connection or a `Transaction` (which derefs to one).

mod session;
mod user;

pub use session::*;
pub use user::*;

//! Auth-domain identifiers, identity modes, and token models.

pub mod id;
pub mod mode;
pub mod token;
pub mod user;

pub use id::*;
pub use mode::*;
pub use token::{record::*, secret::*};
pub use user::*;

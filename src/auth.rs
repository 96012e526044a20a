//! Auth-domain credentials, token models, and the opaque user profile.

pub mod credentials;
pub mod token;
pub mod user;

pub use credentials::*;
pub use token::{pair::*, secret::*};
pub use user::*;

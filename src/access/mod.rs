//! Resolution and authorization of path-supplied resources.
//!
//! # Example
//!
//! ```ignore
//! use gallery_server::access::{ResourceGuard, UserMustOwn};
//!
//! let gallery = ResourceGuard::new()
//!     .require(UserMustOwn)
//!     .by_id(&*galleries, "42", ctx.principal())
//!     .await?;
//! ```

mod guard;

pub use guard::{parse_id, Predicate, ResourceGuard, UserMustOwn};

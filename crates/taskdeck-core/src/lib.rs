//! # taskdeck-core
//!
//! Foundation types shared by every taskdeck crate:
//!
//! - **Branded IDs**: `DocumentId`, `UserId` as newtypes for type safety
//! - **Timestamps**: [`Timestamp`], the `{seconds, nanoseconds}` shape the
//!   document store writes for server-assigned times
//! - **Logging**: [`logging::init_subscriber`] and test capture helpers

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod time;

pub use ids::{DocumentId, UserId};
pub use time::{Timestamp, now_millis};

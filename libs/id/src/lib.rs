//! # crewboard-id
//!
//! Typed identifiers for the crewboard scheduler.
//!
//! ## ID Format
//!
//! Every identifier uses a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `res_01HV4Z2WQXKJNM8GPQY6VBKC3D` (a staff member or equipment unit)
//! - `prj_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `alc_01HV4Z4NYPLTRS0JTUA8XDME5F` (assigned by the server on confirm)
//! - `tmp_01HV4Z5PZQMVST1KVUB9YENF6G` (held by a client before confirm)
//!
//! The prefix keeps a temporary client id from ever being mistaken for a
//! confirmed allocation id, and ULIDs sort by creation time.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;

//! Archive addressing
//!
//! Pure, side-effect free address model for locating content inside
//! archives.
//!
//! # Core Concepts
//!
//! - [`Address`]: deployment + upload/entry + path (+ optional version qualifier)
//! - [`DataPath`]: slash-separated path of field names and indices
//! - [`Segment`]: one step of a path
//!
//! # Example
//!
//! ```rust
//! use nav_address::Address;
//!
//! let context = Address::parse("https://nomad.example/api/v1/uploads/U1/archive/E1#/data").unwrap();
//! let target = Address::parse("../other_entry#/data/x").unwrap().resolve(&context).unwrap();
//!
//! assert_eq!(target.entry_id(), Some("other_entry"));
//! assert_eq!(target.path().to_string(), "data/x");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod address;
mod path;

pub use address::{Address, AddressError, AddressKind};
pub use path::{DataPath, PathError, Segment};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

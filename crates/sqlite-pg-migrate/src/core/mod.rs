//! Core abstractions shared by the extractor, loader, and verifier.
//!
//! - [`value`]: raw SQL values and the attribute-mapping row type
//! - [`traits`]: the [`SourceReader`] and [`TargetWriter`] seams between the
//!   pipeline and the concrete SQLite / PostgreSQL drivers

pub mod traits;
pub mod value;

pub use traits::{SourceReader, TargetWriter};
pub use value::{RawRow, SqlValue};

//! htmlcss - attribute and style-property storage for markup documents
//!
//! This crate provides:
//! - A string pool shared by every dictionary of a document
//! - An ordered, ASCII case-insensitive key/value dictionary
//! - Markup node and style-sheet models built on the dictionary
//! - Stylesheet and declaration loading using cssparser
//!
//! The `ffi` module exposes the pool and dictionary over a C ABI.

pub mod error;
pub mod string_pool;
pub mod dict;
pub mod html;
pub mod css;
pub mod ffi;

pub use error::{Error, Result};
pub use string_pool::*;
pub use dict::*;
pub use html::*;
pub use css::*;

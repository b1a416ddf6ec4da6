//! Derive macro for PDX serialization.
//!
//! # Example
//!
//! ```ignore
//! use geode_pdx_derive::PdxSerializable;
//!
//! #[derive(Default, PdxSerializable)]
//! #[pdx(class_name = "com.example.Person")]
//! struct Person {
//!     #[pdx(identity)]
//!     id: i64,
//!     name: Option<String>,
//!     #[pdx(field_name = "emailAddress")]
//!     email: String,
//!     #[pdx(skip)]
//!     cached_score: f64,
//! }
//! ```

extern crate proc_macro;

mod pdx;

use proc_macro::TokenStream;

/// Derives `geode_pdx::PdxSerializable` for a struct with named fields.
///
/// # Attributes
///
/// ## Struct-level
/// - `#[pdx(class_name = "...")]`: the PDX class name (defaults to the Rust
///   struct name).
///
/// ## Field-level
/// - `#[pdx(field_name = "...")]`: overrides the PDX field name.
/// - `#[pdx(identity)]`: marks the field as an identity field.
/// - `#[pdx(skip)]`: skips the field; it is reset to `Default` on read.
///
/// # Supported Field Types
///
/// `bool`, `i8`, `u16` (char), `i16`, `i32`, `i64`, `f32`, `f64`, `String`,
/// `Option<String>`, `Vec<T>` of the numeric types, `bool` and `String`, and
/// `Value`. The struct must implement `Default`.
#[proc_macro_derive(PdxSerializable, attributes(pdx))]
pub fn derive_pdx_serializable(input: TokenStream) -> TokenStream {
    pdx::derive_pdx_impl(input)
}

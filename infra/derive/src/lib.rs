#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the `PixHost` crates.
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! pixhost-derive.workspace = true
//! thiserror.workspace = true
//! ```

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Turns an enum into a fully wired error type.
///
/// # Features
///
/// * **Automatic Derives**: Injects `#[derive(Debug, thiserror::Error)]` when missing.
/// * **Context Support**: Generates a companion `...Ext` trait that adds `.context()`
///   to any `Result` whose error converts into this type.
/// * **Standard Conversions**: Implements `From<T>` for variants holding a `source: T`
///   field (or a field marked `#[source]`/`#[from]`), so `?` works on upstream errors.
/// * **Internal Fallback**: Implements `From<&'static str>` and `From<String>` when an
///   `Internal` variant is present.
/// * **Stable Codes**: Generates `code()`, returning the `snake_case` variant name.
///   Codes never depend on the message text, so callers can map them to protocol
///   statuses.
///
/// # Requirements
///
/// 1. Only enums are accepted.
/// 2. Variants that wrap a source must also carry `context: Option<Cow<'static, str>>`.
/// 3. Tuple and unit variants are rejected.
///
/// # Example
///
/// ```rust,ignore
/// use pixhost_derive::pixhost_error;
/// use std::borrow::Cow;
///
/// #[pixhost_error]
/// pub enum StorageError {
///     #[error("Object not found{}: {message}", format_context(.context))]
///     NotFound { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
///
///     #[error("I/O failure{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
/// }
///
/// fn load(path: &std::path::Path) -> Result<Vec<u8>, StorageError> {
///     std::fs::read(path).context("Reading stored object")
/// }
///
/// assert_eq!(StorageError::NotFound { message: "x".into(), context: None }.code(), "not_found");
/// ```
#[proc_macro_attribute]
pub fn pixhost_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

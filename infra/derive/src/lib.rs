#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the bridge crates:
//!
//! * [`macro@mxd_error`] turns a plain enum into a context-aware error type.
//! * [`macro@main`] boots the Tokio runtime profile used by the bridge binary.
//!
//! The examples are `ignore`d because a proc-macro crate cannot use its own macros.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, parse_macro_input};

/// Attribute macro that runs an `async fn main` on a runtime from `mxd_runtime`.
///
/// # Arguments
///
/// * `service` - multi-threaded profile for the long-running bridge process.
/// * `compact` - reduced worker count for one-shot tooling and tests.
/// * no argument - the default profile.
///
/// # Examples
///
/// ```rust,ignore
/// #[mxd_runtime::main(service)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Defines a crate-level error enum.
///
/// # Generated Items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already derived.
/// * `<ErrorName>Ext` trait adding `.context(...)` to `Result<T, ErrorName>` and to
///   `Result<T, Source>` for every variant that wraps a `source` error.
/// * `From<Source>` for each source-carrying variant.
/// * `From<&'static str>` / `From<String>` when an `Internal { message, .. }` variant exists.
/// * A private `format_context` helper for the `#[error(...)]` strings.
///
/// # Requirements
///
/// Variants must use named fields. A variant with a `source` must also carry
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[mxd_derive::mxd_error]
/// pub enum StoreError {
///     #[error("SurrealDB error{}: {source}", format_context(.context))]
///     Surreal { source: surrealdb::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal store error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn mxd_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}

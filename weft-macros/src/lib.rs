//! Attribute macros for weft.
//!
//! Both attributes turn an `async fn` into a plain function whose body runs
//! as a top-level task on a fresh `weft::Scheduler`, driven with
//! `Scheduler::block_on`.

mod utils;

use proc_macro::{Delimiter, Group, TokenStream, TokenTree};

/// Runs an `async fn main` on a fresh scheduler.
///
/// ```rust,ignore
/// #[weft::main]
/// async fn main() {
///     weft::time::sleep(std::time::Duration::from_millis(10)).await;
/// }
/// ```
#[proc_macro_attribute]
pub fn main(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return utils::compile_error("#[weft::main] takes no arguments");
    }

    match utils::wrap_body(item) {
        Some(tokens) => tokens.into_iter().collect(),
        None => utils::compile_error("#[weft::main] expects an `async fn`"),
    }
}

/// Runs an `async fn` test on a fresh scheduler.
///
/// The generated function is a regular `#[test]`, so `#[should_panic]` and
/// `Result` return types work as usual.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return utils::compile_error("#[weft::test] takes no arguments");
    }

    let Some(tokens) = utils::wrap_body(item) else {
        return utils::compile_error("#[weft::test] expects an `async fn`");
    };

    let test_attr: TokenStream = "#[::core::prelude::v1::test]".parse().unwrap();
    let mut result: Vec<TokenTree> = test_attr.into_iter().collect();
    result.extend(tokens);

    result.into_iter().collect()
}

pub(crate) fn brace(stream: TokenStream) -> TokenTree {
    TokenTree::Group(Group::new(Delimiter::Brace, stream))
}

use proc_macro::{Delimiter, TokenStream, TokenTree};

/// Removes `async` from a function item and moves its body into
/// `Scheduler::new().block_on(async move { .. })`.
///
/// Returns `None` if the item is not an `async fn` with a body.
pub(crate) fn wrap_body(item: TokenStream) -> Option<Vec<TokenTree>> {
    let mut tokens: Vec<TokenTree> = item.into_iter().collect();

    let async_pos = tokens
        .iter()
        .position(|t| matches!(t, TokenTree::Ident(id) if id.to_string() == "async"))?;

    tokens.remove(async_pos);

    let pos = tokens
        .iter()
        .rposition(|t| matches!(t, TokenTree::Group(g) if g.delimiter() == Delimiter::Brace))?;

    let body = match &tokens[pos] {
        TokenTree::Group(g) => g.stream().to_string(),
        _ => return None,
    };

    let wrapped = format!(
        "let scheduler = ::weft::Scheduler::new();
        scheduler.block_on(async move {{ {body} }})"
    );

    tokens[pos] = crate::brace(wrapped.parse().ok()?);

    Some(tokens)
}

pub(crate) fn compile_error(message: &str) -> TokenStream {
    format!("::core::compile_error!({message:?});")
        .parse()
        .unwrap()
}

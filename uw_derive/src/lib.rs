mod attrs;
mod readable;

use readable::derive_readable_impl;

/// Reads every field in declaration order with `uw_reader::Readable`.
/// `#[skip_after(n)]` on the struct discards `n` bytes after the last field.
#[proc_macro_derive(Readable, attributes(skip_after))]
pub fn derive_readable(tokens: proc_macro::TokenStream) -> proc_macro::TokenStream {
	derive_readable_impl(&syn::parse_macro_input!(tokens)).into()
}

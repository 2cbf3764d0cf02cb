use proc_macro2::TokenStream;
use syn::{Attribute, Meta, MetaList};

/// Tokens inside `#[name(...)]`, if the helper is present. It may appear at most once.
pub fn helper_arg<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a TokenStream> {
	let mut arg = None;
	for attr in attrs.iter().filter(|attr| attr.path().is_ident(name)) {
		match (&attr.meta, arg) {
			(Meta::List(MetaList { tokens, .. }), None) => arg = Some(tokens),
			(Meta::List(_), Some(_)) => panic!("`{}` given twice", name),
			_ => panic!("`{}` takes one argument, as in `#[{}(n)]`", name, name),
		}
	}
	arg
}

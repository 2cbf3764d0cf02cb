use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;
use syn::{Data, DataStruct, DeriveInput, Fields};
use crate::attrs::helper_arg;

pub fn derive_readable_impl(input: &DeriveInput) -> TokenStream {
	let type_name = &input.ident;
	let (fields, tuple) = match &input.data {
		Data::Struct(DataStruct { fields: Fields::Named(named), .. }) => (&named.named, false),
		Data::Struct(DataStruct { fields: Fields::Unnamed(unnamed), .. }) => (&unnamed.unnamed, true),
		_ => panic!("only structs with fields supported"),
	};
	let mut body = quote! {};
	let mut initializer = quote! {};
	for (field_num, field) in fields.iter().enumerate() {
		let field_ident = match &field.ident {
			Some(field_ident) => field_ident.clone(),
			None => Ident::new(&format!("field{}", field_num), Span::call_site()),
		};
		body = quote! {
			#body
			let #field_ident = uw_reader::Readable::read(reader)?;
		};
		initializer = quote! { #initializer #field_ident, };
	}
	if let Some(num) = helper_arg(&input.attrs, "skip_after") {
		body = quote! {
			#body
			uw_reader::skip(reader, #num)?;
		};
	}
	let initializer = match tuple {
		true => quote! { (#initializer) },
		false => quote! { { #initializer } },
	};
	let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
	quote! {
		impl #impl_generics uw_reader::Readable for #type_name #ty_generics #where_clause {
			fn read<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
				#body
				Ok(#type_name #initializer)
			}
		}
	}
}

//! `#[derive(Ravel)]` for structs that are generic over their leaf type.
//!
//! The first type parameter of the struct is the leaf parameter. Every field that is
//! not marked `#[ravel(skip)]` is traversed in declaration order, which is also the
//! order its leaves take in the flat vector.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Ident, Index, Member, Type, parse_macro_input};

mod ravel;

#[proc_macro_derive(Ravel, attributes(ravel))]
pub fn ravel_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let param = leaf_param(input)?;
    let fields = collect_fields(input)?;

    let impl_ = ravel::implementation(input, &fields, &param)?;

    Ok(quote! {
        #[automatically_derived]
        #impl_
    })
}

struct FieldSlot {
    member: Member,
    ty: Type,
    skip: bool,
}

fn leaf_param(input: &DeriveInput) -> syn::Result<Ident> {
    match input.generics.type_params().next() {
        Some(param) => Ok(param.ident.clone()),
        None => Err(syn::Error::new(
            input.ident.span(),
            "`Ravel` needs at least one type parameter to use as the leaf type",
        )),
    }
}

fn collect_fields(input: &DeriveInput) -> syn::Result<Vec<FieldSlot>> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            input.ident.span(),
            "`Ravel` can only be derived for structs",
        ));
    };

    let mut slots = Vec::with_capacity(data.fields.len());
    for (index, field) in data.fields.iter().enumerate() {
        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),
            None => Member::Unnamed(Index::from(index)),
        };

        let mut skip = false;
        for attr in field.attrs.iter().filter(|attr| attr.path().is_ident("ravel")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    skip = true;
                    Ok(())
                } else {
                    Err(meta.error("unknown `ravel` attribute, expected `skip`"))
                }
            })?;
        }

        slots.push(FieldSlot {
            member,
            ty: field.ty.clone(),
            skip,
        });
    }

    Ok(slots)
}

use proc_macro2::{TokenStream, TokenTree};
use quote::{ToTokens, format_ident, quote};
use syn::{DeriveInput, GenericParam, Generics, Ident, Member, parse_quote};

use crate::FieldSlot;

pub(crate) fn implementation(ast: &DeriveInput, fields: &[FieldSlot], param: &Ident) -> syn::Result<TokenStream> {
    check_skipped(fields, param)?;

    let path = quote! { ::ravel:: };
    let struct_name = &ast.ident;

    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let mut where_clause = where_clause.cloned().unwrap_or_else(|| parse_quote! { where });
    where_clause.predicates.push(parse_quote! { #param: #path Ravel });

    let mapped_generics = mapped_type_generics(&ast.generics, param);

    // Every field is moved out by destructuring into `__ravel_N`, so named and tuple
    // structs share one code path.
    let bindings: Vec<Ident> = (0..fields.len()).map(|i| format_ident!("__ravel_{}", i)).collect();
    let members: Vec<&Member> = fields.iter().map(|field| &field.member).collect();

    let mapped_fields = fields.iter().zip(&bindings).map(|(field, binding)| {
        let member = &field.member;
        if field.skip {
            quote! { #member: #binding }
        } else {
            quote! { #member: #path Ravel::try_map(#binding, &mut f)? }
        }
    });

    let (visited_members, visited_bindings): (Vec<&Member>, Vec<&Ident>) = fields
        .iter()
        .zip(&bindings)
        .filter(|(field, _)| !field.skip)
        .map(|(field, binding)| (&field.member, binding))
        .unzip();
    let visited = quote! { Self { #( #visited_members: #visited_bindings, )* .. } };

    Ok(quote! {
        impl #impl_generics #path Ravel for #struct_name #ty_generics #where_clause {
            type Arg = #param::Arg;
            type Mapped<_U> = #struct_name #mapped_generics;

            fn try_map<_U, _F, _E>(slf: Self, mut f: _F) -> ::core::result::Result<Self::Mapped<_U>, _E>
            where
                _F: FnMut(Self::Arg) -> ::core::result::Result<_U, _E>,
            {
                let Self { #( #members: #bindings ),* } = slf;
                ::core::result::Result::Ok(Self::Mapped {
                    #(#mapped_fields),*
                })
            }

            fn try_visit<_F, _E>(slf: &Self, mut f: _F) -> ::core::result::Result<(), _E>
            where
                _F: FnMut(&Self::Arg) -> ::core::result::Result<(), _E>,
            {
                let #visited = slf;
                #( #path Ravel::try_visit(#visited_bindings, &mut f)?; )*
                ::core::result::Result::Ok(())
            }

            fn try_visit_mut<_F, _E>(slf: &mut Self, mut f: _F) -> ::core::result::Result<(), _E>
            where
                _F: FnMut(&mut Self::Arg) -> ::core::result::Result<(), _E>,
            {
                let #visited = slf;
                #( #path Ravel::try_visit_mut(#visited_bindings, &mut f)?; )*
                ::core::result::Result::Ok(())
            }
        }
    })
}

/// A skipped field is moved as is into the mapped struct, where the leaf parameter has
/// become `P::Mapped<U>`. Its type must therefore not mention the leaf parameter.
fn check_skipped(fields: &[FieldSlot], param: &Ident) -> syn::Result<()> {
    let mut errors = fields
        .iter()
        .filter(|field| field.skip && mentions(field.ty.to_token_stream(), param))
        .map(|field| {
            syn::Error::new_spanned(
                &field.ty,
                format!(
                    "field `{}` is marked `#[ravel(skip)]` but its type uses the leaf parameter `{param}`",
                    field_name(&field.member),
                ),
            )
        });

    let Some(mut first) = errors.next() else {
        return Ok(());
    };
    errors.for_each(|err| first.combine(err));
    Err(first)
}

fn mentions(tokens: TokenStream, ident: &Ident) -> bool {
    tokens.into_iter().any(|token| match token {
        TokenTree::Ident(found) => found == *ident,
        TokenTree::Group(group) => mentions(group.stream(), ident),
        _ => false,
    })
}

fn field_name(member: &Member) -> String {
    match member {
        Member::Named(ident) => ident.to_string(),
        Member::Unnamed(index) => index.index.to_string(),
    }
}

/// Generic arguments of the mapped struct: the leaf parameter becomes `P::Mapped<_U>`,
/// everything else passes through.
fn mapped_type_generics(generics: &Generics, param: &Ident) -> TokenStream {
    let args = generics.params.iter().map(|generic| match generic {
        GenericParam::Type(ty) if ty.ident == *param => {
            let ident = &ty.ident;
            quote! { #ident::Mapped<_U> }
        }
        GenericParam::Type(ty) => ty.ident.to_token_stream(),
        GenericParam::Lifetime(lt) => lt.lifetime.to_token_stream(),
        GenericParam::Const(konst) => konst.ident.to_token_stream(),
    });

    quote! { <#(#args),*> }
}

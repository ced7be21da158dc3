use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::quote;
use syn::spanned::Spanned;
use syn::{Attribute, Data, DeriveInput, Fields, Index, LitStr, Member};

/// Source declared on a field, mirroring `mat_core::SourceKind`
#[derive(Clone, Copy)]
enum Source {
    Path,
    Query,
    Header,
    Param,
}

impl Source {
    fn from_ident(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "param" => Some(Self::Param),
            _ => None,
        }
    }

    fn variant(self) -> TokenStream2 {
        match self {
            Self::Path => quote!(::mat_core::SourceKind::Path),
            Self::Query => quote!(::mat_core::SourceKind::Query),
            Self::Header => quote!(::mat_core::SourceKind::Header),
            Self::Param => quote!(::mat_core::SourceKind::Param),
        }
    }
}

#[derive(Default)]
struct FieldAttrs {
    keys: Vec<(Source, LitStr)>,
    delegate: bool,
    flatten: bool,
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("bind")) {
        attr.parse_nested_meta(|meta| {
            let name = meta
                .path
                .get_ident()
                .map(ToString::to_string)
                .unwrap_or_default();

            if let Some(source) = Source::from_ident(&name) {
                let key: LitStr = meta.value()?.parse()?;
                if key.value().is_empty() {
                    return Err(meta.error("binding key must not be empty"));
                }
                parsed.keys.push((source, key));
                Ok(())
            } else if name == "delegate" {
                parsed.delegate = true;
                Ok(())
            } else if name == "flatten" {
                parsed.flatten = true;
                Ok(())
            } else {
                Err(meta.error(
                    "expected one of `path`, `query`, `header`, `param`, `delegate`, `flatten`",
                ))
            }
        })?;
    }

    Ok(parsed)
}

fn reject_container_attrs(attrs: &[Attribute]) -> syn::Result<()> {
    attrs
        .iter()
        .find(|a| a.path().is_ident("bind"))
        .map_or(Ok(()), |attr| {
            Err(syn::Error::new(
                attr.span(),
                "`#[bind(...)]` goes on fields; implement `ContextAware` for a hydration hook",
            ))
        })
}

pub(crate) fn derive_bind_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    reject_container_attrs(&input.attrs)?;

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new(
            Span::call_site(),
            "`#[derive(Bind)]` only supports structs",
        ));
    };

    let members: Vec<(Member, String, &syn::Field)> = match &data.fields {
        Fields::Named(named) => named
            .named
            .iter()
            .filter_map(|f| {
                f.ident
                    .as_ref()
                    .map(|ident| (Member::Named(ident.clone()), ident.to_string(), f))
            })
            .collect(),
        Fields::Unnamed(unnamed) => unnamed
            .unnamed
            .iter()
            .enumerate()
            .map(|(i, f)| (Member::Unnamed(Index::from(i)), i.to_string(), f))
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let mut steps = Vec::new();
    for (member, field_name, field) in &members {
        let attrs = parse_field_attrs(&field.attrs)?;
        let locate = quote!(|v: &mut Self| &mut v.#member);

        if attrs.flatten {
            if !attrs.keys.is_empty() || attrs.delegate {
                return Err(syn::Error::new(
                    field.span(),
                    "`flatten` cannot be combined with source keys or `delegate`",
                ));
            }
            steps.push(quote!(.flatten(#field_name, #locate)));
            continue;
        }

        if attrs.delegate && attrs.keys.is_empty() {
            return Err(syn::Error::new(
                field.span(),
                "`delegate` needs a source key, e.g. `#[bind(query = \"range\", delegate)]`",
            ));
        }

        let method = if attrs.delegate {
            quote!(delegate)
        } else {
            quote!(field)
        };
        for (source, key) in &attrs.keys {
            let kind = source.variant();
            steps.push(quote!(.#method(#kind, #key, #field_name, #locate)));
        }
    }

    Ok(quote! {
        impl #impl_generics ::mat_core::Bind for #name #ty_generics #where_clause {
            fn bindings(
                kind: ::mat_core::SourceKind,
            ) -> ::std::vec::Vec<::mat_core::FieldBinding<Self>> {
                ::mat_core::BindingTable::<Self>::for_source(kind)
                    #(#steps)*
                    .build()
            }

            fn hydrate(
                &mut self,
                c: &::mat_core::Context,
            ) -> ::std::result::Result<(), ::mat_core::BoxError> {
                #[allow(unused_imports)]
                use ::mat_core::binding::dispatch::{ViaContextAware as _, ViaNoop as _};
                ::mat_core::binding::dispatch::Hydrator(self).hydrate(c)
            }
        }
    })
}

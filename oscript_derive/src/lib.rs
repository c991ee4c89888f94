// Copyright 2015-2021 Swim Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Derive macro generating Oscript record support: a static schema for the
//! field resolver, uniform field access by index path, and `Marshal` /
//! `Unmarshal` implementations that route through the resolver.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::{
    parse_macro_input, Data, DeriveInput, Field, Fields, GenericArgument, Lit, Meta, NestedMeta,
    PathArguments, Type,
};

#[proc_macro_derive(Form, attributes(oscript))]
pub fn derive_form(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

struct FieldModel<'a> {
    ident: &'a syn::Ident,
    tag: Option<String>,
    flatten: bool,
    sdo: bool,
    /// For flattened fields, the embedded record type (through `Option`).
    embed: Option<&'a Type>,
    /// Whether the flattened embedding is optional.
    optional_embed: bool,
}

fn expand(input: &DeriveInput) -> Result<TokenStream2, syn::Error> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Form cannot be derived for generic types",
        ));
    }
    let fields = named_fields(input)?;
    let models = fields
        .iter()
        .map(field_model)
        .collect::<Result<Vec<_>, _>>()?;

    let name = &input.ident;
    let name_str = name.to_string();

    let decls = models.iter().map(|model| {
        let field_name = model.ident.to_string();
        let tag = match &model.tag {
            Some(tag) => quote!(::core::option::Option::Some(#tag)),
            None => quote!(::core::option::Option::None),
        };
        let flatten = model.flatten;
        let sdo = model.sdo;
        let schema = match model.embed {
            Some(embed) if model.flatten => {
                quote!(::core::option::Option::Some(
                    <#embed as oscript::RecordForm>::schema
                ))
            }
            _ => quote!(::core::option::Option::None),
        };
        quote! {
            oscript::FieldDecl {
                name: #field_name,
                tag: #tag,
                flatten: #flatten,
                sdo: #sdo,
                schema: #schema,
            }
        }
    });

    let get_arms = models.iter().enumerate().map(|(i, model)| {
        let ident = model.ident;
        if model.sdo {
            quote! { #i => ::core::option::Option::None, }
        } else if model.flatten && model.optional_embed {
            quote! {
                #i => {
                    if rest.is_empty() {
                        ::core::option::Option::Some(&self.#ident)
                    } else {
                        match &self.#ident {
                            ::core::option::Option::Some(embedded) => {
                                oscript::RecordForm::get_field(embedded, rest)
                            }
                            ::core::option::Option::None => ::core::option::Option::None,
                        }
                    }
                }
            }
        } else if model.flatten {
            quote! {
                #i => {
                    if rest.is_empty() {
                        ::core::option::Option::Some(&self.#ident)
                    } else {
                        oscript::RecordForm::get_field(&self.#ident, rest)
                    }
                }
            }
        } else {
            quote! {
                #i => {
                    if rest.is_empty() {
                        ::core::option::Option::Some(&self.#ident)
                    } else {
                        ::core::option::Option::None
                    }
                }
            }
        }
    });

    let put_arms = models.iter().enumerate().map(|(i, model)| {
        let ident = model.ident;
        if model.sdo {
            quote! { #i => ::core::result::Result::Ok(()), }
        } else if let (true, Some(embed)) = (model.optional_embed, model.embed) {
            quote! {
                #i => {
                    if rest.is_empty() {
                        oscript::Unmarshal::merge_value(&mut self.#ident, value, cx)
                    } else {
                        let embedded = self
                            .#ident
                            .get_or_insert_with(<#embed as ::core::default::Default>::default);
                        oscript::RecordForm::put_field(embedded, rest, value, cx)
                    }
                }
            }
        } else if model.flatten {
            quote! {
                #i => {
                    if rest.is_empty() {
                        oscript::Unmarshal::merge_value(&mut self.#ident, value, cx)
                    } else {
                        oscript::RecordForm::put_field(&mut self.#ident, rest, value, cx)
                    }
                }
            }
        } else {
            quote! {
                #i => {
                    if rest.is_empty() {
                        oscript::Unmarshal::merge_value(&mut self.#ident, value, cx)
                    } else {
                        ::core::result::Result::Err(oscript::DecodeError::Message(
                            ::std::string::String::from("field index out of range"),
                        ))
                    }
                }
            }
        }
    });

    let defaults = models.iter().map(|model| {
        let ident = model.ident;
        quote! { #ident: ::core::default::Default::default(), }
    });

    Ok(quote! {
        #[automatically_derived]
        impl oscript::RecordForm for #name {
            fn schema() -> &'static oscript::RecordSchema {
                static SCHEMA: oscript::RecordSchema = oscript::RecordSchema {
                    name: #name_str,
                    fields: &[#(#decls),*],
                };
                &SCHEMA
            }

            #[allow(unused_variables)]
            fn get_field(&self, path: &[usize]) -> ::core::option::Option<&dyn oscript::Marshal> {
                let (head, rest) = match path.split_first() {
                    ::core::option::Option::Some(split) => split,
                    ::core::option::Option::None => return ::core::option::Option::None,
                };
                let field: ::core::option::Option<&dyn oscript::Marshal> = match *head {
                    #(#get_arms)*
                    _ => ::core::option::Option::None,
                };
                field
            }

            #[allow(unused_variables)]
            fn put_field(
                &mut self,
                path: &[usize],
                value: &oscript::Value,
                cx: &oscript::DecodeContext,
            ) -> ::core::result::Result<(), oscript::DecodeError> {
                let (head, rest) = match path.split_first() {
                    ::core::option::Option::Some(split) => split,
                    ::core::option::Option::None => {
                        return ::core::result::Result::Err(oscript::DecodeError::Message(
                            ::std::string::String::from("empty field path"),
                        ));
                    }
                };
                match *head {
                    #(#put_arms)*
                    _ => ::core::result::Result::Err(oscript::DecodeError::Message(
                        ::std::string::String::from("field index out of range"),
                    )),
                }
            }
        }

        #[automatically_derived]
        impl oscript::Marshal for #name {
            fn write_oscript(
                &self,
                out: &mut oscript::EncodeState,
            ) -> ::core::result::Result<(), oscript::EncodeError> {
                oscript::write_record(self, out)
            }
        }

        #[automatically_derived]
        impl oscript::Unmarshal for #name {
            fn try_from_value(
                value: &oscript::Value,
                cx: &oscript::DecodeContext,
            ) -> ::core::result::Result<Self, oscript::DecodeError> {
                let mut record = #name { #(#defaults)* };
                oscript::merge_record(&mut record, value, cx)?;
                ::core::result::Result::Ok(record)
            }

            fn merge_value(
                &mut self,
                value: &oscript::Value,
                cx: &oscript::DecodeContext,
            ) -> ::core::result::Result<(), oscript::DecodeError> {
                oscript::merge_record(self, value, cx)
            }
        }
    })
}

fn named_fields(input: &DeriveInput) -> Result<&Punctuated<Field, syn::token::Comma>, syn::Error> {
    match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => Ok(&named.named),
            _ => Err(syn::Error::new_spanned(
                &input.ident,
                "Form requires a struct with named fields",
            )),
        },
        _ => Err(syn::Error::new_spanned(
            &input.ident,
            "Form can only be derived for structs",
        )),
    }
}

fn field_model(field: &Field) -> Result<FieldModel<'_>, syn::Error> {
    let ident = match &field.ident {
        Some(ident) => ident,
        None => {
            return Err(syn::Error::new_spanned(field, "Form requires named fields"));
        }
    };
    let (tag, flatten) = field_attrs(field)?;
    let sdo = is_sdo_name(&field.ty);
    if sdo && flatten {
        return Err(syn::Error::new_spanned(
            field,
            "an SdoName field cannot be flattened",
        ));
    }
    let (embed, optional_embed) = if flatten {
        match option_inner(&field.ty) {
            Some(inner) => (Some(inner), true),
            None => (Some(&field.ty), false),
        }
    } else {
        (None, false)
    };
    Ok(FieldModel {
        ident,
        tag,
        flatten,
        sdo,
        embed,
        optional_embed,
    })
}

fn field_attrs(field: &Field) -> Result<(Option<String>, bool), syn::Error> {
    let mut tag = None;
    let mut flatten = false;
    for attr in &field.attrs {
        if !attr.path.is_ident("oscript") {
            continue;
        }
        let meta = attr.parse_meta()?;
        let list = match meta {
            Meta::List(list) => list,
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "expected #[oscript(...)]",
                ));
            }
        };
        for nested in &list.nested {
            match nested {
                NestedMeta::Meta(Meta::NameValue(nv)) if nv.path.is_ident("tag") => {
                    match &nv.lit {
                        Lit::Str(lit) => tag = Some(lit.value()),
                        other => {
                            return Err(syn::Error::new_spanned(
                                other,
                                "the oscript tag must be a string literal",
                            ));
                        }
                    }
                }
                NestedMeta::Meta(Meta::Path(path)) if path.is_ident("flatten") => {
                    flatten = true;
                }
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "unsupported oscript attribute",
                    ));
                }
            }
        }
    }
    Ok((tag, flatten))
}

fn last_segment(ty: &Type) -> Option<&syn::PathSegment> {
    match ty {
        Type::Path(path) => path.path.segments.last(),
        _ => None,
    }
}

fn is_sdo_name(ty: &Type) -> bool {
    last_segment(ty).map_or(false, |segment| segment.ident == "SdoName")
}

/// The `T` of `Option<T>`, when `ty` spells an option.
fn option_inner(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Option" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first() {
            Some(GenericArgument::Type(inner)) => Some(inner),
            _ => None,
        },
        _ => None,
    }
}

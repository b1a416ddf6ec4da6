//! Derive macro implementation for `PdxSerializable`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields, LitStr};

pub fn derive_pdx_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct FieldAttrs {
    field_name: Option<String>,
    identity: bool,
    skip: bool,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let class_name = parse_class_name(&input.attrs)?.unwrap_or_else(|| name.to_string());

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "PdxSerializable only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "PdxSerializable can only be derived for structs",
            ))
        }
    };

    let mut write_stmts = Vec::new();
    let mut read_stmts = Vec::new();

    for field in fields {
        let Some(field_ident) = field.ident.as_ref() else {
            continue;
        };
        let attrs = parse_field_attrs(&field.attrs)?;

        if attrs.skip {
            read_stmts.push(quote! { #field_ident: ::core::default::Default::default() });
            continue;
        }

        let wire_name = attrs.field_name.unwrap_or_else(|| field_ident.to_string());
        let (write, read) = field_codec(&field.ty, field_ident, &wire_name)?;
        write_stmts.push(write);
        if attrs.identity {
            write_stmts.push(quote! { writer.mark_identity_field(#wire_name)?; });
        }
        read_stmts.push(quote! { #field_ident: #read });
    }

    Ok(quote! {
        impl #impl_generics ::geode_pdx::PdxSerializable for #name #ty_generics #where_clause {
            fn class_name(&self) -> &str {
                #class_name
            }

            fn to_data(&self, writer: &mut dyn ::geode_pdx::PdxWriter) -> ::geode_pdx::Result<()> {
                #(#write_stmts)*
                Ok(())
            }

            fn from_data(&mut self, reader: &mut dyn ::geode_pdx::PdxReader) -> ::geode_pdx::Result<()> {
                let _tmp = Self {
                    #(#read_stmts,)*
                };
                *self = _tmp;
                Ok(())
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }
        }
    })
}

fn field_codec(
    ty: &syn::Type,
    ident: &syn::Ident,
    wire_name: &str,
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let codec = match type_to_string(ty).as_str() {
        "bool" => (
            quote! { writer.write_boolean(#wire_name, self.#ident)?; },
            quote! { reader.read_boolean(#wire_name)? },
        ),
        "i8" => (
            quote! { writer.write_byte(#wire_name, self.#ident)?; },
            quote! { reader.read_byte(#wire_name)? },
        ),
        "u16" => (
            quote! { writer.write_char(#wire_name, self.#ident)?; },
            quote! { reader.read_char(#wire_name)? },
        ),
        "i16" => (
            quote! { writer.write_short(#wire_name, self.#ident)?; },
            quote! { reader.read_short(#wire_name)? },
        ),
        "i32" => (
            quote! { writer.write_int(#wire_name, self.#ident)?; },
            quote! { reader.read_int(#wire_name)? },
        ),
        "i64" => (
            quote! { writer.write_long(#wire_name, self.#ident)?; },
            quote! { reader.read_long(#wire_name)? },
        ),
        "f32" => (
            quote! { writer.write_float(#wire_name, self.#ident)?; },
            quote! { reader.read_float(#wire_name)? },
        ),
        "f64" => (
            quote! { writer.write_double(#wire_name, self.#ident)?; },
            quote! { reader.read_double(#wire_name)? },
        ),
        "String" => (
            quote! { writer.write_string(#wire_name, Some(self.#ident.as_str()))?; },
            quote! { reader.read_string(#wire_name)?.unwrap_or_default() },
        ),
        "Option<String>" => (
            quote! { writer.write_string(#wire_name, self.#ident.as_deref())?; },
            quote! { reader.read_string(#wire_name)? },
        ),
        "Vec<bool>" => array_codec(ident, wire_name, quote!(write_boolean_array), quote!(read_boolean_array)),
        "Vec<i8>" => array_codec(ident, wire_name, quote!(write_byte_array), quote!(read_byte_array)),
        "Vec<i16>" => array_codec(ident, wire_name, quote!(write_short_array), quote!(read_short_array)),
        "Vec<i32>" => array_codec(ident, wire_name, quote!(write_int_array), quote!(read_int_array)),
        "Vec<i64>" => array_codec(ident, wire_name, quote!(write_long_array), quote!(read_long_array)),
        "Vec<f32>" => array_codec(ident, wire_name, quote!(write_float_array), quote!(read_float_array)),
        "Vec<f64>" => array_codec(ident, wire_name, quote!(write_double_array), quote!(read_double_array)),
        "Vec<String>" => (
            quote! {
                let strings: ::std::vec::Vec<::core::option::Option<::std::string::String>> =
                    self.#ident.iter().cloned().map(Some).collect();
                writer.write_string_array(#wire_name, Some(strings.as_slice()))?;
            },
            quote! {
                reader
                    .read_string_array(#wire_name)?
                    .unwrap_or_default()
                    .into_iter()
                    .map(::core::option::Option::unwrap_or_default)
                    .collect()
            },
        ),
        "Value" | "geode_pdx::Value" | "geode_pdx::serialization::Value" => (
            quote! { writer.write_object(#wire_name, self.#ident.clone())?; },
            quote! { reader.read_object(#wire_name)? },
        ),
        other => {
            return Err(syn::Error::new_spanned(
                ty,
                format!("unsupported PDX field type `{}`", other),
            ))
        }
    };
    Ok(codec)
}

fn array_codec(
    ident: &syn::Ident,
    wire_name: &str,
    write: TokenStream2,
    read: TokenStream2,
) -> (TokenStream2, TokenStream2) {
    (
        quote! { writer.#write(#wire_name, Some(self.#ident.as_slice()))?; },
        quote! { reader.#read(#wire_name)?.unwrap_or_default() },
    )
}

fn type_to_string(ty: &syn::Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

fn parse_class_name(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut class_name = None;
    for attr in attrs {
        if !attr.path().is_ident("pdx") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class_name") {
                let lit: LitStr = meta.value()?.parse()?;
                class_name = Some(lit.value());
                Ok(())
            } else {
                Err(meta.error("unknown pdx container attribute"))
            }
        })?;
    }
    Ok(class_name)
}

fn parse_field_attrs(attrs: &[Attribute]) -> syn::Result<FieldAttrs> {
    let mut parsed = FieldAttrs::default();
    for attr in attrs {
        if !attr.path().is_ident("pdx") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("field_name") {
                let lit: LitStr = meta.value()?.parse()?;
                parsed.field_name = Some(lit.value());
            } else if meta.path.is_ident("identity") {
                parsed.identity = true;
            } else if meta.path.is_ident("skip") {
                parsed.skip = true;
            } else {
                return Err(meta.error("unknown pdx field attribute"));
            }
            Ok(())
        })?;
    }
    Ok(parsed)
}

// allowing panics since this is the standard way to show an
// error message from a proc-macro derive crate.
#![allow(clippy::panic)]

//! This crate introduces a proc macro derive that builds the Dalvik opcode
//! table of `dc_dex::instrs::Opcode` from attributes placed on each variant.
//!
//! Every opcode carries its mnemonic, its instruction format (which gives the
//! instruction width in code units and the operand layout), the kind of
//! constant pool item its index operand refers to, and the dex version that
//! introduced it. Keeping all of them next to the variant avoids maintaining
//! several parallel 256-entries tables by hand.

extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::Span;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DataEnum, DeriveInput, Expr, Fields, Ident, Lit, LitStr,
    Meta, MetaNameValue, NestedMeta, Variant,
};

/// Dex version assumed when no `since` attribute is given.
const BASE_VERSION: u32 = 35;

/// The main Dalvik `Opcode` proc macro derive.
///
/// It derives inherent `const` functions on a fieldless enum whose variants
/// all have an explicit discriminant (the opcode byte), using the following
/// attributes:
/// - `mnemonic` is used when printing out bytecode instructions,
/// - `format` is the Dex format of the instruction (see
/// [Dalvik Executable instruction formats](https://source.android.com/devices/tech/dalvik/instruction-formats)),
/// - `index` names the kind of item referenced by the index operand, if any,
/// - `since` is the first dex version in which the opcode is valid (default: 35).
///
/// The enum must have `Format` and `IndexKind` enums in scope.
///
/// # Example
///
/// ```rust
/// pub enum Format { F10x, F35c }
/// pub enum IndexKind { Method }
///
/// #[derive(Clone, Copy, opcode_derive::Opcode)]
/// #[repr(u8)]
/// pub enum Opcode {
///     /// Waste cycles.
///     #[opcode(mnemonic = "nop", format = "10x")]
///     Nop = 0x00,
///     #[opcode(mnemonic = "invoke-virtual", format = "35c", index = "method")]
///     InvokeVirtual = 0x6e,
/// }
///
/// assert_eq!(Opcode::from_byte(0x6e).map(Opcode::mnemonic), Some("invoke-virtual"));
/// ```
#[proc_macro_derive(Opcode, attributes(opcode))]
pub fn opcode_derive(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let gen = derive_opcode_all(&ast);
    gen.into()
}

fn derive_opcode_all(ast: &DeriveInput) -> TokenStream2 {
    let name = &ast.ident;
    let Data::Enum(data) = &ast.data else {
        panic!("#[derive(Opcode)] is only defined for enums")
    };
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            panic!("#[derive(Opcode)] variants cannot hold fields");
        }
    }

    derive_opcode_impl(name, data)
}

fn derive_opcode_impl(name: &Ident, data: &DataEnum) -> TokenStream2 {
    let mnemonic_matches = data.variants.iter().map(mnemonic_match);
    let format_matches = data.variants.iter().map(format_match);
    let index_matches = data.variants.iter().map(index_match);
    let since_matches = data.variants.iter().map(since_match);
    let byte_matches = data.variants.iter().map(byte_match);

    quote! {
        impl #name {
            /// Returns the mnemonic used when printing the instruction.
            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    #(#mnemonic_matches)*
                }
            }

            /// Returns the encoding format of the instruction.
            #[must_use]
            pub const fn format(self) -> Format {
                match self {
                    #(#format_matches)*
                }
            }

            /// Returns the kind of item referenced by the index operand.
            #[must_use]
            pub const fn index_kind(self) -> Option<IndexKind> {
                match self {
                    #(#index_matches)*
                }
            }

            /// Returns the first dex version accepting this opcode.
            #[must_use]
            pub const fn since(self) -> u32 {
                match self {
                    #(#since_matches)*
                }
            }

            /// Returns the opcode encoded by the given byte, if it is a used one.
            #[must_use]
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    #(#byte_matches)*
                    _ => None,
                }
            }
        }
    }
}

fn mnemonic_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let mnemonic = get_opcode_string_value(&variant.attrs, "mnemonic")
        .unwrap_or_else(|| panic!("missing 'mnemonic' attribute on {ident}"));

    quote! {
        Self::#ident => #mnemonic,
    }
}

fn format_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let format = get_opcode_string_value(&variant.attrs, "format")
        .unwrap_or_else(|| panic!("missing 'format' attribute on {ident}"))
        .value();
    if !format.chars().next().map_or(false, |c| c.is_ascii_digit()) {
        panic!("bad 'format' attribute on {ident}");
    }
    let format_ident = Ident::new(&format!("F{format}"), Span::call_site());

    quote! {
        Self::#ident => Format::#format_ident,
    }
}

fn index_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    match get_opcode_string_value(&variant.attrs, "index") {
        Some(kind) => {
            let kind_ident = Ident::new(&camel_case(&kind.value()), Span::call_site());
            quote! {
                Self::#ident => Some(IndexKind::#kind_ident),
            }
        }
        None => quote! {
            Self::#ident => None,
        },
    }
}

fn since_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let since = get_opcode_int_value(&variant.attrs, "since").unwrap_or(BASE_VERSION);

    quote! {
        Self::#ident => #since,
    }
}

fn byte_match(variant: &Variant) -> TokenStream2 {
    let ident = &variant.ident;
    let Some((_, discriminant)) = &variant.discriminant else {
        panic!("missing opcode byte discriminant on {ident}");
    };
    let Expr::Lit(lit) = discriminant else {
        panic!("opcode byte of {ident} must be a literal");
    };

    quote! {
        #lit => Some(Self::#ident),
    }
}

fn camel_case(snake: &str) -> String {
    snake
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect()
}

fn get_opcode_values(attr: &Attribute) -> Vec<MetaNameValue> {
    if !attr.path.is_ident("opcode") {
        return Vec::new();
    }

    match attr.parse_meta() {
        Ok(Meta::NameValue(v)) => vec![v],
        Ok(Meta::List(meta)) => meta
            .nested
            .into_iter()
            .map(|nested| match nested {
                NestedMeta::Meta(Meta::NameValue(n)) => n,
                _ => panic!("expected #[opcode(name = value, ...)]"),
            })
            .collect(),
        _ => panic!("expected #[opcode(...)]"),
    }
}

fn get_opcode_string_value(attrs: &[Attribute], name: &str) -> Option<LitStr> {
    for name_value in attrs.iter().flat_map(get_opcode_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Str(s) => return Some(s.clone()),
                _ => panic!("expected string for '{name}' value"),
            }
        }
    }
    None
}

fn get_opcode_int_value(attrs: &[Attribute], name: &str) -> Option<u32> {
    for name_value in attrs.iter().flat_map(get_opcode_values) {
        if name_value.path.is_ident(name) {
            match &name_value.lit {
                Lit::Int(i) => {
                    return Some(
                        i.base10_parse()
                            .unwrap_or_else(|_| panic!("expected u32 for '{name}' value")),
                    )
                }
                _ => panic!("expected integer for '{name}' value"),
            }
        }
    }
    None
}

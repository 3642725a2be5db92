use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, Lit, LitStr, Meta};

/// Derive macro describing the columns of a CSV export row.
///
/// For each named field the column name is the field name, or the value of
/// `#[serde(rename = "...")]` when present. Doc comments become the column
/// description. An optional `#[csv(title = "...")]` on the struct names the
/// table the rows belong to.
///
/// Generates:
/// - `csv_title() -> &'static str`
/// - `csv_header() -> &'static [&'static str]`
/// - `csv_schema() -> &'static [CsvField]` (`CsvField` must be in scope)
#[proc_macro_derive(CsvColumns, attributes(csv, serde))]
pub fn derive_csv_columns(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(name, "CsvColumns requires named fields")
                    .to_compile_error()
                    .into()
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "CsvColumns only supports structs")
                .to_compile_error()
                .into()
        }
    };

    let title = match csv_title(&input.attrs) {
        Ok(title) => title.unwrap_or_else(|| name.to_string()),
        Err(err) => return err.to_compile_error().into(),
    };

    let columns: Vec<(String, String)> = fields
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?;
            let column = serde_rename(&field.attrs).unwrap_or_else(|| ident.to_string());
            Some((column, doc_comment(&field.attrs)))
        })
        .collect();

    let header = columns.iter().map(|(column, _)| quote! { #column });
    let schema = columns.iter().map(|(column, description)| {
        quote! {
            CsvField {
                name: #column,
                description: #description,
            }
        }
    });

    let expanded = quote! {
        impl #name {
            pub fn csv_title() -> &'static str {
                #title
            }

            pub fn csv_header() -> &'static [&'static str] {
                static HEADER: &[&str] = &[#(#header),*];
                HEADER
            }

            pub fn csv_schema() -> &'static [CsvField] {
                static SCHEMA: &[CsvField] = &[#(#schema),*];
                SCHEMA
            }
        }
    };

    TokenStream::from(expanded)
}

fn csv_title(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut title = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("csv")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("title") {
                let value: LitStr = meta.value()?.parse()?;
                title = Some(value.value());
                Ok(())
            } else {
                Err(meta.error("unsupported csv attribute"))
            }
        })?;
    }
    Ok(title)
}

fn serde_rename(attrs: &[Attribute]) -> Option<String> {
    let mut rename = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        // other serde keys are skipped, a malformed list just yields no rename
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                let value: LitStr = meta.value()?.parse()?;
                rename = Some(value.value());
            } else if meta.input.peek(syn::Token![=]) {
                let _: Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    rename
}

fn doc_comment(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(meta) => match &meta.value {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(lit_str) => Some(lit_str.value().trim().to_string()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

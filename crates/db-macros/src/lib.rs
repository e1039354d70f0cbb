use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{Data, DataStruct, DeriveInput, Fields, parse_macro_input};

mod internals;

use internals::{codegen, parse};

/// Derives `SqlxSchema`, `SqlxCrud` and `SqlxFilterQuery` for a struct with an `id: Uuid` field.
///
/// Field attributes:
/// - `#[foreign_key(referenced_table = "...", related_rust_type = "...", on_delete = "...")]`
///   adds a FOREIGN KEY clause and a `fetch_<name>` helper.
/// - `#[unique]` adds a UNIQUE constraint.
/// - `#[indexed]` creates a btree index.
///
/// `created_at` / `updated_at` are unix-second BIGINT columns owned by the database.
/// Types that are not native to sqlx are stored as TEXT through `Display` / `FromStr`.
#[proc_macro_derive(SqlxObject, attributes(table_name, foreign_key, unique, indexed))]
pub fn sqlx_object_derive(input: TokenStream) -> TokenStream {
    let input_ast = parse_macro_input!(input as DeriveInput);
    expand(input_ast)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input_ast: DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let struct_name = &input_ast.ident;
    let row_struct_name = format_ident!("{}RowSqlx", struct_name);

    let table_name = parse::parse_table_name(&input_ast.attrs)?
        .unwrap_or_else(|| format!("{}s", to_snake_case(&struct_name.to_string())));

    let fields_named = match &input_ast.data {
        Data::Struct(DataStruct { fields: Fields::Named(fields), .. }) => fields,
        _ => return Err(syn::Error::new_spanned(
            struct_name,
            "SqlxObject can only be derived for structs with named fields",
        )),
    };

    let fields_data = parse::get_fields_data(&fields_named.named)?;

    let row_struct = codegen::generate_row_struct(&row_struct_name, &fields_data);
    let schema_impl = codegen::generate_sqlx_schema_impl(struct_name, &row_struct_name, &table_name, &fields_data);
    let crud_impl = codegen::generate_sqlx_crud_impl(struct_name, &table_name, &fields_data);
    let filter_impl = codegen::generate_sqlx_filter_query_impl(struct_name, &row_struct_name);
    let fetch_helpers = codegen::generate_fetch_helpers(&fields_data);

    Ok(quote! {
        #row_struct
        #schema_impl
        #crud_impl
        #filter_impl

        #[automatically_derived]
        impl #struct_name {
            #fetch_helpers
        }
    })
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

use quote::format_ident;
use syn::{Field, Lit, Meta, NestedMeta};

use super::types::{
    FieldData, ForeignKeyInfo, get_option_inner_type, is_option_type, map_rust_type_to_sql,
};

const ON_DELETE_ACTIONS: &[&str] = &["CASCADE", "SET NULL", "RESTRICT", "NO ACTION"];

/// `#[foreign_key(referenced_table = "...", related_rust_type = "...", on_delete = "...")]`
///
/// `on_delete` defaults to `CASCADE`: child records go away with their parent.
pub fn parse_foreign_key_attr(field: &Field) -> syn::Result<Option<ForeignKeyInfo>> {
    for attr in field.attrs.iter() {
        if !attr.path.is_ident("foreign_key") {
            continue;
        }

        let meta_list = match attr.parse_meta()? {
            Meta::List(meta_list) => meta_list,
            other => return Err(syn::Error::new_spanned(other, "expected #[foreign_key(...)]")),
        };

        let mut referenced_table = None;
        let mut related_rust_type = None;
        let mut on_delete = "CASCADE".to_string();

        for nested in meta_list.nested.iter() {
            let mnv = match nested {
                NestedMeta::Meta(Meta::NameValue(mnv)) => mnv,
                other => return Err(syn::Error::new_spanned(other, "foreign_key options must be name = \"value\" pairs")),
            };
            let value = match &mnv.lit {
                Lit::Str(lit_str) => lit_str.value(),
                other => return Err(syn::Error::new_spanned(other, "foreign_key option values must be strings")),
            };

            if mnv.path.is_ident("referenced_table") {
                referenced_table = Some(value);
            } else if mnv.path.is_ident("related_rust_type") {
                related_rust_type = Some(format_ident!("{}", value));
            } else if mnv.path.is_ident("on_delete") {
                let action = value.to_uppercase();
                if !ON_DELETE_ACTIONS.contains(&action.as_str()) {
                    return Err(syn::Error::new_spanned(&mnv.lit, format!("unsupported on_delete action '{}'", value)));
                }
                on_delete = action;
            } else {
                return Err(syn::Error::new_spanned(&mnv.path, "unknown foreign_key option"));
            }
        }

        return match (referenced_table, related_rust_type) {
            (Some(referenced_table), Some(related_rust_type)) => Ok(Some(ForeignKeyInfo {
                referenced_table,
                related_rust_type,
                on_delete,
            })),
            _ => Err(syn::Error::new_spanned(
                attr,
                "foreign_key requires both referenced_table and related_rust_type",
            )),
        };
    }
    Ok(None)
}

pub fn has_unique_attr(field: &Field) -> bool {
    field.attrs.iter().any(|attr| attr.path.is_ident("unique"))
}

pub fn has_indexed_attr(field: &Field) -> bool {
    field.attrs.iter().any(|attr| attr.path.is_ident("indexed"))
}

/// Reads `#[table_name = "..."]` off the struct, if present.
pub fn parse_table_name(attrs: &[syn::Attribute]) -> syn::Result<Option<String>> {
    for attr in attrs {
        if !attr.path.is_ident("table_name") {
            continue;
        }
        return match attr.parse_meta()? {
            Meta::NameValue(mnv) => match &mnv.lit {
                Lit::Str(lit_str) => Ok(Some(lit_str.value())),
                other => Err(syn::Error::new_spanned(other, "table_name attribute value must be a string literal")),
            },
            other => Err(syn::Error::new_spanned(other, "expected #[table_name = \"my_table\"]")),
        };
    }
    Ok(None)
}

/// Gathers everything the code generators need from the struct's fields.
pub fn get_fields_data(fields: &syn::punctuated::Punctuated<Field, syn::Token![,]>) -> syn::Result<Vec<FieldData>> {
    let mut fields_data = Vec::with_capacity(fields.len());
    let mut has_pk = false;

    for field in fields.iter() {
        let field_ident = field.ident.as_ref()
            .ok_or_else(|| syn::Error::new_spanned(field, "SqlxObject fields must be named"))?;
        let field_ty = &field.ty;
        let is_option = is_option_type(field_ty);
        let is_pk = field_ident == "id";
        has_pk |= is_pk;

        let type_for_sql = get_option_inner_type(field_ty).unwrap_or_else(|| field_ty.clone());
        let sql_type = map_rust_type_to_sql(&type_for_sql)
            .map_err(|msg| syn::Error::new_spanned(field_ty, msg))?;

        fields_data.push(FieldData {
            name: field_ident.to_string(),
            ty: field_ty.clone(),
            is_option,
            is_pk,
            sql_type,
            foreign_key: parse_foreign_key_attr(field)?,
            unique: has_unique_attr(field),
            indexed: has_indexed_attr(field),
        });
    }

    if !has_pk {
        return Err(syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[derive(SqlxObject)] requires an `id: Uuid` field",
        ));
    }

    Ok(fields_data)
}

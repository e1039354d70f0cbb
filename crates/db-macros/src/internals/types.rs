use quote::ToTokens;
use syn::{GenericArgument, PathArguments, Type};

#[derive(Debug)]
pub struct ForeignKeyInfo {
    pub referenced_table: String,
    pub related_rust_type: syn::Ident,
    /// Referential action used for `ON DELETE`, already upper-cased.
    pub on_delete: String,
}

pub struct FieldData {
    pub name: String,
    pub ty: syn::Type,
    pub is_option: bool,
    pub is_pk: bool,
    pub sql_type: String,
    pub foreign_key: Option<ForeignKeyInfo>,
    pub unique: bool,
    pub indexed: bool,
}

impl FieldData {
    pub fn is_timestamp(&self) -> bool {
        self.name == "created_at" || self.name == "updated_at"
    }

    /// Columns written by INSERT/UPDATE. The id and the timestamps belong to the database.
    pub fn is_writable(&self) -> bool {
        !self.is_pk && !self.is_timestamp()
    }

    /// How the column travels between the struct and its row type.
    pub fn mapping(&self) -> ColumnMapping {
        let inner = get_option_inner_type(&self.ty).unwrap_or_else(|| self.ty.clone());
        if is_text_mappable(&inner) {
            return ColumnMapping::Text(inner);
        }
        if let Some(vec_inner) = get_vec_inner_type(&self.ty) {
            if is_text_mappable(&vec_inner) {
                return ColumnMapping::TextArray(vec_inner);
            }
        }
        ColumnMapping::Direct
    }
}

impl std::fmt::Debug for FieldData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldData")
            .field("name", &self.name)
            .field("ty", &self.ty.to_token_stream().to_string())
            .field("is_option", &self.is_option)
            .field("is_pk", &self.is_pk)
            .field("sql_type", &self.sql_type)
            .field("foreign_key", &self.foreign_key)
            .field("unique", &self.unique)
            .field("indexed", &self.indexed)
            .finish()
    }
}

pub enum ColumnMapping {
    /// Bound and decoded as-is by sqlx.
    Direct,
    /// Stored as TEXT through `Display` / `FromStr`.
    Text(Type),
    /// `Vec<E>` stored as TEXT[] through `Display` / `FromStr`.
    TextArray(Type),
}

fn last_segment_generic(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty {
        if let Some(last_segment) = type_path.path.segments.last() {
            if last_segment.ident == wrapper {
                if let PathArguments::AngleBracketed(angle_args) = &last_segment.arguments {
                    if angle_args.args.len() == 1 {
                        if let GenericArgument::Type(inner_ty) = &angle_args.args[0] {
                            return Some(inner_ty.clone());
                        }
                    }
                }
            }
        }
    }
    None
}

pub fn is_option_type(ty: &Type) -> bool {
    get_option_inner_type(ty).is_some()
}

pub fn get_option_inner_type(ty: &Type) -> Option<Type> {
    last_segment_generic(ty, "Option")
}

pub fn get_vec_inner_type(ty: &Type) -> Option<Type> {
    last_segment_generic(ty, "Vec")
}

pub fn get_fully_qualified_type_string(ty: &Type) -> String {
    quote::quote!(#ty).to_string().replace(' ', "")
}

fn is_json_type(type_str: &str) -> bool {
    type_str.starts_with("Json<")
        || type_str.starts_with("::sqlx::types::Json<")
        || type_str.starts_with("sqlx::types::Json<")
}

pub fn is_simple_type(ty: &Type) -> bool {
    let type_str = get_fully_qualified_type_string(ty);
    matches!(type_str.as_str(),
        "String" | "std::string::String" |
        "i16" | "i32" | "i64" | "f32" | "f64" | "bool" | "Vec<u8>" |
        "Uuid" | "::sqlx::types::Uuid" | "sqlx::types::Uuid" | "uuid::Uuid" |
        "DateTime<Utc>" | "::chrono::DateTime<::chrono::Utc>" | "chrono::DateTime<chrono::Utc>"
    ) || is_json_type(&type_str)
}

/// Anything that is not a known sqlx type, an Option or a Vec is treated as an
/// enum-like value persisted through its string form.
fn is_text_mappable(ty: &Type) -> bool {
    let type_str = get_fully_qualified_type_string(ty);
    !is_simple_type(ty)
        && !type_str.starts_with("Option<")
        && !type_str.starts_with("Vec<")
        && matches!(ty, Type::Path(_))
}

pub fn map_rust_type_to_sql(ty: &Type) -> Result<String, String> {
    let type_str = get_fully_qualified_type_string(ty);

    if type_str == "Vec<u8>" {
        return Ok("BYTEA".to_string());
    }
    if let Some(inner_ty) = get_vec_inner_type(ty) {
        let inner_sql = map_rust_type_to_sql(&inner_ty)?;
        if inner_sql.ends_with("[]") || inner_sql == "JSONB" || inner_sql == "BYTEA" {
            return Err(format!(
                "Vec<{}> cannot be stored as a SQL array; wrap it in Json<...> instead",
                get_fully_qualified_type_string(&inner_ty)
            ));
        }
        return Ok(format!("{}[]", inner_sql));
    }

    let sql = match type_str.as_str() {
        "String" | "std::string::String" => "TEXT",
        "i16" => "SMALLINT",
        "i32" => "INTEGER",
        "i64" => "BIGINT",
        "f32" => "REAL",
        "f64" => "DOUBLE PRECISION",
        "bool" => "BOOLEAN",
        "Uuid" | "::sqlx::types::Uuid" | "sqlx::types::Uuid" | "uuid::Uuid" => "UUID",
        "DateTime<Utc>" | "::chrono::DateTime<::chrono::Utc>" | "chrono::DateTime<chrono::Utc>" => "TIMESTAMPTZ",
        s if is_json_type(s) => "JSONB",
        _ if is_text_mappable(ty) => "TEXT",
        _ => return Err(format!("Unsupported Rust type for SQL mapping: '{}'", type_str)),
    };
    Ok(sql.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    #[test]
    fn maps_scalar_and_wrapped_types() {
        assert_eq!(map_rust_type_to_sql(&parse_quote!(String)).unwrap(), "TEXT");
        assert_eq!(map_rust_type_to_sql(&parse_quote!(Uuid)).unwrap(), "UUID");
        assert_eq!(map_rust_type_to_sql(&parse_quote!(Json<Vec<Attribute>>)).unwrap(), "JSONB");
        assert_eq!(map_rust_type_to_sql(&parse_quote!(Vec<String>)).unwrap(), "TEXT[]");
        assert_eq!(map_rust_type_to_sql(&parse_quote!(ImageGenerator)).unwrap(), "TEXT");
    }

    #[test]
    fn rejects_nested_arrays() {
        assert!(map_rust_type_to_sql(&parse_quote!(Vec<Vec<String>>)).is_err());
    }

    #[test]
    fn unwraps_option() {
        let ty: Type = parse_quote!(Option<Uuid>);
        assert!(is_option_type(&ty));
        let inner = get_option_inner_type(&ty).unwrap();
        assert_eq!(get_fully_qualified_type_string(&inner), "Uuid");
    }
}

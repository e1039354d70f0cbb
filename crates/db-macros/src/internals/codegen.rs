use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Ident, LitStr, Type, parse_quote};

use super::types::{ColumnMapping, FieldData};

fn quoted_column_list(fields_data: &[FieldData]) -> String {
    fields_data.iter()
        .map(|f| format!("\"{}\"", f.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn generate_row_struct(row_struct_name: &Ident, fields_data: &[FieldData]) -> TokenStream {
    let row_struct_fields_defs: Vec<TokenStream> = fields_data.iter().map(|field| {
        let field_ident = format_ident!("{}", field.name);
        let row_field_ty: Type = match field.mapping() {
            ColumnMapping::Text(_) if field.is_option => parse_quote!(Option<String>),
            ColumnMapping::Text(_) => parse_quote!(String),
            ColumnMapping::TextArray(_) => parse_quote!(Vec<String>),
            ColumnMapping::Direct => field.ty.clone(),
        };
        quote! { pub #field_ident: #row_field_ty }
    }).collect();

    quote! {
        #[derive(::sqlx::FromRow, Debug, Clone)]
        #[automatically_derived]
        pub struct #row_struct_name {
            #(#row_struct_fields_defs),*
        }
    }
}

pub fn generate_sqlx_schema_impl(struct_name: &Ident, row_struct_name: &Ident, table_name: &str, fields_data: &[FieldData]) -> TokenStream {
    let column_name_lits: Vec<LitStr> = fields_data.iter()
        .map(|f| LitStr::new(&f.name, proc_macro2::Span::call_site()))
        .collect();

    let from_row_assignments = generate_from_row_assignments(fields_data);
    let (create_table_sql, create_index_sqls) = generate_create_table_sql(table_name, fields_data);
    let drop_table_sql = format!("DROP TABLE IF EXISTS \"{}\" CASCADE", table_name);
    let insert_sql = generate_insert_sql(table_name, fields_data);

    let trigger_sql = if fields_data.iter().any(|f| f.name == "updated_at") {
        format!(
            "DROP TRIGGER IF EXISTS {trigger} ON \"{table}\"; CREATE TRIGGER {trigger} BEFORE UPDATE ON \"{table}\" FOR EACH ROW EXECUTE PROCEDURE set_updated_at_unix_timestamp();",
            trigger = format!("set_updated_at_{}", table_name),
            table = table_name
        )
    } else {
        String::new()
    };

    quote! {
        #[automatically_derived]
        impl ::storymint_database::SqlxSchema for #struct_name {
            type Id = ::sqlx::types::Uuid;
            type Row = #row_struct_name;

            const TABLE_NAME: &'static str = #table_name;
            const ID_COLUMN_NAME: &'static str = "id";
            const COLUMNS: &'static [&'static str] = &[#( #column_name_lits ),*];
            const INDEXES_SQL: &'static [&'static str] = &[#( #create_index_sqls ),*];

            fn get_id_value(&self) -> Self::Id { self.id }

            fn from_row(row: Self::Row) -> Self {
                Self {
                    #(#from_row_assignments),*
                }
            }

            fn insert_sql() -> String { #insert_sql.to_string() }
            fn create_table_sql() -> String { #create_table_sql.to_string() }
            fn drop_table_sql() -> String { #drop_table_sql.to_string() }
            fn trigger_sql() -> String { #trigger_sql.to_string() }
        }
    }
}

pub fn generate_sqlx_crud_impl(struct_name: &Ident, table_name: &str, fields_data: &[FieldData]) -> TokenStream {
    let bindings = generate_bind_streams(fields_data);
    let update_sql = generate_update_sql(table_name, fields_data);
    let delete_sql = format!("DELETE FROM \"{}\" WHERE \"id\" = $1", table_name);

    quote! {
        #[automatically_derived]
        #[::async_trait::async_trait]
        impl ::storymint_database::SqlxCrud for #struct_name {
            fn bind_insert<'q>(
                &self,
                query: ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::storymint_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments>
            ) -> ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::storymint_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments> {
                query.bind(self.id) #(#bindings)*
            }

            fn bind_update<'q>(
                &self,
                query: ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::storymint_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments>
            ) -> ::sqlx::query::QueryAs<'q, ::sqlx::Postgres, <Self as ::storymint_database::SqlxSchema>::Row, ::sqlx::postgres::PgArguments> {
                query #(#bindings)* .bind(self.id)
            }

            async fn create<'e, E>(self, executor: E) -> Result<Self, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                let sql = <Self as ::storymint_database::SqlxSchema>::insert_sql();
                self.bind_insert(::sqlx::query_as::<_, <Self as ::storymint_database::SqlxSchema>::Row>(&sql))
                    .fetch_one(executor)
                    .await
                    .map(<Self as ::storymint_database::SqlxSchema>::from_row)
            }

            async fn update<'e, E>(self, executor: E) -> Result<Self, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                let sql = #update_sql;
                self.bind_update(::sqlx::query_as::<_, <Self as ::storymint_database::SqlxSchema>::Row>(sql))
                    .fetch_one(executor)
                    .await
                    .map(<Self as ::storymint_database::SqlxSchema>::from_row)
            }

            async fn delete<'e, E>(self, executor: E) -> Result<u64, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'e, Database = ::sqlx::Postgres> + Send,
                Self: Send
            {
                ::sqlx::query(#delete_sql)
                    .bind(self.id)
                    .execute(executor)
                    .await
                    .map(|done| done.rows_affected())
            }
        }
    }
}

pub fn generate_sqlx_filter_query_impl(struct_name: &Ident, row_struct_name: &Ident) -> TokenStream {
    quote! {
        #[automatically_derived]
        #[::async_trait::async_trait]
        impl ::storymint_database::SqlxFilterQuery for #struct_name {
            async fn find_by_criteria<'exe, E>(
                criteria: ::storymint_database::QueryCriteria,
                executor: E,
            ) -> Result<Vec<Self>, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
                Self: Send,
            {
                let mut arguments = ::sqlx::postgres::PgArguments::default();
                let select_columns = (<Self as ::storymint_database::SqlxSchema>::COLUMNS)
                    .iter()
                    .map(|c| format!("\"{}\"", c))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!(
                    "SELECT {} FROM \"{}\"",
                    select_columns,
                    <Self as ::storymint_database::SqlxSchema>::TABLE_NAME
                );
                sql.push_str(&criteria.build_tail(&mut arguments)?);

                ::sqlx::query_as_with::<_, #row_struct_name, _>(&sql, arguments)
                    .fetch_all(executor)
                    .await
                    .map(|rows| rows.into_iter().map(<Self as ::storymint_database::SqlxSchema>::from_row).collect())
            }

            async fn delete_by_criteria<'exe, E>(
                criteria: ::storymint_database::QueryCriteria,
                executor: E,
            ) -> Result<u64, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
                Self: Send,
            {
                let mut arguments = ::sqlx::postgres::PgArguments::default();
                let mut sql = format!(
                    "DELETE FROM \"{}\"",
                    <Self as ::storymint_database::SqlxSchema>::TABLE_NAME
                );
                sql.push_str(&criteria.build_where(&mut arguments)?);

                ::sqlx::query_with(&sql, arguments)
                    .execute(executor)
                    .await
                    .map(|done| done.rows_affected())
            }
        }
    }
}

pub fn generate_fetch_helpers(fields_data: &[FieldData]) -> TokenStream {
    let fetch_helper_methods = fields_data.iter().filter_map(|field| {
        let fk_info = field.foreign_key.as_ref()?;
        let field_ident = format_ident!("{}", field.name);
        let fetch_method_name = format_ident!("fetch_{}", field.name.trim_end_matches("_id"));
        let related_type = &fk_info.related_rust_type;

        let id_expr = if field.is_option {
            quote! {
                let Some(id) = self.#field_ident else { return Ok(None); };
            }
        } else {
            quote! { let id = self.#field_ident; }
        };

        Some(quote! {
            pub async fn #fetch_method_name<'exe, E>(
                &self,
                executor: E
            ) -> Result<Option<#related_type>, ::sqlx::Error>
            where
                E: ::sqlx::Executor<'exe, Database = ::sqlx::Postgres> + Send,
            {
                #id_expr
                let criteria = ::storymint_database::QueryCriteria::new()
                    .add_valued_filter(<#related_type as ::storymint_database::SqlxSchema>::id_column_name(), "=", id);
                <#related_type as ::storymint_database::SqlxFilterQuery>::find_one_by_criteria(criteria, executor).await
            }
        })
    });

    quote! { #(#fetch_helper_methods)* }
}

fn generate_from_row_assignments(fields_data: &[FieldData]) -> Vec<TokenStream> {
    fields_data.iter().map(|field| {
        let field_ident = format_ident!("{}", field.name);
        match field.mapping() {
            ColumnMapping::Text(inner) if field.is_option => quote! {
                #field_ident: row.#field_ident.map(|s| s.parse().unwrap_or_else(|_| <#inner>::default()))
            },
            ColumnMapping::Text(inner) => quote! {
                #field_ident: row.#field_ident.parse().unwrap_or_else(|_| <#inner>::default())
            },
            ColumnMapping::TextArray(inner) => quote! {
                #field_ident: row.#field_ident.into_iter().map(|s: String| s.parse().unwrap_or_else(|_| <#inner>::default())).collect()
            },
            ColumnMapping::Direct => quote! { #field_ident: row.#field_ident },
        }
    }).collect()
}

pub(crate) fn generate_create_table_sql(table_name: &str, fields_data: &[FieldData]) -> (String, Vec<LitStr>) {
    let mut column_defs: Vec<String> = Vec::new();
    let mut foreign_key_clauses: Vec<String> = Vec::new();
    let mut create_index_sqls: Vec<LitStr> = Vec::new();

    for field in fields_data {
        let mut col_def_parts = vec![format!("\"{}\"", field.name)];

        if field.is_pk {
            col_def_parts.push(field.sql_type.clone());
            col_def_parts.push("PRIMARY KEY DEFAULT gen_random_uuid()".to_string());
        } else if field.is_timestamp() {
            col_def_parts.push("BIGINT NOT NULL DEFAULT floor(extract(epoch from now()))".to_string());
        } else {
            col_def_parts.push(field.sql_type.clone());
            if !field.is_option {
                col_def_parts.push("NOT NULL".to_string());
            }
        }

        if field.unique {
            col_def_parts.push("UNIQUE".to_string());
        }

        if field.indexed {
            let index_sql = format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{table}_{col}\" ON \"{table}\"(\"{col}\")",
                table = table_name,
                col = field.name
            );
            create_index_sqls.push(LitStr::new(&index_sql, proc_macro2::Span::call_site()));
        }

        column_defs.push(col_def_parts.join(" "));

        if let Some(fk_info) = &field.foreign_key {
            foreign_key_clauses.push(format!(
                "FOREIGN KEY (\"{}\") REFERENCES \"{}\"(\"id\") ON DELETE {} ON UPDATE CASCADE",
                field.name, fk_info.referenced_table, fk_info.on_delete
            ));
        }
    }

    column_defs.extend(foreign_key_clauses);
    let create_table_sql = format!("CREATE TABLE IF NOT EXISTS \"{}\" ({})", table_name, column_defs.join(", "));

    (create_table_sql, create_index_sqls)
}

/// The id is written explicitly so callers can derive storage keys before the row exists.
pub(crate) fn generate_insert_sql(table_name: &str, fields_data: &[FieldData]) -> String {
    let insert_columns: Vec<String> = fields_data.iter()
        .filter(|f| f.is_pk || f.is_writable())
        .map(|f| format!("\"{}\"", f.name))
        .collect();
    let placeholders = (1..=insert_columns.len()).map(|i| format!("${}", i)).collect::<Vec<_>>().join(", ");

    format!(
        "INSERT INTO \"{}\" ({}) VALUES ({}) RETURNING {}",
        table_name,
        insert_columns.join(", "),
        placeholders,
        quoted_column_list(fields_data)
    )
}

pub(crate) fn generate_update_sql(table_name: &str, fields_data: &[FieldData]) -> String {
    let set_clauses: Vec<String> = fields_data.iter()
        .filter(|f| f.is_writable())
        .enumerate()
        .map(|(i, f)| format!("\"{}\" = ${}", f.name, i + 1))
        .collect();

    if set_clauses.is_empty() {
        return format!("SELECT {} FROM \"{}\" WHERE \"id\" = $1", quoted_column_list(fields_data), table_name);
    }

    format!(
        "UPDATE \"{}\" SET {} WHERE \"id\" = ${} RETURNING {}",
        table_name,
        set_clauses.join(", "),
        set_clauses.len() + 1,
        quoted_column_list(fields_data)
    )
}

/// Binds every writable column in declaration order. Insert prepends the id, update appends it.
fn generate_bind_streams(fields_data: &[FieldData]) -> Vec<TokenStream> {
    fields_data.iter()
        .filter(|f| f.is_writable())
        .map(|field| {
            let field_ident = format_ident!("{}", field.name);
            match field.mapping() {
                ColumnMapping::Text(_) if field.is_option => quote! { .bind(self.#field_ident.as_ref().map(|v| v.to_string())) },
                ColumnMapping::Text(_) => quote! { .bind(self.#field_ident.to_string()) },
                ColumnMapping::TextArray(_) => quote! { .bind(self.#field_ident.iter().map(|v| v.to_string()).collect::<Vec<String>>()) },
                ColumnMapping::Direct => quote! { .bind(self.#field_ident.clone()) },
            }
        })
        .collect()
}

use sqlx::{FromRow, Postgres, Error as SqlxError, postgres::PgArguments, Executor};

/// Schema of a database object. Implemented by `#[derive(SqlxObject)]`.
pub trait SqlxSchema: Send + Sync + Unpin + Clone + std::fmt::Debug {
    /// The type of the primary key for this database object.
    type Id: Send + Sync + for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Clone + 'static;

    /// The intermediate type that implements FromRow, used for fetching from the database.
    type Row: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin;

    const TABLE_NAME: &'static str;
    const ID_COLUMN_NAME: &'static str;
    const COLUMNS: &'static [&'static str];
    const INDEXES_SQL: &'static [&'static str];

    fn id_column_name() -> &'static str { Self::ID_COLUMN_NAME }
    fn table_name() -> &'static str { Self::TABLE_NAME }
    fn columns() -> &'static [&'static str] { Self::COLUMNS }
    fn indexes_sql() -> &'static [&'static str] { Self::INDEXES_SQL }

    fn get_id_value(&self) -> Self::Id;

    /// Converts the intermediate Row type to the Self type.
    fn from_row(row: Self::Row) -> Self;

    fn create_table_sql() -> String;
    fn drop_table_sql() -> String;
    fn insert_sql() -> String;
    fn trigger_sql() -> String;
}

#[async_trait::async_trait]
pub trait SqlxCrud: SqlxSchema + SqlxFilterQuery + Sized {
    fn bind_insert<'q>(&self, query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>)
        -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>;

    fn bind_update<'q>(&self, query: sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>)
        -> sqlx::query::QueryAs<'q, Postgres, Self::Row, PgArguments>;

    /// Inserts the record, including its `id`, and returns the stored row.
    async fn create<'e, E>(self, executor: E) -> Result<Self, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    /// Writes every non-key column of the record identified by `id`.
    async fn update<'e, E>(self, executor: E) -> Result<Self, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    async fn delete<'e, E>(self, executor: E) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;
}

#[derive(Debug, Clone, Copy)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// A value that can be pushed onto a `PgArguments` list.
/// Lets `QueryCriteria` hold filter values of different types.
pub trait AsSqlxArg: Send + Sync {
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError>;
}

impl<T> AsSqlxArg for T
where
    T: for<'a> sqlx::Encode<'a, Postgres> + sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
{
    fn add_to_args(&self, args: &mut PgArguments) -> Result<(), SqlxError> {
        use sqlx::Arguments;
        args.add(self.clone()).map_err(SqlxError::Encode)
    }
}

pub struct FilterCondition {
    pub column: &'static str,
    pub operator: &'static str,
    /// Holds the value for the condition's placeholder, if any.
    pub value: Option<Box<dyn AsSqlxArg>>,
}

/// Filters, ordering and paging for a dynamic query.
///
/// The `SqlxObject` derive turns these into the WHERE / ORDER BY / LIMIT / OFFSET
/// tail of its generated SELECT and DELETE statements.
#[derive(Default)]
pub struct QueryCriteria {
    pub conditions: Vec<FilterCondition>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Vec<(&'static str, OrderDirection)>,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter condition that may or may not have a value, e.g. `IS NULL`.
    /// An operator containing `{}` gets the placeholder substituted in place, e.g. `= ANY({})`.
    pub fn add_filter<V>(mut self, column: &'static str, operator: &'static str, value: Option<V>) -> Self
    where
        V: for<'a> ::sqlx::Encode<'a, Postgres> + ::sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.conditions.push(FilterCondition {
            column,
            operator,
            value: value.map(|v| Box::new(v) as Box<dyn AsSqlxArg>),
        });
        self
    }

    pub fn add_valued_filter<V>(self, column: &'static str, operator: &'static str, value: V) -> Self
    where
        V: for<'a> ::sqlx::Encode<'a, Postgres> + ::sqlx::Type<Postgres> + Send + Sync + Clone + 'static,
    {
        self.add_filter(column, operator, Some(value))
    }

    pub fn limit(mut self, limit_val: i64) -> Self {
        self.limit = Some(limit_val);
        self
    }

    pub fn offset(mut self, offset_val: i64) -> Self {
        self.offset = Some(offset_val);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: OrderDirection) -> Self {
        self.order_by.push((column, direction));
        self
    }

    fn push_where(&self, arguments: &mut PgArguments, sql: &mut String, placeholder_idx: &mut usize) -> Result<(), SqlxError> {
        if self.conditions.is_empty() {
            return Ok(());
        }

        let mut where_clauses = Vec::with_capacity(self.conditions.len());
        for condition in &self.conditions {
            let mut clause = format!("\"{}\" {}", condition.column, condition.operator);
            if let Some(value) = &condition.value {
                value.add_to_args(arguments)?;
                let placeholder = format!("${}", placeholder_idx);
                if condition.operator.contains("{}") {
                    clause = format!("\"{}\" {}", condition.column, condition.operator.replace("{}", &placeholder));
                } else {
                    clause.push_str(" ");
                    clause.push_str(&placeholder);
                }
                *placeholder_idx += 1;
            }
            where_clauses.push(clause);
        }
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
        Ok(())
    }

    /// Renders the WHERE clause (with a leading space) and binds its values.
    pub fn build_where(&self, arguments: &mut PgArguments) -> Result<String, SqlxError> {
        let mut sql = String::new();
        let mut placeholder_idx = 1;
        self.push_where(arguments, &mut sql, &mut placeholder_idx)?;
        Ok(sql)
    }

    /// Renders WHERE, ORDER BY, LIMIT and OFFSET (with a leading space) and binds their values.
    pub fn build_tail(&self, arguments: &mut PgArguments) -> Result<String, SqlxError> {
        use sqlx::Arguments;

        let mut sql = String::new();
        let mut placeholder_idx = 1;
        self.push_where(arguments, &mut sql, &mut placeholder_idx)?;

        if !self.order_by.is_empty() {
            let order_clauses: Vec<String> = self.order_by.iter()
                .map(|(col, dir)| format!("\"{}\" {}", col, dir.as_sql()))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_clauses.join(", "));
        }

        if let Some(limit_val) = self.limit {
            arguments.add(limit_val).map_err(SqlxError::Encode)?;
            sql.push_str(&format!(" LIMIT ${}", placeholder_idx));
            placeholder_idx += 1;
        }

        if let Some(offset_val) = self.offset {
            arguments.add(offset_val).map_err(SqlxError::Encode)?;
            sql.push_str(&format!(" OFFSET ${}", placeholder_idx));
        }

        Ok(sql)
    }
}

/// Criteria-driven reads and deletes. Implemented by `#[derive(SqlxObject)]`.
#[async_trait::async_trait]
pub trait SqlxFilterQuery: SqlxSchema + Sized {
    async fn find_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<Vec<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;

    /// Takes the first match; adds `LIMIT 1` when the criteria carry no limit.
    async fn find_one_by_criteria<'e, E>(
        mut criteria: QueryCriteria,
        executor: E,
    ) -> Result<Option<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send
    {
        if criteria.limit.is_none() {
            criteria = criteria.limit(1);
        };
        let mut results = Self::find_by_criteria(criteria, executor).await?;
        Ok(results.pop())
    }

    async fn find_by_id<'e, E>(
        id: Self::Id,
        executor: E,
    ) -> Result<Option<Self>, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send
    {
        let criteria = QueryCriteria::new().add_valued_filter(Self::ID_COLUMN_NAME, "=", id);
        Self::find_one_by_criteria(criteria, executor).await
    }

    async fn delete_by_criteria<'e, E>(
        criteria: QueryCriteria,
        executor: E,
    ) -> Result<u64, SqlxError>
    where
        E: Executor<'e, Database = Postgres> + Send,
        Self: Send;
}

/// True when the error is a Postgres unique constraint violation.
pub fn is_unique_violation(err: &SqlxError) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_numbers_placeholders_in_order() {
        let criteria = QueryCriteria::new()
            .add_valued_filter("world_id", "=", sqlx::types::Uuid::nil())
            .add_filter::<String>("next_node_id", "IS NULL", None)
            .add_valued_filter("name", "=", "intro".to_string())
            .add_valued_filter("node_id", "= ANY({})", vec![sqlx::types::Uuid::nil()])
            .order_by("created_at", OrderDirection::Desc)
            .limit(10)
            .offset(20);

        let mut args = PgArguments::default();
        let sql = criteria.build_tail(&mut args).unwrap();
        assert_eq!(
            sql,
            " WHERE \"world_id\" = $1 AND \"next_node_id\" IS NULL AND \"name\" = $2 \
             AND \"node_id\" = ANY($3) ORDER BY \"created_at\" DESC LIMIT $4 OFFSET $5"
        );
    }

    #[test]
    fn empty_criteria_render_nothing() {
        let mut args = PgArguments::default();
        assert_eq!(QueryCriteria::new().build_where(&mut args).unwrap(), "");
        assert_eq!(QueryCriteria::new().build_tail(&mut args).unwrap(), "");
    }
}

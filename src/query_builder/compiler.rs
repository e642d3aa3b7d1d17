//! SQL compilation.
//!
//! Turns a [`QueryDescriptor`] into parameterized SQL text plus an ordered
//! argument list. Placeholders are 1-based and strictly increasing across
//! the whole statement; for UPDATE the WHERE arguments follow the SET
//! arguments. All values travel as bound parameters - the single exception
//! is the full-text search string, which is embedded inside the
//! `to_tsquery` literal and therefore escaped by doubling single quotes.

use super::conditions::Condition;
use super::descriptor::{OrderClause, QueryDescriptor};
use super::search::SearchQuery;
use crate::error::{QuarryError, Result};
use crate::schema::SchemaRegistry;
use crate::value::Value;

/// Alias of the computed rank column appended for ranked full-text search.
pub const RANK_ALIAS: &str = "pg_search_rank";

/// A compiled statement: SQL text and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Aggregates compiled by [`SqlCompiler::compile_aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn to_sql(self) -> &'static str {
        match self {
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Escape a string for embedding inside a single-quoted SQL literal.
pub(crate) fn escape_literal(text: &str) -> String {
    text.replace('\'', "''")
}

#[derive(Default)]
struct Emitter {
    args: Vec<Value>,
}

impl Emitter {
    /// Consume one placeholder index for `value`. Indexes are never reused.
    fn placeholder(&mut self, value: Value) -> String {
        self.args.push(value);
        format!("${}", self.args.len())
    }
}

/// Compiles one descriptor into SQL statements.
pub struct SqlCompiler<'a> {
    descriptor: &'a QueryDescriptor,
    registry: Option<&'a SchemaRegistry>,
}

impl<'a> SqlCompiler<'a> {
    pub fn new(descriptor: &'a QueryDescriptor) -> Self {
        Self {
            descriptor,
            registry: None,
        }
    }

    /// Attach a schema registry; insert compilation will drop
    /// auto-generated columns from payloads.
    pub fn with_registry(mut self, registry: &'a SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Qualify and quote a column reference. When joins are present, bare
    /// references are qualified with the base table - required for
    /// correctness, since joined tables may carry columns of the same name.
    fn column_ref(&self, column: &str, qualify: bool) -> String {
        if column == "*" || column.contains('(') || column.contains(' ') {
            return column.to_string();
        }
        if let Some((table, column)) = column.split_once('.') {
            return format!("{}.{}", quote_ident(table), quote_ident(column));
        }
        if qualify {
            format!(
                "{}.{}",
                quote_ident(self.descriptor.table()),
                quote_ident(column)
            )
        } else {
            quote_ident(column)
        }
    }

    fn tsvector_expression(&self, search: &SearchQuery, qualify: bool) -> String {
        let language = escape_literal(&search.language);
        if search.weighted_columns.is_empty() {
            search
                .columns
                .iter()
                .map(|column| {
                    format!(
                        "to_tsvector('{}', {})",
                        language,
                        self.column_ref(column, qualify)
                    )
                })
                .collect::<Vec<_>>()
                .join(" || ")
        } else {
            search
                .weighted_columns
                .iter()
                .map(|(column, weight)| {
                    format!(
                        "setweight(to_tsvector('{}', {}), '{}')",
                        language,
                        self.column_ref(column, qualify),
                        weight
                    )
                })
                .collect::<Vec<_>>()
                .join(" || ")
        }
    }

    fn tsquery_expression(&self, search: &SearchQuery) -> String {
        let parser = if search.use_plain_parser {
            "plainto_tsquery"
        } else {
            "to_tsquery"
        };
        format!(
            "{}('{}', '{}')",
            parser,
            escape_literal(&search.language),
            escape_literal(&search.text)
        )
    }

    fn rank_expression(&self, search: &SearchQuery, qualify: bool) -> String {
        let normalization = search
            .rank_normalization
            .map(|n| format!(", {n}"))
            .unwrap_or_default();
        format!(
            "{}({}, {}{})",
            search.effective_rank_function().to_sql(),
            self.tsvector_expression(search, qualify),
            self.tsquery_expression(search),
            normalization
        )
    }

    /// The first top-level full-text predicate carrying a rank request.
    fn rank_request(&self) -> Option<&SearchQuery> {
        self.descriptor.conditions().iter().find_map(|c| match c {
            Condition::FullText(search) if search.wants_rank() => Some(search),
            _ => None,
        })
    }

    /// Rewrite `?` placeholders in a raw fragment into `$n`, appending the
    /// supplied values in order. The scan is a plain left-to-right pass; a
    /// `?` inside a quoted literal is rewritten like any other.
    fn rewrite_raw(&self, emitter: &mut Emitter, fragment: &str, values: &[Value]) -> Result<String> {
        let mut out = String::with_capacity(fragment.len() + 8);
        let mut supplied = values.iter();
        for ch in fragment.chars() {
            if ch == '?' {
                let value = supplied.next().ok_or_else(|| {
                    QuarryError::usage("raw fragment has more `?` placeholders than values")
                })?;
                out.push_str(&emitter.placeholder(value.clone()));
            } else {
                out.push(ch);
            }
        }
        if supplied.next().is_some() {
            return Err(QuarryError::usage(
                "raw fragment has fewer `?` placeholders than values",
            ));
        }
        Ok(out)
    }

    fn compile_condition(
        &self,
        emitter: &mut Emitter,
        condition: &Condition,
        qualify: bool,
    ) -> Result<String> {
        match condition {
            Condition::Compare {
                column,
                value,
                negated,
            } => {
                let column = self.column_ref(column, qualify);
                if value.is_null() {
                    let operator = if *negated { "IS NOT NULL" } else { "IS NULL" };
                    Ok(format!("{column} {operator}"))
                } else {
                    let operator = if *negated { "<>" } else { "=" };
                    let placeholder = emitter.placeholder(value.clone());
                    Ok(format!("{column} {operator} {placeholder}"))
                }
            }
            Condition::In {
                column,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Err(QuarryError::usage(format!(
                        "IN condition on {column} requires at least one value"
                    )));
                }
                let column = self.column_ref(column, qualify);
                let placeholders = values
                    .iter()
                    .map(|v| emitter.placeholder(v.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                let operator = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{column} {operator} ({placeholders})"))
            }
            Condition::Matches {
                column,
                pattern,
                case_insensitive,
                negated,
            } => {
                let column = self.column_ref(column, qualify);
                let operator = match (negated, case_insensitive) {
                    (false, false) => "~",
                    (false, true) => "~*",
                    (true, false) => "!~",
                    (true, true) => "!~*",
                };
                let placeholder = emitter.placeholder(pattern.clone());
                Ok(format!("{column} {operator} {placeholder}"))
            }
            Condition::Raw {
                fragment,
                values,
                negated,
            } => {
                let rewritten = self.rewrite_raw(emitter, fragment, values)?;
                if *negated {
                    Ok(format!("NOT ({rewritten})"))
                } else {
                    Ok(rewritten)
                }
            }
            Condition::FullText(search) => Ok(format!(
                "{} @@ {}",
                self.tsvector_expression(search, qualify),
                self.tsquery_expression(search)
            )),
            Condition::Or { left, right } => {
                let left = self.compile_conjunction(emitter, left, qualify)?;
                let right = self.compile_conjunction(emitter, right, qualify)?;
                Ok(format!("(({left}) OR ({right}))"))
            }
        }
    }

    fn compile_conjunction(
        &self,
        emitter: &mut Emitter,
        conditions: &[Condition],
        qualify: bool,
    ) -> Result<String> {
        let parts = conditions
            .iter()
            .map(|c| self.compile_condition(emitter, c, qualify))
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" AND "))
    }

    /// The WHERE clause body, or `None` when there is nothing to filter.
    /// `is_none` descriptors always compile to a clause matching zero rows.
    fn where_clause(&self, emitter: &mut Emitter, qualify: bool) -> Result<Option<String>> {
        if self.descriptor.is_none() {
            return Ok(Some("1=0".to_string()));
        }
        if self.descriptor.conditions().is_empty() {
            return Ok(None);
        }
        self.compile_conjunction(emitter, self.descriptor.conditions(), qualify)
            .map(Some)
    }

    fn select_list(&self, qualify: bool) -> String {
        let mut parts: Vec<String> = if self.descriptor.selects().is_empty() {
            if qualify {
                vec![format!("{}.*", quote_ident(self.descriptor.table()))]
            } else {
                vec!["*".to_string()]
            }
        } else {
            self.descriptor
                .selects()
                .iter()
                .map(|column| self.column_ref(column, qualify))
                .collect()
        };
        if let Some(search) = self.rank_request() {
            parts.push(format!(
                "{} AS {}",
                self.rank_expression(search, qualify),
                RANK_ALIAS
            ));
        }
        parts.join(", ")
    }

    fn from_clause(&self) -> String {
        let mut sql = format!(" FROM {}", quote_ident(self.descriptor.table()));
        for join in self.descriptor.joins() {
            sql.push(' ');
            sql.push_str(&join.to_sql(self.descriptor.table()));
        }
        sql
    }

    pub fn compile_select(&self) -> Result<CompiledQuery> {
        let qualify = self.descriptor.has_joins();
        let mut emitter = Emitter::default();

        let mut sql = String::from("SELECT ");
        if self.descriptor.is_distinct() {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&self.select_list(qualify));
        sql.push_str(&self.from_clause());

        if let Some(clause) = self.where_clause(&mut emitter, qualify)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        if self.descriptor.is_none() {
            return Ok(CompiledQuery {
                sql,
                args: emitter.args,
            });
        }

        if !self.descriptor.groups().is_empty() {
            let groups = self
                .descriptor
                .groups()
                .iter()
                .map(|column| self.column_ref(column, qualify))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" GROUP BY {groups}"));
        }

        if !self.descriptor.orders().is_empty() {
            let orders = self
                .descriptor
                .orders()
                .iter()
                .map(|order| match order {
                    OrderClause::Column { column, direction } => {
                        format!("{} {}", self.column_ref(column, qualify), direction.to_sql())
                    }
                    OrderClause::Raw(expression) => expression.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {orders}"));
        }

        if let Some(limit) = self.descriptor.limit_value() {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.descriptor.offset_value() {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    /// Count rows matching the descriptor. With joins present the count is
    /// over the distinct primary key so join fan-out cannot inflate totals.
    pub fn compile_count(&self) -> Result<CompiledQuery> {
        let qualify = self.descriptor.has_joins();
        let mut emitter = Emitter::default();

        let expression = if self.descriptor.has_joins() {
            let table = quote_ident(self.descriptor.table());
            let key = self.descriptor.primary_key();
            if key.len() == 1 {
                format!("COUNT(DISTINCT {}.{})", table, quote_ident(&key[0]))
            } else {
                let columns = key
                    .iter()
                    .map(|column| format!("{}.{}", table, quote_ident(column)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("COUNT(DISTINCT ({columns}))")
            }
        } else {
            "COUNT(*)".to_string()
        };

        let mut sql = format!("SELECT {expression}");
        sql.push_str(&self.from_clause());
        if let Some(clause) = self.where_clause(&mut emitter, qualify)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    pub fn compile_aggregate(
        &self,
        function: AggregateFunction,
        column: &str,
    ) -> Result<CompiledQuery> {
        let qualify = self.descriptor.has_joins();
        let mut emitter = Emitter::default();

        let expression = format!("{}({})", function.to_sql(), self.column_ref(column, qualify));
        // SUM/AVG of integer columns come back as NUMERIC, which is outside
        // the literal value domain; cast them to double precision.
        let expression = match function {
            AggregateFunction::Sum | AggregateFunction::Avg => format!("({expression})::float8"),
            AggregateFunction::Min | AggregateFunction::Max => expression,
        };
        let mut sql = format!("SELECT {expression} AS aggregate");
        sql.push_str(&self.from_clause());
        if let Some(clause) = self.where_clause(&mut emitter, qualify)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    pub fn compile_exists(&self) -> Result<CompiledQuery> {
        let qualify = self.descriptor.has_joins();
        let mut emitter = Emitter::default();

        let mut sql = String::from("SELECT 1");
        sql.push_str(&self.from_clause());
        if let Some(clause) = self.where_clause(&mut emitter, qualify)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }
        sql.push_str(" LIMIT 1");

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    pub fn compile_insert(&self, payload: &[(String, Value)]) -> Result<CompiledQuery> {
        let skip = self
            .registry
            .map(|r| r.auto_generated(self.descriptor.table()))
            .unwrap_or_default();
        let entries: Vec<&(String, Value)> = payload
            .iter()
            .filter(|(column, _)| !skip.contains(column))
            .collect();
        if entries.is_empty() {
            return Err(QuarryError::usage("insert requires at least one column value"));
        }

        let mut emitter = Emitter::default();
        let columns = entries
            .iter()
            .map(|(column, _)| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = entries
            .iter()
            .map(|(_, value)| emitter.placeholder(value.clone()))
            .collect::<Vec<_>>()
            .join(", ");

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_ident(self.descriptor.table()),
            columns,
            placeholders
        );

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    /// Compile an UPDATE over the descriptor's conditions. WHERE
    /// placeholders continue the numbering after the SET placeholders.
    pub fn compile_update(&self, payload: &[(String, Value)]) -> Result<CompiledQuery> {
        if payload.is_empty() {
            return Err(QuarryError::usage("update requires at least one column value"));
        }

        let mut emitter = Emitter::default();
        let sets = payload
            .iter()
            .map(|(column, value)| {
                format!("{} = {}", quote_ident(column), emitter.placeholder(value.clone()))
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("UPDATE {} SET {}", quote_ident(self.descriptor.table()), sets);
        if let Some(clause) = self.where_clause(&mut emitter, false)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }

    pub fn compile_delete(&self) -> Result<CompiledQuery> {
        let mut emitter = Emitter::default();
        let mut sql = format!("DELETE FROM {}", quote_ident(self.descriptor.table()));
        if let Some(clause) = self.where_clause(&mut emitter, false)? {
            sql.push_str(" WHERE ");
            sql.push_str(&clause);
        }

        Ok(CompiledQuery {
            sql,
            args: emitter.args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_builder::descriptor::Clause;
    use crate::query_builder::joins::JoinKind;
    use crate::query_builder::search::RankFunction;
    use crate::schema::ColumnDescriptor;
    use crate::value::ValueKind;

    fn compile(descriptor: &QueryDescriptor) -> CompiledQuery {
        SqlCompiler::new(descriptor).compile_select().unwrap()
    }

    #[test]
    fn basic_select_with_conjunction_and_limit() {
        let descriptor = QueryDescriptor::new("t")
            .where_eq("id", 1i64)
            .where_eq("name", "x")
            .limit(10);
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"id\" = $1 AND \"name\" = $2 LIMIT 10"
        );
        assert_eq!(
            compiled.args,
            vec![Value::BigInt(1), Value::Text("x".to_string())]
        );
    }

    #[test]
    fn where_all_equals_chained_where() {
        let chained = QueryDescriptor::new("t").where_eq("id", 1i64).where_eq("name", "x");
        let batched = QueryDescriptor::new("t")
            .where_all(&[("id", Value::BigInt(1)), ("name", Value::from("x"))]);
        assert_eq!(compile(&chained), compile(&batched));
    }

    #[test]
    fn membership_uses_contiguous_placeholders() {
        let descriptor =
            QueryDescriptor::new("t").where_in("id", vec![1i64.into(), 3i64.into(), 4i64.into()]);
        let compiled = compile(&descriptor);
        assert_eq!(compiled.sql, "SELECT * FROM \"t\" WHERE \"id\" IN ($1, $2, $3)");
        assert_eq!(
            compiled.args,
            vec![Value::BigInt(1), Value::BigInt(3), Value::BigInt(4)]
        );
    }

    #[test]
    fn empty_membership_is_a_usage_error() {
        let descriptor = QueryDescriptor::new("t").where_in("id", vec![]);
        let err = SqlCompiler::new(&descriptor).compile_select().unwrap_err();
        assert!(matches!(err, QuarryError::Usage(_)));
    }

    #[test]
    fn null_routes_to_is_null() {
        let descriptor = QueryDescriptor::new("t").where_eq("deleted_at", Value::Null);
        assert_eq!(
            compile(&descriptor).sql,
            "SELECT * FROM \"t\" WHERE \"deleted_at\" IS NULL"
        );

        let negated = QueryDescriptor::new("t").not().where_eq("deleted_at", Value::Null);
        let compiled = compile(&negated);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"deleted_at\" IS NOT NULL"
        );
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn negated_equality_compiles_to_not_equal() {
        let descriptor = QueryDescriptor::new("t").not().where_eq("state", "closed");
        assert_eq!(
            compile(&descriptor).sql,
            "SELECT * FROM \"t\" WHERE \"state\" <> $1"
        );
    }

    #[test]
    fn regex_operator_matrix() {
        let base = QueryDescriptor::new("t");
        assert!(compile(&base.where_regex("name", "^a", false)).sql.contains("\"name\" ~ $1"));
        assert!(compile(&base.where_regex("name", "^a", true)).sql.contains("\"name\" ~* $1"));
        assert!(compile(&base.not().where_regex("name", "^a", false))
            .sql
            .contains("\"name\" !~ $1"));
        assert!(compile(&base.not().where_regex("name", "^a", true))
            .sql
            .contains("\"name\" !~* $1"));
    }

    #[test]
    fn raw_placeholders_continue_numbering() {
        let descriptor = QueryDescriptor::new("t")
            .where_eq("x", 1i32)
            .where_eq("y", 2i32)
            .where_raw("a > ? AND b < ?", vec![1i32.into(), 2i32.into()]);
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE \"x\" = $1 AND \"y\" = $2 AND a > $3 AND b < $4"
        );
        assert_eq!(compiled.args[2], Value::Int(1));
        assert_eq!(compiled.args[3], Value::Int(2));
    }

    #[test]
    fn raw_placeholder_count_mismatch_errors() {
        let more_marks = QueryDescriptor::new("t").where_raw("a > ? AND b < ?", vec![1i32.into()]);
        assert!(matches!(
            SqlCompiler::new(&more_marks).compile_select().unwrap_err(),
            QuarryError::Usage(_)
        ));

        let more_values = QueryDescriptor::new("t").where_raw("a > ?", vec![1i32.into(), 2i32.into()]);
        assert!(matches!(
            SqlCompiler::new(&more_values).compile_select().unwrap_err(),
            QuarryError::Usage(_)
        ));
    }

    #[test]
    fn or_tree_parenthesizes_both_sides() {
        let descriptor = QueryDescriptor::new("t").or_where(
            vec![Condition::eq("a", 1i32), Condition::eq("b", 2i32)],
            vec![Condition::eq("c", 3i32)],
        );
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"t\" WHERE ((\"a\" = $1 AND \"b\" = $2) OR (\"c\" = $3))"
        );
        assert_eq!(
            compiled.args,
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }

    #[test]
    fn joins_qualify_bare_columns() {
        let descriptor = QueryDescriptor::new("users")
            .join_foreign_key(JoinKind::Left, "posts", "id", "user_id")
            .where_eq("name", "x")
            .order("created_at");
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT \"users\".* FROM \"users\" \
             LEFT JOIN \"posts\" ON \"users\".\"id\" = \"posts\".\"user_id\" \
             WHERE \"users\".\"name\" = $1 ORDER BY \"users\".\"created_at\" ASC"
        );
    }

    #[test]
    fn dotted_references_are_not_requalified() {
        let descriptor = QueryDescriptor::new("users")
            .inner_join("posts", "posts.user_id = users.id")
            .where_eq("posts.public", true);
        assert!(compile(&descriptor)
            .sql
            .contains("\"posts\".\"public\" = $1"));
    }

    #[test]
    fn clause_order_is_fixed() {
        let descriptor = QueryDescriptor::new("t")
            .select(&["kind"])
            .where_eq("active", true)
            .group(&["kind"])
            .order_desc("kind")
            .limit(5)
            .offset(10);
        assert_eq!(
            compile(&descriptor).sql,
            "SELECT \"kind\" FROM \"t\" WHERE \"active\" = $1 \
             GROUP BY \"kind\" ORDER BY \"kind\" DESC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn order_accepts_raw_expressions() {
        let descriptor = QueryDescriptor::new("t").order_raw("LOWER(name) ASC");
        assert!(compile(&descriptor).sql.ends_with("ORDER BY LOWER(name) ASC"));
    }

    #[test]
    fn distinct_flag() {
        let descriptor = QueryDescriptor::new("t").distinct().select(&["kind"]);
        assert!(compile(&descriptor).sql.starts_with("SELECT DISTINCT \"kind\""));
    }

    #[test]
    fn none_compiles_to_zero_row_query() {
        let descriptor = QueryDescriptor::new("t").where_eq("id", 1i64).limit(10).none();
        let compiled = compile(&descriptor);
        assert_eq!(compiled.sql, "SELECT * FROM \"t\" WHERE 1=0");
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn full_text_predicate_and_escaping() {
        let search = SearchQuery::new("it's & rust", vec!["title".to_string(), "body".to_string()])
            .unwrap();
        let descriptor = QueryDescriptor::new("articles").search(search);
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT * FROM \"articles\" WHERE \
             to_tsvector('english', \"title\") || to_tsvector('english', \"body\") \
             @@ to_tsquery('english', 'it''s & rust')"
        );
        assert!(compiled.args.is_empty());
    }

    #[test]
    fn weighted_ranked_search_appends_rank_column() {
        let search = SearchQuery::new("rust", vec!["title".to_string()])
            .unwrap()
            .weighted("title", 'A')
            .weighted("body", 'B')
            .ranked(RankFunction::RankCoverDensity)
            .rank_normalization(32)
            .plain(true);
        let descriptor = QueryDescriptor::new("articles").search(search);
        let compiled = compile(&descriptor);
        assert_eq!(
            compiled.sql,
            "SELECT *, ts_rank_cd(\
             setweight(to_tsvector('english', \"title\"), 'A') || \
             setweight(to_tsvector('english', \"body\"), 'B'), \
             plainto_tsquery('english', 'rust'), 32) AS pg_search_rank \
             FROM \"articles\" WHERE \
             setweight(to_tsvector('english', \"title\"), 'A') || \
             setweight(to_tsvector('english', \"body\"), 'B') \
             @@ plainto_tsquery('english', 'rust')"
        );
    }

    #[test]
    fn count_is_join_aware() {
        let plain = QueryDescriptor::new("users").where_eq("active", true);
        assert_eq!(
            SqlCompiler::new(&plain).compile_count().unwrap().sql,
            "SELECT COUNT(*) FROM \"users\" WHERE \"active\" = $1"
        );

        let joined = plain.join_foreign_key(JoinKind::Inner, "posts", "id", "user_id");
        assert_eq!(
            SqlCompiler::new(&joined).compile_count().unwrap().sql,
            "SELECT COUNT(DISTINCT \"users\".\"id\") FROM \"users\" \
             INNER JOIN \"posts\" ON \"users\".\"id\" = \"posts\".\"user_id\" \
             WHERE \"users\".\"active\" = $1"
        );
    }

    #[test]
    fn composite_key_count_distinct() {
        let descriptor = QueryDescriptor::new("memberships")
            .with_primary_key(&["user_id", "team_id"])
            .inner_join("teams", "teams.id = memberships.team_id");
        assert!(SqlCompiler::new(&descriptor)
            .compile_count()
            .unwrap()
            .sql
            .contains("COUNT(DISTINCT (\"memberships\".\"user_id\", \"memberships\".\"team_id\"))"));
    }

    #[test]
    fn aggregate_sql() {
        let descriptor = QueryDescriptor::new("orders").where_eq("paid", true);
        let compiled = SqlCompiler::new(&descriptor)
            .compile_aggregate(AggregateFunction::Sum, "amount")
            .unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT (SUM(\"amount\"))::float8 AS aggregate FROM \"orders\" WHERE \"paid\" = $1"
        );

        let min = SqlCompiler::new(&descriptor)
            .compile_aggregate(AggregateFunction::Min, "amount")
            .unwrap();
        assert_eq!(
            min.sql,
            "SELECT MIN(\"amount\") AS aggregate FROM \"orders\" WHERE \"paid\" = $1"
        );
    }

    #[test]
    fn exists_sql() {
        let descriptor = QueryDescriptor::new("users").where_eq("id", 7i64);
        assert_eq!(
            SqlCompiler::new(&descriptor).compile_exists().unwrap().sql,
            "SELECT 1 FROM \"users\" WHERE \"id\" = $1 LIMIT 1"
        );
    }

    #[test]
    fn insert_with_registry_drops_auto_generated_columns() {
        let registry = SchemaRegistry::new();
        registry.get_or_register("users", || {
            vec![
                ColumnDescriptor::new("id", ValueKind::BigInt).auto_generated(),
                ColumnDescriptor::new("name", ValueKind::Text),
                ColumnDescriptor::new("created_at", ValueKind::Timestamp).auto_generated(),
            ]
        });
        let descriptor = QueryDescriptor::new("users");
        let compiled = SqlCompiler::new(&descriptor)
            .with_registry(&registry)
            .compile_insert(&[
                ("id".to_string(), Value::BigInt(9)),
                ("name".to_string(), Value::from("ada")),
            ])
            .unwrap();
        assert_eq!(
            compiled.sql,
            "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *"
        );
        assert_eq!(compiled.args, vec![Value::Text("ada".to_string())]);
    }

    #[test]
    fn update_numbers_where_after_set() {
        let descriptor = QueryDescriptor::new("users").where_eq("id", 7i64);
        let compiled = SqlCompiler::new(&descriptor)
            .compile_update(&[
                ("name".to_string(), Value::from("ada")),
                ("active".to_string(), Value::Bool(true)),
            ])
            .unwrap();
        assert_eq!(
            compiled.sql,
            "UPDATE \"users\" SET \"name\" = $1, \"active\" = $2 WHERE \"id\" = $3"
        );
        assert_eq!(
            compiled.args,
            vec![
                Value::Text("ada".to_string()),
                Value::Bool(true),
                Value::BigInt(7)
            ]
        );
    }

    #[test]
    fn delete_sql() {
        let descriptor = QueryDescriptor::new("users").where_eq("id", 7i64);
        assert_eq!(
            SqlCompiler::new(&descriptor).compile_delete().unwrap().sql,
            "DELETE FROM \"users\" WHERE \"id\" = $1"
        );
    }

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
        assert_eq!(escape_literal("it's"), "it''s");
    }

    #[test]
    fn unscope_where_drops_the_clause() {
        let descriptor = QueryDescriptor::new("t").where_eq("id", 1i64).unscope(Clause::Where);
        assert_eq!(compile(&descriptor).sql, "SELECT * FROM \"t\"");
    }

    #[test]
    fn compilation_is_deterministic() {
        let search = SearchQuery::new("rust", vec!["title".to_string()]).unwrap();
        let descriptor = QueryDescriptor::new("t")
            .where_eq("a", 1i32)
            .where_in("b", vec![2i32.into(), 3i32.into()])
            .search(search)
            .order("a")
            .limit(4);
        assert_eq!(compile(&descriptor), compile(&descriptor));
    }
}

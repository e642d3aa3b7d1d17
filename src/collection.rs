//! # Lazy Result Collection
//!
//! Wraps a [`QueryDescriptor`] and defers execution until a terminal
//! operation. Materialized rows are cached; `each` streams without
//! buffering the whole result set; aggregates compile dedicated SQL. A
//! `none` descriptor short-circuits every terminal to its empty/zero
//! identity without touching the network.

use std::sync::Arc;

use sqlx::postgres::PgRow;
use sqlx::{Column, FromRow, Row};

use crate::database::{ConnectionManager, ContextId};
use crate::error::{QuarryError, Result};
use crate::query_builder::compiler::quote_ident;
use crate::query_builder::{
    AggregateFunction, Clause, CursorMeta, CursorPage, CursorParams, PageMeta, PaginatedResult,
    QueryDescriptor, SqlCompiler,
};
use crate::schema::SchemaRegistry;
use crate::value::Value;

pub struct Collection {
    descriptor: QueryDescriptor,
    manager: Arc<ConnectionManager>,
    ctx: ContextId,
    registry: Option<Arc<SchemaRegistry>>,
    cached: Option<Vec<PgRow>>,
}

impl Collection {
    pub fn new(
        manager: Arc<ConnectionManager>,
        ctx: ContextId,
        descriptor: QueryDescriptor,
    ) -> Self {
        Self {
            descriptor,
            manager,
            ctx,
            registry: None,
            cached: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<SchemaRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    fn compiler(&self) -> SqlCompiler<'_> {
        let compiler = SqlCompiler::new(&self.descriptor);
        match &self.registry {
            Some(registry) => compiler.with_registry(registry),
            None => compiler,
        }
    }

    /// Execute once and cache the raw rows. Subsequent calls reuse the
    /// cache.
    pub async fn to_list(&mut self) -> Result<&[PgRow]> {
        if self.cached.is_none() {
            let rows = if self.descriptor.is_none() {
                Vec::new()
            } else {
                let compiled = self.compiler().compile_select()?;
                self.manager
                    .fetch_all(self.ctx, &compiled.sql, &compiled.args)
                    .await?
            };
            self.cached = Some(rows);
        }
        match &self.cached {
            Some(rows) => Ok(rows),
            None => Ok(&[]),
        }
    }

    /// Materialize and decode every row.
    pub async fn to_models<T>(&mut self) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let rows = self.to_list().await?;
        rows.iter()
            .map(|row| T::from_row(row).map_err(QuarryError::from))
            .collect()
    }

    /// Materialize rows as ordered `(column, value)` tuples, using the
    /// registered schema when available and row metadata otherwise.
    pub async fn to_value_rows(&mut self) -> Result<Vec<Vec<(String, Value)>>> {
        let registered = self
            .registry
            .as_ref()
            .and_then(|r| r.columns(self.descriptor.table()));
        let rows = self.to_list().await?;
        rows.iter()
            .map(|row| match &registered {
                Some(columns) => columns
                    .iter()
                    .map(|c| Ok((c.name.clone(), Value::from_row_column(row, &c.name)?)))
                    .collect::<Result<Vec<_>>>(),
                None => row
                    .columns()
                    .iter()
                    .map(|c| Ok((c.name().to_string(), Value::from_row_column(row, c.name())?)))
                    .collect(),
            })
            .collect()
    }

    /// Stream rows to the callback. Uses the cache when one exists,
    /// otherwise streams from the database without full materialization.
    pub async fn each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&PgRow) -> Result<()>,
    {
        if self.descriptor.is_none() {
            return Ok(());
        }
        if let Some(rows) = &self.cached {
            for row in rows {
                f(row)?;
            }
            return Ok(());
        }
        let compiled = self.compiler().compile_select()?;
        self.manager
            .fetch_each(self.ctx, &compiled.sql, &compiled.args, f)
            .await
    }

    /// First row, decoded; applies `LIMIT 1` rather than materializing.
    pub async fn first<T>(&self) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        if self.descriptor.is_none() {
            return Ok(None);
        }
        let limited = self.descriptor.limit(1);
        let compiled = SqlCompiler::new(&limited).compile_select()?;
        let row = self
            .manager
            .fetch_optional(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        row.map(|r| T::from_row(&r).map_err(QuarryError::from))
            .transpose()
    }

    /// Up to `n` rows, decoded.
    pub async fn take<T>(&self, n: i64) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        if self.descriptor.is_none() {
            return Ok(Vec::new());
        }
        let limited = self.descriptor.limit(n);
        let compiled = SqlCompiler::new(&limited).compile_select()?;
        let rows = self
            .manager
            .fetch_all(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        rows.iter()
            .map(|row| T::from_row(row).map_err(QuarryError::from))
            .collect()
    }

    /// Look up one record by primary key. The key must carry exactly one
    /// value per primary-key column.
    pub async fn find<T>(&self, key: &[Value]) -> Result<T>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let columns = self.descriptor.primary_key().to_vec();
        if key.len() != columns.len() {
            return Err(QuarryError::usage(format!(
                "find on {} expects {} key value(s), got {}",
                self.descriptor.table(),
                columns.len(),
                key.len()
            )));
        }
        let mut scoped = self.descriptor.clone();
        for (column, value) in columns.iter().zip(key) {
            scoped = scoped.where_eq(column, value.clone());
        }
        let collection = Collection::new(self.manager.clone(), self.ctx, scoped);
        collection.first().await?.ok_or_else(|| {
            QuarryError::not_found(format!(
                "{} with key {:?}",
                self.descriptor.table(),
                key
            ))
        })
    }

    pub async fn count(&self) -> Result<i64> {
        if self.descriptor.is_none() {
            return Ok(0);
        }
        let compiled = self.compiler().compile_count()?;
        let row = self
            .manager
            .fetch_optional(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        match row {
            Some(row) => Ok(row.try_get::<i64, _>(0)?),
            None => Ok(0),
        }
    }

    async fn aggregate(&self, function: AggregateFunction, column: &str) -> Result<Value> {
        if self.descriptor.is_none() {
            return Ok(Value::Null);
        }
        let compiled = self.compiler().compile_aggregate(function, column)?;
        let row = self
            .manager
            .fetch_optional(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        match row {
            Some(row) => Value::from_row_column(&row, "aggregate"),
            None => Ok(Value::Null),
        }
    }

    pub async fn sum(&self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Sum, column).await
    }

    pub async fn average(&self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Avg, column).await
    }

    pub async fn min(&self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Min, column).await
    }

    pub async fn max(&self, column: &str) -> Result<Value> {
        self.aggregate(AggregateFunction::Max, column).await
    }

    pub async fn exists(&self) -> Result<bool> {
        if self.descriptor.is_none() {
            return Ok(false);
        }
        let compiled = self.compiler().compile_exists()?;
        let row = self
            .manager
            .fetch_optional(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        Ok(row.is_some())
    }

    /// Insert one record through this collection's table. Database
    /// rejections surface as [`QuarryError::NotSaved`] with the driver's
    /// message.
    pub async fn insert(&self, payload: &[(String, Value)]) -> Result<PgRow> {
        let compiled = self.compiler().compile_insert(payload)?;
        let row = self
            .manager
            .fetch_optional(self.ctx, &compiled.sql, &compiled.args)
            .await
            .map_err(not_saved)?;
        row.ok_or_else(|| QuarryError::not_saved("insert returned no row"))
    }

    /// Update every matching row; returns the affected count.
    pub async fn update_all(&self, payload: &[(String, Value)]) -> Result<u64> {
        if self.descriptor.is_none() {
            return Ok(0);
        }
        let compiled = self.compiler().compile_update(payload)?;
        self.manager
            .execute(self.ctx, &compiled.sql, &compiled.args)
            .await
            .map_err(not_saved)
    }

    /// Delete every matching row; returns the affected count.
    pub async fn delete_all(&self) -> Result<u64> {
        if self.descriptor.is_none() {
            return Ok(0);
        }
        let compiled = self.compiler().compile_delete()?;
        self.manager
            .execute(self.ctx, &compiled.sql, &compiled.args)
            .await
    }

    /// Iterate in batches of `size` using successive `LIMIT`/`OFFSET`
    /// queries, stopping at the first short batch (even an empty one). A
    /// short final batch is padded to `size` with `fill_with` when
    /// supplied. One buffer is reused across batches; its borrow cannot
    /// outlive the callback.
    pub async fn in_groups_of<T, F>(&self, size: i64, fill_with: Option<T>, mut f: F) -> Result<()>
    where
        T: for<'r> FromRow<'r, PgRow> + Clone,
        F: FnMut(&[T]),
    {
        if size < 1 {
            return Err(QuarryError::usage("batch size must be at least 1"));
        }
        if self.descriptor.is_none() {
            return Ok(());
        }

        let mut batch: Vec<T> = Vec::with_capacity(size as usize);
        let mut page = 0i64;
        loop {
            let descriptor = self.descriptor.limit(size).offset(page * size);
            let compiled = SqlCompiler::new(&descriptor).compile_select()?;
            let rows = self
                .manager
                .fetch_all(self.ctx, &compiled.sql, &compiled.args)
                .await?;

            batch.clear();
            for row in &rows {
                batch.push(T::from_row(row)?);
            }

            let fetched = batch.len();
            if fetched == 0 {
                break;
            }
            if (fetched as i64) < size {
                if let Some(filler) = &fill_with {
                    while (batch.len() as i64) < size {
                        batch.push(filler.clone());
                    }
                }
                f(&batch);
                break;
            }
            f(&batch);
            page += 1;
        }
        Ok(())
    }

    /// Offset pagination with a join-aware total count.
    pub async fn paginate<T>(&self, page: i64, limit: i64) -> Result<PaginatedResult<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let page = page.max(1);
        let limit = limit.max(1);

        if self.descriptor.is_none() {
            return Ok(PaginatedResult {
                records: Vec::new(),
                pagination: PageMeta::compute(0, page, limit, 0),
            });
        }

        let total = self.count().await?;
        let descriptor = self.descriptor.limit(limit).offset((page - 1) * limit);
        let compiled = SqlCompiler::new(&descriptor).compile_select()?;
        let rows = self
            .manager
            .fetch_all(self.ctx, &compiled.sql, &compiled.args)
            .await?;
        let records = rows
            .iter()
            .map(|row| T::from_row(row).map_err(QuarryError::from))
            .collect::<Result<Vec<T>>>()?;

        let pagination = PageMeta::compute(total, page, limit, records.len());
        Ok(PaginatedResult {
            records,
            pagination,
        })
    }

    /// Keyset pagination. Fetches `limit + 1` rows to detect a further
    /// page without a count query.
    pub async fn paginate_cursor<T>(&self, params: CursorParams) -> Result<CursorPage<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        params.validate()?;
        let limit = params.limit.max(1);

        let cursor_column = match &params.cursor_column {
            Some(column) => column.clone(),
            None => {
                let key = self.descriptor.primary_key();
                if key.len() != 1 {
                    return Err(QuarryError::usage(
                        "cursor pagination on a composite-key model requires an explicit cursor column",
                    ));
                }
                key[0].clone()
            }
        };

        if self.descriptor.is_none() {
            return Ok(CursorPage {
                records: Vec::new(),
                pagination: CursorMeta {
                    limit,
                    next_cursor: None,
                    prev_cursor: None,
                },
            });
        }

        let qualified = if self.descriptor.has_joins() {
            format!(
                "{}.{}",
                quote_ident(self.descriptor.table()),
                quote_ident(&cursor_column)
            )
        } else {
            quote_ident(&cursor_column)
        };

        let backwards = params.before.is_some();
        let mut descriptor = self
            .descriptor
            .unscope(Clause::Order)
            .unscope(Clause::Limit)
            .unscope(Clause::Offset);
        if let Some(after) = &params.after {
            descriptor = descriptor.where_raw(&format!("{qualified} > ?"), vec![after.clone()]);
        }
        if let Some(before) = &params.before {
            descriptor = descriptor.where_raw(&format!("{qualified} < ?"), vec![before.clone()]);
        }
        descriptor = if backwards {
            descriptor.order_desc(&cursor_column)
        } else {
            descriptor.order(&cursor_column)
        };
        descriptor = descriptor.limit(limit + 1);

        let compiled = SqlCompiler::new(&descriptor).compile_select()?;
        let rows = self
            .manager
            .fetch_all(self.ctx, &compiled.sql, &compiled.args)
            .await?;

        let mut cursors = rows
            .iter()
            .map(|row| Value::from_row_column(row, &cursor_column))
            .collect::<Result<Vec<Value>>>()?;
        let mut records = rows
            .iter()
            .map(|row| T::from_row(row).map_err(QuarryError::from))
            .collect::<Result<Vec<T>>>()?;

        let has_extra = (records.len() as i64) > limit;
        records.truncate(limit as usize);
        cursors.truncate(limit as usize);
        if backwards {
            records.reverse();
            cursors.reverse();
        }

        let (next_cursor, prev_cursor) = if backwards {
            (
                cursors.last().cloned(),
                if has_extra { cursors.first().cloned() } else { None },
            )
        } else {
            (
                if has_extra { cursors.last().cloned() } else { None },
                if params.after.is_some() {
                    cursors.first().cloned()
                } else {
                    None
                },
            )
        };

        Ok(CursorPage {
            records,
            pagination: CursorMeta {
                limit,
                next_cursor,
                prev_cursor,
            },
        })
    }
}

fn not_saved(error: QuarryError) -> QuarryError {
    match error {
        QuarryError::Database(db) => QuarryError::not_saved(db.to_string()),
        other => other,
    }
}

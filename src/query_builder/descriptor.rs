//! Immutable query descriptor.
//!
//! Every builder method derives a new descriptor; the receiver is never
//! observably mutated. Sub-collections are `Arc`-shared, so a derivation
//! copies only the collection it extends.

use std::sync::Arc;

use super::conditions::Condition;
use super::joins::{Join, JoinKind};
use super::search::SearchQuery;
use crate::value::Value;

/// Sentinel for "unset" limit/offset, keeping the fields non-nullable
/// internally while the public accessors expose an `Option`.
const UNSET: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn to_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderClause {
    Column {
        column: String,
        direction: OrderDirection,
    },
    Raw(String),
}

/// Clause categories removable with [`QueryDescriptor::unscope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Select,
    Where,
    Order,
    Group,
    Limit,
    Offset,
}

#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    table: String,
    primary_key: Arc<Vec<String>>,
    selects: Arc<Vec<String>>,
    conditions: Arc<Vec<Condition>>,
    orders: Arc<Vec<OrderClause>>,
    joins: Arc<Vec<Join>>,
    groups: Arc<Vec<String>>,
    limit: i64,
    offset: i64,
    distinct: bool,
    /// Transient: set by [`not`](Self::not), consumed by the next
    /// condition-adding call.
    negate_next: bool,
    is_none: bool,
}

impl QueryDescriptor {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: Arc::new(vec!["id".to_string()]),
            selects: Arc::new(Vec::new()),
            conditions: Arc::new(Vec::new()),
            orders: Arc::new(Vec::new()),
            joins: Arc::new(Vec::new()),
            groups: Arc::new(Vec::new()),
            limit: UNSET,
            offset: UNSET,
            distinct: false,
            negate_next: false,
            is_none: false,
        }
    }

    pub fn with_primary_key(&self, columns: &[&str]) -> Self {
        let mut next = self.clone();
        next.primary_key = Arc::new(columns.iter().map(|c| c.to_string()).collect());
        next
    }

    fn push_condition(&self, condition: Condition) -> Self {
        let mut next = self.clone();
        let condition = if next.negate_next {
            condition.negated()
        } else {
            condition
        };
        next.negate_next = false;
        Arc::make_mut(&mut next.conditions).push(condition);
        next
    }

    /// Append selected columns; an empty select list compiles to `*`.
    pub fn select(&self, columns: &[&str]) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.selects).extend(columns.iter().map(|c| c.to_string()));
        next
    }

    pub fn where_eq(&self, column: &str, value: impl Into<Value>) -> Self {
        self.push_condition(Condition::eq(column, value))
    }

    /// Conjunction of several equality conditions in one call.
    pub fn where_all(&self, pairs: &[(&str, Value)]) -> Self {
        let mut next = self.clone();
        let negate = next.negate_next;
        next.negate_next = false;
        let conditions = Arc::make_mut(&mut next.conditions);
        for (column, value) in pairs {
            let condition = Condition::eq(*column, value.clone());
            conditions.push(if negate { condition.negated() } else { condition });
        }
        next
    }

    pub fn where_in(&self, column: &str, values: Vec<Value>) -> Self {
        self.push_condition(Condition::is_in(column, values))
    }

    pub fn where_regex(&self, column: &str, pattern: &str, case_insensitive: bool) -> Self {
        self.push_condition(Condition::matches(column, pattern, case_insensitive))
    }

    pub fn where_raw(&self, fragment: &str, values: Vec<Value>) -> Self {
        self.push_condition(Condition::raw(fragment, values))
    }

    pub fn where_condition(&self, condition: Condition) -> Self {
        self.push_condition(condition)
    }

    /// `(left AND ...) OR (right AND ...)`.
    pub fn or_where(&self, left: Vec<Condition>, right: Vec<Condition>) -> Self {
        self.push_condition(Condition::Or { left, right })
    }

    pub fn search(&self, search: SearchQuery) -> Self {
        self.push_condition(Condition::FullText(search))
    }

    /// Negate the next condition-adding call. The flag never persists
    /// beyond that call.
    pub fn not(&self) -> Self {
        let mut next = self.clone();
        next.negate_next = true;
        next
    }

    pub fn join(&self, join: Join) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.joins).push(join);
        next
    }

    pub fn inner_join(&self, table: &str, on: &str) -> Self {
        self.join(Join::inner(table, on))
    }

    pub fn left_join(&self, table: &str, on: &str) -> Self {
        self.join(Join::left(table, on))
    }

    pub fn right_join(&self, table: &str, on: &str) -> Self {
        self.join(Join::right(table, on))
    }

    pub fn full_join(&self, table: &str, on: &str) -> Self {
        self.join(Join::full(table, on))
    }

    pub fn join_foreign_key(
        &self,
        kind: JoinKind,
        table: &str,
        primary_key: &str,
        foreign_key: &str,
    ) -> Self {
        self.join(Join::foreign_key(kind, table, primary_key, foreign_key))
    }

    pub fn group(&self, columns: &[&str]) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.groups).extend(columns.iter().map(|c| c.to_string()));
        next
    }

    pub fn order(&self, column: &str) -> Self {
        self.push_order(OrderClause::Column {
            column: column.to_string(),
            direction: OrderDirection::Asc,
        })
    }

    pub fn order_desc(&self, column: &str) -> Self {
        self.push_order(OrderClause::Column {
            column: column.to_string(),
            direction: OrderDirection::Desc,
        })
    }

    pub fn order_raw(&self, expression: &str) -> Self {
        self.push_order(OrderClause::Raw(expression.to_string()))
    }

    fn push_order(&self, clause: OrderClause) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.orders).push(clause);
        next
    }

    /// Negative values mean "unset".
    pub fn limit(&self, limit: i64) -> Self {
        let mut next = self.clone();
        next.limit = if limit < 0 { UNSET } else { limit };
        next
    }

    pub fn offset(&self, offset: i64) -> Self {
        let mut next = self.clone();
        next.offset = if offset < 0 { UNSET } else { offset };
        next
    }

    pub fn distinct(&self) -> Self {
        let mut next = self.clone();
        next.distinct = true;
        next
    }

    /// A descriptor guaranteed to match nothing. Compilation emits
    /// `WHERE 1=0` and every lazy operation short-circuits.
    pub fn none(&self) -> Self {
        let mut next = self.clone();
        next.is_none = true;
        next
    }

    /// Remove a clause category entirely, for overriding inherited defaults.
    pub fn unscope(&self, clause: Clause) -> Self {
        let mut next = self.clone();
        match clause {
            Clause::Select => next.selects = Arc::new(Vec::new()),
            Clause::Where => next.conditions = Arc::new(Vec::new()),
            Clause::Order => next.orders = Arc::new(Vec::new()),
            Clause::Group => next.groups = Arc::new(Vec::new()),
            Clause::Limit => next.limit = UNSET,
            Clause::Offset => next.offset = UNSET,
        }
        next
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn selects(&self) -> &[String] {
        &self.selects
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn orders(&self) -> &[OrderClause] {
        &self.orders
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn has_joins(&self) -> bool {
        !self.joins.is_empty()
    }

    pub fn limit_value(&self) -> Option<i64> {
        (self.limit >= 0).then_some(self.limit)
    }

    pub fn offset_value(&self) -> Option<i64> {
        (self.offset >= 0).then_some(self.offset)
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn is_none(&self) -> bool {
        self.is_none
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_never_mutates_the_receiver() {
        let base = QueryDescriptor::new("users");
        let derived = base.where_eq("id", 1i64).limit(10);
        assert!(base.conditions().is_empty());
        assert_eq!(base.limit_value(), None);
        assert_eq!(derived.conditions().len(), 1);
        assert_eq!(derived.limit_value(), Some(10));
    }

    #[test]
    fn untouched_collections_stay_shared() {
        let base = QueryDescriptor::new("users").where_eq("id", 1i64).order("name");
        let derived = base.limit(5);
        assert!(Arc::ptr_eq(&base.conditions, &derived.conditions));
        assert!(Arc::ptr_eq(&base.orders, &derived.orders));
        let derived = base.where_eq("age", 30i32);
        assert!(!Arc::ptr_eq(&base.conditions, &derived.conditions));
        assert!(Arc::ptr_eq(&base.orders, &derived.orders));
    }

    #[test]
    fn not_applies_to_the_next_condition_only() {
        let descriptor = QueryDescriptor::new("users")
            .not()
            .where_eq("banned", true)
            .where_eq("active", true);
        match &descriptor.conditions()[0] {
            Condition::Compare { negated, .. } => assert!(negated),
            other => panic!("unexpected condition {other:?}"),
        }
        match &descriptor.conditions()[1] {
            Condition::Compare { negated, .. } => assert!(!negated),
            other => panic!("unexpected condition {other:?}"),
        }
    }

    #[test]
    fn limit_sentinel_roundtrip() {
        let descriptor = QueryDescriptor::new("users");
        assert_eq!(descriptor.limit_value(), None);
        assert_eq!(descriptor.limit(0).limit_value(), Some(0));
        assert_eq!(descriptor.limit(10).limit(-3).limit_value(), None);
    }

    #[test]
    fn unscope_removes_a_single_category() {
        let descriptor = QueryDescriptor::new("users")
            .where_eq("id", 1i64)
            .order("name")
            .limit(10);
        let unscoped = descriptor.unscope(Clause::Where);
        assert!(unscoped.conditions().is_empty());
        assert_eq!(unscoped.orders().len(), 1);
        assert_eq!(unscoped.limit_value(), Some(10));
    }

    #[test]
    fn none_is_sticky() {
        let descriptor = QueryDescriptor::new("users").none().where_eq("id", 1i64);
        assert!(descriptor.is_none());
    }
}

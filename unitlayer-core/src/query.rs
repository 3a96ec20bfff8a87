//! Query construction and filtering API for unit listings.
//!
//! Two query types exist:
//!
//! - [`UnitQuery`] is what callers build. Its field paths use business identifiers
//!   (`values.<item id>`) and it may be scoped to one unit type by business id.
//! - [`Query`] is what backends receive. [`UnitStore`](crate::store::UnitStore) produces it
//!   by rewriting `values.<item id>` to `values.<item technical id>` and folding the unit
//!   type scope into the filter.
//!
//! Filter values are compared against **stored** encodings (a percentage filter compares
//! basis points, a date filter compares `{ iso }` documents or `values.<item>.iso` strings).
//!
//! # Query Building
//!
//! ```ignore
//! use unitlayer::query::{Filter, SortDirection, UnitQuery};
//!
//! let query = UnitQuery::builder()
//!     .unit_type("project")
//!     .filter(Filter::gte("values.progress", 5000).and(Filter::exists("values.owner")))
//!     .sort("createdAt", SortDirection::Desc)
//!     .search("apollo")
//!     .limit(10)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `regex`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of`, `none_of`
//! - Logical: `and`, `or`, `not`

use bson::Bson;

use crate::error::{UnitStoreError, UnitStoreResult};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field path to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
    /// String matches a regular expression.
    Regex,
    /// Field (or any element of an array field) equals one of the values.
    AnyOf,
    /// Field (and every element of an array field) equals none of the values.
    NoneOf,
}

/// A filter expression over stored unit documents.
///
/// Field paths are dotted (`values.progress`, `metadata.owner`).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Logical OR of multiple expressions (any must match).
    Or(Vec<Expr>),
    /// Logical NOT of an expression (inverts the result).
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        /// The field path to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression (logical NOT).
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Rewrites every field path in this expression.
    pub fn try_map_fields<F>(self, map: &mut F) -> UnitStoreResult<Self>
    where
        F: FnMut(&str) -> UnitStoreResult<String>,
    {
        Ok(match self {
            Expr::And(exprs) => Expr::And(
                exprs
                    .into_iter()
                    .map(|expr| expr.try_map_fields(map))
                    .collect::<UnitStoreResult<_>>()?,
            ),
            Expr::Or(exprs) => Expr::Or(
                exprs
                    .into_iter()
                    .map(|expr| expr.try_map_fields(map))
                    .collect::<UnitStoreResult<_>>()?,
            ),
            Expr::Not(expr) => Expr::Not(Box::new(expr.try_map_fields(map)?)),
            Expr::Exists(field, should_exist) => Expr::Exists(map(&field)?, should_exist),
            Expr::Field { field, op, value } => Expr::Field { field: map(&field)?, op, value },
        })
    }
}

/// A query as handed to a storage backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Case-insensitive substring matched against the unit business id.
    pub search: Option<String>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Lowercased search term, `None` when empty.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }
}

/// A caller-facing query over units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitQuery {
    /// Business id of the unit type to list. Required for filtering or sorting on values.
    pub unit_type: Option<String>,
    pub query: Query,
}

impl UnitQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> UnitQueryBuilder {
        UnitQueryBuilder::default()
    }

    /// All units of one unit type.
    pub fn of_type(unit_type: impl Into<String>) -> Self {
        Self::builder().unit_type(unit_type).build()
    }
}

/// Helper struct for constructing filter expressions.
///
/// ```ignore
/// use unitlayer::query::Filter;
///
/// let expr = Filter::eq("values.status.key", "active")
///     .and(Filter::gt("values.progress", 5000));
/// ```
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the string field matches `pattern`.
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Expr {
        Expr::field(field.into(), FieldOp::Regex, Bson::String(pattern.into()))
    }

    /// Matches documents where the field exists.
    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    /// Matches documents where the field does not exist.
    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    /// All expressions must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    /// Any expression may match.
    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    /// Matches documents where the field equals any of `values`.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::AnyOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }

    /// Matches documents where the field equals none of `values`.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(
            field.into(),
            FieldOp::NoneOf,
            Bson::Array(values.into_iter().map(Into::into).collect()),
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Sets the filter expression, combining it with any previous one using AND.
    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(match self.query.filter.take() {
            Some(existing) => existing.and(filter),
            None => filter,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Adds a sort key. Keys added first take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.query.search = Some(term.into());
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitQueryBuilder {
    unit_type: Option<String>,
    query: QueryBuilder,
}

impl UnitQueryBuilder {
    pub fn unit_type(mut self, unit_type: impl Into<String>) -> Self {
        self.unit_type = Some(unit_type.into());
        self
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query = self.query.filter(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query = self.query.limit(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query = self.query.offset(offset);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query = self.query.sort(field, direction);
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.query = self.query.search(term);
        self
    }

    pub fn build(self) -> UnitQuery {
        UnitQuery {
            unit_type: self.unit_type,
            query: self.query.build(),
        }
    }
}

/// Walks a filter expression. Backends implement this to evaluate or translate filters.
pub trait QueryVisitor {
    type Output;
    type Error: Into<UnitStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_combines_filters_and_sorts() {
        let query = UnitQuery::builder()
            .unit_type("project")
            .filter(Filter::eq("id", "a"))
            .filter(Filter::gt("values.progress", 10))
            .sort("createdAt", SortDirection::Desc)
            .sort("id", SortDirection::Asc)
            .limit(5)
            .offset(2)
            .search("  Apollo ")
            .build();

        assert_eq!(query.unit_type.as_deref(), Some("project"));
        assert_eq!(
            query.query.filter,
            Some(Expr::And(vec![Filter::eq("id", "a"), Filter::gt("values.progress", 10)]))
        );
        assert_eq!(query.query.sort.len(), 2);
        assert_eq!(query.query.sort[0].field, "createdAt");
        assert_eq!(query.query.limit, Some(5));
        assert_eq!(query.query.offset, Some(2));
        assert_eq!(query.query.search_term().as_deref(), Some("apollo"));
    }

    #[test]
    fn blank_search_is_ignored() {
        let query = Query::builder().search("   ").build();

        assert_eq!(query.search_term(), None);
    }

    #[test]
    fn field_paths_can_be_rewritten() {
        let expr = Filter::or([Filter::eq("values.a", 1), Filter::not_exists("values.b").not()]);

        let rewritten = expr
            .try_map_fields(&mut |field| Ok(field.replace("values.", "values.x-")))
            .unwrap();

        assert_eq!(
            rewritten,
            Filter::or([Filter::eq("values.x-a", 1), Filter::not_exists("values.x-b").not()])
        );

        let failed = Filter::eq("values.a", 1).try_map_fields(&mut |field| {
            Err(UnitStoreError::Validation(format!("cannot map {field}")))
        });
        assert!(failed.is_err());
    }

    #[test]
    fn membership_filters_collect_values() {
        assert_eq!(
            Filter::any_of("id", ["a", "b"]),
            Expr::Field {
                field: "id".to_string(),
                op: FieldOp::AnyOf,
                value: Bson::Array(vec![Bson::String("a".into()), Bson::String("b".into())]),
            }
        );
    }
}

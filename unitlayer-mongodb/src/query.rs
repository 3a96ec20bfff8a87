//! Query translation from unitlayer filter expressions to MongoDB query syntax.

use bson::{Bson, Document, doc};

use unitlayer_core::{
    document::fields,
    error::UnitStoreError,
    query::{Expr, FieldOp, Query, QueryVisitor, SortDirection},
};

/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Full `find` filter for a unit query, including the search term.
    pub fn filter(query: &Query) -> Result<Document, UnitStoreError> {
        let mut clauses = Vec::new();

        if let Some(expr) = &query.filter {
            clauses.push(MongoQueryTranslator.visit_expr(expr)?);
        }
        if let Some(term) = query.search_term() {
            let mut clause = Document::new();
            clause.insert(fields::ID, doc! { "$regex": regex::escape(&term), "$options": "i" });
            clauses.push(clause);
        }

        Ok(match clauses.len() {
            0 => doc! {},
            1 => clauses.remove(0),
            _ => doc! { "$and": clauses },
        })
    }

    /// Sort document for a unit query. Business id breaks ties.
    pub fn sort(query: &Query) -> Document {
        let mut sort = Document::new();

        for key in &query.sort {
            if !sort.contains_key(&key.field) {
                sort.insert(
                    key.field.clone(),
                    match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    },
                );
            }
        }
        if !sort.contains_key(fields::ID) {
            sort.insert(fields::ID, 1);
        }

        sort
    }
}

fn as_array(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        single => Bson::Array(vec![single.clone()]),
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = UnitStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to operator expressions, so negate whole clauses with `$nor`.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Regex => match value {
                    Bson::String(pattern) => doc! { "$regex": pattern },
                    _ => return Err(UnitStoreError::Validation(format!(
                        "Regex filter on \"{field}\" needs a string pattern"
                    ))),
                },
                FieldOp::AnyOf => doc! { "$in": as_array(value) },
                FieldOp::NoneOf => doc! { "$nin": as_array(value) },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitlayer_core::query::Filter;

    #[test]
    fn translates_nested_expressions() {
        let expr = Filter::eq("values.a", 1)
            .and(Filter::any_of("id", ["x", "y"]))
            .and(Filter::exists("metadata.owner").not());

        assert_eq!(
            MongoQueryTranslator.visit_expr(&expr).unwrap(),
            doc! {
                "$and": [
                    { "values.a": { "$eq": 1 } },
                    { "id": { "$in": ["x", "y"] } },
                    { "$nor": [{ "metadata.owner": { "$exists": true } }] },
                ]
            }
        );
    }

    #[test]
    fn search_is_escaped_and_case_insensitive() {
        let query = Query::builder()
            .filter(Filter::gt("values.a", 1))
            .search("A.1")
            .sort("values.a", SortDirection::Desc)
            .build();

        assert_eq!(
            MongoQueryTranslator::filter(&query).unwrap(),
            doc! {
                "$and": [
                    { "values.a": { "$gt": 1 } },
                    { "id": { "$regex": "a\\.1", "$options": "i" } },
                ]
            }
        );
        assert_eq!(MongoQueryTranslator::sort(&query), doc! { "values.a": -1, "id": 1 });
    }

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(MongoQueryTranslator::filter(&Query::new()).unwrap(), doc! {});
    }

    #[test]
    fn regex_needs_a_string() {
        let expr = Expr::field("id".to_string(), FieldOp::Regex, Bson::Int32(1));

        assert!(matches!(
            MongoQueryTranslator.visit_expr(&expr),
            Err(UnitStoreError::Validation(_))
        ));
    }
}

//! Query expression evaluation for in-memory unit filtering.
//!
//! Evaluation follows the document-database conventions the MongoDB backend gets for free,
//! so both backends agree on results:
//!
//! - Field paths are dotted and walk into nested documents.
//! - An equality test against an array field matches when any element matches.
//! - A missing field equals null, and matches `ne` and `none_of` tests.

use bson::{Bson, Document, datetime::DateTime};
use regex::Regex;
use std::{cmp::Ordering, collections::HashMap};

use unitlayer_core::{
    error::{UnitStoreError, UnitStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Type-erased, comparable representation of BSON values.
///
/// All numeric types are normalized to f64.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    /// Binary payloads, such as UUIDs.
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Position of this value's type in the sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: values of different types order by type, nulls first.
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }

    /// Equality, matching any element when `self` is an array and `other` is not.
    fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Array(items), value) if !matches!(value, Comparable::Array(_)) => {
                items.iter().any(|item| item == value)
            }
            _ => self == other,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path inside a document.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

fn compile_pattern(field: &str, value: &Bson) -> UnitStoreResult<Regex> {
    let pattern = value.as_str().ok_or_else(|| {
        UnitStoreError::Validation(format!("Regex filter on \"{field}\" needs a string pattern"))
    })?;

    Regex::new(pattern)
        .map_err(|err| UnitStoreError::Validation(format!("Invalid regex for \"{field}\": {err}")))
}

/// The regex patterns of one filter, compiled once and shared by every document a scan
/// evaluates.
#[derive(Debug, Default)]
pub(crate) struct CompiledPatterns {
    patterns: HashMap<String, Regex>,
}

impl CompiledPatterns {
    pub fn compile(expr: &Expr) -> UnitStoreResult<Self> {
        let mut compiled = Self::default();
        compiled.visit_expr(expr)?;

        Ok(compiled)
    }

    fn get(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }
}

impl QueryVisitor for CompiledPatterns {
    type Output = ();
    type Error = UnitStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        exprs.iter().try_for_each(|expr| self.visit_expr(expr))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        exprs.iter().try_for_each(|expr| self.visit_expr(expr))
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        self.visit_expr(expr)
    }

    fn visit_exists(&mut self, _field: &str, _should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(())
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::Regex) {
            if let Some(pattern) = value.as_str() {
                if self.patterns.contains_key(pattern) {
                    return Ok(());
                }
            }

            let regex = compile_pattern(field, value)?;
            self.patterns.insert(regex.as_str().to_string(), regex);
        }

        Ok(())
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
    patterns: &'a CompiledPatterns,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document, patterns: &'a CompiledPatterns) -> Self {
        Self { document, patterns }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> UnitStoreResult<bool> {
        self.visit_expr(expr)
    }

    fn compare(&self, field: &str, op: &FieldOp, value: &Bson) -> UnitStoreResult<bool> {
        let expected = Comparable::from(value);
        let actual = lookup(self.document, field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        Ok(match op {
            FieldOp::Eq => actual.matches(&expected),
            FieldOp::Ne => !actual.matches(&expected),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                if matches!(actual, Comparable::Null) {
                    return Ok(false);
                }

                match actual.partial_cmp(&expected) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::Regex => {
                let compiled;
                let regex = match value.as_str().and_then(|pattern| self.patterns.get(pattern)) {
                    Some(regex) => regex,
                    None => {
                        compiled = compile_pattern(field, value)?;
                        &compiled
                    }
                };

                match actual {
                    Comparable::String(text) => regex.is_match(text),
                    Comparable::Array(items) => items.iter().any(|item| {
                        matches!(item, Comparable::String(text) if regex.is_match(text))
                    }),
                    _ => false,
                }
            }
            FieldOp::AnyOf => any_of(&actual, &expected),
            FieldOp::NoneOf => !any_of(&actual, &expected),
        })
    }
}

fn any_of(actual: &Comparable<'_>, candidates: &Comparable<'_>) -> bool {
    match candidates {
        Comparable::Array(candidates) => candidates.iter().any(|candidate| actual.matches(candidate)),
        single => actual.matches(single),
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = UnitStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(lookup(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        self.compare(field, op, value)
    }
}

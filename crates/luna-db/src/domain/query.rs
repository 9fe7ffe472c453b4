//! # Queries
//!
//! `{from, where, limit, orderBy, desc, select, page, incDel, count}`.
//! Clauses are AND-combined.

use super::document::Document;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a `where` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Operator {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    /// String prefix.
    Prefix,
}

impl TryFrom<String> for Operator {
    type Error = String;

    fn try_from(op: String) -> Result<Self, Self::Error> {
        Ok(match op.as_str() {
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "=" => Operator::Eq,
            ">=" => Operator::Ge,
            ">" => Operator::Gt,
            "!=" => Operator::Ne,
            "%" => Operator::Prefix,
            _ => return Err(format!("unsupported query operator '{op}'")),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Eq => "=",
            Operator::Ge => ">=",
            Operator::Gt => ">",
            Operator::Ne => "!=",
            Operator::Prefix => "%",
        })
    }
}

/// One `where` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Clause {
    pub prop: String,
    pub op: Operator,
    pub val: Value,
}

impl Clause {
    pub fn new(prop: &str, op: Operator, val: impl Into<Value>) -> Self {
        Self {
            prop: prop.to_string(),
            op,
            val: val.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        let Some(field) = doc.get(&self.prop) else {
            return self.op == Operator::Ne;
        };
        match self.op {
            Operator::Eq => field == &self.val,
            Operator::Ne => field != &self.val,
            Operator::Prefix => match (field, &self.val) {
                (Value::String(s), Value::String(prefix)) => s.starts_with(prefix.as_str()),
                _ => false,
            },
            Operator::Lt => compare(field, &self.val) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(field, &self.val),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Ge => matches!(
                compare(field, &self.val),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::Gt => compare(field, &self.val) == Some(Ordering::Greater),
        }
    }
}

/// Order two values of the same scalar type. Anything else is incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Stable merge sort that tolerates comparators without a total order.
fn merge_sort<T, F>(mut items: Vec<T>, cmp: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> Ordering,
{
    if items.len() <= 1 {
        return items;
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp);
    let right = merge_sort(right, cmp);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(r, l) == Ordering::Less,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged
}

/// A store query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, rename = "where")]
    pub clauses: Vec<Clause>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub order_by: Option<String>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub select: Option<Vec<String>>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub inc_del: bool,
    #[serde(default)]
    pub count: bool,
}

impl Query {
    /// Query over one kind.
    pub fn from_kind(kind: &str) -> Self {
        Self {
            from: Some(kind.to_string()),
            ..Self::default()
        }
    }

    /// Continue a previous query from a page id.
    pub fn from_page(page: &str) -> Self {
        Self {
            page: Some(page.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn filter(mut self, prop: &str, op: Operator, val: impl Into<Value>) -> Self {
        self.clauses.push(Clause::new(prop, op, val));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn order_by(mut self, prop: &str, desc: bool) -> Self {
        self.order_by = Some(prop.to_string());
        self.desc = desc;
        self
    }

    #[must_use]
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    #[must_use]
    pub fn include_deleted(mut self) -> Self {
        self.inc_del = true;
        self
    }

    #[must_use]
    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Kind filter, soft-delete filter and every clause.
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(from) = self.from.as_deref() else {
            return false;
        };
        if doc.kind() != Some(from) {
            return false;
        }
        if !self.inc_del && doc.is_deleted() {
            return false;
        }
        self.clauses.iter().all(|clause| clause.matches(doc))
    }

    /// Stable sort on `orderBy`. Ties and incomparable values keep their order.
    pub fn sort(&self, docs: &mut Vec<Document>) {
        let Some(prop) = self.order_by.as_deref() else {
            return;
        };
        let desc = self.desc;
        let items = std::mem::take(docs);
        *docs = merge_sort(items, &|a: &Document, b: &Document| {
            let ord = match (a.get(prop), b.get(prop)) {
                (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            };
            if desc {
                ord.reverse()
            } else {
                ord
            }
        });
    }

    /// Apply `select`, if any.
    pub fn project(&self, doc: &Document) -> Document {
        match &self.select {
            Some(select) => doc.project(select),
            None => doc.clone(),
        }
    }
}

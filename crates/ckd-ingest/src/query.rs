//! Typed warehouse queries.
//!
//! Statements are assembled from validated identifiers and bound
//! parameters. Values are never spliced into the statement text; the
//! rendered form shows `?` placeholders and the parameters travel alongside.

use std::fmt;

use chrono::Datelike;
use polars::prelude::*;

use ckd_common::{any_to_string, parse_date, parse_f64};

use crate::error::{IngestError, Result};

/// A validated table name: ASCII letters, digits and underscores only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef(String);

impl TableRef {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid {
            return Err(IngestError::InvalidTableName { name });
        }
        Ok(Self(name))
    }

    /// A year-suffixed table such as `enroll_2023`. The year is zero-padded
    /// to four digits, matching how years are displayed.
    pub fn for_year(prefix: &str, year: i32) -> Result<Self> {
        Self::new(format!("{prefix}_{year:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Int(i64),
}

impl Param {
    /// Compares a raw cell against the parameter. Null cells never match.
    fn matches(&self, cell: &str) -> bool {
        if cell.is_empty() {
            return false;
        }
        match self {
            Param::Text(text) => cell == text.as_str(),
            Param::Int(value) => parse_f64(cell).is_some_and(|number| number == *value as f64),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Text(text) => write!(f, "'{text}'"),
            Param::Int(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

/// A row filter. Every predicate in a query must hold for a row to be kept.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: Param },
    NotEq { column: String, value: Param },
    In { column: String, values: Vec<Param> },
    /// The year of a date column is one of `years`.
    YearIn { column: String, years: Vec<i32> },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::NotEq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::YearIn { column, .. } => column,
        }
    }

    fn matches(&self, cell: &str) -> bool {
        match self {
            Predicate::Eq { value, .. } => value.matches(cell),
            Predicate::NotEq { value, .. } => !cell.is_empty() && !value.matches(cell),
            Predicate::In { values, .. } => values.iter().any(|value| value.matches(cell)),
            Predicate::YearIn { years, .. } => {
                parse_date(cell).is_some_and(|date| years.contains(&date.year()))
            }
        }
    }

    fn placeholders(&self) -> String {
        match self {
            Predicate::Eq { column, .. } => format!("{column} = ?"),
            Predicate::NotEq { column, .. } => format!("{column} <> ?"),
            Predicate::In { column, values } => {
                format!("{column} IN ({})", vec!["?"; values.len()].join(", "))
            }
            Predicate::YearIn { column, years } => {
                format!("year({column}) IN ({})", vec!["?"; years.len()].join(", "))
            }
        }
    }

    fn params(&self) -> Vec<Param> {
        match self {
            Predicate::Eq { value, .. } | Predicate::NotEq { value, .. } => vec![value.clone()],
            Predicate::In { values, .. } => values.clone(),
            Predicate::YearIn { years, .. } => {
                years.iter().map(|year| Param::Int(i64::from(*year))).collect()
            }
        }
    }
}

/// A select over one table with optional projection, filters and row limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: TableRef,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    limit: Option<usize>,
}

impl Query {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            columns: Vec::new(),
            predicates: Vec::new(),
            limit: None,
        }
    }

    /// Projects the result to `columns`, in that order.
    #[must_use]
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|name| (*name).to_string()).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    #[must_use]
    pub fn eq(self, column: &str, value: impl Into<Param>) -> Self {
        self.filter(Predicate::Eq {
            column: column.to_string(),
            value: value.into(),
        })
    }

    #[must_use]
    pub fn not_eq(self, column: &str, value: impl Into<Param>) -> Self {
        self.filter(Predicate::NotEq {
            column: column.to_string(),
            value: value.into(),
        })
    }

    #[must_use]
    pub fn is_in<P: Into<Param>>(self, column: &str, values: impl IntoIterator<Item = P>) -> Self {
        self.filter(Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    #[must_use]
    pub fn year_in(self, column: &str, years: &[i32]) -> Self {
        self.filter(Predicate::YearIn {
            column: column.to_string(),
            years: years.to_vec(),
        })
    }

    #[must_use]
    pub fn limit(mut self, rows: usize) -> Self {
        self.limit = Some(rows);
        self
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Bound parameters in placeholder order.
    pub fn params(&self) -> Vec<Param> {
        self.predicates.iter().flat_map(Predicate::params).collect()
    }

    /// Evaluates the query against an already loaded table.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];
        for predicate in &self.predicates {
            let column = df
                .column(predicate.column())
                .map_err(|_| self.missing_column(predicate.column()))?;
            for (idx, flag) in keep.iter_mut().enumerate() {
                if !*flag {
                    continue;
                }
                let cell = any_to_string(column.get(idx).unwrap_or(AnyValue::Null));
                *flag = predicate.matches(cell.trim());
            }
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let mut result = df.filter(&mask)?;

        if !self.columns.is_empty() {
            if let Some(missing) = self
                .columns
                .iter()
                .find(|name| df.column(name.as_str()).is_err())
            {
                return Err(self.missing_column(missing));
            }
            result = result.select(self.columns.iter().map(String::as_str))?;
        }

        if let Some(limit) = self.limit {
            result = result.head(Some(limit));
        }
        Ok(result)
    }

    fn missing_column(&self, column: &str) -> IngestError {
        IngestError::MissingColumn {
            column: column.to_string(),
            table: self.table.to_string(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        write!(f, "SELECT {columns} FROM {}", self.table)?;
        if !self.predicates.is_empty() {
            let clauses: Vec<String> = self.predicates.iter().map(Predicate::placeholders).collect();
            write!(f, " WHERE {}", clauses.join(" AND "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labs() -> DataFrame {
        DataFrame::new(vec![
            Series::new("member_id".into(), vec!["M1", "M2", "M3", "M4"]).into(),
            Series::new(
                "requestcpt".into(),
                vec![Some("33914-3"), Some("33914-3"), Some("2160-0"), None],
            )
            .into(),
            Series::new(
                "date_servicebegin".into(),
                vec!["2023-02-01", "2021-12-31", "2022-05-05", "2023-01-01"],
            )
            .into(),
        ])
        .unwrap()
    }

    #[test]
    fn table_names_are_identifiers() {
        assert!(TableRef::new("enroll_2023").is_ok());
        assert!(TableRef::new("").is_err());
        assert!(TableRef::new("labs; drop table x").is_err());
        assert_eq!(TableRef::for_year("member", 2023).unwrap().as_str(), "member_2023");
        assert_eq!(TableRef::for_year("enroll", 999).unwrap().as_str(), "enroll_0999");
        assert!(TableRef::for_year("enroll", -5).is_err());
    }

    #[test]
    fn renders_placeholders_not_values() {
        let query = Query::new(TableRef::new("lab_results").unwrap())
            .select(&["member_id"])
            .eq("requestcpt", "33914-3")
            .year_in("date_servicebegin", &[2022, 2023])
            .limit(10);
        assert_eq!(
            query.to_string(),
            "SELECT member_id FROM lab_results WHERE requestcpt = ? AND year(date_servicebegin) IN (?, ?) LIMIT 10"
        );
        assert_eq!(
            query.params(),
            vec![
                Param::Text("33914-3".to_string()),
                Param::Int(2022),
                Param::Int(2023)
            ]
        );
    }

    #[test]
    fn applies_filters_and_projection() {
        let query = Query::new(TableRef::new("lab_results").unwrap())
            .select(&["member_id"])
            .eq("requestcpt", "33914-3")
            .year_in("date_servicebegin", &[2022, 2023]);
        let result = query.apply(&labs()).unwrap();
        assert_eq!(result.width(), 1);
        assert_eq!(ckd_common::column_values(&result, "member_id").unwrap(), vec!["M1"]);
    }

    #[test]
    fn null_cells_fail_predicates() {
        let query = Query::new(TableRef::new("lab_results").unwrap()).not_eq("requestcpt", "2160-0");
        let result = query.apply(&labs()).unwrap();
        assert_eq!(
            ckd_common::column_values(&result, "member_id").unwrap(),
            vec!["M1", "M2"]
        );
    }

    #[test]
    fn integer_params_compare_numerically() {
        let df = DataFrame::new(vec![
            Series::new("claim_status".into(), vec!["1", "1.0", "2", ""]).into(),
        ])
        .unwrap();
        let query = Query::new(TableRef::new("claims_2023").unwrap()).not_eq("claim_status", 1i64);
        assert_eq!(query.apply(&df).unwrap().height(), 1);
    }

    #[test]
    fn missing_columns_are_reported() {
        let query = Query::new(TableRef::new("lab_results").unwrap()).eq("textresult", "x");
        let err = query.apply(&labs()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn { column, .. } if column == "textresult"));
    }

    #[test]
    fn limit_keeps_leading_rows() {
        let query = Query::new(TableRef::new("lab_results").unwrap()).limit(2);
        assert_eq!(query.apply(&labs()).unwrap().height(), 2);
    }
}

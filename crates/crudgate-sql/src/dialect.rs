//! SQL dialects and placeholder numbering

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crudgate_common::error::Error;

use crate::value::SqlValue;

/// Target database family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// `?` for every parameter
    #[serde(rename = "mysql")]
    MySql,
    /// `$1, $2, ...`
    #[serde(rename = "postgres")]
    Postgres,
    /// `@p1, @p2, ...`
    #[serde(rename = "sqlserver")]
    SqlServer,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::SqlServer => "sqlserver",
        }
    }

    /// Placeholder text for the parameter with the given 1-based ordinal
    pub fn placeholder(&self, ordinal: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", ordinal),
            Dialect::SqlServer => format!("@p{}", ordinal),
        }
    }

    /// Same keyword for all three dialects; SQL Server included
    pub fn current_timestamp(self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    /// Same keyword for all three dialects; SQL Server renders `CURRENT_DATE` too
    pub fn current_date(self) -> &'static str {
        "CURRENT_DATE"
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlserver" | "mssql" => Ok(Dialect::SqlServer),
            other => Err(Error::ConfigError(format!("Unknown SQL dialect: {}", other))),
        }
    }
}

/// Collects bind parameters and hands out placeholders in statement order
///
/// The ordinal counter spans the whole statement. Fragments that bind no
/// value but still occupy a slot in the statement call [`ParamBinder::skip`].
#[derive(Debug)]
pub struct ParamBinder {
    dialect: Dialect,
    next_ordinal: usize,
    params: Vec<SqlValue>,
}

impl ParamBinder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            next_ordinal: 1,
            params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Record `value` and return its placeholder
    pub fn bind(&mut self, value: SqlValue) -> String {
        let placeholder = self.dialect.placeholder(self.next_ordinal);
        self.next_ordinal += 1;
        self.params.push(value);
        placeholder
    }

    /// Consume an ordinal without binding a parameter
    pub fn skip(&mut self) {
        self.next_ordinal += 1;
    }

    pub fn into_params(self) -> Vec<SqlValue> {
        self.params
    }
}

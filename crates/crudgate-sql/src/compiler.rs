//! CRUD request to parameterized SQL compilation

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crudgate_common::config::SqlConfig;
use crudgate_common::error::{Error, Result};
use crudgate_common::types::{
    CreateRequest, DeleteRequest, ReadOperation, ReadOptions, ReadRequest, UpdateRequest,
};

use crate::dialect::{Dialect, ParamBinder};
use crate::filter::where_clause;
use crate::ident::check_identifier;
use crate::operator::UpdateOperator;
use crate::value::SqlValue;

/// MySQL cannot express OFFSET without LIMIT; this is its documented "no limit" value
const MYSQL_UNBOUNDED_LIMIT: u64 = u64::MAX;

/// Statement text plus its bind parameters in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub statement: String,
    pub params: Vec<SqlValue>,
}

impl CompiledQuery {
    fn new(statement: String, binder: ParamBinder) -> Self {
        Self {
            statement,
            params: binder.into_params(),
        }
    }
}

/// Compiles CRUD requests for one SQL dialect
///
/// Stateless apart from configuration; share freely across tasks.
#[derive(Debug, Clone, Copy)]
pub struct SqlCompiler {
    dialect: Dialect,
    remove_project_scope: bool,
}

impl SqlCompiler {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            remove_project_scope: false,
        }
    }

    /// Reference tables without the `<project>.` prefix
    pub fn with_project_scope_removed(mut self, remove: bool) -> Self {
        self.remove_project_scope = remove;
        self
    }

    pub fn from_config(config: &SqlConfig) -> Result<Self> {
        let dialect = config.dialect.parse()?;
        Ok(Self::new(dialect).with_project_scope_removed(config.remove_project_scope))
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table_ref(&self, project: &str, table: &str) -> Result<String> {
        let table = check_identifier(table)?;
        if self.remove_project_scope {
            return Ok(table.to_string());
        }
        let project = check_identifier(project)?;
        Ok(format!("{}.{}", project, table))
    }

    /// Compile an update that applies `operator` to the matching rows
    ///
    /// # Errors
    /// - `UnsupportedOperator` when `operator` is not one of the six update operators
    /// - `MissingOperatorPayload` when `request.update` has no entry for it
    /// - `InvalidOperand` for operands of the wrong shape
    /// - `InvalidIdentifier` for unsafe table or column names
    pub fn compile_update(
        &self,
        project: &str,
        table: &str,
        request: &UpdateRequest,
        operator: &str,
    ) -> Result<CompiledQuery> {
        let op: UpdateOperator = operator.parse()?;
        let payload = request
            .update
            .get(op.as_str())
            .ok_or_else(|| Error::MissingOperatorPayload(op.as_str().to_string()))?;
        let fields = payload.as_object().ok_or_else(|| {
            Error::InvalidOperand(format!("{} expects an object of fields, got {}", op, payload))
        })?;
        if fields.is_empty() {
            return Err(Error::InvalidOperand(format!("{} has no fields to update", op)));
        }

        let table = self.table_ref(project, table)?;
        let mut binder = ParamBinder::new(self.dialect);

        let mut assignments = Vec::with_capacity(fields.len());
        for (field, operand) in fields {
            let field = check_identifier(field)?;
            assignments.push(op.fragment(field, operand, &mut binder)?);
        }

        let mut statement = format!("UPDATE {} SET {}", table, assignments.join(","));
        if let Some(clause) = where_clause(&request.find, &mut binder)? {
            statement.push_str(" WHERE ");
            statement.push_str(&clause);
        }

        debug!(dialect = %self.dialect, operator = %op, statement = %statement, "Compiled update");
        Ok(CompiledQuery::new(statement, binder))
    }

    /// Compile a select, count or single-row read
    pub fn compile_read(&self, project: &str, table: &str, request: &ReadRequest) -> Result<CompiledQuery> {
        let table = self.table_ref(project, table)?;
        let mut binder = ParamBinder::new(self.dialect);

        let columns = match request.operation {
            ReadOperation::Count => "COUNT(*)".to_string(),
            _ => select_list(&request.options)?,
        };

        let mut statement = format!("SELECT {} FROM {}", columns, table);
        if let Some(clause) = where_clause(&request.find, &mut binder)? {
            statement.push_str(" WHERE ");
            statement.push_str(&clause);
        }

        if request.operation != ReadOperation::Count {
            let limit = match request.operation {
                ReadOperation::One => Some(1),
                _ => request.options.limit,
            };
            let order = order_by(&request.options.sort)?;
            self.push_paging(&mut statement, order, limit, request.options.skip);
        }

        debug!(dialect = %self.dialect, operation = ?request.operation, statement = %statement, "Compiled read");
        Ok(CompiledQuery::new(statement, binder))
    }

    fn push_paging(&self, statement: &mut String, order: Option<String>, limit: Option<u64>, skip: Option<u64>) {
        match self.dialect {
            Dialect::SqlServer => {
                let paged = limit.is_some() || skip.is_some();
                match order {
                    Some(order) => {
                        statement.push_str(" ORDER BY ");
                        statement.push_str(&order);
                    }
                    None if paged => statement.push_str(" ORDER BY (SELECT NULL)"),
                    None => {}
                }
                if paged {
                    statement.push_str(&format!(" OFFSET {} ROWS", skip.unwrap_or(0)));
                    if let Some(limit) = limit {
                        statement.push_str(&format!(" FETCH NEXT {} ROWS ONLY", limit));
                    }
                }
            }
            Dialect::MySql | Dialect::Postgres => {
                if let Some(order) = order {
                    statement.push_str(" ORDER BY ");
                    statement.push_str(&order);
                }
                let limit = match (self.dialect, limit, skip) {
                    (Dialect::MySql, None, Some(_)) => Some(MYSQL_UNBOUNDED_LIMIT),
                    (_, limit, _) => limit,
                };
                if let Some(limit) = limit {
                    statement.push_str(&format!(" LIMIT {}", limit));
                }
                if let Some(skip) = skip {
                    statement.push_str(&format!(" OFFSET {}", skip));
                }
            }
        }
    }

    /// Compile a multi-row insert
    ///
    /// Columns are the union of document keys in first-seen order; a document
    /// missing a column binds NULL for it.
    pub fn compile_create(&self, project: &str, table: &str, request: &CreateRequest) -> Result<CompiledQuery> {
        if request.documents.is_empty() {
            return Err(Error::InvalidOperand("create requires at least one document".to_string()));
        }

        let table = self.table_ref(project, table)?;
        let columns = column_union(&request.documents)?;
        if columns.is_empty() {
            return Err(Error::InvalidOperand("create documents have no fields".to_string()));
        }

        let mut binder = ParamBinder::new(self.dialect);
        let mut rows = Vec::with_capacity(request.documents.len());
        for doc in &request.documents {
            let mut placeholders = Vec::with_capacity(columns.len());
            for column in &columns {
                let value = match doc.get(*column) {
                    Some(value) => SqlValue::from_json(value)?,
                    None => SqlValue::Null,
                };
                placeholders.push(binder.bind(value));
            }
            rows.push(format!("({})", placeholders.join(", ")));
        }

        let statement = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            columns.join(", "),
            rows.join(", ")
        );

        debug!(dialect = %self.dialect, rows = rows.len(), statement = %statement, "Compiled create");
        Ok(CompiledQuery::new(statement, binder))
    }

    /// Compile a delete of the matching rows
    pub fn compile_delete(&self, project: &str, table: &str, request: &DeleteRequest) -> Result<CompiledQuery> {
        let table = self.table_ref(project, table)?;
        let mut binder = ParamBinder::new(self.dialect);

        let mut statement = format!("DELETE FROM {}", table);
        if let Some(clause) = where_clause(&request.find, &mut binder)? {
            statement.push_str(" WHERE ");
            statement.push_str(&clause);
        }

        debug!(dialect = %self.dialect, statement = %statement, "Compiled delete");
        Ok(CompiledQuery::new(statement, binder))
    }
}

fn select_list(options: &ReadOptions) -> Result<String> {
    if options.select.is_empty() {
        return Ok("*".to_string());
    }
    let columns = options
        .select
        .iter()
        .map(|c| check_identifier(c))
        .collect::<Result<Vec<_>>>()?;
    Ok(columns.join(", "))
}

/// `-field` sorts descending, `field` or `+field` ascending
fn order_by(sort: &[String]) -> Result<Option<String>> {
    if sort.is_empty() {
        return Ok(None);
    }
    let mut keys = Vec::with_capacity(sort.len());
    for key in sort {
        let (field, direction) = match key.strip_prefix('-') {
            Some(field) => (field, "DESC"),
            None => (key.strip_prefix('+').unwrap_or(key), "ASC"),
        };
        keys.push(format!("{} {}", check_identifier(field)?, direction));
    }
    Ok(Some(keys.join(", ")))
}

fn column_union(documents: &[Map<String, Value>]) -> Result<Vec<&str>> {
    let mut columns: Vec<&str> = Vec::new();
    for doc in documents {
        for key in doc.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(check_identifier(key)?);
            }
        }
    }
    Ok(columns)
}

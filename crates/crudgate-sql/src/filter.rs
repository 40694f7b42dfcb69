//! WHERE clause rendering for find filters

use serde_json::{Map, Value};

use crudgate_common::error::{Error, Result};

use crate::dialect::ParamBinder;
use crate::ident::check_identifier;
use crate::value::SqlValue;

/// Render `find` as a WHERE predicate, or `None` when it has no entries
///
/// Each key becomes one parenthesised predicate; several are joined with
/// `AND` inside an outer pair of parentheses. Keys keep request order.
pub fn where_clause(find: &Map<String, Value>, binder: &mut ParamBinder) -> Result<Option<String>> {
    let mut predicates = Vec::with_capacity(find.len());
    for (field, value) in find {
        let field = check_identifier(field)?;
        match value {
            Value::Object(ops) if is_operator_map(ops) => {
                for (op, operand) in ops {
                    predicates.push(comparison(field, op, operand, binder)?);
                }
            }
            Value::Null => predicates.push(format!("({} IS NULL)", field)),
            other => {
                let p = binder.bind(SqlValue::from_json(other)?);
                predicates.push(format!("({} = {})", field, p));
            }
        }
    }

    Ok(match predicates.len() {
        0 => None,
        1 => predicates.pop(),
        _ => Some(format!("({})", predicates.join(" AND "))),
    })
}

fn is_operator_map(map: &Map<String, Value>) -> bool {
    map.keys().any(|k| k.starts_with('$'))
}

fn comparison(field: &str, op: &str, operand: &Value, binder: &mut ParamBinder) -> Result<String> {
    let symbol = match op {
        "$eq" if operand.is_null() => return Ok(format!("({} IS NULL)", field)),
        "$ne" if operand.is_null() => return Ok(format!("({} IS NOT NULL)", field)),
        "$in" => return membership(field, "IN", operand, binder),
        "$nin" => return membership(field, "NOT IN", operand, binder),
        "$eq" => "=",
        "$ne" => "!=",
        "$gt" => ">",
        "$gte" => ">=",
        "$lt" => "<",
        "$lte" => "<=",
        other => return Err(Error::UnsupportedOperator(other.to_string())),
    };

    let p = binder.bind(SqlValue::from_json(operand)?);
    Ok(format!("({} {} {})", field, symbol, p))
}

fn membership(field: &str, keyword: &str, operand: &Value, binder: &mut ParamBinder) -> Result<String> {
    let items = match operand.as_array() {
        Some(items) if !items.is_empty() => items,
        _ => {
            return Err(Error::InvalidOperand(format!(
                "{} on {} requires a non-empty list",
                keyword, field
            )))
        }
    };

    let mut placeholders = Vec::with_capacity(items.len());
    for item in items {
        placeholders.push(binder.bind(SqlValue::from_json(item)?));
    }
    Ok(format!("({} {} ({}))", field, keyword, placeholders.join(", ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use serde_json::json;

    fn render(find: Value, dialect: Dialect) -> (Option<String>, Vec<SqlValue>) {
        let mut binder = ParamBinder::new(dialect);
        let clause = where_clause(find.as_object().unwrap(), &mut binder).unwrap();
        (clause, binder.into_params())
    }

    #[test]
    fn test_empty_find() {
        assert_eq!(render(json!({}), Dialect::MySql), (None, vec![]));
    }

    #[test]
    fn test_single_and_multiple() {
        let (clause, _) = render(json!({"a": 1}), Dialect::Postgres);
        assert_eq!(clause.unwrap(), "(a = $1)");

        let (clause, params) = render(json!({"a": 1, "b": "x"}), Dialect::Postgres);
        assert_eq!(clause.unwrap(), "((a = $1) AND (b = $2))");
        assert_eq!(params, vec![SqlValue::Int(1), SqlValue::Text("x".into())]);
    }

    #[test]
    fn test_operators() {
        let (clause, params) = render(
            json!({"age": {"$gte": 18, "$lt": 65}, "deleted": null, "role": {"$in": ["a", "b"]}}),
            Dialect::SqlServer,
        );
        assert_eq!(
            clause.unwrap(),
            "((age >= @p1) AND (age < @p2) AND (deleted IS NULL) AND (role IN (@p3, @p4)))"
        );
        assert_eq!(params.len(), 4);

        let (clause, _) = render(json!({"x": {"$ne": null}}), Dialect::MySql);
        assert_eq!(clause.unwrap(), "(x IS NOT NULL)");
    }

    #[test]
    fn test_rejections() {
        let mut binder = ParamBinder::new(Dialect::MySql);
        let bad_in = json!({"role": {"$in": []}});
        assert!(matches!(
            where_clause(bad_in.as_object().unwrap(), &mut binder),
            Err(Error::InvalidOperand(_))
        ));

        let bad_op = json!({"role": {"$regex": "a.*"}});
        assert!(matches!(
            where_clause(bad_op.as_object().unwrap(), &mut binder),
            Err(Error::UnsupportedOperator(op)) if op == "$regex"
        ));

        let bad_field = json!({"a b": 1});
        assert!(matches!(
            where_clause(bad_field.as_object().unwrap(), &mut binder),
            Err(Error::InvalidIdentifier(_))
        ));
    }
}

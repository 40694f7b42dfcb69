//! Cross-dialect CRUD Query Compiler for Crudgate
//!
//! Turns document-style CRUD requests into parameterized SQL:
//! - MySQL (`?`), PostgreSQL (`$n`) and SQL Server (`@pn`) placeholders
//! - Mongo-style update operators (`$set`, `$inc`, `$mul`, `$min`, `$max`, `$currentDate`)
//! - Find filters with equality, comparison, `$in`/`$nin` and null checks
//! - Typed bind parameters

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compiler;
pub mod dialect;
pub mod filter;
pub mod ident;
pub mod operator;
pub mod value;

pub use compiler::{CompiledQuery, SqlCompiler};
pub use dialect::{Dialect, ParamBinder};
pub use operator::UpdateOperator;
pub use value::SqlValue;

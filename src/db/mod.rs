//! Stored-procedure calls against a relational database.
//!
//! The driver sits behind [`ProcedureExecutor`]. [`ProcedureClient`] layers the
//! typed conveniences on top: affected-row counts, scalars, tables, records
//! mapped through `serde`, and multiple result sets.

pub mod params;
pub mod value;

pub use params::{Direction, Parameter};
pub use value::{FromValue, Value};

use crate::error::{PgkitError, Result};
use serde::de::DeserializeOwned;

/// Rows sharing one column list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Its width must match the column list.
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(PgkitError::conversion(format!(
                "row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(values);
        Ok(())
    }

    pub fn with_row(mut self, values: Vec<Value>) -> Result<Self> {
        self.push_row(values)?;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    /// The value of column `name`. Exact matches win over case-insensitive ones.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        let index = self
            .columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))?;
        self.values.get(index)
    }

    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .get(name)
            .ok_or_else(|| PgkitError::conversion(format!("no column named '{name}'")))?;
        T::from_value(value)
    }

    /// Map the row onto `T`, matching column names to field names.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(self.values)
            .map(|(column, value)| (column.clone(), value.to_json()))
            .collect();

        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| PgkitError::conversion(format!("cannot map row: {e}")))
    }
}

/// Everything one procedure call produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcedureResult {
    pub rows_affected: u64,
    pub result_sets: Vec<ResultSet>,
}

/// The database driver seam.
pub trait ProcedureExecutor {
    /// Run `procedure` with `params`, writing output values back into `params`.
    fn call(&mut self, procedure: &str, params: &mut [Parameter]) -> Result<ProcedureResult>;
}

pub struct ProcedureClient<E: ProcedureExecutor> {
    executor: E,
}

impl<E: ProcedureExecutor> ProcedureClient<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    fn call(&mut self, procedure: &str, params: &mut [Parameter]) -> Result<ProcedureResult> {
        tracing::debug!("Calling {procedure} with {} parameters", params.len());
        self.executor
            .call(procedure, params)
            .map_err(|e| match e {
                PgkitError::Procedure { .. } => e,
                other => PgkitError::Procedure {
                    procedure: procedure.to_string(),
                    message: other.to_string(),
                },
            })
    }

    /// Run for side effects and return the affected row count.
    pub fn execute(&mut self, procedure: &str, params: &mut [Parameter]) -> Result<u64> {
        Ok(self.call(procedure, params)?.rows_affected)
    }

    /// First column of the first row of the first result set.
    pub fn get_scalar<T: FromValue>(&mut self, procedure: &str, params: &mut [Parameter]) -> Result<T> {
        let result = self.call(procedure, params)?;
        let value = result
            .result_sets
            .first()
            .and_then(|set| set.rows.first())
            .and_then(|row| row.first())
            .ok_or_else(|| PgkitError::NoRows {
                procedure: procedure.to_string(),
            })?;
        T::from_value(value)
    }

    /// The first result set, empty when the procedure returned none.
    pub fn get_table(&mut self, procedure: &str, params: &mut [Parameter]) -> Result<ResultSet> {
        Ok(self
            .call(procedure, params)?
            .result_sets
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// The first row of the first result set, mapped onto `T`.
    pub fn get_record<T: DeserializeOwned>(
        &mut self,
        procedure: &str,
        params: &mut [Parameter],
    ) -> Result<T> {
        let table = self.get_table(procedure, params)?;
        let row = table.row(0).ok_or_else(|| PgkitError::NoRows {
            procedure: procedure.to_string(),
        })?;
        row.deserialize()
    }

    pub fn get_multiple_result_sets(
        &mut self,
        procedure: &str,
        params: &mut [Parameter],
    ) -> Result<Vec<ResultSet>> {
        Ok(self.call(procedure, params)?.result_sets)
    }
}

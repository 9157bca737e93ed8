//! Batch merge-upsert primitive with an explicit per-column merge policy.
//!
//! Output tables accumulate some columns (`Sum`) and snapshot others
//! (`Replace`). The policy is declared once per column in a static
//! [`TableSpec`] and applied mechanically here. SQL text is assembled only
//! from the static table/column names in the spec; every value is bound as a
//! parameter.
//!
//! SQLite cannot add TEXT-encoded decimals losslessly, so `Sum` is resolved
//! as read-merge-write on the caller's connection: callers run inside a
//! transaction, which makes the merge atomic.

use crate::domain::Decimal;
use sqlx::{Row, SqliteConnection};
use thiserror::Error;

/// How a column combines an incoming value with the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    /// Add the incoming value to the stored value.
    Sum,
    /// Overwrite the stored value with the incoming value.
    Replace,
}

/// A non-key column of a merge target table.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    /// Column name. Static: never derived from input data.
    pub name: &'static str,
    /// Merge policy applied on conflict.
    pub policy: MergePolicy,
}

/// Static description of a merge target table.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub table: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [ColumnDef],
}

/// A value bound into a merge row. `Decimal` columns are stored as canonical
/// TEXT, `Integer` as INTEGER, `Text` as TEXT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeValue {
    Decimal(Decimal),
    Integer(i64),
    Text(String),
}

/// One row to merge: the key plus one value per `TableSpec` column, in
/// declaration order.
#[derive(Debug, Clone)]
pub struct MergeRow {
    pub key: String,
    pub values: Vec<MergeValue>,
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("row for {table} has {got} values, spec expects {expected}")]
    Arity {
        table: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("stored value in {table}.{column} is not a valid decimal")]
    NonDecimal {
        table: &'static str,
        column: &'static str,
    },
    #[error("{table}.{column} is a text column and cannot use the Sum policy")]
    SumOnText {
        table: &'static str,
        column: &'static str,
    },
}

/// Merge a batch of rows into `spec.table` on the given connection.
///
/// Rows that do not exist yet are inserted as-is; existing rows are combined
/// column-by-column per the spec's merge policy.
///
/// # Errors
/// Returns an error on database failure, on a row/spec arity mismatch, or if
/// a stored value under a `Sum` decimal column fails to parse.
pub async fn merge_rows(
    conn: &mut SqliteConnection,
    spec: &TableSpec,
    rows: &[MergeRow],
) -> Result<(), UpsertError> {
    if rows.is_empty() {
        return Ok(());
    }

    let column_list: Vec<&str> = spec.columns.iter().map(|c| c.name).collect();
    let select_sql = format!(
        "SELECT {} FROM {} WHERE {} = ?",
        column_list.join(", "),
        spec.table,
        spec.key_column
    );

    let placeholders = vec!["?"; spec.columns.len() + 1].join(", ");
    let conflict_updates: Vec<String> = column_list
        .iter()
        .map(|c| format!("{} = excluded.{}", c, c))
        .collect();
    let insert_sql = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
        spec.table,
        spec.key_column,
        column_list.join(", "),
        placeholders,
        spec.key_column,
        conflict_updates.join(", ")
    );

    for row in rows {
        if row.values.len() != spec.columns.len() {
            return Err(UpsertError::Arity {
                table: spec.table,
                expected: spec.columns.len(),
                got: row.values.len(),
            });
        }

        let existing = sqlx::query(&select_sql)
            .bind(&row.key)
            .fetch_optional(&mut *conn)
            .await?;

        let mut merged: Vec<MergeValue> = Vec::with_capacity(row.values.len());
        for (idx, (column, incoming)) in spec.columns.iter().zip(&row.values).enumerate() {
            let value = match (column.policy, &existing) {
                (MergePolicy::Replace, _) | (_, None) => incoming.clone(),
                (MergePolicy::Sum, Some(stored)) => match incoming {
                    MergeValue::Decimal(delta) => {
                        let current: String = stored.try_get(idx)?;
                        let current = Decimal::from_str_canonical(&current).map_err(|_| {
                            UpsertError::NonDecimal {
                                table: spec.table,
                                column: column.name,
                            }
                        })?;
                        MergeValue::Decimal(current + *delta)
                    }
                    MergeValue::Integer(delta) => {
                        let current: i64 = stored.try_get(idx)?;
                        MergeValue::Integer(current + delta)
                    }
                    MergeValue::Text(_) => {
                        return Err(UpsertError::SumOnText {
                            table: spec.table,
                            column: column.name,
                        })
                    }
                },
            };
            merged.push(value);
        }

        let mut query = sqlx::query(&insert_sql).bind(&row.key);
        for value in &merged {
            query = match value {
                MergeValue::Decimal(d) => query.bind(d.to_canonical_string()),
                MergeValue::Integer(i) => query.bind(*i),
                MergeValue::Text(s) => query.bind(s.clone()),
            };
        }
        query.execute(&mut *conn).await?;
    }

    Ok(())
}

//! PostgreSQL adapters built on sqlx.
//!
//! The writers are synchronous. These adapters hold a tokio [`Handle`] and
//! block on the underlying sqlx streams one item at a time, so they must be
//! driven from a blocking context (`tokio::task::block_in_place` or
//! `spawn_blocking`), never directly from async code.

use std::net::IpAddr;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgConnection, PgHasArrayType, PgRow, PgTypeInfo};
use sqlx::{Column as _, Connection, Decode, Executor, Row, Statement, Type, TypeInfo, ValueRef};
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::cursor::{CopySource, RowCursor};
use crate::error::{ExportError, ExportResult};
use crate::value::{Column, Interval, TypeKind, Value};

fn db_error(err: sqlx::Error) -> ExportError {
    ExportError::Database(err.to_string())
}

/// Open a single connection. Exports are sequential, so no pool.
pub async fn connect(url: &str) -> ExportResult<PgConnection> {
    let conn = PgConnection::connect(url).await.map_err(db_error)?;
    tracing::debug!("Connected to PostgreSQL");
    Ok(conn)
}

/// Drives an async stream from synchronous code.
struct Blocking<'c, T> {
    handle: Handle,
    stream: BoxStream<'c, Result<T, sqlx::Error>>,
}

impl<T> Blocking<'_, T> {
    fn next(&mut self) -> Option<Result<T, sqlx::Error>> {
        self.handle.block_on(self.stream.next())
    }
}

/// Map sqlx type metadata to a [`TypeKind`], by OID when sqlx knows it.
pub fn type_kind(info: &PgTypeInfo) -> TypeKind {
    match info.oid().map(|oid| TypeKind::from_oid(oid.0)) {
        Some(kind) if kind != TypeKind::Unknown => kind,
        _ => TypeKind::from_pg_name(info.name()),
    }
}

/// Row cursor over a query streamed from PostgreSQL.
pub struct PgRowCursor<'c> {
    columns: Vec<Column>,
    /// sqlx type names, kept for array element decoding.
    type_names: Vec<String>,
    rows: Blocking<'c, PgRow>,
}

impl<'c> PgRowCursor<'c> {
    /// Describe `sql` and start streaming its rows.
    ///
    /// Column metadata comes from preparing the statement, so an empty
    /// result still knows its columns.
    pub async fn open(conn: &'c mut PgConnection, sql: &'c str) -> ExportResult<Self> {
        let statement = (&mut *conn).prepare(sql).await.map_err(db_error)?;
        let mut columns = Vec::with_capacity(statement.columns().len());
        let mut type_names = Vec::with_capacity(statement.columns().len());
        for column in statement.columns() {
            let info = column.type_info();
            columns.push(Column::new(column.name(), type_kind(info)));
            type_names.push(info.name().to_string());
        }
        tracing::debug!("Query returns {} columns", columns.len());

        let stream = sqlx::query(sql).fetch(conn);
        Ok(Self {
            columns,
            type_names,
            rows: Blocking {
                handle: Handle::current(),
                stream,
            },
        })
    }
}

impl RowCursor for PgRowCursor<'_> {
    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn next_row(&mut self) -> ExportResult<Option<Vec<Value>>> {
        let row = match self.rows.next() {
            None => return Ok(None),
            Some(row) => row.map_err(|e| ExportError::cursor(e.to_string()))?,
        };

        let values: Vec<Value> = self
            .columns
            .iter()
            .zip(&self.type_names)
            .enumerate()
            .map(|(i, (column, type_name))| decode(&row, i, column, type_name))
            .collect();
        Ok(Some(values))
    }
}

fn get<'r, T>(row: &'r PgRow, i: usize) -> Result<Option<T>, sqlx::Error>
where
    T: Decode<'r, sqlx::Postgres> + Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(i)
}

/// Decode one field. A value the column's type cannot be read as is logged
/// and written as null rather than aborting the export.
fn decode(row: &PgRow, i: usize, column: &Column, type_name: &str) -> Value {
    let value: Result<Value, sqlx::Error> = match column.kind {
        TypeKind::Bool => get::<bool>(row, i).map(|v| v.into()),
        TypeKind::Int2 => get::<i16>(row, i).map(|v| v.map(|n| Value::Int(n.into())).into()),
        TypeKind::Int4 => get::<i32>(row, i).map(|v| v.into()),
        TypeKind::Int8 => get::<i64>(row, i).map(|v| v.into()),
        TypeKind::Float4 => get::<f32>(row, i).map(|v| v.map(|n| Value::Float(n.into())).into()),
        TypeKind::Float8 => get::<f64>(row, i).map(|v| v.into()),
        // NaN and values beyond rust_decimal's range fail here.
        TypeKind::Numeric => get::<Decimal>(row, i).map(|v| v.map(Value::Decimal).into()),
        // text, varchar, bpchar, name and "char" all travel as their UTF-8 text.
        TypeKind::Text => with_raw(row, i, |bytes| {
            std::str::from_utf8(bytes)
                .map(|s| Value::Text(s.to_string()))
                .map_err(|e| sqlx::Error::Decode(e.into()))
        }),
        TypeKind::Bytea => get::<Vec<u8>>(row, i).map(|v| v.map(Value::Bytes).into()),
        TypeKind::Date => get::<NaiveDate>(row, i).map(|v| v.map(Value::Date).into()),
        TypeKind::Timestamp => {
            get::<NaiveDateTime>(row, i).map(|v| v.map(Value::Timestamp).into())
        }
        TypeKind::TimestampTz => {
            get::<DateTime<Utc>>(row, i).map(|v| v.map(Value::TimestampTz).into())
        }
        TypeKind::Interval => get::<PgInterval>(row, i).map(|v| {
            v.map(|iv| Value::Interval(Interval::new(iv.months, iv.days, iv.microseconds)))
                .into()
        }),
        TypeKind::Uuid => get::<Uuid>(row, i).map(|v| v.map(Value::Uuid).into()),
        TypeKind::Json | TypeKind::Jsonb => {
            get::<serde_json::Value>(row, i).map(|v| v.map(Value::Json).into())
        }
        TypeKind::Array => decode_array(row, i, type_name),
        TypeKind::Unknown => decode_other(row, i, type_name),
    };

    value.unwrap_or_else(|err| {
        tracing::warn!("column {:?}: {}, writing null", column.name, err);
        Value::Null
    })
}

fn text<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> Value {
    value.map_or(Value::Null, |v| Value::Text(f(v)))
}

/// Types without a [`TypeKind`] of their own are rendered as text.
fn decode_other(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    match type_name {
        "TIME" => get::<NaiveTime>(row, i).map(|v| text(v, |t| t.to_string())),
        "TIMETZ" => get::<PgTimeTz<NaiveTime, FixedOffset>>(row, i)
            .map(|v| text(v, |t| format!("{}{}", t.time, t.offset))),
        "OID" => get::<Oid>(row, i).map(|v| v.map(|oid| Value::Int(oid.0.into())).into()),
        "MONEY" => get::<PgMoney>(row, i).map(|v| text(v, |m| m.to_decimal(2).to_string())),
        _ => raw_text(row, i, type_name),
    }
}

fn array<T>(row: &PgRow, i: usize, f: impl Fn(T) -> Value) -> Result<Value, sqlx::Error>
where
    T: for<'a> Decode<'a, sqlx::Postgres> + Type<sqlx::Postgres> + PgHasArrayType,
{
    let items = row.try_get::<Option<Vec<Option<T>>>, _>(i)?;
    Ok(match items {
        None => Value::Null,
        Some(items) => Value::Array(
            items
                .into_iter()
                .map(|item| item.map_or(Value::Null, &f))
                .collect(),
        ),
    })
}

fn decode_array(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    let element = type_name
        .strip_suffix("[]")
        .or_else(|| type_name.strip_prefix('_'))
        .unwrap_or(type_name);

    match TypeKind::from_pg_name(element) {
        TypeKind::Bool => array(row, i, Value::Bool),
        TypeKind::Int2 => array(row, i, |n: i16| Value::Int(n.into())),
        TypeKind::Int4 => array(row, i, |n: i32| Value::Int(n.into())),
        TypeKind::Int8 => array(row, i, Value::Int),
        TypeKind::Float4 => array(row, i, |n: f32| Value::Float(n.into())),
        TypeKind::Float8 => array(row, i, Value::Float),
        TypeKind::Numeric => array(row, i, Value::Decimal),
        TypeKind::Text => array(row, i, Value::Text),
        TypeKind::Date => array(row, i, Value::Date),
        TypeKind::Timestamp => array(row, i, Value::Timestamp),
        TypeKind::TimestampTz => array(row, i, Value::TimestampTz),
        TypeKind::Uuid => array(row, i, Value::Uuid),
        TypeKind::Json | TypeKind::Jsonb => array(row, i, Value::Json),
        _ => raw_text(row, i, type_name),
    }
}

fn with_raw(
    row: &PgRow,
    i: usize,
    f: impl FnOnce(&[u8]) -> Result<Value, sqlx::Error>,
) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(i)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let bytes = raw.as_bytes().map_err(sqlx::Error::Decode)?;
    f(bytes)
}

/// The raw field bytes rendered as text.
fn raw_text(row: &PgRow, i: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    with_raw(row, i, |bytes| {
        wire_text(type_name, bytes)
            .map(Value::Text)
            .ok_or_else(|| sqlx::Error::Decode(format!("cannot render {type_name} as text").into()))
    })
}

/// Text form of a binary-format value: network types are decoded, anything
/// else must already be printable UTF-8 (enums, domains over text, xml).
fn wire_text(type_name: &str, bytes: &[u8]) -> Option<String> {
    match type_name {
        "INET" | "CIDR" => inet_text(bytes),
        "MACADDR" | "MACADDR8" if matches!(bytes.len(), 6 | 8) => Some(
            bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        _ => {
            let text = std::str::from_utf8(bytes).ok()?;
            let printable = text
                .chars()
                .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'));
            printable.then(|| text.to_string())
        }
    }
}

/// family, prefix bits, is-cidr flag, address length, address bytes.
fn inet_text(bytes: &[u8]) -> Option<String> {
    let [family, bits, is_cidr, len, addr @ ..] = bytes else {
        return None;
    };
    if usize::from(*len) != addr.len() {
        return None;
    }
    let (ip, max_bits) = match *family {
        2 => (IpAddr::from(<[u8; 4]>::try_from(addr).ok()?), 32),
        3 => (IpAddr::from(<[u8; 16]>::try_from(addr).ok()?), 128),
        _ => return None,
    };
    Some(if *is_cidr != 0 || *bits != max_bits {
        format!("{ip}/{bits}")
    } else {
        ip.to_string()
    })
}

/// `COPY ... TO STDOUT` over one connection.
pub struct PgCopySource<'c> {
    conn: &'c mut PgConnection,
    handle: Handle,
}

impl<'c> PgCopySource<'c> {
    /// Must be called inside a tokio runtime.
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self {
            conn,
            handle: Handle::current(),
        }
    }
}

impl CopySource for PgCopySource<'_> {
    fn copy_out<'a>(
        &'a mut self,
        statement: &str,
    ) -> ExportResult<Box<dyn Iterator<Item = ExportResult<Bytes>> + 'a>> {
        let handle = self.handle.clone();
        let stream = handle
            .block_on(self.conn.copy_out_raw(statement))
            .map_err(db_error)?;
        let mut chunks = Blocking { handle, stream };
        Ok(Box::new(std::iter::from_fn(move || {
            chunks.next().map(|chunk| chunk.map_err(db_error))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_types_as_text() {
        assert_eq!(wire_text("INET", &[2, 32, 0, 4, 192, 168, 1, 10]).unwrap(), "192.168.1.10");
        assert_eq!(wire_text("CIDR", &[2, 24, 1, 4, 10, 0, 0, 0]).unwrap(), "10.0.0.0/24");
        let mut v6 = vec![3, 64, 0, 16, 0x20, 0x01, 0x0d, 0xb8];
        v6.extend([0; 12]);
        assert_eq!(wire_text("INET", &v6).unwrap(), "2001:db8::/64");
        assert_eq!(wire_text("INET", &[2, 32, 0, 4, 1]), None);
        assert_eq!(
            wire_text("MACADDR", &[0x08, 0x00, 0x2b, 0x01, 0x02, 0x03]).unwrap(),
            "08:00:2b:01:02:03"
        );
    }

    #[test]
    fn test_binary_values_are_not_passed_off_as_text() {
        // A time value on the wire: microseconds since midnight.
        let time = 43_200_000_000_i64.to_be_bytes();
        assert_eq!(wire_text("TIME", &time), None);
        assert_eq!(wire_text("mood", b"happy").unwrap(), "happy");
        assert_eq!(wire_text("\"CHAR\"", b"r").unwrap(), "r");
        assert_eq!(wire_text("xml", b"<a>\n</a>").unwrap(), "<a>\n</a>");
    }

    #[test]
    fn test_type_kind_prefers_oid() {
        assert_eq!(type_kind(&PgTypeInfo::with_name("UUID")), TypeKind::Uuid);
        assert_eq!(type_kind(&PgTypeInfo::with_name("TEXT[]")), TypeKind::Array);
        assert_eq!(type_kind(&PgTypeInfo::with_name("mood")), TypeKind::Unknown);
    }
}

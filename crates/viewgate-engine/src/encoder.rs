//! Columnar batch to JSON conversion.
//!
//! Maps engine-native Arrow column types onto JSON scalars: integers and
//! floats as numbers, strings as strings, dates and timestamps as ISO-8601
//! strings, decimals as strings (precision preserved), binary as byte
//! arrays. A row that fails to convert is replaced with an inline error
//! marker object so one bad row never aborts the batch.

use arrow::array::{
    Array, BinaryArray, BooleanArray, Date32Array, Date64Array, Decimal128Array,
    FixedSizeBinaryArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeBinaryArray, LargeStringArray, StringArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value as JsonValue};
use viewgate_commons::{GatewayError, Result};

/// Convert one batch into JSON row objects, keyed by field name.
pub fn batch_to_rows(batch: &RecordBatch) -> Vec<JsonValue> {
    let schema = batch.schema();
    (0..batch.num_rows())
        .map(|row| {
            let mut object = Map::with_capacity(schema.fields().len());
            for (index, field) in schema.fields().iter().enumerate() {
                match column_value(batch.column(index).as_ref(), row) {
                    Ok(value) => {
                        object.insert(field.name().clone(), value);
                    }
                    Err(err) => {
                        log::debug!(
                            "row {} column '{}' failed to convert: {}",
                            row,
                            field.name(),
                            err
                        );
                        return json!({ "error": format!("row conversion failed: {}", err) });
                    }
                }
            }
            JsonValue::Object(object)
        })
        .collect()
}

fn column_value(array: &dyn Array, row: usize) -> Result<JsonValue> {
    if array.is_null(row) {
        return Ok(JsonValue::Null);
    }

    match array.data_type() {
        DataType::Null => Ok(JsonValue::Null),
        DataType::Boolean => Ok(json!(downcast::<BooleanArray>(array)?.value(row))),
        DataType::Int8 => Ok(json!(downcast::<Int8Array>(array)?.value(row))),
        DataType::Int16 => Ok(json!(downcast::<Int16Array>(array)?.value(row))),
        DataType::Int32 => Ok(json!(downcast::<Int32Array>(array)?.value(row))),
        DataType::Int64 => Ok(json!(downcast::<Int64Array>(array)?.value(row))),
        DataType::UInt8 => Ok(json!(downcast::<UInt8Array>(array)?.value(row))),
        DataType::UInt16 => Ok(json!(downcast::<UInt16Array>(array)?.value(row))),
        DataType::UInt32 => Ok(json!(downcast::<UInt32Array>(array)?.value(row))),
        DataType::UInt64 => Ok(json!(downcast::<UInt64Array>(array)?.value(row))),
        DataType::Float32 => Ok(finite_number(
            downcast::<Float32Array>(array)?.value(row) as f64
        )),
        DataType::Float64 => Ok(finite_number(downcast::<Float64Array>(array)?.value(row))),
        DataType::Utf8 => Ok(json!(downcast::<StringArray>(array)?.value(row))),
        DataType::LargeUtf8 => Ok(json!(downcast::<LargeStringArray>(array)?.value(row))),
        DataType::Date32 => {
            let days = downcast::<Date32Array>(array)?.value(row);
            let date = DateTime::from_timestamp(i64::from(days) * 86_400, 0)
                .ok_or_else(|| GatewayError::internal("date out of range"))?;
            Ok(json!(date.date_naive().format("%Y-%m-%d").to_string()))
        }
        DataType::Date64 => {
            let millis = downcast::<Date64Array>(array)?.value(row);
            let date = DateTime::from_timestamp_millis(millis)
                .ok_or_else(|| GatewayError::internal("date out of range"))?;
            Ok(json!(date.date_naive().format("%Y-%m-%d").to_string()))
        }
        DataType::Timestamp(unit, _) => {
            let instant = timestamp_value(array, unit, row)?;
            Ok(json!(instant.to_rfc3339_opts(SecondsFormat::Millis, true)))
        }
        DataType::Decimal128(_, _) => Ok(json!(
            downcast::<Decimal128Array>(array)?.value_as_string(row)
        )),
        DataType::Binary => Ok(byte_array(downcast::<BinaryArray>(array)?.value(row))),
        DataType::LargeBinary => Ok(byte_array(downcast::<LargeBinaryArray>(array)?.value(row))),
        DataType::FixedSizeBinary(_) => Ok(byte_array(
            downcast::<FixedSizeBinaryArray>(array)?.value(row),
        )),
        other => Err(GatewayError::internal(format!(
            "unsupported column type {:?}",
            other
        ))),
    }
}

fn timestamp_value(array: &dyn Array, unit: &TimeUnit, row: usize) -> Result<DateTime<Utc>> {
    let out_of_range = || GatewayError::internal("timestamp out of range");
    match unit {
        TimeUnit::Second => {
            let v = downcast::<TimestampSecondArray>(array)?.value(row);
            DateTime::from_timestamp(v, 0).ok_or_else(out_of_range)
        }
        TimeUnit::Millisecond => {
            let v = downcast::<TimestampMillisecondArray>(array)?.value(row);
            DateTime::from_timestamp_millis(v).ok_or_else(out_of_range)
        }
        TimeUnit::Microsecond => {
            let v = downcast::<TimestampMicrosecondArray>(array)?.value(row);
            DateTime::from_timestamp_micros(v).ok_or_else(out_of_range)
        }
        TimeUnit::Nanosecond => {
            let v = downcast::<TimestampNanosecondArray>(array)?.value(row);
            DateTime::from_timestamp(
                v.div_euclid(1_000_000_000),
                v.rem_euclid(1_000_000_000) as u32,
            )
            .ok_or_else(out_of_range)
        }
    }
}

fn downcast<'a, T: 'static>(array: &'a dyn Array) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| GatewayError::internal("column array type mismatch"))
}

fn finite_number(value: f64) -> JsonValue {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn byte_array(bytes: &[u8]) -> JsonValue {
    JsonValue::Array(bytes.iter().map(|&b| json!(b)).collect())
}

/// Incremental JSON array emitter for the streaming mode. The caller writes
/// `open()`, then one fragment per row, then `close()`; the array stays
/// syntactically correct however early the stream terminates.
pub struct JsonArrayEmitter {
    rows: u64,
}

impl JsonArrayEmitter {
    pub fn new() -> Self {
        Self { rows: 0 }
    }

    pub fn open(&self) -> &'static str {
        "["
    }

    pub fn row(&mut self, row: &JsonValue) -> String {
        let fragment = if self.rows == 0 {
            row.to_string()
        } else {
            format!(",{}", row)
        };
        self.rows += 1;
        fragment
    }

    pub fn close(&self) -> &'static str {
        "]"
    }

    pub fn emitted(&self) -> u64 {
        self.rows
    }
}

impl Default for JsonArrayEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Time32SecondArray};
    use arrow::datatypes::{Field, Schema};
    use std::sync::Arc;

    fn batch(fields: Vec<(&str, ArrayRef)>) -> RecordBatch {
        let schema = Schema::new(
            fields
                .iter()
                .map(|(name, array)| {
                    Field::new(name.to_string(), array.data_type().clone(), true)
                })
                .collect::<Vec<_>>(),
        );
        let arrays = fields.into_iter().map(|(_, array)| array).collect();
        RecordBatch::try_new(Arc::new(schema), arrays).unwrap()
    }

    #[test]
    fn test_scalar_types_mapped() {
        let b = batch(vec![
            ("id", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            (
                "name",
                Arc::new(StringArray::from(vec![Some("alice"), None])) as ArrayRef,
            ),
            (
                "score",
                Arc::new(Float64Array::from(vec![1.5, 2.25])) as ArrayRef,
            ),
            (
                "active",
                Arc::new(BooleanArray::from(vec![true, false])) as ArrayRef,
            ),
        ]);

        let rows = batch_to_rows(&b);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["name"], json!("alice"));
        assert_eq!(rows[0]["score"], json!(1.5));
        assert_eq!(rows[0]["active"], json!(true));
        assert_eq!(rows[1]["name"], JsonValue::Null);
    }

    #[test]
    fn test_temporal_types_rendered_iso8601() {
        let b = batch(vec![
            (
                "day",
                Arc::new(Date32Array::from(vec![19723])) as ArrayRef, // 2024-01-01
            ),
            (
                "at",
                Arc::new(TimestampMillisecondArray::from(vec![1_704_067_200_000])) as ArrayRef,
            ),
        ]);

        let rows = batch_to_rows(&b);
        assert_eq!(rows[0]["day"], json!("2024-01-01"));
        assert_eq!(rows[0]["at"], json!("2024-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_decimal_rendered_as_string() {
        let array = Decimal128Array::from(vec![12345_i128])
            .with_precision_and_scale(10, 2)
            .unwrap();
        let b = batch(vec![("amount", Arc::new(array) as ArrayRef)]);

        let rows = batch_to_rows(&b);
        assert_eq!(rows[0]["amount"], json!("123.45"));
    }

    #[test]
    fn test_unsupported_column_becomes_row_error_marker() {
        // time-of-day columns have no JSON mapping here
        let time = Time32SecondArray::from(vec![3600]);
        let b = batch(vec![
            ("id", Arc::new(Int64Array::from(vec![7])) as ArrayRef),
            ("at", Arc::new(time) as ArrayRef),
        ]);

        let rows = batch_to_rows(&b);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].get("error").is_some());
    }

    #[test]
    fn test_non_finite_float_becomes_null() {
        let b = batch(vec![(
            "x",
            Arc::new(Float64Array::from(vec![f64::NAN])) as ArrayRef,
        )]);
        let rows = batch_to_rows(&b);
        assert_eq!(rows[0]["x"], JsonValue::Null);
    }

    #[test]
    fn test_emitter_always_closes() {
        let mut emitter = JsonArrayEmitter::new();
        let mut out = String::new();
        out.push_str(emitter.open());
        out.push_str(&emitter.row(&json!({"a": 1})));
        out.push_str(&emitter.row(&json!({"a": 2})));
        out.push_str(emitter.close());

        assert_eq!(out, r#"[{"a":1},{"a":2}]"#);
        assert_eq!(emitter.emitted(), 2);

        let empty = format!(
            "{}{}",
            JsonArrayEmitter::new().open(),
            JsonArrayEmitter::new().close()
        );
        assert_eq!(empty, "[]");
    }
}

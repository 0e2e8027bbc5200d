/// Arrow schema definitions and batch builders for handing normalized reports
/// and suggestions to a columnar store.
pub mod columnar {
    use arrow::array::{
        ArrayRef, Float64Array, ListBuilder, StringArray, StringBuilder,
        TimestampMicrosecondArray,
    };
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    use crate::report::StructuredReport;
    use crate::suggestion::Suggestion;

    fn utc_micros() -> DataType {
        DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
    }

    fn utf8_list() -> DataType {
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))
    }

    /// Schema for normalized field reports, one row per report.
    pub fn structured_report_schema() -> Schema {
        Schema::new(vec![
            Field::new("report_id", DataType::Utf8, false),
            Field::new("action", DataType::Utf8, false),
            Field::new("target_units", utf8_list(), false),
            Field::new("coord_x", DataType::Float64, false),
            Field::new("coord_y", DataType::Float64, false),
            Field::new("timeframe", DataType::Utf8, false),
            Field::new("priority", DataType::Utf8, false),
            Field::new("soldier_id", DataType::Utf8, false),
            Field::new("radio_call_sign", DataType::Utf8, true),
            // JSON-encoded free-form map.
            Field::new("extras", DataType::Utf8, false),
            Field::new("transmission_time", utc_micros(), false),
            Field::new("received_time", utc_micros(), false),
        ])
    }

    /// Schema for trigger suggestions.
    pub fn suggestion_schema() -> Schema {
        Schema::new(vec![
            Field::new("suggestion_id", DataType::Utf8, false),
            Field::new("suggestion_type", DataType::Utf8, false),
            Field::new("urgency", DataType::Utf8, false),
            Field::new("reason", DataType::Utf8, false),
            Field::new("confidence", DataType::Float64, false),
            Field::new("source_reports", utf8_list(), false),
            Field::new("status", DataType::Utf8, false),
            Field::new("created_at", utc_micros(), false),
        ])
    }

    /// Build one RecordBatch from `(report_id, report)` rows.
    pub fn reports_to_batch(rows: &[(&str, &StructuredReport)]) -> Result<RecordBatch, ArrowError> {
        let mut units = ListBuilder::new(StringBuilder::new());
        for (_, report) in rows {
            for unit in &report.target_units {
                units.values().append_value(unit);
            }
            units.append(true);
        }

        let extras = rows
            .iter()
            .map(|(_, r)| serde_json::to_string(&r.extras))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ArrowError::ExternalError(Box::new(e)))?;

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(rows.iter().map(|(id, _)| *id))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|(_, r)| r.action.as_str()),
            )),
            Arc::new(units.finish()),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|(_, r)| r.coordinates.x),
            )),
            Arc::new(Float64Array::from_iter_values(
                rows.iter().map(|(_, r)| r.coordinates.y),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|(_, r)| r.timeframe.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|(_, r)| r.priority.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|(_, r)| r.soldier_id.as_str()),
            )),
            Arc::new(StringArray::from(
                rows.iter()
                    .map(|(_, r)| r.radio_call_sign.as_deref())
                    .collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(extras)),
            Arc::new(
                TimestampMicrosecondArray::from_iter_values(
                    rows.iter().map(|(_, r)| r.transmission_time.timestamp_micros()),
                )
                .with_timezone("UTC"),
            ),
            Arc::new(
                TimestampMicrosecondArray::from_iter_values(
                    rows.iter().map(|(_, r)| r.received_time.timestamp_micros()),
                )
                .with_timezone("UTC"),
            ),
        ];

        RecordBatch::try_new(Arc::new(structured_report_schema()), columns)
    }

    /// Build one RecordBatch from suggestions.
    pub fn suggestions_to_batch(suggestions: &[Suggestion]) -> Result<RecordBatch, ArrowError> {
        let mut sources = ListBuilder::new(StringBuilder::new());
        for s in suggestions {
            for id in &s.source_reports {
                sources.values().append_value(id);
            }
            sources.append(true);
        }

        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                suggestions.iter().map(|s| s.id.to_string()),
            )),
            Arc::new(StringArray::from_iter_values(
                suggestions.iter().map(|s| s.kind.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                suggestions.iter().map(|s| s.urgency.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                suggestions.iter().map(|s| s.reason.as_str()),
            )),
            Arc::new(Float64Array::from_iter_values(
                suggestions.iter().map(|s| s.confidence),
            )),
            Arc::new(sources.finish()),
            Arc::new(StringArray::from_iter_values(
                suggestions.iter().map(|s| s.status.as_str()),
            )),
            Arc::new(
                TimestampMicrosecondArray::from_iter_values(
                    suggestions.iter().map(|s| s.created_at.timestamp_micros()),
                )
                .with_timezone("UTC"),
            ),
        ];

        RecordBatch::try_new(Arc::new(suggestion_schema()), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::columnar;
    use crate::report::{Coordinates, Priority, StructuredReport};
    use crate::suggestion::{Suggestion, SuggestionType, Urgency};
    use arrow::array::{Array, Float64Array, ListArray, StringArray};
    use chrono::Utc;

    #[test]
    fn structured_report_schema_has_expected_fields() {
        let schema = columnar::structured_report_schema();
        assert_eq!(schema.fields().len(), 12);
        assert!(schema.field_with_name("target_units").is_ok());
        assert!(schema.field_with_name("radio_call_sign").unwrap().is_nullable());
    }

    #[test]
    fn suggestion_schema_has_expected_fields() {
        let schema = columnar::suggestion_schema();
        assert_eq!(schema.fields().len(), 8);
        assert!(schema.field_with_name("source_reports").is_ok());
    }

    #[test]
    fn reports_batch_columns() {
        let now = Utc::now();
        let mut a = StructuredReport::defaults(now);
        a.target_units = vec!["Alpha Squad".into(), "Bravo Team".into()];
        a.coordinates = Coordinates::new(123.456, 789.012);
        a.priority = Priority::High;
        a.radio_call_sign = Some("EAGLE1".into());
        let b = StructuredReport::defaults(now);

        let batch = columnar::reports_to_batch(&[("r1", &a), ("r2", &b)]).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let priority = batch
            .column_by_name("priority")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(priority.value(0), "HIGH");
        assert_eq!(priority.value(1), "MEDIUM");

        let x = batch
            .column_by_name("coord_x")
            .unwrap()
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(x.value(0), 123.456);

        let call_sign = batch.column_by_name("radio_call_sign").unwrap();
        assert!(!call_sign.is_null(0));
        assert!(call_sign.is_null(1));

        let units = batch
            .column_by_name("target_units")
            .unwrap()
            .as_any()
            .downcast_ref::<ListArray>()
            .unwrap();
        assert_eq!(units.value(0).len(), 2);
        assert_eq!(units.value(1).len(), 1);
    }

    #[test]
    fn suggestions_batch_columns() {
        let s = Suggestion::pending(
            SuggestionType::EoincrepEod,
            Urgency::High,
            "Explosive ordnance/device detected",
            0.85,
            ["r1".to_string()],
            Utc::now(),
        );
        let batch = columnar::suggestions_to_batch(&[s]).unwrap();
        assert_eq!(batch.num_rows(), 1);
        let kind = batch
            .column_by_name("suggestion_type")
            .unwrap()
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(kind.value(0), "EOINCREP_EOD");
    }

    #[test]
    fn empty_inputs_build_empty_batches() {
        assert_eq!(columnar::reports_to_batch(&[]).unwrap().num_rows(), 0);
        assert_eq!(columnar::suggestions_to_batch(&[]).unwrap().num_rows(), 0);
    }
}

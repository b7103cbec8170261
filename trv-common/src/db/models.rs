//! Database models

use serde::{Deserialize, Serialize};

/// Every column of the rows table, in schema order
pub const ROW_COLUMNS: [&str; 15] = [
    "id",
    "audio_file_path",
    "human_output",
    "model_output_v1",
    "model_output_v2",
    "accuracy_v1",
    "accuracy_v2",
    "cdng",
    "date",
    "ngdu",
    "gu",
    "oiler_number",
    "rut",
    "ip_address",
    "isu",
];

/// Columns an update may touch. `id` is deliberately absent.
pub const MUTABLE_COLUMNS: [&str; 14] = [
    "audio_file_path",
    "human_output",
    "model_output_v1",
    "model_output_v2",
    "accuracy_v1",
    "accuracy_v2",
    "cdng",
    "date",
    "ngdu",
    "gu",
    "oiler_number",
    "rut",
    "ip_address",
    "isu",
];

/// One transcription/evaluation record
///
/// Text fields are `Option` so the same model reads both variants: the
/// test table never yields NULL, the production table may.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Row {
    pub id: i64,
    pub audio_file_path: Option<String>,
    pub human_output: Option<String>,
    pub model_output_v1: Option<String>,
    pub model_output_v2: Option<String>,
    pub accuracy_v1: Option<String>,
    pub accuracy_v2: Option<String>,
    pub cdng: Option<String>,
    pub date: Option<String>,
    pub ngdu: Option<String>,
    pub gu: Option<String>,
    pub oiler_number: Option<String>,
    pub rut: Option<String>,
    pub ip_address: Option<String>,
    pub isu: Option<String>,
}

/// Whether `column` may be written by an update
pub fn is_mutable_column(column: &str) -> bool {
    MUTABLE_COLUMNS.contains(&column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutable_columns_exclude_id() {
        assert!(!is_mutable_column("id"));
        assert_eq!(MUTABLE_COLUMNS.len() + 1, ROW_COLUMNS.len());
        for column in MUTABLE_COLUMNS {
            assert!(ROW_COLUMNS.contains(&column));
        }
    }

    #[test]
    fn test_row_serializes_every_column() {
        let row = Row {
            id: 7,
            audio_file_path: Some("a.wav".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), ROW_COLUMNS.len());
        for column in ROW_COLUMNS {
            assert!(object.contains_key(column), "missing key {}", column);
        }
        assert_eq!(object["id"], 7);
        assert_eq!(object["audio_file_path"], "a.wav");
        assert!(object["isu"].is_null());
    }
}

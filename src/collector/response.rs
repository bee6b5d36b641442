// Snapshot body decoding
use crate::error::{Result, VidsiftError};
use serde_json::Value;

/// Decode a snapshot download.
///
/// `application/json` bodies must be an array of records or an object with a
/// `data` array; any other content type is read as newline-delimited JSON.
pub fn parse_results_body(content_type: &str, body: &str) -> Result<Vec<Value>> {
    if content_type.to_lowercase().contains("application/json") {
        let value: Value = serde_json::from_str(body).map_err(|e| {
            VidsiftError::Parsing(format!("Body declared as JSON is not valid JSON: {}", e))
        })?;

        return match value {
            Value::Array(items) => Ok(items),
            Value::Object(mut obj) => match obj.remove("data") {
                Some(Value::Array(items)) => Ok(items),
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(_) => Err(VidsiftError::Parsing(
                    "JSON body field 'data' is not an array".to_string(),
                )),
            },
            _ => Err(VidsiftError::Parsing(
                "JSON body is neither an array nor an object".to_string(),
            )),
        };
    }

    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|e| {
                VidsiftError::Parsing(format!("Invalid NDJSON at line {}: {}", n + 1, e))
            })
        })
        .collect()
}

/// Decode a local dump: a JSON array, a `data` envelope, a single record,
/// or NDJSON
pub fn parse_dump(content: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(obj)) if !obj.contains_key("data") => Ok(vec![Value::Object(obj)]),
        Ok(_) => parse_results_body("application/json", content),
        Err(_) => parse_results_body("application/x-ndjson", content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_array() {
        let records = parse_results_body("application/json; charset=utf-8", r#"[{"id":"1"},{"id":"2"}]"#).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_json_data_envelope() {
        let records = parse_results_body("application/json", r#"{"data":[{"id":"1"}]}"#).unwrap();
        assert_eq!(records[0]["id"], "1");
        assert!(parse_results_body("application/json", r#"{"status":"ok"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_ndjson() {
        let body = "{\"id\":\"1\"}\n\n{\"id\":\"2\"}\n";
        let records = parse_results_body("application/x-ndjson", body).unwrap();
        assert_eq!(records.len(), 2);
        assert!(parse_results_body("text/plain", "").unwrap().is_empty());
    }

    #[test]
    fn test_dump_shapes() {
        assert_eq!(parse_dump(r#"[{"id":"1"},{"id":"2"}]"#).unwrap().len(), 2);
        assert_eq!(parse_dump(r#"{"data":[{"id":"1"}]}"#).unwrap().len(), 1);
        assert_eq!(parse_dump(r#"{"id":"solo"}"#).unwrap()[0]["id"], "solo");
        assert_eq!(parse_dump("{\"id\":\"1\"}\n{\"id\":\"2\"}\n").unwrap().len(), 2);
        assert!(parse_dump("not json").is_err());
    }

    #[test]
    fn test_mismatched_body_is_parsing_error() {
        let err = parse_results_body("application/json", "{\"id\":1}\n{\"id\":2}").unwrap_err();
        assert!(matches!(err, VidsiftError::Parsing(_)));

        let err = parse_results_body("application/x-ndjson", "[1, 2").unwrap_err();
        assert!(matches!(err, VidsiftError::Parsing(_)));

        assert!(parse_results_body("application/json", "42").is_err());
    }
}

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One entity as returned by the extraction service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RawField {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl RawField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            confidence,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    pub data: BTreeMap<String, String>,
    pub confidence: BTreeMap<String, f64>,
    pub has_timestamp: bool,
    pub has_reference: bool,
}

impl NormalizedRecord {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Turns `sales_tax` / `date-time` style names into camelCase.
///
/// Only a separator directly followed by a lowercase ASCII letter is folded;
/// everything else is copied through, so camelCase input comes back unchanged.
pub fn to_camel_case(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '-' || c == '_' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_lowercase() {
                    key.push(next.to_ascii_uppercase());
                    chars.next();
                    continue;
                }
            }
        }
        key.push(c);
    }

    key
}

pub fn normalize(raw_fields: &[RawField]) -> NormalizedRecord {
    let mut record = NormalizedRecord::default();

    for field in raw_fields {
        let key = to_camel_case(&field.name);
        log::trace!("Normalizing field {:?} as {:?}", field.name, key);

        if let Some(confidence) = field.confidence {
            record.confidence.insert(key.clone(), confidence);
        }
        // Later fields win when two names fold to the same key.
        record.data.insert(key, field.value.clone());

        match field.name.as_str() {
            "timestamp" => record.has_timestamp = true,
            "reference" => record.has_reference = true,
            _ => {}
        }
    }

    record
}

/// Normalizes an untyped field list, rejecting anything that is not an array
/// of `{ name, value, confidence? }` objects.
pub fn normalize_value(raw: &Value) -> Result<NormalizedRecord, AppError> {
    let items = raw
        .as_array()
        .ok_or_else(|| AppError::InvalidInput("field list must be an array".to_string()))?;

    let fields = items
        .iter()
        .enumerate()
        .map(|(index, item)| field_from_value(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(normalize(&fields))
}

fn field_from_value(index: usize, item: &Value) -> Result<RawField, AppError> {
    let object = item
        .as_object()
        .ok_or_else(|| AppError::InvalidInput(format!("field {} is not an object", index)))?;

    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidInput(format!("field {} has no string name", index)))?;
    let value = object
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::InvalidInput(format!("field {} has no string value", index)))?;

    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(AppError::InvalidInput(format!(
                "field {} has non-numeric confidence {}",
                index, other
            )))
        }
    };

    Ok(RawField::new(name, value, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_fields() -> Vec<RawField> {
        vec![
            RawField::new("supplier_name", "Corner Shop", Some(0.97)),
            RawField::new("total-amount", "12.40", Some(0.91)),
            RawField::new("date", "2025-04-30", None),
            RawField::new("reference", "INV-0042", Some(0.5)),
        ]
    }

    #[test]
    fn camel_cases_separators() {
        assert_eq!(to_camel_case("date-time"), "dateTime");
        assert_eq!(to_camel_case("sales_tax"), "salesTax");
        assert_eq!(to_camel_case("ABC"), "ABC");
        assert_eq!(to_camel_case("already_Camel-Case"), "already_Camel-Case");
    }

    #[test]
    fn camel_case_leaves_other_separators_alone() {
        assert_eq!(to_camel_case("line_item_2"), "lineItem_2");
        assert_eq!(to_camel_case("trailing_"), "trailing_");
        assert_eq!(to_camel_case("a--b"), "a-B");
        assert_eq!(to_camel_case("net_amount_due"), "netAmountDue");
        assert_eq!(to_camel_case("salesTax"), "salesTax");
        assert_eq!(to_camel_case(&to_camel_case("total-tax_amount")), "totalTaxAmount");
    }

    #[test]
    fn builds_data_and_confidence() {
        let record = normalize(&sample_fields());

        assert_eq!(record.get("supplierName"), Some("Corner Shop"));
        assert_eq!(record.get("totalAmount"), Some("12.40"));
        assert_eq!(record.confidence.get("totalAmount"), Some(&0.91));
        assert!(record.has_reference);
        assert!(!record.has_timestamp);
    }

    #[test]
    fn omits_confidence_when_missing() {
        let record = normalize(&sample_fields());

        assert_eq!(record.get("date"), Some("2025-04-30"));
        assert!(!record.confidence.contains_key("date"));
    }

    #[test]
    fn zero_confidence_is_kept() {
        let record = normalize(&[RawField::new("tip", "0.00", Some(0.0))]);
        assert_eq!(record.confidence.get("tip"), Some(&0.0));
    }

    #[test]
    fn flags_ignore_ordering() {
        let mut fields = sample_fields();
        fields.push(RawField::new("timestamp", "22:01", None));
        let forward = normalize(&fields);
        fields.reverse();
        let backward = normalize(&fields);

        assert!(forward.has_reference && backward.has_reference);
        assert!(forward.has_timestamp && backward.has_timestamp);
    }

    #[test]
    fn flags_use_raw_name() {
        let record = normalize(&[
            RawField::new("Reference", "x", None),
            RawField::new("receipt_timestamp", "y", None),
        ]);
        assert!(!record.has_reference);
        assert!(!record.has_timestamp);
    }

    #[test]
    fn later_duplicate_wins() {
        let record = normalize(&[
            RawField::new("sales_tax", "1.00", Some(0.4)),
            RawField::new("sales-tax", "2.00", None),
            RawField::new("salesTax", "3.00", None),
        ]);

        assert_eq!(record.data.len(), 1);
        assert_eq!(record.get("salesTax"), Some("3.00"));
        // Confidence from the first occurrence survives since later ones had none.
        assert_eq!(record.confidence.get("salesTax"), Some(&0.4));
    }

    #[test]
    fn normalize_is_repeatable() {
        let fields = sample_fields();
        let first = serde_json::to_string(&normalize(&fields)).unwrap();
        let second = serde_json::to_string(&normalize(&fields)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serializes_camel_case_members() {
        let record = normalize(&[RawField::new("timestamp", "10:01", Some(0.8))]);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            json!({
                "data": { "timestamp": "10:01" },
                "confidence": { "timestamp": 0.8 },
                "hasTimestamp": true,
                "hasReference": false
            })
        );
    }

    #[test]
    fn normalizes_untyped_input() {
        let raw = json!([
            { "name": "total_amount", "value": "9.99", "confidence": 0.88 },
            { "name": "date", "value": "April 30, 2025", "confidence": null },
            { "name": "reference", "value": "R-1" }
        ]);
        let record = normalize_value(&raw).unwrap();

        assert_eq!(record.get("totalAmount"), Some("9.99"));
        assert!(!record.confidence.contains_key("date"));
        assert!(record.has_reference);
    }

    #[test]
    fn rejects_malformed_shapes() {
        let cases = [
            json!({ "name": "date", "value": "x" }),
            json!("fields"),
            json!([1, 2]),
            json!([{ "value": "x" }]),
            json!([{ "name": "date", "value": 5 }]),
            json!([{ "name": "date", "value": "x", "confidence": "high" }]),
        ];

        for case in cases {
            assert!(
                matches!(normalize_value(&case), Err(AppError::InvalidInput(_))),
                "expected rejection for {}",
                case
            );
        }
    }
}

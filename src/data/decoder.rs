//! Decoding of raw feed payloads into typed records.
//!
//! This is the only place payloads are deserialized. Decoding never fails:
//! anything that cannot be understood becomes [`DecodedRecord::Malformed`].

use std::collections::BTreeMap;

use cems_types::Parameter;
use serde_json::{Map, Value};

use crate::stream::{FeedEndpoint, FeedKind};

/// Latest value per parameter. `None` means the analyzer sent no usable value.
pub type Readings = BTreeMap<Parameter, Option<f64>>;

/// Health reported by the backend about its own device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Connected,
    Degraded,
    Error,
}

/// A typed record decoded from one feed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRecord {
    GasReading {
        values: Readings,
        corrected_values: Readings,
    },
    StatusBits {
        bits: Vec<bool>,
    },
    ConnectionHealth {
        state: LinkHealth,
    },
    Malformed {
        reason: String,
    },
}

impl DecodedRecord {
    fn malformed(reason: impl Into<String>) -> Self {
        DecodedRecord::Malformed {
            reason: reason.into(),
        }
    }
}

/// Decode a payload received on `endpoint`.
///
/// Returns the primary record, followed by a
/// [`DecodedRecord::ConnectionHealth`] when the payload carries a
/// `connection_status` side field. A payload whose primary part cannot be
/// decoded still reports the failure, and the health record after it.
pub fn decode(endpoint: &FeedEndpoint, payload: &str) -> Vec<DecodedRecord> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(e) => return vec![DecodedRecord::malformed(format!("invalid JSON: {}", e))],
    };
    let Some(object) = value.as_object() else {
        return vec![DecodedRecord::malformed("expected a JSON object")];
    };

    let kind = endpoint.kind();
    let primary = match kind {
        FeedKind::Gas => decode_gas(object),
        FeedKind::Status => decode_status(object),
        FeedKind::Unknown => Err(format!("no decoder for feed {}", endpoint)),
    };
    let health = decode_health(object, kind);

    match (primary, health) {
        (Ok(record), Some(state)) => vec![record, DecodedRecord::ConnectionHealth { state }],
        (Ok(record), None) => vec![record],
        (Err(reason), Some(state)) => vec![
            DecodedRecord::malformed(reason),
            DecodedRecord::ConnectionHealth { state },
        ],
        (Err(reason), None) => vec![DecodedRecord::malformed(reason)],
    }
}

/// Coerce a JSON value to a reading.
///
/// Null, absent, NaN and non-numeric values become `None`, never zero.
/// Numeric strings are accepted.
pub fn safe(value: Option<&Value>) -> Option<f64> {
    let v = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

fn decode_gas(object: &Map<String, Value>) -> Result<DecodedRecord, String> {
    let gas = match object.get("gas") {
        Some(Value::Array(gas)) => gas,
        Some(_) => return Err("`gas` is not an array".to_string()),
        None => return Err("missing `gas` array".to_string()),
    };

    // Short vectors leave the trailing parameters empty
    let values = Parameter::GAS_ORDER
        .iter()
        .enumerate()
        .map(|(i, p)| (*p, safe(gas.get(i))))
        .collect();

    let corrected_values = Parameter::CORRECTED
        .iter()
        .filter_map(|p| p.corrected_key().map(|key| (*p, safe(object.get(key)))))
        .collect();

    Ok(DecodedRecord::GasReading {
        values,
        corrected_values,
    })
}

fn decode_status(object: &Map<String, Value>) -> Result<DecodedRecord, String> {
    match object.get("type").and_then(Value::as_str) {
        Some("status") => {}
        Some(other) => return Err(format!("unexpected message type `{}`", other)),
        None => return Err("missing message type".to_string()),
    }
    let Some(values) = object.get("values").and_then(Value::as_array) else {
        return Err("missing `values` array".to_string());
    };

    let bits = values.iter().map(|v| v.as_f64() == Some(1.0)).collect();
    Ok(DecodedRecord::StatusBits { bits })
}

fn decode_health(object: &Map<String, Value>, kind: FeedKind) -> Option<LinkHealth> {
    let reported = match object.get("connection_status") {
        Some(Value::Null) | None => return None,
        Some(Value::String(s)) if s.is_empty() => return None,
        Some(Value::String(s)) => match s.as_str() {
            "connected" => LinkHealth::Connected,
            "error" => LinkHealth::Error,
            _ => LinkHealth::Degraded,
        },
        Some(_) => LinkHealth::Degraded,
    };

    // Real data overrides the reported state, but only alongside a report
    let real_data = kind == FeedKind::Gas
        && object.get("has_real_data").and_then(Value::as_bool) == Some(true);
    Some(if real_data {
        LinkHealth::Connected
    } else {
        reported
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gas(payload: &str) -> Vec<DecodedRecord> {
        decode(&FeedEndpoint::gas(), payload)
    }

    fn status(payload: &str) -> Vec<DecodedRecord> {
        decode(&FeedEndpoint::status(), payload)
    }

    fn readings(records: &[DecodedRecord]) -> (&Readings, &Readings) {
        match &records[0] {
            DecodedRecord::GasReading {
                values,
                corrected_values,
            } => (values, corrected_values),
            other => panic!("expected GasReading, got {:?}", other),
        }
    }

    #[test]
    fn test_gas_positional_decode() {
        let records = gas(r#"{"gas":[210,45.5,7.2,12,3.1,150,12.5,85000,101325]}"#);
        let (values, _) = readings(&records);

        assert_eq!(records.len(), 1);
        assert_eq!(values[&Parameter::So2], Some(210.0));
        assert_eq!(values[&Parameter::O2], Some(7.2));
        assert_eq!(values[&Parameter::Flowrate], Some(85000.0));
        assert_eq!(values[&Parameter::Pressure], Some(101325.0));
    }

    #[test]
    fn test_gas_null_is_preserved() {
        let records = gas(r#"{"gas":[null,1,2,"NaN","x",5,6,7,8]}"#);
        let (values, corrected) = readings(&records);

        assert_eq!(values[&Parameter::So2], None);
        assert_eq!(values[&Parameter::Nox], Some(1.0));
        assert_eq!(values[&Parameter::Co], None);
        assert_eq!(values[&Parameter::Dust], None);
        // Absent corrected values are null, never zero
        assert!(corrected.values().all(Option::is_none));
        assert_eq!(corrected.len(), Parameter::CORRECTED.len());
    }

    #[test]
    fn test_gas_short_vector_pads_with_null() {
        let records = gas(r#"{"gas":[1,2,3]}"#);
        let (values, _) = readings(&records);

        assert_eq!(values.len(), 9);
        assert_eq!(values[&Parameter::O2], Some(3.0));
        assert_eq!(values[&Parameter::Co], None);
        assert_eq!(values[&Parameter::Pressure], None);
    }

    #[test]
    fn test_gas_numeric_strings() {
        let records = gas(r#"{"gas":["12.5"," 3 ",null,null,null,null,null,null,null]}"#);
        let (values, _) = readings(&records);
        assert_eq!(values[&Parameter::So2], Some(12.5));
        assert_eq!(values[&Parameter::Nox], Some(3.0));
    }

    #[test]
    fn test_gas_corrected_values() {
        let records = gas(r#"{"gas":[],"SO2Corr":180.4,"NOxCorr":null,"DustCorr":"2.5"}"#);
        let (_, corrected) = readings(&records);

        assert_eq!(corrected[&Parameter::So2], Some(180.4));
        assert_eq!(corrected[&Parameter::Nox], None);
        assert_eq!(corrected[&Parameter::Co], None);
        assert_eq!(corrected[&Parameter::Dust], Some(2.5));
    }

    #[test]
    fn test_gas_health_side_field() {
        let records = gas(r#"{"gas":[1],"connection_status":"error"}"#);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[1],
            DecodedRecord::ConnectionHealth {
                state: LinkHealth::Error
            }
        );

        let records = gas(r#"{"gas":[1],"connection_status":"error","has_real_data":true}"#);
        assert_eq!(
            records[1],
            DecodedRecord::ConnectionHealth {
                state: LinkHealth::Connected
            }
        );

        let records = gas(r#"{"gas":[1],"connection_status":"reconnecting"}"#);
        assert_eq!(
            records[1],
            DecodedRecord::ConnectionHealth {
                state: LinkHealth::Degraded
            }
        );
    }

    #[test]
    fn test_health_only_message() {
        let records = gas(r#"{"connection_status":"connected"}"#);
        assert_eq!(records.len(), 2);
        assert!(matches!(&records[0], DecodedRecord::Malformed { reason } if reason.contains("gas")));
        assert_eq!(
            records[1],
            DecodedRecord::ConnectionHealth {
                state: LinkHealth::Connected
            }
        );

        let records = status(r#"{"type":"heartbeat","connection_status":"error"}"#);
        assert!(matches!(
            &records[..],
            [
                DecodedRecord::Malformed { .. },
                DecodedRecord::ConnectionHealth {
                    state: LinkHealth::Error
                }
            ]
        ));
    }

    #[test]
    fn test_real_data_needs_connection_status() {
        let records = gas(r#"{"gas":[1,2,3],"has_real_data":true}"#);
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], DecodedRecord::GasReading { .. }));

        let records = gas(r#"{"gas":[1],"connection_status":null,"has_real_data":true}"#);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_status_bits_keep_order() {
        let records = status(r#"{"type":"status","values":[0,1,0,0,2,1,"1",true]}"#);
        assert_eq!(
            records,
            vec![DecodedRecord::StatusBits {
                bits: vec![false, true, false, false, false, true, false, false]
            }]
        );
    }

    #[test]
    fn test_status_wrong_type_is_malformed() {
        let records = status(r#"{"type":"heartbeat","values":[1]}"#);
        assert!(matches!(&records[..], [DecodedRecord::Malformed { reason }] if reason.contains("heartbeat")));

        let records = status(r#"{"type":"status"}"#);
        assert!(matches!(&records[..], [DecodedRecord::Malformed { .. }]));
    }

    #[test]
    fn test_status_ignores_real_data_flag() {
        let records = status(r#"{"type":"status","values":[],"has_real_data":true}"#);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_malformed_payloads() {
        for payload in ["not json", "[1,2,3]", "42", r#"{"gas":"1,2"}"#, r#"{"other":1}"#] {
            let records = gas(payload);
            assert!(
                matches!(&records[..], [DecodedRecord::Malformed { .. }]),
                "{} decoded as {:?}",
                payload,
                records
            );
        }
    }

    #[test]
    fn test_unknown_feed_is_malformed() {
        let records = decode(&FeedEndpoint::new("/ws/other"), r#"{"gas":[1]}"#);
        assert!(matches!(&records[..], [DecodedRecord::Malformed { .. }]));
    }
}

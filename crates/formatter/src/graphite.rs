//! GraphiteFormatter - trading alerts as Graphite plaintext metrics
//!
//! An alert `{name, symbol, direction, price, timestamp}` becomes two lines:
//!
//! ```text
//! <namespace>.<name>.<symbol>.direction <1|-1|0> <unix_ts>
//! <namespace>.<name>.<symbol>.price <price> <unix_ts>
//! ```

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{FormatError, Formatter};

/// Typed trading alert, for producers that build alerts in code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub name: String,
    pub symbol: String,
    pub direction: String,
    pub price: f64,
    /// ISO-8601 timestamp
    pub timestamp: String,
}

/// Formatter for Graphite metrics from trading alerts
#[derive(Debug, Clone)]
pub struct GraphiteFormatter {
    namespace: String,
}

impl GraphiteFormatter {
    pub const DEFAULT_NAMESPACE: &'static str = "tvt_agents";

    pub fn new() -> Self {
        Self::with_namespace(Self::DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Format an already-parsed JSON alert
    pub fn format_value(&self, alert: &Value) -> Result<String, FormatError> {
        let fields = alert.as_object().ok_or(FormatError::UnsupportedInput {
            found: value_kind(alert),
        })?;

        let strategy = scalar_field(fields, "name")?;
        let symbol = string_field(fields, "symbol")?.replace(':', ".");
        let direction = direction_value(string_field(fields, "direction")?);
        let price = scalar_field(fields, "price")?;
        let timestamp = parse_unix_timestamp(string_field(fields, "timestamp")?)?;

        let path = format!("{}.{}.{}", self.namespace, strategy, symbol);
        Ok(format!(
            "{path}.direction {direction} {timestamp}\n{path}.price {price} {timestamp}"
        ))
    }

    /// Format a typed alert
    pub fn format_alert(&self, alert: &Alert) -> Result<String, FormatError> {
        self.format_value(&serde_json::to_value(alert)?)
    }
}

impl Default for GraphiteFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for GraphiteFormatter {
    fn format(&self, message: &str) -> Result<String, FormatError> {
        let alert: Value = serde_json::from_str(message)?;
        self.format_value(&alert)
    }
}

fn field<'a>(fields: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, FormatError> {
    fields
        .get(name)
        .ok_or(FormatError::MissingField { field: name })
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    name: &'static str,
) -> Result<&'a str, FormatError> {
    field(fields, name)?
        .as_str()
        .ok_or(FormatError::InvalidField {
            field: name,
            expected: "a string",
        })
}

/// String or number, rendered the way it appears in the JSON
fn scalar_field(fields: &Map<String, Value>, name: &'static str) -> Result<String, FormatError> {
    match field(fields, name)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(FormatError::InvalidField {
            field: name,
            expected: "a string or a number",
        }),
    }
}

fn direction_value(direction: &str) -> i8 {
    if direction.eq_ignore_ascii_case("buy") {
        1
    } else if direction.eq_ignore_ascii_case("sell") {
        -1
    } else {
        0
    }
}

/// ISO-8601 to unix seconds; timestamps without an offset are read as UTC
fn parse_unix_timestamp(value: &str) -> Result<i64, FormatError> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Ok(dt.timestamp()),
        Err(source) => NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc().timestamp())
            .map_err(|_| FormatError::InvalidTimestamp {
                value: value.to_string(),
                source,
            }),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2024-06-01T03:16:17Z
    const TS: i64 = 1_717_211_777;

    fn alert(direction: &str) -> Value {
        json!({
            "id": 123,
            "name": "MyStrategy",
            "symbol": "BINANCE:BTCUSD",
            "interval": 15,
            "direction": direction,
            "price": 60000.50,
            "timestamp": "2024-06-01T03:16:17Z"
        })
    }

    #[test]
    fn test_format_round_trip_example() {
        let formatter = GraphiteFormatter::with_namespace("ns");
        let out = formatter
            .format(r#"{"name":"S","symbol":"EX:SYM","direction":"buy","price":1.5,"timestamp":"2024-01-01T00:00:00Z"}"#)
            .unwrap();
        assert_eq!(
            out,
            "ns.S.EX.SYM.direction 1 1704067200\nns.S.EX.SYM.price 1.5 1704067200"
        );
    }

    #[test]
    fn test_format_json_buy_default_namespace() {
        let formatter = GraphiteFormatter::new();
        let out = formatter.format(&alert("BUY").to_string()).unwrap();
        assert_eq!(
            out,
            format!(
                "tvt_agents.MyStrategy.BINANCE.BTCUSD.direction 1 {TS}\n\
                 tvt_agents.MyStrategy.BINANCE.BTCUSD.price 60000.5 {TS}"
            )
        );
    }

    #[test]
    fn test_format_value_sell() {
        let formatter = GraphiteFormatter::new();
        let out = formatter.format_value(&alert("SELL")).unwrap();
        assert!(out.contains(".direction -1 "));
    }

    #[test]
    fn test_direction_mapping() {
        let cases = [
            ("BUY", "1"),
            ("buy", "1"),
            ("SELL", "-1"),
            ("sell", "-1"),
            ("Close entry(s) order long", "0"),
            ("UNKNOWN", "0"),
        ];
        let formatter = GraphiteFormatter::new();
        for (input, expected) in cases {
            let out = formatter.format_value(&alert(input)).unwrap();
            assert!(
                out.contains(&format!("direction {expected} ")),
                "direction {input} -> {out}"
            );
        }
    }

    #[test]
    fn test_price_keeps_float_rendering() {
        let mut value = alert("buy");
        value["price"] = json!(100.0);
        let out = GraphiteFormatter::new().format_value(&value).unwrap();
        assert!(out.ends_with(&format!(".price 100.0 {TS}")));

        value["price"] = json!(42);
        let out = GraphiteFormatter::new().format_value(&value).unwrap();
        assert!(out.ends_with(&format!(".price 42 {TS}")));
    }

    #[test]
    fn test_typed_alert() {
        let alert = Alert {
            name: "Breakout".into(),
            symbol: "NASDAQ:GOOG".into(),
            direction: "buy".into(),
            price: 100.0,
            timestamp: "2024-01-01T00:00:00Z".into(),
        };
        let out = GraphiteFormatter::with_namespace("ns")
            .format_alert(&alert)
            .unwrap();
        assert_eq!(
            out,
            "ns.Breakout.NASDAQ.GOOG.direction 1 1704067200\nns.Breakout.NASDAQ.GOOG.price 100.0 1704067200"
        );
    }

    #[test]
    fn test_timestamp_with_offset_and_naive() {
        assert_eq!(parse_unix_timestamp("2024-01-01T01:00:00+01:00").unwrap(), 1_704_067_200);
        assert_eq!(parse_unix_timestamp("2024-01-01T00:00:00").unwrap(), 1_704_067_200);
        assert!(matches!(
            parse_unix_timestamp("yesterday"),
            Err(FormatError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        let err = GraphiteFormatter::new()
            .format(r#"{"id": 123, "name": "MyStrategy", "symbol": "BTCUSD","#)
            .unwrap_err();
        assert!(matches!(err, FormatError::Json(_)));
    }

    #[test]
    fn test_non_object_input() {
        let err = GraphiteFormatter::new().format("123").unwrap_err();
        assert!(matches!(
            err,
            FormatError::UnsupportedInput { found: "a number" }
        ));
    }

    #[test]
    fn test_missing_field() {
        let mut value = alert("buy");
        value.as_object_mut().unwrap().remove("timestamp");
        let err = GraphiteFormatter::new().format_value(&value).unwrap_err();
        assert!(matches!(err, FormatError::MissingField { field: "timestamp" }));
    }

    #[test]
    fn test_invalid_field_type() {
        let mut value = alert("buy");
        value["symbol"] = json!(["BTC"]);
        let err = GraphiteFormatter::new().format_value(&value).unwrap_err();
        assert!(matches!(err, FormatError::InvalidField { field: "symbol", .. }));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names under which the payment processor may report the amount,
/// in priority order. First integer-typed value wins. Kept as a table so
/// the fallback policy stays auditable in one place.
pub const AMOUNT_FIELDS: [&str; 4] = [
    "amount",
    "amount_total",
    "amountSubtotal",
    "amount_subtotal",
];

/// A payment-status-change notification as delivered. Delivery is
/// at-least-once; the ledger makes application exactly-once.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub status: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PaymentEvent {
    /// Amount in minor currency units, from the first amount field that
    /// holds an integer. Floats and strings never qualify.
    pub fn amount_minor_units(&self) -> Option<i64> {
        AMOUNT_FIELDS
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(Value::as_i64))
    }
}

/// Durable record of a payment having been applied to a balance.
/// `applied` is monotonic false -> true; once true the amount is never
/// re-applied.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaymentMarker {
    pub id: String,
    pub uid: String,
    pub applied: bool,
    pub applied_amount_cents: i64,
    pub applied_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(fields: Value) -> PaymentEvent {
        let mut ev: PaymentEvent = serde_json::from_value(fields).unwrap();
        if ev.status.is_empty() {
            ev.status = "succeeded".into();
        }
        ev
    }

    #[test]
    fn amount_prefers_fields_in_priority_order() {
        let ev = event(json!({
            "id": "p1", "uid": "u1",
            "amount_total": 900,
            "amount": 500,
        }));
        assert_eq!(ev.amount_minor_units(), Some(500));
    }

    #[test]
    fn amount_falls_back_to_later_fields() {
        let ev = event(json!({
            "id": "p1", "uid": "u1",
            "amount_subtotal": 250,
        }));
        assert_eq!(ev.amount_minor_units(), Some(250));
    }

    #[test]
    fn non_integer_amounts_do_not_qualify() {
        let ev = event(json!({
            "id": "p1", "uid": "u1",
            "amount": "500",
            "amount_total": 5.0,
        }));
        assert_eq!(ev.amount_minor_units(), None);
    }

    #[test]
    fn missing_amount_is_none() {
        let ev = event(json!({"id": "p1", "uid": "u1"}));
        assert_eq!(ev.amount_minor_units(), None);
    }

    #[test]
    fn event_deserializes_with_extra_fields() {
        let ev: PaymentEvent = serde_json::from_value(json!({
            "id": "p1", "uid": "u1", "status": "succeeded",
            "amount": 500, "currency": "usd",
        }))
        .unwrap();
        assert_eq!(ev.id, "p1");
        assert_eq!(ev.status, "succeeded");
        assert_eq!(ev.amount_minor_units(), Some(500));
    }
}

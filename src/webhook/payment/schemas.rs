//! Payment gateway webhook payloads
//!
//! Only `id`, `type` and `payload` are required. Everything else is read
//! lazily from the JSON tree because gateways move fields around between
//! event types.

use derive_more::{Display, Error};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::consts;

/// Body as received, before required fields are checked
#[derive(Debug, Deserialize)]
pub struct RawWebhookEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub payload: Option<Value>,
    /// Some gateways put the checkout metadata next to the payload
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub payload: Map<String, Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Display, Error, PartialEq)]
pub enum EventParseError {
    #[display("malformed JSON payload: {_0}")]
    Malformed(#[error(not(source))] String),
    #[display("missing required field: {_0}")]
    MissingField(#[error(not(source))] &'static str),
}

fn required_text(value: Option<String>, field: &'static str) -> Result<String, EventParseError> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or(EventParseError::MissingField(field))
}

/// Parses the raw request body into a [`WebhookEvent`]
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent, EventParseError> {
    let raw: RawWebhookEvent =
        serde_json::from_slice(body).map_err(|e| EventParseError::Malformed(e.to_string()))?;

    let Some(Value::Object(payload)) = raw.payload else {
        return Err(EventParseError::MissingField("payload"));
    };

    Ok(WebhookEvent {
        id: required_text(raw.id, "id")?,
        event_type: required_text(raw.event_type, "type")?,
        payload,
        metadata: raw.metadata,
    })
}

impl WebhookEvent {
    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Checkout or payment status reported by the gateway
    pub fn status(&self) -> Option<&str> {
        self.payload_str("status")
    }

    /// Gateway payment id, only present once money moved
    pub fn payment_reference(&self) -> Option<&str> {
        self.payload_str("paymentId")
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
    }

    pub fn checkout_id(&self) -> Option<&str> {
        self.payload_str("id")
    }

    /// Amount in cents
    pub fn amount(&self) -> Option<i64> {
        self.payload.get("amount").and_then(Value::as_i64)
    }

    pub fn currency(&self) -> Option<&str> {
        self.payload_str("currency")
    }

    /// Correlation ids from the first metadata location that names an order
    /// or a booking. Later locations are not consulted.
    pub fn correlation_ids(&self) -> Option<CorrelationIds> {
        METADATA_LOCATIONS
            .iter()
            .find_map(|locate| locate(self).and_then(CorrelationIds::from_metadata))
    }
}

type MetadataLocation = fn(&WebhookEvent) -> Option<&Value>;

const METADATA_LOCATIONS: [MetadataLocation; 4] = [
    payload_metadata,
    event_metadata,
    payload_data_metadata,
    payload_object_metadata,
];

fn payload_metadata(event: &WebhookEvent) -> Option<&Value> {
    event.payload.get("metadata")
}

fn event_metadata(event: &WebhookEvent) -> Option<&Value> {
    event.metadata.as_ref()
}

fn payload_data_metadata(event: &WebhookEvent) -> Option<&Value> {
    event.payload.get("data")?.get("metadata")
}

fn payload_object_metadata(event: &WebhookEvent) -> Option<&Value> {
    event.payload.get("object")?.get("metadata")
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CorrelationIds {
    pub order_id: Option<String>,
    pub booking_id: Option<String>,
    pub booking_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationTarget {
    Order(String),
    HallBooking(String),
}

// Checkout metadata is written by our own frontend, ids arrive either as
// strings or as plain numbers
fn metadata_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim())
            .filter(|text| !text.is_empty())
            .map(String::from),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl CorrelationIds {
    /// `None` unless the metadata carries an order id or a booking id
    pub fn from_metadata(metadata: &Value) -> Option<Self> {
        let metadata = metadata.as_object()?;

        let ids = Self {
            order_id: metadata_id(metadata.get("orderId")),
            booking_id: metadata_id(metadata.get("bookingId")),
            booking_type: metadata
                .get("bookingType")
                .and_then(Value::as_str)
                .map(|booking_type| booking_type.trim().to_string()),
        };

        (ids.order_id.is_some() || ids.booking_id.is_some()).then_some(ids)
    }

    /// Hall bookings need both the marker and a booking id, everything else
    /// goes to the order path when an order id exists.
    pub fn target(&self) -> Option<CorrelationTarget> {
        if self.booking_type.as_deref() == Some(consts::HALL_BOOKING_MARKER) {
            if let Some(booking_id) = &self.booking_id {
                return Some(CorrelationTarget::HallBooking(booking_id.clone()));
            }
        }

        self.order_id.clone().map(CorrelationTarget::Order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(body: Value) -> WebhookEvent {
        parse_event(body.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_yoco_event() {
        let event = event(json!({
            "id": "evt_2Qd8kP",
            "type": "payment.succeeded",
            "createdDate": "2025-06-01T10:15:00.000Z",
            "payload": {
                "id": "ch_9Xk2",
                "status": "succeeded",
                "amount": 12550,
                "currency": "ZAR",
                "paymentId": "p_7Hh1",
                "metadata": {"orderId": "2f1c0a9e-4a57-4c4e-9d0c-3f0f2b7a1c11"}
            }
        }));

        assert_eq!(event.id, "evt_2Qd8kP");
        assert_eq!(event.event_type, "payment.succeeded");
        assert_eq!(event.status(), Some("succeeded"));
        assert_eq!(event.checkout_id(), Some("ch_9Xk2"));
        assert_eq!(event.payment_reference(), Some("p_7Hh1"));
        assert_eq!(event.amount(), Some(12550));
        assert_eq!(event.currency(), Some("ZAR"));
        assert_eq!(
            event.correlation_ids().and_then(|ids| ids.target()),
            Some(CorrelationTarget::Order(
                "2f1c0a9e-4a57-4c4e-9d0c-3f0f2b7a1c11".into()
            ))
        );
    }

    #[test]
    fn test_optional_fields_of_any_shape_are_accepted() {
        let event = event(json!({
            "id": "evt_6",
            "type": "payment.succeeded",
            "createdDate": 1717236000,
            "mode": null,
            "payload": {"status": "succeeded", "amount": "12550"}
        }));

        assert_eq!(event.id, "evt_6");
        assert_eq!(event.status(), Some("succeeded"));
        assert_eq!(event.amount(), None);
    }

    #[test]
    fn test_parse_event_errors() {
        assert!(matches!(
            parse_event(b"{not json"),
            Err(EventParseError::Malformed(_))
        ));
        assert_eq!(
            parse_event(br#"{"type": "payment.succeeded", "payload": {}}"#),
            Err(EventParseError::MissingField("id"))
        );
        assert_eq!(
            parse_event(br#"{"id": "evt_1", "type": "  ", "payload": {}}"#),
            Err(EventParseError::MissingField("type"))
        );
        assert_eq!(
            parse_event(br#"{"id": "evt_1", "type": "payment.succeeded"}"#),
            Err(EventParseError::MissingField("payload"))
        );
        assert_eq!(
            parse_event(br#"{"id": "evt_1", "type": "payment.succeeded", "payload": "x"}"#),
            Err(EventParseError::MissingField("payload"))
        );
    }

    #[test]
    fn test_correlation_locations_in_order() {
        let top_level = event(json!({
            "id": "evt_1",
            "type": "checkout.completed",
            "payload": {"id": "ch_1"},
            "metadata": {"orderId": "from-top-level"}
        }));
        assert_eq!(
            top_level.correlation_ids().unwrap().order_id.as_deref(),
            Some("from-top-level")
        );

        let nested_data = event(json!({
            "id": "evt_2",
            "type": "checkout.completed",
            "payload": {"data": {"metadata": {"orderId": 1042}}}
        }));
        assert_eq!(
            nested_data.correlation_ids().unwrap().order_id.as_deref(),
            Some("1042")
        );

        let nested_object = event(json!({
            "id": "evt_3",
            "type": "checkout.session.completed",
            "payload": {"object": {"metadata": {"orderId": "from-object"}}}
        }));
        assert_eq!(
            nested_object.correlation_ids().unwrap().order_id.as_deref(),
            Some("from-object")
        );
    }

    #[test]
    fn test_first_location_with_an_id_wins() {
        let event = event(json!({
            "id": "evt_4",
            "type": "payment.succeeded",
            "payload": {
                "metadata": {"source": "web", "orderId": ""},
                "data": {"metadata": {"orderId": "from-data"}},
                "object": {"metadata": {"orderId": "from-object"}}
            },
            "metadata": {"bookingId": "from-top-level", "bookingType": "hall_booking"}
        }));

        let ids = event.correlation_ids().unwrap();
        assert_eq!(ids.order_id, None);
        assert_eq!(ids.booking_id.as_deref(), Some("from-top-level"));
        assert_eq!(
            ids.target(),
            Some(CorrelationTarget::HallBooking("from-top-level".into()))
        );
    }

    #[test]
    fn test_no_correlation_ids() {
        let event = event(json!({
            "id": "evt_5",
            "type": "subscription.created",
            "payload": {"metadata": {"customer": "cus_1"}, "data": [1, 2]},
            "metadata": "not-an-object"
        }));

        assert_eq!(event.correlation_ids(), None);
    }

    #[test]
    fn test_target_routing() {
        let hall_booking = CorrelationIds {
            order_id: Some("B1".into()),
            booking_id: Some("B1".into()),
            booking_type: Some("hall_booking".into()),
        };
        assert_eq!(
            hall_booking.target(),
            Some(CorrelationTarget::HallBooking("B1".into()))
        );

        let other_booking_type = CorrelationIds {
            order_id: Some("O1".into()),
            booking_id: Some("B1".into()),
            booking_type: Some("table_booking".into()),
        };
        assert_eq!(
            other_booking_type.target(),
            Some(CorrelationTarget::Order("O1".into()))
        );

        let booking_without_marker = CorrelationIds {
            booking_id: Some("B1".into()),
            ..Default::default()
        };
        assert_eq!(booking_without_marker.target(), None);
    }
}

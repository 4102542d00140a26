use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::AlexaError;
use crate::extract;

use super::context::device_context;

const DIALOG_REQUEST_PREFIX: &str = "Mobile_TTA_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIds {
    pub message_id: String,
    pub dialog_request_id: String,
    pub boundary: String,
}

impl EventIds {
    pub fn generate() -> Self {
        Self {
            message_id: upper_uuid(),
            dialog_request_id: format!("{DIALOG_REQUEST_PREFIX}{}", upper_uuid()),
            boundary: upper_uuid(),
        }
    }
}

fn upper_uuid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TextMessage { text: String },
    SynchronizeState,
}

impl Event {
    pub fn envelope(&self, ids: &EventIds, conversation_id: Option<&str>) -> Value {
        let (header, payload) = match self {
            Self::TextMessage { text } => (
                json!({
                    "namespace": "Alexa.Input.Text",
                    "name": "TextMessage",
                    "messageId": ids.message_id,
                    "dialogRequestId": ids.dialog_request_id,
                }),
                json!({"text": text}),
            ),
            Self::SynchronizeState => (
                json!({
                    "namespace": "System",
                    "name": "SynchronizeState",
                    "messageId": ids.message_id,
                }),
                json!({}),
            ),
        };

        json!({
            "event": {
                "header": header,
                "payload": payload,
            },
            "context": device_context(conversation_id),
        })
    }
}

pub fn multipart_body(boundary: &str, envelope: &Value) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"metadata\"\r\n\
         Content-Type: application/json; charset=UTF-8\r\n\r\n\
         {envelope}\r\n--{boundary}--"
    )
}

pub fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMessageOutcome {
    pub conversation_id: Option<String>,
    pub reply: Option<String>,
}

pub fn parse_text_message_response(
    status: StatusCode,
    body: &str,
    input_text: &str,
) -> Result<TextMessageOutcome, AlexaError> {
    if status == StatusCode::NO_CONTENT {
        return Ok(TextMessageOutcome::default());
    }
    if status != StatusCode::OK {
        return Err(AlexaError::Backend {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    Ok(TextMessageOutcome {
        conversation_id: extract::conversation_id(body),
        reply: extract::reply_text(body, input_text),
    })
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{
        Event, EventIds, multipart_body, multipart_content_type, parse_text_message_response,
    };
    use crate::error::AlexaError;

    fn fixed_ids() -> EventIds {
        EventIds {
            message_id: "MSG-1".to_string(),
            dialog_request_id: "Mobile_TTA_DLG-1".to_string(),
            boundary: "BOUNDARY-1".to_string(),
        }
    }

    #[test]
    fn generated_ids_are_fresh_and_uppercase() {
        let first = EventIds::generate();
        let second = EventIds::generate();
        assert_ne!(first.message_id, second.message_id);
        assert_ne!(first.boundary, second.boundary);
        assert!(first.dialog_request_id.starts_with("Mobile_TTA_"));
        assert_eq!(first.message_id, first.message_id.to_uppercase());
    }

    #[test]
    fn text_message_envelope_shape() {
        let envelope = Event::TextMessage {
            text: "what's \"new\"\ntoday? ☀".to_string(),
        }
        .envelope(&fixed_ids(), Some("amzn1.conversation.7"));

        let header = &envelope["event"]["header"];
        assert_eq!(header["namespace"], "Alexa.Input.Text");
        assert_eq!(header["name"], "TextMessage");
        assert_eq!(header["messageId"], "MSG-1");
        assert_eq!(header["dialogRequestId"], "Mobile_TTA_DLG-1");
        assert_eq!(
            envelope["event"]["payload"]["text"],
            "what's \"new\"\ntoday? ☀"
        );
        assert_eq!(envelope["context"].as_array().map(Vec::len), Some(16));
    }

    #[test]
    fn synchronize_state_has_no_dialog_request_id() {
        let envelope = Event::SynchronizeState.envelope(&fixed_ids(), None);
        let header = &envelope["event"]["header"];
        assert_eq!(header["namespace"], "System");
        assert_eq!(header["name"], "SynchronizeState");
        assert!(header.get("dialogRequestId").is_none());
        assert_eq!(envelope["event"]["payload"], serde_json::json!({}));
    }

    #[test]
    fn multipart_body_wraps_one_metadata_part() {
        let envelope = serde_json::json!({"event": {}});
        let body = multipart_body("B1", &envelope);
        assert_eq!(
            body,
            "--B1\r\nContent-Disposition: form-data; name=\"metadata\"\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{\"event\":{}}\r\n--B1--"
        );
        assert_eq!(
            multipart_content_type("B1"),
            "multipart/form-data; boundary=B1"
        );
    }

    #[test]
    fn no_content_is_an_empty_outcome() {
        let outcome = parse_text_message_response(StatusCode::NO_CONTENT, "", "hi")
            .expect("204 should be accepted");
        assert!(outcome.conversation_id.is_none());
        assert!(outcome.reply.is_none());
    }

    #[test]
    fn ok_body_yields_conversation_and_reply() {
        let body = "--x\r\nContent-Type: application/json\r\n\r\n{\"directive\":{\"payload\":{\"conversationId\":\"amzn1.conversation.99\",\"fragments\":[{\"text\":\"tell me a joke\",\"purpose\":\"USER\"},{\"metadata\":{\"purpose\":\"AGENT\"},\"text\":\"Why did the robot cross the road?\"}]}}}\r\n--x--";
        let outcome = parse_text_message_response(StatusCode::OK, body, "tell me a joke")
            .expect("200 should parse");
        assert_eq!(
            outcome.conversation_id.as_deref(),
            Some("amzn1.conversation.99")
        );
        assert_eq!(
            outcome.reply.as_deref(),
            Some("Why did the robot cross the road?")
        );
    }

    #[test]
    fn other_statuses_are_backend_errors() {
        let err = parse_text_message_response(StatusCode::FORBIDDEN, "denied", "hi")
            .expect_err("403 should fail");
        assert!(matches!(err, AlexaError::Backend { status: 403, ref body } if body == "denied"));
    }
}

use serde_json::{Value, json};

use crate::models::{Device, Routine};

pub(crate) const BEHAVIOR_PREVIEW_PATH: &str = "/api/behaviors/preview";
pub(crate) const AUTOMATIONS_PATH: &str = "/api/behaviors/automations";

const PREVIEW_BEHAVIOR_ID: &str = "PREVIEW";
const ENABLED_STATUS: &str = "ENABLED";
const DEFAULT_LOCALE: &str = "en-US";
const SEQUENCE_TYPE: &str = "com.amazon.alexa.behaviors.model.Sequence";
const OPAQUE_NODE_TYPE: &str = "com.amazon.alexa.behaviors.model.OpaquePayloadOperationNode";
const TELL_ALEXA_SKILL_ID: &str = "amzn1.ask.1p.tellalexa";
const ANNOUNCEMENT_EXPIRY: &str = "PT5S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Speak { text: String },
    Announce { text: String },
    TextCommand { text: String },
    PlayAudio { url: String },
    Automation { routine: String },
}

impl Command {
    pub fn speak(text: impl Into<String>) -> Self {
        Self::Speak { text: text.into() }
    }

    pub fn announce(text: impl Into<String>) -> Self {
        Self::Announce { text: text.into() }
    }

    pub fn text_command(text: impl Into<String>) -> Self {
        Self::TextCommand { text: text.into() }
    }

    pub fn play_audio(url: impl Into<String>) -> Self {
        Self::PlayAudio { url: url.into() }
    }

    pub fn automation(routine: impl Into<String>) -> Self {
        Self::Automation {
            routine: routine.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Speak { .. } => "speak",
            Self::Announce { .. } => "announce",
            Self::TextCommand { .. } => "text_command",
            Self::PlayAudio { .. } => "play_audio",
            Self::Automation { .. } => "automation",
        }
    }
}

pub fn command_sequence(command: &Command, device: &Device, customer_id: &str) -> Option<Value> {
    let node = match command {
        Command::Speak { text } => speak_node(device, customer_id, text),
        Command::PlayAudio { url } => speak_node(device, customer_id, &audio_ssml(url)),
        Command::Announce { text } => json!({
            "@type": OPAQUE_NODE_TYPE,
            "type": "AlexaAnnouncement",
            "operationPayload": {
                "expireAfter": ANNOUNCEMENT_EXPIRY,
                "content": [{
                    "locale": DEFAULT_LOCALE,
                    "display": {"title": "Announcement", "body": text},
                    "speak": {"type": "text", "value": text},
                }],
                "target": {"customerId": customer_id},
            },
        }),
        Command::TextCommand { text } => json!({
            "@type": OPAQUE_NODE_TYPE,
            "type": "Alexa.TextCommand",
            "skillId": TELL_ALEXA_SKILL_ID,
            "operationPayload": {
                "deviceType": device.device_type,
                "deviceSerialNumber": device.serial_number,
                "customerId": customer_id,
                "text": text,
            },
        }),
        Command::Automation { .. } => return None,
    };

    Some(json!({
        "@type": SEQUENCE_TYPE,
        "startNode": node,
    }))
}

fn speak_node(device: &Device, customer_id: &str, text: &str) -> Value {
    json!({
        "@type": OPAQUE_NODE_TYPE,
        "type": "Alexa.Speak",
        "operationPayload": {
            "deviceType": device.device_type,
            "deviceSerialNumber": device.serial_number,
            "customerId": customer_id,
            "locale": DEFAULT_LOCALE,
            "textToSpeak": text,
        },
    })
}

fn audio_ssml(url: &str) -> String {
    let escaped = url
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;");
    format!(r#"<speak><audio src="{escaped}"/></speak>"#)
}

/// Body for the behavior execution endpoint; the sequence travels as a JSON string.
pub fn behavior_payload(behavior_id: &str, sequence_json: &str) -> Value {
    json!({
        "behaviorId": behavior_id,
        "sequenceJson": sequence_json,
        "status": ENABLED_STATUS,
    })
}

pub fn preview_payload(sequence: &Value) -> Value {
    behavior_payload(PREVIEW_BEHAVIOR_ID, &sequence.to_string())
}

pub fn routine_payload(routine: &Routine) -> Value {
    behavior_payload(&routine.automation_id, &routine.sequence)
}

pub fn find_routine<'a>(routines: &'a [Routine], name: &str) -> Option<&'a Routine> {
    let wanted = name.to_lowercase();
    routines
        .iter()
        .find(|routine| routine.name.to_lowercase() == wanted)
}

use serde_json::{Value, json};

const PRIMARY_PERSON_ID: &str =
    "amzn1.actor.person.did.AP4LASCN2HNWAAMTI32QX37S6QDPIFEQ2UGPIFWPF54F3Y7WDU4V4X273UV3BSP7ENUDDTIJ";
const EXTERNAL_MEDIA_AGENT: &str = "XOGFXO466L";

fn state(namespace: &str, name: &str, payload: Value) -> Value {
    json!({
        "header": {
            "namespace": namespace,
            "name": name,
        },
        "payload": payload,
    })
}

pub fn device_context(conversation_id: Option<&str>) -> Vec<Value> {
    let mut conversation_state = json!({
        "type": "VCF2",
        "version": "2024.1",
        "windowState": "NORMAL",
        "size": {"width": 430, "height": 932},
        "scrollable": {
            "direction": "vertical",
            "allowForward": false,
            "allowBackward": true,
        },
        "elements": [],
    });
    if let Some(conversation_id) = conversation_id {
        conversation_state["conversationId"] = Value::String(conversation_id.to_string());
    }

    vec![
        state(
            "SpeechSynthesizer",
            "SpeechState",
            json!({"playerActivity": "FINISHED", "token": "", "offsetInMilliseconds": 0}),
        ),
        state(
            "SpeechRecognizer",
            "RecognizerState",
            json!({"wakeword": "ALEXA"}),
        ),
        state(
            "Speaker",
            "VolumeState",
            json!({"volume": 50, "muted": false}),
        ),
        state(
            "Alexa.Display.Window",
            "WindowState",
            json!({
                "defaultWindowId": "app_window",
                "instances": [{
                    "id": "app_window",
                    "templateId": "app_window_template",
                    "configuration": {
                        "interactionMode": "mobile_mode",
                        "sizeConfigurationId": "fullscreen",
                    },
                }],
            }),
        ),
        // Text focus is what routes the turn to the text interface.
        state(
            "VisualActivityTracker",
            "ActivityState",
            json!({"focused": {"interface": "Text"}}),
        ),
        state(
            "AudioActivityTracker",
            "ActivityState",
            json!({
                "dialog": {
                    "interface": "SpeechSynthesizer",
                    "idleTimeInMilliseconds": 100_000,
                },
            }),
        ),
        state(
            "Alerts",
            "AlertsState",
            json!({"allAlerts": [], "activeAlerts": []}),
        ),
        state(
            "Alexa.IOComponents",
            "TrustedStates",
            json!({"sessionStates": [], "unlockState": "NEVER_UNLOCKED"}),
        ),
        state(
            "Alexa.IOComponents",
            "IOComponentStates",
            json!({"activeIOComponents": [], "allIOComponents": []}),
        ),
        state(
            "Alexa.PlaybackStateReporter",
            "PlaybackState",
            json!({
                "state": "IDLE",
                "shuffle": "NOT_SHUFFLED",
                "repeat": "NOT_REPEATED",
                "favorite": "NOT_RATED",
                "positionMilliseconds": 0,
                "supportedOperations": ["Play", "Pause", "Previous", "Next"],
                "players": [],
            }),
        ),
        state(
            "Alexa.IOComponents.Bluetooth",
            "BluetoothState",
            json!({"bluetoothStates": []}),
        ),
        state(
            "Alexa.Identity.Recognition",
            "RecognitionState",
            json!({
                "RecognitionState": {
                    "primaryPerson": {"acl": 100, "id": PRIMARY_PERSON_ID},
                },
            }),
        ),
        state(
            "ExternalMediaPlayer",
            "ExternalMediaPlayerState",
            json!({
                "agent": EXTERNAL_MEDIA_AGENT,
                "spiVersion": "2.2.0",
                "players": [],
                "playerInFocus": "",
            }),
        ),
        state(
            "Alexa.Comms.PhoneCallController",
            "PhoneCallControllerState",
            json!({
                "allCalls": [],
                "currentCall": {},
                "device": {"connectionState": "DISCONNECTED"},
                "configuration": {
                    "callingFeature": [{"OVERRIDE_RINGTONE_SUPPORTED": "false"}],
                },
            }),
        ),
        state(
            "Alexa.Comms.MessagingController",
            "MessagingControllerState",
            json!({
                "messagingEndpointStates": [{
                    "messagingEndpointInfo": {"name": "DEFAULT"},
                    "permissions": {"sendPermission": "OFF", "readPermission": "OFF"},
                    "connectionState": "DISCONNECTED",
                }],
            }),
        ),
        state(
            "Alexa.Conversation",
            "ConversationState",
            conversation_state,
        ),
    ]
}

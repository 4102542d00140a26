use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

pub const PURPOSE_AGENT: &str = "AGENT";
pub const PURPOSE_USER: &str = "USER";
pub const LLM_FRAGMENT_MARKER: &str = "LLM:APE";
pub const ATTRIBUTION_STYLE: &str = "text-style-attribution";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub device_type: String,
    #[serde(default)]
    pub device_family: String,
    #[serde(default, rename = "deviceOwnerCustomerId")]
    pub customer_id: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceListResponse {
    #[serde(default)]
    pub(crate) devices: Vec<Device>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryRecord {
    pub record_key: String,
    pub timestamp: i64,
    pub device_serial: String,
    pub customer_utterance: String,
    pub alexa_response: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub(crate) customer_history_records: Vec<RawHistoryRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawHistoryRecord {
    #[serde(default)]
    record_key: String,
    #[serde(default)]
    timestamp: i64,
    #[serde(default)]
    voice_history_record_items: Vec<RawHistoryItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHistoryItem {
    #[serde(default)]
    record_item_type: String,
    #[serde(default)]
    transcript_text: String,
}

impl From<RawHistoryRecord> for HistoryRecord {
    fn from(raw: RawHistoryRecord) -> Self {
        // customerId#timestamp#deviceType#serialNumber
        let device_serial = raw
            .record_key
            .split('#')
            .nth(3)
            .unwrap_or_default()
            .to_string();

        let mut utterance = Vec::new();
        let mut response = Vec::new();
        for item in raw.voice_history_record_items {
            if item.transcript_text.is_empty() {
                continue;
            }
            match item.record_item_type.as_str() {
                "ASR_REPLACEMENT_TEXT" => utterance.push(item.transcript_text),
                "TTS_REPLACEMENT_TEXT" => response.push(item.transcript_text),
                _ => {}
            }
        }

        Self {
            record_key: raw.record_key,
            timestamp: raw.timestamp,
            device_serial,
            customer_utterance: utterance.join(" "),
            alexa_response: response.join(" "),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Routine {
    pub automation_id: String,
    pub name: String,
    /// Pre-built execution payload, kept as the backend's raw JSON text.
    pub sequence: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRoutine {
    #[serde(default)]
    automation_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sequence: Option<Box<RawValue>>,
}

impl From<RawRoutine> for Routine {
    fn from(raw: RawRoutine) -> Self {
        Self {
            automation_id: raw.automation_id.unwrap_or_default(),
            name: raw.name.unwrap_or_default(),
            sequence: raw
                .sequence
                .map(|sequence| sequence.get().to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmartHomeDevice {
    #[serde(default, rename = "entityId")]
    pub entity_id: String,
    #[serde(default, rename = "applianceId")]
    pub appliance_id: String,
    #[serde(default, rename = "friendlyName")]
    pub name: String,
    #[serde(default, rename = "friendlyDescription")]
    pub description: String,
    #[serde(
        default,
        rename = "applianceTypes",
        deserialize_with = "string_or_sequence"
    )]
    pub appliance_types: Vec<String>,
    #[serde(default, rename = "isReachable")]
    pub reachable: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhoenixResponse {
    #[serde(default)]
    pub(crate) network_detail: Vec<PhoenixNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhoenixNetwork {
    #[serde(default)]
    pub(crate) appliance_details: std::collections::BTreeMap<String, SmartHomeDevice>,
}

fn string_or_sequence<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(single) => vec![single],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(ToString::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentItem {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub items: Vec<FragmentItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentDatasources {
    #[serde(default)]
    pub card_data: Option<CardData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentContent {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub items: Vec<FragmentItem>,
    #[serde(default)]
    pub datasources: FragmentDatasources,
}

impl FragmentContent {
    pub fn text(&self) -> &str {
        if !self.text.is_empty() {
            return &self.text;
        }
        self.datasources
            .card_data
            .as_ref()
            .map(|card| card.text.as_str())
            .unwrap_or_default()
    }

    pub fn items(&self) -> &[FragmentItem] {
        if !self.items.is_empty() {
            return &self.items;
        }
        self.datasources
            .card_data
            .as_ref()
            .map(|card| card.items.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentProvenance {
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMetadata {
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub provenance: FragmentProvenance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationFragment {
    #[serde(default, rename = "fragmentURI")]
    pub fragment_uri: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub content: Option<FragmentContent>,
    #[serde(default)]
    pub metadata: FragmentMetadata,
}

impl ConversationFragment {
    pub fn text(&self) -> &str {
        self.content
            .as_ref()
            .map(FragmentContent::text)
            .unwrap_or_default()
    }

    pub fn is_agent_turn(&self) -> bool {
        self.metadata.purpose == PURPOSE_AGENT || self.fragment_uri.contains(LLM_FRAGMENT_MARKER)
    }

    pub fn is_user_turn(&self) -> bool {
        self.metadata.purpose == PURPOSE_USER
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub fragments: Vec<ConversationFragment>,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationListResponse {
    #[serde(default)]
    conversations: Vec<RawConversation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConversation {
    #[serde(default)]
    id: String,
    #[serde(default)]
    creation: RawTurn,
    #[serde(default)]
    last_turn: RawTurn,
}

#[derive(Debug, Default, Deserialize)]
struct RawTurn {
    #[serde(default)]
    origin: RawOrigin,
}

#[derive(Debug, Default, Deserialize)]
struct RawOrigin {
    #[serde(default)]
    name: String,
}

impl ConversationListResponse {
    pub(crate) fn into_conversations(self) -> Vec<Conversation> {
        self.conversations
            .into_iter()
            .map(|item| {
                let device_name = if item.last_turn.origin.name.is_empty() {
                    item.creation.origin.name
                } else {
                    item.last_turn.origin.name
                };
                Conversation {
                    conversation_id: item.id,
                    device_name,
                }
            })
            .collect()
    }
}

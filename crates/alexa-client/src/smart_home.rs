use serde_json::{Value, json};

use crate::error::AlexaError;
use crate::models::{PhoenixResponse, SmartHomeDevice};

pub(crate) const PHOENIX_PATH: &str = "/api/phoenix";
pub(crate) const PHOENIX_STATE_PATH: &str = "/api/phoenix/state";

const MAX_BRIGHTNESS: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartHomeAction {
    TurnOn,
    TurnOff,
    SetBrightness(u8),
}

impl SmartHomeAction {
    fn parameters(self) -> Result<Value, AlexaError> {
        Ok(match self {
            Self::TurnOn => json!({"action": "turnOn"}),
            Self::TurnOff => json!({"action": "turnOff"}),
            Self::SetBrightness(level) if level > MAX_BRIGHTNESS => {
                return Err(AlexaError::InvalidArgument(format!(
                    "brightness must be between 0 and {MAX_BRIGHTNESS}, got {level}"
                )));
            }
            Self::SetBrightness(level) => json!({"action": "setBrightness", "brightness": level}),
        })
    }
}

pub fn control_payload(entity_id: &str, action: SmartHomeAction) -> Result<Value, AlexaError> {
    if entity_id.trim().is_empty() {
        return Err(AlexaError::InvalidArgument(
            "smart home entity id must not be empty".to_string(),
        ));
    }

    Ok(json!({
        "controlRequests": [{
            "entityId": entity_id,
            "entityType": "APPLIANCE",
            "parameters": action.parameters()?,
        }],
    }))
}

pub(crate) fn flatten_appliances(response: PhoenixResponse) -> Vec<SmartHomeDevice> {
    response
        .network_detail
        .into_iter()
        .flat_map(|network| network.appliance_details.into_values())
        .collect()
}

pub fn find_device<'a>(devices: &'a [SmartHomeDevice], name: &str) -> Option<&'a SmartHomeDevice> {
    let wanted = name.to_lowercase();
    devices
        .iter()
        .find(|device| device.name.to_lowercase() == wanted)
        .or_else(|| {
            devices
                .iter()
                .find(|device| device.name.to_lowercase().contains(&wanted))
        })
}

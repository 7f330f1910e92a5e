//! Data models for lightsync
//!
//! Lights, groups, scenes and mappings as the gateway serves them, plus
//! the request and response bodies of the bridge setup and backup endpoints.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single controllable lighting endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Light {
    pub id: String,
    pub name: String,
    /// Archetype reported by the bridge (e.g. "Extended color light")
    #[serde(rename = "type", default)]
    pub light_type: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub product_name: String,
    pub state: LightState,
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// Current state of a light
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LightState {
    pub on: bool,
    /// Brightness in percent (0-100)
    #[serde(default)]
    pub brightness: f64,
    /// Color temperature in mirek
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub reachable: bool,
}

impl LightState {
    /// Shallow merge: every field present in the patch overwrites ours,
    /// absent fields are left alone.
    pub fn apply(&mut self, patch: &LightStatePatch) {
        if let Some(on) = patch.on {
            self.on = on;
        }
        if let Some(brightness) = patch.brightness {
            self.brightness = brightness;
        }
        if let Some(color_temp) = patch.color_temp {
            self.color_temp = Some(color_temp);
        }
        if let Some(ref color) = patch.color {
            self.color = Some(color.clone());
        }
        if let Some(reachable) = patch.reachable {
            self.reachable = reachable;
        }
    }
}

/// Partial light state carried by push events and optimistic updates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LightStatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

impl LightStatePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// CIE color of a light
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Color {
    pub xy: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamut: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hex_rgb: Option<String>,
}

/// What a light can do
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    #[serde(default)]
    pub supports_color: bool,
    #[serde(default)]
    pub supports_color_temp: bool,
    #[serde(default)]
    pub supports_dimming: bool,
}

/// Partial command sent to a light or a group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl DeviceCommand {
    /// On/off and brightness only, the shape used by the dashboard controls
    pub fn power(on: Option<bool>, brightness: Option<f64>) -> Self {
        Self {
            on,
            brightness,
            ..Self::default()
        }
    }
}

/// Kind of group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GroupType {
    #[default]
    Room,
    Zone,
    Other(String),
}

impl From<String> for GroupType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "room" => GroupType::Room,
            "zone" => GroupType::Zone,
            _ => GroupType::Other(s),
        }
    }
}

impl From<GroupType> for String {
    fn from(t: GroupType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupType::Room => write!(f, "room"),
            GroupType::Zone => write!(f, "zone"),
            GroupType::Other(s) => write!(f, "{}", s),
        }
    }
}

/// A named collection of lights
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    /// Member light ids
    #[serde(default)]
    pub lights: Vec<String>,
    pub state: GroupState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scenes: Vec<Scene>,
}

/// Aggregate state of a group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GroupState {
    pub all_on: bool,
    pub any_on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
}

/// A predefined lighting configuration tied to a group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(rename = "type", default)]
    pub scene_type: String,
}

/// Kind of lighting resource a mapping points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Light,
    Group,
    Scene,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceType::Light => "light",
            ResourceType::Group => "group",
            ResourceType::Scene => "scene",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(ResourceType::Light),
            "group" => Ok(ResourceType::Group),
            "scene" => Ok(ResourceType::Scene),
            other => Err(format!(
                "unknown resource type '{}' (expected light, group or scene)",
                other
            )),
        }
    }
}

/// Link between an external controller id and a lighting resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Mapping {
    pub id: String,
    pub name: String,
    /// Identity on the home-automation controller side
    pub loxone_id: String,
    /// Light, group or scene id on the bridge
    pub hue_id: String,
    pub hue_type: ResourceType,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of a mapping create request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewMapping {
    pub name: String,
    pub loxone_id: String,
    pub hue_id: String,
    pub hue_type: ResourceType,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of a mapping update request; only present fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MappingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loxone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue_type: Option<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Export format of all mappings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingsBackup {
    pub version: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

/// How an imported backup is combined with existing mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Drop all existing mappings first
    Replace,
    /// Update mappings with matching ids, add the rest
    #[default]
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => write!(f, "replace"),
            ImportMode::Merge => write!(f, "merge"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replace" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            other => Err(format!(
                "unknown import mode '{}' (expected replace or merge)",
                other
            )),
        }
    }
}

/// Outcome of a mapping import
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportResult {
    pub status: String,
    #[serde(default)]
    pub imported: u32,
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub skipped: u32,
    #[serde(default)]
    pub total: u32,
}

/// Pairing status of the gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeStatus {
    pub configured: bool,
    /// Bridge details as reported by the gateway, shape varies by firmware
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

/// A bridge found by discovery
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BridgeInfo {
    #[serde(default)]
    pub id: String,
    pub ip: String,
    #[serde(default)]
    pub name: String,
}

/// Result of a successful pairing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairResult {
    pub success: bool,
    #[serde(default)]
    pub application_key: String,
}

/// Connectivity diagnostics for a bridge address
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeTestResult {
    pub bridge_ip: String,
    #[serde(default)]
    pub dns_lookup: DnsProbe,
    #[serde(default)]
    pub tcp_443: PortProbe,
    #[serde(default)]
    pub tcp_80: PortProbe,
    #[serde(default)]
    pub https_request: HttpsProbe,
}

impl BridgeTestResult {
    /// Every check succeeded
    pub fn all_ok(&self) -> bool {
        self.dns_lookup.success
            && self.tcp_443.success
            && self.tcp_80.success
            && self.https_request.success
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DnsProbe {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortProbe {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HttpsProbe {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Effective gateway configuration (secrets stripped by the server)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: HostPort,
    #[serde(default)]
    pub hue: HueSettings,
    #[serde(default)]
    pub loxone: HostPort,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostPort {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HueSettings {
    #[serde(default)]
    pub bridge_ip: String,
    #[serde(default)]
    pub configured: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: String,
}

/// Gateway health report
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub hue_configured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut state = LightState {
            on: true,
            brightness: 40.0,
            color_temp: Some(366),
            color: None,
            reachable: true,
        };

        state.apply(&LightStatePatch {
            brightness: Some(70.0),
            ..Default::default()
        });

        assert!(state.on);
        assert_eq!(state.brightness, 70.0);
        assert_eq!(state.color_temp, Some(366));
        assert!(state.reachable);
    }

    #[test]
    fn test_patch_from_full_status_payload() {
        // Status frames may carry a complete light state
        let json = r#"{"on":false,"brightness":12.5,"reachable":false}"#;
        let patch: LightStatePatch = serde_json::from_str(json).unwrap();
        assert_eq!(patch.on, Some(false));
        assert_eq!(patch.brightness, Some(12.5));
        assert_eq!(patch.reachable, Some(false));
        assert!(patch.color_temp.is_none());
        assert!(!patch.is_empty());
        assert!(LightStatePatch::default().is_empty());
    }

    #[test]
    fn test_device_command_omits_absent_fields() {
        let cmd = DeviceCommand::power(Some(true), None);
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"on":true}"#);
    }

    #[test]
    fn test_light_decodes_gateway_shape() {
        let json = r#"{
            "id": "a1",
            "name": "Kitchen",
            "type": "Extended color light",
            "model_id": "LCT015",
            "product_name": "Hue color lamp",
            "state": {"on": true, "brightness": 80, "color": {"xy": [0.3, 0.4]}, "reachable": true},
            "capabilities": {"supports_color": true, "supports_color_temp": true, "supports_dimming": true}
        }"#;

        let light: Light = serde_json::from_str(json).unwrap();
        assert_eq!(light.light_type, "Extended color light");
        assert_eq!(light.state.brightness, 80.0);
        assert_eq!(light.state.color.as_ref().unwrap().xy, [0.3, 0.4]);
        assert!(light.capabilities.supports_color);
    }

    #[test]
    fn test_group_type_open_set() {
        let group: Group = serde_json::from_str(
            r#"{"id":"g1","name":"Living","type":"entertainment","lights":["a"],"state":{"all_on":false,"any_on":true}}"#,
        )
        .unwrap();
        assert_eq!(group.group_type, GroupType::Other("entertainment".to_string()));

        let zone: GroupType = serde_json::from_str(r#""zone""#).unwrap();
        assert_eq!(zone, GroupType::Zone);
        assert_eq!(serde_json::to_string(&GroupType::Room).unwrap(), r#""room""#);
    }

    #[test]
    fn test_resource_type_parse() {
        assert_eq!("Scene".parse::<ResourceType>(), Ok(ResourceType::Scene));
        assert!("switch".parse::<ResourceType>().is_err());
        assert_eq!(ResourceType::Group.to_string(), "group");
    }

    #[test]
    fn test_import_mode_parse() {
        assert_eq!("replace".parse::<ImportMode>(), Ok(ImportMode::Replace));
        assert_eq!(ImportMode::default(), ImportMode::Merge);
        assert!("append".parse::<ImportMode>().is_err());
    }

    #[test]
    fn test_backup_decodes_nanosecond_timestamp() {
        let json = r#"{
            "version": "1.0",
            "created_at": "2024-03-01T10:15:00.123456789Z",
            "mappings": [{"id":"m1","name":"Ceiling","loxone_id":"wz_decke","hue_id":"g1","hue_type":"group","enabled":true}]
        }"#;
        let backup: MappingsBackup = serde_json::from_str(json).unwrap();
        assert_eq!(backup.mappings.len(), 1);
        assert_eq!(backup.mappings[0].hue_type, ResourceType::Group);
        assert!(backup.mappings[0].description.is_none());
    }

    #[test]
    fn test_bridge_test_all_ok() {
        let mut result = BridgeTestResult {
            bridge_ip: "10.0.0.2".to_string(),
            dns_lookup: DnsProbe {
                success: true,
                ..Default::default()
            },
            tcp_443: PortProbe {
                success: true,
                error: None,
            },
            tcp_80: PortProbe {
                success: true,
                error: None,
            },
            https_request: HttpsProbe {
                success: true,
                status_code: Some(200),
                error: None,
            },
        };
        assert!(result.all_ok());

        result.tcp_80.success = false;
        assert!(!result.all_ok());
    }
}

//! Records exchanged with the backend.
//!
//! Field names match the REST tables the dispenser writes to
//! (`action`, `weight`, `timestamp`, `device_id`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispenseAction {
    /// Session opened; `weight` carries the target.
    Start,
    /// Target reached; `weight` carries the delivered mass.
    Complete,
    /// Session forced closed after the max dispense time.
    Timeout,
    /// Session closed because the node is shutting down.
    Abort,
}

impl DispenseAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DispenseAction::Start => "start",
            DispenseAction::Complete => "complete",
            DispenseAction::Timeout => "timeout",
            DispenseAction::Abort => "abort",
        }
    }
}

impl std::fmt::Display for DispenseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write-once record of a session transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseEvent {
    pub action: DispenseAction,
    /// Grams: target for `start`, delivered mass otherwise.
    pub weight: f32,
    pub timestamp: String,
    pub device_id: String,
}

/// Periodic hopper weight telemetry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightReport {
    pub weight: f32,
    pub timestamp: String,
    pub device_id: String,
}

/// A request to dispense `target_g` grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispenseRequest {
    pub target_g: f32,
    /// Backend row id when the request came from a remote table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl DispenseRequest {
    pub fn grams(target_g: f32) -> Self {
        Self { target_g, id: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_backend_field_names() {
        let ev = DispenseEvent {
            action: DispenseAction::Complete,
            weight: 50.0,
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            device_id: "ESP32_001".into(),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["action"], "complete");
        assert_eq!(v["weight"].as_f64(), Some(50.0));
        assert_eq!(v["device_id"], "ESP32_001");
        assert!(v.get("timestamp").is_some());
    }

    #[test]
    fn request_without_id_omits_field() {
        let v = serde_json::to_value(DispenseRequest::grams(25.0)).unwrap();
        assert!(v.get("id").is_none());
        assert_eq!(v["target_g"].as_f64(), Some(25.0));
    }

    #[test]
    fn action_display_matches_wire_name() {
        for a in [
            DispenseAction::Start,
            DispenseAction::Complete,
            DispenseAction::Timeout,
            DispenseAction::Abort,
        ] {
            let wire = serde_json::to_value(a).unwrap();
            assert_eq!(wire, a.to_string());
        }
    }
}

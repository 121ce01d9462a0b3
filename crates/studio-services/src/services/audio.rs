//! Audio input control service.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{bool_field, f64_field, string_field, Service, ServiceError};
use crate::EventHub;

/// One controllable audio input.
#[derive(Debug, Clone, Serialize)]
pub(super) struct AudioInput {
    /// Input name ("mic" or "system").
    name: String,

    /// Volume in the 0.0 - 1.0 range.
    volume: f32,

    /// Whether the input is muted.
    muted: bool,
}

/// Controls mic and system audio inputs.
pub struct AudioService {
    inputs: RwLock<Vec<AudioInput>>,
    events: Arc<EventHub>,
}

impl AudioService {
    pub(super) fn new(events: Arc<EventHub>) -> Self {
        Self {
            inputs: RwLock::new(vec![
                AudioInput {
                    name: "mic".to_string(),
                    volume: 1.0,
                    muted: false,
                },
                AudioInput {
                    name: "system".to_string(),
                    volume: 1.0,
                    muted: false,
                },
            ]),
            events,
        }
    }

    fn with_input<T>(
        &self,
        name: &str,
        apply: impl FnOnce(&mut AudioInput) -> T,
    ) -> Result<T, ServiceError> {
        let mut inputs = self.inputs.write();
        let input = inputs
            .iter_mut()
            .find(|i| i.name == name)
            .ok_or_else(|| ServiceError::failed(format!("unknown audio input: {name}")))?;
        Ok(apply(input))
    }
}

#[async_trait]
impl Service for AudioService {
    fn name(&self) -> &'static str {
        "AudioService"
    }

    async fn call(&self, method: &str, args: &[Value]) -> Result<Value, ServiceError> {
        match method {
            "getInputs" => Ok(json!(*self.inputs.read())),
            "setVolume" => {
                let input = string_field(args, "input")?;
                let volume = (f64_field(args, "volume")? as f32).clamp(0.0, 1.0);

                self.with_input(&input, |i| i.volume = volume)?;
                debug!(input = %input, volume, "Volume changed");
                self.events.emit(
                    self.name(),
                    "volumeChanged",
                    json!({ "input": input, "volume": volume }),
                );
                Ok(Value::Null)
            }
            "setMuted" => {
                let input = string_field(args, "input")?;
                let muted = bool_field(args, "muted")?;

                self.with_input(&input, |i| i.muted = muted)?;
                debug!(input = %input, muted, "Mute changed");
                self.events.emit(
                    self.name(),
                    "mutedChanged",
                    json!({ "input": input, "muted": muted }),
                );
                Ok(Value::Null)
            }
            _ => Err(ServiceError::MethodNotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_volume_clamps_and_emits() {
        let events = Arc::new(EventHub::new());
        let service = AudioService::new(Arc::clone(&events));
        let mut rx = events.subscribe();

        service
            .call("setVolume", &[json!({ "input": "mic", "volume": 1.5 })])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "volumeChanged");
        assert_eq!(event.data, json!({ "input": "mic", "volume": 1.0 }));
    }

    #[tokio::test]
    async fn test_unknown_input_fails() {
        let events = Arc::new(EventHub::new());
        let service = AudioService::new(events);

        let err = service
            .call("setMuted", &[json!({ "input": "desk", "muted": true })])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown audio input: desk");
    }

    #[tokio::test]
    async fn test_get_inputs_reflects_mutations() {
        let events = Arc::new(EventHub::new());
        let service = AudioService::new(events);

        service
            .call("setMuted", &[json!({ "input": "system", "muted": true })])
            .await
            .unwrap();

        let inputs = service.call("getInputs", &[]).await.unwrap();
        assert_eq!(inputs[1]["name"], json!("system"));
        assert_eq!(inputs[1]["muted"], json!(true));
    }
}

//! Resource identifiers addressing services and stateful objects.

use serde_json::Value;

use crate::ProtocolError;

/// Identifier of a service singleton or a constructed resource instance.
///
/// The wire form is the class name directly followed by the JSON-serialized
/// constructor arguments: `ScenesService` for a singleton, `Scene["scene-1"]`
/// for an instance. The full string doubles as the instance memoization key,
/// so both ends must produce it identically; [`ResourceId::with_args`] always
/// uses serde_json's compact encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    name: String,
    args: Option<String>,
}

impl ResourceId {
    /// Identifier for a service singleton (no constructor arguments).
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
        }
    }

    /// Identifier for a resource instance constructed with the given
    /// arguments.
    pub fn with_args(name: impl Into<String>, args: &[Value]) -> Self {
        // Vec<Value> serialization cannot fail.
        let serialized = serde_json::to_string(args).unwrap_or_else(|_| "[]".to_string());
        Self {
            name: name.into(),
            args: Some(serialized),
        }
    }

    /// Parse a wire identifier.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let (name, args) = match raw.find('[') {
            Some(index) => (&raw[..index], Some(&raw[index..])),
            None => (raw, None),
        };

        if name.is_empty() || !is_identifier(name) {
            return Err(ProtocolError::InvalidResourceId(raw.to_string()));
        }

        if let Some(args) = args {
            // The args text must hold a JSON array; keep the raw form as the
            // memoization key rather than re-serializing.
            if serde_json::from_str::<Vec<Value>>(args).is_err() {
                return Err(ProtocolError::InvalidResourceId(raw.to_string()));
            }
        }

        Ok(Self {
            name: name.to_string(),
            args: args.map(str::to_string),
        })
    }

    /// Class or service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if this identifier carries constructor arguments.
    pub fn has_args(&self) -> bool {
        self.args.is_some()
    }

    /// Deserialized constructor arguments (empty for singletons).
    pub fn args(&self) -> Result<Vec<Value>, ProtocolError> {
        match &self.args {
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| ProtocolError::InvalidArgs(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.args {
            Some(args) => write!(f, "{}{}", self.name, args),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::str::FromStr for ResourceId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_id_round_trip() {
        let id = ResourceId::parse("ScenesService").unwrap();
        assert_eq!(id.name(), "ScenesService");
        assert!(!id.has_args());
        assert_eq!(id.to_string(), "ScenesService");
    }

    #[test]
    fn test_instance_id_round_trip() {
        let id = ResourceId::with_args("Scene", &[json!("scene-1")]);
        assert_eq!(id.to_string(), "Scene[\"scene-1\"]");

        let parsed = ResourceId::parse("Scene[\"scene-1\"]").unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.args().unwrap(), vec![json!("scene-1")]);
    }

    #[test]
    fn test_identical_args_produce_identical_keys() {
        let a = ResourceId::with_args("Scene", &[json!("scene-1"), json!(2)]);
        let b = ResourceId::with_args("Scene", &[json!("scene-1"), json!(2)]);
        assert_eq!(a.to_string(), b.to_string());

        let c = ResourceId::with_args("Scene", &[json!("scene-2")]);
        assert_ne!(a.to_string(), c.to_string());
    }

    #[test]
    fn test_rejects_malformed_identifiers() {
        assert!(ResourceId::parse("").is_err());
        assert!(ResourceId::parse("1Scene").is_err());
        assert!(ResourceId::parse("Scene[not json").is_err());
        assert!(ResourceId::parse("Scene{\"id\":1}").is_err());
        assert!(ResourceId::parse("Sce ne").is_err());
    }
}

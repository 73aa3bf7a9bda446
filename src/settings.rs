//! Functions for loading domain settings.

use crate::errors::*;

/// A structure containing configuration data for an entity domain. None of
/// the values limit what the domain can hold; they only size the pools that
/// are allocated up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainSettings {
    /// Number of entity records reserved when the domain is created.
    pub entity_capacity: usize,
    /// Number of component slots reserved by each component factory.
    pub component_capacity: usize,
    /// Number of entries reserved by each bucket.
    pub bucket_capacity: usize,
}

impl Default for DomainSettings {
    fn default() -> Self {
        DomainSettings {
            entity_capacity: 256,
            component_capacity: 64,
            bucket_capacity: 64,
        }
    }
}

impl DomainSettings {
    /// Parses settings from a JSON document. Missing fields keep their
    /// default value.
    pub fn from_json<T: AsRef<str>>(json: T) -> Result<Self> {
        Ok(::serde_json::from_str(json.as_ref())?)
    }

    /// Serializes settings into a JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(::serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partial_json() {
        let settings = DomainSettings::from_json(r#"{ "entity_capacity": 1024 }"#).unwrap();
        assert_eq!(settings.entity_capacity, 1024);
        assert_eq!(
            settings.component_capacity,
            DomainSettings::default().component_capacity
        );
    }

    #[test]
    fn malformed_json() {
        match DomainSettings::from_json("{ entity_capacity: }") {
            Err(Error::MalformedSettings(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn round_trip() {
        let settings = DomainSettings {
            entity_capacity: 8,
            component_capacity: 4,
            bucket_capacity: 2,
        };

        let json = settings.to_json().unwrap();
        assert_eq!(DomainSettings::from_json(json).unwrap(), settings);
    }
}

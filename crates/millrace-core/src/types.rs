use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Represents a packet of data flowing through the system
///
/// This is a wrapper around a JSON value with some helper methods for
/// working with flow-defined data: context rows, node input and spawn
/// arguments are all carried as `DataPacket`s.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DataPacket {
    /// The inner JSON value
    pub value: serde_json::Value,
}

impl DataPacket {
    /// Create a new data packet from a JSON value
    #[inline]
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// Create a null data packet
    #[inline]
    pub fn null() -> Self {
        Self {
            value: serde_json::Value::Null,
        }
    }

    /// Create an empty-object data packet
    #[inline]
    pub fn object() -> Self {
        Self {
            value: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Get the inner JSON value
    #[inline]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Get a mutable reference to the inner JSON value
    #[inline]
    pub fn as_value_mut(&mut self) -> &mut serde_json::Value {
        &mut self.value
    }

    /// Take ownership of the inner JSON value
    #[inline]
    pub fn into_value(self) -> serde_json::Value {
        self.value
    }

    /// Check if the data packet is null
    #[inline]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Look up a key, for object-shaped packets
    #[inline]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.value.get(key)
    }

    /// Try to convert the data packet to an object
    #[inline]
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.value.as_object()
    }

    /// Try to convert the data packet to a specific type
    pub fn to<T>(&self) -> Result<T, serde_json::Error>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.value.clone())
    }

    /// Create a data packet from a serializable value
    pub fn from<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(Self::new(serde_json::to_value(value)?))
    }
}

impl Default for DataPacket {
    fn default() -> Self {
        Self::null()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_packet_accessors() {
        let packet = DataPacket::new(json!({"approved": true, "amount": 12.5}));

        assert!(!packet.is_null());
        assert_eq!(packet.get("approved"), Some(&json!(true)));
        assert_eq!(packet.get("amount"), Some(&json!(12.5)));
        assert!(packet.get("missing").is_none());
        assert_eq!(packet.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_null_and_object() {
        assert!(DataPacket::null().is_null());
        assert!(DataPacket::default().is_null());
        assert_eq!(DataPacket::object().as_object().unwrap().len(), 0);
    }

    #[test]
    fn test_typed_round_trip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Payload {
            approved: bool,
        }

        let original = Payload { approved: true };
        let packet = DataPacket::from(&original).unwrap();
        let restored: Payload = packet.to().unwrap();
        assert_eq!(restored, original);
    }
}

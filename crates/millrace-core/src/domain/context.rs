use crate::domain::process::ProcessId;
use crate::DataPacket;
use serde::{Deserialize, Serialize};

/// Flow-specific business data attached to a process.
///
/// Exactly one context exists per process. The shape of `data` is defined
/// by each flow (via its context factory and forms); the core treats it as
/// an opaque JSON object. Saved as part of the same commit as the task and
/// process rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowContext {
    /// Owning process
    pub process: ProcessId,

    /// Flow-defined business data
    pub data: DataPacket,
}

impl WorkflowContext {
    /// Create a context row for a process
    pub fn new(process: &ProcessId, data: DataPacket) -> Self {
        Self {
            process: process.clone(),
            data,
        }
    }

    /// Look up a field of the context data
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// A boolean field of the context data; `false` when absent or not a bool
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Set a field of the context data. No-op if the data is not an object.
    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        if let serde_json::Value::Object(map) = self.data.as_value_mut() {
            map.insert(key.to_string(), value);
        }
    }

    /// Merge the fields of an object-shaped packet into the context data
    pub fn merge(&mut self, update: &DataPacket) {
        if let Some(fields) = update.as_object() {
            for (key, value) in fields {
                self.set(key, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_context() -> WorkflowContext {
        WorkflowContext::new(
            &ProcessId("p1".to_string()),
            DataPacket::new(json!({"approval_decision": false, "approved": false})),
        )
    }

    #[test]
    fn test_get_and_flag() {
        let context = sample_context();

        assert_eq!(context.get("approved"), Some(&json!(false)));
        assert!(!context.flag("approved"));
        assert!(!context.flag("missing"));
    }

    #[test]
    fn test_set() {
        let mut context = sample_context();
        context.set("approved", json!(true));

        assert!(context.flag("approved"));
    }

    #[test]
    fn test_merge_overwrites_fields() {
        let mut context = sample_context();
        context.merge(&DataPacket::new(json!({"approval_decision": true})));

        assert!(context.flag("approval_decision"));
        // Untouched fields survive the merge
        assert_eq!(context.get("approved"), Some(&json!(false)));
    }

    #[test]
    fn test_merge_ignores_non_object_update() {
        let mut context = sample_context();
        context.merge(&DataPacket::new(json!("not an object")));

        assert_eq!(context.get("approved"), Some(&json!(false)));
    }
}

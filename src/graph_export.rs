//! JSON export of the diagnostic dump for external tooling.

use crate::debug::GraphDump;

impl GraphDump {
    /// Pretty-printed JSON rendering of the dump.
    ///
    /// ```
    /// use stratum_di::Layer;
    ///
    /// let layer = Layer::builder().value(3u8).label("root").build().unwrap();
    /// let json = layer.dump().to_json().unwrap();
    /// assert!(json.contains("\"label\": \"root\""));
    /// assert!(json.contains("\"DirectValue\""));
    /// ```
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Compact JSON rendering of the dump.
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

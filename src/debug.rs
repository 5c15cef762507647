//! Diagnostic dump of layer state.
//!
//! [`Layer::dump`](crate::Layer::dump) walks from a layer up to the root and
//! lists every slot with its status and generator signature. Slots are sorted
//! by type name, so two dumps of the same graph in the same state render the
//! same text.

use std::fmt;

#[cfg(feature = "graph-export")]
use serde::Serialize;

use crate::slot::SlotStatus;

/// Snapshot of a layer chain, innermost layer first.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct GraphDump {
    /// One entry per layer, from the dumped layer up to the root.
    pub layers: Vec<LayerDump>,
}

/// Snapshot of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct LayerDump {
    /// Process-unique layer id.
    pub id: u64,
    /// Optional human label set on the builder.
    pub label: Option<String>,
    /// Whether descendants are restricted from overriding.
    pub locked: bool,
    /// Slots sorted by type name, imported entries included.
    pub slots: Vec<SlotDump>,
    /// Interface bindings sorted by interface name.
    pub interfaces: Vec<InterfaceDump>,
}

/// Snapshot of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct SlotDump {
    /// Full type name.
    pub type_name: String,
    /// Current status.
    pub status: SlotStatus,
    /// Generator signature for generator-backed slots.
    pub signature: Option<String>,
    /// Scheduled at construction.
    pub eager: bool,
}

/// Snapshot of an interface binding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "graph-export", derive(Serialize))]
pub struct InterfaceDump {
    /// The interface type name, e.g. `dyn app::Render`.
    pub interface: String,
    /// The slot type backing it.
    pub source: String,
    /// Whether the cast value has been cached.
    pub bound: bool,
}

impl GraphDump {
    /// The first slot named `type_name`, searching from the innermost layer out.
    pub fn find(&self, type_name: &str) -> Option<&SlotDump> {
        self.layers.iter().find_map(|layer| layer.slot(type_name))
    }

    /// Number of slots across all layers.
    pub fn slot_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.slots.len()).sum()
    }
}

impl LayerDump {
    /// The slot named `type_name` in this layer.
    pub fn slot(&self, type_name: &str) -> Option<&SlotDump> {
        self.slots.iter().find(|slot| slot.type_name == type_name)
    }

    pub(crate) fn sort(&mut self) {
        self.slots.sort_by(|a, b| a.type_name.cmp(&b.type_name).then(a.status.cmp(&b.status)));
        self.interfaces.sort_by(|a, b| a.interface.cmp(&b.interface));
    }
}

impl fmt::Display for GraphDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (depth, layer) in self.layers.iter().enumerate() {
            if depth > 0 {
                writeln!(f)?;
            }
            write!(f, "{layer}")?;
        }
        Ok(())
    }
}

impl fmt::Display for LayerDump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer {}", self.id)?;
        if let Some(label) = &self.label {
            write!(f, " \"{label}\"")?;
        }
        if self.locked {
            f.write_str(" (locked)")?;
        }
        writeln!(f)?;

        let width = self.slots.iter().map(|s| s.type_name.len()).max().unwrap_or(0);
        for slot in &self.slots {
            write!(f, "  {:<width$}  {:<8}", slot.type_name, slot.status.to_string())?;
            if let Some(signature) = &slot.signature {
                write!(f, "  {signature}")?;
            }
            if slot.eager {
                f.write_str("  [eager]")?;
            }
            writeln!(f)?;
        }
        for binding in &self.interfaces {
            write!(f, "  {} => {}", binding.interface, binding.source)?;
            if binding.bound {
                f.write_str("  (bound)")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(name: &str, status: SlotStatus) -> SlotDump {
        SlotDump {
            type_name: name.to_string(),
            status,
            signature: None,
            eager: false,
        }
    }

    #[test]
    fn sort_orders_by_type_name() {
        let mut layer = LayerDump {
            id: 7,
            label: Some("request".into()),
            locked: true,
            slots: vec![slot("b::Zed", SlotStatus::DirectValue), slot("a::Alpha", SlotStatus::GeneratorPending)],
            interfaces: Vec::new(),
        };
        layer.sort();
        assert_eq!(layer.slots[0].type_name, "a::Alpha");

        let rendered = layer.to_string();
        assert!(rendered.starts_with("layer 7 \"request\" (locked)\n"));
        assert!(rendered.contains("a::Alpha  pending"));
    }

    #[test]
    fn find_searches_innermost_first() {
        let inner = LayerDump {
            id: 2,
            label: None,
            locked: false,
            slots: vec![slot("W", SlotStatus::ImportedFromParent)],
            interfaces: Vec::new(),
        };
        let outer = LayerDump {
            id: 1,
            label: None,
            locked: false,
            slots: vec![slot("W", SlotStatus::DirectValue)],
            interfaces: Vec::new(),
        };
        let dump = GraphDump { layers: vec![inner, outer] };
        assert_eq!(dump.find("W").map(|s| s.status), Some(SlotStatus::ImportedFromParent));
        assert_eq!(dump.slot_count(), 2);
    }
}

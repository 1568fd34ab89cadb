use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::dissectors::DissectorRegistry;
use crate::fields::{fmt_fields, FieldValue, Fields};
use crate::layer::{Layer, LayerType};

/// A layer with its complete field set
///
/// The field set always starts with `Contents` and `Payload`.
#[derive(Clone, Debug, PartialEq)]
pub struct DissectedLayer {
    pub layer_type: LayerType,
    /// Length of the layer contents, in bytes
    pub length: usize,
    pub fields: Fields,
}

impl DissectedLayer {
    #[inline]
    pub fn name(&self) -> &'static str {
        self.layer_type.name()
    }
}

impl fmt::Display for DissectedLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\t", self.name())?;
        fmt_fields(&self.fields, f)
    }
}

/// One serialized layer: `{"name": ..., "info": {...}}`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SerializedLayer {
    pub name: String,
    pub info: serde_json::Value,
}

/// JSON-compatible representation of a packet, one entry per layer in decode order
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SerializedPacket(pub Vec<SerializedLayer>);

impl SerializedPacket {
    pub fn layers(&self) -> &[SerializedLayer] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON text of the packet
    pub fn to_json_string(&self) -> String {
        // values are already JSON trees, this cannot fail
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

/// Converts decoded layers into dissected layers and their JSON form
#[derive(Default)]
pub struct LayerSerializer {
    registry: DissectorRegistry,
}

impl LayerSerializer {
    pub fn new(registry: DissectorRegistry) -> Self {
        LayerSerializer { registry }
    }

    pub fn registry(&self) -> &DissectorRegistry {
        &self.registry
    }

    /// Build the field set of every layer, preserving order
    pub fn dissect(&self, layers: &[Layer]) -> Vec<DissectedLayer> {
        layers.iter().map(|l| self.dissect_layer(l)).collect()
    }

    fn dissect_layer(&self, layer: &Layer) -> DissectedLayer {
        let mut fields = Fields::new();
        fields.insert(
            "Contents".to_owned(),
            FieldValue::Bytes(layer.contents.clone()),
        );
        fields.insert(
            "Payload".to_owned(),
            FieldValue::Bytes(layer.payload.clone()),
        );
        match self.registry.dissect(layer) {
            Some(f) => fields.extend(f),
            None => warn!(
                "could not dissect {} layer ({} bytes), keeping raw fields",
                layer.name(),
                layer.contents.len()
            ),
        }
        DissectedLayer {
            layer_type: layer.layer_type,
            length: layer.contents.len(),
            fields,
        }
    }

    /// Convert dissected layers to their JSON-compatible form
    pub fn serialize(&self, layers: &[DissectedLayer]) -> SerializedPacket {
        let v = layers
            .iter()
            .map(|l| {
                let info = match serde_json::to_value(&l.fields) {
                    Ok(info) => info,
                    Err(e) => {
                        warn!("could not serialize {} layer: {}", l.name(), e);
                        serde_json::Value::Object(serde_json::Map::new())
                    }
                };
                SerializedLayer {
                    name: l.name().to_owned(),
                    info,
                }
            })
            .collect();
        SerializedPacket(v)
    }

    /// Shortcut for [`dissect`](Self::dissect) followed by [`serialize`](Self::serialize)
    pub fn serialize_layers(&self, layers: &[Layer]) -> SerializedPacket {
        self.serialize(&self.dissect(layers))
    }
}

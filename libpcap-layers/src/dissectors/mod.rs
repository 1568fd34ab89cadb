//! Dissector registry definition and default dissectors implementation
//!
//! A dissector turns the bytes of one decoded [`Layer`] into its protocol field set.

use std::collections::HashMap;

use crate::fields::Fields;
use crate::layer::{Layer, LayerType};

mod ip;
mod link;
mod transport;

pub use ip::{GreDissector, Ipv4Dissector, Ipv6Dissector};
pub use link::{ArpDissector, Dot1QDissector, EthernetDissector, LinuxSllDissector, LoopbackDissector};
pub use transport::{Icmpv4Dissector, Icmpv6Dissector, TcpDissector, UdpDissector};

/// Common trait for layer dissectors
pub trait LayerDissector {
    /// Layer type handled by this dissector
    fn layer_type(&self) -> LayerType;

    /// Extract the protocol fields of `layer`
    ///
    /// Returns `None` if the layer contents cannot be parsed.
    fn to_fields(&self, layer: &Layer) -> Option<Fields>;
}

/// Dissector used for layers without protocol fields (fragments, payloads)
/// or without a registered dissector
pub struct GenericDissector;

impl GenericDissector {
    pub fn dissect(&self, _layer: &Layer) -> Fields {
        Fields::new()
    }
}

/// Dissector Registry
///
/// Stores one dissector per layer type.
pub struct DissectorRegistry {
    map: HashMap<LayerType, Box<dyn LayerDissector>>,
    generic: GenericDissector,
}

impl DissectorRegistry {
    /// Create a new empty registry
    pub fn new() -> DissectorRegistry {
        DissectorRegistry {
            map: HashMap::new(),
            generic: GenericDissector,
        }
    }

    /// Add a dissector, replacing any previous one for the same layer type
    pub fn add_dissector(&mut self, d: Box<dyn LayerDissector>) {
        self.map.insert(d.layer_type(), d);
    }

    pub fn get(&self, layer_type: LayerType) -> Option<&dyn LayerDissector> {
        self.map.get(&layer_type).map(|d| d.as_ref())
    }

    /// Dissect a layer, using the generic dissector if no dissector is registered
    ///
    /// Returns `None` if the registered dissector failed.
    pub fn dissect(&self, layer: &Layer) -> Option<Fields> {
        match self.get(layer.layer_type) {
            Some(d) => d.to_fields(layer),
            None => Some(self.generic.dissect(layer)),
        }
    }

    /// Iterate registered layer types
    pub fn iter_dissectors<Op>(&self, op: Op)
    where
        Op: Fn(LayerType),
    {
        self.map.keys().for_each(|t| op(*t));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for DissectorRegistry {
    fn default() -> Self {
        let mut r = DissectorRegistry::new();
        r.add_dissector(Box::new(EthernetDissector));
        r.add_dissector(Box::new(Dot1QDissector));
        r.add_dissector(Box::new(ArpDissector));
        r.add_dissector(Box::new(LoopbackDissector));
        r.add_dissector(Box::new(LinuxSllDissector));
        r.add_dissector(Box::new(Ipv4Dissector));
        r.add_dissector(Box::new(Ipv6Dissector));
        r.add_dissector(Box::new(GreDissector));
        r.add_dissector(Box::new(TcpDissector));
        r.add_dissector(Box::new(UdpDissector));
        r.add_dissector(Box::new(Icmpv4Dissector));
        r.add_dissector(Box::new(Icmpv6Dissector));
        r
    }
}

#[inline]
pub(crate) fn put<V: Into<crate::fields::FieldValue>>(fields: &mut Fields, name: &str, v: V) {
    fields.insert(name.to_owned(), v.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::tests::{ARP_FRAME, TCP_FRAME};
    use crate::decoder::{Decoder, PnetDecoder};
    use crate::fields::FieldValue;
    use crate::link_type::LinkType;

    fn dissect_all(data: &[u8]) -> Vec<Fields> {
        let registry = DissectorRegistry::default();
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, data);
        decoded
            .layers
            .iter()
            .map(|l| registry.dissect(l).expect("dissect"))
            .collect()
    }

    #[test]
    fn default_registry() {
        let registry = DissectorRegistry::default();
        assert_eq!(registry.len(), 12);
        assert!(registry.get(LayerType::Payload).is_none());
        assert!(registry.get(LayerType::Tcp).is_some());
        let types = std::cell::RefCell::new(Vec::new());
        registry.iter_dissectors(|t| types.borrow_mut().push(t));
        let types = types.into_inner();
        assert_eq!(types.len(), 12);
        assert!(types.contains(&LayerType::Arp));
        assert!(!types.contains(&LayerType::Payload));
    }

    #[test]
    fn dissect_arp() {
        let fields = dissect_all(ARP_FRAME);
        assert_eq!(
            fields[0]["SrcMAC"],
            FieldValue::Bytes(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
        );
        assert_eq!(fields[0]["EthernetType"], FieldValue::UInt(0x0806));
        assert_eq!(fields[1]["Operation"], FieldValue::UInt(1));
        assert_eq!(
            fields[1]["SourceProtAddress"],
            FieldValue::Bytes(vec![192, 168, 1, 1])
        );
    }

    #[test]
    fn dissect_tcp() {
        let fields = dissect_all(TCP_FRAME);
        assert_eq!(fields[1]["SrcIP"], FieldValue::from("192.168.1.1"));
        assert_eq!(fields[1]["DstIP"], FieldValue::from("192.168.1.2"));
        assert_eq!(fields[1]["TTL"], FieldValue::UInt(64));
        assert_eq!(fields[1]["Flags"], FieldValue::UInt(2));
        assert_eq!(fields[2]["SrcPort"], FieldValue::UInt(12345));
        assert_eq!(fields[2]["DstPort"], FieldValue::UInt(80));
        assert_eq!(fields[2]["SYN"], FieldValue::Bool(true));
        assert_eq!(fields[2]["ACK"], FieldValue::Bool(false));
        assert!(fields[3].is_empty());
    }

    #[test]
    fn dissector_failure() {
        let registry = DissectorRegistry::default();
        let layer = Layer::new(LayerType::Tcp, b"\x00\x01", &[]);
        assert!(registry.dissect(&layer).is_none());
        let layer = Layer::new(LayerType::Payload, b"\x00\x01", &[]);
        assert_eq!(registry.dissect(&layer), Some(Fields::new()));
    }
}

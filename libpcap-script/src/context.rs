use std::cell::RefCell;
use std::rc::Rc;

use libpcap_layers::DissectedLayer;

use crate::packet::PacketMeta;

/// The "current packet", as seen by script bindings
///
/// The context is updated once per packet, before the rule script runs, so every
/// binding call made during one execution observes the same packet.
#[derive(Debug, Default)]
pub struct PacketContext {
    meta: PacketMeta,
    layers: Vec<DissectedLayer>,
}

/// Context shared between the evaluation loop and the script bindings
pub type SharedContext = Rc<RefCell<PacketContext>>;

impl PacketContext {
    pub fn new_shared() -> SharedContext {
        Rc::new(RefCell::new(PacketContext::default()))
    }

    /// Replace the current packet
    pub fn update(&mut self, meta: PacketMeta, layers: Vec<DissectedLayer>) {
        self.meta = meta;
        self.layers = layers;
    }

    #[inline]
    pub fn meta(&self) -> &PacketMeta {
        &self.meta
    }

    #[inline]
    pub fn layers(&self) -> &[DissectedLayer] {
        &self.layers
    }

    /// Index of the first layer with the given type name
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name() == name)
    }

    pub fn contains_layer(&self, name: &str) -> bool {
        self.layer_index(name).is_some()
    }
}

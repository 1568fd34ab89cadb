use std::fmt;

/// Type identifier of a decoded layer
///
/// The name returned by [`LayerType::name`] is the identifier exposed to scripts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LayerType {
    Ethernet,
    Dot1Q,
    Arp,
    Loopback,
    LinuxSll,
    Ipv4,
    Ipv6,
    Fragment,
    Tcp,
    Udp,
    Icmpv4,
    Icmpv6,
    Gre,
    Payload,
}

impl LayerType {
    pub const fn name(self) -> &'static str {
        match self {
            LayerType::Ethernet => "Ethernet",
            LayerType::Dot1Q => "Dot1Q",
            LayerType::Arp => "ARP",
            LayerType::Loopback => "Loopback",
            LayerType::LinuxSll => "Linux SLL",
            LayerType::Ipv4 => "IPv4",
            LayerType::Ipv6 => "IPv6",
            LayerType::Fragment => "Fragment",
            LayerType::Tcp => "TCP",
            LayerType::Udp => "UDP",
            LayerType::Icmpv4 => "ICMPv4",
            LayerType::Icmpv6 => "ICMPv6",
            LayerType::Gre => "GRE",
            LayerType::Payload => "Payload",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decoded protocol unit of a packet
///
/// `contents` holds the bytes of this layer (its header), `payload` the bytes
/// it carries, which are usually the contents of the next layers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layer {
    pub layer_type: LayerType,
    pub contents: Vec<u8>,
    pub payload: Vec<u8>,
}

impl Layer {
    pub fn new(layer_type: LayerType, contents: &[u8], payload: &[u8]) -> Self {
        Layer {
            layer_type,
            contents: contents.to_vec(),
            payload: payload.to_vec(),
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.layer_type.name()
    }
}

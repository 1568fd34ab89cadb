use libpcap_layers::LinkType;

use crate::duration::Duration;

/// Capture metadata of a packet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketMeta {
    /// Index of the packet in the capture, starting at 1
    pub index: usize,
    pub ts: Duration,
    pub link_type: LinkType,
    pub caplen: u32,
    pub origlen: u32,
}

impl Default for PacketMeta {
    fn default() -> Self {
        PacketMeta {
            index: 0,
            ts: Duration::default(),
            link_type: LinkType::Ethernet,
            caplen: 0,
            origlen: 0,
        }
    }
}

/// Raw packet, as produced by a capture source
#[derive(Clone, Debug)]
pub struct Packet {
    pub meta: PacketMeta,
    pub data: Vec<u8>,
}

impl Packet {
    pub fn new(meta: PacketMeta, data: Vec<u8>) -> Self {
        Packet { meta, data }
    }

    #[inline]
    pub fn link_type(&self) -> LinkType {
        self.meta.link_type
    }
}

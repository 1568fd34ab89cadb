use pnet_macros_support::types::u16be;

#[derive(PartialEq)]
/// A structure enabling manipulation of Linux cooked capture (SLL) headers
pub struct SllPacket<'p> {
    packet: ::pnet_macros_support::packet::PacketData<'p>,
}

impl<'a> SllPacket<'a> {
    /// Constructs a new SllPacket. If the provided buffer is less than the minimum required
    /// packet size, this will return None.
    #[inline]
    pub fn new(packet: &[u8]) -> Option<SllPacket> {
        if packet.len() >= SllPacket::minimum_packet_size() {
            use ::pnet_macros_support::packet::PacketData;
            Some(SllPacket {
                packet: PacketData::Borrowed(packet),
            })
        } else {
            None
        }
    }
    /// The minimum size (in bytes) a packet of this type can be. It's based on the total size
    /// of the fixed-size fields.
    #[inline]
    pub const fn minimum_packet_size() -> usize {
        16
    }
    /// Get the packet_type field (0: to us, 1: broadcast, 2: multicast, 3: other host, 4: sent by us)
    #[inline]
    pub fn get_packet_type(&self) -> u16be {
        self.read_u16(0)
    }
    /// Get the ARPHRD_ type of the link-layer device
    #[inline]
    pub fn get_link_type(&self) -> u16be {
        self.read_u16(2)
    }
    /// Get the link-layer address length field
    #[inline]
    pub fn get_address_len(&self) -> u16be {
        self.read_u16(4)
    }
    /// Get the link-layer address, truncated to its declared length (at most 8 bytes)
    #[inline]
    pub fn get_address(&self) -> &[u8] {
        let len = (self.get_address_len() as usize).min(8);
        &self.packet[6..6 + len]
    }
    /// Get the protocol field (an ethertype for most frames)
    #[inline]
    pub fn get_protocol(&self) -> u16be {
        self.read_u16(14)
    }

    #[inline]
    fn read_u16(&self, co: usize) -> u16be {
        let b0 = (self.packet[co] as u16be) << 8;
        let b1 = self.packet[co + 1] as u16be;
        b0 | b1
    }
}
impl<'a> ::pnet_macros_support::packet::Packet for SllPacket<'a> {
    #[inline]
    fn packet(&self) -> &[u8] {
        &self.packet[..]
    }
    #[inline]
    fn payload(&self) -> &[u8] {
        let start = 16;
        let end = self.packet.len();
        if end <= start {
            return &[];
        }
        &self.packet[start..end]
    }
}

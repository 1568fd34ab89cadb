use pnet_packet::arp::ArpPacket;
use pnet_packet::ethernet::{EtherType, EtherTypes, EthernetPacket};
use pnet_packet::icmp::IcmpPacket;
use pnet_packet::icmpv6::Icmpv6Packet;
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet_packet::ipv4::{Ipv4Flags, Ipv4Packet};
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;
use pnet_packet::vlan::VlanPacket;
use pnet_packet::Packet;
use thiserror::Error;
use tracing::trace;

use crate::layer::{Layer, LayerType};
use crate::link_type::LinkType;
use crate::sll::SllPacket;

/// Encapsulations deeper than this are not decoded
pub const MAX_LAYERS: usize = 32;

const ETHERTYPE_TEB: u16 = 0x6558;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{layer}: truncated header ({len} bytes available)")]
    Truncated { layer: LayerType, len: usize },
    #[error("{layer}: invalid header: {reason}")]
    Invalid {
        layer: LayerType,
        reason: &'static str,
    },
    #[error("{layer}: unsupported next protocol 0x{proto:04x}")]
    UnsupportedProtocol { layer: LayerType, proto: u16 },
    #[error("unsupported link type {0}")]
    UnsupportedLinkType(LinkType),
    #[error("too many layers (max {})", MAX_LAYERS)]
    TooManyLayers,
}

/// Result of decoding one packet
///
/// When decoding stops early, `layers` holds the successfully decoded prefix and
/// `error` the reason why decoding stopped.
#[derive(Debug, Default)]
pub struct DecodedPacket {
    pub layers: Vec<Layer>,
    pub error: Option<DecodeError>,
}

impl DecodedPacket {
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

/// Common trait for packet decoders
pub trait Decoder {
    /// Decode raw bytes, starting with the framing given by `link_type`
    fn decode(&self, link_type: LinkType, data: &[u8]) -> DecodedPacket;
}

/// Decoder based on `pnet_packet` views
#[derive(Default)]
pub struct PnetDecoder;

impl PnetDecoder {
    pub fn new() -> Self {
        PnetDecoder
    }
}

impl Decoder for PnetDecoder {
    fn decode(&self, link_type: LinkType, data: &[u8]) -> DecodedPacket {
        let mut state = DecodeState::default();
        let error = state.handle_link(link_type, data).err();
        DecodedPacket {
            layers: state.layers,
            error,
        }
    }
}

#[derive(Default)]
struct DecodeState {
    layers: Vec<Layer>,
}

fn truncated(layer: LayerType, data: &[u8]) -> DecodeError {
    DecodeError::Truncated {
        layer,
        len: data.len(),
    }
}

impl DecodeState {
    fn push(
        &mut self,
        layer_type: LayerType,
        contents: &[u8],
        payload: &[u8],
    ) -> Result<(), DecodeError> {
        if self.layers.len() >= MAX_LAYERS {
            return Err(DecodeError::TooManyLayers);
        }
        trace!(
            "    layer {}: {} ({} bytes, payload {} bytes)",
            self.layers.len(),
            layer_type,
            contents.len(),
            payload.len()
        );
        self.layers
            .push(Layer::new(layer_type, contents, payload));
        Ok(())
    }

    /// Dispatch function: use link type to find the first layer
    fn handle_link(&mut self, link_type: LinkType, data: &[u8]) -> Result<(), DecodeError> {
        match link_type {
            LinkType::Ethernet => self.handle_ethernet(data),
            LinkType::Null => self.handle_loopback(data, false),
            LinkType::Loop => self.handle_loopback(data, true),
            LinkType::LinuxSll => self.handle_sll(data),
            LinkType::Ipv4 => self.handle_ipv4(data),
            LinkType::Ipv6 => self.handle_ipv6(data),
            LinkType::Raw => match data.first().map(|b| b >> 4) {
                Some(4) => self.handle_ipv4(data),
                Some(6) => self.handle_ipv6(data),
                Some(_) => Err(DecodeError::Invalid {
                    layer: LayerType::Ipv4,
                    reason: "unknown IP version",
                }),
                None => Err(truncated(LayerType::Ipv4, data)),
            },
            l => Err(DecodeError::UnsupportedLinkType(l)),
        }
    }

    fn handle_ethernet(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let eth = EthernetPacket::new(data).ok_or_else(|| truncated(LayerType::Ethernet, data))?;
        let hlen = EthernetPacket::minimum_packet_size();
        self.push(LayerType::Ethernet, &data[..hlen], eth.payload())?;
        self.handle_ethertype(LayerType::Ethernet, eth.get_ethertype(), eth.payload())
    }

    fn handle_loopback(&mut self, data: &[u8], network_order: bool) -> Result<(), DecodeError> {
        if data.len() < 4 {
            return Err(truncated(LayerType::Loopback, data));
        }
        let bytes = [data[0], data[1], data[2], data[3]];
        let family = if network_order {
            u32::from_be_bytes(bytes)
        } else {
            // written in the byte order of the capturing host
            let family = u32::from_ne_bytes(bytes);
            if family > 0xffff {
                family.swap_bytes()
            } else {
                family
            }
        };
        let payload = &data[4..];
        self.push(LayerType::Loopback, &data[..4], payload)?;
        match family {
            2 => self.handle_ipv4(payload),
            24 | 28 | 30 => self.handle_ipv6(payload),
            _ => Err(DecodeError::UnsupportedProtocol {
                layer: LayerType::Loopback,
                proto: family as u16,
            }),
        }
    }

    fn handle_sll(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let sll = SllPacket::new(data).ok_or_else(|| truncated(LayerType::LinuxSll, data))?;
        let hlen = SllPacket::minimum_packet_size();
        self.push(LayerType::LinuxSll, &data[..hlen], sll.payload())?;
        self.handle_ethertype(
            LayerType::LinuxSll,
            EtherType(sll.get_protocol()),
            sll.payload(),
        )
    }

    fn handle_ethertype(
        &mut self,
        from: LayerType,
        ethertype: EtherType,
        data: &[u8],
    ) -> Result<(), DecodeError> {
        match ethertype {
            EtherTypes::Ipv4 => self.handle_ipv4(data),
            EtherTypes::Ipv6 => self.handle_ipv6(data),
            EtherTypes::Arp => self.handle_arp(data),
            EtherTypes::Vlan | EtherTypes::PBridge | EtherTypes::QinQ => self.handle_vlan(data),
            _ => Err(DecodeError::UnsupportedProtocol {
                layer: from,
                proto: ethertype.0,
            }),
        }
    }

    fn handle_vlan(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let vlan = VlanPacket::new(data).ok_or_else(|| truncated(LayerType::Dot1Q, data))?;
        let hlen = VlanPacket::minimum_packet_size();
        self.push(LayerType::Dot1Q, &data[..hlen], vlan.payload())?;
        self.handle_ethertype(LayerType::Dot1Q, vlan.get_ethertype(), vlan.payload())
    }

    fn handle_arp(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let arp = ArpPacket::new(data).ok_or_else(|| truncated(LayerType::Arp, data))?;
        let hlen = 8 + 2 * arp.get_hw_addr_len() as usize + 2 * arp.get_proto_addr_len() as usize;
        if hlen > data.len() {
            return Err(truncated(LayerType::Arp, data));
        }
        // anything after the addresses is link-layer padding
        self.push(LayerType::Arp, &data[..hlen], &data[hlen..])
    }

    fn handle_ipv4(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let ipv4 = Ipv4Packet::new(data).ok_or_else(|| truncated(LayerType::Ipv4, data))?;
        let hlen = ipv4.get_header_length() as usize * 4;
        if hlen < Ipv4Packet::minimum_packet_size() {
            return Err(DecodeError::Invalid {
                layer: LayerType::Ipv4,
                reason: "header length below minimum",
            });
        }
        if hlen > data.len() {
            return Err(truncated(LayerType::Ipv4, data));
        }
        // remove padding, but tolerate a zero total length (TSO)
        let total_length = ipv4.get_total_length() as usize;
        let end = if total_length < hlen {
            data.len()
        } else {
            total_length.min(data.len())
        };
        let payload = &data[hlen..end];
        self.push(LayerType::Ipv4, &data[..hlen], payload)?;

        let more_fragments = ipv4.get_flags() & Ipv4Flags::MoreFragments != 0;
        if more_fragments || ipv4.get_fragment_offset() != 0 {
            return self.push(LayerType::Fragment, payload, &[]);
        }
        self.handle_ip_proto(LayerType::Ipv4, ipv4.get_next_level_protocol(), payload)
    }

    fn handle_ipv6(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let ipv6 = Ipv6Packet::new(data).ok_or_else(|| truncated(LayerType::Ipv6, data))?;
        let hlen = Ipv6Packet::minimum_packet_size();
        let payload_length = ipv6.get_payload_length() as usize;
        // a zero payload length is used by jumbograms
        let end = if payload_length == 0 {
            data.len()
        } else {
            (hlen + payload_length).min(data.len())
        };
        let payload = &data[hlen..end];
        self.push(LayerType::Ipv6, &data[..hlen], payload)?;
        self.handle_ip_proto(LayerType::Ipv6, ipv6.get_next_header(), payload)
    }

    fn handle_ip_proto(
        &mut self,
        from: LayerType,
        proto: IpNextHeaderProtocol,
        data: &[u8],
    ) -> Result<(), DecodeError> {
        match proto {
            IpNextHeaderProtocols::Tcp => self.handle_tcp(data),
            IpNextHeaderProtocols::Udp => self.handle_udp(data),
            IpNextHeaderProtocols::Icmp => self.handle_icmp(data),
            IpNextHeaderProtocols::Icmpv6 => self.handle_icmpv6(data),
            IpNextHeaderProtocols::Gre => self.handle_gre(data),
            IpNextHeaderProtocols::Ipv4 => self.handle_ipv4(data),
            IpNextHeaderProtocols::Ipv6 => self.handle_ipv6(data),
            _ => Err(DecodeError::UnsupportedProtocol {
                layer: from,
                proto: u16::from(proto.0),
            }),
        }
    }

    fn handle_tcp(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let tcp = TcpPacket::new(data).ok_or_else(|| truncated(LayerType::Tcp, data))?;
        let hlen = tcp.get_data_offset() as usize * 4;
        if hlen < TcpPacket::minimum_packet_size() {
            return Err(DecodeError::Invalid {
                layer: LayerType::Tcp,
                reason: "data offset below minimum",
            });
        }
        if hlen > data.len() {
            return Err(truncated(LayerType::Tcp, data));
        }
        self.push(LayerType::Tcp, &data[..hlen], &data[hlen..])?;
        self.handle_payload(&data[hlen..])
    }

    fn handle_udp(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let udp = UdpPacket::new(data).ok_or_else(|| truncated(LayerType::Udp, data))?;
        let hlen = UdpPacket::minimum_packet_size();
        let length = udp.get_length() as usize;
        let end = if length < hlen {
            data.len()
        } else {
            length.min(data.len())
        };
        self.push(LayerType::Udp, &data[..hlen], &data[hlen..end])?;
        self.handle_payload(&data[hlen..end])
    }

    fn handle_icmp(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        // type, code, checksum and the 4 bytes of "rest of header"
        const HLEN: usize = 8;
        if IcmpPacket::new(data).is_none() || data.len() < HLEN {
            return Err(truncated(LayerType::Icmpv4, data));
        }
        self.push(LayerType::Icmpv4, &data[..HLEN], &data[HLEN..])?;
        self.handle_payload(&data[HLEN..])
    }

    fn handle_icmpv6(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let icmpv6 = Icmpv6Packet::new(data).ok_or_else(|| truncated(LayerType::Icmpv6, data))?;
        let hlen = Icmpv6Packet::minimum_packet_size();
        self.push(LayerType::Icmpv6, &data[..hlen], icmpv6.payload())?;
        self.handle_payload(icmpv6.payload())
    }

    fn handle_gre(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        if data.len() < 4 {
            return Err(truncated(LayerType::Gre, data));
        }
        let flags = u16::from_be_bytes([data[0], data[1]]);
        let protocol = u16::from_be_bytes([data[2], data[3]]);
        if flags & 0x0007 != 0 {
            return Err(DecodeError::Invalid {
                layer: LayerType::Gre,
                reason: "unsupported GRE version",
            });
        }
        if flags & 0x4000 != 0 {
            return Err(DecodeError::Invalid {
                layer: LayerType::Gre,
                reason: "GRE source routing is not supported",
            });
        }
        let mut hlen = 4;
        for bit in [0x8000, 0x2000, 0x1000] {
            if flags & bit != 0 {
                hlen += 4;
            }
        }
        if hlen > data.len() {
            return Err(truncated(LayerType::Gre, data));
        }
        let payload = &data[hlen..];
        self.push(LayerType::Gre, &data[..hlen], payload)?;
        if protocol == ETHERTYPE_TEB {
            self.handle_ethernet(payload)
        } else {
            self.handle_ethertype(LayerType::Gre, EtherType(protocol), payload)
        }
    }

    fn handle_payload(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        if data.is_empty() {
            return Ok(());
        }
        self.push(LayerType::Payload, data, &[])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const ARP_FRAME: &[u8] = b"\xff\xff\xff\xff\xff\xff\x00\x11\x22\x33\x44\x55\x08\x06\
        \x00\x01\x08\x00\x06\x04\x00\x01\x00\x11\x22\x33\x44\x55\xc0\xa8\x01\x01\
        \x00\x00\x00\x00\x00\x00\xc0\xa8\x01\x02";

    pub const TCP_FRAME: &[u8] = b"\x66\x77\x88\x99\xaa\xbb\x00\x11\x22\x33\x44\x55\x08\x00\
        \x45\x00\x00\x2c\x00\x01\x40\x00\x40\x06\x00\x00\xc0\xa8\x01\x01\xc0\xa8\x01\x02\
        \x30\x39\x00\x50\x00\x00\x00\x01\x00\x00\x00\x00\x50\x02\x72\x10\x00\x00\x00\x00\
        GET ";

    const VLAN_UDP_FRAME: &[u8] = b"\x66\x77\x88\x99\xaa\xbb\x00\x11\x22\x33\x44\x55\x81\x00\
        \x00\x64\x08\x00\
        \x45\x00\x00\x20\x00\x02\x00\x00\x40\x11\x00\x00\x0a\x00\x00\x01\x0a\x00\x00\x02\
        \x00\x35\xc3\x50\x00\x0c\x00\x00\
        \xde\xad\xbe\xef";

    const IPV4_FRAGMENT: &[u8] = b"\x45\x00\x00\x1c\x00\x03\x20\x00\x40\x11\x00\x00\
        \x0a\x00\x00\x01\x0a\x00\x00\x02\
        \x01\x02\x03\x04\x05\x06\x07\x08";

    fn names(decoded: &DecodedPacket) -> Vec<&'static str> {
        decoded.layers.iter().map(|l| l.name()).collect()
    }

    #[test]
    fn decode_arp() {
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, ARP_FRAME);
        assert!(decoded.is_complete());
        assert_eq!(names(&decoded), vec!["Ethernet", "ARP"]);
        assert_eq!(decoded.layers[0].contents.len(), 14);
        assert_eq!(decoded.layers[1].contents.len(), 28);
        assert!(decoded.layers[1].payload.is_empty());
    }

    #[test]
    fn decode_tcp() {
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, TCP_FRAME);
        assert!(decoded.is_complete());
        assert_eq!(names(&decoded), vec!["Ethernet", "IPv4", "TCP", "Payload"]);
        assert_eq!(decoded.layers[2].payload, b"GET ");
        assert_eq!(decoded.layers[3].contents, b"GET ");
    }

    #[test]
    fn decode_truncated_keeps_prefix() {
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, &TCP_FRAME[..44]);
        assert_eq!(names(&decoded), vec!["Ethernet", "IPv4"]);
        assert_eq!(
            decoded.error,
            Some(DecodeError::Truncated {
                layer: LayerType::Tcp,
                len: 10
            })
        );
    }

    #[test]
    fn decode_vlan_udp() {
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, VLAN_UDP_FRAME);
        assert!(decoded.is_complete());
        assert_eq!(
            names(&decoded),
            vec!["Ethernet", "Dot1Q", "IPv4", "UDP", "Payload"]
        );
        assert_eq!(decoded.layers[4].contents, b"\xde\xad\xbe\xef");
    }

    #[test]
    fn decode_unsupported_ethertype() {
        let mut frame = ARP_FRAME.to_vec();
        frame[12] = 0x88;
        frame[13] = 0xcc;
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, &frame);
        assert_eq!(names(&decoded), vec!["Ethernet"]);
        assert_eq!(
            decoded.error,
            Some(DecodeError::UnsupportedProtocol {
                layer: LayerType::Ethernet,
                proto: 0x88cc
            })
        );
    }

    #[test]
    fn decode_fragment_raw() {
        let decoded = PnetDecoder::new().decode(LinkType::Raw, IPV4_FRAGMENT);
        assert!(decoded.is_complete());
        assert_eq!(names(&decoded), vec!["IPv4", "Fragment"]);
        assert_eq!(decoded.layers[1].contents.len(), 8);
    }

    #[test]
    fn decode_null_loopback() {
        let mut frame = 2u32.to_ne_bytes().to_vec();
        frame.extend_from_slice(IPV4_FRAGMENT);
        let decoded = PnetDecoder::new().decode(LinkType::Null, &frame);
        assert_eq!(names(&decoded), vec!["Loopback", "IPv4", "Fragment"]);
    }

    #[test]
    fn decode_linux_sll() {
        let mut frame = b"\x00\x00\x00\x01\x00\x06\x00\x11\x22\x33\x44\x55\x00\x00\x08\x06".to_vec();
        frame.extend_from_slice(&ARP_FRAME[14..]);
        let decoded = PnetDecoder::new().decode(LinkType::LinuxSll, &frame);
        assert!(decoded.is_complete());
        assert_eq!(names(&decoded), vec!["Linux SLL", "ARP"]);
    }

    #[test]
    fn decode_unsupported_link_type() {
        let decoded = PnetDecoder::new().decode(LinkType::Other(147), TCP_FRAME);
        assert!(decoded.layers.is_empty());
        assert_eq!(
            decoded.error,
            Some(DecodeError::UnsupportedLinkType(LinkType::Other(147)))
        );
    }

    #[test]
    fn decode_empty() {
        let decoded = PnetDecoder::new().decode(LinkType::Ethernet, &[]);
        assert!(decoded.layers.is_empty());
        assert!(!decoded.is_complete());
    }
}

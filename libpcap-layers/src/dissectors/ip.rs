use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;

use super::{put, LayerDissector};
use crate::fields::Fields;
use crate::layer::{Layer, LayerType};

pub struct Ipv4Dissector;

impl LayerDissector for Ipv4Dissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Ipv4
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let ipv4 = Ipv4Packet::new(&layer.contents)?;
        let mut fields = Fields::new();
        put(&mut fields, "Version", ipv4.get_version());
        put(&mut fields, "IHL", ipv4.get_header_length());
        put(&mut fields, "TOS", (ipv4.get_dscp() << 2) | ipv4.get_ecn());
        put(&mut fields, "Length", ipv4.get_total_length());
        put(&mut fields, "Id", ipv4.get_identification());
        put(&mut fields, "Flags", ipv4.get_flags());
        put(&mut fields, "FragOffset", ipv4.get_fragment_offset());
        put(&mut fields, "TTL", ipv4.get_ttl());
        put(&mut fields, "Protocol", ipv4.get_next_level_protocol().0);
        put(&mut fields, "Checksum", ipv4.get_checksum());
        put(&mut fields, "SrcIP", ipv4.get_source());
        put(&mut fields, "DstIP", ipv4.get_destination());
        put(&mut fields, "Options", &layer.contents[Ipv4Packet::minimum_packet_size()..]);
        Some(fields)
    }
}

pub struct Ipv6Dissector;

impl LayerDissector for Ipv6Dissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Ipv6
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let ipv6 = Ipv6Packet::new(&layer.contents)?;
        let mut fields = Fields::new();
        put(&mut fields, "Version", ipv6.get_version());
        put(&mut fields, "TrafficClass", ipv6.get_traffic_class());
        put(&mut fields, "FlowLabel", ipv6.get_flow_label());
        put(&mut fields, "Length", ipv6.get_payload_length());
        put(&mut fields, "NextHeader", ipv6.get_next_header().0);
        put(&mut fields, "HopLimit", ipv6.get_hop_limit());
        put(&mut fields, "SrcIP", ipv6.get_source());
        put(&mut fields, "DstIP", ipv6.get_destination());
        Some(fields)
    }
}

const GRE_CHECKSUM: u16 = 0x8000;
const GRE_ROUTING: u16 = 0x4000;
const GRE_KEY: u16 = 0x2000;
const GRE_SEQ: u16 = 0x1000;
const GRE_STRICT_ROUTE: u16 = 0x0800;

pub struct GreDissector;

impl LayerDissector for GreDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Gre
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let data = &layer.contents;
        let read_u16 = |offset: usize| -> Option<u16> {
            let b = data.get(offset..offset + 2)?;
            Some(u16::from_be_bytes([b[0], b[1]]))
        };
        let read_u32 = |offset: usize| -> Option<u32> {
            let b = data.get(offset..offset + 4)?;
            Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        };
        let flags = read_u16(0)?;
        let mut fields = Fields::new();
        put(&mut fields, "ChecksumPresent", flags & GRE_CHECKSUM != 0);
        put(&mut fields, "RoutingPresent", flags & GRE_ROUTING != 0);
        put(&mut fields, "KeyPresent", flags & GRE_KEY != 0);
        put(&mut fields, "SeqPresent", flags & GRE_SEQ != 0);
        put(&mut fields, "StrictSourceRoute", flags & GRE_STRICT_ROUTE != 0);
        put(&mut fields, "RecursionControl", ((flags >> 8) & 0x7) as u8);
        put(&mut fields, "Flags", ((flags >> 3) & 0x1f) as u8);
        put(&mut fields, "Version", (flags & 0x7) as u8);
        put(&mut fields, "Protocol", read_u16(2)?);
        let mut offset = 4;
        if flags & (GRE_CHECKSUM | GRE_ROUTING) != 0 {
            put(&mut fields, "Checksum", read_u16(offset)?);
            put(&mut fields, "Offset", read_u16(offset + 2)?);
            offset += 4;
        }
        if flags & GRE_KEY != 0 {
            put(&mut fields, "Key", read_u32(offset)?);
            offset += 4;
        }
        if flags & GRE_SEQ != 0 {
            put(&mut fields, "Seq", read_u32(offset)?);
        }
        Some(fields)
    }
}

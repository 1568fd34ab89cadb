use pnet_packet::icmp::IcmpPacket;
use pnet_packet::icmpv6::Icmpv6Packet;
use pnet_packet::tcp::TcpPacket;
use pnet_packet::udp::UdpPacket;

use super::{put, LayerDissector};
use crate::fields::Fields;
use crate::layer::{Layer, LayerType};

const TCP_FLAGS: [(&str, u8); 8] = [
    ("FIN", 0x01),
    ("SYN", 0x02),
    ("RST", 0x04),
    ("PSH", 0x08),
    ("ACK", 0x10),
    ("URG", 0x20),
    ("ECE", 0x40),
    ("CWR", 0x80),
];

pub struct TcpDissector;

impl LayerDissector for TcpDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Tcp
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let tcp = TcpPacket::new(&layer.contents)?;
        let data = &layer.contents;
        let mut fields = Fields::new();
        put(&mut fields, "SrcPort", tcp.get_source());
        put(&mut fields, "DstPort", tcp.get_destination());
        put(&mut fields, "Seq", tcp.get_sequence());
        put(&mut fields, "Ack", tcp.get_acknowledgement());
        put(&mut fields, "DataOffset", tcp.get_data_offset());
        for (name, mask) in TCP_FLAGS {
            put(&mut fields, name, data[13] & mask != 0);
        }
        put(&mut fields, "NS", data[12] & 0x01 != 0);
        put(&mut fields, "Window", tcp.get_window());
        put(&mut fields, "Checksum", tcp.get_checksum());
        put(&mut fields, "Urgent", tcp.get_urgent_ptr());
        put(&mut fields, "Options", &data[TcpPacket::minimum_packet_size()..]);
        Some(fields)
    }
}

pub struct UdpDissector;

impl LayerDissector for UdpDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Udp
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let udp = UdpPacket::new(&layer.contents)?;
        let mut fields = Fields::new();
        put(&mut fields, "SrcPort", udp.get_source());
        put(&mut fields, "DstPort", udp.get_destination());
        put(&mut fields, "Length", udp.get_length());
        put(&mut fields, "Checksum", udp.get_checksum());
        Some(fields)
    }
}

fn icmpv4_type_name(icmp_type: u8) -> Option<&'static str> {
    let name = match icmp_type {
        0 => "EchoReply",
        3 => "DestinationUnreachable",
        4 => "SourceQuench",
        5 => "Redirect",
        8 => "EchoRequest",
        9 => "RouterAdvertisement",
        10 => "RouterSolicitation",
        11 => "TimeExceeded",
        12 => "ParameterProblem",
        13 => "TimestampRequest",
        14 => "TimestampReply",
        _ => return None,
    };
    Some(name)
}

fn icmpv6_type_name(icmp_type: u8) -> Option<&'static str> {
    let name = match icmp_type {
        1 => "DestinationUnreachable",
        2 => "PacketTooBig",
        3 => "TimeExceeded",
        4 => "ParameterProblem",
        128 => "EchoRequest",
        129 => "EchoReply",
        133 => "RouterSolicitation",
        134 => "RouterAdvertisement",
        135 => "NeighborSolicitation",
        136 => "NeighborAdvertisement",
        137 => "Redirect",
        _ => return None,
    };
    Some(name)
}

fn type_code_string(name: Option<&str>, icmp_type: u8, code: u8) -> String {
    match name {
        Some(name) if code == 0 => name.to_owned(),
        Some(name) => format!("{name}(code {code})"),
        None => format!("{icmp_type}({code})"),
    }
}

pub struct Icmpv4Dissector;

impl LayerDissector for Icmpv4Dissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Icmpv4
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let icmp = IcmpPacket::new(&layer.contents)?;
        let data = layer.contents.get(..8)?;
        let icmp_type = icmp.get_icmp_type().0;
        let code = icmp.get_icmp_code().0;
        let mut fields = Fields::new();
        put(
            &mut fields,
            "TypeCode",
            type_code_string(icmpv4_type_name(icmp_type), icmp_type, code),
        );
        put(&mut fields, "Type", icmp_type);
        put(&mut fields, "Code", code);
        put(&mut fields, "Checksum", icmp.get_checksum());
        put(&mut fields, "Id", u16::from_be_bytes([data[4], data[5]]));
        put(&mut fields, "Seq", u16::from_be_bytes([data[6], data[7]]));
        Some(fields)
    }
}

pub struct Icmpv6Dissector;

impl LayerDissector for Icmpv6Dissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Icmpv6
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let icmpv6 = Icmpv6Packet::new(&layer.contents)?;
        let icmp_type = icmpv6.get_icmpv6_type().0;
        let code = icmpv6.get_icmpv6_code().0;
        let mut fields = Fields::new();
        put(
            &mut fields,
            "TypeCode",
            type_code_string(icmpv6_type_name(icmp_type), icmp_type, code),
        );
        put(&mut fields, "Type", icmp_type);
        put(&mut fields, "Code", code);
        put(&mut fields, "Checksum", icmpv6.get_checksum());
        Some(fields)
    }
}

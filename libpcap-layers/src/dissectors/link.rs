use pnet_packet::arp::ArpPacket;
use pnet_packet::ethernet::EthernetPacket;
use pnet_packet::vlan::VlanPacket;

use super::{put, LayerDissector};
use crate::fields::Fields;
use crate::layer::{Layer, LayerType};
use crate::sll::SllPacket;

pub struct EthernetDissector;

impl LayerDissector for EthernetDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Ethernet
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let eth = EthernetPacket::new(&layer.contents)?;
        let data = &layer.contents;
        let mut fields = Fields::new();
        put(&mut fields, "SrcMAC", &data[6..12]);
        put(&mut fields, "DstMAC", &data[0..6]);
        put(&mut fields, "EthernetType", eth.get_ethertype().0);
        // only set for 802.3 frames, which are not decoded
        put(&mut fields, "Length", 0u16);
        Some(fields)
    }
}

pub struct Dot1QDissector;

impl LayerDissector for Dot1QDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Dot1Q
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let vlan = VlanPacket::new(&layer.contents)?;
        let mut fields = Fields::new();
        put(&mut fields, "Priority", layer.contents[0] >> 5);
        put(&mut fields, "DropEligible", vlan.get_drop_eligible_indicator() != 0);
        put(&mut fields, "VLANIdentifier", vlan.get_vlan_identifier());
        put(&mut fields, "Type", vlan.get_ethertype().0);
        Some(fields)
    }
}

pub struct ArpDissector;

impl LayerDissector for ArpDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Arp
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let arp = ArpPacket::new(&layer.contents)?;
        let hlen = arp.get_hw_addr_len() as usize;
        let plen = arp.get_proto_addr_len() as usize;
        let data = &layer.contents;
        if data.len() < 8 + 2 * hlen + 2 * plen {
            return None;
        }
        // addresses are read as raw bytes, their sizes are not fixed
        let sha = 8;
        let spa = sha + hlen;
        let tha = spa + plen;
        let tpa = tha + hlen;
        let mut fields = Fields::new();
        put(&mut fields, "AddrType", arp.get_hardware_type().0);
        put(&mut fields, "Protocol", arp.get_protocol_type().0);
        put(&mut fields, "HwAddressSize", hlen as u8);
        put(&mut fields, "ProtAddressSize", plen as u8);
        put(&mut fields, "Operation", arp.get_operation().0);
        put(&mut fields, "SourceHwAddress", &data[sha..spa]);
        put(&mut fields, "SourceProtAddress", &data[spa..tha]);
        put(&mut fields, "DstHwAddress", &data[tha..tpa]);
        put(&mut fields, "DstProtAddress", &data[tpa..tpa + plen]);
        Some(fields)
    }
}

pub struct LoopbackDissector;

impl LayerDissector for LoopbackDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::Loopback
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let bytes: [u8; 4] = layer.contents.get(..4)?.try_into().ok()?;
        let family = u32::from_ne_bytes(bytes);
        let family = if family > 0xffff {
            family.swap_bytes()
        } else {
            family
        };
        let mut fields = Fields::new();
        put(&mut fields, "Family", family);
        Some(fields)
    }
}

pub struct LinuxSllDissector;

impl LayerDissector for LinuxSllDissector {
    fn layer_type(&self) -> LayerType {
        LayerType::LinuxSll
    }

    fn to_fields(&self, layer: &Layer) -> Option<Fields> {
        let sll = SllPacket::new(&layer.contents)?;
        let mut fields = Fields::new();
        put(&mut fields, "PacketType", sll.get_packet_type());
        put(&mut fields, "AddrType", sll.get_link_type());
        put(&mut fields, "AddrLen", sll.get_address_len());
        put(&mut fields, "Addr", sll.get_address());
        put(&mut fields, "EthernetType", sll.get_protocol());
        Some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldValue;

    #[test]
    fn dot1q_fields() {
        let layer = Layer::new(LayerType::Dot1Q, b"\xb0\x64\x08\x00", &[]);
        let fields = Dot1QDissector.to_fields(&layer).expect("dot1q");
        assert_eq!(fields["Priority"], FieldValue::UInt(5));
        assert_eq!(fields["DropEligible"], FieldValue::Bool(true));
        assert_eq!(fields["VLANIdentifier"], FieldValue::UInt(100));
        assert_eq!(fields["Type"], FieldValue::UInt(0x0800));
    }

    #[test]
    fn loopback_family() {
        let layer = Layer::new(LayerType::Loopback, b"\x00\x00\x00\x18", &[]);
        let fields = LoopbackDissector.to_fields(&layer).expect("loopback");
        assert_eq!(fields["Family"], FieldValue::UInt(24));
        let layer = Layer::new(LayerType::Loopback, b"\x00\x00", &[]);
        assert!(LoopbackDissector.to_fields(&layer).is_none());
    }
}

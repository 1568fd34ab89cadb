use super::{Binding, BindingValue};
use crate::context::PacketContext;

/// Human-readable dump of the current packet: a header line, then one line per layer
pub fn pretty_packet(ctx: &PacketContext) -> String {
    let meta = ctx.meta();
    let mut s = format!(
        "PACKET: {} bytes, wire length {} cap length {} @ {}",
        meta.caplen, meta.origlen, meta.caplen, meta.ts
    );
    for (i, layer) in ctx.layers().iter().enumerate() {
        s.push_str(&format!(
            "\n- Layer {} ({:02} bytes) = {}",
            i + 1,
            layer.length,
            layer
        ));
    }
    s
}

/// `prettyPacket()`
pub struct PrettyPacket;

impl Binding for PrettyPacket {
    fn name(&self) -> &'static str {
        "prettyPacket"
    }

    fn arity(&self) -> usize {
        0
    }

    fn invoke(&self, ctx: &PacketContext, _args: &[String]) -> Option<BindingValue> {
        Some(BindingValue::Str(pretty_packet(ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::tests::arp_context;

    #[test]
    fn pretty_arp() {
        let s = pretty_packet(&arp_context());
        let lines: Vec<_> = s.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "PACKET: 42 bytes, wire length 60 cap length 42 @ 1600000000.000042"
        );
        assert!(lines[1].starts_with("- Layer 1 (14 bytes) = Ethernet\t{Contents="));
        assert!(lines[2].starts_with("- Layer 2 (28 bytes) = ARP\t{"));
        assert!(lines[2].contains("Operation=1"));
    }

    #[test]
    fn pretty_empty() {
        let s = pretty_packet(&PacketContext::default());
        assert_eq!(s, "PACKET: 0 bytes, wire length 0 cap length 0 @ 0.000000");
    }
}

use base64ct::{Base64, Encoding};
use nom::HexDisplay;
use tracing::trace;

use super::{arg, Binding, BindingValue};
use crate::context::PacketContext;

/// Decode a base64 argument. Empty or invalid input gives `None`.
fn decode_arg(name: &str, input: &str) -> Option<Vec<u8>> {
    match Base64::decode_vec(input) {
        Ok(v) if !v.is_empty() => Some(v),
        Ok(_) => None,
        Err(e) => {
            trace!("{name}: invalid base64 input: {e}");
            None
        }
    }
}

/// `hardwareAddrStr(b64)`: format a byte string as `00:11:22:33:44:55`
pub struct HardwareAddrStr;

impl Binding for HardwareAddrStr {
    fn name(&self) -> &'static str {
        "hardwareAddrStr"
    }

    fn arity(&self) -> usize {
        1
    }

    fn invoke(&self, _ctx: &PacketContext, args: &[String]) -> Option<BindingValue> {
        let bytes = decode_arg(self.name(), arg(args, 0))?;
        let s = bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":");
        Some(BindingValue::Str(s))
    }
}

/// `hexdump(b64)`: hexadecimal and ASCII dump of a byte string
pub struct Hexdump;

impl Binding for Hexdump {
    fn name(&self) -> &'static str {
        "hexdump"
    }

    fn arity(&self) -> usize {
        1
    }

    fn invoke(&self, _ctx: &PacketContext, args: &[String]) -> Option<BindingValue> {
        let bytes = decode_arg(self.name(), arg(args, 0))?;
        let dump = bytes.to_hex(16);
        Some(BindingValue::Str(dump.trim().to_owned()))
    }
}

use base64ct::{Base64, Encoding};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Ordered field set of one layer
pub type Fields = IndexMap<String, FieldValue>;

/// Value of a layer field
///
/// Byte sequences are serialized as base64 strings (standard alphabet, padded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Bool(bool),
    UInt(u64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
    Map(Fields),
}

impl Serialize for FieldValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::UInt(u) => serializer.serialize_u64(*u),
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Bytes(b) => serializer.serialize_str(&Base64::encode_string(b)),
            FieldValue::List(l) => serializer.collect_seq(l),
            FieldValue::Map(m) => serializer.collect_map(m),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::UInt(u) => write!(f, "{u}"),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bytes(b) if b.len() <= 16 => {
                for (i, byte) in b.iter().enumerate() {
                    if i > 0 {
                        f.write_str(":")?;
                    }
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            FieldValue::Bytes(b) => write!(f, "[..{}..]", b.len()),
            FieldValue::List(l) => {
                f.write_str("[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            FieldValue::Map(m) => fmt_fields(m, f),
        }
    }
}

/// Write a field set as `{Name=value ...}`
pub fn fmt_fields(fields: &Fields, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("{")?;
    for (i, (k, v)) in fields.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{k}={v}")?;
    }
    f.write_str("}")
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

macro_rules! impl_from_uint {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(u: $t) -> Self {
                    FieldValue::UInt(u64::from(u))
                }
            }
        )*
    };
}

impl_from_uint!(u8, u16, u32, u64);

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_owned())
    }
}

impl From<&[u8]> for FieldValue {
    fn from(b: &[u8]) -> Self {
        FieldValue::Bytes(b.to_vec())
    }
}

impl From<Ipv4Addr> for FieldValue {
    fn from(ip: Ipv4Addr) -> Self {
        FieldValue::Str(ip.to_string())
    }
}

impl From<Ipv6Addr> for FieldValue {
    fn from(ip: Ipv6Addr) -> Self {
        FieldValue::Str(ip.to_string())
    }
}

impl From<Fields> for FieldValue {
    fn from(m: Fields) -> Self {
        FieldValue::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_serialize_as_base64() {
        let v = FieldValue::from(&b"\x00\x11\x22\x33\x44\x55"[..]);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"ABEiM0RV\"");
        assert_eq!(v.to_string(), "00:11:22:33:44:55");
        let long = FieldValue::Bytes(vec![0; 28]);
        assert_eq!(long.to_string(), "[..28..]");
    }

    #[test]
    fn nested_map_keeps_order() {
        let mut inner = Fields::new();
        inner.insert("Zeta".to_owned(), 1u8.into());
        inner.insert("Alpha".to_owned(), true.into());
        let mut outer = Fields::new();
        outer.insert("Options".to_owned(), FieldValue::List(vec![inner.into()]));
        assert_eq!(
            serde_json::to_string(&FieldValue::Map(outer)).unwrap(),
            r#"{"Options":[{"Zeta":1,"Alpha":true}]}"#
        );
    }
}

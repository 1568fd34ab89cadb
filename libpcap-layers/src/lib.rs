//! Protocol layer decoding and serialization
//!
//! Raw packet data is decoded into an ordered sequence of [`Layer`]s by a [`Decoder`].
//! Each layer is then turned into a field set by the [`DissectorRegistry`], and
//! the [`LayerSerializer`] produces the JSON-compatible [`SerializedPacket`].

mod decoder;
pub mod dissectors;
mod fields;
mod layer;
mod link_type;
mod serializer;
pub mod sll;

pub use decoder::*;
pub use dissectors::{DissectorRegistry, LayerDissector};
pub use fields::*;
pub use layer::*;
pub use link_type::LinkType;
pub use serializer::*;

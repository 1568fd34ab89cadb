//! Bridge between a packet stream and a user script
//!
//! Packets read from a [`CaptureSource`] are decoded, serialized and handed to the
//! rule script of a [`ScriptEngine`] by the [`EvaluationLoop`]. Scripts see the
//! current packet as the `packet` global, and through the [`bindings`].

pub mod bindings;
mod config;
mod context;
mod duration;
mod engine;
mod error;
mod eval_loop;
mod file_source;
mod packet;
mod source;

pub use config::Config;
pub use context::*;
pub use duration::Duration;
pub use engine::*;
pub use error::*;
pub use eval_loop::*;
pub use file_source::*;
pub use packet::*;
pub use source::*;

pub use libpcap_layers;
pub use pcap_parser;

use libpcap_layers::LinkType;

use crate::error::Error;
use crate::packet::Packet;

/// Common trait for packet sources
///
/// A source yields owned packets one at a time. The underlying capture handle
/// is released when the source is dropped.
pub trait CaptureSource {
    /// Link type of the packets, as reported by the capture
    fn link_type(&self) -> LinkType;

    /// Read the next packet
    ///
    /// Returns `Ok(None)` when the packet stream has ended.
    fn next_packet(&mut self) -> Result<Option<Packet>, Error>;
}

impl<S: CaptureSource + ?Sized> CaptureSource for Box<S> {
    fn link_type(&self) -> LinkType {
        (**self).link_type()
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        (**self).next_packet()
    }
}

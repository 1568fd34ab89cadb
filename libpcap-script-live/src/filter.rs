use libpcap_script::libpcap_layers::LinkType;
use libpcap_script::{CaptureSource, Error, Packet};
use pcap::{BpfProgram, Capture};
use tracing::{debug, trace};

/// Capture source applying a BPF filter to the packets of another source
///
/// Used for offline input, where the filter cannot be given to libpcap. The
/// program is compiled for the link type reported by the inner source.
pub struct BpfFilteredSource<S: CaptureSource> {
    inner: S,
    program: BpfProgram,
    filtered: u64,
}

/// DLT value expected by libpcap for a link type
fn pcap_linktype(link_type: LinkType) -> pcap::Linktype {
    match link_type {
        // LINKTYPE_RAW is not a valid DLT
        LinkType::Raw => pcap::Linktype(12),
        l => pcap::Linktype(l.dlt()),
    }
}

impl<S: CaptureSource> BpfFilteredSource<S> {
    pub fn new(inner: S, expr: &str) -> Result<Self, Error> {
        let link_type = inner.link_type();
        let cap = Capture::dead(pcap_linktype(link_type))
            .map_err(|e| Error::Capture(e.to_string()))?;
        let program = cap
            .compile(expr, true)
            .map_err(|e| Error::Config(format!("invalid capture filter '{expr}': {e}")))?;
        debug!("offline filter '{expr}' compiled for link type {link_type}");
        Ok(BpfFilteredSource {
            inner,
            program,
            filtered: 0,
        })
    }

    /// Number of packets rejected by the filter
    pub fn filtered(&self) -> u64 {
        self.filtered
    }
}

impl<S: CaptureSource> CaptureSource for BpfFilteredSource<S> {
    fn link_type(&self) -> LinkType {
        self.inner.link_type()
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        while let Some(packet) = self.inner.next_packet()? {
            if self.program.filter(&packet.data) {
                return Ok(Some(packet));
            }
            self.filtered += 1;
            trace!("packet {} rejected by filter", packet.meta.index);
        }
        debug!("offline filter: {} packets rejected", self.filtered);
        Ok(None)
    }
}

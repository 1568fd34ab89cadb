use std::fs::File;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use libpcap_layers::LinkType;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, PcapBlockOwned, PcapError};
use tracing::{debug, error, trace, warn};
use xz2::read::XzDecoder;

use crate::config::Config;
use crate::duration::Duration;
use crate::error::Error;
use crate::packet::{Packet, PacketMeta};
use crate::source::CaptureSource;

/// Information related to a network interface used for capture
#[derive(Clone, Debug)]
struct InterfaceInfo {
    link_type: LinkType,
    /// Timestamp ticks per second
    ts_unit: u64,
    ts_offset: u64,
    snaplen: u32,
}

/// Open input file, decompressing it according to its extension
///
/// `-` is the standard input.
pub fn get_reader(name: &str) -> Result<Box<dyn io::Read + Send>, Error> {
    if name == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let path = Path::new(name);
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("could not open input file '{name}': {e}")))?;
    let reader: Box<dyn io::Read + Send> = if name.ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else if name.ends_with(".xz") {
        Box::new(XzDecoder::new(file))
    } else if name.ends_with(".lz4") {
        Box::new(lz4::Decoder::new(file)?)
    } else {
        Box::new(file)
    };
    Ok(reader)
}

/// Capture source reading a pcap or pcap-ng stream
///
/// Legacy pcap and pcap-ng (sections, interface descriptions, enhanced and simple
/// packets) are supported.
pub struct PcapFileSource {
    reader: Box<dyn PcapReaderIterator>,
    interfaces: Vec<InterfaceInfo>,
    block_index: usize,
    packet_index: usize,
    last_incomplete_index: usize,
    pending: Option<Packet>,
}

impl PcapFileSource {
    /// Create a source over `input`
    ///
    /// The file header is read immediately, so a stream which is neither pcap nor
    /// pcap-ng is rejected here.
    pub fn new(input: Box<dyn io::Read + Send>, config: &Config) -> Result<Self, Error> {
        let capacity = config
            .get_usize("buffer_initial_capacity")
            .unwrap_or(128 * 1024);
        let reader = pcap_parser::create_reader(capacity, input)?;
        let mut source = PcapFileSource {
            reader,
            interfaces: Vec::new(),
            block_index: 0,
            packet_index: 0,
            last_incomplete_index: 0,
            pending: None,
        };
        source.pending = source.read_packet()?;
        debug!("pcap input: link type {}", source.link_type());
        Ok(source)
    }

    /// Open a (possibly compressed) file, see [`get_reader`]
    pub fn open(name: &str, config: &Config) -> Result<Self, Error> {
        let input = get_reader(name)?;
        PcapFileSource::new(input, config)
    }

    fn read_packet(&mut self) -> Result<Option<Packet>, Error> {
        loop {
            match self.reader.next() {
                Ok((offset, block)) => {
                    self.block_index += 1;
                    let packet = handle_block(&mut self.interfaces, &mut self.packet_index, &block);
                    self.reader.consume(offset);
                    if let Some(packet) = packet? {
                        return Ok(Some(packet));
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::Incomplete(_)) => {
                    if self.last_incomplete_index == self.block_index
                        && self.reader.reader_exhausted()
                    {
                        warn!(
                            "Could not read complete data block (block_index={})",
                            self.block_index
                        );
                        warn!("Hint: the reader buffer size may be too small, or the input file may be truncated.");
                        return Ok(None);
                    }
                    self.last_incomplete_index = self.block_index;
                    trace!("need refill");
                    self.reader.refill()?;
                }
                Err(e) => {
                    let e = e.to_owned_vec();
                    error!("error while reading: {:?}", e);
                    return Err(Error::Pcap(e));
                }
            }
        }
    }
}

impl CaptureSource for PcapFileSource {
    fn link_type(&self) -> LinkType {
        self.interfaces
            .first()
            .map(|i| i.link_type)
            .unwrap_or(LinkType::Ethernet)
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        if let Some(packet) = self.pending.take() {
            return Ok(Some(packet));
        }
        self.read_packet()
    }
}

fn packet_data(data: &[u8], caplen: usize) -> Vec<u8> {
    // pcap-ng block data is padded to 32 bits
    data[..caplen.min(data.len())].to_vec()
}

fn handle_block(
    interfaces: &mut Vec<InterfaceInfo>,
    packet_index: &mut usize,
    block: &PcapBlockOwned,
) -> Result<Option<Packet>, Error> {
    let (meta, data) = match block {
        PcapBlockOwned::LegacyHeader(hdr) => {
            let ts_unit = if hdr.is_nanosecond_precision() {
                1_000_000_000
            } else {
                1_000_000
            };
            let if_info = InterfaceInfo {
                link_type: LinkType::from_dlt(hdr.network.0),
                ts_unit,
                ts_offset: 0,
                snaplen: hdr.snaplen,
            };
            trace!("Legacy pcap, link type: {}", if_info.link_type);
            *interfaces = vec![if_info];
            return Ok(None);
        }
        PcapBlockOwned::Legacy(b) => {
            let if_info = interfaces
                .first()
                .ok_or_else(|| Error::Capture("packet found before pcap header".to_owned()))?;
            *packet_index += 1;
            let meta = PacketMeta {
                index: *packet_index,
                ts: Duration::from_frac(b.ts_sec, b.ts_usec, if_info.ts_unit),
                link_type: if_info.link_type,
                caplen: b.caplen,
                origlen: b.origlen,
            };
            (meta, packet_data(b.data, b.caplen as usize))
        }
        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
            // reset section-related variables
            interfaces.clear();
            return Ok(None);
        }
        PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
            let ts_unit = match pcap_parser::build_ts_resolution(idb.if_tsresol) {
                Some(unit) => unit,
                None => {
                    warn!("invalid timestamp resolution {}, using microseconds", idb.if_tsresol);
                    1_000_000
                }
            };
            let if_info = InterfaceInfo {
                link_type: LinkType::from_dlt(idb.linktype.0),
                ts_unit,
                ts_offset: idb.if_tsoffset as u64,
                snaplen: idb.snaplen,
            };
            trace!("pcap-ng interface {}, link type: {}", interfaces.len(), if_info.link_type);
            interfaces.push(if_info);
            return Ok(None);
        }
        PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
            let if_info = interfaces.get(epb.if_id as usize).ok_or_else(|| {
                Error::Capture(format!("packet refers to unknown interface {}", epb.if_id))
            })?;
            *packet_index += 1;
            let (ts_sec, ts_frac) = pcap_parser::build_ts(
                epb.ts_high,
                epb.ts_low,
                if_info.ts_offset,
                if_info.ts_unit,
            );
            let meta = PacketMeta {
                index: *packet_index,
                ts: Duration::from_frac(ts_sec, ts_frac, if_info.ts_unit),
                link_type: if_info.link_type,
                caplen: epb.caplen,
                origlen: epb.origlen,
            };
            (meta, packet_data(epb.data, epb.caplen as usize))
        }
        PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
            let if_info = interfaces
                .first()
                .ok_or_else(|| Error::Capture("packet found before interface description".to_owned()))?;
            *packet_index += 1;
            let mut caplen = spb.origlen;
            if if_info.snaplen > 0 {
                caplen = caplen.min(if_info.snaplen);
            }
            let data = packet_data(spb.data, caplen as usize);
            let meta = PacketMeta {
                index: *packet_index,
                ts: Duration::default(),
                link_type: if_info.link_type,
                caplen: data.len() as u32,
                origlen: spb.origlen,
            };
            (meta, data)
        }
        _ => {
            trace!("ignoring block");
            return Ok(None);
        }
    };
    trace!("    time  : {}", meta.ts);
    Ok(Some(Packet::new(meta, data)))
}

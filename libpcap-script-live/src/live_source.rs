use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use libpcap_script::libpcap_layers::LinkType;
use libpcap_script::{CaptureSource, Config, Duration, Error, Packet, PacketMeta};
use pcap::{Active, Capture, Precision};
use tracing::{debug, error, info, trace};

fn capture_error(e: pcap::Error) -> Error {
    Error::Capture(e.to_string())
}

/// Capture source reading packets from a network interface
///
/// The capture handle is non-blocking: when no packet is available, the source
/// sleeps (`live.sleep` microseconds) and polls again, until the running flag is
/// cleared.
pub struct PcapLiveSource {
    cap: Capture<Active>,
    link_type: LinkType,
    precision: Precision,
    sleep_interval: u64,
    running: Arc<AtomicBool>,
    packet_index: usize,
}

impl PcapLiveSource {
    pub fn new(interface_name: &str, config: &Config) -> Result<Self, Error> {
        let interfaces = match pcap::Device::list() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                error!("Could not list network interfaces: {e:?}");
                error!("Are you running with root privileges (CAP_NET_RAW)?");
                return Err(capture_error(e));
            }
        };

        let immediate = config.get_bool("live.immediate").unwrap_or(false);
        let precision = match config.get("live.precision") {
            None | Some("micro") => Precision::Micro,
            Some("nano") => Precision::Nano,
            Some(p) => {
                return Err(Error::Config(format!(
                    "invalid timestamp precision '{p}' (expected 'micro' or 'nano')"
                )))
            }
        };
        let promisc = config.get_bool("live.promisc").unwrap_or(false);
        let snaplen = config.get_usize("live.snaplen").unwrap_or(65536);
        let snaplen = i32::try_from(snaplen)
            .map_err(|_| Error::Config(format!("invalid snapshot length {snaplen}")))?;
        let sleep_interval = config.get_usize("live.sleep").unwrap_or(500) as u64;

        let dev = interfaces
            .into_iter()
            .find(|iface| iface.name == interface_name)
            .ok_or_else(|| Error::Config(format!("capture interface '{interface_name}' not found")))?;
        let cap = Capture::from_device(dev)
            .map_err(capture_error)?
            .immediate_mode(immediate)
            .promisc(promisc)
            .precision(precision)
            .snaplen(snaplen);

        let mut cap = cap.open().map_err(capture_error)?;
        if let Some(filter) = config.get("live.filter") {
            cap.filter(filter, true)
                .map_err(|e| Error::Config(format!("invalid capture filter '{filter}': {e}")))?;
            debug!("Live mode: filter '{filter}' applied");
        }
        let cap = cap.setnonblock().map_err(capture_error)?;

        let link_type = LinkType::from_dlt(cap.get_datalink().0);
        info!(
            "Live mode: capturing on {interface_name} (link type {link_type}, snaplen {snaplen}, promisc {promisc}, immediate {immediate})"
        );

        Ok(PcapLiveSource {
            cap,
            link_type,
            precision,
            sleep_interval,
            running: Arc::new(AtomicBool::new(true)),
            packet_index: 0,
        })
    }

    /// Stop waiting for packets when `running` is cleared
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }
}

impl CaptureSource for PcapLiveSource {
    fn link_type(&self) -> LinkType {
        self.link_type
    }

    fn next_packet(&mut self) -> Result<Option<Packet>, Error> {
        while self.running.load(Ordering::SeqCst) {
            match self.cap.next_packet() {
                Ok(packet) => {
                    self.packet_index += 1;
                    let header = packet.header;
                    let ts_sec = header.ts.tv_sec as u32;
                    let ts_frac = header.ts.tv_usec as u32;
                    let ts = match self.precision {
                        Precision::Micro => Duration::new(ts_sec, ts_frac),
                        Precision::Nano => Duration::from_frac(ts_sec, ts_frac, 1_000_000_000),
                    };
                    let meta = PacketMeta {
                        index: self.packet_index,
                        ts,
                        link_type: self.link_type,
                        caplen: header.caplen,
                        origlen: header.len,
                    };
                    trace!("Live: receiving packet {}", self.packet_index);
                    return Ok(Some(Packet::new(meta, packet.data.to_vec())));
                }
                Err(pcap::Error::TimeoutExpired) => {
                    thread::sleep(StdDuration::from_micros(self.sleep_interval));
                }
                Err(pcap::Error::NoMorePackets) => return Ok(None),
                Err(e) => {
                    debug!("Live mode: getting next packet failed: {e:?}");
                    return Err(capture_error(e));
                }
            }
        }
        debug!("Live mode: stopped");
        Ok(None)
    }
}

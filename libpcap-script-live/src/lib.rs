//! Capture sources over libpcap: network interfaces, and BPF filtering of
//! offline input

use std::net::IpAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use libpcap_script::{CaptureSource, Config, Error, PcapFileSource};
use tracing::debug;

mod filter;
mod live_source;

pub use filter::BpfFilteredSource;
pub use live_source::PcapLiveSource;

/// A capture interface, as reported by libpcap
#[derive(Clone, Debug)]
pub struct InterfaceInfo {
    pub name: String,
    pub description: Option<String>,
    pub addresses: Vec<IpAddr>,
}

/// List the interfaces available for capture
pub fn list_interfaces() -> Result<Vec<InterfaceInfo>, Error> {
    let devices = pcap::Device::list().map_err(|e| Error::Capture(e.to_string()))?;
    let v = devices
        .into_iter()
        .map(|d| InterfaceInfo {
            name: d.name,
            description: d.desc,
            addresses: d.addresses.iter().map(|a| a.addr).collect(),
        })
        .collect();
    Ok(v)
}

/// Open a capture on `interface_name`, configured by the `live.*` keys
pub fn create_source_live(
    interface_name: &str,
    config: &Config,
    running: Arc<AtomicBool>,
) -> Result<Box<dyn CaptureSource>, Error> {
    let source = PcapLiveSource::new(interface_name, config)?.with_running_flag(running);
    Ok(Box::new(source))
}

/// Open a pcap/pcap-ng file, applying the `live.filter` expression if set
pub fn create_source_file(name: &str, config: &Config) -> Result<Box<dyn CaptureSource>, Error> {
    let source = PcapFileSource::open(name, config)?;
    match config.get("live.filter") {
        Some(expr) => {
            debug!("applying filter '{expr}' to {name}");
            Ok(Box::new(BpfFilteredSource::new(source, expr)?))
        }
        None => Ok(Box::new(source)),
    }
}

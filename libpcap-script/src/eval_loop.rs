use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use libpcap_layers::{Decoder, LayerSerializer, LinkType, PnetDecoder};
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::context::SharedContext;
use crate::engine::{Rule, ScriptEngine};
use crate::error::Error;
use crate::source::CaptureSource;

/// What to do when the rule script fails on a packet
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop processing
    #[default]
    Fatal,
    /// Log the error and continue with the next packet
    Skip,
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fatal" => Ok(ErrorPolicy::Fatal),
            "skip" => Ok(ErrorPolicy::Skip),
            _ => Err(format!("invalid error policy '{s}' (expected 'fatal' or 'skip')")),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorPolicy::Fatal => f.write_str("fatal"),
            ErrorPolicy::Skip => f.write_str("skip"),
        }
    }
}

/// Counters of one run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub packets: u64,
    /// Packets which could not be fully decoded
    pub decode_errors: u64,
    /// Rule failures skipped by the `skip` policy
    pub script_errors: u64,
}

/// Drives packets from a capture source to the rule script
///
/// Packets are processed one at a time, in arrival order: decode, update the
/// shared context, serialize, and run the rule.
pub struct EvaluationLoop {
    source: Box<dyn CaptureSource>,
    decoder: Box<dyn Decoder>,
    serializer: LayerSerializer,
    engine: ScriptEngine,
    rule: Rule,
    policy: ErrorPolicy,
    link_type: Option<LinkType>,
    running: Arc<AtomicBool>,
}

impl EvaluationLoop {
    /// Build a loop with the default decoder and serializer
    ///
    /// `engine` must be initialized, and `rule` compiled by it.
    pub fn new(source: Box<dyn CaptureSource>, engine: ScriptEngine, rule: Rule) -> Self {
        EvaluationLoop {
            source,
            decoder: Box::new(PnetDecoder::new()),
            serializer: LayerSerializer::default(),
            engine,
            rule,
            policy: ErrorPolicy::default(),
            link_type: None,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Read the error policy and link type override from configuration
    pub fn configure(mut self, config: &Config) -> Result<Self, Error> {
        if let Some(s) = config.get("script.on_error") {
            self.policy = s.parse().map_err(Error::Config)?;
        }
        if let Some(s) = config.get("link_type") {
            self.link_type = Some(s.parse().map_err(Error::Config)?);
        }
        Ok(self)
    }

    pub fn with_decoder(mut self, decoder: Box<dyn Decoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_serializer(mut self, serializer: LayerSerializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Decode all packets with `link_type`, ignoring the one reported by the source
    pub fn with_link_type(mut self, link_type: Option<LinkType>) -> Self {
        self.link_type = link_type;
        self
    }

    /// Use a shared flag to stop the loop. Processing stops when the flag is cleared.
    pub fn with_running_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    fn context(&self) -> SharedContext {
        self.engine.context().clone()
    }

    /// Main function: process packets until the end of the stream, the running
    /// flag is cleared, or a fatal error occurs
    ///
    /// The source is consumed, and released on every exit path.
    pub fn run(mut self) -> Result<LoopStats, Error> {
        let mut stats = LoopStats::default();
        let context = self.context();
        match self.link_type {
            Some(l) => info!(
                "starting evaluation loop (link type {} overridden to {})",
                self.source.link_type(),
                l
            ),
            None => info!(
                "starting evaluation loop (link type {})",
                self.source.link_type()
            ),
        }
        let res = loop {
            if !self.running.load(Ordering::SeqCst) {
                info!("evaluation loop interrupted");
                break Ok(());
            }
            let packet = match self.source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break Ok(()),
                Err(e) => {
                    error!("capture failed: {e}");
                    break Err(e);
                }
            };
            stats.packets += 1;
            let mut meta = packet.meta;
            if let Some(l) = self.link_type {
                meta.link_type = l;
            }
            trace!("packet {}: {} bytes", meta.index, packet.data.len());
            let decoded = self.decoder.decode(meta.link_type, &packet.data);
            if let Some(ref e) = decoded.error {
                debug!("packet {}: decoding stopped: {e}", meta.index);
                stats.decode_errors += 1;
            }
            let layers = self.serializer.dissect(&decoded.layers);
            let serialized = self.serializer.serialize(&layers);
            debug!(
                "packet {}: {} layers [{}]",
                meta.index,
                layers.len(),
                layers.iter().map(|l| l.name()).collect::<Vec<_>>().join(", ")
            );
            context.borrow_mut().update(meta, layers);
            if let Err(e) = self.engine.run_per_packet(&serialized, &self.rule) {
                match self.policy {
                    ErrorPolicy::Fatal => {
                        error!("packet {}: rule failed: {e}", meta.index);
                        break Err(Error::Script(e));
                    }
                    ErrorPolicy::Skip => {
                        warn!("packet {}: rule failed, skipping: {e}", meta.index);
                        stats.script_errors += 1;
                    }
                }
            }
        };
        self.engine.terminate();
        info!(
            "evaluation loop done: {} packets, {} decode errors, {} rule errors",
            stats.packets, stats.decode_errors, stats.script_errors
        );
        res.map(|_| stats)
    }
}

use std::io;

use pcap_parser::PcapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration, interface, filter or script file
    #[error("configuration error: {0}")]
    Config(String),
    /// Capture source failure
    #[error("capture error: {0}")]
    Capture(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("pcap parsing error: {0:?}")]
    Pcap(PcapError<&'static [u8]>),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

impl From<PcapError<&[u8]>> for Error {
    fn from(e: PcapError<&[u8]>) -> Self {
        Error::Pcap(e.to_owned_vec())
    }
}

/// Errors raised by the script engine
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("script engine is not initialized")]
    NotInitialized,
    #[error("invalid script engine state: {0}")]
    InvalidState(&'static str),
    #[error("script parse error: {0}")]
    Parse(String),
    #[error("script runtime error: {0}")]
    Runtime(String),
    #[error("could not convert packet for script: {0}")]
    Marshal(String),
    #[error("script engine is terminated")]
    Terminated,
}

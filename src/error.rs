//! Unified error types for the chime firmware.
//!
//! Every subsystem owns a small `Copy` error enum; all of them convert into
//! the top-level [`Error`] so startup code can funnel failures through one
//! type. The controllers themselves never propagate these upward: they turn
//! them into state resets plus an [`AppEvent`](crate::app::events::AppEvent).

use core::fmt;

use crate::adapters::wifi::ConnectivityError;
use crate::app::ports::ConfigError;
use crate::update::OtaError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ringtone store (flash filesystem) failed.
    Storage(StorageError),
    /// Decoding or audio output failed.
    Audio(AudioError),
    /// The command bus between HTTP handlers and the loop failed.
    Comms(CommsError),
    /// Station or access point mode failed.
    Connectivity(ConnectivityError),
    Update(OtaError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Audio(e) => write!(f, "audio: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Connectivity(e) => write!(f, "wifi: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The filesystem partition could not be mounted.
    MountFailed,
    /// The requested asset does not exist.
    NotFound,
    /// Opening the asset for read or write failed.
    OpenFailed,
    /// A read on an open handle failed.
    ReadFailed,
    /// A write on an open handle failed.
    WriteFailed,
    /// Removing the asset failed (the asset existed).
    DeleteFailed,
    /// The partition has no space left.
    Full,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MountFailed => write!(f, "filesystem mount failed"),
            Self::NotFound => write!(f, "asset not found"),
            Self::OpenFailed => write!(f, "open failed"),
            Self::ReadFailed => write!(f, "read failed"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::DeleteFailed => write!(f, "delete failed"),
            Self::Full => write!(f, "storage full"),
        }
    }
}

impl core::error::Error for StorageError {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Audio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// The container header is missing or truncated.
    MalformedHeader,
    /// The stream is valid RIFF but not a PCM layout we can play.
    UnsupportedFormat,
    /// Reading the source failed mid-stream.
    Source(StorageError),
    /// The output device rejected the configuration or the samples.
    OutputFailed,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedHeader => write!(f, "malformed WAV header"),
            Self::UnsupportedFormat => write!(f, "unsupported sample format"),
            Self::Source(e) => write!(f, "source: {e}"),
            Self::OutputFailed => write!(f, "audio output failed"),
        }
    }
}

impl core::error::Error for AudioError {}

impl From<StorageError> for AudioError {
    fn from(e: StorageError) -> Self {
        Self::Source(e)
    }
}

impl From<AudioError> for Error {
    fn from(e: AudioError) -> Self {
        Self::Audio(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The main loop did not answer a request in time.
    BusTimeout,
    /// The request queue towards the main loop is full.
    BusFull,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusTimeout => write!(f, "command bus timeout"),
            Self::BusFull => write!(f, "command bus full"),
        }
    }
}

impl core::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Update(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

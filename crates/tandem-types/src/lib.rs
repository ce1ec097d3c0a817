//! Shared models and contracts for the tandem recorder.
//!
//! This crate defines the vocabulary the other workspace members speak:
//! session configuration and state, audio device descriptions, level and
//! diagnostic snapshots, recording results, the error taxonomy, and the
//! traits that platform backends (`CaptureProvider`), host applications
//! (`CaptureDelegate`), and cipher implementations (`ChunkEncryptor`)
//! plug into.

mod audio;
mod config;
mod contract;
mod error;
mod result;
mod state;

pub use audio::{
    AudioChannel, AudioLevels, AudioSource, AudioTrack, AudioTrackType, AudioTransportType,
    CaptureSessionDiagnostics,
};
pub use config::CaptureConfiguration;
pub use contract::{AudioBufferCallback, CaptureDelegate, CaptureProvider, ChunkEncryptor, PcmBuffer};
pub use error::CaptureError;
pub use result::{RecordingMetadata, RecordingResult};
pub use state::CaptureState;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

//! Contracts between the session and its collaborators.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::{AudioLevels, AudioSource};
use crate::error::CaptureError;
use crate::result::RecordingResult;
use crate::state::CaptureState;
use crate::CaptureResult;

/// A buffer of PCM audio as delivered by a capture provider.
///
/// Samples are f32, interleaved when `channels > 1`. The reported
/// `sample_rate` is whatever the device claims at delivery time; on
/// renegotiating transports (Bluetooth HFP) it can change between
/// buffers of the same capture.
#[derive(Debug, Clone, Copy)]
pub struct PcmBuffer<'a> {
    pub samples: &'a [f32],
    pub sample_rate: f64,
    pub channels: u16,

    /// When the provider captured this buffer.
    pub timestamp: Instant,
}

impl PcmBuffer<'_> {
    /// Frames in this buffer (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Human-readable format description for diagnostics.
    pub fn format(&self) -> String {
        format!("{} Hz, {} ch, f32", self.sample_rate, self.channels)
    }
}

/// Callback receiving capture buffers.
///
/// Fires on an arbitrary audio thread. Implementations must be quick and
/// must never block on I/O; hand the data off and return.
pub type AudioBufferCallback = Arc<dyn Fn(PcmBuffer<'_>) + Send + Sync + 'static>;

/// A platform capture source: microphone or system-audio loopback.
///
/// Providers own their device state. They must not invoke the callback
/// after `stop` has returned, and must not keep a strong reference to
/// whatever handed them the callback.
pub trait CaptureProvider: Send + Sync {
    /// Whether this source can currently be captured.
    fn is_available(&self) -> bool;

    /// Enumerate the devices this provider can open.
    fn devices(&self) -> CaptureResult<Vec<AudioSource>>;

    /// Start capturing, delivering buffers through `callback`.
    fn start(&mut self, callback: AudioBufferCallback) -> CaptureResult<()>;

    /// Stop capturing and release device resources.
    fn stop(&mut self) -> CaptureResult<()>;
}

/// Host-side observer of a capture session.
///
/// Every method may fire on any thread, often an audio or worker thread.
/// Implementations marshal to their own UI thread and return quickly.
pub trait CaptureDelegate: Send + Sync {
    /// The session state changed.
    fn on_state_changed(&self, state: &CaptureState);

    /// Fresh level meters. Delivery is bursty: one update per provider
    /// buffer while capturing.
    fn on_levels_updated(&self, levels: AudioLevels);

    /// A non-fatal error occurred; the capture keeps running.
    fn on_error(&self, error: &CaptureError);

    /// The recording was finalized.
    fn on_finished(&self, result: &RecordingResult);
}

/// Seals audio chunks with an authenticated cipher.
///
/// The sealed box must be self-contained: everything a reader needs
/// besides the key (nonce, tag) is embedded in the returned bytes.
pub trait ChunkEncryptor: Send + Sync {
    /// Seal one chunk. For AES-256-GCM the result is
    /// `nonce (12 B) ‖ ciphertext ‖ tag (16 B)`.
    fn encrypt(&self, plaintext: &[u8]) -> CaptureResult<Vec<u8>>;

    /// Cipher identifier recorded in metadata, e.g. `"AES-256-GCM"`.
    fn algorithm(&self) -> &str;

    /// Opaque identifier of the sealing key, when the caller tracks one.
    fn key_id(&self) -> Option<String>;
}

//! Session configuration.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::contract::ChunkEncryptor;

/// Configuration for a capture session.
///
/// Immutable once a session has accepted it; start a new session to
/// record with different settings.
#[derive(Clone)]
pub struct CaptureConfiguration {
    /// Target sample rate in Hz. The session never upsamples: if the mic
    /// settles on a lower rate the output follows the mic.
    pub sample_rate: f64,

    /// Output bit depth. Supported values: 16, 24, 32.
    pub bit_depth: u16,

    /// Output channel count. Supported values: 1, 2.
    pub channels: u16,

    /// Directory recordings are written into.
    pub output_directory: PathBuf,

    /// Stop automatically once this many seconds have been captured.
    pub max_duration_secs: Option<f64>,

    /// Capture from this specific microphone instead of the default.
    pub mic_device_id: Option<String>,

    /// Capture the microphone.
    pub enable_mic_capture: bool,

    /// Capture system audio output.
    pub enable_system_capture: bool,

    /// Seal every written chunk with this cipher. When set, the output
    /// file carries the `.enc.wav` extension and no plaintext audio
    /// touches disk.
    pub encryptor: Option<Arc<dyn ChunkEncryptor>>,
}

impl CaptureConfiguration {
    /// Check the configuration against the supported parameter space.
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate <= 0.0 {
            return Err(format!("sample rate must be positive, got {}", self.sample_rate));
        }
        if ![16, 24, 32].contains(&self.bit_depth) {
            return Err(format!("unsupported bit depth: {}", self.bit_depth));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            bit_depth: 16,
            channels: 2,
            output_directory: PathBuf::from("."),
            max_duration_secs: None,
            mic_device_id: None,
            enable_mic_capture: true,
            enable_system_capture: true,
            encryptor: None,
        }
    }
}

impl fmt::Debug for CaptureConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureConfiguration")
            .field("sample_rate", &self.sample_rate)
            .field("bit_depth", &self.bit_depth)
            .field("channels", &self.channels)
            .field("output_directory", &self.output_directory)
            .field("max_duration_secs", &self.max_duration_secs)
            .field("mic_device_id", &self.mic_device_id)
            .field("enable_mic_capture", &self.enable_mic_capture)
            .field("enable_system_capture", &self.enable_system_capture)
            .field("encryptor", &self.encryptor.as_ref().map(|e| e.algorithm().to_owned()))
            .finish()
    }
}

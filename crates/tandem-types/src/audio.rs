//! Audio device descriptions, level metering, and session diagnostics.

use serde::{Deserialize, Serialize};

/// Which source a track or device belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTrackType {
    /// Microphone input.
    Mic,

    /// System audio output captured back as an input.
    System,
}

/// Channel placement of a track inside the stereo output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioChannel {
    #[serde(rename = "L")]
    Left,

    #[serde(rename = "R")]
    Right,

    /// Mixed equally into both channels.
    #[serde(rename = "C")]
    Center,

    /// Occupies both channels with its own stereo image.
    #[serde(rename = "LR")]
    Stereo,
}

/// One track of a finished recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Source of the track.
    #[serde(rename = "type")]
    pub track_type: AudioTrackType,

    /// Where the track sits in the stereo field.
    pub channel: AudioChannel,
}

/// Physical transport of an audio device.
///
/// Bluetooth transports matter to the capture pipeline: opening the mic of
/// a Bluetooth headset can drag the whole link into HFP and renegotiate
/// its sample rate mid-capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLe,
    Usb,
    Virtual,
    Unknown,
}

/// An audio source that can be offered to the user for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    /// Stable identifier understood by the owning provider.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether this is a microphone or the system output.
    pub source_type: AudioTrackType,

    /// Whether the OS considers this the default device of its kind.
    pub is_default: bool,

    /// Transport, when the provider can determine it.
    pub transport_type: Option<AudioTransportType>,
}

impl AudioSource {
    /// The synthetic entry representing system-audio capture.
    ///
    /// System output is not an enumerable device; sessions append this
    /// entry whenever the system provider reports availability.
    pub fn system_audio() -> Self {
        Self {
            id: "system-audio".into(),
            name: "System Audio".into(),
            source_type: AudioTrackType::System,
            is_default: false,
            transport_type: Some(AudioTransportType::Virtual),
        }
    }
}

/// Instantaneous audio levels, all in `[0.0, 1.0]`.
///
/// RMS values follow the most recent buffer of each source; peak values
/// are monotone non-decreasing within a capture and reset when a new
/// capture starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioLevels {
    pub mic_level: f32,
    pub system_level: f32,
    pub peak_mic_level: f32,
    pub peak_system_level: f32,
}

/// Counters describing a running capture, for debugging and support.
///
/// All counters are monotone non-decreasing within a capture and reset
/// when a new capture starts. Snapshots are cheap to take.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSessionDiagnostics {
    /// Buffers delivered by the mic provider.
    pub mic_callback_count: u64,

    /// Buffers delivered by the system provider.
    pub system_callback_count: u64,

    /// Mic samples accepted after downmix and resampling.
    pub mic_samples_total: u64,

    /// System samples accepted after resampling.
    pub system_samples_total: u64,

    /// Format of the most recent mic buffer, e.g. `"16000 Hz, 1 ch, f32"`.
    pub mic_format: String,

    /// Format of the most recent system buffer.
    pub system_format: String,

    /// PCM bytes handed to the writer so far.
    pub bytes_written: u64,

    /// Completed iterations of the mix loop.
    pub mix_cycles: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_audio_entry_is_virtual() {
        let source = AudioSource::system_audio();
        assert_eq!(source.id, "system-audio");
        assert_eq!(source.source_type, AudioTrackType::System);
        assert_eq!(source.transport_type, Some(AudioTransportType::Virtual));
        assert!(!source.is_default);
    }

    #[test]
    fn track_serializes_with_short_channel_names() {
        let track = AudioTrack {
            track_type: AudioTrackType::Mic,
            channel: AudioChannel::Center,
        };
        let json = serde_json::to_string(&track).unwrap();
        assert_eq!(json, r#"{"type":"mic","channel":"C"}"#);
    }
}

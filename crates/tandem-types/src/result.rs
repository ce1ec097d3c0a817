//! Recording results and their exportable metadata.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::{AudioChannel, AudioTrack, AudioTrackType};

/// What a completed capture session hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    /// Where the finalized file lives.
    pub file_path: PathBuf,

    /// Captured duration, pauses excluded.
    pub duration_secs: f64,

    /// Exportable description of the recording.
    pub metadata: RecordingMetadata,

    /// Lowercase hex SHA-256 of the finalized file.
    pub checksum: String,
}

/// Metadata describing a finished recording.
///
/// Serializable so hosts can ship it to a backend or store it as a
/// sidecar next to the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    /// Fresh UUID identifying this recording.
    pub id: String,

    pub duration_secs: f64,

    pub file_path: String,

    /// Lowercase hex SHA-256 of the file as written.
    pub checksum: String,

    pub is_encrypted: bool,

    /// RFC 3339 creation timestamp.
    pub created_at: String,

    /// Track layout of the stereo mix.
    pub tracks: Vec<AudioTrack>,

    /// Cipher name when the payload is encrypted, e.g. `"AES-256-GCM"`.
    pub encryption_algorithm: Option<String>,

    /// Opaque identifier of the key that sealed the payload.
    pub encryption_key_id: Option<String>,
}

impl RecordingMetadata {
    /// Metadata for the standard dual-track mix: mic in the center,
    /// system audio keeping its stereo image.
    pub fn dual_track(
        duration_secs: f64,
        file_path: &str,
        checksum: &str,
        encryption_algorithm: Option<String>,
        encryption_key_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            duration_secs,
            file_path: file_path.to_owned(),
            checksum: checksum.to_owned(),
            is_encrypted: encryption_algorithm.is_some(),
            created_at: chrono::Utc::now().to_rfc3339(),
            tracks: vec![
                AudioTrack {
                    track_type: AudioTrackType::Mic,
                    channel: AudioChannel::Center,
                },
                AudioTrack {
                    track_type: AudioTrackType::System,
                    channel: AudioChannel::Stereo,
                },
            ],
            encryption_algorithm,
            encryption_key_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dual_track_layout() {
        let meta = RecordingMetadata::dual_track(1.5, "/tmp/r.wav", "abcd", None, None);
        assert_eq!(meta.tracks.len(), 2);
        assert_eq!(meta.tracks[0].track_type, AudioTrackType::Mic);
        assert_eq!(meta.tracks[0].channel, AudioChannel::Center);
        assert_eq!(meta.tracks[1].track_type, AudioTrackType::System);
        assert_eq!(meta.tracks[1].channel, AudioChannel::Stereo);
        assert!(!meta.is_encrypted);
    }

    #[test]
    fn encrypted_metadata_records_algorithm_and_key() {
        let meta = RecordingMetadata::dual_track(
            0.5,
            "/tmp/r.enc.wav",
            "ff00",
            Some("AES-256-GCM".into()),
            Some("key-7".into()),
        );
        assert!(meta.is_encrypted);
        assert_eq!(meta.encryption_algorithm.as_deref(), Some("AES-256-GCM"));
        assert_eq!(meta.encryption_key_id.as_deref(), Some("key-7"));
    }

    #[test]
    fn ids_are_unique_per_recording() {
        let a = RecordingMetadata::dual_track(1.0, "/a.wav", "00", None, None);
        let b = RecordingMetadata::dual_track(1.0, "/a.wav", "00", None, None);
        assert_ne!(a.id, b.id);
    }
}

//! JSON metadata sidecars.

use std::fs;
use std::path::{Path, PathBuf};

use tandem_types::{CaptureError, CaptureResult, RecordingMetadata};

fn sidecar_path(recording_path: &Path) -> PathBuf {
    let mut name = recording_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".metadata.json");
    recording_path.with_file_name(name)
}

/// Write metadata as `<recording>.metadata.json` next to the recording.
pub fn write_metadata(metadata: &RecordingMetadata, recording_path: &Path) -> CaptureResult<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {e}")))?;
    fs::write(sidecar_path(recording_path), json)
        .map_err(|e| CaptureError::StorageError(format!("failed to write metadata: {e}")))
}

/// Read the metadata sidecar of a recording.
pub fn read_metadata(recording_path: &Path) -> CaptureResult<RecordingMetadata> {
    let json = fs::read_to_string(sidecar_path(recording_path))
        .map_err(|e| CaptureError::StorageError(format!("failed to read metadata: {e}")))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sidecar_keeps_full_recording_name() {
        let path = sidecar_path(Path::new("/tmp/recording_1.enc.wav"));
        assert_eq!(path, PathBuf::from("/tmp/recording_1.enc.wav.metadata.json"));
    }

    #[test]
    fn metadata_round_trips_through_disk() {
        let recording = std::env::temp_dir().join(format!(
            "tandem_meta_{}.wav",
            uuid::Uuid::new_v4()
        ));
        let metadata = RecordingMetadata::dual_track(
            12.5,
            &recording.to_string_lossy(),
            "deadbeef",
            Some("AES-256-GCM".into()),
            Some("key-1".into()),
        );

        write_metadata(&metadata, &recording).unwrap();
        let loaded = read_metadata(&recording).unwrap();
        assert_eq!(loaded, metadata);

        fs::remove_file(sidecar_path(&recording)).ok();
    }

    #[test]
    fn missing_sidecar_is_a_storage_error() {
        let missing = Path::new("/nonexistent/recording.wav");
        assert!(matches!(
            read_metadata(missing),
            Err(CaptureError::StorageError(_))
        ));
    }
}

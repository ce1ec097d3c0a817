//! Decrypting encrypted recordings back into standard WAV.

use std::fs;
use std::path::Path;

use tracing::debug;

use tandem_types::{CaptureError, CaptureResult};

use crate::crypto::GcmChunkEncryptor;
use crate::wav;

/// Opens sealed boxes produced by a
/// [`ChunkEncryptor`](tandem_types::ChunkEncryptor).
pub trait ChunkDecryptor {
    fn decrypt(&self, sealed: &[u8]) -> CaptureResult<Vec<u8>>;
}

impl ChunkDecryptor for GcmChunkEncryptor {
    fn decrypt(&self, sealed: &[u8]) -> CaptureResult<Vec<u8>> {
        GcmChunkEncryptor::decrypt(self, sealed)
    }
}

/// Decrypt the bytes of an `.enc.wav` file into a playable WAV.
///
/// Walks the `[u32 LE length][sealed box]` sequence after the plaintext
/// header, opens every box, concatenates the plaintext, and rewrites the
/// header sizes to match. The rate fields are kept as the writer
/// finalized them.
pub fn decrypt_wav_bytes(contents: &[u8], decryptor: &dyn ChunkDecryptor) -> CaptureResult<Vec<u8>> {
    if contents.len() < wav::HEADER_SIZE {
        return Err(CaptureError::EncodingFailed(format!(
            "file too short for a WAV header: {} bytes",
            contents.len()
        )));
    }
    if &contents[0..4] != b"RIFF" || &contents[8..12] != b"WAVE" {
        return Err(CaptureError::EncodingFailed("missing RIFF/WAVE magic".into()));
    }

    let mut output = contents[..wav::HEADER_SIZE].to_vec();
    let mut cursor = wav::HEADER_SIZE;
    let mut chunks = 0usize;

    while cursor < contents.len() {
        if contents.len() - cursor < 4 {
            return Err(CaptureError::EncodingFailed(
                "truncated chunk length prefix".into(),
            ));
        }
        let length =
            u32::from_le_bytes(contents[cursor..cursor + 4].try_into().unwrap()) as usize;
        cursor += 4;

        if contents.len() - cursor < length {
            return Err(CaptureError::EncodingFailed(format!(
                "chunk claims {length} bytes but only {} remain",
                contents.len() - cursor
            )));
        }
        let plaintext = decryptor.decrypt(&contents[cursor..cursor + length])?;
        output.extend_from_slice(&plaintext);
        cursor += length;
        chunks += 1;
    }

    let data_size = (output.len() - wav::HEADER_SIZE) as u32;
    output[4..8].copy_from_slice(&(36 + data_size).to_le_bytes());
    output[40..44].copy_from_slice(&data_size.to_le_bytes());

    debug!(chunks, data_size, "decrypted recording");
    Ok(output)
}

/// Read and decrypt an `.enc.wav` file from disk.
pub fn decrypt_wav_file(path: &Path, decryptor: &dyn ChunkDecryptor) -> CaptureResult<Vec<u8>> {
    let contents = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read recording: {e}")))?;
    decrypt_wav_bytes(&contents, decryptor)
}

//! Streaming WAV writer with optional per-chunk encryption.

use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use tandem_types::{CaptureConfiguration, CaptureError, CaptureResult, ChunkEncryptor};

use crate::wav;

/// Streaming WAV file writer.
///
/// Opens with placeholder header sizes, appends audio as it arrives, and
/// fixes the header up on close. With an encryptor configured, every
/// `write` becomes `[u32 LE length][sealed box]` and no plaintext audio
/// reaches disk; the 44-byte header itself stays plaintext so tooling can
/// recognize the container.
///
/// The byte counter upholds
/// `bytes_written == 44 + Σ chunk sizes`, where a chunk is either the raw
/// PCM slice or `4 + sealed box length`. A chunk that fails to seal is
/// not written and does not advance the counter.
pub struct WavWriter {
    path: PathBuf,
    encryptor: Option<Arc<dyn ChunkEncryptor>>,
    file: Option<File>,
    bytes_written: u64,
}

impl WavWriter {
    pub fn new(path: PathBuf, encryptor: Option<Arc<dyn ChunkEncryptor>>) -> Self {
        Self {
            path,
            encryptor,
            file: None,
            bytes_written: 0,
        }
    }

    /// Create the file and write the placeholder header.
    ///
    /// Creates missing parent directories. A second `open` on an
    /// already-open writer is a no-op.
    #[instrument(name = "wav_open", skip(self, config), fields(path = %self.path.display()))]
    pub fn open(&mut self, config: &CaptureConfiguration) -> CaptureResult<()> {
        if self.file.is_some() {
            debug!("writer already open");
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::StorageError(format!("failed to create output directory: {e}"))
            })?;
        }

        let file = File::create(&self.path)
            .map_err(|e| CaptureError::StorageError(format!("failed to create file: {e}")))?;
        self.file = Some(file);
        self.bytes_written = 0;

        let header = wav::encode_header(
            config.sample_rate as u32,
            config.bit_depth,
            config.channels,
            0,
        );
        self.append(&header)?;

        info!(
            sample_rate = config.sample_rate,
            channels = config.channels,
            bit_depth = config.bit_depth,
            encrypted = self.encryptor.is_some(),
            "recording file opened"
        );
        Ok(())
    }

    /// Append one chunk of PCM audio, sealing it first when encrypting.
    pub fn write(&mut self, data: &[u8]) -> CaptureResult<()> {
        if self.file.is_none() {
            return Err(CaptureError::StorageError("file is not open for writing".into()));
        }

        match self.encryptor.clone() {
            Some(encryptor) => {
                let sealed = encryptor.encrypt(data)?;
                self.append(&(sealed.len() as u32).to_le_bytes())?;
                self.append(&sealed)?;
            }
            None => self.append(data)?,
        }
        Ok(())
    }

    /// Fix up the header, close the file, and checksum it.
    ///
    /// `actual_sample_rate` rewrites the rate fields for captures where
    /// the device settled on a different rate than configured (HFP).
    /// Returns the lowercase hex SHA-256 of the finalized file.
    #[instrument(name = "wav_close", skip(self), fields(path = %self.path.display()))]
    pub fn close(
        &mut self,
        actual_sample_rate: Option<f64>,
        channels: u16,
        bit_depth: u16,
    ) -> CaptureResult<String> {
        let Some(mut file) = self.file.take() else {
            return Err(CaptureError::StorageError("file is not open".into()));
        };

        let chunk_size = (self.bytes_written - 8) as u32;
        seek_write(&mut file, wav::CHUNK_SIZE_OFFSET, &chunk_size.to_le_bytes())?;

        if let Some(rate) = actual_sample_rate {
            let rate = rate as u32;
            warn!(rate, "patching header with renegotiated sample rate");
            let mut fields = Vec::with_capacity(10);
            fields.extend_from_slice(&rate.to_le_bytes());
            fields.extend_from_slice(&wav::byte_rate(rate, channels, bit_depth).to_le_bytes());
            fields.extend_from_slice(&wav::block_align(channels, bit_depth).to_le_bytes());
            seek_write(&mut file, wav::SAMPLE_RATE_OFFSET, &fields)?;
        }

        let data_size = (self.bytes_written - wav::HEADER_SIZE as u64) as u32;
        seek_write(&mut file, wav::DATA_SIZE_OFFSET, &data_size.to_le_bytes())?;

        file.flush()
            .map_err(|e| CaptureError::StorageError(format!("flush failed: {e}")))?;
        drop(file);

        let checksum = sha256_file(&self.path)?;
        info!(bytes = self.bytes_written, checksum = %checksum, "recording file finalized");
        Ok(checksum)
    }

    /// Total bytes on disk so far, header included.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, data: &[u8]) -> CaptureResult<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| CaptureError::StorageError("file is not open".into()))?;
        file.write_all(data)
            .map_err(|e| CaptureError::StorageError(format!("write failed: {e}")))?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }
}

fn seek_write(file: &mut File, offset: u64, data: &[u8]) -> CaptureResult<()> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| CaptureError::StorageError(format!("seek failed: {e}")))?;
    file.write_all(data)
        .map_err(|e| CaptureError::StorageError(format!("header fix-up failed: {e}")))?;
    Ok(())
}

/// Lowercase hex SHA-256 of a file's contents.
fn sha256_file(path: &Path) -> CaptureResult<String> {
    let contents = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read back file: {e}")))?;
    let digest = Sha256::digest(&contents);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

//! # WebM Transcoding
//!
//! Browser recordings arrive as WebM with an Opus track, which symphonia
//! cannot decode. These uploads are handed to `ffmpeg`, which writes a 16 kHz
//! mono WAV to stdout; that WAV then goes through the regular
//! [`SymphoniaDecoder`].
//!
//! ## Staging:
//! ffmpeg needs a seekable input for WebM, so the upload is written to a
//! `tempfile::NamedTempFile`. The file is deleted when the handle drops,
//! which happens on every return path out of [`FfmpegDecoder::decode`].

use crate::audio::{AudioClip, AudioDecoder, AudioFormat, SymphoniaDecoder, Waveform, TARGET_SAMPLE_RATE};
use crate::config::DecodeConfig;
use crate::pipeline::error::{DecodeError, PipelineError};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::{debug, error};

/// Decoder that shells out to ffmpeg for containers symphonia can't handle.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    program: String,
    temp_dir: Option<PathBuf>,
    wav: SymphoniaDecoder,
}

impl FfmpegDecoder {
    pub fn new(program: impl Into<String>, temp_dir: Option<PathBuf>) -> Self {
        Self {
            program: program.into(),
            temp_dir,
            wav: SymphoniaDecoder::new(),
        }
    }

    pub fn from_config(config: &DecodeConfig) -> Self {
        Self {
            wav: SymphoniaDecoder::from_config(config),
            ..Self::new(config.ffmpeg_path.clone(), config.temp_dir.as_ref().map(PathBuf::from))
        }
    }

    /// Write the upload to a scoped temp file.
    fn stage(&self, clip: &AudioClip) -> std::io::Result<NamedTempFile> {
        let suffix = format!(".{}", clip.format.extension());
        let mut builder = tempfile::Builder::new();
        builder.prefix("vita-upload-").suffix(&suffix);
        let mut staged = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        staged.write_all(&clip.data)?;
        staged.flush()?;
        Ok(staged)
    }

    /// Run ffmpeg on the staged file and collect the WAV it writes to stdout.
    fn transcode(&self, staged: &NamedTempFile) -> Result<Vec<u8>, DecodeError> {
        let output = Command::new(&self.program)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(staged.path())
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(TARGET_SAMPLE_RATE.to_string())
            // Stop just past the duration cap; the WAV decoder then rejects it as too long
            .arg("-t")
            .arg(format!("{}", self.wav.max_duration_seconds() + 1.0))
            .args(["-f", "wav", "pipe:1"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| DecodeError::TranscoderUnavailable {
                program: self.program.clone(),
                message: if e.kind() == ErrorKind::NotFound {
                    "not found on PATH".to_string()
                } else {
                    e.to_string()
                },
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(program = %self.program, status = %output.status, stderr = %stderr, "Transcoder failed");
            return Err(DecodeError::TranscoderFailed {
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(output.stdout)
    }
}

impl AudioDecoder for FfmpegDecoder {
    fn decode(&self, clip: &AudioClip) -> Result<Waveform, PipelineError> {
        if clip.data.is_empty() {
            return Err(DecodeError::EmptyPayload.into());
        }

        let staged = self.stage(clip)?;
        debug!(path = %staged.path().display(), bytes = clip.data.len(), "Staged upload for transcoding");

        let wav = self.transcode(&staged)?;
        drop(staged);

        Ok(self.wav.decode_bytes(wav, AudioFormat::Wav)?)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

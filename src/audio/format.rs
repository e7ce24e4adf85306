//! # Container Format Detection
//!
//! Browsers upload `MediaRecorder` output as WebM, but curl users and test
//! fixtures send whatever they have. The format tag is resolved in priority
//! order:
//! 1. **Declared MIME type** on the multipart field
//! 2. **Filename extension**
//! 3. **Magic bytes** at the start of the payload

use std::fmt;

/// Audio container formats the service knows how to route to a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Flac,
    Ogg,
    Mp3,
    WebM,
}

impl AudioFormat {
    /// File extension used for hints and temporary file suffixes.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::WebM => "webm",
        }
    }

    /// Map a MIME type such as `audio/webm;codecs=opus` to a format.
    ///
    /// Generic types (`application/octet-stream`) return `None` so that the
    /// caller falls through to extension and content sniffing.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => Some(AudioFormat::Wav),
            "audio/flac" | "audio/x-flac" => Some(AudioFormat::Flac),
            "audio/ogg" | "application/ogg" | "audio/vorbis" => Some(AudioFormat::Ogg),
            "audio/mpeg" | "audio/mp3" => Some(AudioFormat::Mp3),
            "audio/webm" | "video/webm" => Some(AudioFormat::WebM),
            _ => None,
        }
    }

    /// Map a filename (or bare extension) to a format.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "wave" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" | "oga" => Some(AudioFormat::Ogg),
            "mp3" => Some(AudioFormat::Mp3),
            "webm" | "weba" => Some(AudioFormat::WebM),
            _ => None,
        }
    }

    /// Identify a container from its leading bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WAVE" {
            return Some(AudioFormat::Wav);
        }
        if data.starts_with(b"fLaC") {
            return Some(AudioFormat::Flac);
        }
        if data.starts_with(b"OggS") {
            return Some(AudioFormat::Ogg);
        }
        // EBML header; Matroska and WebM share it and both go through ffmpeg
        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Some(AudioFormat::WebM);
        }
        if data.starts_with(b"ID3") || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0) {
            return Some(AudioFormat::Mp3);
        }
        None
    }

    /// Resolve the format of an upload from everything the client told us.
    pub fn detect(mime: Option<&str>, filename: Option<&str>, data: &[u8]) -> Option<Self> {
        mime.and_then(Self::from_mime)
            .or_else(|| filename.and_then(Self::from_filename))
            .or_else(|| Self::sniff(data))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

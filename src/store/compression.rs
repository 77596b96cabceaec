use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{error, warn};

/// gzip encoding of cached bodies at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyCodec {
    level: u32,
}

impl BodyCodec {
    /// `level` 0 stores bodies uncompressed; 1-9 are gzip levels.
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }

    pub fn disabled() -> Self {
        Self { level: 0 }
    }

    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }

    /// Compress `body`, falling back to the raw bytes if compression fails.
    /// The flag tells whether the returned bytes are gzip-encoded.
    pub fn encode(&self, body: &[u8], url: &str) -> (Vec<u8>, bool) {
        if !self.is_enabled() {
            return (body.to_vec(), false);
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        match encoder.write_all(body).and_then(|_| encoder.finish()) {
            Ok(compressed) => (compressed, true),
            Err(e) => {
                error!("Failed to compress body for {}, storing it uncompressed: {}", url, e);
                (body.to_vec(), false)
            }
        }
    }

    /// Decompress `data` when it was stored compressed, whatever the current
    /// level. On failure the stored bytes are returned as they are.
    pub fn decode(&self, data: Vec<u8>, compressed: bool, url: &str) -> Vec<u8> {
        if !compressed {
            return data;
        }

        let mut decoded = Vec::with_capacity(data.len() * 4);
        match GzDecoder::new(data.as_slice()).read_to_end(&mut decoded) {
            Ok(_) => decoded,
            Err(e) => {
                warn!("Failed to decompress cached body for {}: {}", url, e);
                data
            }
        }
    }
}

impl Default for BodyCodec {
    fn default() -> Self {
        Self::new(crate::app::options::DEFAULT_COMPRESSION_LEVEL)
    }
}

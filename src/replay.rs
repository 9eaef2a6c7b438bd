// Replay recording: collects match updates and compresses them for storage.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Collects raw JSON update messages during a match and compresses them on finish.
#[derive(Debug, Default)]
pub struct ReplayRecorder {
    messages: Vec<String>,
}

impl ReplayRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw JSON message string.
    pub fn record_message(&mut self, msg: &str) {
        self.messages.push(msg.to_string());
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Compress all recorded messages into a gzipped JSON array.
    pub fn finish(self) -> std::io::Result<Vec<u8>> {
        // Each message is already valid JSON, so they are joined as-is.
        let json = format!("[{}]", self.messages.join(","));

        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(json.as_bytes())?;
        encoder.finish()
    }
}

/// Decompress gzipped replay data back to the JSON string.
pub fn decompress_replay(data: &[u8]) -> Result<String, std::io::Error> {
    let mut decoder = GzDecoder::new(data);
    let mut result = String::new();
    decoder.read_to_string(&mut result)?;
    Ok(result)
}

/// File name for a replay finished at `at`, e.g. `match-20260101T120000Z.json.gz`.
pub fn replay_file_name(at: chrono::DateTime<chrono::Utc>) -> String {
    format!("match-{}.json.gz", at.format("%Y%m%dT%H%M%SZ"))
}

/// Write compressed replay bytes into `dir`, creating it if needed. Returns the file path.
pub fn write_replay(dir: &Path, data: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(replay_file_name(chrono::Utc::now()));
    std::fs::write(&path, data)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_record_and_decompress() {
        let mut recorder = ReplayRecorder::new();
        recorder.record_message(r#"{"type":"update","gameState":{"lobbyTimer":0}}"#);
        recorder.record_message(r#"{"type":"update","gameState":{"lobbyTimer":10}}"#);

        assert_eq!(recorder.len(), 2);

        let compressed = recorder.finish().unwrap();
        assert!(!compressed.is_empty());

        let json_str = decompress_replay(&compressed).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json_str).unwrap();
        let arr = parsed.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[1]["gameState"]["lobbyTimer"], 10);
    }

    #[test]
    fn test_empty_recorder() {
        let recorder = ReplayRecorder::new();
        assert!(recorder.is_empty());

        let compressed = recorder.finish().unwrap();
        let json_str = decompress_replay(&compressed).unwrap();
        assert_eq!(json_str, "[]");
    }

    #[test]
    fn test_file_name_uses_utc_timestamp() {
        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(replay_file_name(at), "match-20260304T050607Z.json.gz");
    }

    #[test]
    fn test_write_replay() {
        let dir = std::env::temp_dir().join(format!("eras-replay-{}", uuid::Uuid::new_v4()));
        let path = write_replay(&dir, b"data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}

//! Stage reporting for pipeline runs.
//!
//! Sinks are called from worker threads, so they must be `Send + Sync`. A
//! sink must not block for long; the pipeline waits for it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Pipeline step about to run, or the final outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    ReadSource,
    Compress,
    DeriveKey,
    Encrypt,
    BuildEnvelope,
    SerializeEnvelope,
    ObtainCarrier,
    Embed,
    LoadCarrier,
    Extract,
    DeserializeEnvelope,
    Decrypt,
    Decompress,
    WriteOutput,
    Done,
    Failed,
}

impl Stage {
    /// Steps of an encrypt run, in order.
    pub const ENCRYPT: [Stage; 9] = [
        Stage::ReadSource,
        Stage::Compress,
        Stage::DeriveKey,
        Stage::Encrypt,
        Stage::BuildEnvelope,
        Stage::SerializeEnvelope,
        Stage::ObtainCarrier,
        Stage::Embed,
        Stage::WriteOutput,
    ];

    /// Steps of a decrypt run, in order.
    pub const DECRYPT: [Stage; 7] = [
        Stage::LoadCarrier,
        Stage::Extract,
        Stage::DeserializeEnvelope,
        Stage::DeriveKey,
        Stage::Decrypt,
        Stage::Decompress,
        Stage::WriteOutput,
    ];

    /// Whether the run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::ReadSource => "read source",
            Stage::Compress => "compress",
            Stage::DeriveKey => "derive key",
            Stage::Encrypt => "encrypt",
            Stage::BuildEnvelope => "build envelope",
            Stage::SerializeEnvelope => "serialize envelope",
            Stage::ObtainCarrier => "obtain carrier",
            Stage::Embed => "embed",
            Stage::LoadCarrier => "load carrier",
            Stage::Extract => "extract",
            Stage::DeserializeEnvelope => "deserialize envelope",
            Stage::Decrypt => "decrypt",
            Stage::Decompress => "decompress",
            Stage::WriteOutput => "write output",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receiver of stage updates.
///
/// `item` is the file being processed, or an empty path for in-memory runs.
pub trait ProgressSink: Send + Sync {
    fn stage(&self, item: &Path, stage: Stage);
}

/// Sink that ignores every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn stage(&self, _item: &Path, _stage: Stage) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&Path, Stage) + Send + Sync,
{
    fn stage(&self, item: &Path, stage: Stage) {
        self(item, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = |item: &Path, stage: Stage| {
            seen.lock().unwrap().push((item.to_path_buf(), stage));
        };

        sink.stage(Path::new("a.txt"), Stage::ReadSource);
        sink.stage(Path::new("a.txt"), Stage::Done);

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].1, Stage::Done);
    }

    #[test]
    fn test_stage_sequences_end_with_write() {
        assert_eq!(Stage::ENCRYPT.last(), Some(&Stage::WriteOutput));
        assert_eq!(Stage::DECRYPT.last(), Some(&Stage::WriteOutput));
        assert!(Stage::ENCRYPT.iter().all(|s| !s.is_terminal()));
        assert!(Stage::Failed.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(Stage::DeriveKey.to_string(), "derive key");
    }
}

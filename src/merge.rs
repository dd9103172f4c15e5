use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{DownloadError, Result};

/// One temp file to be appended to the output.
#[derive(Debug, Clone)]
pub struct MergePart {
    pub index: usize,
    pub path: PathBuf,
    pub expected_len: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub bytes_written: u64,
    /// Parts that could not be opened or read.
    pub missing: Vec<usize>,
    /// Parts whose length differed from the planned range.
    pub short: Vec<usize>,
}

impl MergeOutcome {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.short.is_empty()
    }

    pub fn into_error(self) -> Option<DownloadError> {
        (!self.is_complete()).then_some(DownloadError::MergeIncomplete {
            missing: self.missing,
            short: self.short,
        })
    }
}

/// Concatenates `parts` into `output` in the order given, through a buffer of
/// `buffer_size` bytes.
///
/// A part that cannot be read is recorded and skipped so every remaining part
/// is still consumed and removed. Each part that was opened is deleted
/// afterwards, complete or not. Failing to create or write `output` is an
/// error; the caller removes `output` whenever the outcome is incomplete.
pub async fn merge(parts: &[MergePart], output: &Path, buffer_size: usize) -> Result<MergeOutcome> {
    let mut out = File::create(output)
        .await
        .map_err(|e| DownloadError::io(output, e))?;
    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut outcome = MergeOutcome::default();

    for part in parts {
        let mut input = match File::open(&part.path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(segment = part.index, path = %part.path.display(), error = %e, "segment file missing");
                outcome.missing.push(part.index);
                continue;
            }
        };

        let copied = copy_part(&mut input, &mut out, &mut buffer, output).await;
        drop(input);
        if let Err(e) = fs::remove_file(&part.path).await {
            warn!(path = %part.path.display(), error = %e, "could not remove segment file");
        }

        match copied? {
            Some(len) => {
                outcome.bytes_written += len;
                if len != part.expected_len {
                    warn!(segment = part.index, expected = part.expected_len, actual = len, "segment file short");
                    outcome.short.push(part.index);
                }
            }
            None => outcome.missing.push(part.index),
        }
    }

    out.flush().await.map_err(|e| DownloadError::io(output, e))?;
    debug!(bytes = outcome.bytes_written, complete = outcome.is_complete(), "merge finished");
    Ok(outcome)
}

/// `Ok(None)` when the part could not be read to the end; write failures on
/// the output are returned as errors.
async fn copy_part(
    input: &mut File,
    out: &mut File,
    buffer: &mut [u8],
    output: &Path,
) -> Result<Option<u64>> {
    let mut copied = 0u64;
    loop {
        let n = match input.read(buffer).await {
            Ok(0) => return Ok(Some(copied)),
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "segment file unreadable");
                return Ok(None);
            }
        };
        out.write_all(&buffer[..n])
            .await
            .map_err(|e| DownloadError::io(output, e))?;
        copied += n as u64;
    }
}

/// Best-effort removal of files left behind by a failed download.
pub async fn cleanup(paths: impl IntoIterator<Item = &Path>) {
    for path in paths {
        match fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed leftover file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove leftover file"),
        }
    }
}

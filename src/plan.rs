use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::error::{DownloadError, Result};
use crate::state::{ByteRange, SegmentTask};

/// Splits `[0, total_size - 1]` into `segment_count` contiguous ranges.
///
/// Every segment gets `total_size / segment_count` bytes and the last one
/// absorbs the remainder. When the resource is smaller than the segment
/// count the leading segments come out empty (`None`) and the last one
/// covers everything.
pub fn plan(total_size: u64, segment_count: NonZeroUsize) -> Result<Vec<Option<ByteRange>>> {
    if total_size == 0 {
        return Err(DownloadError::SizeUnknown);
    }

    let count = segment_count.get();
    let chunk = total_size / count as u64;
    let mut ranges = Vec::with_capacity(count);

    for i in 0..count {
        let start = i as u64 * chunk;
        let range = if i == count - 1 {
            Some(ByteRange::checked(start, total_size - 1)?)
        } else {
            ((i as u64 + 1) * chunk)
                .checked_sub(1)
                .and_then(|end| ByteRange::new(start, end))
        };
        ranges.push(range);
    }

    Ok(ranges)
}

/// `<output>.part<index>`, next to the output file.
pub fn segment_temp_path(output: &Path, index: usize) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(format!(".part{}", index));
    output.with_file_name(name)
}

/// Staging file the merged or streamed body is written to before it
/// replaces the output.
pub fn staging_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    output.with_file_name(name)
}

/// Every file a segmented download of `output` may leave behind: one temp
/// file per segment followed by the staging file.
pub fn scratch_paths(output: &Path, segment_count: NonZeroUsize) -> Vec<PathBuf> {
    (0..segment_count.get())
        .map(|index| segment_temp_path(output, index))
        .chain(std::iter::once(staging_path(output)))
        .collect()
}

pub fn build_tasks(ranges: Vec<Option<ByteRange>>, output: &Path) -> Vec<SegmentTask> {
    ranges
        .into_iter()
        .enumerate()
        .map(|(index, range)| SegmentTask {
            index,
            range,
            temp_path: segment_temp_path(output, index),
        })
        .collect()
}

//! Writing bucket files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PartitionError;
use crate::partitioner::Partition;

/// Basename used for rule files when none is given.
pub const DEFAULT_RULES_BASENAME: &str = "rsync-filter";

/// File name of bucket `index` (1-based): `<basename>-001.txt`.
pub fn bucket_file_name(basename: &str, index: usize) -> String {
    format!("{basename}-{index:03}.txt")
}

/// Write one file per bucket into `dir`.
///
/// All files are rendered before the first one is written. If any write
/// fails, files already written by this call are removed again.
pub fn write_buckets(
    partition: &Partition,
    dir: &Path,
    basename: &str,
) -> Result<Vec<PathBuf>, PartitionError> {
    let rendered: Vec<(PathBuf, String)> = partition
        .buckets()
        .iter()
        .zip(partition.render())
        .map(|(bucket, lines)| {
            let path = dir.join(bucket_file_name(basename, bucket.index()));
            let mut contents = lines.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            (path, contents)
        })
        .collect();

    fs::create_dir_all(dir).map_err(|source| PartitionError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(rendered.len());
    for (path, contents) in rendered {
        if let Err(source) = fs::write(&path, contents) {
            remove_written(&written);
            return Err(PartitionError::Write { path, source });
        }
        debug!(path = %path.display(), "Wrote bucket file");
        written.push(path);
    }
    Ok(written)
}

fn remove_written(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), "Failed to remove partial output: {e}");
        }
    }
}

//! On-disk graph cache.
//!
//! The cache is a single binary file holding the encoded graph. The caller
//! consults it instead of re-parsing when its mtime is strictly newer than
//! the rule file's, and republishes it in the background after a fresh
//! parse. Publishing writes a sibling temp file and renames it into place,
//! so a concurrent reader sees either no cache or a complete one — never a
//! torn write.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use maku_types::{MakuError, MakuResult};

use crate::graph::Graph;

/// Cache file name, resolved against the working directory.
pub const CACHE_FILE: &str = ".graph_cache";

/// Load and decode the cache at `path`.
pub fn load(path: &Path) -> MakuResult<Graph> {
    if !path.exists() {
        return Err(MakuError::CacheMissing);
    }
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        return Err(MakuError::CacheEmpty);
    }
    Graph::decode(&bytes)
}

/// Encode `graph` and publish it at `path`.
pub fn store(path: &Path, graph: &Graph) -> MakuResult<()> {
    let bytes = graph.encode()?;

    let tmp = path.with_extension(format!("tmp.{}", std::process::id()));
    fs::write(&tmp, &bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }

    tracing::debug!(bytes = bytes.len(), path = %path.display(), "graph cache written");
    Ok(())
}

/// True when the cache at `cache` is strictly newer than `rule_file`.
///
/// Any unreadable timestamp answers false, sending the caller down the
/// re-parse path.
pub fn is_fresh(cache: &Path, rule_file: &Path) -> bool {
    match (mtime(cache), mtime(rule_file)) {
        (Some(c), Some(r)) => c > r,
        _ => false,
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

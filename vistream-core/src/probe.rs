//! Existence probing of candidate video source paths.

use crate::error::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Trait for existence checks against a video source path
#[async_trait]
pub trait SourceProbe: Send + Sync {
    /// Get the probe name
    fn name(&self) -> &'static str;

    /// Check whether `path` is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the check itself could not be performed.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Candidate paths for `filename`, one per prefix, in prefix order.
pub fn candidate_paths<'a>(
    prefixes: &'a [String],
    filename: &'a str,
) -> impl Iterator<Item = String> + 'a {
    prefixes
        .iter()
        .map(move |prefix| format!("{prefix}{filename}"))
}

/// Probe candidate paths one after another and return the first that exists.
///
/// Failed checks are logged and treated as a miss. Returns `None` when no
/// candidate exists.
pub async fn resolve_source(
    probe: &dyn SourceProbe,
    prefixes: &[String],
    filename: &str,
) -> Option<String> {
    for path in candidate_paths(prefixes, filename) {
        match probe.exists(&path).await {
            Ok(true) => {
                info!("Video found at {} (probe: {})", path, probe.name());
                return Some(path);
            }
            Ok(false) => {
                debug!("No video at {}", path);
            }
            Err(e) => {
                warn!("Failed to check video at {}: {}", path, e);
            }
        }
    }

    warn!(
        "Video {} not found under any of {} prefixes",
        filename,
        prefixes.len()
    );
    None
}

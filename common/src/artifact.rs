// Image artifact resolution and materialization
//
// The measurement process reports image references relative to whichever
// directory it happened to run in, so resolution walks a primary root and a
// set of historical fallback layouts. A resolved image is copied into the
// serving directory under a unique name; the source is never touched.

use crate::errors::ArtifactError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Layouts older runner versions used under the fallback roots.
const FALLBACK_SUBDIRS: [&str; 4] = ["", "uploaded_images", "uploaded_images/images", "images"];

/// Resolves reported image references and copies them into a serving
/// directory keyed by filename.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    image_root: PathBuf,
    fallback_roots: Vec<PathBuf>,
    uploads_dir: PathBuf,
}

impl ArtifactResolver {
    pub fn new(image_root: PathBuf, fallback_roots: Vec<PathBuf>, uploads_dir: PathBuf) -> Self {
        Self {
            image_root,
            fallback_roots,
            uploads_dir,
        }
    }

    /// Resolve a reported reference to an existing source path.
    ///
    /// Tries the primary image root first (with any leading `images/` prefix
    /// stripped), then each fallback root combined with the known subdir
    /// layouts, raw reference as-is. First existing path wins.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let stripped = reference.strip_prefix("images/").unwrap_or(reference);
        let primary = self.image_root.join(stripped);
        if primary.exists() {
            return Some(primary);
        }

        for root in &self.fallback_roots {
            for subdir in FALLBACK_SUBDIRS {
                let candidate = if subdir.is_empty() {
                    root.join(reference)
                } else {
                    root.join(subdir).join(reference)
                };
                if candidate.exists() {
                    debug!(candidate = %candidate.display(), "Artifact found under fallback root");
                    return Some(candidate);
                }
            }
        }

        None
    }

    /// Resolve a reference and copy it into the serving directory.
    ///
    /// The copy gets a timestamp-prefixed name so repeated cycles never
    /// collide; the returned value is that filename, which is how consumers
    /// reference the artifact from then on.
    #[instrument(skip(self))]
    pub async fn materialize(&self, reference: &str) -> Result<String, ArtifactError> {
        let source = self
            .resolve(reference)
            .ok_or_else(|| ArtifactError::NotFound(reference.to_string()))?;

        tokio::fs::create_dir_all(&self.uploads_dir)
            .await
            .map_err(|e| ArtifactError::ServingDirFailed(e.to_string()))?;

        let basename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ArtifactError::NotFound(reference.to_string()))?;
        let filename = format!("{}_{}", Utc::now().timestamp_millis(), basename);
        let dest = self.uploads_dir.join(&filename);

        tokio::fs::copy(&source, &dest)
            .await
            .map_err(|e| ArtifactError::CopyFailed(e.to_string()))?;

        info!(
            source = %source.display(),
            dest = %dest.display(),
            "Artifact copied into serving directory"
        );
        Ok(filename)
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) -> PathBuf {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"jpeg-bytes").unwrap();
        path
    }

    fn resolver(primary: &TempDir, fallback: Option<&TempDir>, uploads: &TempDir) -> ArtifactResolver {
        ArtifactResolver::new(
            primary.path().to_path_buf(),
            fallback.map(|f| vec![f.path().to_path_buf()]).unwrap_or_default(),
            uploads.path().to_path_buf(),
        )
    }

    #[test]
    fn test_primary_root_strips_images_prefix() {
        let primary = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        touch(primary.path(), "foo.jpg");

        let resolver = resolver(&primary, None, &uploads);
        let resolved = resolver.resolve("images/foo.jpg").unwrap();
        assert_eq!(resolved, primary.path().join("foo.jpg"));
    }

    #[test]
    fn test_fallback_roots_tried_with_known_layouts() {
        let primary = TempDir::new().unwrap();
        let fallback = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        touch(fallback.path(), "uploaded_images/images/frame.jpg");

        let resolver = resolver(&primary, Some(&fallback), &uploads);
        let resolved = resolver.resolve("frame.jpg").unwrap();
        assert!(resolved.ends_with("uploaded_images/images/frame.jpg"));
    }

    #[test]
    fn test_unresolvable_reference_returns_none() {
        let primary = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let resolver = resolver(&primary, None, &uploads);
        assert!(resolver.resolve("missing.jpg").is_none());
    }

    #[tokio::test]
    async fn test_materialize_copies_with_timestamped_name() {
        let primary = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let source = touch(primary.path(), "foo.jpg");

        let resolver = resolver(&primary, None, &uploads);
        let filename = resolver.materialize("images/foo.jpg").await.unwrap();

        assert!(filename.ends_with("_foo.jpg"));
        assert!(uploads.path().join(&filename).exists());
        // Source is left in place
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_materialize_missing_reference_fails() {
        let primary = TempDir::new().unwrap();
        let uploads = TempDir::new().unwrap();
        let resolver = resolver(&primary, None, &uploads);

        let err = resolver.materialize("nope.jpg").await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }
}

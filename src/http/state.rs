use std::sync::Arc;

use crate::artifacts::ArtifactStore;
use crate::pipeline::Segmenter;
use crate::traits::SegmentationModel;

/// Shared state handed to every handler. Everything in it is read-only.
pub struct HttpState<M: SegmentationModel> {
    pub segmenter: Arc<Segmenter<M>>,
    pub artifacts: Arc<ArtifactStore>,
    /// Base for links to saved artifacts, without the `/static` suffix.
    pub public_url: String,
    pub default_alpha: f32,
}

impl<M: SegmentationModel> Clone for HttpState<M> {
    fn clone(&self) -> Self {
        Self {
            segmenter: Arc::clone(&self.segmenter),
            artifacts: Arc::clone(&self.artifacts),
            public_url: self.public_url.clone(),
            default_alpha: self.default_alpha,
        }
    }
}

impl<M: SegmentationModel> HttpState<M> {
    pub fn artifact_url(&self, name: &str) -> String {
        format!("{}/static/{}", self.public_url.trim_end_matches('/'), name)
    }
}

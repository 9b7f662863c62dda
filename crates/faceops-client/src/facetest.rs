//! Face-test round trip: search with a query image, then fetch the matched
//! user's stored face for side-by-side comparison.

use crate::client::{image_extension, ApiClient, ImageUpload};
use crate::error::Result;
use crate::preview::{Preview, PreviewSlot};
use faceops_core::{SearchOutcome, SearchResponse};
use std::path::{Path, PathBuf};

/// One face-test view. Owns the input and reference previews; both are
/// released when a new search starts and when the view is dropped.
pub struct FaceTest<'a> {
    client: &'a ApiClient,
    preview_dir: Option<PathBuf>,
    input: PreviewSlot,
    reference: PreviewSlot,
    last: Option<SearchResponse>,
}

impl<'a> FaceTest<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            preview_dir: None,
            input: PreviewSlot::default(),
            reference: PreviewSlot::default(),
            last: None,
        }
    }

    /// Keep previews under `dir` instead of the system temp dir.
    pub fn with_preview_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.preview_dir = Some(dir.into());
        self
    }

    /// Search for `image` and load the matched user's stored face.
    ///
    /// A failed reference download is logged and leaves the reference
    /// preview empty; it does not fail the search.
    pub async fn run(&mut self, image: ImageUpload) -> Result<SearchOutcome> {
        self.input.clear();
        self.reference.clear();
        self.last = None;

        let ext = image
            .file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_string())
            .unwrap_or_else(|| "jpg".to_string());
        self.input.replace(Preview::create(
            self.preview_dir.as_deref(),
            "input",
            &ext,
            &image.bytes,
        )?);

        let resp = self.client.search(image).await?;
        let outcome = SearchOutcome::from_response(&resp);

        if let Some(url) = resp.face_image_url() {
            match self.client.fetch_image(url).await {
                Ok(image) => {
                    let ext = image_extension(image.content_type.as_deref(), url);
                    self.reference.replace(Preview::create(
                        self.preview_dir.as_deref(),
                        "reference",
                        &ext,
                        &image.bytes,
                    )?)
                }
                Err(e) => tracing::warn!(%url, error = %e, "cannot load reference image"),
            }
        }

        self.last = Some(resp);
        Ok(outcome)
    }

    pub fn input_preview(&self) -> Option<&Path> {
        self.input.get().map(Preview::path)
    }

    pub fn reference_preview(&self) -> Option<&Preview> {
        self.reference.get()
    }

    pub fn last_response(&self) -> Option<&SearchResponse> {
        self.last.as_ref()
    }
}

//! Streamed bulk registration.
//!
//! One multipart POST carries every `(name, image)` pair; the server answers
//! with a progress event per candidate and a final summary frame.

use crate::client::{mime_for, validated_name, ApiClient};
use crate::error::{error_from_response, ClientError, Result};
use faceops_core::{BulkCandidate, BulkProgressEvent, BulkRegisterResponse, BulkStreamEvent, FrameDecoder};
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

impl ApiClient {
    /// Register every candidate in one streamed request.
    ///
    /// `on_progress` sees each progress event in server order. See
    /// [`register_bulk_cancellable`](Self::register_bulk_cancellable).
    pub async fn register_bulk<F>(
        &self,
        candidates: &[BulkCandidate],
        on_progress: F,
    ) -> Result<BulkRegisterResponse>
    where
        F: FnMut(&BulkProgressEvent),
    {
        self.register_bulk_cancellable(candidates, on_progress, &CancellationToken::new())
            .await
    }

    /// Like [`register_bulk`](Self::register_bulk), but aborts the upload
    /// when `cancel` fires. Candidates the server already processed stay
    /// registered.
    pub async fn register_bulk_cancellable<F>(
        &self,
        candidates: &[BulkCandidate],
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<BulkRegisterResponse>
    where
        F: FnMut(&BulkProgressEvent),
    {
        self.require_session()?;
        let form = build_form(candidates).await?;
        let url = self.endpoint("users/register/bulk")?;

        tracing::info!(count = candidates.len(), "starting bulk registration");
        let send = self.streaming_request(Method::POST, url).multipart(form).send();
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            resp = send => resp?,
        };
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "bulk registration failed").await);
        }

        let mut body = resp.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut summary: Option<BulkRegisterResponse> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(frames = decoder.frames_seen(), "bulk registration cancelled mid-stream");
                    return Err(ClientError::Cancelled);
                }
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            for event in decoder.push(&chunk?)? {
                dispatch(event, &mut on_progress, &mut summary);
            }
        }
        for event in decoder.finish() {
            dispatch(event, &mut on_progress, &mut summary);
        }

        let summary = summary.ok_or(ClientError::IncompleteStream {
            frames: decoder.frames_seen(),
        })?;
        if !summary.is_consistent() {
            tracing::warn!(
                total = summary.total_folders_scanned,
                success = summary.success_count,
                failed = summary.failed_count,
                "bulk summary counts do not add up"
            );
        }
        tracing::info!(
            total = summary.total_folders_scanned,
            success = summary.success_count,
            failed = summary.failed_count,
            "bulk registration finished"
        );
        Ok(summary)
    }
}

fn dispatch<F>(event: BulkStreamEvent, on_progress: &mut F, summary: &mut Option<BulkRegisterResponse>)
where
    F: FnMut(&BulkProgressEvent),
{
    match event {
        BulkStreamEvent::Progress(progress) => {
            tracing::debug!(
                current = progress.current,
                total = progress.total,
                name = %progress.name,
                status = ?progress.status,
                "bulk progress"
            );
            on_progress(&progress);
        }
        BulkStreamEvent::Complete(done) => {
            if summary.is_some() {
                tracing::warn!("duplicate completion frame; keeping the latest");
            }
            *summary = Some(done);
        }
        BulkStreamEvent::Unknown => tracing::debug!("ignoring unknown bulk event"),
    }
}

/// Encode candidates as the parallel `files` / `names` parts the endpoint
/// expects. The pairing is positional, so both lists follow candidate order.
async fn build_form(candidates: &[BulkCandidate]) -> Result<Form> {
    if candidates.is_empty() {
        return Err(ClientError::Validation("no candidates to register".into()));
    }

    let mut seen = HashSet::with_capacity(candidates.len());
    let mut names = Vec::with_capacity(candidates.len());
    let mut form = Form::new();

    for candidate in candidates {
        let name = validated_name(&candidate.name)?;
        if !seen.insert(name) {
            return Err(ClientError::Validation(format!("duplicate identity name: {name}")));
        }
        names.push(name.to_string());

        let bytes = tokio::fs::read(&candidate.file)
            .await
            .map_err(|source| ClientError::Io {
                path: candidate.file.clone(),
                source,
            })?;
        let file_name = candidate
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{name}.jpg"));
        let part = Part::bytes(bytes)
            .mime_str(mime_for(&file_name))?
            .file_name(file_name);
        form = form.part("files", part);
    }

    for name in names {
        form = form.text("names", name);
    }
    Ok(form)
}

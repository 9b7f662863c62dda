//! Authenticated REST client for the face-recognition backend.

use crate::config::Config;
use crate::error::{error_from_response, ClientError, Result};
use crate::session::Session;
use bytes::Bytes;
use faceops_core::{HealthResponse, SearchResponse, User, UserUpdate};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// An image ready to be sent as a multipart file part.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// Read an image file, deriving the content type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Self {
            mime: mime_for(&file_name),
            file_name,
            bytes,
        })
    }

    /// Wrap an in-memory JPEG, e.g. a camera capture.
    pub fn jpeg(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "image/jpeg",
            bytes,
        }
    }

    /// A camera still with a unique upload name.
    pub fn captured(jpeg: Vec<u8>) -> Self {
        Self::jpeg(jpeg, format!("capture-{}.jpg", uuid::Uuid::new_v4()))
    }

    pub(crate) fn into_part(self) -> Result<Part> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(self.mime)?)
    }
}

/// Content type for an image file name.
pub fn mime_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// File extension for a downloaded image: from its content type, else from
/// the URL's file name, else `jpg`.
pub fn image_extension(content_type: Option<&str>, url: &str) -> String {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());
    let from_mime = match essence.as_deref() {
        Some("image/jpeg" | "image/jpg") => Some("jpg"),
        Some("image/png") => Some("png"),
        Some("image/bmp" | "image/x-ms-bmp") => Some("bmp"),
        Some("image/webp") => Some("webp"),
        _ => None,
    };
    if let Some(ext) = from_mime {
        return ext.to_string();
    }

    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, ext)) if mime_for(file_name) != "application/octet-stream" => ext.to_ascii_lowercase(),
        _ => "jpg".to_string(),
    }
}

/// Image body plus the content type the server declared.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Identity of the logged-in operator according to the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Operator {
    pub username: String,
}

/// REST client carrying the operator session.
///
/// Every request carries the session's bearer token when one is held.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Session,
    request_timeout: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, session: Session) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(concat!("faceops/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: config.api_base()?,
            session,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// URL of an API path such as `users/register`.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    /// Resolve a server-provided URL. Absolute URLs are used as-is; paths
    /// are resolved against the server origin.
    pub fn resolve(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(Url::parse(url)?);
        }
        Ok(self.base.join(url)?)
    }

    /// Attach the bearer token, if any.
    pub(crate) fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// A bounded, authorized request.
    pub(crate) fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.authorize(self.http.request(method, url))
            .timeout(self.request_timeout)
    }

    /// An authorized request with no overall timeout, for long streams.
    pub(crate) fn streaming_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.authorize(self.http.request(method, url))
    }

    pub(crate) fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }

    /// Exchange credentials for a token and persist it.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "username and password are required".into(),
            ));
        }

        let url = self.endpoint("auth/login")?;
        let resp = self
            .request(Method::POST, url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            let detail = crate::error::detail_from_body(&body)
                .unwrap_or_else(|| "incorrect username or password".to_string());
            tracing::warn!(username, %status, "login rejected");
            return Err(ClientError::LoginRejected(detail));
        }
        if !status.is_success() {
            return Err(error_from_response(resp, "login failed").await);
        }

        let body: LoginResponse = serde_json::from_slice(&resp.bytes().await?)?;
        self.session
            .establish(body.access_token, username.to_string())?;
        tracing::info!(username, "logged in");
        Ok(())
    }

    /// Drop the session locally. Idempotent.
    pub fn logout(&mut self) -> Result<()> {
        let was = self.session.is_authenticated();
        self.session.invalidate()?;
        if was {
            tracing::info!("logged out");
        }
        Ok(())
    }

    /// Ask the backend who the token belongs to.
    pub async fn current_operator(&self) -> Result<Operator> {
        self.require_session()?;
        self.get_json("auth/me", "cannot verify session").await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get_json("health", "health check failed").await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.require_session()?;
        self.get_json("users/", "cannot list users").await
    }

    /// Register one person from a single image.
    pub async fn register_user(&self, name: &str, image: ImageUpload) -> Result<User> {
        self.require_session()?;
        let name = validated_name(name)?;
        let form = Form::new()
            .text("name", name.to_string())
            .part("file", image.into_part()?);

        let url = self.endpoint("users/register")?;
        let resp = self
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await?;
        let user: User = decode_json(resp, "registration failed").await?;
        tracing::info!(id = user.id, name = %user.name, identity_id = %user.identity_id, "user registered");
        Ok(user)
    }

    /// Look up the best-matching registered face.
    pub async fn search(&self, image: ImageUpload) -> Result<SearchResponse> {
        self.require_session()?;
        let form = Form::new().part("file", image.into_part()?);
        let url = self.endpoint("users/search")?;
        let resp = self
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await?;
        let result: SearchResponse = decode_json(resp, "face search failed").await?;
        tracing::info!(
            matched = result.search_result,
            similarity = result.similarity,
            "face search completed"
        );
        Ok(result)
    }

    pub async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User> {
        self.require_session()?;
        if update.is_empty() {
            return Err(ClientError::Validation("nothing to update".into()));
        }
        let mut update = update.clone();
        if let Some(name) = update.name.as_deref() {
            update.name = Some(validated_name(name)?.to_string());
        }

        let url = self.endpoint(&format!("users/{id}"))?;
        let resp = self
            .request(Method::PATCH, url)
            .json(&update)
            .send()
            .await?;
        let user: User = decode_json(resp, "update failed").await?;
        tracing::info!(id, "user updated");
        Ok(user)
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        self.require_session()?;
        let url = self.endpoint(&format!("users/{id}"))?;
        let resp = self.request(Method::DELETE, url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "delete failed").await);
        }
        tracing::info!(id, "user deleted");
        Ok(())
    }

    /// The aligned face crop the backend stored for `identity_id`.
    pub async fn preprocessed_image(&self, identity_id: &str) -> Result<Bytes> {
        let url = self.endpoint_with_segment("users/face-preprocessed-image", identity_id)?;
        Ok(self.fetch_bytes(url).await?.bytes)
    }

    /// Download an image URL handed out by the server, with credentials.
    pub async fn fetch_image(&self, url: &str) -> Result<FetchedImage> {
        let url = self.resolve(url)?;
        self.fetch_bytes(url).await
    }

    /// `path` with `segment` appended as one percent-encoded path segment.
    pub(crate) fn endpoint_with_segment(&self, path: &str, segment: &str) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Validation(format!("{path} cannot take path segments")))?
            .pop_if_empty()
            .push(segment);
        Ok(url)
    }

    async fn fetch_bytes(&self, url: Url) -> Result<FetchedImage> {
        self.require_session()?;
        let resp = self.request(Method::GET, url).send().await?;
        if !resp.status().is_success() {
            return Err(error_from_response(resp, "failed to load image").await);
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(FetchedImage {
            bytes: resp.bytes().await?,
            content_type,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, fallback: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        let resp = self.request(Method::GET, url).send().await?;
        decode_json(resp, fallback).await
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    fallback: &str,
) -> Result<T> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp, fallback).await);
    }
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Trimmed display name; empty names are refused before any request.
pub(crate) fn validated_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ClientError::Validation("name must not be empty".into()));
    }
    Ok(name)
}

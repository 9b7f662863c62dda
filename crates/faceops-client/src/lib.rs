//! faceops-client: Operator-side client for the face-recognition backend.
//!
//! Holds the operator session, decorates every request with its bearer
//! token, and implements the REST calls the console needs, including the
//! streamed bulk registration and the face-test round trip.

pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod facetest;
pub mod preview;
pub mod session;

pub use client::{image_extension, ApiClient, FetchedImage, ImageUpload, Operator};
pub use config::{Config, ConfigError};
pub use error::{ClientError, Result};
pub use facetest::FaceTest;
pub use preview::{Preview, PreviewSlot};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, StoredCredentials};
pub use tokio_util::sync::CancellationToken;

//! faceops-core: Data model and pure logic for the faceops console.
//!
//! Wire types for the face-recognition backend, the incremental decoder for
//! the bulk registration progress stream, folder-to-identity extraction and
//! the projections the console displays. Performs no network I/O.

pub mod folder;
pub mod stream;
pub mod types;
pub mod view;

pub use folder::{extract_identities, scan_directory, BulkCandidate};
pub use stream::{FrameDecoder, FrameError};
pub use types::{
    BulkFailure, BulkProgressEvent, BulkRegisterResponse, BulkStatus, BulkStreamEvent,
    HealthResponse, MatchedUser, SearchResponse, User, UserUpdate,
};
pub use view::{format_similarity, Dashboard, SearchOutcome};

//! Inbound callbacks from the voice platform: the mid-call identity check
//! and the three result deliveries. Authentication happens in the router
//! (`x-webhook-secret`); this module only shapes and stores payloads.

pub mod ingest;
pub mod payload;

pub use ingest::{ingest, IngestError};
pub use payload::{
    CompletionPayload, GenericResult, IdentityPayload, IdentityQuery, ShapeError,
    StoredResultPayload,
};

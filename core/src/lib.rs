//! Synchronous client for the EnreachVoice telephony REST API.
//!
//! # Overview
//! Authenticates against the vendor's discovery and credential endpoints,
//! then exposes typed accessors for calls, queue calls, recordings,
//! transcripts and call classifications.
//!
//! # Design
//! - [`EnreachApi`] is the host-does-IO core: `build_*` produces an
//!   [`HttpRequest`], `parse_*` consumes an [`HttpResponse`]. It never touches
//!   the network, so it is deterministic and easy to test.
//! - [`EnreachClient`] runs those pairs through a [`Transport`]
//!   ([`UreqTransport`] by default) and adds the few multi-step operations:
//!   recording download, transcript polling and the pretty classification.
//! - [`auth::authenticate`] produces a complete [`Session`] up front; the
//!   client is never observable half-authenticated.
//! - Nothing retries automatically. Rate limits and server errors surface as
//!   [`EnreachError`] for the caller to handle.

pub mod api;
pub mod auth;
pub mod classification;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod poll;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::EnreachApi;
pub use auth::Session;
pub use classification::{flatten_tags, FlattenedTags, PrettyClassification, TagValue, TagsPretty};
pub use client::EnreachClient;
pub use config::{ClientConfig, Credential};
pub use error::{EnreachError, ErrorKind};
pub use filter::CallFilter;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use poll::{Clock, PollPolicy, SystemClock};
pub use transport::UreqTransport;
pub use types::{
    CallListSchema, CallRecord, Classification, ClassificationSchema, ClassifiedType,
    NewClassification, QueueSchema, SchemaQuery, Tag, TagGroup, TagSelection, Transcript,
    TranscriptStatus,
};

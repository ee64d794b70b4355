//! Blocking client that pairs [`EnreachApi`] with a [`Transport`].
//!
//! Every method is one `build_*`, one round trip and one `parse_*`, except
//! recordings (metadata then audio), transcripts with `wait_pending` (bounded
//! polling) and the pretty classification (classification then schema).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::{path_segment, EnreachApi};
use crate::auth::{authenticate, Session};
use crate::classification::{flatten_tags, PrettyClassification};
use crate::config::ClientConfig;
use crate::error::EnreachError;
use crate::filter::CallFilter;
use crate::http::Transport;
use crate::poll::{Clock, PollPolicy, SystemClock};
use crate::transport::UreqTransport;
use crate::types::{
    CallListSchema, CallRecord, Classification, ClassificationSchema, CurrentUser,
    NewClassification, QueueSchema, SchemaQuery, Transcript,
};

/// Authenticated EnreachVoice client.
///
/// Holds no mutable state; share it freely if the transport is `Sync`.
pub struct EnreachClient<T: Transport = UreqTransport> {
    api: EnreachApi,
    transport: T,
    clock: Arc<dyn Clock>,
    poll: PollPolicy,
}

impl EnreachClient<UreqTransport> {
    /// Authenticate over HTTP using `config`.
    pub fn connect(config: &ClientConfig) -> Result<Self, EnreachError> {
        Self::with_transport(config, UreqTransport::new(config.request_timeout))
    }
}

impl<T: Transport> EnreachClient<T> {
    /// Authenticate through a caller-supplied transport.
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self, EnreachError> {
        let session = authenticate(&transport, config)?;
        Ok(Self::from_session(session, config, transport))
    }

    /// Wrap an already authenticated session without any network traffic.
    pub fn from_session(session: Session, config: &ClientConfig, transport: T) -> Self {
        Self {
            api: EnreachApi::new(session, config.user_agent.clone()),
            transport,
            clock: Arc::new(SystemClock),
            poll: config.transcript_poll,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn session(&self) -> &Session {
        self.api.session()
    }

    pub fn api(&self) -> &EnreachApi {
        &self.api
    }

    pub fn current_user(&self) -> Result<CurrentUser, EnreachError> {
        let request = self.api.build_current_user();
        self.api.parse_current_user(&self.transport.execute(&request)?)
    }

    /// Call events associated with the authenticated user.
    pub fn get_usercalls(&self, filter: &CallFilter) -> Result<Vec<CallRecord>, EnreachError> {
        let request = self.api.build_user_calls(filter)?;
        let calls = self.api.parse_calls(&self.transport.execute(&request)?)?;
        info!(count = calls.len(), "retrieved user calls");
        Ok(calls)
    }

    /// Inbound queue calls (service calls).
    pub fn get_inbound_queuecalls(&self, filter: &CallFilter) -> Result<Vec<CallRecord>, EnreachError> {
        let request = self.api.build_queue_calls(filter)?;
        let calls = self.api.parse_calls(&self.transport.execute(&request)?)?;
        info!(count = calls.len(), "retrieved queue calls");
        Ok(calls)
    }

    /// Download a recording to `<dir>/<recording_id>.mp3`, replacing any
    /// existing file, and return the written path. The file is swapped in
    /// whole, so a failed download leaves a previous copy untouched.
    pub fn get_recording_file(
        &self,
        recording_id: &str,
        dir: impl AsRef<Path>,
    ) -> Result<PathBuf, EnreachError> {
        let recording_id = path_segment("recording id", recording_id)?;
        let request = self.api.build_recording_metadata(recording_id)?;
        let metadata = self
            .api
            .parse_recording_metadata(&self.transport.execute(&request)?)?;
        debug!(recording_id, url = %metadata.url, "resolved recording location");

        let request = self.api.build_recording_audio(&metadata);
        let audio = self.api.parse_recording_audio(self.transport.execute(&request)?)?;

        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{recording_id}.mp3"));
        // Same directory as the target: persist is a rename.
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&audio)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| e.error)?;
        info!(path = %path.display(), bytes = audio.len(), "saved recording");
        Ok(path)
    }

    /// Fetch a transcript. With `wait_pending`, a `Pending` transcript is
    /// re-fetched at the configured interval until it settles or the polling
    /// timeout would be exceeded.
    pub fn get_transcript(
        &self,
        transcript_id: &str,
        wait_pending: bool,
    ) -> Result<Transcript, EnreachError> {
        let request = self.api.build_transcript(transcript_id)?;
        let mut transcript = self.api.parse_transcript(&self.transport.execute(&request)?)?;
        if !wait_pending {
            return Ok(transcript);
        }

        let started = self.clock.now();
        while transcript.is_pending() {
            let waited = self.clock.now().saturating_duration_since(started);
            if !self.poll.allows_another(waited) {
                return Err(EnreachError::TranscriptTimeout {
                    transcript_id: transcript_id.to_string(),
                    waited,
                });
            }
            self.clock.sleep(self.poll.interval);
            transcript = self.api.parse_transcript(&self.transport.execute(&request)?)?;
            info!(transcript_id, status = ?transcript.transcript_status, "polled transcript");
        }
        Ok(transcript)
    }

    pub fn get_classification_schemas(
        &self,
        query: &SchemaQuery,
    ) -> Result<Vec<ClassificationSchema>, EnreachError> {
        let request = self.api.build_classification_schemas(query);
        self.api
            .parse_classification_schemas(&self.transport.execute(&request)?)
    }

    pub fn get_classification_schema(
        &self,
        schema_id: Uuid,
        include_children: bool,
    ) -> Result<ClassificationSchema, EnreachError> {
        let request = self.api.build_classification_schema(schema_id, include_children);
        self.api
            .parse_classification_schema(&self.transport.execute(&request)?)
    }

    pub fn get_queue_schemas(&self) -> Result<Vec<QueueSchema>, EnreachError> {
        let request = self.api.build_queue_schemas();
        self.api.parse_queue_schemas(&self.transport.execute(&request)?)
    }

    pub fn get_calllist_schemas(&self) -> Result<Vec<CallListSchema>, EnreachError> {
        let request = self.api.build_calllist_schemas();
        self.api
            .parse_calllist_schemas(&self.transport.execute(&request)?)
    }

    pub fn create_classification(
        &self,
        input: &NewClassification,
    ) -> Result<Classification, EnreachError> {
        let request = self.api.build_create_classification(input)?;
        let created = self
            .api
            .parse_create_classification(&self.transport.execute(&request)?)?;
        info!(classification = %created.id, "created classification");
        Ok(created)
    }

    pub fn find_classifications(
        &self,
        call_id: Option<Uuid>,
        callback_list_item_id: Option<Uuid>,
    ) -> Result<Vec<Classification>, EnreachError> {
        let request = self
            .api
            .build_find_classifications(call_id, callback_list_item_id)?;
        self.api
            .parse_find_classifications(&self.transport.execute(&request)?)
    }

    /// First classification attached to `call_id`, if any.
    pub fn get_call_classification(
        &self,
        call_id: Uuid,
    ) -> Result<Option<Classification>, EnreachError> {
        Ok(self
            .find_classifications(Some(call_id), None)?
            .into_iter()
            .next())
    }

    /// The call's classification with group/tag names resolved through its
    /// schema.
    pub fn get_call_classification_pretty(
        &self,
        call_id: Uuid,
    ) -> Result<Option<PrettyClassification>, EnreachError> {
        let Some(classification) = self.get_call_classification(call_id)? else {
            return Ok(None);
        };
        let schema = self.get_classification_schema(classification.schema_id, true)?;
        let tags = flatten_tags(&classification, &schema);
        Ok(Some(PrettyClassification {
            classification,
            tags,
        }))
    }
}

//! Client-side session state and the guided pipeline steps

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{Row, SchemaItem, SessionId, UploadResponse};

/// One page of the guided workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    #[default]
    Upload,
    Clean,
    Eda,
    Transform,
    Train,
    Export,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::Upload,
        PipelineStep::Clean,
        PipelineStep::Eda,
        PipelineStep::Transform,
        PipelineStep::Train,
        PipelineStep::Export,
    ];

    /// Key sent to the assistant as the current page
    pub fn key(&self) -> &'static str {
        match self {
            PipelineStep::Upload => "upload",
            PipelineStep::Clean => "clean",
            PipelineStep::Eda => "eda",
            PipelineStep::Transform => "transform",
            PipelineStep::Train => "train",
            PipelineStep::Export => "export",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PipelineStep::Upload => "Upload",
            PipelineStep::Clean => "Clean",
            PipelineStep::Eda => "EDA",
            PipelineStep::Transform => "Transform",
            PipelineStep::Train => "Train",
            PipelineStep::Export => "Export",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The following step; the last step stays put
    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1).unwrap_or(*self)
    }

    /// The preceding step; the first step stays put
    pub fn previous(&self) -> Self {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(*self)
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PipelineStep {
    type Err = crate::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|step| step.key() == wanted)
            .ok_or_else(|| crate::ClientError::InvalidInput(format!("unknown pipeline step '{}'", s)))
    }
}

/// What the client remembers about the dataset being worked on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Option<SessionId>,
    pub file_name: String,
    pub preview: Vec<Row>,
    pub schema: Vec<SchemaItem>,
    pub current_step: PipelineStep,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume an existing backend session without cached data
    pub fn resume(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }

    /// Adopt the session created by an upload
    pub fn apply_upload(&mut self, upload: &UploadResponse) {
        self.session_id = Some(upload.session_id.clone());
        self.file_name = upload.filename.clone();
        self.preview = upload.preview.clone();
        self.schema = upload.schema.clone();
        self.current_step = PipelineStep::Clean;
    }

    /// Replace the cached preview rows after a pipeline step
    pub fn set_preview(&mut self, preview: Vec<Row>) {
        self.preview = preview;
    }

    pub fn set_step(&mut self, step: PipelineStep) {
        self.current_step = step;
    }

    /// The session id, or an error if nothing was uploaded yet
    pub fn require_session(&self) -> crate::Result<&SessionId> {
        self.session_id.as_ref().ok_or(crate::ClientError::NoSession)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

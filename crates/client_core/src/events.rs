//! Events published by list controllers to whatever renders them.

use shared::domain::{Page, RecordId, SortSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Short-lived toast text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

/// Status of the most recently issued fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading {
        generation: u64,
        index: u32,
        sort: SortSpec,
    },
    Loaded {
        generation: u64,
    },
    Failed {
        generation: u64,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub enum ControllerEvent {
    FetchStarted {
        generation: u64,
        index: u32,
        sort: SortSpec,
    },
    PageLoaded(Page),
    LoadFailed(String),
    LoadSuperseded {
        generation: u64,
    },
    RecordAdded(RecordId),
    RecordUpdated(RecordId),
    RecordRemoved(RecordId),
    Notice(Notice),
}

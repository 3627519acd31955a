pub mod api;
pub mod auth;
pub mod config;
pub mod confirm;
pub mod controller;
pub mod draft;
pub mod error;
pub mod events;
pub mod resource;

pub use api::{HttpApiClient, ResourceApi};
pub use auth::AuthClient;
pub use config::{load_settings, Settings};
pub use confirm::{AlwaysConfirm, Confirm, ConfirmPrompt, NeverConfirm};
pub use controller::{ListController, LoadOutcome, RemoveOutcome};
pub use draft::Draft;
pub use error::{ClientError, ErrorCategory};
pub use events::{ControllerEvent, FetchState, Notice, NoticeKind};
pub use resource::{
    Cities, Companies, Creatable, Deletable, Lookup, Regions, Resource, SortField, Towns,
    Updatable, Users,
};

#[cfg(test)]
#[path = "tests/mock_backend.rs"]
pub(crate) mod mock_backend;

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod api_tests;

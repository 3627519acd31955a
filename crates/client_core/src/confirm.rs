use async_trait::async_trait;
use shared::domain::RecordId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    pub title: String,
    pub message: String,
    pub resource_label: &'static str,
    pub id: RecordId,
}

impl ConfirmPrompt {
    pub fn delete(resource_label: &'static str, id: RecordId) -> Self {
        Self {
            title: "Delete".to_string(),
            message: format!("Are you sure you want to delete this {resource_label}?"),
            resource_label,
            id,
        }
    }
}

/// Asks the user before a destructive request goes out.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

pub struct AlwaysConfirm;

#[async_trait]
impl Confirm for AlwaysConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        true
    }
}

pub struct NeverConfirm;

#[async_trait]
impl Confirm for NeverConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        false
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Page, Record, SortSpec, UserProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListQuery {
    pub page: u32,
    pub size: u32,
    pub sort: String,
}

impl ListQuery {
    pub fn new(page: u32, size: u32, sort: &SortSpec) -> Self {
        Self {
            page,
            size,
            sort: sort.query_value(),
        }
    }
}

/// `{ content, totalPages }` as returned by every paginated list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    #[serde(default)]
    pub content: Vec<Record>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub number: Option<u32>,
}

impl PageResponse {
    /// Builds the local page for the index the request was issued for. The
    /// index always lands in `0..total_pages` (or `0` for an empty list).
    pub fn into_page(self, requested_index: u32) -> Page {
        let index = self.number.unwrap_or(requested_index);
        Page {
            content: self.content,
            index: index.min(self.total_pages.saturating_sub(1)),
            total_pages: self.total_pages,
        }
    }

    /// Whether `index` points past the last page the backend reported.
    pub fn is_past_end(&self, index: u32) -> bool {
        self.total_pages > 0 && index >= self.total_pages
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInQuery {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInEnvelope {
    pub data: SignInData,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInData {
    #[serde(alias = "accessToken", alias = "jwt")]
    pub token: String,
    pub user_response: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordQuery {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResetQuery {
    pub key: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateRequest {
    pub email: String,
}

/// Item of an unpaginated relation-picker list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl LookupItem {
    pub fn to_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("id".into(), Value::from(self.id));
        map.insert("name".into(), Value::from(self.name.clone()));
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordId, SortDirection};

    #[test]
    fn list_query_formats_sort_pair() {
        let query = ListQuery::new(2, 5, &SortSpec::new("town.name", SortDirection::Desc));
        assert_eq!(query.sort, "town.name,desc");
        assert_eq!(query.size, 5);
    }

    #[test]
    fn page_response_uses_requested_index_when_number_missing() {
        let raw = r#"{"content":[{"id":1,"name":"A"}],"totalPages":3}"#;
        let response: PageResponse = serde_json::from_str(raw).expect("decode");
        let page = response.into_page(0);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.index, 0);
        assert_eq!(page.ids(), vec![RecordId(1)]);
    }

    #[test]
    fn page_index_is_clamped_to_reported_total() {
        let raw = r#"{"content":[],"totalPages":2,"number":7}"#;
        let response: PageResponse = serde_json::from_str(raw).expect("decode");
        assert!(response.is_past_end(7));
        assert!(!response.is_past_end(1));
        assert_eq!(response.into_page(7).index, 1);

        let empty: PageResponse = serde_json::from_str(r#"{"content":[],"totalPages":0}"#)
            .expect("decode");
        assert!(!empty.is_past_end(3));
        assert_eq!(empty.into_page(3).index, 0);
    }

    #[test]
    fn sign_in_envelope_reads_nested_profile() {
        let raw = r#"{"data":{"token":"t0k","userResponse":{"name":"Ada","surname":"L","email":"ada@x","role":"ROLE_ADMIN","company":{"id":3,"name":"Acme"}}}}"#;
        let envelope: SignInEnvelope = serde_json::from_str(raw).expect("decode");
        assert_eq!(envelope.data.token, "t0k");
        assert_eq!(envelope.data.user_response.role, "ROLE_ADMIN");
        assert_eq!(envelope.data.user_response.company.as_deref(), Some("Acme"));
        assert_eq!(envelope.data.user_response.department, None);
    }
}

//! Generic list controller: one page of one resource, its sort order, the
//! open add/edit form, and the optimistic patches applied after mutations.
//!
//! STALE RESPONSES
//! ===============
//! Every `load` takes a generation number under the state lock before the
//! request goes out. When the response comes back, it is only applied if no
//! newer load was issued in the meantime; otherwise it is dropped and the
//! caller gets `LoadOutcome::Superseded`. The lock is never held across the
//! network call, so loads and mutations may overlap freely.

use std::{marker::PhantomData, sync::Arc};

use shared::{
    domain::{Page, Record, RecordId, Session, SortDirection, SortSpec, RESTRICTED_ROLE},
    protocol::{ListQuery, LookupItem},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use crate::{
    api::ResourceApi,
    config::DEFAULT_PAGE_SIZE,
    confirm::{Confirm, ConfirmPrompt},
    draft::Draft,
    error::ClientError,
    events::{ControllerEvent, FetchState, Notice},
    resource::{Creatable, Deletable, Lookup, Resource, Updatable},
};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded(Page),
    /// A newer load was issued while this one was in flight.
    Superseded,
    /// Navigation past the first or last page.
    Unchanged,
}

impl LoadOutcome {
    pub fn page(&self) -> Option<&Page> {
        match self {
            Self::Loaded(page) => Some(page),
            Self::Superseded | Self::Unchanged => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    Cancelled,
}

#[derive(Default)]
struct ControllerState {
    page: Page,
    sort: SortSpec,
    fetch: FetchState,
    generation: u64,
    form: Option<Draft>,
}

pub struct ListController<R: Resource> {
    api: Arc<dyn ResourceApi>,
    session: Arc<Session>,
    page_size: u32,
    restricted_role: String,
    inner: Mutex<ControllerState>,
    events: broadcast::Sender<ControllerEvent>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> ListController<R> {
    pub fn new(api: Arc<dyn ResourceApi>, session: Arc<Session>) -> Arc<Self> {
        Self::with_options(api, session, DEFAULT_PAGE_SIZE, RESTRICTED_ROLE)
    }

    pub fn with_options(
        api: Arc<dyn ResourceApi>,
        session: Arc<Session>,
        page_size: u32,
        restricted_role: impl Into<String>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            api,
            session,
            page_size: page_size.max(1),
            restricted_role: restricted_role.into(),
            inner: Mutex::new(ControllerState::default()),
            events,
            _resource: PhantomData,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Whether edit/delete controls should be offered at all.
    pub fn can_write(&self) -> bool {
        !self.session.role.is_restricted_by(&self.restricted_role)
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn page(&self) -> Page {
        self.inner.lock().await.page.clone()
    }

    pub async fn sort(&self) -> SortSpec {
        self.inner.lock().await.sort.clone()
    }

    pub async fn fetch_state(&self) -> FetchState {
        self.inner.lock().await.fetch.clone()
    }

    pub async fn load(&self, index: u32, sort: SortSpec) -> Result<LoadOutcome, ClientError> {
        let generation = {
            let mut guard = self.inner.lock().await;
            if guard.page.total_pages > 0 && index >= guard.page.total_pages {
                debug!(
                    resource = R::PATH,
                    index,
                    total_pages = guard.page.total_pages,
                    "load: index out of range, ignoring"
                );
                return Ok(LoadOutcome::Unchanged);
            }
            guard.generation += 1;
            guard.sort = sort.clone();
            guard.fetch = FetchState::Loading {
                generation: guard.generation,
                index,
                sort: sort.clone(),
            };
            guard.generation
        };
        self.emit(ControllerEvent::FetchStarted {
            generation,
            index,
            sort: sort.clone(),
        });

        // An index past the end (the list shrank, or nothing was loaded yet)
        // is re-issued for the last page the backend reported.
        let mut index = index;
        let result = loop {
            let query = ListQuery::new(index, self.page_size, &sort);
            let result = self
                .api
                .fetch_page(R::PATH, &query, &self.session.token)
                .await;
            match &result {
                Ok(response) if response.is_past_end(index) => {
                    let last = response.total_pages - 1;
                    debug!(
                        resource = R::PATH,
                        index,
                        total_pages = response.total_pages,
                        "load: index past the last page, fetching page {last}"
                    );
                    index = last;
                }
                _ => break result,
            }
        };

        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            drop(guard);
            warn!(
                resource = R::PATH,
                generation,
                index,
                sort = %sort.query_value(),
                "load: discarding superseded response"
            );
            self.emit(ControllerEvent::LoadSuperseded { generation });
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(response) => {
                let page = response.into_page(index);
                guard.page = page.clone();
                guard.fetch = FetchState::Loaded { generation };
                drop(guard);
                debug!(
                    resource = R::PATH,
                    index = page.index,
                    total_pages = page.total_pages,
                    items = page.content.len(),
                    "load: page applied"
                );
                self.emit(ControllerEvent::PageLoaded(page.clone()));
                Ok(LoadOutcome::Loaded(page))
            }
            Err(err) => {
                guard.fetch = FetchState::Failed {
                    generation,
                    message: err.to_string(),
                };
                drop(guard);
                error!(resource = R::PATH, index, error = %err, "load: fetch failed");
                self.emit(ControllerEvent::LoadFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Reloads the current page under the current sort.
    pub async fn reload(&self) -> Result<LoadOutcome, ClientError> {
        let (index, sort) = {
            let guard = self.inner.lock().await;
            (guard.page.index, guard.sort.clone())
        };
        self.load(index, sort).await
    }

    /// Changes the sort order and starts over at the first page.
    pub async fn set_sort(
        &self,
        field: &str,
        direction: SortDirection,
    ) -> Result<LoadOutcome, ClientError> {
        if !R::is_sort_field(field) {
            return Err(ClientError::UnknownSortField {
                resource: R::PATH,
                field: field.to_string(),
            });
        }
        let sort = SortSpec::new(field, direction);
        self.inner.lock().await.sort = sort.clone();
        self.load(0, sort).await
    }

    pub async fn next_page(&self) -> Result<LoadOutcome, ClientError> {
        let (page, sort) = {
            let guard = self.inner.lock().await;
            (guard.page.clone(), guard.sort.clone())
        };
        if !page.has_next() {
            return Ok(LoadOutcome::Unchanged);
        }
        self.load(page.index + 1, sort).await
    }

    pub async fn prev_page(&self) -> Result<LoadOutcome, ClientError> {
        let (page, sort) = {
            let guard = self.inner.lock().await;
            (guard.page.clone(), guard.sort.clone())
        };
        if !page.has_prev() {
            return Ok(LoadOutcome::Unchanged);
        }
        self.load(page.index - 1, sort).await
    }

    pub async fn lookup(&self, lookup: Lookup) -> Result<Vec<LookupItem>, ClientError> {
        self.api
            .fetch_lookup(lookup.path(), &self.session.token)
            .await
            .inspect_err(|err| {
                error!(resource = R::PATH, lookup = lookup.path(), error = %err, "lookup failed");
            })
    }

    pub async fn draft(&self) -> Option<Draft> {
        self.inner.lock().await.form.clone()
    }

    /// Applies `edit` to the open form. Returns false when no form is open.
    pub async fn edit_draft(&self, edit: impl FnOnce(&mut Draft)) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.form.as_mut() {
            Some(draft) => {
                edit(draft);
                true
            }
            None => false,
        }
    }

    pub async fn close_form(&self) {
        self.inner.lock().await.form = None;
    }

    fn ensure_can_write(&self) -> Result<(), ClientError> {
        if self.can_write() {
            Ok(())
        } else {
            Err(ClientError::WriteNotPermitted(self.session.role.clone()))
        }
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, notice: Notice) {
        self.emit(ControllerEvent::Notice(notice));
    }
}

impl<R: Creatable> ListController<R> {
    /// Opens an empty add form, discarding any form already open.
    pub async fn open_create(&self) -> Draft {
        let draft = Draft::empty();
        self.inner.lock().await.form = Some(draft.clone());
        draft
    }

    /// Posts the draft and appends the created record to the end of the
    /// current page, whatever the active sort.
    pub async fn create(&self, draft: &Draft) -> Result<Record, ClientError> {
        self.ensure_can_write()?;
        let body = R::request_body(draft);
        let created = self
            .api
            .create(R::PATH, &body, &self.session.token)
            .await
            .and_then(|record| {
                record.id().map(|id| (id, record)).ok_or_else(|| {
                    ClientError::Decode(format!("created {} has no identifier", R::LABEL))
                })
            });
        let (id, record) = match created {
            Ok(created) => created,
            Err(err) => {
                error!(resource = R::PATH, error = %err, "create failed");
                self.notify(Notice::error(format!("Error adding {}: {err}", R::LABEL)));
                return Err(err);
            }
        };

        {
            let mut guard = self.inner.lock().await;
            let content = &mut guard.page.content;
            match content.iter_mut().find(|r| r.id() == Some(id)) {
                Some(existing) => *existing = record.clone(),
                None => content.push(record.clone()),
            }
        }
        info!(resource = R::PATH, id = id.0, "record created");
        self.emit(ControllerEvent::RecordAdded(id));
        self.notify(Notice::success(format!("{} added successfully", R::TITLE)));
        Ok(record)
    }
}

impl<R: Updatable> ListController<R> {
    /// Opens an edit form seeded from the record on the current page.
    pub async fn open_edit(&self, id: RecordId) -> Result<Draft, ClientError> {
        let mut guard = self.inner.lock().await;
        let record = guard
            .page
            .content
            .iter()
            .find(|r| r.id() == Some(id))
            .ok_or(ClientError::NotInPage(id))?;
        let draft = Draft::for_record::<R>(record);
        guard.form = Some(draft.clone());
        Ok(draft)
    }

    /// Puts the draft and replaces the matching item with the server's echo,
    /// falling back to the draft when the backend answers without a body.
    pub async fn update(&self, id: RecordId, draft: &Draft) -> Result<Record, ClientError> {
        self.ensure_can_write()?;
        let body = R::request_body(draft);
        let echoed = match self
            .api
            .update(R::PATH, id, &body, &self.session.token)
            .await
        {
            Ok(echoed) => echoed,
            Err(err) => {
                error!(resource = R::PATH, id = id.0, error = %err, "update failed");
                self.notify(Notice::error(format!("Error saving {}: {err}", R::LABEL)));
                return Err(err);
            }
        };
        let record = match echoed {
            Some(record) if record.id() == Some(id) => record,
            _ => draft.to_record(id),
        };

        {
            let mut guard = self.inner.lock().await;
            if let Some(existing) = guard
                .page
                .content
                .iter_mut()
                .find(|r| r.id() == Some(id))
            {
                *existing = record.clone();
            }
        }
        info!(resource = R::PATH, id = id.0, "record updated");
        self.emit(ControllerEvent::RecordUpdated(id));
        self.notify(Notice::success(format!("{} updated successfully", R::TITLE)));
        Ok(record)
    }
}

impl<R: Creatable + Updatable> ListController<R> {
    /// Sends the open form as a create or an update depending on how it was
    /// opened. The form stays open when the request fails.
    pub async fn submit_form(&self) -> Result<Record, ClientError> {
        let draft = self
            .draft()
            .await
            .ok_or_else(|| ClientError::validation("no form is open"))?;
        let record = match draft.target() {
            Some(id) => self.update(id, &draft).await?,
            None => self.create(&draft).await?,
        };
        let mut guard = self.inner.lock().await;
        if guard.form.as_ref().map(Draft::target) == Some(draft.target()) {
            guard.form = None;
        }
        Ok(record)
    }
}

impl<R: Deletable> ListController<R> {
    /// Asks `confirm` first; nothing is sent when the user declines.
    pub async fn remove(
        &self,
        id: RecordId,
        confirm: &dyn Confirm,
    ) -> Result<RemoveOutcome, ClientError> {
        self.ensure_can_write()?;
        let prompt = ConfirmPrompt::delete(R::LABEL, id);
        if !confirm.confirm(&prompt).await {
            warn!(resource = R::PATH, id = id.0, "delete cancelled");
            return Ok(RemoveOutcome::Cancelled);
        }

        if let Err(err) = self.api.delete(R::PATH, id, &self.session.token).await {
            error!(resource = R::PATH, id = id.0, error = %err, "delete failed");
            self.notify(Notice::error(format!("Error deleting {}: {err}", R::LABEL)));
            return Err(err);
        }

        {
            let mut guard = self.inner.lock().await;
            guard.page.content.retain(|r| r.id() != Some(id));
            if guard.form.as_ref().and_then(Draft::target) == Some(id) {
                guard.form = None;
            }
        }
        info!(resource = R::PATH, id = id.0, "record deleted");
        self.emit(ControllerEvent::RecordRemoved(id));
        self.notify(Notice::success(format!("{} deleted successfully", R::TITLE)));
        Ok(RemoveOutcome::Removed)
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;

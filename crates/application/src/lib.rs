//! Application orchestration layer for Twinshelf.
//!
//! [`AppContext`] owns both shelf stores and every piece of client state. It
//! never performs IO: user actions queue [`ApiRequest`]s in an outbox, and the
//! caller feeds the matching [`ApiResponse`]s back through
//! [`AppContext::apply_response`].

use std::time::Instant;

use rand::Rng;
use twinshelf_core::{Book, BookId, BookUpdate, NewBook, Settings, ShelfId};

mod forms;
mod notify;
mod picker;
mod search;
mod session;
mod shelf;

pub use forms::{AddForm, BookDraft, DeleteConfirm, DraftError, FormField, UpdateForm};
pub use notify::{Notifications, Toast, ToastLevel};
pub use picker::{CycleHandle, PickPhase, PickStart, Picker, candidate_pool};
pub use search::SearchCriteria;
pub use session::{Gate, SessionState};
pub use shelf::{ShelfStore, SortColumn, SortDirection, SortState, sort_books};

/// A failed request as seen by the client state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub message: String,
    pub unauthorized: bool,
}

impl ApiFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            unauthorized: false,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            unauthorized: true,
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    SignIn {
        token: String,
    },
    SignOut,
    FetchShelf {
        shelf: ShelfId,
        seq: u64,
    },
    AddBooks {
        books: Vec<NewBook>,
    },
    UpdateBook {
        shelf: ShelfId,
        id: BookId,
        update: BookUpdate,
    },
    DeleteBook {
        shelf: ShelfId,
        id: BookId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    SignedIn {
        result: Result<(), ApiFailure>,
    },
    ShelfFetched {
        shelf: ShelfId,
        seq: u64,
        result: Result<Vec<Book>, ApiFailure>,
    },
    BooksAdded {
        result: Result<usize, ApiFailure>,
    },
    BookUpdated {
        shelf: ShelfId,
        id: BookId,
        result: Result<(), ApiFailure>,
    },
    BookDeleted {
        shelf: ShelfId,
        id: BookId,
        result: Result<(), ApiFailure>,
    },
}

#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub session: SessionState,
    pub search: SearchCriteria,
    pub active: ShelfId,
    pub add_form: AddForm,
    pub update_form: Option<UpdateForm>,
    pub delete_confirm: Option<DeleteConfirm>,
    pub picker: Picker,
    pub notifications: Notifications,
    shelves: [ShelfStore; 2],
    selected: [usize; 2],
    token: Option<String>,
    outbox: Vec<ApiRequest>,
}

impl AppContext {
    pub fn new(mut settings: Settings) -> Self {
        settings.normalize();
        let notifications = Notifications::new(settings.toast_lifetime());
        Self {
            settings,
            session: SessionState::default(),
            search: SearchCriteria::default(),
            active: ShelfId::First,
            add_form: AddForm::default(),
            update_form: None,
            delete_confirm: None,
            picker: Picker::default(),
            notifications,
            shelves: [ShelfStore::new(ShelfId::First), ShelfStore::new(ShelfId::Second)],
            selected: [0, 0],
            token: None,
            outbox: Vec::new(),
        }
    }

    pub fn apply_settings(&mut self, mut settings: Settings) {
        settings.normalize();
        self.notifications.set_lifetime(settings.toast_lifetime());
        self.settings = settings;
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn sign_in(&mut self, token: &str, now: Instant) {
        let token = token.trim();
        if token.is_empty() {
            self.notifications
                .error("Sign-in failed", "Enter an API token to continue.", now);
            return;
        }
        tracing::info!("signing in");
        self.token = Some(token.to_string());
        self.session = SessionState::Loading;
        self.outbox.push(ApiRequest::SignIn {
            token: token.to_string(),
        });
    }

    /// Re-authenticates with the token of the current session, if any.
    pub fn resume_session(&mut self, now: Instant) {
        if let Some(token) = self.token.clone() {
            self.sign_in(&token, now);
        }
    }

    pub fn sign_out(&mut self) {
        tracing::info!("signing out");
        self.end_session(SessionState::default());
    }

    /// Drops every piece of session state and tells the client to forget
    /// its token.
    fn end_session(&mut self, session: SessionState) {
        self.token = None;
        self.session = session;
        for store in self.shelves.iter_mut() {
            store.reset();
        }
        self.selected = [0, 0];
        self.add_form.reset();
        self.update_form = None;
        self.delete_confirm = None;
        self.picker.close();
        self.outbox.push(ApiRequest::SignOut);
    }

    pub fn is_ready(&self) -> bool {
        self.session.gate() == Gate::Ready
    }

    pub fn take_requests(&mut self) -> Vec<ApiRequest> {
        std::mem::take(&mut self.outbox)
    }

    pub fn shelf(&self, shelf: ShelfId) -> &ShelfStore {
        &self.shelves[shelf.index()]
    }

    pub fn refetch(&mut self, shelf: ShelfId) {
        let request = self.shelves[shelf.index()].request_refetch();
        self.outbox.push(request);
    }

    pub fn refetch_all(&mut self) {
        for shelf in ShelfId::ALL {
            self.refetch(shelf);
        }
    }

    pub fn visible_books(&self, shelf: ShelfId) -> Vec<&Book> {
        self.search.filter(self.shelf(shelf).books())
    }

    pub fn selected_index(&self, shelf: ShelfId) -> Option<usize> {
        let len = self.visible_books(shelf).len();
        if len == 0 {
            None
        } else {
            Some(self.selected[shelf.index()].min(len - 1))
        }
    }

    pub fn selected_book(&self, shelf: ShelfId) -> Option<&Book> {
        let idx = self.selected_index(shelf)?;
        self.visible_books(shelf).get(idx).copied()
    }

    pub fn normalize_selection(&mut self) {
        for shelf in ShelfId::ALL {
            let len = self.visible_books(shelf).len();
            let selected = &mut self.selected[shelf.index()];
            *selected = (*selected).min(len.saturating_sub(1));
        }
    }

    pub fn select_next(&mut self) {
        let len = self.visible_books(self.active).len();
        let selected = &mut self.selected[self.active.index()];
        if *selected + 1 < len {
            *selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        let selected = &mut self.selected[self.active.index()];
        *selected = selected.saturating_sub(1);
    }

    pub fn switch_shelf(&mut self) {
        self.active = self.active.other();
    }

    pub fn click_sort(&mut self, column: SortColumn) {
        let shelf = self.active;
        tracing::debug!(?shelf, column = column.label(), "sort column clicked");
        if let Some(request) = self.shelves[shelf.index()].click_sort(column) {
            self.outbox.push(request);
        }
    }

    pub fn open_add_form(&mut self) {
        self.add_form.open = true;
    }

    pub fn submit_add_form(&mut self, now: Instant) {
        if self.add_form.submitting {
            return;
        }
        match self.add_form.validate() {
            Ok(books) => {
                tracing::info!(count = books.len(), "submitting new books");
                self.add_form.submitting = true;
                self.outbox.push(ApiRequest::AddBooks { books });
            }
            Err(err) => {
                self.notifications
                    .error("Missing information.", err.to_string(), now);
            }
        }
    }

    pub fn open_update_form(&mut self) {
        let shelf = self.active;
        if let Some(book) = self.selected_book(shelf) {
            self.update_form = Some(UpdateForm::from_book(shelf, book));
        }
    }

    pub fn submit_update_form(&mut self, now: Instant) {
        let Some(form) = self.update_form.as_mut() else {
            return;
        };
        if form.submitting {
            return;
        }
        match form.to_update() {
            Ok(update) => {
                tracing::info!(shelf = ?form.shelf, id = %form.id, "submitting book update");
                form.submitting = true;
                self.outbox.push(ApiRequest::UpdateBook {
                    shelf: form.shelf,
                    id: form.id,
                    update,
                });
            }
            Err(field) => {
                form.field = field;
                self.notifications.error(
                    "Missing information.",
                    format!("{} is required", field.label()),
                    now,
                );
            }
        }
    }

    pub fn request_delete(&mut self) {
        let shelf = self.active;
        if let Some(book) = self.selected_book(shelf) {
            self.delete_confirm = Some(DeleteConfirm {
                shelf,
                id: book.id,
                title: book.title.clone(),
                submitting: false,
            });
        }
    }

    pub fn cancel_delete(&mut self) {
        self.delete_confirm = None;
    }

    pub fn confirm_delete(&mut self) {
        let Some(confirm) = self.delete_confirm.as_mut() else {
            return;
        };
        if confirm.submitting {
            return;
        }
        tracing::info!(shelf = ?confirm.shelf, id = %confirm.id, "deleting book");
        confirm.submitting = true;
        self.outbox.push(ApiRequest::DeleteBook {
            shelf: confirm.shelf,
            id: confirm.id,
        });
    }

    pub fn open_picker(&mut self) {
        self.picker.open();
    }

    pub fn close_picker(&mut self) {
        self.picker.close();
    }

    pub fn start_pick<R: Rng>(&mut self, now: Instant, rng: &mut R) -> PickStart {
        let pool = candidate_pool(
            self.shelf(ShelfId::First).books(),
            self.shelf(ShelfId::Second).books(),
            self.picker.table(),
            self.picker.genre(),
        );
        let step = self.settings.picker_step();
        let duration = self.settings.picker_cycle();
        self.picker.start(pool, now, step, duration, rng)
    }

    /// Advances timers. Returns `true` when something visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let pruned = self.notifications.prune(now);
        let stepped = self.picker.tick(now);
        pruned || stepped
    }

    pub fn apply_response(&mut self, response: ApiResponse, now: Instant) {
        match response {
            ApiResponse::SignedIn { result } => self.on_signed_in(result, now),
            ApiResponse::ShelfFetched { shelf, seq, .. } if !self.is_ready() => {
                tracing::debug!(?shelf, seq, "ignoring shelf response outside of a session");
                self.shelves[shelf.index()].fetch_failed(seq);
            }
            ApiResponse::ShelfFetched { shelf, seq, result } => match result {
                Ok(books) => {
                    tracing::info!(?shelf, seq, count = books.len(), "shelf loaded");
                    self.shelves[shelf.index()].apply_fetch(seq, books);
                    self.normalize_selection();
                }
                Err(failure) => {
                    tracing::warn!(?shelf, seq, error = %failure, "shelf fetch failed");
                    self.shelves[shelf.index()].fetch_failed(seq);
                    let title = self.settings.shelf_title(shelf);
                    self.notifications.error(
                        "Error loading books.",
                        format!("{title}: {failure}"),
                        now,
                    );
                    if failure.unauthorized {
                        self.expire_session(&failure);
                    }
                }
            },
            ApiResponse::BooksAdded { result } => match result {
                Ok(count) => {
                    tracing::info!(count, "books added");
                    self.add_form.reset();
                    self.notifications.success(
                        "Books added.",
                        format!("{count} book(s) added successfully."),
                        now,
                    );
                    if self.is_ready() {
                        self.refetch_all();
                    }
                }
                Err(failure) => {
                    tracing::warn!(error = %failure, "adding books failed");
                    self.add_form.submitting = false;
                    self.notifications.error(
                        "Error adding books.",
                        format!("There was an error adding the books: {failure}"),
                        now,
                    );
                    if failure.unauthorized {
                        self.expire_session(&failure);
                    }
                }
            },
            ApiResponse::BookUpdated { shelf, id, result } => match result {
                Ok(()) => {
                    tracing::info!(?shelf, %id, "book updated");
                    if self.update_form.as_ref().is_some_and(|form| form.id == id) {
                        self.update_form = None;
                    }
                    self.notifications.success(
                        "Book updated.",
                        "The book has been updated successfully.",
                        now,
                    );
                    if self.is_ready() {
                        self.refetch(shelf);
                    }
                }
                Err(failure) => {
                    tracing::warn!(?shelf, %id, error = %failure, "updating book failed");
                    if let Some(form) = self.update_form.as_mut() {
                        form.submitting = false;
                    }
                    self.notifications.error(
                        "Error updating book.",
                        format!("There was an error updating the book: {failure}"),
                        now,
                    );
                    if failure.unauthorized {
                        self.expire_session(&failure);
                    }
                }
            },
            ApiResponse::BookDeleted { shelf, id, result } => match result {
                Ok(()) => {
                    tracing::info!(?shelf, %id, "book deleted");
                    if self.delete_confirm.as_ref().is_some_and(|c| c.id == id) {
                        self.delete_confirm = None;
                    }
                    self.notifications
                        .success("Book deleted.", "The book has been removed.", now);
                    if self.is_ready() {
                        self.refetch(shelf);
                    }
                }
                Err(failure) => {
                    tracing::warn!(?shelf, %id, error = %failure, "deleting book failed");
                    if let Some(confirm) = self.delete_confirm.as_mut() {
                        confirm.submitting = false;
                    }
                    self.notifications.error(
                        "Error deleting book.",
                        format!("There was an error deleting the book: {failure}"),
                        now,
                    );
                    if failure.unauthorized {
                        self.expire_session(&failure);
                    }
                }
            },
        }
    }

    fn on_signed_in(&mut self, result: Result<(), ApiFailure>, now: Instant) {
        if self.session != SessionState::Loading {
            tracing::debug!("ignoring sign-in response outside of a login attempt");
            return;
        }
        match result {
            Ok(()) => {
                tracing::info!("session authenticated");
                self.session = SessionState::Authenticated;
                self.refetch_all();
            }
            Err(failure) => {
                tracing::warn!(error = %failure, "sign-in failed");
                let reason = if failure.unauthorized {
                    "The token was rejected.".to_string()
                } else {
                    failure.message.clone()
                };
                self.token = None;
                self.session = SessionState::Unauthenticated {
                    reason: Some(reason.clone()),
                };
                self.notifications.error("Sign-in failed.", reason, now);
            }
        }
    }

    fn expire_session(&mut self, failure: &ApiFailure) {
        if !self.is_ready() {
            return;
        }
        tracing::warn!(error = %failure, "session expired");
        self.end_session(SessionState::Unauthenticated {
            reason: Some(format!("Session expired: {failure}")),
        });
    }
}

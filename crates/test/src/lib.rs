//! Test helpers and fixtures.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use twinshelf_application::AppContext;
use twinshelf_core::{Book, BookId, BookUpdate, Genre, NewBook, Settings, ShelfId, TableTarget};
use twinshelf_remote::{ApiError, BookApi, Result as ApiResult};

#[cfg(test)]
mod flows;

pub fn make_settings() -> Settings {
    Settings {
        api_base_url: "http://books.test/Production".to_string(),
        picker_step_ms: 100,
        picker_cycle_ms: 1_000,
        ..Settings::default()
    }
}

pub fn book(id: i64, title: &str, author: &str, genre: Genre, tbr: bool) -> Book {
    Book {
        id: BookId(id),
        title: title.to_string(),
        author: author.to_string(),
        genre,
        tbr,
    }
}

pub fn new_book(title: &str, genre: Genre, table: TableTarget) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: "Test Author".to_string(),
        genre,
        tbr: false,
        table,
    }
}

/// One remote call as observed by [`RecordingApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchShelf(ShelfId),
    AddBooks(Vec<NewBook>),
    UpdateBook {
        shelf: ShelfId,
        id: BookId,
        update: BookUpdate,
    },
    DeleteBook(BookId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Fetch,
    Add,
    Update,
    Delete,
}

#[derive(Debug, Default)]
struct State {
    shelves: [Vec<Book>; 2],
    next_id: i64,
    token: Option<String>,
    required_token: Option<String>,
    calls: Vec<Call>,
    failures: Vec<(Op, u16)>,
}

/// In-memory remote store that records every call it receives.
#[derive(Debug, Default)]
pub struct RecordingApi {
    state: Mutex<State>,
}

impl RecordingApi {
    pub fn new(first: Vec<Book>, second: Vec<Book>) -> Self {
        let next_id = first
            .iter()
            .chain(second.iter())
            .map(|book| book.id.0)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            state: Mutex::new(State {
                shelves: [first, second],
                next_id,
                ..State::default()
            }),
        }
    }

    /// Rejects fetches that do not carry `token` with a 401.
    pub fn require_token(self, token: &str) -> Self {
        self.lock().required_token = Some(token.to_string());
        self
    }

    /// Makes the next call of kind `op` fail with `status`.
    pub fn fail_next(&self, op: Op, status: u16) {
        self.lock().failures.push((op, status));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn shelf(&self, shelf: ShelfId) -> Vec<Book> {
        self.lock().shelves[shelf.index()].clone()
    }

    pub fn set_shelf(&self, shelf: ShelfId, books: Vec<Book>) {
        self.lock().shelves[shelf.index()] = books;
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn record(&mut self, op: Op, call: Call, path: &str) -> ApiResult<()> {
        self.calls.push(call);
        if let Some(pos) = self.failures.iter().position(|(failing, _)| *failing == op) {
            let (_, status) = self.failures.remove(pos);
            return Err(status_error(path, status));
        }
        Ok(())
    }
}

fn status_error(path: &str, status: u16) -> ApiError {
    ApiError::Status {
        url: format!("http://books.test/Production/{path}"),
        status,
        body: format!("injected failure {status}"),
    }
}

impl BookApi for RecordingApi {
    fn set_token(&mut self, token: Option<String>) {
        self.lock().token = token;
    }

    fn fetch_shelf(&self, shelf: ShelfId) -> ApiResult<Vec<Book>> {
        let mut state = self.lock();
        state.record(Op::Fetch, Call::FetchShelf(shelf), "fetch")?;
        if let Some(required) = &state.required_token
            && state.token.as_ref() != Some(required)
        {
            return Err(status_error("fetch", 401));
        }
        Ok(state.shelves[shelf.index()].clone())
    }

    fn add_books(&self, books: &[NewBook]) -> ApiResult<()> {
        let mut state = self.lock();
        state.record(Op::Add, Call::AddBooks(books.to_vec()), "AddBookFunction")?;
        for new in books {
            for shelf in ShelfId::ALL {
                if !new.table.includes(shelf) {
                    continue;
                }
                let id = BookId(state.next_id);
                state.next_id += 1;
                state.shelves[shelf.index()].push(Book {
                    id,
                    title: new.title.clone(),
                    author: new.author.clone(),
                    genre: new.genre.clone(),
                    tbr: new.tbr,
                });
            }
        }
        Ok(())
    }

    fn update_book(&self, shelf: ShelfId, id: BookId, update: &BookUpdate) -> ApiResult<()> {
        let mut state = self.lock();
        let call = Call::UpdateBook {
            shelf,
            id,
            update: update.clone(),
        };
        state.record(Op::Update, call, "updateBooks")?;
        let Some(book) = state.shelves[shelf.index()]
            .iter_mut()
            .find(|book| book.id == id)
        else {
            return Err(status_error("updateBooks", 404));
        };
        book.title = update.title.clone();
        book.author = update.author.clone();
        book.genre = update.genre.clone();
        book.tbr = update.tbr;
        Ok(())
    }

    fn delete_book(&self, id: BookId) -> ApiResult<()> {
        let mut state = self.lock();
        state.record(Op::Delete, Call::DeleteBook(id), "deleteBook")?;
        for books in state.shelves.iter_mut() {
            books.retain(|book| book.id != id);
        }
        Ok(())
    }
}

/// Executes queued requests against `api` and applies their responses until
/// nothing is left to send. Returns the number of requests executed.
pub fn settle(ctx: &mut AppContext, api: &mut dyn BookApi, now: Instant) -> usize {
    let mut executed = 0;
    loop {
        let requests = ctx.take_requests();
        if requests.is_empty() {
            return executed;
        }
        for request in requests {
            executed += 1;
            if let Some(response) = twinshelf_remote::execute(&mut *api, request) {
                ctx.apply_response(response, now);
            }
        }
    }
}

/// A context that has signed in against `api` and loaded both shelves.
pub fn signed_in(api: &mut RecordingApi, now: Instant) -> AppContext {
    let mut ctx = AppContext::new(make_settings());
    ctx.sign_in("secret", now);
    settle(&mut ctx, api, now);
    ctx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_settings() {
        let settings = make_settings();
        assert_eq!(settings.picker_cycle_ms, 1_000);
        assert_eq!(settings.first_owner, "Brooke");
    }

    #[test]
    fn recording_api_assigns_ids_per_target_shelf() -> ApiResult<()> {
        let api = RecordingApi::new(
            vec![book(3, "Dune", "Frank Herbert", Genre::SciFi, false)],
            Vec::new(),
        );
        api.add_books(&[new_book("Emma", Genre::Classics, TableTarget::Both)])?;
        let first = api.shelf(ShelfId::First);
        let second = api.shelf(ShelfId::Second);
        assert_eq!(first.last().map(|b| b.id), Some(BookId(4)));
        assert_eq!(second.last().map(|b| b.id), Some(BookId(5)));
        Ok(())
    }

    #[test]
    fn injected_failure_fires_once() {
        let api = RecordingApi::default();
        api.fail_next(Op::Delete, 500);
        assert!(api.delete_book(BookId(1)).is_err());
        assert!(api.delete_book(BookId(1)).is_ok());
        assert_eq!(api.calls().len(), 2);
    }
}

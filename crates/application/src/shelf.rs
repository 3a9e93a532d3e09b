//! Per-shelf record store and its sort controller.

use std::cmp::Ordering;

use twinshelf_core::{Book, BookId, ShelfId};

use crate::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Title,
    Author,
    Tbr,
}

impl SortColumn {
    pub const ALL: [SortColumn; 3] = [SortColumn::Title, SortColumn::Author, SortColumn::Tbr];

    pub fn label(&self) -> &'static str {
        match self {
            SortColumn::Title => "Title",
            SortColumn::Author => "Author",
            SortColumn::Tbr => "TBR",
        }
    }

    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        match self {
            SortColumn::Title => a.title.cmp(&b.title),
            SortColumn::Author => a.author.cmp(&b.author),
            SortColumn::Tbr => a.tbr.cmp(&b.tbr),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortState {
    #[default]
    Unsorted,
    Ascending(SortColumn),
    Descending(SortColumn),
}

impl SortState {
    pub fn click(self, column: SortColumn) -> SortState {
        match self {
            SortState::Ascending(current) if current == column => SortState::Descending(column),
            SortState::Descending(current) if current == column => SortState::Unsorted,
            _ => SortState::Ascending(column),
        }
    }

    pub fn direction_for(&self, column: SortColumn) -> Option<SortDirection> {
        match *self {
            SortState::Ascending(current) if current == column => Some(SortDirection::Ascending),
            SortState::Descending(current) if current == column => {
                Some(SortDirection::Descending)
            }
            _ => None,
        }
    }
}

/// Stable sort of `books` by `column`; equal keys keep their prior order in
/// both directions.
pub fn sort_books(books: &mut [Book], column: SortColumn, direction: SortDirection) {
    books.sort_by(|a, b| {
        let ord = column.compare(a, b);
        match direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
}

#[derive(Debug, Clone)]
pub struct ShelfStore {
    shelf: ShelfId,
    books: Vec<Book>,
    sort: SortState,
    issued_seq: u64,
    settled_seq: u64,
    applied_seq: u64,
    loaded: bool,
}

impl ShelfStore {
    pub fn new(shelf: ShelfId) -> Self {
        Self {
            shelf,
            books: Vec::new(),
            sort: SortState::Unsorted,
            issued_seq: 0,
            settled_seq: 0,
            applied_seq: 0,
            loaded: false,
        }
    }

    /// Forgets the records of the current session. Sequence numbers keep
    /// counting so a response issued before the reset is still stale.
    pub fn reset(&mut self) {
        self.books.clear();
        self.sort = SortState::Unsorted;
        self.settled_seq = self.issued_seq;
        self.applied_seq = self.issued_seq;
        self.loaded = false;
    }

    pub fn shelf(&self) -> ShelfId {
        self.shelf
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn sort(&self) -> SortState {
        self.sort
    }

    pub fn has_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.issued_seq > self.settled_seq
    }

    pub fn read_count(&self) -> usize {
        self.books.iter().filter(|book| book.tbr).count()
    }

    pub fn unread_count(&self) -> usize {
        self.books.len() - self.read_count()
    }

    pub fn request_refetch(&mut self) -> ApiRequest {
        self.issued_seq += 1;
        ApiRequest::FetchShelf {
            shelf: self.shelf,
            seq: self.issued_seq,
        }
    }

    /// Replaces the records with a fetch result. Returns `false` when the
    /// response is older than one already applied.
    pub fn apply_fetch(&mut self, seq: u64, books: Vec<Book>) -> bool {
        self.settled_seq = self.settled_seq.max(seq);
        if seq <= self.applied_seq {
            tracing::debug!(shelf = ?self.shelf, seq, applied = self.applied_seq, "dropping stale shelf response");
            return false;
        }
        self.applied_seq = seq;
        self.loaded = true;
        self.books = books;
        self.sort = SortState::Unsorted;
        true
    }

    pub fn fetch_failed(&mut self, seq: u64) {
        self.settled_seq = self.settled_seq.max(seq);
    }

    /// Advances the sort state for `column`. Reorders in place, or returns
    /// the refetch request when the column returns to unsorted.
    pub fn click_sort(&mut self, column: SortColumn) -> Option<ApiRequest> {
        self.sort = self.sort.click(column);
        match self.sort {
            SortState::Unsorted => Some(self.request_refetch()),
            SortState::Ascending(column) => {
                sort_books(&mut self.books, column, SortDirection::Ascending);
                None
            }
            SortState::Descending(column) => {
                sort_books(&mut self.books, column, SortDirection::Descending);
                None
            }
        }
    }

    pub fn find(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }
}

//! Add / update / delete form state.

use twinshelf_core::{Book, BookId, BookUpdate, Genre, NewBook, ShelfId, TableTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Author,
    Genre,
    Tbr,
    Table,
}

impl FormField {
    pub fn label(&self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Author => "Author",
            FormField::Genre => "Genre",
            FormField::Tbr => "To Be Read",
            FormField::Table => "Table",
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FormField::Title | FormField::Author)
    }

    /// Next field in tab order; the update form has no table field.
    pub fn next(self, with_table: bool) -> FormField {
        match self {
            FormField::Title => FormField::Author,
            FormField::Author => FormField::Genre,
            FormField::Genre => FormField::Tbr,
            FormField::Tbr if with_table => FormField::Table,
            FormField::Tbr | FormField::Table => FormField::Title,
        }
    }

    pub fn prev(self, with_table: bool) -> FormField {
        match self {
            FormField::Title if with_table => FormField::Table,
            FormField::Title => FormField::Tbr,
            FormField::Author => FormField::Title,
            FormField::Genre => FormField::Author,
            FormField::Tbr => FormField::Genre,
            FormField::Table => FormField::Tbr,
        }
    }
}

fn edit_text<'a>(
    field: FormField,
    title: &'a mut String,
    author: &'a mut String,
) -> Option<&'a mut String> {
    match field {
        FormField::Title => Some(title),
        FormField::Author => Some(author),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub genre: Option<Genre>,
    pub tbr: bool,
    pub table: Option<TableTarget>,
}

impl BookDraft {
    pub fn input_char(&mut self, field: FormField, ch: char) {
        if let Some(text) = edit_text(field, &mut self.title, &mut self.author) {
            text.push(ch);
        }
    }

    pub fn backspace(&mut self, field: FormField) {
        if let Some(text) = edit_text(field, &mut self.title, &mut self.author) {
            text.pop();
        }
    }

    pub fn cycle(&mut self, field: FormField, forward: bool) {
        match field {
            FormField::Genre => self.genre = Genre::cycle_option(self.genre.as_ref(), forward),
            FormField::Tbr => self.tbr = !self.tbr,
            FormField::Table => self.table = TableTarget::cycle_option(self.table, forward),
            FormField::Title | FormField::Author => {}
        }
    }

    fn checked(&self) -> Result<(Genre, TableTarget), FormField> {
        if self.title.trim().is_empty() {
            return Err(FormField::Title);
        }
        if self.author.trim().is_empty() {
            return Err(FormField::Author);
        }
        let Some(genre) = self.genre.clone() else {
            return Err(FormField::Genre);
        };
        let Some(table) = self.table else {
            return Err(FormField::Table);
        };
        Ok((genre, table))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftError {
    pub index: usize,
    pub field: FormField,
}

impl std::fmt::Display for DraftError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "book {}: {} is required", self.index + 1, self.field.label())
    }
}

impl std::error::Error for DraftError {}

/// Pages through one or more drafts and submits them as one batch.
#[derive(Debug, Clone)]
pub struct AddForm {
    pub open: bool,
    pub field: FormField,
    pub submitting: bool,
    drafts: Vec<BookDraft>,
    current: usize,
}

impl Default for AddForm {
    fn default() -> Self {
        Self {
            open: false,
            field: FormField::Title,
            submitting: false,
            drafts: vec![BookDraft::default()],
            current: 0,
        }
    }
}

impl AddForm {
    pub fn drafts(&self) -> &[BookDraft] {
        &self.drafts
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &BookDraft {
        &self.drafts[self.current]
    }

    pub fn current_mut(&mut self) -> &mut BookDraft {
        &mut self.drafts[self.current]
    }

    pub fn add_draft(&mut self) {
        self.drafts.push(BookDraft::default());
        self.current = self.drafts.len() - 1;
        self.field = FormField::Title;
    }

    pub fn prev_draft(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    pub fn next_draft(&mut self) {
        if self.current + 1 < self.drafts.len() {
            self.current += 1;
        }
    }

    /// Converts every draft, or focuses and reports the first missing field.
    pub fn validate(&mut self) -> Result<Vec<NewBook>, DraftError> {
        let mut books = Vec::with_capacity(self.drafts.len());
        for (index, draft) in self.drafts.iter().enumerate() {
            let (genre, table) = match draft.checked() {
                Ok(checked) => checked,
                Err(field) => {
                    self.current = index;
                    self.field = field;
                    return Err(DraftError { index, field });
                }
            };
            books.push(NewBook {
                title: draft.title.trim().to_string(),
                author: draft.author.trim().to_string(),
                genre,
                tbr: draft.tbr,
                table,
            });
        }
        Ok(books)
    }

    pub fn reset(&mut self) {
        *self = AddForm::default();
    }
}

/// Edits a copy of one record; the original stays untouched until the
/// remote store accepts the replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateForm {
    pub shelf: ShelfId,
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub tbr: bool,
    pub field: FormField,
    pub submitting: bool,
}

impl UpdateForm {
    pub fn from_book(shelf: ShelfId, book: &Book) -> Self {
        Self {
            shelf,
            id: book.id,
            title: book.title.clone(),
            author: book.author.clone(),
            genre: book.genre.clone(),
            tbr: book.tbr,
            field: FormField::Title,
            submitting: false,
        }
    }

    pub fn input_char(&mut self, ch: char) {
        if let Some(text) = edit_text(self.field, &mut self.title, &mut self.author) {
            text.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = edit_text(self.field, &mut self.title, &mut self.author) {
            text.pop();
        }
    }

    pub fn cycle(&mut self, forward: bool) {
        match self.field {
            FormField::Genre => self.genre = self.genre.cycle(forward),
            FormField::Tbr => self.tbr = !self.tbr,
            _ => {}
        }
    }

    pub fn to_update(&self) -> Result<BookUpdate, FormField> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormField::Title);
        }
        let author = self.author.trim();
        if author.is_empty() {
            return Err(FormField::Author);
        }
        Ok(BookUpdate {
            title: title.to_string(),
            author: author.to_string(),
            genre: self.genre.clone(),
            tbr: self.tbr,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirm {
    pub shelf: ShelfId,
    pub id: BookId,
    pub title: String,
    pub submitting: bool,
}

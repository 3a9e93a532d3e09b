//! Live search criteria applied to both shelves.

use twinshelf_core::{Book, Genre};

/// Criteria shared by both shelves. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub title: String,
    pub author: String,
    pub genre: Option<Genre>,
}

impl SearchCriteria {
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty() && self.author.trim().is_empty() && self.genre.is_none()
    }

    pub fn clear(&mut self) {
        *self = SearchCriteria::default();
    }

    pub fn matches(&self, book: &Book) -> bool {
        contains_ignore_case(&book.title, &self.title)
            && contains_ignore_case(&book.author, &self.author)
            && self
                .genre
                .as_ref()
                .is_none_or(|genre| genre.eq_ignore_case(&book.genre))
    }

    pub fn filter<'a>(&self, books: &'a [Book]) -> Vec<&'a Book> {
        books.iter().filter(|book| self.matches(book)).collect()
    }

    pub fn summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        let title = self.title.trim();
        if !title.is_empty() {
            parts.push(format!("title: {title}"));
        }
        let author = self.author.trim();
        if !author.is_empty() {
            parts.push(format!("author: {author}"));
        }
        if let Some(genre) = &self.genre {
            parts.push(format!("genre: {genre}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("  |  "))
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

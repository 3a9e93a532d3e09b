//! Core domain types for Twinshelf.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub i64);

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Genre of a book. The remote store may hold labels outside the fixed set;
/// those are kept verbatim in [`Genre::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Genre {
    Romance,
    DarkRomance,
    YoungAdult,
    SciFi,
    MysteryThriller,
    Fiction,
    MangaComics,
    Nonfiction,
    Classics,
    Horror,
    SelfHelp,
    Other(String),
}

impl Genre {
    pub const ALL: [Genre; 11] = [
        Genre::Romance,
        Genre::DarkRomance,
        Genre::YoungAdult,
        Genre::SciFi,
        Genre::MysteryThriller,
        Genre::Fiction,
        Genre::MangaComics,
        Genre::Nonfiction,
        Genre::Classics,
        Genre::Horror,
        Genre::SelfHelp,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Genre::Romance => "Romance",
            Genre::DarkRomance => "Dark Romance",
            Genre::YoungAdult => "YA",
            Genre::SciFi => "Sci-Fi",
            Genre::MysteryThriller => "Mystery/Thriller",
            Genre::Fiction => "Fiction",
            Genre::MangaComics => "Manga/Comics",
            Genre::Nonfiction => "Nonfiction",
            Genre::Classics => "Classics",
            Genre::Horror => "Horror",
            Genre::SelfHelp => "Self-Help",
            Genre::Other(label) => label,
        }
    }

    /// Resolves a label against the fixed set, ignoring case and surrounding
    /// whitespace.
    pub fn from_label(label: &str) -> Genre {
        let label = label.trim();
        Genre::ALL
            .iter()
            .find(|genre| genre.as_str().eq_ignore_ascii_case(label))
            .cloned()
            .unwrap_or_else(|| Genre::Other(label.to_string()))
    }

    pub fn eq_ignore_case(&self, other: &Genre) -> bool {
        self.as_str().to_lowercase() == other.as_str().to_lowercase()
    }

    fn position(&self) -> Option<usize> {
        Genre::ALL.iter().position(|genre| genre == self)
    }

    /// Steps through the fixed set with an empty slot at both ends.
    pub fn cycle_option(current: Option<&Genre>, forward: bool) -> Option<Genre> {
        let last = Genre::ALL.len() - 1;
        let next = match (current.and_then(Genre::position), forward) {
            (None, true) => Some(0),
            (None, false) => Some(last),
            (Some(idx), true) if idx == last => None,
            (Some(idx), true) => Some(idx + 1),
            (Some(0), false) => None,
            (Some(idx), false) => Some(idx - 1),
        };
        next.map(|idx| Genre::ALL[idx].clone())
    }

    /// Like [`Genre::cycle_option`] but never lands on the empty slot.
    pub fn cycle(&self, forward: bool) -> Genre {
        Genre::cycle_option(Some(self), forward)
            .or_else(|| Genre::cycle_option(None, forward))
            .unwrap_or(Genre::Romance)
    }
}

impl std::fmt::Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Genre {
    fn from(value: String) -> Self {
        Genre::from_label(&value)
    }
}

impl From<Genre> for String {
    fn from(value: Genre) -> Self {
        value.as_str().to_string()
    }
}

/// A record as served by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    #[serde(rename = "ID")]
    pub id: BookId,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Genre")]
    pub genre: Genre,
    /// `true` is displayed as "Read"; the random picker draws from `false`.
    #[serde(rename = "TBR", default)]
    pub tbr: bool,
}

impl Book {
    pub fn is_unread(&self) -> bool {
        !self.tbr
    }
}

pub fn tbr_label(tbr: bool) -> &'static str {
    if tbr { "Read" } else { "Not Read" }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShelfId {
    First,
    Second,
}

impl ShelfId {
    pub const ALL: [ShelfId; 2] = [ShelfId::First, ShelfId::Second];

    pub fn index(self) -> usize {
        match self {
            ShelfId::First => 0,
            ShelfId::Second => 1,
        }
    }

    pub fn other(self) -> ShelfId {
        match self {
            ShelfId::First => ShelfId::Second,
            ShelfId::Second => ShelfId::First,
        }
    }
}

/// Which shelf (or both) an added book or a random pick applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableTarget {
    First,
    Second,
    Both,
}

impl TableTarget {
    pub const ALL: [TableTarget; 3] = [TableTarget::First, TableTarget::Second, TableTarget::Both];

    pub fn includes(self, shelf: ShelfId) -> bool {
        matches!(
            (self, shelf),
            (TableTarget::Both, _)
                | (TableTarget::First, ShelfId::First)
                | (TableTarget::Second, ShelfId::Second)
        )
    }

    pub fn cycle(self, forward: bool) -> TableTarget {
        let idx = TableTarget::ALL
            .iter()
            .position(|t| *t == self)
            .unwrap_or(0);
        let len = TableTarget::ALL.len();
        let next = if forward {
            (idx + 1) % len
        } else {
            (idx + len - 1) % len
        };
        TableTarget::ALL[next]
    }

    pub fn cycle_option(current: Option<TableTarget>, forward: bool) -> Option<TableTarget> {
        match (current, forward) {
            (None, true) => Some(TableTarget::First),
            (None, false) => Some(TableTarget::Both),
            (Some(TableTarget::Both), true) | (Some(TableTarget::First), false) => None,
            (Some(target), forward) => Some(target.cycle(forward)),
        }
    }
}

/// A book to be created; `table` decides which shelf(s) receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub genre: Genre,
    pub tbr: bool,
    pub table: TableTarget,
}

/// Full replacement body for an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Author")]
    pub author: String,
    #[serde(rename = "Genre")]
    pub genre: Genre,
    #[serde(rename = "TBR")]
    pub tbr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Theme {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            _ => Err("unknown theme"),
        }
    }
}

/// Endpoint paths, relative to [`Settings::api_base_url`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub fetch_first: String,
    pub fetch_second: String,
    pub add: String,
    pub update_first: String,
    pub update_second: String,
    pub delete: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            fetch_first: "brookesBooks".to_string(),
            fetch_second: "crystalsBooks".to_string(),
            add: "AddBookFunction".to_string(),
            update_first: "updateBooks".to_string(),
            update_second: "UpdateCrystalsBooks".to_string(),
            delete: "deleteBook".to_string(),
        }
    }
}

impl Endpoints {
    pub fn fetch(&self, shelf: ShelfId) -> &str {
        match shelf {
            ShelfId::First => &self.fetch_first,
            ShelfId::Second => &self.fetch_second,
        }
    }

    pub fn update(&self, shelf: ShelfId) -> &str {
        match shelf {
            ShelfId::First => &self.update_first,
            ShelfId::Second => &self.update_second,
        }
    }

    fn normalize(&mut self) {
        let defaults = Endpoints::default();
        for (value, default) in [
            (&mut self.fetch_first, defaults.fetch_first),
            (&mut self.fetch_second, defaults.fetch_second),
            (&mut self.add, defaults.add),
            (&mut self.update_first, defaults.update_first),
            (&mut self.update_second, defaults.update_second),
            (&mut self.delete, defaults.delete),
        ] {
            let trimmed = value.trim().trim_matches('/').to_string();
            *value = if trimmed.is_empty() { default } else { trimmed };
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub endpoints: Endpoints,
    pub first_owner: String,
    pub second_owner: String,
    pub first_key: String,
    pub second_key: String,
    pub theme: Theme,
    pub picker_step_ms: u64,
    pub picker_cycle_ms: u64,
    pub toast_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/Production".to_string(),
            endpoints: Endpoints::default(),
            first_owner: "Brooke".to_string(),
            second_owner: "Crystal".to_string(),
            first_key: "brookes".to_string(),
            second_key: "crystals".to_string(),
            theme: Theme::Dark,
            picker_step_ms: 100,
            picker_cycle_ms: 3000,
            toast_ms: 5000,
            request_timeout_secs: 15,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        let defaults = Settings::default();
        self.api_base_url = self.api_base_url.trim().trim_end_matches('/').to_string();
        if self.api_base_url.is_empty() {
            self.api_base_url = defaults.api_base_url;
        }
        self.endpoints.normalize();
        for (value, default) in [
            (&mut self.first_owner, defaults.first_owner),
            (&mut self.second_owner, defaults.second_owner),
            (&mut self.first_key, defaults.first_key),
            (&mut self.second_key, defaults.second_key),
        ] {
            let trimmed = value.trim().to_string();
            *value = if trimmed.is_empty() { default } else { trimmed };
        }
        self.picker_step_ms = self.picker_step_ms.clamp(20, 2_000);
        self.picker_cycle_ms = self.picker_cycle_ms.clamp(self.picker_step_ms, 60_000);
        self.toast_ms = self.toast_ms.clamp(500, 60_000);
        self.request_timeout_secs = self.request_timeout_secs.clamp(1, 300);
    }

    pub fn cycle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        };
    }

    pub fn owner(&self, shelf: ShelfId) -> &str {
        match shelf {
            ShelfId::First => &self.first_owner,
            ShelfId::Second => &self.second_owner,
        }
    }

    pub fn shelf_title(&self, shelf: ShelfId) -> String {
        format!("{}'s Shelf", self.owner(shelf))
    }

    /// The wire value of the `table` field when adding books.
    pub fn table_key(&self, target: TableTarget) -> &str {
        match target {
            TableTarget::First => &self.first_key,
            TableTarget::Second => &self.second_key,
            TableTarget::Both => "both",
        }
    }

    pub fn table_label(&self, target: TableTarget) -> &str {
        match target {
            TableTarget::First => &self.first_owner,
            TableTarget::Second => &self.second_owner,
            TableTarget::Both => "Both",
        }
    }

    pub fn picker_step(&self) -> Duration {
        Duration::from_millis(self.picker_step_ms)
    }

    pub fn picker_cycle(&self) -> Duration {
        Duration::from_millis(self.picker_cycle_ms)
    }

    pub fn toast_lifetime(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

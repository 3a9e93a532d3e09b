//! HTTP access to the remote book store.

use std::time::Instant;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use thiserror::Error;
use twinshelf_application::{ApiFailure, ApiRequest, ApiResponse};
use twinshelf_core::{Book, BookId, BookUpdate, NewBook, Settings, ShelfId};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }

    pub fn to_failure(&self) -> ApiFailure {
        if self.is_unauthorized() {
            ApiFailure::unauthorized(self.to_string())
        } else {
            ApiFailure::new(self.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// The remote store's CRUD contract.
pub trait BookApi {
    fn set_token(&mut self, token: Option<String>);
    fn fetch_shelf(&self, shelf: ShelfId) -> Result<Vec<Book>>;
    fn add_books(&self, books: &[NewBook]) -> Result<()>;
    fn update_book(&self, shelf: ShelfId, id: BookId, update: &BookUpdate) -> Result<()>;
    fn delete_book(&self, id: BookId) -> Result<()>;
}

/// Runs one request against `api` and packages the outcome for the client
/// state. `SignOut` has no response.
pub fn execute(api: &mut dyn BookApi, request: ApiRequest) -> Option<ApiResponse> {
    let started = Instant::now();
    let response = match request {
        ApiRequest::SignIn { token } => {
            api.set_token(Some(token));
            let result = api.fetch_shelf(ShelfId::First).map(|_| ());
            if result.is_err() {
                api.set_token(None);
            }
            ApiResponse::SignedIn {
                result: result.map_err(|err| failure("sign in", &err)),
            }
        }
        ApiRequest::SignOut => {
            api.set_token(None);
            return None;
        }
        ApiRequest::FetchShelf { shelf, seq } => ApiResponse::ShelfFetched {
            shelf,
            seq,
            result: api
                .fetch_shelf(shelf)
                .map_err(|err| failure("fetch shelf", &err)),
        },
        ApiRequest::AddBooks { books } => ApiResponse::BooksAdded {
            result: api
                .add_books(&books)
                .map(|()| books.len())
                .map_err(|err| failure("add books", &err)),
        },
        ApiRequest::UpdateBook { shelf, id, update } => ApiResponse::BookUpdated {
            shelf,
            id,
            result: api
                .update_book(shelf, id, &update)
                .map_err(|err| failure("update book", &err)),
        },
        ApiRequest::DeleteBook { shelf, id } => ApiResponse::BookDeleted {
            shelf,
            id,
            result: api
                .delete_book(id)
                .map_err(|err| failure("delete book", &err)),
        },
    };
    tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "request finished");
    Some(response)
}

fn failure(action: &str, err: &ApiError) -> ApiFailure {
    tracing::warn!(action, error = %err, "request failed");
    err.to_failure()
}

#[derive(Serialize)]
struct AddBooksBody<'a> {
    books: Vec<WireNewBook<'a>>,
}

#[derive(Serialize)]
struct WireNewBook<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Author")]
    author: &'a str,
    #[serde(rename = "Genre")]
    genre: &'a str,
    #[serde(rename = "TBR")]
    tbr: bool,
    table: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpBookApi {
    base_url: String,
    settings: Settings,
    token: Option<String>,
    client: Client,
}

impl HttpBookApi {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            settings: settings.clone(),
            token: None,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let parsed = reqwest::Url::parse(&url).map_err(|err| ApiError::InvalidUrl {
            url: url.clone(),
            reason: err.to_string(),
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ApiError::InvalidUrl {
                url,
                reason: format!("unsupported scheme {other}"),
            }),
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<String> {
        let response = self
            .authorized(request)
            .send()
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;
        let status = response.status();
        let body = response.text().map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        check_status(url, status, body)
    }
}

fn check_status(url: &str, status: StatusCode, body: String) -> Result<String> {
    if status.is_success() {
        Ok(body)
    } else {
        Err(ApiError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

impl BookApi for HttpBookApi {
    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn fetch_shelf(&self, shelf: ShelfId) -> Result<Vec<Book>> {
        let url = self.url_for(self.settings.endpoints.fetch(shelf))?;
        tracing::info!(?shelf, %url, "fetching shelf");
        let body = self.send(&url, self.client.get(&url))?;
        serde_json::from_str(&body).map_err(|source| ApiError::Decode { url, source })
    }

    fn add_books(&self, books: &[NewBook]) -> Result<()> {
        let url = self.url_for(&self.settings.endpoints.add)?;
        let body = AddBooksBody {
            books: books
                .iter()
                .map(|book| WireNewBook {
                    title: &book.title,
                    author: &book.author,
                    genre: book.genre.as_str(),
                    tbr: book.tbr,
                    table: self.settings.table_key(book.table),
                })
                .collect(),
        };
        tracing::info!(count = books.len(), %url, "adding books");
        self.send(&url, self.client.post(&url).json(&body))?;
        Ok(())
    }

    fn update_book(&self, shelf: ShelfId, id: BookId, update: &BookUpdate) -> Result<()> {
        let url = self.url_for(self.settings.endpoints.update(shelf))?;
        tracing::info!(?shelf, %id, %url, "updating book");
        let request = self.client.post(&url).query(&[("id", id.0)]).json(update);
        self.send(&url, request)?;
        Ok(())
    }

    fn delete_book(&self, id: BookId) -> Result<()> {
        let url = self.url_for(&self.settings.endpoints.delete)?;
        tracing::info!(%id, %url, "deleting book");
        let request = self.client.delete(&url).query(&[("id", id.0)]);
        self.send(&url, request)?;
        Ok(())
    }
}

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use anyhow::Context as _;
use twinshelf_application::{ApiRequest, ApiResponse};
use twinshelf_remote::BookApi;

/// Owns the API client on a background thread so the UI never blocks on the
/// network. Requests are executed strictly in submission order.
pub(crate) struct RequestWorker {
    requests: Sender<ApiRequest>,
    responses: Receiver<ApiResponse>,
}

impl RequestWorker {
    pub(crate) fn spawn(mut api: Box<dyn BookApi + Send>) -> anyhow::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel::<ApiRequest>();
        let (response_tx, response_rx) = mpsc::channel();

        thread::Builder::new()
            .name("twinshelf-requests".to_string())
            .spawn(move || {
                for request in request_rx {
                    let Some(response) = twinshelf_remote::execute(api.as_mut(), request) else {
                        continue;
                    };
                    if response_tx.send(response).is_err() {
                        break;
                    }
                }
                tracing::debug!("request worker stopped");
            })
            .context("spawn request worker")?;

        Ok(Self {
            requests: request_tx,
            responses: response_rx,
        })
    }

    pub(crate) fn send(&self, request: ApiRequest) -> anyhow::Result<()> {
        self.requests
            .send(request)
            .map_err(|_| anyhow::anyhow!("request worker is no longer running"))
    }

    pub(crate) fn try_recv(&self) -> anyhow::Result<Option<ApiResponse>> {
        match self.responses.try_recv() {
            Ok(response) => Ok(Some(response)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(anyhow::anyhow!("request worker is no longer running"))
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn recv_timeout(&self, timeout: std::time::Duration) -> Option<ApiResponse> {
        self.responses.recv_timeout(timeout).ok()
    }
}

//! Model repository on top of a plain HTTP blob store.
//!
//! Models are uploaded with `PUT <base>/<run id>/model.bin` and fetched with
//! `GET` on the same URL; a `404` means nothing was stored for the run.

use anyhow::Context;
use std::io::Read;
use tracing::debug;

use crate::{
    api::{
        error::{Error, Result},
        model::ModelArtifact,
        repository::ModelRepository,
    },
    RunId,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RestError {
    #[error("{status} from {url}:\n{body}")]
    Status { url: String, status: u16, body: String },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
}

fn parse_error(url: &str, response: ureq::Response) -> RestError {
    if let Some(error) = response.synthetic_error() {
        return RestError::Transport {
            url: url.to_owned(),
            message: error.to_string(),
        };
    }
    let status = response.status();
    let body = response
        .into_string()
        .unwrap_or_else(|_| "Could not turn error body into String.".to_string());
    RestError::Status {
        url: url.to_owned(),
        status,
        body,
    }
}

#[derive(Debug, Clone)]
pub struct HttpModelRepository {
    base_url: String,
}

impl HttpModelRepository {
    /// The `base_url` should be something like `http://127.0.0.1:8080/models`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        HttpModelRepository { base_url }
    }

    fn model_url(&self, run: &RunId) -> String {
        format!("{}/{}/model.bin", self.base_url, run)
    }
}

impl ModelRepository for HttpModelRepository {
    fn save_model(&self, run: &RunId, model: &[u8]) -> Result<ModelArtifact> {
        let url = self.model_url(run);
        let response = ureq::put(&url)
            .set("Content-Type", "application/octet-stream")
            .send_bytes(model);
        if response.error() {
            return Err(Error::Backend(parse_error(&url, response).into()));
        }
        debug!(run_id = %run, url = %url, "uploaded model");
        Ok(ModelArtifact {
            run_id: *run,
            location: url,
            size: model.len() as u64,
            saved_at: crate::timestamp(),
        })
    }

    fn load_model(&self, run: &RunId) -> Result<Vec<u8>> {
        let url = self.model_url(run);
        let response = ureq::get(&url).call();
        if response.error() {
            return match parse_error(&url, response) {
                RestError::Status { status: 404, .. } => Err(Error::ModelNotFound(*run)),
                error => Err(Error::Backend(error.into())),
            };
        }
        let mut model = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut model)
            .with_context(|| format!("failed to read model body from {}", url))?;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread::{self, JoinHandle},
    };

    // Answers a single request with `response` and returns the base URL.
    fn serve_once(response: &'static str) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/models", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                let read = stream.read(&mut buffer).unwrap();
                if read == 0 {
                    break;
                }
                request.extend_from_slice(&buffer[..read]);
            }
            stream.write_all(response.as_bytes()).unwrap();
        });
        (url, handle)
    }

    #[test]
    fn missing_model_maps_to_model_not_found() {
        let (url, server) =
            serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        let run = RunId::generate();
        let result = HttpModelRepository::new(url).load_model(&run);
        server.join().unwrap();
        assert!(matches!(result, Err(Error::ModelNotFound(id)) if id == run));
    }

    #[test]
    fn server_error_maps_to_backend_failure() {
        let (url, server) = serve_once(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 4\r\nConnection: close\r\n\r\nboom",
        );
        let result = HttpModelRepository::new(url).load_model(&RunId::generate());
        server.join().unwrap();
        let err = result.unwrap_err();
        assert!(matches!(err, Error::Backend(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn stored_model_is_returned() {
        let (url, server) =
            serve_once("HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nweights");
        let model = HttpModelRepository::new(url).load_model(&RunId::generate()).unwrap();
        server.join().unwrap();
        assert_eq!(model, b"weights".to_vec());
    }

    #[test]
    fn model_url_ignores_trailing_slashes() {
        let repository = HttpModelRepository::new("http://127.0.0.1:8080/models//");
        let run: RunId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(
            repository.model_url(&run),
            "http://127.0.0.1:8080/models/67e55044-10b1-426f-9247-bb680e5fe0c8/model.bin"
        );
    }

    #[test]
    fn status_errors_keep_the_body() {
        let error = RestError::Status {
            url: "http://localhost/x".to_owned(),
            status: 500,
            body: "boom".to_owned(),
        };
        assert_eq!(error.to_string(), "500 from http://localhost/x:\nboom");
    }
}

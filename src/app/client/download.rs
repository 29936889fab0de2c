//! File download operations with streaming and atomic relocation
//!
//! The response body is streamed into a temporary file inside the downloads directory
//! and renamed to its final name only once the outcome is known, so an interrupted
//! download never leaves a partial file under a real name.
//!
//! Classification differs from data requests because the body is a file, not a value:
//! a success status with a non-empty file is the result; a failure status with a
//! non-empty file is read back as an error envelope; anything else is an error built
//! from the status alone.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_DISPOSITION, HeaderMap};
use tempfile::NamedTempFile;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::app::decoder::{RawResponse, ResponseDecoder, is_success};
use crate::app::gate::RequestContext;
use crate::app::request::ProgressSink;
use crate::constants::files;
use crate::errors::{DecodeFailure, TransportError, TransportResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
    decoder: &'a ResponseDecoder,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler with the given HTTP handler and decoder
    pub fn new(http_handler: &'a HttpHandler, decoder: &'a ResponseDecoder) -> Self {
        Self {
            http_handler,
            decoder,
        }
    }

    /// Downloads the request target into `downloads`
    ///
    /// Returns the path of the relocated file, named after the server's suggestion.
    /// An existing file with the same name is replaced.
    ///
    /// # Errors
    ///
    /// * `ServerError` - non-success status, with the envelope from the body if any
    /// * `FailedDecodingResponse(MissingResource)` - success status but an empty body
    /// * `TransportFailure` - network or file system failure while streaming
    pub async fn download(
        &self,
        request: &RequestContext,
        downloads: &Path,
    ) -> TransportResult<PathBuf> {
        fs::create_dir_all(downloads).await?;
        let temp = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(downloads)?;

        let mut response = self.http_handler.open(request).await?;
        let status = response.status();
        let url = response.url().clone();
        let suggested = suggested_filename(response.headers(), &url);
        let expected = response
            .content_length()
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(-1);

        let written = stream_to_file(
            &mut response,
            &temp,
            request.descriptor.progress.as_ref(),
            expected,
        )
        .await?;

        if is_success(status) {
            if written == 0 {
                warn!("Download from {} succeeded without content", url);
                return Err(DecodeFailure::MissingResource.into());
            }

            let destination = downloads.join(&suggested);
            temp.persist(&destination)
                .map_err(|e| TransportError::from(e.error))?;
            info!(
                "Downloaded {} bytes to {}",
                written,
                destination.display()
            );
            return Ok(destination);
        }

        let body = if written > 0 {
            fs::read(temp.path()).await?
        } else {
            Vec::new()
        };
        Err(self
            .decoder
            .failure(&RawResponse::new(status, url.as_str(), body)))
    }
}

async fn stream_to_file(
    response: &mut reqwest::Response,
    temp: &NamedTempFile,
    progress: Option<&ProgressSink>,
    expected: i64,
) -> TransportResult<i64> {
    let mut file = File::from_std(temp.reopen()?);
    let mut total: i64 = 0;

    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        let written = chunk.len() as i64;
        total += written;
        if let Some(progress) = progress {
            progress.report(written, total, expected);
        }
    }
    file.flush().await?;

    debug!("Streamed {} bytes to {}", total, temp.path().display());
    Ok(total)
}

/// Name to relocate a download to.
///
/// The `Content-Disposition` file name wins, then the last non-empty URL path segment,
/// then a fixed fallback. Directory components are stripped.
pub fn suggested_filename(headers: &HeaderMap, url: &Url) -> String {
    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(disposition_filename)
        .and_then(sanitize)
        .or_else(|| {
            url.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(|segment| {
                    urlencoding::decode(segment)
                        .map(|decoded| decoded.into_owned())
                        .unwrap_or_else(|_| segment.to_string())
                })
                .and_then(sanitize)
        })
        .unwrap_or_else(|| files::DEFAULT_DOWNLOAD_NAME.to_string())
}

fn disposition_filename(value: &str) -> Option<String> {
    let mut plain = None;
    for param in value.split(';').map(str::trim) {
        let Some((name, raw)) = param.split_once('=') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.trim().rsplit("''").next().unwrap_or(raw);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => plain = Some(raw.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }
    plain
}

fn sanitize(name: String) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::{ClientConfig, ClientSettings, StagingDirs};
    use crate::app::gate::ClientContext;
    use crate::app::queue::RequestTicket;
    use crate::app::request::{Endpoint, RequestDescriptor};
    use reqwest::header::HeaderValue;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(server: &MockServer, temp: &TempDir) -> ClientContext {
        let settings = ClientSettings::new(&server.uri()).unwrap();
        let http = HttpHandler::new(ClientConfig::default().build_http_client().unwrap());
        ClientContext::new(settings, http, StagingDirs::under(temp.path()), None)
    }

    async fn run(
        context: &ClientContext,
        descriptor: RequestDescriptor,
    ) -> TransportResult<PathBuf> {
        let request = context
            .request_context(descriptor, RequestTicket::detached())
            .unwrap();
        DownloadHandler::new(context.http(), context.decoder())
            .download(&request, &context.staging().downloads)
            .await
    }

    fn leftovers(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .count()
    }

    #[tokio::test]
    async fn test_download_relocates_with_suggested_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/files/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-disposition", "attachment; filename=\"route.gpx\"")
                    .set_body_bytes(b"<gpx/>".to_vec()),
            )
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let context = context(&server, &temp);
        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let reports = reports.clone();
            ProgressSink::new(move |written, total, expected| {
                reports.lock().unwrap().push((written, total, expected));
            })
        };

        let path = run(
            &context,
            RequestDescriptor::download(Endpoint::home("/rest/files/9")).with_progress(sink),
        )
        .await
        .unwrap();

        assert_eq!(path, context.staging().downloads.join("route.gpx"));
        assert_eq!(std::fs::read(&path).unwrap(), b"<gpx/>");
        assert_eq!(leftovers(&context.staging().downloads), 0);

        let reports = reports.lock().unwrap();
        let (_, total, expected) = *reports.last().unwrap();
        assert_eq!(total, 6);
        assert_eq!(expected, 6);
    }

    #[tokio::test]
    async fn test_empty_success_is_a_missing_resource() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let context = context(&server, &temp);
        let error = run(&context, RequestDescriptor::download(Endpoint::home("/rest/files/1")))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            TransportError::FailedDecodingResponse(DecodeFailure::MissingResource)
        ));
        assert_eq!(leftovers(&context.staging().downloads), 0);
    }

    #[tokio::test]
    async fn test_failure_with_body_reads_the_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_string(r#"{"message":"Not your file","statusCode":200}"#),
            )
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let context = context(&server, &temp);
        let error = run(&context, RequestDescriptor::download(Endpoint::home("/rest/files/2")))
            .await
            .unwrap_err();

        let message = error.server_message().unwrap();
        assert_eq!(message.message, "Not your file");
        assert_eq!(message.status_code, Some(403));
    }

    #[tokio::test]
    async fn test_failure_without_body_uses_the_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let context = context(&server, &temp);
        let error = run(&context, RequestDescriptor::download(Endpoint::home("/rest/files/3")))
            .await
            .unwrap_err();

        assert_eq!(error.server_message().unwrap().message, "not found");
        assert_eq!(error.status_code(), Some(404));
    }

    #[test]
    fn test_suggested_filename_fallbacks() {
        let url = Url::parse("https://cdn.example.org/exports/ride%20one.fit").unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(suggested_filename(&headers, &url), "ride one.fit");

        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"../../etc/passwd\""),
        );
        assert_eq!(suggested_filename(&headers, &url), "passwd");

        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static(
                "attachment; filename=plain.txt; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf",
            ),
        );
        assert_eq!(suggested_filename(&headers, &url), "résumé.pdf");

        let bare = Url::parse("https://cdn.example.org/").unwrap();
        assert_eq!(suggested_filename(&HeaderMap::new(), &bare), "download");
    }
}

//! Multipart upload staging
//!
//! Uploads are assembled on disk before they are sent so large files are streamed rather
//! than held in memory. The staged payload lives at
//! `uploads/<filename>.<random>.multipart` and is removed when the `StagedUpload` is
//! dropped, whether the upload succeeded, failed or was cancelled.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::app::request::body::JSON_CONTENT_TYPE;
use crate::constants::files;
use crate::errors::{TransportError, TransportResult};

/// A multipart payload staged on disk
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    boundary: String,
    len: u64,
}

impl StagedUpload {
    /// Stage `source` (and an optional JSON part) as a multipart payload under `dir`
    ///
    /// The payload has a `filename` part with the source's file name, an `attachment`
    /// part with its contents and, when given, a `json` part.
    ///
    /// # Errors
    ///
    /// Returns `FailedEncodingRequestBody` if the source cannot be read or the payload
    /// cannot be written. No staged file is left behind.
    pub async fn stage(dir: &Path, source: &Path, json: Option<&[u8]>) -> TransportResult<Self> {
        let filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        fs::create_dir_all(dir)
            .await
            .map_err(|e| staging_error(dir, e))?;

        let mut source_file = File::open(source).await.map_err(|e| {
            TransportError::encoding(format!("cannot read {}: {}", source.display(), e))
        })?;

        let mut staged = Self {
            path: dir.join(format!(
                "{}.{}.{}",
                filename,
                random_token(8),
                files::MULTIPART_EXTENSION
            )),
            boundary: format!("rest-transport-{}", random_token(files::BOUNDARY_LENGTH)),
            len: 0,
        };

        let file = File::create(&staged.path)
            .await
            .map_err(|e| staging_error(&staged.path, e))?;
        let mut writer = BufWriter::new(file);

        staged
            .write_parts(&mut writer, &filename, &mut source_file, json)
            .await
            .map_err(|e| staging_error(&staged.path, e))?;

        staged.len = fs::metadata(&staged.path)
            .await
            .map_err(|e| staging_error(&staged.path, e))?
            .len();
        debug!("Staged {} bytes at {}", staged.len, staged.path.display());
        Ok(staged)
    }

    async fn write_parts(
        &self,
        writer: &mut BufWriter<File>,
        filename: &str,
        source: &mut File,
        json: Option<&[u8]>,
    ) -> std::io::Result<()> {
        let boundary = &self.boundary;
        let filename = header_safe(filename);

        writer
            .write_all(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"filename\"\r\n\r\n{}\r\n",
                    boundary, filename
                )
                .as_bytes(),
            )
            .await?;

        writer
            .write_all(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"attachment\"; \
                     filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    boundary, filename
                )
                .as_bytes(),
            )
            .await?;
        tokio::io::copy(source, writer).await?;
        writer.write_all(b"\r\n").await?;

        if let Some(json) = json {
            writer
                .write_all(
                    format!(
                        "--{}\r\nContent-Disposition: form-data; name=\"json\"\r\n\
                         Content-Type: {}\r\n\r\n",
                        boundary, JSON_CONTENT_TYPE
                    )
                    .as_bytes(),
                )
                .await?;
            writer.write_all(json).await?;
            writer.write_all(b"\r\n").await?;
        }

        writer
            .write_all(format!("--{}--\r\n", boundary).as_bytes())
            .await?;
        writer.flush().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Size of the staged payload in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove staged upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

fn staging_error(path: &Path, error: std::io::Error) -> TransportError {
    TransportError::encoding(format!("staging {}: {}", path.display(), error))
}

/// File name with the characters that would break a part header replaced by `_`
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

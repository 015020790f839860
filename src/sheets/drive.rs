use super::connect::{https_connector, user_agent};
use super::errors::{RemoteCall, from_drive_error};
use super::{FileMetadata, FileOperations};
use crate::auth::Credential;
use crate::error::{AppError, Result};
use crate::models::WorkbookId;
use async_trait::async_trait;
use google_drive3::api::{DriveHub, File, Scope};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use indicatif::ProgressStyle;
use std::fmt::Display;
use std::io::Write;
use tracing::{Span, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

// Reading metadata and exporting never needs write access
const AUTH_SCOPE: Scope = Scope::Readonly;

const METADATA_FIELDS: &str = "name,size,modifiedTime";

pub struct DriveClient {
    hub: DriveHub<HttpsConnector<HttpConnector>>,
}

impl DriveClient {
    /// Create a DriveClient that sends `credential` as its bearer token
    pub fn new(credential: &Credential, application_name: &str) -> Result<Self> {
        let client =
            Client::builder(hyper_util::rt::TokioExecutor::new()).build(https_connector()?);

        let mut hub = DriveHub::new(client, credential.access_token().to_string());
        hub.user_agent(user_agent(application_name));

        Ok(Self { hub })
    }
}

#[async_trait]
impl FileOperations for DriveClient {
    #[instrument(name = "Fetching file metadata", skip_all, fields(file_id = %file_id))]
    async fn get_metadata(&self, file_id: &WorkbookId) -> Result<FileMetadata> {
        let (_, file) = self
            .hub
            .files()
            .get(file_id.as_str())
            .param("fields", METADATA_FIELDS)
            .supports_all_drives(true)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| from_drive_error(RemoteCall::Metadata, e))?;

        file_metadata(file)
    }

    #[instrument(
        name = "Downloading export",
        skip_all,
        fields(file_id = %file_id, mime_type = %mime_type)
    )]
    async fn export(
        &self,
        file_id: &WorkbookId,
        mime_type: &str,
        sink: &mut (dyn Write + Send),
    ) -> Result<u64> {
        let response = self
            .hub
            .files()
            .export(file_id.as_str(), mime_type)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| from_drive_error(RemoteCall::Export, e))?;

        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bytes} {msg}")
                .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_message("downloaded");

        write_body(response.into_body(), sink).await
    }
}

fn file_metadata(file: File) -> Result<FileMetadata> {
    let name = file
        .name
        .ok_or_else(|| AppError::Remote("File metadata has no name".to_string()))?;

    // Google-native files (Sheets, Docs) report no size
    let size = match file.size {
        Some(size) => u64::try_from(size)
            .map_err(|_| AppError::Remote(format!("File has negative size {}", size)))?,
        None => 0,
    };

    let modified_time = file
        .modified_time
        .ok_or_else(|| AppError::Remote("File metadata has no modifiedTime".to_string()))?;

    Ok(FileMetadata {
        name,
        size,
        modified_time,
    })
}

/// Copy a response body into `sink` frame by frame, without buffering it whole
async fn write_body<B>(mut body: B, sink: &mut (dyn Write + Send)) -> Result<u64>
where
    B: BodyExt + Unpin,
    B::Data: AsRef<[u8]>,
    B::Error: Display,
{
    let span = Span::current();
    let mut written = 0u64;

    while let Some(frame) = body.frame().await {
        let frame = frame
            .map_err(|e| AppError::Export(format!("Export stream interrupted: {}", e)))?;

        if let Ok(chunk) = frame.into_data() {
            let chunk = chunk.as_ref();
            sink.write_all(chunk)?;
            written += chunk.len() as u64;
            span.pb_inc(chunk.len() as u64);
        }
    }

    sink.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use http_body_util::Full;
    use std::io;

    /// Accepts `limit` bytes, then fails every write
    struct FailingWriter {
        accepted: Vec<u8>,
        limit: usize,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.limit - self.accepted.len();
            if room == 0 {
                return Err(io::Error::other("disk full"));
            }
            let n = room.min(buf.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_file_metadata_mapping() {
        let modified: DateTime<Utc> = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        let file = File {
            name: Some("Budget".to_string()),
            size: Some(2048),
            modified_time: Some(modified),
            ..Default::default()
        };

        let metadata = file_metadata(file).unwrap();

        assert_eq!(
            metadata,
            FileMetadata {
                name: "Budget".to_string(),
                size: 2048,
                modified_time: modified,
            }
        );
    }

    #[test]
    fn test_native_file_without_size() {
        let file = File {
            name: Some("Sheet".to_string()),
            modified_time: Some(Utc::now()),
            ..Default::default()
        };

        assert_eq!(file_metadata(file).unwrap().size, 0);
    }

    #[test]
    fn test_missing_name_is_remote_error() {
        let file = File {
            modified_time: Some(Utc::now()),
            ..Default::default()
        };

        assert!(matches!(file_metadata(file), Err(AppError::Remote(_))));
    }

    #[tokio::test]
    async fn test_write_body_copies_every_byte() {
        let payload: &'static [u8] = b"PK\x03\x04 spreadsheet bytes";
        let mut sink = Vec::new();

        let written = write_body(Full::new(payload), &mut sink).await.unwrap();

        assert_eq!(written, payload.len() as u64);
        assert_eq!(sink, payload);
    }

    #[tokio::test]
    async fn test_write_body_surfaces_sink_failure() {
        let payload: &'static [u8] = b"0123456789";
        let mut sink = FailingWriter {
            accepted: Vec::new(),
            limit: 4,
        };

        let err = write_body(Full::new(payload), &mut sink).await.unwrap_err();

        assert!(matches!(err, AppError::Io(_)));
        assert_eq!(sink.accepted, b"0123");
    }
}

use crate::error::AppError;
use serde_json::Value;

/// Drive error reasons meaning the file exists but cannot be exported
const EXPORT_REASONS: &[&str] = &[
    "fileNotExportable",
    "cannotExportFile",
    "exportSizeLimitExceeded",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum RemoteCall {
    Create,
    Metadata,
    Export,
}

impl RemoteCall {
    fn action(self) -> &'static str {
        match self {
            RemoteCall::Create => "Failed to create spreadsheet",
            RemoteCall::Metadata => "Failed to get file metadata",
            RemoteCall::Export => "Failed to export file",
        }
    }
}

pub(super) fn from_sheets_error(call: RemoteCall, error: google_sheets4::Error) -> AppError {
    match error {
        google_sheets4::Error::BadRequest(body) => classify(call, None, Some(&body)),
        google_sheets4::Error::Failure(response) => {
            classify_status(call, response.status().as_u16())
        }
        other => AppError::Remote(format!("{}: {}", call.action(), other)),
    }
}

pub(super) fn from_drive_error(call: RemoteCall, error: google_drive3::Error) -> AppError {
    match error {
        google_drive3::Error::BadRequest(body) => classify(call, None, Some(&body)),
        google_drive3::Error::Failure(response) => {
            classify_status(call, response.status().as_u16())
        }
        other => AppError::Remote(format!("{}: {}", call.action(), other)),
    }
}

fn classify_status(call: RemoteCall, status: u16) -> AppError {
    classify(call, Some(status), None)
}

/// Map a Google API error (`{"error": {"code", "message", "errors": [{"reason"}]}}`)
/// onto the local error kinds
pub(super) fn classify(call: RemoteCall, status: Option<u16>, body: Option<&Value>) -> AppError {
    let error = body.and_then(|b| b.get("error"));

    let status = status.or_else(|| {
        error
            .and_then(|e| e.get("code"))
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
    });

    let reasons: Vec<&str> = error
        .and_then(|e| e.get("errors"))
        .and_then(Value::as_array)
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e.get("reason").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();

    let detail = error
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| status.map(|s| format!("HTTP {}", s)))
        .unwrap_or_else(|| "unknown error".to_string());

    let message = format!("{}: {}", call.action(), detail);

    if status == Some(404) || reasons.contains(&"notFound") {
        return AppError::NotFound(message);
    }

    if call == RemoteCall::Export
        && (status == Some(400) || reasons.iter().any(|r| EXPORT_REASONS.contains(r)))
    {
        return AppError::Export(message);
    }

    if status == Some(401) {
        return AppError::Auth(message);
    }

    AppError::Remote(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn google_error(code: u16, reason: &str, message: &str) -> Value {
        json!({
            "error": {
                "code": code,
                "message": message,
                "errors": [{ "domain": "global", "reason": reason, "message": message }]
            }
        })
    }

    #[test]
    fn test_not_found_body() {
        let body = google_error(404, "notFound", "File not found: abc.");

        let err = classify(RemoteCall::Metadata, None, Some(&body));
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("File not found: abc.")));
    }

    #[test]
    fn test_not_found_status_without_body() {
        assert!(matches!(
            classify(RemoteCall::Export, Some(404), None),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_unexportable_file() {
        let body = google_error(
            403,
            "fileNotExportable",
            "Export only supports Docs Editors files.",
        );

        assert!(matches!(
            classify(RemoteCall::Export, None, Some(&body)),
            AppError::Export(_)
        ));
        // Same reason outside an export is just a remote failure
        assert!(matches!(
            classify(RemoteCall::Metadata, None, Some(&body)),
            AppError::Remote(_)
        ));
    }

    #[test]
    fn test_bad_export_request() {
        let body = google_error(400, "badRequest", "Bad Request");

        assert!(matches!(
            classify(RemoteCall::Export, None, Some(&body)),
            AppError::Export(_)
        ));
        assert!(matches!(
            classify(RemoteCall::Create, None, Some(&body)),
            AppError::Remote(_)
        ));
    }

    #[test]
    fn test_unauthorized() {
        let body = google_error(401, "authError", "Invalid Credentials");

        assert!(matches!(
            classify(RemoteCall::Create, None, Some(&body)),
            AppError::Auth(_)
        ));
    }

    #[test]
    fn test_server_error_message() {
        let err = classify(RemoteCall::Create, Some(503), None);

        assert!(matches!(
            err,
            AppError::Remote(ref msg) if msg == "Failed to create spreadsheet: HTTP 503"
        ));
    }
}

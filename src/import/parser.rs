use axum::http::HeaderMap;
use serde::Deserialize;

use super::{ImportRow, csv};

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonUpload {
    List(Vec<ImportRow>),
    Wrapped { contacts: Vec<ImportRow> },
}

/// Parse an upload body based on its Content-Type: JSON, CSV text, or a multipart form
/// carrying a CSV file.
pub async fn parse_upload(headers: &HeaderMap, body: bytes::Bytes) -> Result<Vec<ImportRow>, String> {
    let ct = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json");

    if ct.contains("multipart/form-data") {
        let text = read_multipart_file(headers, body).await?;
        csv::parse_contacts(&text)
    } else if ct.contains("text/csv") || ct.contains("text/plain") {
        let text = std::str::from_utf8(&body).map_err(|e| format!("Invalid UTF-8: {e}"))?;
        csv::parse_contacts(text)
    } else {
        parse_json(&body)
    }
}

fn parse_json(body: &[u8]) -> Result<Vec<ImportRow>, String> {
    let upload: JsonUpload =
        serde_json::from_slice(body).map_err(|e| format!("Invalid JSON: {e}"))?;
    Ok(match upload {
        JsonUpload::List(rows) => rows,
        JsonUpload::Wrapped { contacts } => contacts,
    })
}

/// Return the contents of the first file field (or a field named `file`).
async fn read_multipart_file(headers: &HeaderMap, body: bytes::Bytes) -> Result<String, String> {
    let boundary = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| "Missing multipart boundary".to_string())?;

    let stream = futures_util::stream::once(async { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Multipart error: {e}"))?
    {
        if field.file_name().is_some() || field.name() == Some("file") {
            return field
                .text()
                .await
                .map_err(|e| format!("Field read error: {e}"));
        }
    }

    Err("No file in upload".to_string())
}

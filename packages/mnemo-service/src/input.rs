//! Input processing: classifies a raw string as an existing file, an
//! http(s) URL, or raw text, and extracts body, MIME type, size, and
//! modification time. Directories are rejected here; the recursive ingest
//! path walks them and calls this per file.

use std::path::Path;

use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::{Error, Result};

#[derive(Clone, Debug, Default)]
pub struct ProcessedInput {
	pub body: String,
	pub content_type: String,
	pub file_path: Option<String>,
	pub file_size: Option<i64>,
	pub url: Option<String>,
	pub mtime: Option<OffsetDateTime>,
	pub metadata: Map<String, Value>,
}

pub async fn process_input(client: &reqwest::Client, input: &str) -> Result<ProcessedInput> {
	match tokio::fs::metadata(input).await {
		Ok(meta) if meta.is_dir() => {
			return Err(Error::InvalidRequest {
				message: format!("{input:?} is a directory; use recursive ingestion"),
			});
		},
		Ok(meta) => return read_file(input, &meta).await,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
		Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
			return Err(Error::PermissionDenied { path: input.to_string() });
		},
		Err(err) => {
			return Err(Error::ReadError { message: format!("failed to stat {input:?}: {err}") });
		},
	}

	if input.starts_with("http://") || input.starts_with("https://") {
		if let Ok(url) = reqwest::Url::parse(input) {
			return fetch_url(client, url).await;
		}
	}

	let mut metadata = Map::new();

	metadata.insert("input_type".to_string(), Value::from("raw"));

	Ok(ProcessedInput {
		body: input.to_string(),
		content_type: "text/plain; charset=utf-8".to_string(),
		metadata,
		..Default::default()
	})
}

async fn read_file(input: &str, meta: &std::fs::Metadata) -> Result<ProcessedInput> {
	let bytes = tokio::fs::read(input).await.map_err(|err| match err.kind() {
		std::io::ErrorKind::PermissionDenied => Error::PermissionDenied { path: input.to_string() },
		_ => Error::ReadError { message: format!("failed to read {input:?}: {err}") },
	})?;
	let content_type = sniff_mime(&bytes, Some(Path::new(input)));
	let body = String::from_utf8_lossy(&bytes).into_owned();
	let absolute = std::path::absolute(input)
		.map(|path| path.to_string_lossy().into_owned())
		.unwrap_or_else(|_| input.to_string());
	let mtime = meta.modified().ok().map(OffsetDateTime::from);
	let mut metadata = Map::new();

	metadata.insert("input_type".to_string(), Value::from("file"));

	Ok(ProcessedInput {
		body,
		content_type,
		file_path: Some(absolute),
		file_size: Some(meta.len() as i64),
		url: None,
		mtime,
		metadata,
	})
}

async fn fetch_url(client: &reqwest::Client, url: reqwest::Url) -> Result<ProcessedInput> {
	let url_text = url.to_string();
	let response = client.get(url).send().await.map_err(|err| Error::FetchError {
		url: url_text.clone(),
		status: None,
		message: err.to_string(),
	})?;
	let status = response.status();

	if !status.is_success() {
		let hint = response.text().await.unwrap_or_default();
		let hint = hint.chars().take(256).collect::<String>();

		return Err(Error::FetchError {
			url: url_text,
			status: Some(status.as_u16()),
			message: hint,
		});
	}

	let header_type = response
		.headers()
		.get(reqwest::header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string);
	let bytes = response.bytes().await.map_err(|err| Error::ReadError {
		message: format!("failed to read response body from {url_text:?}: {err}"),
	})?;
	let content_type = header_type.unwrap_or_else(|| sniff_mime(&bytes, None));
	let mut metadata = Map::new();

	metadata.insert("input_type".to_string(), Value::from("url"));

	Ok(ProcessedInput {
		body: String::from_utf8_lossy(&bytes).into_owned(),
		content_type,
		file_path: None,
		file_size: None,
		url: Some(url_text),
		mtime: None,
		metadata,
	})
}

/// MIME detection: magic-byte sniffing on the prefix first, then the file
/// extension for text formats that have no magic bytes, then a UTF-8 check.
pub(crate) fn sniff_mime(bytes: &[u8], path: Option<&Path>) -> String {
	if let Some(kind) = infer::get(bytes) {
		return kind.mime_type().to_string();
	}
	if let Some(extension) =
		path.and_then(Path::extension).and_then(|ext| ext.to_str()).map(str::to_lowercase)
	{
		match extension.as_str() {
			"md" | "markdown" => return "text/markdown; charset=utf-8".to_string(),
			"html" | "htm" => return "text/html; charset=utf-8".to_string(),
			"json" => return "application/json".to_string(),
			"txt" => return "text/plain; charset=utf-8".to_string(),
			_ => {},
		}
	}
	if std::str::from_utf8(bytes).is_ok() {
		return "text/plain; charset=utf-8".to_string();
	}

	"application/octet-stream".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markdown_extension_wins_over_utf8_fallback() {
		assert_eq!(
			sniff_mime(b"## Heading", Some(Path::new("notes.md"))),
			"text/markdown; charset=utf-8"
		);
		assert_eq!(
			sniff_mime(b"<html></html>", Some(Path::new("page.HTML"))),
			"text/html; charset=utf-8"
		);
	}

	#[test]
	fn binary_prefix_is_sniffed() {
		let png_prefix = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

		assert_eq!(sniff_mime(&png_prefix, None), "image/png");
	}

	#[test]
	fn plain_utf8_defaults_to_text() {
		assert_eq!(sniff_mime(b"just words", None), "text/plain; charset=utf-8");
	}

	#[tokio::test]
	async fn raw_text_passes_through() {
		let client = reqwest::Client::new();
		let processed = process_input(&client, "hello world").await.unwrap();

		assert_eq!(processed.body, "hello world");
		assert_eq!(processed.content_type, "text/plain; charset=utf-8");
		assert!(processed.file_path.is_none());
		assert!(processed.url.is_none());
		assert_eq!(processed.metadata["input_type"], serde_json::json!("raw"));
	}

	#[tokio::test]
	async fn existing_file_is_read_with_metadata() {
		let dir = std::env::temp_dir().join(format!("mnemo-input-{}", uuid::Uuid::new_v4()));

		std::fs::create_dir_all(&dir).unwrap();

		let path = dir.join("sample.md");

		std::fs::write(&path, "## Intro\nbody").unwrap();

		let client = reqwest::Client::new();
		let processed = process_input(&client, path.to_str().unwrap()).await.unwrap();

		assert_eq!(processed.body, "## Intro\nbody");
		assert_eq!(processed.content_type, "text/markdown; charset=utf-8");
		assert_eq!(processed.file_size, Some(13));
		assert!(processed.file_path.is_some());
		assert!(processed.mtime.is_some());

		std::fs::remove_dir_all(&dir).unwrap();
	}

	#[tokio::test]
	async fn directories_are_rejected() {
		let client = reqwest::Client::new();
		let err = process_input(&client, std::env::temp_dir().to_str().unwrap()).await.unwrap_err();

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}
}

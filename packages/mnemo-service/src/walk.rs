//! Recursive directory ingestion: walks a root, skipping dot entries, and
//! adds every markdown file through the normal ingestion path.

use std::path::Path;

use walkdir::WalkDir;

use crate::{Error, Result, Service, ingest::AddContentParams};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
	pub found: u64,
	pub added: u64,
	pub skipped: u64,
	pub errored: u64,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
	entry.file_name().to_str().map(|name| name.starts_with('.')).unwrap_or(false)
}

fn is_markdown(path: &Path) -> bool {
	path.extension()
		.and_then(|extension| extension.to_str())
		.map(|extension| extension.eq_ignore_ascii_case("md"))
		.unwrap_or(false)
}

impl Service {
	/// Walks `root` and ingests every `.md` file (case-insensitive),
	/// continuing past per-file errors. The source name defaults to the
	/// directory basename.
	pub async fn add_recursive(&self, root: &Path, source_name: Option<&str>) -> Result<IngestStats> {
		if !root.is_dir() {
			return Err(Error::InvalidRequest {
				message: format!("{} is not a directory", root.display()),
			});
		}

		let source_name = match source_name {
			Some(name) if !name.trim().is_empty() => name.trim().to_string(),
			_ => root
				.file_name()
				.and_then(|name| name.to_str())
				.unwrap_or("imported")
				.to_string(),
		};
		let mut stats = IngestStats::default();

		for entry in WalkDir::new(root).into_iter().filter_entry(|entry| {
			entry.depth() == 0 || !is_hidden(entry)
		}) {
			let entry = match entry {
				Ok(entry) => entry,
				Err(err) => {
					tracing::warn!(error = %err, "Skipping unreadable directory entry.");

					stats.errored += 1;

					continue;
				},
			};

			if !entry.file_type().is_file() || !is_markdown(entry.path()) {
				continue;
			}

			stats.found += 1;

			let raw_input = entry.path().to_string_lossy().into_owned();
			let params = AddContentParams {
				source_name: source_name.clone(),
				title: None,
				raw_input,
				source_type: "directory".to_string(),
			};

			match self.add_content(&params).await {
				Ok((_, true)) => stats.skipped += 1,
				Ok((_, false)) => stats.added += 1,
				Err(err) => {
					tracing::warn!(
						path = %entry.path().display(),
						error = %err,
						"Failed to ingest file; continuing."
					);

					stats.errored += 1;
				},
			}
		}

		tracing::info!(
			source = source_name,
			found = stats.found,
			added = stats.added,
			skipped = stats.skipped,
			errored = stats.errored,
			"Recursive ingestion finished."
		);

		Ok(stats)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn markdown_detection_is_case_insensitive() {
		assert!(is_markdown(Path::new("notes.md")));
		assert!(is_markdown(Path::new("NOTES.MD")));
		assert!(!is_markdown(Path::new("notes.txt")));
		assert!(!is_markdown(Path::new("md")));
	}
}

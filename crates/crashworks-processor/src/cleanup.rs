// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scoped ownership of the files referenced by a task.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{trace, warn};

/// Removes every tracked file when dropped. Files that were moved away in
/// the meantime are skipped.
#[derive(Debug, Default)]
pub struct TaskFiles {
	paths: Vec<PathBuf>,
}

impl TaskFiles {
	pub fn new<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
		Self {
			paths: paths.into_iter().map(Path::to_path_buf).collect(),
		}
	}

	#[cfg(test)]
	fn paths(&self) -> &[PathBuf] {
		&self.paths
	}
}

impl Drop for TaskFiles {
	fn drop(&mut self) {
		for path in &self.paths {
			match std::fs::remove_file(path) {
				Ok(()) => trace!(path = %path.display(), "removed task file"),
				Err(e) if e.kind() == ErrorKind::NotFound => {}
				Err(e) => warn!(path = %path.display(), error = %e, "Can't remove task file"),
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn removes_files_on_drop() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.dmp");
		let b = dir.path().join("a.json");
		std::fs::write(&a, b"dump").unwrap();
		std::fs::write(&b, b"{}").unwrap();

		{
			let files = TaskFiles::new([a.as_path(), b.as_path()]);
			assert_eq!(files.paths().len(), 2);
		}

		assert!(!a.exists());
		assert!(!b.exists());
	}

	#[test]
	fn skips_files_already_moved() {
		let dir = tempfile::tempdir().unwrap();
		let a = dir.path().join("a.sym");
		let moved = dir.path().join("kept.sym");
		std::fs::write(&a, b"MODULE").unwrap();

		{
			let _files = TaskFiles::new([a.as_path()]);
			std::fs::rename(&a, &moved).unwrap();
		}

		assert!(moved.exists());
	}
}

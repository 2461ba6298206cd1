//! In-memory corpus of lines loaded from the data file.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};
use crate::search::{self, Algorithm};

/// Sorted, deduplicated lines of a data file plus a hash index.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    lines: Vec<String>,
    index: HashSet<String>,
}

impl Corpus {
    /// Read and index a UTF-8 data file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::DataFileNotFound(path.to_path_buf()),
            _ => Error::DataFileRead {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        let corpus = Self::parse(&text);
        tracing::debug!(path = %path.display(), lines = corpus.len(), "Corpus loaded");
        Ok(corpus)
    }

    /// Build a corpus from file contents. Empty lines are dropped.
    pub fn parse(text: &str) -> Self {
        Self::from_lines(text.lines().filter(|line| !line.is_empty()))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut lines: Vec<String> = lines.into_iter().map(Into::into).collect();
        lines.sort_unstable();
        lines.dedup();
        let index = lines.iter().cloned().collect();
        Self { lines, index }
    }

    /// Whether `needle` equals one of the lines, using `algorithm`.
    pub fn contains(&self, algorithm: Algorithm, needle: &str) -> bool {
        match algorithm {
            Algorithm::Linear => search::linear_search(needle, &self.lines),
            Algorithm::Binary => search::binary_search(needle, &self.lines),
            Algorithm::Jump => search::jump_search(needle, &self.lines),
            Algorithm::Exponential => search::exponential_search(needle, &self.lines),
            Algorithm::Set => search::set_search(needle, &self.index),
        }
    }

    /// Lines in sorted order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_empty_lines_and_handles_crlf() {
        let corpus = Corpus::parse("b\r\n\r\na\n\nc");
        assert_eq!(corpus.lines(), ["a", "b", "c"]);
    }

    #[test]
    fn parse_deduplicates() {
        let corpus = Corpus::parse("x\nx\ny\n");
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn lines_keep_inner_and_trailing_spaces() {
        let corpus = Corpus::parse("a b \n");
        assert!(corpus.contains(Algorithm::Jump, "a b "));
        assert!(!corpus.contains(Algorithm::Jump, "a b"));
    }

    #[test]
    fn every_algorithm_agrees() {
        let corpus = Corpus::parse("3;0;1;28;0;19;4;0;\n1;0;1;11;0;10;5;0;\n2;0;16;21;0;14;3;0;\n");
        for algorithm in Algorithm::ALL {
            assert!(corpus.contains(algorithm, "1;0;1;11;0;10;5;0;"), "{algorithm}");
            assert!(!corpus.contains(algorithm, "1;0;1;11;0;10;5;0"), "{algorithm}");
        }
    }

    #[test]
    fn empty_corpus() {
        let corpus = Corpus::parse("\n\n");
        assert!(corpus.is_empty());
        for algorithm in Algorithm::ALL {
            assert!(!corpus.contains(algorithm, "a"));
        }
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Corpus::load(&dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, Error::DataFileNotFound(_)), "got: {err}");
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "alpha\nbeta\n").unwrap();
        let corpus = Corpus::load(&path).unwrap();
        assert_eq!(corpus.len(), 2);
        assert!(corpus.contains(Algorithm::Set, "beta"));
    }

    #[test]
    fn load_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Corpus::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::DataFileRead { .. }), "got: {err}");
    }
}

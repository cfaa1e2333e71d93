//! CSV persistence for repository lists and crawl output.
//!
//! Every file has a header row taken from the serde field names of the row
//! type, and rows are written in the order they are given.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::github::types::Repository;
use crate::sample::SampleIndexSet;

/// Errors from reading or writing dataset files.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file could not be opened, parsed or written.
    #[error("{}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Flushing buffered output failed.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DatasetError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write `records` to `path`, replacing any existing file. Returns the number
/// of rows written.
pub fn write_records<R: Serialize>(path: &Path, records: &[R]) -> Result<usize, DatasetError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| DatasetError::csv(path, e))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| DatasetError::csv(path, e))?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Wrote {} rows to {}", records.len(), path.display());
    Ok(records.len())
}

/// Streaming reader over a repository CSV (`id,name,full_name,stargazers_count`).
pub struct RepositoryReader {
    path: PathBuf,
    reader: csv::Reader<File>,
}

impl RepositoryReader {
    pub fn open(path: &Path) -> Result<Self, DatasetError> {
        let reader = csv::Reader::from_path(path).map_err(|e| DatasetError::csv(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            reader,
        })
    }

    /// Rows in file order. Stops being useful after the first error.
    pub fn repositories(self) -> impl Iterator<Item = Result<Repository, DatasetError>> {
        let path = self.path;
        self.reader
            .into_deserialize::<Repository>()
            .map(move |row| row.map_err(|e| DatasetError::csv(&path, e)))
    }
}

pub fn read_repositories(path: &Path) -> Result<Vec<Repository>, DatasetError> {
    RepositoryReader::open(path)?.repositories().collect()
}

/// Read only the sampled rows, in one forward pass over the file.
pub fn read_sampled_repositories(
    path: &Path,
    sample: &SampleIndexSet,
) -> Result<Vec<Repository>, DatasetError> {
    sample
        .select(RepositoryReader::open(path)?.repositories())
        .collect()
}

/// Number of data rows (the header is not counted).
pub fn count_rows(path: &Path) -> Result<usize, DatasetError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| DatasetError::csv(path, e))?;
    let mut count = 0;
    for record in reader.records() {
        record.map_err(|e| DatasetError::csv(path, e))?;
        count += 1;
    }
    Ok(count)
}

/// Copy the header and the sampled rows of `input` to `output` unchanged.
/// Returns the number of rows copied.
pub fn sample_rows(
    input: &Path,
    output: &Path,
    sample: &SampleIndexSet,
) -> Result<usize, DatasetError> {
    let mut reader = csv::Reader::from_path(input).map_err(|e| DatasetError::csv(input, e))?;
    let mut writer = csv::Writer::from_path(output).map_err(|e| DatasetError::csv(output, e))?;

    let header = reader
        .headers()
        .map_err(|e| DatasetError::csv(input, e))?
        .clone();
    writer
        .write_record(&header)
        .map_err(|e| DatasetError::csv(output, e))?;

    let mut copied = 0;
    for row in sample.select(reader.records()) {
        let row = row.map_err(|e| DatasetError::csv(input, e))?;
        writer
            .write_record(&row)
            .map_err(|e| DatasetError::csv(output, e))?;
        copied += 1;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    if copied < sample.len() {
        tracing::warn!(
            "{} has fewer rows than the sample expects ({} of {})",
            input.display(),
            copied,
            sample.len()
        );
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawl::{CommentRecord, StarHistoryRow};
    use crate::sample::{Seed, sample};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn repositories(n: i64) -> Vec<Repository> {
        (0..n)
            .map(|i| Repository {
                id: 1000 + i,
                name: format!("r{i}"),
                full_name: format!("o/r{i}"),
                stars: 100 + i as u64,
            })
            .collect()
    }

    #[test]
    fn repository_file_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("repos.csv");
        let repos = repositories(3);

        assert_eq!(write_records(&path, &repos).expect("write"), 3);
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.starts_with("id,name,full_name,stargazers_count\n"));

        assert_eq!(read_repositories(&path).expect("read"), repos);
        assert_eq!(count_rows(&path).expect("count"), 3);
    }

    #[test]
    fn star_rows_use_expected_columns() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("stars.csv");
        let rows = [StarHistoryRow {
            repo_id: 7,
            stars: 12,
            interval: 3,
        }];
        write_records(&path, &rows).expect("write");
        assert_eq!(
            fs::read_to_string(&path).expect("read"),
            "repo_id,stars,interval\n7,12,3\n"
        );
    }

    #[test]
    fn comment_rows_quote_multiline_text() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("comments.csv");
        let at = Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap();
        let rows = [CommentRecord {
            repo_id: 1,
            issue_id: 2,
            comment_id: -1,
            author_id: Some(3),
            author: Some("alice".to_string()),
            created_at: at,
            updated_at: at,
            text: "line one\nline, two".to_string(),
            author_association: "OWNER".to_string(),
            collaborator: None,
        }];
        write_records(&path, &rows).expect("write");

        let mut reader = csv::Reader::from_path(&path).expect("open");
        let header = reader.headers().expect("header").clone();
        assert_eq!(
            header.iter().collect::<Vec<_>>(),
            vec![
                "repo_id",
                "issue_id",
                "comment_id",
                "author_id",
                "author",
                "created_at",
                "updated_at",
                "text",
                "type",
                "collaborator"
            ]
        );
        let back: Vec<CommentRecord> = reader
            .deserialize()
            .collect::<Result<_, _>>()
            .expect("deserialize");
        assert_eq!(back[0].text, "line one\nline, two");
        assert_eq!(back[0].comment_id, -1);
    }

    #[test]
    fn sampled_read_and_copy_agree() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("population.csv");
        let output = dir.path().join("sample.csv");
        write_records(&input, &repositories(50)).expect("write");

        let set = sample(5, 50, Seed(1, 1)).expect("sample");
        let read = read_sampled_repositories(&input, &set).expect("read sample");
        assert_eq!(read.len(), 5);
        assert_eq!(
            read.iter().map(|r| (r.id - 1000) as usize).collect::<Vec<_>>(),
            set.as_slice()
        );

        assert_eq!(sample_rows(&input, &output, &set).expect("copy"), 5);
        assert_eq!(read_repositories(&output).expect("read copy"), read);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("nope.csv");
        let err = read_repositories(&path).expect_err("missing");
        assert!(err.to_string().contains("nope.csv"));
    }
}

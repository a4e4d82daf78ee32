//! Delimited text file source

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use booklift_common::{ParseError, Record};
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord};
use tokio::fs::File;
use tracing::debug;

use super::{not_open, RecordSource};
use crate::error::{BatchError, Result};

/// Reads one record per line: `id<delimiter>name`, no header row.
///
/// Quoting is disabled, so a name containing the delimiter shows up as an
/// extra field and fails to parse. Blank lines are ignored.
pub struct FileSource {
    name: String,
    path: PathBuf,
    delimiter: u8,
    reader: Option<AsyncReader<File>>,
    row: StringRecord,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>, delimiter: u8) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("file:{}", path.display()),
            path,
            delimiter,
            reader: None,
            row: StringRecord::new(),
        }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .await
            .map_err(|err| BatchError::source_unavailable(&self.name, err))?;

        self.reader = Some(
            AsyncReaderBuilder::new()
                .has_headers(false)
                .delimiter(self.delimiter)
                .quoting(false)
                .flexible(true)
                .create_reader(file),
        );
        debug!(source = %self.name, "Opened input file");
        Ok(())
    }

    async fn next(&mut self) -> Result<Option<Record>> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(not_open(&self.name));
        };

        match reader.read_record(&mut self.row).await {
            Ok(false) => Ok(None),
            Ok(true) => {
                let line = self.row.position().map(|pos| pos.line());
                Record::from_fields(self.row.iter())
                    .map(Some)
                    .map_err(|err| match line {
                        Some(line) => err.at_line(line).into(),
                        None => err.into(),
                    })
            },
            Err(err) if err.is_io_error() => Err(BatchError::source_unavailable(&self.name, err)),
            Err(err) => Err(ParseError::malformed(err.to_string()).into()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}

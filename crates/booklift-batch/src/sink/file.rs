//! Delimited text file sink

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use booklift_common::Record;
use csv_async::{AsyncWriter, AsyncWriterBuilder, QuoteStyle};
use tokio::fs::{File, OpenOptions};
use tracing::debug;

use super::{not_open, Atomicity, RecordSink};
use crate::error::{BatchError, Result};

/// Writes one `id<delimiter>name` line per record, flushing after each chunk.
///
/// The file is truncated when the sink opens unless `append` is set. Names
/// are written unquoted.
pub struct FileSink {
    name: String,
    path: PathBuf,
    delimiter: u8,
    append: bool,
    writer: Option<AsyncWriter<File>>,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>, delimiter: u8) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: format!("file:{}", path.display()),
            path,
            delimiter,
            append: false,
            writer: None,
        }
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

#[async_trait]
impl RecordSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn atomicity(&self) -> Atomicity {
        Atomicity::BestEffort
    }

    async fn open(&mut self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(self.append)
            .truncate(!self.append)
            .open(&self.path)
            .await
            .map_err(|err| BatchError::write(&self.name, err))?;

        self.writer = Some(
            AsyncWriterBuilder::new()
                .has_headers(false)
                .delimiter(self.delimiter)
                .quote_style(QuoteStyle::Never)
                .create_writer(file),
        );
        debug!(sink = %self.name, append = self.append, "Opened output file");
        Ok(())
    }

    async fn write(&mut self, records: &[Record]) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(not_open(&self.name));
        };

        for record in records {
            writer
                .write_record(&record.to_fields())
                .await
                .map_err(|err| BatchError::write(&self.name, err))?;
        }
        writer
            .flush()
            .await
            .map_err(|err| BatchError::write(&self.name, err))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .await
                .map_err(|err| BatchError::write(&self.name, err))?;
        }
        Ok(())
    }
}

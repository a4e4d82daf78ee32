//! The book transfer pipeline
//!
//! Three hops in a fixed order, each depending on the data the previous one
//! wrote:
//!
//! 1. `file-to-relational`: input file into the `books` table
//! 2. `relational-to-document`: `books` table into the document collection
//! 3. `document-to-file`: document collection, sorted, into the output file

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::error::Result;
use crate::listener::LoggingListener;
use crate::runner::{PipelineRunner, Run};
use crate::sink::{DocumentSink, FileSink, RelationalSink};
use crate::source::{DocumentSource, FileSource, RelationalSource};
use crate::step::Step;
use crate::store::{connect_documents, DocumentCollection, RelationalStore};

/// Name the run is reported under
pub const RUN_NAME: &str = "book-transfer";

pub const FILE_TO_RELATIONAL: &str = "file-to-relational";
pub const RELATIONAL_TO_DOCUMENT: &str = "relational-to-document";
pub const DOCUMENT_TO_FILE: &str = "document-to-file";

/// Connected stores shared by the steps
#[derive(Clone)]
pub struct Stores {
    pub relational: RelationalStore,
    pub documents: Arc<dyn DocumentCollection>,
}

impl Stores {
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let relational = RelationalStore::connect(&settings.relational)
            .await
            .with_context(|| format!("Failed to connect to {}", settings.relational.url))?;
        if settings.relational.run_migrations {
            relational
                .migrate()
                .await
                .context("Failed to migrate relational store")?;
        }

        let documents = connect_documents(&settings.document)
            .await
            .with_context(|| format!("Failed to connect to {}", settings.document.url))?;

        Ok(Self {
            relational,
            documents,
        })
    }
}

/// Wire the three steps in execution order
pub fn build_steps(settings: &Settings, stores: &Stores) -> Result<Vec<Step>> {
    let chunk_size = settings.batch.chunk_size;
    let policy = settings.fault_policy();
    let delimiter = settings.delimiter_byte();
    let logging = Arc::new(LoggingListener::new());

    let file_to_relational = Step::builder(FILE_TO_RELATIONAL)
        .source(FileSource::new(&settings.file.input_path, delimiter))
        .sink(RelationalSink::new(&stores.relational))
        .chunk_size(chunk_size)
        .fault_policy(policy)
        .listener(logging.clone())
        .build()?;

    let relational_to_document = Step::builder(RELATIONAL_TO_DOCUMENT)
        .source(RelationalSource::new(&stores.relational))
        .sink(DocumentSink::new(stores.documents.clone()))
        .chunk_size(chunk_size)
        .fault_policy(policy)
        .listener(Arc::new(LoggingListener::new().with_reads()))
        .build()?;

    let document_to_file = Step::builder(DOCUMENT_TO_FILE)
        .source(DocumentSource::new(
            stores.documents.clone(),
            &settings.document.sort_field,
        ))
        .sink(
            FileSink::new(&settings.file.output_path, delimiter).append(settings.file.append_output),
        )
        .chunk_size(chunk_size)
        .fault_policy(policy)
        .listener(logging)
        .build()?;

    Ok(vec![file_to_relational, relational_to_document, document_to_file])
}

/// Connect the stores and run the whole pipeline once
pub async fn run(settings: &Settings, cancel: CancellationToken) -> anyhow::Result<Run> {
    settings.validate()?;

    let stores = Stores::connect(settings).await?;
    let steps = build_steps(settings, &stores).context("Failed to build pipeline steps")?;

    info!(
        input = %settings.file.input_path.display(),
        output = %settings.file.output_path.display(),
        chunk_size = settings.batch.chunk_size,
        "Starting pipeline"
    );

    let run = PipelineRunner::new(RUN_NAME)
        .listener(Arc::new(LoggingListener::new()))
        .cancellation(cancel)
        .run(steps)
        .await;
    Ok(run)
}

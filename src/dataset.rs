//! The collected records and the flat JSON file they end up in.

use std::{
    fs,
    io::{self, BufReader, BufWriter, Write},
    path::Path,
    sync::Arc,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialized as `{"data": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset<T> {
    pub data: Vec<T>,
}

impl<T> Default for Dataset<T> {
    fn default() -> Self {
        Self { data: Vec::new() }
    }
}

impl<T: Serialize> Dataset<T> {
    pub fn write_json(&self, path: &Path) -> Result<(), DatasetError> {
        let file = fs::File::create(path).map_err(|source| io_error(path, source))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush().map_err(|source| io_error(path, source))
    }
}

impl<T: DeserializeOwned> Dataset<T> {
    pub fn read_json(path: &Path) -> Result<Self, DatasetError> {
        let file = fs::File::open(path).map_err(|source| io_error(path, source))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Append-only handle to a dataset shared between the workers of a crawl.
#[derive(Debug)]
pub struct DatasetSink<T> {
    inner: Arc<RwLock<Dataset<T>>>,
}

impl<T> Clone for DatasetSink<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for DatasetSink<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Dataset::default())),
        }
    }
}

impl<T> DatasetSink<T> {
    pub async fn push(&self, record: T) {
        self.inner.write().await.data.push(record);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.data.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<T: Clone> DatasetSink<T> {
    pub async fn snapshot(&self) -> Dataset<T> {
        self.inner.read().await.clone()
    }
}

impl<T: Serialize> DatasetSink<T> {
    pub async fn write_json(&self, path: &Path) -> Result<(), DatasetError> {
        let dataset = self.inner.read().await;
        tracing::info!(
            records = dataset.data.len(),
            "dataset: writing to '{}'",
            path.display()
        );
        dataset.write_json(path)
    }
}

fn io_error(path: &Path, source: io::Error) -> DatasetError {
    DatasetError::Io {
        path: path.display().to_string(),
        source,
    }
}

//! Asynchronous CSV reader with batch interface
//!
//! Reads rows with csv-async and hands them out in batches, so the async
//! strategy can overlap reading with admission.
//!
//! # Architecture
//!
//! ```text
//! CSV source → AsyncReader<R, T> → Vec<T::Output> batches
//!                     ↓
//!              csv_format (CsvRow::convert)
//! ```

use crate::io::csv_format::CsvRow;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use std::marker::PhantomData;
use tracing::warn;

/// Asynchronous CSV reader over rows of type `T`
pub struct AsyncReader<R: AsyncRead + Unpin, T> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    _row: PhantomData<fn() -> T>,
}

impl<R, T> AsyncReader<R, T>
where
    R: AsyncRead + Unpin + Send + 'static,
    T: CsvRow + 'static,
{
    /// Create a new AsyncReader from an async byte source
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            _row: PhantomData,
        }
    }

    /// Read up to `batch_size` converted rows
    ///
    /// Malformed rows are logged with `warn!` and skipped.
    ///
    /// # Returns
    ///
    /// The converted rows, in file order. An empty vector means the end of
    /// the input was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<T::Output> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<T>();

        while batch.len() < batch_size {
            match rows.next().await {
                Some(Ok(row)) => match row.convert() {
                    Ok(value) => batch.push(value),
                    Err(e) => warn!(error = %e, "skipping invalid row"),
                },
                Some(Err(e)) => warn!(error = %e, "skipping malformed row"),
                None => break,
            }
        }

        batch
    }

    /// Read every remaining row
    pub async fn read_all(&mut self) -> Vec<T::Output> {
        let mut all = Vec::new();
        loop {
            let batch = self.read_batch(1024).await;
            if batch.is_empty() {
                return all;
            }
            all.extend(batch);
        }
    }
}

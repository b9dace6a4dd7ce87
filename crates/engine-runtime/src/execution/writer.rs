use async_trait::async_trait;
use model::records::record::Record;

pub type WriterError = Box<dyn std::error::Error + Send + Sync>;

/// Format writer fed by an unload run.
#[async_trait]
pub trait RecordWriter: Send {
    async fn write(&mut self, record: Record) -> Result<(), WriterError>;

    async fn flush(&mut self) -> Result<(), WriterError> {
        Ok(())
    }
}

/// Keeps every record in memory.
#[async_trait]
impl RecordWriter for Vec<Record> {
    async fn write(&mut self, record: Record) -> Result<(), WriterError> {
        self.push(record);
        Ok(())
    }
}

use crate::error::QuarantineError;
use engine_config::settings::LogFormat;
use model::execution::failed_record::{FailedRecord, FailureCategory};
use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

const CATEGORIES: [FailureCategory; 3] = [
    FailureCategory::Mapping,
    FailureCategory::Load,
    FailureCategory::Unload,
];

/// Append-only logs of failed records, one pair of files per failure
/// category: `<category>-errors.log` with the cause of each failure and
/// `<category>.bad` with the raw source, one record per line.
///
/// Files are created on first use. Each entry is written under the file's
/// lock in a single call, so concurrent appends never interleave.
pub struct QuarantineLog {
    directory: PathBuf,
    format: LogFormat,
    files: HashMap<FailureCategory, CategoryFiles>,
}

struct CategoryFiles {
    errors: LazyFile,
    bad: LazyFile,
}

struct LazyFile {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl QuarantineLog {
    pub fn open(directory: impl Into<PathBuf>, format: LogFormat) -> Result<Self, QuarantineError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|source| QuarantineError::CreateDir {
            path: directory.clone(),
            source,
        })?;

        let extension = match format {
            LogFormat::Text => "log",
            LogFormat::Json => "json",
        };
        let files = CATEGORIES
            .into_iter()
            .map(|category| {
                let name = category.log_name();
                let files = CategoryFiles {
                    errors: LazyFile::new(directory.join(format!("{name}-errors.{extension}"))),
                    bad: LazyFile::new(directory.join(format!("{name}.bad"))),
                };
                (category, files)
            })
            .collect();

        Ok(Self {
            directory,
            format,
            files,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn errors_path(&self, category: FailureCategory) -> Option<&Path> {
        self.files.get(&category).map(|f| f.errors.path.as_path())
    }

    pub fn bad_path(&self, category: FailureCategory) -> Option<&Path> {
        self.files.get(&category).map(|f| f.bad.path.as_path())
    }

    pub fn append(&self, failed: &FailedRecord) -> Result<(), QuarantineError> {
        let Some(files) = self.files.get(&failed.category) else {
            return Ok(());
        };

        let entry = match self.format {
            LogFormat::Text => render_text(failed),
            LogFormat::Json => {
                let mut line = serde_json::to_string(failed)?;
                line.push('\n');
                line
            }
        };
        files.errors.write(entry.as_bytes())?;

        // Unloaded rows have no external source worth replaying.
        if failed.category != FailureCategory::Unload {
            let mut line = failed.source.replace(['\r', '\n'], " ");
            line.push('\n');
            files.bad.write(line.as_bytes())?;
        }

        debug!(
            category = %failed.category,
            locator = %failed.locator,
            "Quarantined failed record"
        );
        Ok(())
    }

    pub fn flush(&self) -> Result<(), QuarantineError> {
        for files in self.files.values() {
            files.errors.flush()?;
            files.bad.flush()?;
        }
        Ok(())
    }
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            writer: Mutex::new(None),
        }
    }

    fn write(&self, bytes: &[u8]) -> Result<(), QuarantineError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| QuarantineError::Poisoned(self.path.clone()))?;

        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|source| self.write_error(source))?;
            *guard = Some(BufWriter::new(file));
        }
        if let Some(writer) = guard.as_mut() {
            writer
                .write_all(bytes)
                .map_err(|source| self.write_error(source))?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), QuarantineError> {
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| QuarantineError::Poisoned(self.path.clone()))?;
        if let Some(writer) = guard.as_mut() {
            writer.flush().map_err(|source| self.write_error(source))?;
        }
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> QuarantineError {
        QuarantineError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

fn render_text(failed: &FailedRecord) -> String {
    let mut entry = String::new();
    let _ = writeln!(entry, "Resource: {}", failed.locator.resource);
    let _ = writeln!(entry, "Position: {}", failed.locator.position);
    if let Some(field) = &failed.field {
        let _ = writeln!(entry, "Field   : {field}");
    }
    let _ = writeln!(entry, "Source  : {}", failed.source.replace(['\r', '\n'], " "));
    if let Some(statement) = &failed.statement {
        let _ = writeln!(entry, "Statement: {statement}");
    }
    if let Some(attempts) = failed.attempt_number {
        let _ = writeln!(entry, "Attempts: {attempts}");
    }
    let _ = writeln!(entry, "{}: {}", failed.error.error_type, failed.error.message);
    if let Some(details) = &failed.error.details {
        let _ = writeln!(entry, "  caused by: {details}");
    }
    entry.push('\n');
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::{
        external::ExternalValue,
        record::{Record, SourceLocator},
    };
    use std::sync::Arc;

    fn failed(position: u64, category: FailureCategory) -> FailedRecord {
        let record = Record::named(
            SourceLocator::new("ip-by-country.csv", position),
            [("country_code", ExternalValue::text("FR"))],
        )
        .with_source(format!("FR,{position},France"));
        FailedRecord::new(
            category,
            &record,
            "ConversionError",
            "Could not convert field 'beginning_ip_number'",
        )
        .with_field("beginning_ip_number")
    }

    #[test]
    fn text_entries_carry_locator_source_and_cause() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuarantineLog::open(dir.path().join("op"), LogFormat::Text).unwrap();

        log.append(&failed(7, FailureCategory::Mapping)).unwrap();
        log.flush().unwrap();

        let errors =
            std::fs::read_to_string(log.errors_path(FailureCategory::Mapping).unwrap()).unwrap();
        assert!(errors.contains("Resource: ip-by-country.csv\nPosition: 7\n"));
        assert!(errors.contains("Source  : FR,7,France\n"));
        assert!(errors.contains("ConversionError: Could not convert field 'beginning_ip_number'"));

        let bad = std::fs::read_to_string(log.bad_path(FailureCategory::Mapping).unwrap()).unwrap();
        assert_eq!(bad, "FR,7,France\n");
        assert!(!log.errors_path(FailureCategory::Load).unwrap().exists());
    }

    #[test]
    fn json_entries_are_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = QuarantineLog::open(dir.path(), LogFormat::Json).unwrap();

        log.append(&failed(1, FailureCategory::Load)).unwrap();
        log.append(&failed(2, FailureCategory::Load)).unwrap();
        log.flush().unwrap();

        let raw = std::fs::read_to_string(dir.path().join("load-errors.json")).unwrap();
        let positions: Vec<u64> = raw
            .lines()
            .map(|line| {
                let v: serde_json::Value = serde_json::from_str(line).unwrap();
                v["locator"]["position"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(positions, [1, 2]);
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(QuarantineLog::open(dir.path(), LogFormat::Text).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.append(&failed(t * 100 + i, FailureCategory::Mapping))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        log.flush().unwrap();

        let errors = std::fs::read_to_string(dir.path().join("mapping-errors.log")).unwrap();
        let entries: Vec<_> = errors.split("\n\n").filter(|e| !e.is_empty()).collect();
        assert_eq!(entries.len(), 200);
        assert!(entries.iter().all(|e| e.starts_with("Resource: ")));
    }
}

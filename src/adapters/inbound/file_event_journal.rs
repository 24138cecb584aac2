use crate::common::{EventEnvelope, EventJournal};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Session event journal on disk: one JSON-lines file per session, one
/// envelope per line, appended in recording order.
pub struct FileEventJournal {
    directory: PathBuf,
}

impl FileEventJournal {
    pub fn new<P: Into<PathBuf>>(directory: P) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Session ids may contain characters that are not safe in file names.
    fn session_file(&self, session_id: &str) -> PathBuf {
        let stem: String = session_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{}.jsonl", stem))
    }

    async fn read_file(path: &Path) -> Result<Vec<EventEnvelope>, String> {
        let file = File::open(path)
            .await
            .map_err(|e| format!("Failed to open journal {}: {}", path.display(), e))?;
        let mut lines = BufReader::new(file).lines();
        let mut envelopes = Vec::new();
        let mut line_number = 0usize;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let envelope = serde_json::from_str(&line)
                .map_err(|e| format!("Corrupt entry at {}:{}: {}", path.display(), line_number, e))?;
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }
}

#[async_trait]
impl EventJournal for FileEventJournal {
    async fn append_events(&self, session_id: &str, events: Vec<EventEnvelope>) -> Result<(), String> {
        if events.is_empty() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| format!("Failed to create journal directory: {}", e))?;

        let mut buffer = Vec::new();
        for event in &events {
            serde_json::to_writer(&mut buffer, event).map_err(|e| format!("Failed to serialize event: {}", e))?;
            buffer.push(b'\n');
        }

        let path = self.session_file(session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| format!("Failed to open journal {}: {}", path.display(), e))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| format!("Failed to append to {}: {}", path.display(), e))?;
        file.flush()
            .await
            .map_err(|e| format!("Failed to flush {}: {}", path.display(), e))?;
        Ok(())
    }

    async fn load_events(&self, session_id: &str, from_index: u64) -> Result<Vec<EventEnvelope>, String> {
        let path = self.session_file(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let envelopes = Self::read_file(&path).await?;
        Ok(envelopes.into_iter().skip(from_index as usize).collect())
    }

    async fn load_events_by_type(
        &self,
        event_type: &str,
        from_timestamp: Option<DateTime<Utc>>,
    ) -> Result<Vec<EventEnvelope>, String> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| format!("Failed to read journal directory: {}", e))?;

        let mut matching = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| format!("Failed to read journal directory entry: {}", e))?
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }
            matching.extend(Self::read_file(&path).await?.into_iter().filter(|e| {
                e.event_type == event_type && from_timestamp.map_or(true, |from| e.occurred_at >= from)
            }));
        }
        matching.sort_by_key(|e| e.occurred_at);
        Ok(matching)
    }
}

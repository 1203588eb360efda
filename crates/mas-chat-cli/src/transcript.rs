use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use mas_chat::models::message::Message;

/// Read a JSONL transcript. A missing file is an empty conversation.
pub fn read_messages(path: &Path) -> Result<Vec<Message>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)
        .with_context(|| format!("Failed to open transcript {}", path.display()))?;
    let mut messages = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let message = serde_json::from_str(&line).with_context(|| {
            format!("Invalid message on line {} of {}", number + 1, path.display())
        })?;
        messages.push(message);
    }
    Ok(messages)
}

/// Rewrite the transcript with the whole conversation, one message per line
pub fn persist_messages(path: &Path, messages: &[Message]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    for message in messages {
        serde_json::to_writer(&mut writer, &message)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

//! Extraction collaborator — reads mbox files into `EmailRecord`s.
//!
//! Accepts a single mbox file or a directory tree of them (the layout a
//! `readpst` conversion produces). Individual messages that fail to parse
//! are skipped with a warning and counted; only container-level failures
//! are errors. PST archives are not read directly — convert them to mbox
//! first.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use tracing::{debug, info, warn};

use crate::error::ExtractError;
use crate::record::EmailRecord;

/// Extraction output: the parsed records plus the count of messages that
/// could not be read.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<EmailRecord>,
    pub skipped: usize,
}

/// Extract every message under `path` (file or directory).
pub fn extract_mbox(path: &Path) -> Result<Extraction, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::NotFound(path.display().to_string()));
    }

    let files = collect_mbox_files(path)?;
    if files.is_empty() {
        return Err(ExtractError::NoMailboxes(path.display().to_string()));
    }

    let mut extraction = Extraction::default();
    for file in &files {
        let contents = std::fs::read(file).map_err(|source| ExtractError::Io {
            path: file.display().to_string(),
            source,
        })?;
        // The mbox folder name stands in for the archive folder path.
        let folder = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mailbox".to_string());

        let before = extraction.records.len();
        extract_from_bytes(&contents, &folder, &mut extraction);
        info!(
            file = %file.display(),
            messages = extraction.records.len() - before,
            "Mailbox processed"
        );
    }

    info!(
        records = extraction.records.len(),
        skipped = extraction.skipped,
        files = files.len(),
        "Extraction complete"
    );
    Ok(extraction)
}

/// Parse one mbox byte stream, appending records and counting skips.
fn extract_from_bytes(contents: &[u8], folder: &str, extraction: &mut Extraction) {
    let parser = MessageParser::default();
    for chunk in split_mbox(contents) {
        match parse_message(&parser, chunk, folder) {
            Some(record) => extraction.records.push(record),
            None => {
                extraction.skipped += 1;
                warn!(folder, "Skipping unreadable message");
            }
        }
    }
}

/// Split an mbox stream on `From ` envelope lines. The envelope line
/// itself is not part of the message.
fn split_mbox(contents: &[u8]) -> Vec<&[u8]> {
    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut line_start = 0;

    for (i, &byte) in contents.iter().enumerate() {
        if byte == b'\n' {
            let line = &contents[line_start..i];
            if line.starts_with(b"From ") {
                if let Some(s) = start {
                    chunks.push(&contents[s..line_start]);
                }
                start = Some(i + 1);
            } else if start.is_none() && !line.is_empty() {
                // Not mbox-framed at all — treat the whole stream as one
                // message (a bare .eml file).
                return vec![contents];
            }
            line_start = i + 1;
        }
    }
    if let Some(s) = start {
        if s < contents.len() {
            chunks.push(&contents[s..]);
        }
    } else if !contents.is_empty() {
        return vec![contents];
    }
    chunks
}

/// Parse one raw message into an `EmailRecord`. `None` means unreadable.
fn parse_message(parser: &MessageParser, raw: &[u8], folder: &str) -> Option<EmailRecord> {
    let parsed = parser.parse(raw)?;

    let sender_name = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.name())
        .unwrap_or("")
        .to_string();
    let sender_address = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .unwrap_or("")
        .to_string();

    let recipients = address_list(parsed.to());
    let cc = address_list(parsed.cc());
    let subject = parsed.subject().unwrap_or("").to_string();

    // A message with no sender and no text is not worth a record.
    let body = extract_text(&parsed);
    if sender_address.is_empty() && subject.is_empty() && body.is_empty() {
        return None;
    }

    let timestamp = parsed
        .date()
        .map(|d| d.to_timestamp())
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH);

    let attachment_names: Vec<String> = parsed
        .attachments()
        .filter_map(|part| part.attachment_name().map(String::from))
        .collect();

    debug!(sender = %sender_address, subject = %subject, "Message parsed");
    Some(EmailRecord {
        sender_name,
        sender_address,
        recipients,
        cc,
        subject,
        body,
        timestamp,
        folder: folder.to_string(),
        attachment_names,
    })
}

/// Flatten a header address field into `Name <addr>` / bare-addr strings.
fn address_list(addr: Option<&mail_parser::Address>) -> Vec<String> {
    let Some(addr) = addr else {
        return Vec::new();
    };
    let format_one = |a: &mail_parser::Addr| -> Option<String> {
        let address = a.address.as_ref()?;
        Some(match a.name.as_ref() {
            Some(name) if !name.is_empty() => format!("{name} <{address}>"),
            _ => address.to_string(),
        })
    };
    match addr {
        mail_parser::Address::List(addrs) => addrs.iter().filter_map(format_one).collect(),
        mail_parser::Address::Group(groups) => groups
            .iter()
            .flat_map(|g| g.addresses.iter().filter_map(format_one))
            .collect(),
    }
}

/// Plain text body, falling back to tag-stripped HTML.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Drop HTML tags and collapse whitespace so the body stays searchable.
fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collect candidate mbox files: the path itself, or every regular file
/// under the directory (hidden files excluded).
fn collect_mbox_files(path: &Path) -> Result<Vec<PathBuf>, ExtractError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir).map_err(|source| ExtractError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ExtractError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            let entry_path = entry.path();
            let hidden = entry_path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with('.'))
                .unwrap_or(true);
            if hidden {
                continue;
            }
            if entry_path.is_dir() {
                stack.push(entry_path);
            } else if entry_path.is_file() {
                files.push(entry_path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE_MBOX: &str = "\
From rep@healthleads.com Thu Mar 14 09:30:00 2019\n\
From: Jane Rep <rep@healthleads.com>\n\
To: Owner <owner@dmeco.com>\n\
Cc: counsel@lawfirm.com\n\
Subject: Missing physician orders\n\
Date: Thu, 14 Mar 2019 09:30:00 +0000\n\
\n\
Please see the attached physician order.\n\
From owner@dmeco.com Thu Mar 14 10:00:00 2019\n\
From: Owner <owner@dmeco.com>\n\
To: rep@healthleads.com\n\
Subject: Re: Missing physician orders\n\
Date: Thu, 14 Mar 2019 10:00:00 +0000\n\
\n\
We are terminating the agreement.\n";

    #[test]
    fn splits_mbox_into_messages() {
        let chunks = split_mbox(SAMPLE_MBOX.as_bytes());
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with(b"From: Jane Rep"));
        assert!(chunks[1].starts_with(b"From: Owner"));
    }

    #[test]
    fn bare_eml_treated_as_single_message() {
        let eml = b"From: a@b.com\nSubject: hi\n\nbody";
        let chunks = split_mbox(eml);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn extracts_records_from_mbox_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_MBOX.as_bytes()).unwrap();

        let extraction = extract_mbox(file.path()).unwrap();
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.skipped, 0);

        let first = &extraction.records[0];
        assert_eq!(first.sender_name, "Jane Rep");
        assert_eq!(first.sender_address, "rep@healthleads.com");
        assert_eq!(first.recipients, vec!["Owner <owner@dmeco.com>"]);
        assert_eq!(first.cc, vec!["counsel@lawfirm.com"]);
        assert_eq!(first.subject, "Missing physician orders");
        assert!(first.body.contains("physician order"));
        assert_eq!(first.timestamp.to_rfc3339(), "2019-03-14T09:30:00+00:00");
    }

    #[test]
    fn walks_directories_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("Inbox");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("batch1"), SAMPLE_MBOX).unwrap();
        std::fs::write(dir.path().join(".hidden"), SAMPLE_MBOX).unwrap();

        let extraction = extract_mbox(dir.path()).unwrap();
        // Hidden file skipped; two messages from the visible mailbox.
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].folder, "batch1");
    }

    #[test]
    fn missing_path_is_an_error() {
        let err = extract_mbox(Path::new("/nonexistent/archive")).unwrap_err();
        assert!(matches!(err, ExtractError::NotFound(_)));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_mbox(dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::NoMailboxes(_)));
    }

    #[test]
    fn missing_date_falls_back_to_epoch() {
        let eml = b"From: a@b.com\nSubject: undated\n\nbody text";
        let parser = MessageParser::default();
        let record = parse_message(&parser, eml, "Inbox").unwrap();
        assert_eq!(record.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn html_fallback_is_stripped() {
        let eml = b"From: a@b.com\nSubject: html\nContent-Type: text/html\n\n<html><body><p>Hello <b>there</b></p></body></html>";
        let parser = MessageParser::default();
        let record = parse_message(&parser, eml, "Inbox").unwrap();
        assert!(record.body.contains("Hello"));
        assert!(record.body.contains("there"));
        assert!(!record.body.contains('<'));
    }

    #[test]
    fn strip_html_collapses_whitespace() {
        assert_eq!(strip_html("<p>a</p>\n\n<p>b</p>"), "a b");
    }
}

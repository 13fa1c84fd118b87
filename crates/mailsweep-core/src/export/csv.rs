//! CSV export of cached messages and domain summaries.

use std::path::Path;

use tracing::info;

use crate::cache::model::{DomainBucket, MessageRecord};
use crate::error::Result;

/// Byte-order mark so spreadsheet tools detect UTF-8.
const UTF8_BOM: &str = "\u{feff}";

/// Quotes a field per RFC 4180 when it contains a delimiter, quote, or
/// line break. Embedded quotes are doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Writes all given messages as a CSV file. Returns the data row count.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub async fn write_messages_csv<'a, I>(path: &Path, messages: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a MessageRecord>,
{
    let mut out = String::from(UTF8_BOM);
    out.push_str(
        "Id,Domain,Subject,SenderName,SenderEmail,ReceivedAt,SizeBytes,HasAttachments,IsRead,Categories\n",
    );

    let mut rows = 0usize;
    for message in messages {
        let size = message
            .size_bytes
            .map(|s| s.to_string())
            .unwrap_or_default();
        let row = [
            csv_escape(&message.id),
            csv_escape(&message.domain()),
            csv_escape(&message.subject),
            csv_escape(&message.sender_name),
            csv_escape(&message.sender_email),
            message.received_at.to_rfc3339(),
            size,
            message.has_attachments.to_string(),
            message.is_read.to_string(),
            csv_escape(&message.categories.join("; ")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
        rows += 1;
    }

    write_report(path, &out).await?;
    info!(path = %path.display(), rows, "Exported message CSV");
    Ok(rows)
}

/// Writes a per-domain summary as a CSV file, largest domain first.
/// Returns the row count.
///
/// # Errors
///
/// Returns an error when the file cannot be written.
pub async fn write_domain_summary_csv<'a, I>(path: &Path, buckets: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a DomainBucket>,
{
    let mut buckets: Vec<&DomainBucket> = buckets.into_iter().collect();
    buckets.sort_by(|a, b| {
        b.messages
            .len()
            .cmp(&a.messages.len())
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut out = String::from(UTF8_BOM);
    out.push_str("Domain,Messages,TotalSizeBytes,WithAttachments,OldestReceivedAt,NewestReceivedAt\n");
    for bucket in &buckets {
        let total_size: i64 = bucket.messages.iter().filter_map(|m| m.size_bytes).sum();
        let with_attachments = bucket.messages.iter().filter(|m| m.has_attachments).count();
        let oldest = bucket.messages.iter().map(|m| m.received_at).min();
        let newest = bucket.messages.iter().map(|m| m.received_at).max();
        let row = [
            csv_escape(&bucket.name),
            bucket.messages.len().to_string(),
            total_size.to_string(),
            with_attachments.to_string(),
            oldest.map(|t| t.to_rfc3339()).unwrap_or_default(),
            newest.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    write_report(path, &out).await?;
    info!(path = %path.display(), rows = buckets.len(), "Exported domain summary CSV");
    Ok(buckets.len())
}

async fn write_report(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(id: &str, subject: &str) -> MessageRecord {
        MessageRecord {
            id: id.to_string(),
            subject: subject.to_string(),
            sender_name: "Sender".to_string(),
            sender_email: "s@shop.example".to_string(),
            received_at: Utc::now(),
            size_bytes: Some(100),
            has_attachments: false,
            to_recipients: Vec::new(),
            categories: vec!["A".to_string(), "B".to_string()],
            is_read: true,
            importance: None,
            preview: None,
        }
    }

    #[test]
    fn test_escape_quotes_and_commas() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[tokio::test]
    async fn test_message_export_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.csv");
        let messages = [message("m1", "Plain"), message("m2", "With, comma")];

        let rows = write_messages_csv(&path, &messages).await.unwrap();
        assert_eq!(rows, 2);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.starts_with('\u{feff}'));
        let lines: Vec<&str> = contents.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Id,Domain,Subject"));
        assert!(lines[2].contains("\"With, comma\""));
        assert!(lines[1].contains("A; B"));
    }

    #[tokio::test]
    async fn test_domain_summary_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("domains.csv");

        let mut shop = DomainBucket::new("shop.example");
        shop.push(message("m1", "Sale"));
        let mut with_attachment = message("m2", "Receipt");
        with_attachment.has_attachments = true;
        with_attachment.size_bytes = Some(900);
        shop.push(with_attachment);
        let mut bank = DomainBucket::new("bank.example");
        bank.push(message("m3", "Statement"));

        let rows = write_domain_summary_csv(&path, [&shop, &bank])
            .await
            .unwrap();
        assert_eq!(rows, 2);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.trim_start_matches('\u{feff}').lines().collect();
        assert!(lines[0].starts_with("Domain,Messages,TotalSizeBytes"));
        // The busier domain sorts first.
        assert!(lines[1].starts_with("shop.example,2,1000,1,"));
        assert!(lines[2].starts_with("bank.example,1,100,0,"));
    }
}

use std::collections::HashSet;

use csv::{ReaderBuilder, StringRecord};

use crate::target::normalize_url;

/// Column labels and the status value that selects a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    pub url_column: String,
    pub status_column: String,
    pub status_sentinel: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            url_column: "url".to_string(),
            status_column: "tag status".to_string(),
            status_sentinel: "not tagged".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Normalized, deduplicated URLs in first-seen order.
    pub urls: Vec<String>,
    pub rows_seen: usize,
    pub rows_matched: usize,
    pub duplicates: usize,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Filters comma-delimited text down to the URLs whose status column equals
/// the sentinel.
///
/// Malformed input (no data rows, or a header missing either column) yields
/// an empty report.
pub fn ingest_csv(text: &str, options: &IngestOptions) -> IngestReport {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader
        .records()
        .filter_map(Result::ok)
        .filter(|record| !is_blank(record));

    let Some(header) = records.next() else {
        return IngestReport::default();
    };
    let Some(url_idx) = column_index(&header, &options.url_column) else {
        return IngestReport::default();
    };
    let Some(status_idx) = column_index(&header, &options.status_column) else {
        return IngestReport::default();
    };
    let sentinel = options.status_sentinel.trim().to_lowercase();

    let mut report = IngestReport::default();
    let mut seen = HashSet::new();
    for record in records {
        report.rows_seen += 1;
        let status = record.get(status_idx).unwrap_or("").trim().to_lowercase();
        if status != sentinel {
            continue;
        }
        let Some(url) = record.get(url_idx).and_then(normalize_url) else {
            continue;
        };
        report.rows_matched += 1;
        if seen.insert(url.clone()) {
            report.urls.push(url);
        } else {
            report.duplicates += 1;
        }
    }
    report
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

fn column_index(header: &StringRecord, label: &str) -> Option<usize> {
    let wanted = label.trim().to_lowercase();
    header
        .iter()
        .position(|field| field.trim_start_matches('\u{feff}').trim().to_lowercase() == wanted)
}

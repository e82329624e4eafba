use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use strsim::levenshtein;
use zip::ZipArchive;

use crate::archive::error::{ArchiveError, Result};
use crate::archive::{ArchiveRef, ArticleId, ArticleRecord};

/// Object-type groups as they appear in the source composite category
/// strings, keyed by the short names the operator selects with.
pub const OBJECT_TYPE_GROUPS: &[(&str, &[&str])] = &[
    (
        "news",
        &[
            "feature;article",
            "news",
            "news;military/war news",
            "general information",
            "front page/cover story",
            "article;feature",
            "military/war news;news",
        ],
    ),
    (
        "opinion",
        &[
            "editorial;commentary",
            "commentary;editorial",
            "letter to the editor;correspondence",
            "correspondence;letter to the editor",
            "review",
        ],
    ),
    (
        "images",
        &["image/photograph", "illustration", "editorial cartoon/comic"],
    ),
    (
        "life_transitions",
        &[
            "obituary",
            "birth notice",
            "news;marriage announcement",
            "marriage announcement;news",
        ],
    ),
    (
        "notices",
        &["stock quote", "credit/acknowledgement", "news;legal notice"],
    ),
    (
        "ads",
        &[
            "classified advertisement;advertisement",
            "advertisement",
            "advertisement;classified advertisement",
        ],
    ),
    (
        "toc",
        &[
            "table of contents;front matter",
            "front matter;table of contents",
        ],
    ),
    ("other", &["undefined"]),
];

/// Text member names that identify recurring non-news documents.
pub const UNWANTED_TITLES: &[&str] = &[
    "weather",
    "current_topics",
    "city_lights",
    "radio.txt",
    "telefilm",
    "engagements",
    "greetings",
    "television.txt",
    "acknowledgement.txt",
];

pub fn object_type_group(name: &str) -> Option<&'static [&'static str]> {
    OBJECT_TYPE_GROUPS
        .iter()
        .find(|(group, _)| *group == name)
        .map(|(_, members)| *members)
}

/// Nearest group name within a small edit distance, for operator typos.
pub fn suggest_group(name: &str) -> Option<&'static str> {
    OBJECT_TYPE_GROUPS
        .iter()
        .map(|(group, _)| (*group, levenshtein(name, group)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(group, _)| group)
}

/// Metadata row as it appears in the bulk CSV export. Pointer columns are
/// nullable; `note` is either empty or a "no text" marker.
#[derive(Debug, Deserialize)]
struct MetadataRow {
    record_id: ArticleId,
    pub_date: String,
    start_page: u32,
    objecttypes: String,
    pdf_zip: Option<String>,
    pdf_file: Option<String>,
    txt_zip: Option<String>,
    txt_file: Option<String>,
    note: Option<String>,
}

/// In-memory article metadata table, keyed by article id. Loaded once and
/// read-only thereafter; the filter methods return new tables instead of
/// mutating in place.
#[derive(Debug, Clone, Default)]
pub struct MetadataIndex {
    records: BTreeMap<ArticleId, ArticleRecord>,
}

impl MetadataIndex {
    /// Load the index from a CSV file, or from a ZIP that packages one
    /// (the archive's distribution format).
    pub fn load(path: &Path) -> Result<Self> {
        tracing::info!("Loading article metadata from {}", path.display());
        let is_zip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
        if !is_zip {
            return Self::from_reader(File::open(path)?);
        }

        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| ArchiveError::ArchiveOpen {
            archive: path.to_path_buf(),
            source: e,
        })?;
        let member = archive
            .file_names()
            .find(|name| name.to_ascii_lowercase().ends_with(".csv"))
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                ArchiveError::Metadata(format!("no csv member inside {}", path.display()))
            })?;
        let entry = archive
            .by_name(&member)
            .map_err(|e| ArchiveError::ArchiveOpen {
                archive: path.to_path_buf(),
                source: e,
            })?;
        Self::from_reader(entry)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut records = BTreeMap::new();
        let mut skipped = 0usize;

        for row in csv_reader.deserialize::<MetadataRow>() {
            let row = row?;
            let pdf = archive_ref(row.pdf_zip, row.pdf_file);
            let txt = archive_ref(row.txt_zip, row.txt_file);
            if pdf.is_none() && txt.is_none() {
                skipped += 1;
                continue;
            }
            records.insert(
                row.record_id,
                ArticleRecord {
                    id: row.record_id,
                    pub_date: parse_pub_date(&row.pub_date)?,
                    start_page: row.start_page,
                    object_types: row.objecttypes,
                    pdf,
                    txt,
                    no_text: row.note.is_some(),
                },
            );
        }

        if skipped > 0 {
            tracing::warn!("Skipped {skipped} records with neither pdf nor text content");
        }
        Ok(Self { records })
    }

    pub fn get(&self, id: ArticleId) -> Option<&ArticleRecord> {
        self.records.get(&id)
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keep only records whose composite object type appears in `wanted`.
    pub fn retain_object_types(&self, wanted: &[&str]) -> Self {
        self.filtered(|record| wanted.contains(&record.object_types.as_str()))
    }

    /// Drop records flagged as having no usable text.
    pub fn drop_missing_text(&self) -> Self {
        self.filtered(|record| !record.no_text)
    }

    /// Drop records whose text member name contains any of the needles.
    pub fn drop_titles_matching(&self, needles: &[&str]) -> Self {
        self.filtered(|record| {
            let member = record
                .txt
                .as_ref()
                .map(|txt| txt.member.as_str())
                .unwrap_or_default();
            !needles.iter().any(|needle| member.contains(needle))
        })
    }

    /// The standard curation filter: news-group object types only, text
    /// present, recurring non-news titles dropped.
    pub fn news_only(&self) -> Self {
        let wanted: Vec<&str> = ["news", "other"]
            .into_iter()
            .filter_map(object_type_group)
            .flatten()
            .copied()
            .collect();

        let by_type = self.retain_object_types(&wanted);
        tracing::info!(
            "{} records trimmed by object type, {} remain",
            self.len() - by_type.len(),
            by_type.len()
        );
        let with_text = by_type.drop_missing_text();
        tracing::info!(
            "{} records trimmed for missing text, {} remain",
            by_type.len() - with_text.len(),
            with_text.len()
        );
        let kept = with_text.drop_titles_matching(UNWANTED_TITLES);
        tracing::info!(
            "{} records trimmed by title, {} remain",
            with_text.len() - kept.len(),
            kept.len()
        );
        kept
    }

    fn filtered(&self, keep: impl Fn(&ArticleRecord) -> bool) -> Self {
        let records = self
            .records
            .iter()
            .filter(|(_, record)| keep(record))
            .map(|(id, record)| (*id, record.clone()))
            .collect();
        Self { records }
    }
}

fn archive_ref(archive: Option<String>, member: Option<String>) -> Option<ArchiveRef> {
    match (archive, member) {
        (Some(archive), Some(member)) if !archive.is_empty() && !member.is_empty() => {
            Some(ArchiveRef { archive, member })
        }
        _ => None,
    }
}

fn parse_pub_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y/%m/%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .map_err(|_| ArchiveError::Metadata(format!("unparseable pub_date '{raw}'")))
}

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{direct::NotKeyed, InMemoryState};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;

use crate::archive::error::Result;
use crate::archive::extract::{open_archive, read_member_to_string};
use crate::archive::index::MetadataIndex;
use crate::archive::ArticleId;

/// Longest chunk the punctuation service accepts in one request.
const MAX_CHUNK_CHARS: usize = 15_000;

/// Pull the article bodies for `ids` out of the packaged text archives.
/// Each distinct archive is opened once. Returns `(id, text)` pairs in
/// request order; records without a text pointer are skipped with a warning.
pub fn read_texts(
    ids: &[ArticleId],
    index: &MetadataIndex,
    archive_root: &Path,
) -> Result<Vec<(ArticleId, String)>> {
    let txt_dir = archive_root.join("TXT");

    let mut by_archive: BTreeMap<&str, Vec<(ArticleId, &str)>> = BTreeMap::new();
    for id in ids {
        match index.get(*id).and_then(|record| record.txt.as_ref()) {
            Some(txt) => by_archive
                .entry(txt.archive.as_str())
                .or_default()
                .push((*id, txt.member.as_str())),
            None => tracing::warn!("Article {id} has no text content; skipping"),
        }
    }

    let mut texts = BTreeMap::new();
    for (&archive_name, members) in &by_archive {
        let mut archive = open_archive(&txt_dir.join(archive_name))?;
        for &(id, member) in members {
            texts.insert(id, read_member_to_string(&mut archive, archive_name, member)?);
        }
    }

    Ok(ids
        .iter()
        .filter_map(|id| texts.remove(id).map(|text| (*id, text)))
        .collect())
}

/// Client for a remote punctuation-restoration service. The service takes a
/// form-encoded `text=` body and answers with the punctuated text.
pub struct PunctuatorClient {
    client: reqwest::Client,
    endpoint: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl PunctuatorClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let quota = Quota::per_second(nonzero!(1u32));
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Strip existing punctuation and ask the service to restore it. Long
    /// texts are sent in whitespace-aligned chunks and the responses are
    /// concatenated.
    pub async fn punctuate(&self, text: &str) -> anyhow::Result<String> {
        let stripped = strip_punctuation(text);
        let mut restored = String::new();

        for chunk in wrap_chunks(&stripped, MAX_CHUNK_CHARS) {
            self.limiter.until_ready().await;
            tracing::info!("Punctuating {} characters via {}", chunk.len(), self.endpoint);

            let response = self
                .client
                .post(&self.endpoint)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(format!("text={}", urlencoding::encode(&chunk)))
                .send()
                .await?;

            if !response.status().is_success() {
                return Err(anyhow::anyhow!(
                    "Punctuator error: {}",
                    response.status()
                ));
            }
            restored.push_str(&response.text().await?);
        }

        Ok(restored)
    }
}

/// Remove ASCII punctuation ahead of restoration.
pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

/// Split `text` into chunks of at most `limit` bytes, breaking on whitespace
/// so words stay intact. A single token longer than `limit` is hard-split on
/// char boundaries.
pub fn wrap_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > limit {
            chunks.push(std::mem::take(&mut current));
        }

        if word.len() > limit {
            let mut rest = word;
            while rest.len() > limit {
                let cut = match char_boundary_at_or_below(rest, limit) {
                    // A multibyte char straddles the limit; keep it whole.
                    0 => rest.chars().next().map(char::len_utf8).unwrap_or(rest.len()),
                    boundary => boundary,
                };
                let (head, tail) = rest.split_at(cut);
                chunks.push(head.to_string());
                rest = tail;
            }
            current = rest.to_string();
            continue;
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn char_boundary_at_or_below(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// One row of the exported text table.
pub struct TextEntry {
    pub id: ArticleId,
    pub article_text: String,
    pub punctuated_text: Option<String>,
}

/// Write the exported texts as a CSV table. The punctuated column is only
/// present when at least one row carries it.
pub fn write_text_table(rows: &[TextEntry], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    let punctuated = rows.iter().any(|row| row.punctuated_text.is_some());

    if punctuated {
        writer.write_record(["record_id", "article_text", "punctuated_text"])?;
    } else {
        writer.write_record(["record_id", "article_text"])?;
    }

    for row in rows {
        let id = row.id.to_string();
        match (&row.punctuated_text, punctuated) {
            (Some(text), _) => writer.write_record([id.as_str(), &row.article_text, text])?,
            (None, true) => writer.write_record([id.as_str(), &row.article_text, ""])?,
            (None, false) => writer.write_record([id.as_str(), &row.article_text])?,
        }
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn strips_exactly_ascii_punctuation() {
        assert_eq!(
            strip_punctuation("Rain, at last; the farmers' relief!"),
            "Rain at last the farmers relief"
        );
        assert_eq!(strip_punctuation("no punctuation here"), "no punctuation here");
    }

    #[test]
    fn chunks_never_exceed_the_limit_and_keep_words_whole() {
        let text = "alpha beta gamma delta epsilon zeta";
        let chunks = wrap_chunks(text, 12);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 12), "{chunks:?}");
        let rejoined: Vec<&str> = chunks.iter().flat_map(|c| c.split(' ')).collect();
        assert_eq!(rejoined, text.split(' ').collect::<Vec<_>>());
    }

    #[test]
    fn oversized_tokens_are_hard_split() {
        let text = "aaaaaaaaaa bb";
        let chunks = wrap_chunks(text, 4);
        assert!(chunks.iter().all(|chunk| chunk.len() <= 4), "{chunks:?}");
        assert_eq!(chunks.concat().replace(' ', ""), "aaaaaaaaaabb");
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(wrap_chunks("one two", 100), vec!["one two".to_string()]);
        assert!(wrap_chunks("", 100).is_empty());
    }

    #[test]
    fn read_texts_opens_each_archive_once_and_keeps_request_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("TXT")).unwrap();
        let file = File::create(dir.path().join("TXT").join("t1.zip")).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in [("601.txt", "first body"), ("602.txt", "second body")] {
            writer
                .start_file(name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();

        let csv = "\
record_id,pub_date,start_page,objecttypes,pdf_zip,pdf_file,txt_zip,txt_file,note
601,1975-03-01,1,news,,,t1.zip,601.txt,
602,1975-03-02,1,news,,,t1.zip,602.txt,
603,1975-03-03,1,news,p.zip,603.pdf,,,
";
        let index = MetadataIndex::from_reader(csv.as_bytes()).unwrap();

        let texts = read_texts(&[602, 601, 603], &index, dir.path()).unwrap();
        assert_eq!(
            texts,
            vec![
                (602, "second body".to_string()),
                (601, "first body".to_string()),
            ]
        );
    }

    #[test]
    fn text_table_includes_the_punctuated_column_only_when_present() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("plain.csv");
        write_text_table(
            &[TextEntry {
                id: 601,
                article_text: "first body".to_string(),
                punctuated_text: None,
            }],
            &plain,
        )
        .unwrap();
        let contents = fs::read_to_string(&plain).unwrap();
        assert!(contents.starts_with("record_id,article_text\n"));

        let restored = dir.path().join("restored.csv");
        write_text_table(
            &[TextEntry {
                id: 601,
                article_text: "first body".to_string(),
                punctuated_text: Some("First, body.".to_string()),
            }],
            &restored,
        )
        .unwrap();
        let contents = fs::read_to_string(&restored).unwrap();
        assert!(contents.starts_with("record_id,article_text,punctuated_text\n"));
        assert!(contents.contains("First, body."));
    }
}

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::archive::error::Result;
use crate::archive::extract::Materializer;
use crate::archive::index::MetadataIndex;
use crate::archive::resolve::{self, DisplayOrder};
use crate::archive::results;
use crate::archive::viewer::{DecisionPrompt, FeedbackSource, Viewer};
use crate::archive::ArticleId;

/// Knobs for one review session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How many articles to show between continue/stop decisions.
    pub chunk_size: usize,
    /// Skip ids already present in the saved feedback table.
    pub append_mode: bool,
    pub display_order: DisplayOrder,
    /// Feedback table location; an existing file here is the resume signal.
    pub save_location: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: 15,
            append_mode: true,
            display_order: DisplayOrder::Chronological,
            save_location: PathBuf::from("article_output.csv"),
        }
    }
}

/// Drives a batch-by-batch review over a resolved request list.
///
/// One run: resolve the raw request, unpack PDF content for the whole list
/// up front, then show articles in chunks of `chunk_size`. The accumulated
/// feedback table is persisted after every article, so an interrupted
/// session loses at most the article in progress. Between chunks the
/// operator chooses whether to keep going; the prompt never appears after
/// the final chunk. The scratch area is removed when the run ends, however
/// it ends.
pub struct SessionController<'a> {
    index: &'a MetadataIndex,
    materializer: Materializer,
    config: SessionConfig,
}

impl<'a> SessionController<'a> {
    pub fn new(index: &'a MetadataIndex, materializer: Materializer, config: SessionConfig) -> Self {
        Self {
            index,
            materializer,
            config,
        }
    }

    pub fn run(
        &self,
        raw_tokens: &[String],
        viewer: &mut dyn Viewer,
        feedback: &mut dyn FeedbackSource,
        prompt: &mut dyn DecisionPrompt,
    ) -> Result<BTreeMap<ArticleId, String>> {
        let outcome = self.run_inner(raw_tokens, viewer, feedback, prompt);
        self.materializer.cleanup();
        outcome
    }

    fn run_inner(
        &self,
        raw_tokens: &[String],
        viewer: &mut dyn Viewer,
        feedback: &mut dyn FeedbackSource,
        prompt: &mut dyn DecisionPrompt,
    ) -> Result<BTreeMap<ArticleId, String>> {
        // Prior results are the merge base; in append mode they also mask
        // already-reviewed ids out of the request.
        let mut results = results::load(&self.config.save_location)?;
        let known = self.config.append_mode.then_some(&results);
        let resolution = resolve::resolve(raw_tokens, self.index, known);

        if !resolution.unrecognized.is_empty() {
            println!("The following entries were not recognized as articles:");
            for token in &resolution.unrecognized {
                println!("{token:?}");
            }
        }
        if resolution.resolved.is_empty() {
            println!("No valid article IDs recognized!");
            return Ok(BTreeMap::new());
        }

        let ordered =
            resolve::sort_for_display(&resolution.resolved, self.index, self.config.display_order);

        println!("Unpacking requested pdfs...");
        self.materializer.unpack_pdfs(&ordered, self.index)?;
        println!("Done!");

        let chunk_size = self.config.chunk_size.max(1);
        let total_chunks = ordered.len().div_ceil(chunk_size);

        for (chunk_number, chunk) in ordered.chunks(chunk_size).enumerate() {
            for (n, id) in chunk.iter().enumerate() {
                println!(
                    "Here's article {} of {}, in set {} of {}:",
                    n + 1,
                    chunk.len(),
                    chunk_number + 1,
                    total_chunks
                );
                self.show_one(*id, viewer, feedback, &mut results)?;
            }

            if chunk_number + 1 == total_chunks {
                println!("All requested articles displayed!");
            } else if !prompt.confirm("Would you like to continue?")? {
                break;
            }
        }

        Ok(results)
    }

    fn show_one(
        &self,
        id: ArticleId,
        viewer: &mut dyn Viewer,
        feedback: &mut dyn FeedbackSource,
        results: &mut BTreeMap<ArticleId, String>,
    ) -> Result<()> {
        // The resolver only emits ids present in the index.
        let Some(record) = self.index.get(id) else {
            return Ok(());
        };
        let pdf_path = record
            .pdf
            .as_ref()
            .map(|pdf| self.materializer.scratch_path(&pdf.member));

        viewer.show(record, pdf_path.as_deref())?;
        let value = feedback.feedback(id)?;
        results.insert(id, value);
        results::save(results, &self.config.save_location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArticleRecord;
    use std::collections::VecDeque;
    use std::path::Path;

    const SAMPLE: &str = "\
record_id,pub_date,start_page,objecttypes,pdf_zip,pdf_file,txt_zip,txt_file,note
101,2020-01-01,3,news,,,t1.zip,101.txt,
102,2020-01-02,1,news,,,t1.zip,102.txt,
103,2020-01-03,5,news,,,t2.zip,103.txt,
104,2020-01-04,2,news,,,t2.zip,104.txt,
105,2020-01-05,9,news,,,t2.zip,105.txt,
";

    struct RecordingViewer(Vec<ArticleId>);

    impl Viewer for RecordingViewer {
        fn show(&mut self, record: &ArticleRecord, _pdf_path: Option<&Path>) -> Result<()> {
            self.0.push(record.id);
            Ok(())
        }
    }

    struct TaggedFeedback;

    impl FeedbackSource for TaggedFeedback {
        fn feedback(&mut self, id: ArticleId) -> Result<String> {
            Ok(format!("fb-{id}"))
        }
    }

    struct ScriptedPrompt(VecDeque<bool>);

    impl DecisionPrompt for ScriptedPrompt {
        fn confirm(&mut self, _message: &str) -> Result<bool> {
            Ok(self.0.pop_front().unwrap_or(false))
        }
    }

    fn index() -> MetadataIndex {
        MetadataIndex::from_reader(SAMPLE.as_bytes()).unwrap()
    }

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|t| t.to_string()).collect()
    }

    fn run_session(
        index: &MetadataIndex,
        root: &Path,
        config: SessionConfig,
        raw: &[&str],
        answers: &[bool],
    ) -> (BTreeMap<ArticleId, String>, Vec<ArticleId>, usize) {
        let controller = SessionController::new(index, Materializer::new(root), config);
        let mut viewer = RecordingViewer(Vec::new());
        let mut prompt = ScriptedPrompt(answers.iter().copied().collect());
        let results = controller
            .run(&tokens(raw), &mut viewer, &mut TaggedFeedback, &mut prompt)
            .unwrap();
        let asked = answers.len() - prompt.0.len();
        (results, viewer.0, asked)
    }

    #[test]
    fn declining_the_prompt_stops_before_the_next_batch() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("out.csv");
        let config = SessionConfig {
            chunk_size: 2,
            save_location: save.clone(),
            ..Default::default()
        };

        let index = index();
        let (results, shown, asked) =
            run_session(&index, dir.path(), config, &["101", "102", "103"], &[false]);

        assert_eq!(shown, vec![101, 102]);
        assert_eq!(asked, 1);
        assert_eq!(results.len(), 2);

        let persisted = results::load(&save).unwrap();
        assert_eq!(persisted.get(&101).map(String::as_str), Some("fb-101"));
        assert_eq!(persisted.get(&102).map(String::as_str), Some("fb-102"));
        assert!(!persisted.contains_key(&103));
    }

    #[test]
    fn all_batches_run_when_the_operator_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            chunk_size: 2,
            save_location: dir.path().join("out.csv"),
            ..Default::default()
        };

        let index = index();
        let (results, shown, asked) = run_session(
            &index,
            dir.path(),
            config,
            &["101", "102", "103", "104", "105"],
            &[true, true],
        );

        // ceil(5 / 2) = 3 batches, with the decision prompt between them only.
        assert_eq!(shown, vec![101, 102, 103, 104, 105]);
        assert_eq!(asked, 2);
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn append_mode_skips_already_reviewed_ids_and_keeps_their_labels() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("out.csv");
        let mut prior = BTreeMap::new();
        prior.insert(101u64, "done".to_string());
        results::save(&prior, &save).unwrap();

        let config = SessionConfig {
            save_location: save.clone(),
            ..Default::default()
        };
        let index = index();
        let (results, shown, _) = run_session(&index, dir.path(), config, &["101", "102"], &[]);

        assert_eq!(shown, vec![102]);
        assert_eq!(results.get(&101).map(String::as_str), Some("done"));
        assert_eq!(results.get(&102).map(String::as_str), Some("fb-102"));

        let persisted = results::load(&save).unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[test]
    fn no_append_reprocesses_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("out.csv");
        let mut prior = BTreeMap::new();
        prior.insert(101u64, "stale".to_string());
        results::save(&prior, &save).unwrap();

        let config = SessionConfig {
            append_mode: false,
            save_location: save.clone(),
            ..Default::default()
        };
        let index = index();
        let (_, shown, _) = run_session(&index, dir.path(), config, &["101"], &[]);

        assert_eq!(shown, vec![101]);
        let persisted = results::load(&save).unwrap();
        assert_eq!(persisted.get(&101).map(String::as_str), Some("fb-101"));
    }

    #[test]
    fn empty_resolution_is_a_no_op_run() {
        let dir = tempfile::tempdir().unwrap();
        let save = dir.path().join("out.csv");
        let config = SessionConfig {
            save_location: save.clone(),
            ..Default::default()
        };

        let index = index();
        let (results, shown, asked) =
            run_session(&index, dir.path(), config, &["garbage", ""], &[]);

        assert!(results.is_empty());
        assert!(shown.is_empty());
        assert_eq!(asked, 0);
        assert!(!save.exists());
        assert!(!dir.path().join("temp").exists());
    }

    #[test]
    fn articles_appear_in_chronological_order() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionConfig {
            save_location: dir.path().join("out.csv"),
            ..Default::default()
        };

        let index = index();
        let (_, shown, _) = run_session(&index, dir.path(), config, &["103", "101", "102"], &[]);
        assert_eq!(shown, vec![101, 102, 103]);
    }
}

mod archive;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use crate::archive::extract::Materializer;
use crate::archive::index::{self, MetadataIndex};
use crate::archive::punctuate::{self, PunctuatorClient, TextEntry};
use crate::archive::resolve::{self, DisplayOrder};
use crate::archive::session::{SessionConfig, SessionController};
use crate::archive::viewer::{self, ConsoleFeedback, ConsolePrompt, ConsoleViewer};

#[derive(Parser)]
#[command(
    name = "news-curator",
    version,
    about = "Batch review and labeling for a packaged newspaper archive"
)]
struct Cli {
    /// Root directory holding the PDF/ and TXT/ archive folders.
    #[arg(long, env = "ARCHIVE_DIR", default_value = ".", global = true)]
    archive_dir: PathBuf,

    /// Metadata table: a csv file, or a zip packaging one. Defaults to
    /// metadata.zip inside the archive directory.
    #[arg(long, env = "METADATA_FILE", global = true)]
    metadata: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk through the requested articles in batches, collecting feedback.
    Review {
        /// Article IDs to review. Prompted for interactively when omitted.
        ids: Vec<String>,

        /// Articles per batch between continue/stop decisions.
        #[arg(long, default_value_t = 15)]
        chunk_size: usize,

        #[arg(long, value_enum, default_value = "chronological")]
        order: DisplayOrder,

        /// Feedback table; an existing file at this path resumes the session.
        #[arg(long, default_value = "article_output.csv")]
        save: PathBuf,

        /// Re-request articles already present in the feedback table.
        #[arg(long)]
        no_append: bool,

        /// Drop non-news records before resolving.
        #[arg(long)]
        news_only: bool,

        /// Keep only the given object-type groups (repeatable).
        #[arg(long = "types")]
        types: Vec<String>,
    },

    /// Export article texts, optionally restoring punctuation remotely.
    Texts {
        /// Article IDs to export. Prompted for interactively when omitted.
        ids: Vec<String>,

        #[arg(long, default_value = "article_texts.csv")]
        out: PathBuf,

        /// Send each text through the punctuation-restoration service.
        #[arg(long)]
        punctuate: bool,

        #[arg(
            long,
            env = "PUNCTUATOR_URL",
            default_value = "http://bark.phon.ioc.ee/punctuator"
        )]
        punctuator_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 0. Load configuration
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let metadata_path = cli
        .metadata
        .clone()
        .unwrap_or_else(|| cli.archive_dir.join("metadata.zip"));

    match cli.command {
        Command::Review {
            ids,
            chunk_size,
            order,
            save,
            no_append,
            news_only,
            types,
        } => {
            // 1. Load and filter the metadata index
            let index = load_index(&metadata_path)?;
            let index = apply_filters(index, news_only, &types)?;

            // 2. Request list
            let raw_ids = request_tokens(ids)?;

            // 3. Run the review session
            let config = SessionConfig {
                chunk_size,
                append_mode: !no_append,
                display_order: order,
                save_location: save,
            };
            let controller =
                SessionController::new(&index, Materializer::new(&cli.archive_dir), config);
            let mut console = ConsoleViewer::new(&cli.archive_dir);
            let results =
                controller.run(&raw_ids, &mut console, &mut ConsoleFeedback, &mut ConsolePrompt)?;
            tracing::info!("Session ended with {} labeled articles", results.len());
        }

        Command::Texts {
            ids,
            out,
            punctuate: restore,
            punctuator_url,
        } => {
            // The export is expensive; an existing file is treated as done.
            if out.exists() {
                println!("{} already exists; delete it to re-export.", out.display());
                return Ok(());
            }

            // 1. Load the metadata index and resolve the request
            let index = load_index(&metadata_path)?;
            let raw_ids = request_tokens(ids)?;
            let resolution = resolve::resolve(&raw_ids, &index, None);
            if !resolution.unrecognized.is_empty() {
                println!("The following entries were not recognized as articles:");
                for token in &resolution.unrecognized {
                    println!("{token:?}");
                }
            }
            if resolution.resolved.is_empty() {
                println!("No valid article IDs recognized!");
                return Ok(());
            }

            // 2. Read the article bodies
            println!("Reading in article contents...");
            let texts = punctuate::read_texts(&resolution.resolved, &index, &cli.archive_dir)?;

            // 3. Optional remote punctuation restoration
            let mut rows = Vec::with_capacity(texts.len());
            if restore {
                println!("Inferring text punctuation...");
                let client = PunctuatorClient::new(punctuator_url);
                for (id, text) in texts {
                    let punctuated = client.punctuate(&text).await?;
                    rows.push(TextEntry {
                        id,
                        article_text: text,
                        punctuated_text: Some(punctuated),
                    });
                }
            } else {
                rows.extend(texts.into_iter().map(|(id, text)| TextEntry {
                    id,
                    article_text: text,
                    punctuated_text: None,
                }));
            }

            // 4. Save
            punctuate::write_text_table(&rows, &out)?;
            println!("Saved {} article texts to {}", rows.len(), out.display());
        }
    }

    Ok(())
}

fn load_index(path: &Path) -> Result<MetadataIndex> {
    println!("Loading metadata...");
    let index = MetadataIndex::load(path)?;
    println!("done \n");
    tracing::info!("Loaded {} article records", index.len());
    Ok(index)
}

/// CLI-supplied tokens may themselves be comma/semicolon joined; with no
/// tokens at all, fall back to the interactive prompt.
fn request_tokens(ids: Vec<String>) -> Result<Vec<String>> {
    if ids.is_empty() {
        return Ok(viewer::prompt_for_request()?);
    }
    Ok(ids
        .iter()
        .flat_map(|token| viewer::split_request_line(token))
        .collect())
}

fn apply_filters(index: MetadataIndex, news_only: bool, types: &[String]) -> Result<MetadataIndex> {
    let mut index = index;
    if news_only {
        println!("Filtering out non-news articles");
        index = index.news_only();
    }

    if !types.is_empty() {
        let mut wanted = Vec::new();
        for name in types {
            match index::object_type_group(name) {
                Some(group) => wanted.extend_from_slice(group),
                None => {
                    let hint = index::suggest_group(name)
                        .map(|suggestion| format!(" (did you mean '{suggestion}'?)"))
                        .unwrap_or_default();
                    anyhow::bail!("unknown object-type group '{name}'{hint}");
                }
            }
        }
        index = index.retain_object_types(&wanted);
    }

    if index.is_empty() {
        tracing::warn!("All records were filtered out");
    }
    Ok(index)
}

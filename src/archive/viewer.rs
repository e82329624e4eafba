use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::archive::error::Result;
use crate::archive::extract::{open_archive, read_member_to_string};
use crate::archive::{ArticleId, ArticleRecord};

/// Renders one article for the operator.
///
/// The session controller guarantees that any PDF content has already been
/// unpacked to `pdf_path` before `show` is called; implementations never
/// have to open the packaged PDF archives themselves.
pub trait Viewer {
    fn show(&mut self, record: &ArticleRecord, pdf_path: Option<&Path>) -> Result<()>;
}

/// Collects the operator's feedback for one article.
pub trait FeedbackSource {
    fn feedback(&mut self, id: ArticleId) -> Result<String>;
}

/// Asks the operator a yes/no question between batches.
pub trait DecisionPrompt {
    fn confirm(&mut self, message: &str) -> Result<bool>;
}

/// Default viewer: prints the article header and either the unpacked PDF
/// location or, when the record carries no PDF pointer, the article text read
/// on demand from the text archive.
pub struct ConsoleViewer {
    txt_dir: PathBuf,
}

impl ConsoleViewer {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            txt_dir: archive_root.into().join("TXT"),
        }
    }

    fn read_text(&self, record: &ArticleRecord) -> Result<String> {
        let Some(txt) = record.txt.as_ref() else {
            return Ok("(no text available for this article)".to_string());
        };
        let path = self.txt_dir.join(&txt.archive);
        let mut archive = open_archive(&path)?;
        read_member_to_string(&mut archive, &txt.archive, &txt.member)
    }
}

impl Viewer for ConsoleViewer {
    fn show(&mut self, record: &ArticleRecord, pdf_path: Option<&Path>) -> Result<()> {
        match pdf_path {
            Some(path) => println!("Open to view: {}", path.display()),
            None => {
                println!("No pdf file found in archive, displaying txt instead:");
                println!("{}", self.read_text(record)?);
            }
        }

        let types: Vec<&str> = record.object_type_list().collect();
        println!(
            "Article ID: {} \t Published {}",
            record.id,
            record.pub_date.format("%A, %B %d, %Y")
        );
        println!("Object Types:\t {}", types.join(", "));
        Ok(())
    }
}

/// Default feedback source: blocks until the operator presses enter and
/// returns whatever was typed on the line (usually nothing).
pub struct ConsoleFeedback;

impl FeedbackSource for ConsoleFeedback {
    fn feedback(&mut self, _id: ArticleId) -> Result<String> {
        print!("Press enter to display next article.");
        io::stdout().flush()?;
        Ok(read_line()?)
    }
}

/// Default decision prompt with a forgiving token set; anything outside it
/// is re-asked.
pub struct ConsolePrompt;

impl DecisionPrompt for ConsolePrompt {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        loop {
            println!("{message}");
            println!("For yes, enter y. (t, a, or 1 also acceptable)");
            println!("For no,  enter n. (f, z or 0 also acceptable).");
            match parse_yes_no(&read_line()?) {
                Some(answer) => return Ok(answer),
                None => println!("I'm not sure how to interpret that."),
            }
        }
    }
}

/// `y`, `t`, `a`, `1` mean yes; `n`, `f`, `z`, `0` mean no.
pub fn parse_yes_no(token: &str) -> Option<bool> {
    match token.trim() {
        "y" | "t" | "a" | "1" => Some(true),
        "n" | "f" | "z" | "0" => Some(false),
        _ => None,
    }
}

/// Split an operator-typed request line into raw id tokens. Empty tokens are
/// kept; the resolver ignores them.
pub fn split_request_line(line: &str) -> Vec<String> {
    line.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(|token| token.trim().to_string())
        .collect()
}

/// Ask the operator which articles to look up.
pub fn prompt_for_request() -> Result<Vec<String>> {
    print!("What article IDs shall I look up for you? ");
    io::stdout().flush()?;
    Ok(split_request_line(&read_line()?))
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

use crate::error::Result;
use crate::prepare::list_files_with_extension;
use crate::types::CHUNK_EXTENSION;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of raw filing documents.
pub const RAW_EXTENSION: &str = "html";

/// Elements whose text never reaches the cleaned output.
const DROPPED_TAGS: &[&str] = &["script", "style", "table", "img", "head", "noscript"];

/// Inline XBRL facts (`ix:nonNumeric`, `ix:nonFraction`, ...). The HTML parser keeps the
/// prefix as part of the lowercased tag name.
const XBRL_PREFIX: &str = "ix:";

/// Footer lines EDGAR stamps onto every rendered page.
const BOILERPLATE_PREFIX: &str = "SEC.gov";

/// Lines that open the body of a periodic report; everything above is cover noise.
const START_MARKERS: &[&str] = &[
    "FORM 10-K",
    "FORM 10-Q",
    "UNITED STATES SECURITIES AND EXCHANGE COMMISSION",
];

/// Outcome of an extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractStats {
    /// Documents converted to text in this run
    pub documents: usize,

    /// Documents that already had a cleaned text file
    pub skipped_existing: usize,

    /// Documents that could not be read as UTF-8
    pub unreadable: usize,

    /// Documents that produced no text at all
    pub empty: usize,
}

/// Converts raw EDGAR filing HTML (`{ticker}_{form}_{accession}.html`) into cleaned text files
/// with the same stem.
pub struct TextExtractor {
    input_dir: PathBuf,
    output_dir: PathBuf,
}

impl TextExtractor {
    pub fn new(input_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            input_dir: input_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Extract every document whose cleaned text file does not exist yet.
    pub async fn extract(&self) -> Result<ExtractStats> {
        let mut stats = ExtractStats::default();
        tokio::fs::create_dir_all(&self.output_dir).await?;

        for name in list_files_with_extension(&self.input_dir, RAW_EXTENSION).await? {
            let Some(stem) = name.strip_suffix(&format!(".{RAW_EXTENSION}")) else {
                continue;
            };
            let output = self.output_dir.join(format!("{stem}.{CHUNK_EXTENSION}"));
            if tokio::fs::try_exists(&output).await? {
                log::debug!("{name} already extracted");
                stats.skipped_existing += 1;
                continue;
            }

            let path = self.input_dir.join(&name);
            let html = match tokio::fs::read_to_string(&path).await {
                Ok(html) => html,
                Err(err) => {
                    log::warn!("Skipping unreadable filing {}: {err}", path.display());
                    stats.unreadable += 1;
                    continue;
                }
            };

            let text = extract_filing_text(&html);
            if text.is_empty() {
                log::warn!("{name} contains no extractable text");
                stats.empty += 1;
            }
            tokio::fs::write(&output, text).await?;
            log::info!("Extracted {name} to {}", output.display());
            stats.documents += 1;
        }

        Ok(stats)
    }
}

/// Visible narrative text of a filing, one trimmed non-empty line per text run, starting at the
/// report banner when one is present.
#[must_use]
pub fn extract_filing_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);

    let lines: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(BOILERPLATE_PREFIX))
        .collect();
    let start = lines
        .iter()
        .position(|line| START_MARKERS.iter().any(|marker| line.contains(marker)))
        .unwrap_or(0);
    lines[start..].join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    if is_dropped(element.value()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

fn is_dropped(element: &Element) -> bool {
    let name = element.name();
    DROPPED_TAGS.contains(&name) || name.starts_with(XBRL_PREFIX)
}

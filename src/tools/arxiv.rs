//! Academic paper search over the arXiv export API.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use tracing::{info, warn};

use super::{required_str, Tool, ToolArg, ToolArgs};

const API_URL: &str = "https://export.arxiv.org/api/query";

/// Upper bound on the rendered result.
const DOC_CONTENT_CHARS_MAX: usize = 40_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortCriterion {
    Relevance,
    LastUpdatedDate,
    #[default]
    SubmittedDate,
}

impl SortCriterion {
    /// Unknown names fall back to the default criterion.
    pub fn from_name(name: &str) -> Self {
        match name {
            "relevance" => SortCriterion::Relevance,
            "lastUpdatedDate" => SortCriterion::LastUpdatedDate,
            _ => SortCriterion::SubmittedDate,
        }
    }
}

impl fmt::Display for SortCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortCriterion::Relevance => write!(f, "relevance"),
            SortCriterion::LastUpdatedDate => write!(f, "lastUpdatedDate"),
            SortCriterion::SubmittedDate => write!(f, "submittedDate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Anything other than `descending` sorts ascending.
    pub fn from_name(name: &str) -> Self {
        if name == "descending" {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ascending"),
            SortOrder::Descending => write!(f, "descending"),
        }
    }
}

/// One paper from the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArxivEntry {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub published: Option<NaiveDate>,
    pub authors: Vec<String>,
}

impl ArxivEntry {
    fn render(&self) -> String {
        let published = self
            .published
            .map(|d| d.to_string())
            .unwrap_or_default();
        format!(
            "Published: {}\nURL: {}\nTitle: {}\nAuthors: {}\nSummary: {}\n",
            published,
            self.id,
            self.title,
            self.authors.join(", "),
            self.summary.replace('\n', " ")
        )
    }
}

/// Search arXiv and summarize the top papers.
pub struct ArxivTool {
    client: reqwest::Client,
    top_k_results: usize,
    sort_criterion: SortCriterion,
    sort_order: SortOrder,
}

impl Default for ArxivTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ArxivTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            top_k_results: 3,
            sort_criterion: SortCriterion::default(),
            sort_order: SortOrder::default(),
        }
    }

    pub fn with_top_k_results(mut self, top_k_results: usize) -> Self {
        self.top_k_results = top_k_results;
        self
    }

    pub fn with_sort(mut self, criterion: SortCriterion, order: SortOrder) -> Self {
        self.sort_criterion = criterion;
        self.sort_order = order;
        self
    }

    fn query_url(&self, query: &str) -> String {
        format!(
            "{}?search_query={}&start=0&max_results={}&sortBy={}&sortOrder={}",
            API_URL,
            urlencoding::encode(query),
            self.top_k_results,
            self.sort_criterion,
            self.sort_order
        )
    }
}

#[async_trait]
impl Tool for ArxivTool {
    fn name(&self) -> &str {
        "ArxivTool"
    }

    fn description(&self) -> &str {
        "This tool is useful when you want to search for academic papers on arXiv."
    }

    fn arguments(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::new("query", "The search query, topic or keywords")];
        ARGS
    }

    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
        let query = required_str(args, "query")?;
        let url = self.query_url(query);
        info!("Querying arXiv: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("arXiv API error: {}", status));
        }
        let feed = response.text().await?;

        let entries = parse_feed(&feed)?;
        Ok(render_entries(&entries))
    }
}

fn render_entries(entries: &[ArxivEntry]) -> String {
    entries
        .iter()
        .map(ArxivEntry::render)
        .collect::<Vec<_>>()
        .join("\n")
        .chars()
        .take(DOC_CONTENT_CHARS_MAX)
        .collect()
}

/// Parse the Atom feed returned by the export API.
fn parse_feed(feed: &str) -> anyhow::Result<Vec<ArxivEntry>> {
    let entry_re = Regex::new(r"(?s)<entry>(.*?)</entry>")?;
    let author_re = Regex::new(r"(?s)<author>\s*<name>(.*?)</name>")?;

    let entries = entry_re
        .captures_iter(feed)
        .map(|caps| {
            let body = caps.get(1).map_or("", |m| m.as_str());
            ArxivEntry {
                id: tag_text(body, "id"),
                title: flatten(&tag_text(body, "title")),
                summary: tag_text(body, "summary"),
                published: parse_date(&tag_text(body, "published")),
                authors: author_re
                    .captures_iter(body)
                    .filter_map(|a| a.get(1))
                    .map(|m| unescape_xml(m.as_str().trim()))
                    .collect(),
            }
        })
        .collect();

    Ok(entries)
}

/// Trimmed, unescaped text of the first `<tag>...</tag>` in `body`.
fn tag_text(body: &str, tag: &str) -> String {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);

    let Some(start) = body.find(&open) else {
        return String::new();
    };
    let after_open = &body[start + open.len()..];
    let Some(content_start) = after_open.find('>') else {
        return String::new();
    };
    let content = &after_open[content_start + 1..];
    let content = content.find(&close).map_or(content, |end| &content[..end]);
    unescape_xml(content.trim())
}

fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|d| d.date_naive())
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title type="html">ArXiv Query: search_query=all:language agent</title>
  <entry>
    <id>http://arxiv.org/abs/2401.00001v1</id>
    <updated>2024-01-02T10:00:00Z</updated>
    <published>2024-01-01T18:59:59Z</published>
    <title>Language Agents
      as Planners</title>
    <summary>  We study agents &amp; tools.
Second line.
</summary>
    <author>
      <name>Ada Lovelace</name>
    </author>
    <author>
      <name>Alan Turing</name>
    </author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2312.99999v2</id>
    <published>not a date</published>
    <title>Short</title>
    <summary>Tiny.</summary>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries() {
        let entries = parse_feed(FEED).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.id, "http://arxiv.org/abs/2401.00001v1");
        assert_eq!(first.title, "Language Agents as Planners");
        assert_eq!(first.published, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(first.authors, ["Ada Lovelace", "Alan Turing"]);
        assert_eq!(first.summary, "We study agents & tools.\nSecond line.");

        assert_eq!(entries[1].published, None);
        assert!(entries[1].authors.is_empty());
    }

    #[test]
    fn renders_entries() {
        let entries = parse_feed(FEED).unwrap();
        let out = render_entries(&entries);
        assert_eq!(
            out,
            "Published: 2024-01-01\nURL: http://arxiv.org/abs/2401.00001v1\nTitle: Language Agents as Planners\nAuthors: Ada Lovelace, Alan Turing\nSummary: We study agents & tools. Second line.\n\
             \nPublished: \nURL: http://arxiv.org/abs/2312.99999v2\nTitle: Short\nAuthors: \nSummary: Tiny.\n"
        );
    }

    #[test]
    fn output_is_bounded() {
        let entry = ArxivEntry {
            id: "id".into(),
            title: "t".into(),
            summary: "x".repeat(DOC_CONTENT_CHARS_MAX),
            published: None,
            authors: Vec::new(),
        };
        assert_eq!(render_entries(&[entry]).chars().count(), DOC_CONTENT_CHARS_MAX);
    }

    #[test]
    fn query_url_carries_sorting() {
        let tool = ArxivTool::new()
            .with_top_k_results(2)
            .with_sort(SortCriterion::from_name("relevance"), SortOrder::from_name("ascending"));
        assert_eq!(
            tool.query_url("language agent"),
            "https://export.arxiv.org/api/query?search_query=language%20agent&start=0&max_results=2&sortBy=relevance&sortOrder=ascending"
        );
        assert_eq!(SortCriterion::from_name("bogus"), SortCriterion::SubmittedDate);
        assert_eq!(SortOrder::default(), SortOrder::Descending);
    }
}

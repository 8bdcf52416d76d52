//! Web access tools: search the internet and scrape pages.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{required_str, Tool, ToolArg, ToolArgs};

/// Observation returned when no backend produced results.
pub const EMPTY_SEARCH_RESULT: &str = "The search result is empty.";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/87.0.4280.88 Safari/537.36";

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Falling back to default HTTP client: {}", e);
            reqwest::Client::new()
        })
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

/// HTML search front-ends that need no API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    DuckDuckGo,
    Bing,
}

impl SearchBackend {
    pub fn name(&self) -> &'static str {
        match self {
            SearchBackend::DuckDuckGo => "DuckDuckGo",
            SearchBackend::Bing => "Bing",
        }
    }

    fn url(&self, query: &str) -> String {
        let encoded = urlencoding::encode(query);
        match self {
            SearchBackend::DuckDuckGo => format!("https://html.duckduckgo.com/html/?q={}", encoded),
            SearchBackend::Bing => format!("https://www.bing.com/search?q={}", encoded),
        }
    }

    fn parse(&self, html: &str) -> Vec<SearchResult> {
        match self {
            SearchBackend::DuckDuckGo => extract_ddg_results(html),
            SearchBackend::Bing => extract_bing_results(html),
        }
    }
}

/// Search the internet, trying each backend in turn.
pub struct SearchTool {
    client: reqwest::Client,
    backends: Vec<SearchBackend>,
    top_k: usize,
    retry: usize,
}

impl Default for SearchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchTool {
    pub fn new() -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            backends: vec![SearchBackend::DuckDuckGo, SearchBackend::Bing],
            top_k: 5,
            retry: 5,
        }
    }

    pub fn with_backends(mut self, backends: Vec<SearchBackend>) -> Self {
        self.backends = backends;
        self
    }

    /// Number of results kept.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Attempts per backend.
    pub fn with_retry(mut self, retry: usize) -> Self {
        self.retry = retry;
        self
    }

    async fn search_once(&self, backend: SearchBackend, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let response = self.client.get(backend.url(query)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }
        let html = response.text().await?;
        Ok(backend.parse(&html))
    }

    fn render(&self, mut results: Vec<SearchResult>) -> anyhow::Result<String> {
        results.truncate(self.top_k);
        Ok(serde_json::to_string_pretty(&results)?)
    }

    async fn search(&self, query: &str) -> anyhow::Result<String> {
        for &backend in &self.backends {
            for attempt in 0..self.retry {
                match self.search_once(backend, query).await {
                    Ok(results) if !results.is_empty() => {
                        info!("{} returned {} results", backend.name(), results.len());
                        return self.render(results);
                    }
                    Ok(_) => debug!("{} returned no results (attempt {})", backend.name(), attempt + 1),
                    Err(e) => {
                        error!("Error during search with {}: {}", backend.name(), e);
                        if attempt + 1 == self.retry {
                            error!("All retries failed for {}", backend.name());
                        }
                    }
                }
            }
        }
        Ok(EMPTY_SEARCH_RESULT.to_string())
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "SearchTool"
    }

    fn description(&self) -> &str {
        "Useful for searching the internet when unsure about a concept or question."
    }

    fn arguments(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::new("query", "The content to search")];
        ARGS
    }

    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
        let query = required_str(args, "query")?;
        self.search(query).await
    }
}

/// Extract search results from DuckDuckGo HTML.
fn extract_ddg_results(html: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for chunk in html.split("result__body").skip(1) {
        let Some(anchor) = chunk.split("class=\"result__a\"").nth(1) else {
            continue;
        };
        let title = element_text(anchor, "</a>");
        if title.is_empty() {
            continue;
        }

        let link = attr_value(anchor, "href")
            .map(ddg_link)
            .unwrap_or_default();

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .map(|s| element_text(s, "</a>"))
            .unwrap_or_default();

        results.push(SearchResult { title, link, snippet });
    }

    results
}

/// Extract search results from Bing HTML.
fn extract_bing_results(html: &str) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"b_algo\"").skip(1) {
        let Some(heading) = chunk.split("<h2").nth(1) else {
            continue;
        };
        let Some(anchor) = heading.split("<a").nth(1) else {
            continue;
        };
        let title = element_text(anchor, "</a>");
        let link = attr_value(anchor, "href").map(html_decode).unwrap_or_default();
        if title.is_empty() || link.is_empty() {
            continue;
        }

        let snippet = chunk
            .split("<p")
            .nth(1)
            .map(|s| element_text(s, "</p>"))
            .unwrap_or_default();

        results.push(SearchResult { title, link, snippet });
    }

    results
}

/// Value of `attr="..."` in the first tag of `fragment`.
fn attr_value<'a>(fragment: &'a str, attr: &str) -> Option<&'a str> {
    let tag_end = fragment.find('>').unwrap_or(fragment.len());
    let tag = &fragment[..tag_end];
    let needle = format!("{}=\"", attr);
    let start = tag.find(&needle)? + needle.len();
    let len = tag[start..].find('"')?;
    Some(&tag[start..start + len])
}

/// Text content of the element whose opening tag `fragment` is in, up to
/// `closing`.
fn element_text(fragment: &str, closing: &str) -> String {
    let Some(open_end) = fragment.find('>') else {
        return String::new();
    };
    let body = &fragment[open_end + 1..];
    let body = body.find(closing).map(|end| &body[..end]).unwrap_or(body);
    collapse_whitespace(&html_decode(&strip_tags(body)))
}

/// DuckDuckGo wraps result links in a redirect carrying the target in `uddg`.
fn ddg_link(href: &str) -> String {
    let href = html_decode(href);
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.clone()
    };

    url::Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(href)
}

fn strip_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                result.push(' ');
            }
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the named entities pages commonly use plus numeric references.
fn html_decode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&semi| semi <= 10)
            .and_then(|semi| decode_entity(&tail[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Extract readable text from HTML.
fn extract_text_from_html(html: &str) -> String {
    let mut text = html.to_string();

    for (open, close) in [("<script", "</script>"), ("<style", "</style>")] {
        while let Some(start) = text.find(open) {
            let Some(end) = text[start..].find(close) else {
                break;
            };
            text.replace_range(start..start + end + close.len(), " ");
        }
    }

    collapse_whitespace(&html_decode(&strip_tags(&text)))
}

/// Fetch a page and return its readable text.
pub struct ScrapTool {
    client: reqwest::Client,
    text_length: usize,
}

impl Default for ScrapTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapTool {
    pub fn new() -> Self {
        Self {
            client: http_client(Duration::from_secs(30)),
            text_length: 8000,
        }
    }

    /// Maximum number of characters returned.
    pub fn with_text_length(mut self, text_length: usize) -> Self {
        self.text_length = text_length;
        self
    }

    async fn scrape(&self, url: &url::Url) -> anyhow::Result<String> {
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();
        let body = response.text().await?;

        let text = if content_type.is_empty() || content_type.contains("html") {
            extract_text_from_html(&body)
        } else {
            body
        };
        Ok(text.chars().take(self.text_length).collect())
    }
}

#[async_trait]
impl Tool for ScrapTool {
    fn name(&self) -> &str {
        "ScrapTool"
    }

    fn description(&self) -> &str {
        "Useful when you want to get detailed textual content from an url."
    }

    fn arguments(&self) -> &[ToolArg] {
        const ARGS: &[ToolArg] = &[ToolArg::new("url", "The url desired to search.")];
        ARGS
    }

    async fn invoke(&self, args: &ToolArgs) -> anyhow::Result<String> {
        let raw = required_str(args, "url")?;
        let url = url::Url::parse(raw.trim())
            .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", raw, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow::anyhow!("Unsupported URL scheme: {}", url.scheme()));
        }

        info!("Scraping {}", url);
        self.scrape(&url).await
    }
}

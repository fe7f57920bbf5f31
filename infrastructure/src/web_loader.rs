//! Fetches pages over HTTP and keeps the text under selected CSS classes.

use crate::http::build_client;
use async_trait::async_trait;
use domain::models::Document;
use domain::services::DocumentSource;
use domain::{RagError, Result};
use reqwest::Client;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

const SKIPPED_TAGS: &[&str] = &["script", "style", "template", "noscript", "svg"];

#[derive(Clone)]
pub struct WebLoader {
    client: Client,
    content_classes: HashSet<String>,
}

impl WebLoader {
    /// Empty `content_classes` keeps the whole `<body>`.
    pub fn new(content_classes: &[String], timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout, None)?,
            content_classes: content_classes.iter().cloned().collect(),
        })
    }

    pub async fn fetch(&self, url: &str) -> Result<Document> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| RagError::fetch(url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RagError::fetch(url, format!("HTTP {status}")));
        }
        let body = response.text().await.map_err(|err| RagError::fetch(url, err))?;
        debug!(url, bytes = body.len(), "fetched page");
        self.parse(url, &body)
    }

    pub fn parse(&self, url: &str, html: &str) -> Result<Document> {
        let page = Html::parse_document(html);
        let content = extract_text(&page, &self.content_classes)
            .ok_or_else(|| RagError::fetch(url, "no elements matched the content selector"))?;
        let mut document = Document::new(url, content);
        if let Some(title) = page_title(&page) {
            document = document.with_metadata("title", title);
        }
        Ok(document)
    }
}

#[async_trait]
impl DocumentSource for WebLoader {
    async fn load(&self, locators: &[String]) -> Result<Vec<Document>> {
        let mut documents = Vec::with_capacity(locators.len());
        for url in locators {
            let document = self.fetch(url).await?;
            info!(url = %url, chars = document.char_len(), "loaded web page");
            documents.push(document);
        }
        Ok(documents)
    }
}

fn has_wanted_class(element: &ElementRef<'_>, classes: &HashSet<String>) -> bool {
    element.value().classes().any(|class| classes.contains(class))
}

/// Text of every outermost matching element, one block per element.
/// `None` means nothing matched; a match containing only whitespace yields `Some("")`.
fn extract_text(page: &Html, classes: &HashSet<String>) -> Option<String> {
    let roots: Vec<ElementRef<'_>> = if classes.is_empty() {
        let body = Selector::parse("body").ok()?;
        page.select(&body).take(1).collect()
    } else {
        let classed = Selector::parse("[class]").ok()?;
        page.select(&classed)
            .filter(|el| has_wanted_class(el, classes))
            .filter(|el| {
                !el.ancestors()
                    .filter_map(ElementRef::wrap)
                    .any(|ancestor| has_wanted_class(&ancestor, classes))
            })
            .collect()
    };
    if roots.is_empty() {
        return None;
    }

    let blocks: Vec<String> = roots
        .iter()
        .map(element_text)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    Some(blocks.join("\n\n"))
}

fn element_text(element: &ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in element.descendants() {
        let Node::Text(fragment) = node.value() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|parent| SKIPPED_TAGS.contains(&parent.value().name()));
        if !hidden {
            text.push_str(fragment);
        }
    }
    text
}

fn page_title(page: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    page.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
}

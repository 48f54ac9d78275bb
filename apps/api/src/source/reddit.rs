use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::document::{Comment, Document};
use crate::source::{match_keywords, DocumentSource, SourceError, ALL_COMMUNITIES};

const REDDIT_BASE_URL: &str = "https://www.reddit.com";
/// Reddit returns at most this many posts per listing page.
const MAX_PAGE_SIZE: u32 = 100;
const DELETED_AUTHOR: &str = "[deleted]";
const COMMENT_KIND: &str = "t1";

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    author: Option<String>,
    subreddit: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    created_utc: f64,
    permalink: String,
}

/// Comment listings mix `t1` comments with `more` stubs, so children stay
/// untyped until their kind is known.
#[derive(Debug, Deserialize)]
struct ThingListing {
    data: ThingListingData,
}

#[derive(Debug, Deserialize)]
struct ThingListingData {
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    created_utc: f64,
    /// A listing object, or `""` when there are no replies.
    #[serde(default)]
    replies: serde_json::Value,
}

/// One decoded search page and the cursor for the next.
#[derive(Debug)]
struct Page {
    documents: Vec<Document>,
    after: Option<String>,
}

/// Searches Reddit through its public JSON listing endpoints, following the
/// `after` cursor until the requested number of posts is reached.
pub struct RedditSource {
    client: Client,
    base_url: String,
}

impl RedditSource {
    pub fn new(user_agent: &str) -> Result<Self, SourceError> {
        Self::with_base_url(user_agent, REDDIT_BASE_URL)
    }

    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self, community: &str) -> String {
        if community.eq_ignore_ascii_case(ALL_COMMUNITIES) {
            format!("{}/search.json", self.base_url)
        } else {
            format!("{}/r/{}/search.json", self.base_url, community)
        }
    }

    fn comments_url(&self, external_id: &str) -> String {
        format!("{}/comments/{}.json", self.base_url, external_id)
    }

    async fn get_text(
        &self,
        url: String,
        params: &[(&str, &str)],
        target: &str,
    ) -> Result<String, SourceError> {
        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                target: target.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DocumentSource for RedditSource {
    async fn fetch(
        &self,
        community: &str,
        keywords: &[String],
        limit: u32,
    ) -> Result<Vec<Document>, SourceError> {
        let query = build_query(keywords);
        let wanted = limit as usize;
        let mut documents: Vec<Document> = Vec::with_capacity(wanted);
        let mut after: Option<String> = None;

        while documents.len() < wanted {
            let page_size = (wanted - documents.len()).min(MAX_PAGE_SIZE as usize).to_string();
            let mut params = vec![("q", query.as_str()), ("limit", page_size.as_str())];
            if !community.eq_ignore_ascii_case(ALL_COMMUNITIES) {
                params.push(("restrict_sr", "1"));
            }
            if let Some(cursor) = &after {
                params.push(("after", cursor.as_str()));
            }

            let body = match self.get_text(self.search_url(community), &params, community).await {
                Ok(body) => body,
                Err(e) if !documents.is_empty() => {
                    warn!(
                        "Stopped paging '{}' after {} posts: {e}",
                        community,
                        documents.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            };
            let page = parse_listing(&body, keywords)?;
            let exhausted = page.documents.is_empty() || page.after.is_none();
            documents.extend(page.documents);
            after = page.after;
            if exhausted {
                break;
            }
        }

        documents.truncate(wanted);
        debug!("Fetched {} posts from '{}'", documents.len(), community);
        Ok(documents)
    }

    async fn comments(&self, external_id: &str, limit: u32) -> Result<Vec<Comment>, SourceError> {
        let limit_param = limit.to_string();
        let body = self
            .get_text(
                self.comments_url(external_id),
                &[("limit", limit_param.as_str())],
                external_id,
            )
            .await?;
        let comments = parse_comments(&body, limit as usize)?;
        debug!("Fetched {} comments for '{}'", comments.len(), external_id);
        Ok(comments)
    }
}

fn build_query(keywords: &[String]) -> String {
    keywords.join(" OR ")
}

fn parse_listing(body: &str, keywords: &[String]) -> Result<Page, SourceError> {
    let listing: Listing = serde_json::from_str(body)?;
    let documents = listing
        .data
        .children
        .into_iter()
        .map(|child| submission_to_document(child.data, keywords))
        .collect();
    Ok(Page {
        documents,
        after: listing.data.after,
    })
}

fn timestamp(epoch_seconds: f64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(epoch_seconds as i64, 0).unwrap_or_default()
}

fn author_or_deleted(author: Option<String>) -> String {
    author.unwrap_or_else(|| DELETED_AUTHOR.to_string())
}

fn submission_to_document(submission: Submission, keywords: &[String]) -> Document {
    let keywords_matched = match_keywords(keywords, &submission.title, &submission.selftext);
    Document {
        external_id: submission.id,
        title: submission.title,
        body: submission.selftext,
        author: author_or_deleted(submission.author),
        community: submission.subreddit,
        url: submission.url,
        score: submission.score,
        num_comments: submission.num_comments,
        created_utc: timestamp(submission.created_utc),
        permalink: format!("https://reddit.com{}", submission.permalink),
        keywords_matched,
        relevance_score: None,
        analysis_reason: None,
    }
}

/// A comment thread is `[post listing, comment listing]`. Replies are walked
/// breadth-first and `more` stubs are skipped.
fn parse_comments(body: &str, limit: usize) -> Result<Vec<Comment>, SourceError> {
    let mut thread: Vec<ThingListing> = serde_json::from_str(body)?;
    if thread.len() < 2 {
        return Ok(Vec::new());
    }
    let mut queue: VecDeque<Thing> = thread.swap_remove(1).data.children.into();

    let mut comments = Vec::new();
    while comments.len() < limit {
        let Some(thing) = queue.pop_front() else {
            break;
        };
        if thing.kind != COMMENT_KIND {
            continue;
        }
        let raw: RawComment = serde_json::from_value(thing.data)?;
        if raw.replies.is_object() {
            let replies: ThingListing = serde_json::from_value(raw.replies)?;
            queue.extend(replies.data.children);
        }
        comments.push(Comment {
            id: raw.id,
            author: author_or_deleted(raw.author),
            body: raw.body,
            score: raw.score,
            created_utc: timestamp(raw.created_utc),
        });
    }
    Ok(comments)
}

use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;

use crate::store::IncomingStory;

const BASE: &str = "https://hacker-news.firebaseio.com/v0";
const MAX_CONCURRENT_ITEM_FETCHES: usize = 16;
const NEW_STORIES_LIMIT: usize = 500;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
struct Item {
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    by: Option<String>,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    descendants: Option<i64>,
}

/// Fallback ingestion path, used only when the primary Algolia path errors on its
/// very first request. Fetches the new-stories id list (capped at the provider's most recent 500)
/// and each item with bounded concurrency, then drops anything at or before `since`.
pub async fn fetch_new_stories_since(http: &Client, since: i64) -> Result<Vec<IncomingStory>, reqwest::Error> {
    let ids: Vec<i64> = http
        .get(format!("{BASE}/newstories.json"))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?
        .json()
        .await?;

    let ids: Vec<i64> = ids.into_iter().take(NEW_STORIES_LIMIT).collect();

    let mut stories: Vec<IncomingStory> = stream::iter(ids)
        .map(|id| fetch_item(http, id))
        .buffer_unordered(MAX_CONCURRENT_ITEM_FETCHES)
        .filter_map(|res| async move {
            match res {
                Ok(item) => item,
                Err(err) => {
                    tracing::warn!(?err, "firebase item fetch failed");
                    None
                }
            }
        })
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter(|story| story.time > since)
        .collect();

    stories.sort_by_key(|s| s.time);
    Ok(stories)
}

async fn fetch_item(http: &Client, id: i64) -> Result<Option<IncomingStory>, reqwest::Error> {
    let item: Item = http
        .get(format!("{BASE}/item/{id}.json"))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?
        .json()
        .await?;

    if let Some(t) = &item.r#type {
        if t != "story" {
            return Ok(None);
        }
    }

    Ok(Some(IncomingStory {
        id,
        title: item.title.unwrap_or_else(|| "[no title]".to_string()),
        url: item.url,
        text: item.text,
        author: item.by.unwrap_or_else(|| "[deleted]".to_string()),
        time: item.time.unwrap_or(0),
        score: item.score.unwrap_or(0),
        descendants: item.descendants.unwrap_or(0),
    }))
}

/// Front-page tracker's feed: the HN top-stories id list, ranked by list position.
pub async fn fetch_top_story_ids(http: &Client) -> Result<Vec<i64>, reqwest::Error> {
    http.get(format!("{BASE}/topstories.json"))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await?
        .json()
        .await
}

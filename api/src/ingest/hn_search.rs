use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::store::IncomingStory;

const ENDPOINT: &str = "https://hn.algolia.com/api/v1/search_by_date";
const HITS_PER_PAGE: u32 = 100;
const MAX_PAGES: u32 = 10;
const WINDOW_HIT_CAP: usize = 1000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    story_text: Option<String>,
    #[serde(default)]
    author: Option<String>,
    created_at_i: i64,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
    #[serde(default, rename = "_tags")]
    tags: Vec<String>,
}

/// Fetches every story created after `since`, oldest-to-newest, via Algolia's descending-time
/// windowing: each window pulls up to 1000 hits (10 pages x 100), and when a window is
/// full the next window's upper bound becomes that window's oldest timestamp, repeating until the
/// oldest hit in a batch reaches `since` or a batch comes back short.
///
/// Only a transport/parse failure on the very first request is surfaced as an error, so the
/// caller can fall back to Firebase; failures on later pages are logged and whatever was collected
/// so far is returned, so the derived checkpoint still advances.
pub async fn fetch_since(http: &Client, since: i64) -> Result<Vec<IncomingStory>, reqwest::Error> {
    let mut upper: Option<i64> = None;
    let mut collected: Vec<IncomingStory> = Vec::new();
    let mut first_request = true;

    loop {
        let mut window_hits: Vec<Hit> = Vec::new();

        for page in 0..MAX_PAGES {
            let mut filter = format!("created_at_i>{since}");
            if let Some(upper) = upper {
                filter.push_str(&format!(",created_at_i<{upper}"));
            }

            let resp = http
                .get(ENDPOINT)
                .query(&[
                    ("tags", "story"),
                    ("numericFilters", filter.as_str()),
                    ("hitsPerPage", HITS_PER_PAGE.to_string().as_str()),
                    ("page", page.to_string().as_str()),
                ])
                .timeout(REQUEST_TIMEOUT)
                .send()
                .await;

            let resp = match resp {
                Ok(r) => r,
                Err(err) if first_request => return Err(err),
                Err(err) => {
                    tracing::warn!(?err, "algolia page request failed, stopping this window early");
                    break;
                }
            };
            first_request = false;

            let parsed = resp.json::<SearchResponse>().await;
            let parsed = match parsed {
                Ok(p) => p,
                Err(err) => {
                    tracing::warn!(?err, "algolia response parse failed, stopping this window early");
                    break;
                }
            };

            let got = parsed.hits.len();
            window_hits.extend(parsed.hits);
            if got < HITS_PER_PAGE as usize {
                break;
            }
        }

        if window_hits.is_empty() {
            break;
        }

        let window_min_time = window_hits.iter().map(|h| h.created_at_i).min().unwrap_or(since);
        let hit_count = window_hits.len();
        collected.extend(window_hits.into_iter().filter_map(hit_to_story));

        if hit_count < WINDOW_HIT_CAP || window_min_time <= since {
            break;
        }

        upper = Some(window_min_time);
    }

    collected.sort_by_key(|s| s.time);
    Ok(collected)
}

fn hit_to_story(hit: Hit) -> Option<IncomingStory> {
    if !hit.tags.is_empty() && !hit.tags.iter().any(|t| t == "story") {
        return None;
    }
    let id: i64 = hit.object_id.parse().ok()?;
    Some(IncomingStory {
        id,
        title: hit.title.unwrap_or_else(|| "[no title]".to_string()),
        url: hit.url,
        text: hit.story_text,
        author: hit.author.unwrap_or_else(|| "[deleted]".to_string()),
        time: hit.created_at_i,
        score: hit.points.unwrap_or(0),
        descendants: hit.num_comments.unwrap_or(0),
    })
}

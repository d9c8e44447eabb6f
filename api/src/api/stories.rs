use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;
use crate::json::Json;
use crate::store::{ListFilter, SortOrder, Story};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    dismissed_only: Option<bool>,
    #[serde(default)]
    include_blocked: Option<bool>,
    #[serde(default)]
    include_read_later: Option<bool>,
    #[serde(default)]
    read_later_only: Option<bool>,
}

#[derive(Serialize)]
pub struct StoryDto {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub author: String,
    pub time: i64,
    pub score: i64,
    pub descendants: i64,
    pub teaser: Option<String>,
    pub content_status: &'static str,
    pub attempts: i64,
    pub content_source: Option<String>,
    pub billed_ms: i64,
    pub hit_front_page: bool,
    pub front_page_rank: Option<i64>,
    pub net_score: i64,
    pub domain_merit: i64,
    pub domain_demerit: i64,
    pub word_merit: i64,
    pub word_demerit: i64,
}

impl From<crate::store::ScoredStory> for StoryDto {
    fn from(s: crate::store::ScoredStory) -> Self {
        StoryDto {
            id: s.story.id,
            title: s.story.title,
            url: s.story.url,
            domain: s.story.domain,
            author: s.story.author,
            time: s.story.time,
            score: s.story.score,
            descendants: s.story.descendants,
            teaser: s.story.teaser,
            content_status: s.story.content_status.as_str(),
            attempts: s.story.attempts,
            content_source: s.story.content_source,
            billed_ms: s.story.billed_ms,
            hit_front_page: s.story.hit_front_page,
            front_page_rank: s.story.front_page_rank,
            net_score: s.net_score,
            domain_merit: s.domain_merit,
            domain_demerit: s.domain_demerit,
            word_merit: s.word_merit,
            word_demerit: s.word_demerit,
        }
    }
}

pub(super) fn plain_dto(story: Story) -> StoryDto {
    StoryDto {
        id: story.id,
        title: story.title,
        url: story.url,
        domain: story.domain,
        author: story.author,
        time: story.time,
        score: story.score,
        descendants: story.descendants,
        teaser: story.teaser,
        content_status: story.content_status.as_str(),
        attempts: story.attempts,
        content_source: story.content_source,
        billed_ms: story.billed_ms,
        hit_front_page: story.hit_front_page,
        front_page_rank: story.front_page_rank,
        net_score: 0,
        domain_merit: 0,
        domain_demerit: 0,
        word_merit: 0,
        word_demerit: 0,
    }
}

#[derive(Serialize)]
pub struct StoryListResponse {
    pub stories: Vec<StoryDto>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

fn parse_cursor(raw: &str) -> Result<(i64, i64), AppError> {
    let (time, id) = raw
        .split_once(':')
        .ok_or_else(|| AppError::BadRequest("cursor must be `<time>:<id>`".into()))?;
    let time: i64 = time
        .parse()
        .map_err(|_| AppError::BadRequest("malformed cursor time".into()))?;
    let id: i64 = id
        .parse()
        .map_err(|_| AppError::BadRequest("malformed cursor id".into()))?;
    Ok((time, id))
}

pub async fn list_stories(
    State(app): State<App>,
    Query(query): Query<ListQuery>,
) -> Result<Json<StoryListResponse>, AppError> {
    let order = match query.sort.as_deref() {
        Some("oldest") => SortOrder::OldestFirst,
        _ => SortOrder::NewestFirst,
    };
    let cursor = query.cursor.as_deref().map(parse_cursor).transpose()?;
    let dismissed_only = query.dismissed_only.unwrap_or(false);
    let read_later_only = query.read_later_only.unwrap_or(false);

    let filter = ListFilter {
        order,
        limit: query.limit.unwrap_or(30).clamp(1, 200),
        cursor,
        dismissed_only,
        // `dismissed_only` is exclusive with the default exclusion: showing only dismissed
        // stories would be contradictory with also excluding them.
        exclude_dismissed: !dismissed_only,
        exclude_blocked_domains: !query.include_blocked.unwrap_or(false),
        exclude_read_later: !read_later_only && !query.include_read_later.unwrap_or(false),
        read_later_only,
    };

    let page = crate::store::run_blocking(&app.store, move |store| store.list_stories(&filter)).await?;

    Ok(Json(StoryListResponse {
        stories: page.stories.into_iter().map(StoryDto::from).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }))
}

pub async fn get_story(
    State(app): State<App>,
    Path(id): Path<i64>,
) -> Result<Json<StoryDto>, AppError> {
    let story = crate::store::run_blocking(&app.store, move |store| store.get_story(id)).await?;
    let story = story.ok_or(AppError::NotFound(id))?;
    Ok(Json(plain_dto(story)))
}

#[derive(Serialize)]
pub struct StoryContentResponse {
    pub content: Option<String>,
    pub content_status: &'static str,
}

pub async fn get_story_content(
    State(app): State<App>,
    Path(id): Path<i64>,
) -> Result<Json<StoryContentResponse>, AppError> {
    let story = crate::store::run_blocking(&app.store, move |store| store.get_story(id)).await?;
    let story = story.ok_or(AppError::NotFound(id))?;
    Ok(Json(StoryContentResponse {
        content: story.decompressed_content(),
        content_status: story.content_status.as_str(),
    }))
}

mod actions;
mod fetch;
mod rules;
mod stats;
mod stories;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::app::App;

/// Full `/api` route surface. Mounted under `/api` by the caller, with the Basic-auth
/// layer applied separately so one-shot health checks outside `/api` stay unauthenticated.
pub fn router() -> Router<App> {
    Router::new()
        .route("/stories", get(stories::list_stories))
        .route("/story/{id}", get(stories::get_story))
        .route("/story/{id}/content", get(stories::get_story_content))
        .route("/story/{id}/opened", post(actions::mark_opened))
        .route(
            "/dismiss/{id}",
            post(actions::dismiss).delete(actions::undismiss),
        )
        .route("/dismiss", delete(actions::undismiss_all))
        .route(
            "/readlater/{id}",
            post(actions::add_read_later).delete(actions::remove_read_later),
        )
        .route("/readlater", get(actions::list_read_later))
        .route(
            "/blocked/domains",
            get(rules::list_blocked_domains)
                .post(rules::add_blocked_domain)
                .delete(rules::remove_blocked_domain),
        )
        .route(
            "/blocked/words",
            get(rules::list_blocked_words)
                .post(rules::add_blocked_word)
                .delete(rules::remove_blocked_word),
        )
        .route(
            "/merit/domains",
            get(rules::list_merit_domains)
                .post(rules::add_merit_domain)
                .delete(rules::remove_merit_domain),
        )
        .route(
            "/merit/words",
            get(rules::list_merit_words)
                .post(rules::add_merit_word)
                .delete(rules::remove_merit_word),
        )
        .route(
            "/demerit/domains",
            get(rules::list_demerit_domains)
                .post(rules::add_demerit_domain)
                .delete(rules::remove_demerit_domain),
        )
        .route(
            "/demerit/words",
            get(rules::list_demerit_words)
                .post(rules::add_demerit_word)
                .delete(rules::remove_demerit_word),
        )
        .route("/stats", get(stats::get_stats))
        .route("/usage", get(stats::get_usage))
        .route("/status", get(stats::get_status))
        .route("/fetch", post(fetch::trigger_fetch))
        .route("/batch", post(actions::batch))
}

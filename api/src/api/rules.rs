use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::error::AppError;
use crate::json::Json;
use crate::store::RuleKind;

#[derive(Debug, Serialize)]
pub struct RuleEntry {
    pub value: String,
    pub weight: i64,
}

#[derive(Debug, Deserialize)]
pub struct AddRuleRequest {
    pub value: String,
    #[serde(default)]
    pub weight: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRuleQuery {
    pub value: String,
}

async fn list(app: &App, kind: RuleKind) -> Result<Vec<RuleEntry>, AppError> {
    let rows = crate::store::run_blocking(&app.store, move |store| store.list_rules(kind)).await?;
    Ok(rows
        .into_iter()
        .map(|(value, weight)| RuleEntry { value, weight })
        .collect())
}

async fn add(app: &App, kind: RuleKind, body: AddRuleRequest) -> Result<(), AppError> {
    if body.value.trim().is_empty() {
        return Err(AppError::BadRequest("value must not be empty".into()));
    }
    let weight = body.weight.unwrap_or(1);
    crate::store::run_blocking(&app.store, move |store| store.add_rule(kind, &body.value, weight))
        .await?;
    Ok(())
}

async fn remove(app: &App, kind: RuleKind, value: String) -> Result<(), AppError> {
    crate::store::run_blocking(&app.store, move |store| store.remove_rule(kind, &value)).await?;
    Ok(())
}

macro_rules! rule_handlers {
    ($kind:expr, $list_fn:ident, $add_fn:ident, $remove_fn:ident) => {
        pub async fn $list_fn(State(app): State<App>) -> Result<Json<Vec<RuleEntry>>, AppError> {
            Ok(Json(list(&app, $kind).await?))
        }

        pub async fn $add_fn(
            State(app): State<App>,
            Json(body): Json<AddRuleRequest>,
        ) -> Result<(), AppError> {
            add(&app, $kind, body).await
        }

        pub async fn $remove_fn(
            State(app): State<App>,
            Query(query): Query<RemoveRuleQuery>,
        ) -> Result<(), AppError> {
            remove(&app, $kind, query.value).await
        }
    };
}

rule_handlers!(
    RuleKind::BlockedDomain,
    list_blocked_domains,
    add_blocked_domain,
    remove_blocked_domain
);
rule_handlers!(
    RuleKind::BlockedWord,
    list_blocked_words,
    add_blocked_word,
    remove_blocked_word
);
rule_handlers!(
    RuleKind::MeritDomain,
    list_merit_domains,
    add_merit_domain,
    remove_merit_domain
);
rule_handlers!(
    RuleKind::MeritWord,
    list_merit_words,
    add_merit_word,
    remove_merit_word
);
rule_handlers!(
    RuleKind::DemeritDomain,
    list_demerit_domains,
    add_demerit_domain,
    remove_demerit_domain
);
rule_handlers!(
    RuleKind::DemeritWord,
    list_demerit_words,
    add_demerit_word,
    remove_demerit_word
);

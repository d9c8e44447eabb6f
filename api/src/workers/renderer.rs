use std::time::Duration;

use serde::Deserialize;

use crate::config::RendererCredentials;

/// The outcome of one renderer call, already translated out of raw HTTP/transport shapes into
/// the vocabulary the worker loop's finalization step understands.
pub enum RenderOutcome {
    Success { content: String, billed_ms: i64 },
    Blocked { content: String, billed_ms: i64 },
    Empty,
    ServerError,
    QuotaExceeded,
    RateLimited { retry_after_secs: i64 },
    Timeout,
    Failed(String),
}

#[derive(Deserialize)]
struct RenderEnvelope {
    success: bool,
    #[serde(default)]
    result: String,
    #[serde(default)]
    #[allow(dead_code)]
    errors: Vec<serde_json::Value>,
}

const MIN_CONTENT_LEN: usize = 50;
const QUOTA_PHRASE: &str = "time limit exceeded for today";
const DEFAULT_RETRY_AFTER_SECS: i64 = 60;

/// Calls Cloudflare's Browser Rendering markdown endpoint for `url` and classifies the result.
/// Blocking-page detection is applied by the caller (worker loop), since it needs the story's
/// attempt count to decide retry vs terminal.
pub async fn render(
    http: &reqwest::Client,
    creds: &RendererCredentials,
    url: &str,
    timeout: Duration,
) -> RenderOutcome {
    let endpoint = format!(
        "https://api.cloudflare.com/client/v4/accounts/{}/browser-rendering/markdown",
        creds.account_id
    );

    let capped_timeout_ms = timeout.as_millis().min(60_000) as u64;
    let body = serde_json::json!({
        "url": url,
        "gotoOptions": { "timeout": capped_timeout_ms },
    });

    let resp = match http
        .post(&endpoint)
        .bearer_auth(&creds.api_token)
        .json(&body)
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) if err.is_timeout() => return RenderOutcome::Timeout,
        Err(err) => return RenderOutcome::Failed(err.to_string()),
    };

    let status = resp.status();
    let billed_ms = resp
        .headers()
        .get("x-browser-ms-used")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<f64>().ok())
        .map(|ms| ms.max(0.0) as i64)
        .unwrap_or(0);

    if status.as_u16() == 429 {
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        let text = resp.text().await.unwrap_or_default();
        if text.to_lowercase().contains(QUOTA_PHRASE) {
            return RenderOutcome::QuotaExceeded;
        }
        return RenderOutcome::RateLimited { retry_after_secs };
    }

    if !status.is_success() {
        return RenderOutcome::Failed(format!("HTTP {}", status.as_u16()));
    }

    let envelope: RenderEnvelope = match resp.json().await {
        Ok(env) => env,
        Err(err) => return RenderOutcome::Failed(err.to_string()),
    };

    if !envelope.success {
        return RenderOutcome::ServerError;
    }

    if envelope.result.chars().count() < MIN_CONTENT_LEN {
        return RenderOutcome::Empty;
    }

    if is_blocked(&envelope.result) {
        RenderOutcome::Blocked {
            content: envelope.result,
            billed_ms,
        }
    } else {
        RenderOutcome::Success {
            content: envelope.result,
            billed_ms,
        }
    }
}

const BLOCK_PATTERNS: &[&str] = &[
    "captcha",
    "please verify",
    "access denied",
    "forbidden",
    "rate limit",
    "too many requests",
    "blocked",
    "unusual traffic",
    "security check",
    "ddos protection",
    "challenge-platform",
    "hcaptcha",
    "recaptcha",
    "just a moment",
    "checking your browser",
    "enable javascript",
    "redirecting",
];

/// Classifies whether `result` looks like an anti-bot block page. Long articles may
/// legitimately mention some of these words once, so the classification leans on total length:
/// short bodies with a hit are blocked outright; medium-length bodies need the hit *and* an upper
/// length bound; long bodies are never classified as blocked by pattern alone.
pub fn is_blocked(result: &str) -> bool {
    let total_len = result.chars().count();
    let head: String = result.chars().take(2000).collect();
    let head_lower = head.to_lowercase();
    let found = BLOCK_PATTERNS.iter().any(|p| head_lower.contains(p));

    if !found {
        return false;
    }

    total_len < 200 || (total_len >= 200 && total_len <= 3000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_blocked_body_is_blocked() {
        assert!(is_blocked("Just a moment... checking your browser"));
    }

    #[test]
    fn long_article_mentioning_pattern_once_is_not_blocked() {
        let mut article = "a".repeat(3500);
        article.push_str(" this site has a rate limit policy for comments");
        assert!(!is_blocked(&article));
    }

    #[test]
    fn clean_article_is_not_blocked() {
        let article = "This is a normal article about Rust programming. ".repeat(10);
        assert!(!is_blocked(&article));
    }
}

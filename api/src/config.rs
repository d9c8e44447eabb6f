use std::time::Duration;

#[derive(Clone)]
pub struct RendererCredentials {
    pub account_id: String,
    pub api_token: String,
}

#[derive(Clone)]
pub struct BasicAuthCredentials {
    pub user: String,
    pub password: String,
}

#[derive(Clone)]
pub struct Config {
    pub renderer: Option<RendererCredentials>,
    pub basic_auth: Option<BasicAuthCredentials>,

    pub browser_timeout: Duration,
    pub fetch_interval: Duration,
    pub content_workers: usize,

    pub dismissed_retention_hours: i64,
    pub story_retention_days: i64,
    pub url_cache_retention_days: i64,

    pub data_dir: String,
}

fn var(key: &str) -> Result<Option<String>, String> {
    match std::env::var(key) {
        Ok(env) => Ok(Some(env)),
        Err(e) => match e {
            std::env::VarError::NotPresent => Ok(None),
            std::env::VarError::NotUnicode(_) => Err(format!(
                "Could not get the environment variable `{key}` due to unicode error"
            )),
        },
    }
}

/// Either all or none of the given variables are set; otherwise exits with an error.
fn all_or_none_vars(keys: &[&str]) -> Option<Vec<String>> {
    keys.iter().fold(None, |accum, k| match var(k) {
        Ok(Some(val)) => match accum {
            Some(mut l) => {
                l.push(val);
                Some(l)
            }
            None => Some(vec![val]),
        },
        _ => match accum {
            Some(_) => {
                let mut rest = keys.to_vec();
                rest.retain(|_k| _k != k);
                tracing::error!(
                    "Environment variable `{k}` is required if variables {rest:?} are present"
                );
                std::process::exit(1);
            }
            None => None,
        },
    })
}

fn var_or(key: &str, default: &str) -> String {
    var(key).ok().flatten().unwrap_or_else(|| default.to_string())
}

impl Config {
    /// Loads configuration from the environment. `require_renderer` is false for one-shot
    /// maintenance modes (`--reset`, `--vacuum`, `--migrate-compress`) that never talk to the
    /// renderer.
    pub fn from_env(require_renderer: bool) -> Self {
        let renderer = match all_or_none_vars(&["CF_ACCOUNT_ID", "CF_API_TOKEN"]) {
            Some(mut vars) => Some(RendererCredentials {
                account_id: vars.remove(0),
                api_token: vars.remove(0),
            }),
            None if require_renderer => {
                tracing::error!(
                    "CF_ACCOUNT_ID and CF_API_TOKEN are required to run the extraction pipeline"
                );
                std::process::exit(1)
            }
            None => None,
        };

        let basic_auth = all_or_none_vars(&["HN_USER", "HN_PASSWORD"]).map(|mut vars| {
            BasicAuthCredentials {
                user: vars.remove(0),
                password: vars.remove(0),
            }
        });

        let browser_timeout_ms: u64 = var_or("CF_BROWSER_TIMEOUT_MS", "2000")
            .parse()
            .unwrap_or(2000)
            .min(60_000);

        let fetch_interval_minutes: u64 = var_or("HN_FETCH_INTERVAL", "60").parse().unwrap_or(60);

        let content_workers: usize = var_or("HN_CONTENT_WORKERS", "3").parse().unwrap_or(3);

        let dismissed_retention_hours: i64 = var_or("HN_DISMISSED_RETENTION_HOURS", "720")
            .parse()
            .unwrap_or(720);
        let story_retention_days: i64 = var_or("HN_STORY_RETENTION_DAYS", "30")
            .parse()
            .unwrap_or(30);
        let url_cache_retention_days: i64 = var_or("HN_URL_CACHE_RETENTION_DAYS", "14")
            .parse()
            .unwrap_or(14);

        let data_dir = var_or("HN_DATA_DIR", "./.hn_data");

        Config {
            renderer,
            basic_auth,
            browser_timeout: Duration::from_millis(browser_timeout_ms),
            fetch_interval: Duration::from_secs(fetch_interval_minutes * 60),
            content_workers,
            dismissed_retention_hours,
            story_retention_days,
            url_cache_retention_days,
            data_dir,
        }
    }
}

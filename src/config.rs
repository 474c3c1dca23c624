use std::env;
use std::path::PathBuf;

pub const DEFAULT_THREAD_LIST_LIMIT: usize = 20;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8787/v1";
const DEFAULT_REALTIME_URL: &str = "ws://127.0.0.1:8787/listen";
const DEFAULT_APP_STATE_PATH: &str = "appState.json";

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub realtime_url: String,
    pub app_state_path: PathBuf,
    pub thread_list_limit: usize,
}

impl Config {
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = lookup("THREADLINE_API_BASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let api_base_url = api_base_url.trim_end_matches('/').to_string();

        let realtime_url = lookup("THREADLINE_REALTIME_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string());
        let realtime_url = realtime_url.trim_end_matches('/').to_string();

        let app_state_path = lookup("THREADLINE_APP_STATE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_APP_STATE_PATH));

        let thread_list_limit = lookup("THREADLINE_THREAD_LIST_LIMIT")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_THREAD_LIST_LIMIT);

        Self {
            api_base_url,
            realtime_url,
            app_state_path,
            thread_list_limit,
        }
    }

    pub fn with_app_state_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.app_state_path = path;
        }
        self
    }
}

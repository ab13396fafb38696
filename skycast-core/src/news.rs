//! Headlines passed through by the proxy's `/news` route.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::{FetchError, provider::ProxyProvider};

pub const DEFAULT_CATEGORY: &str = "technology";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ArticleSource {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub source: ArticleSource,
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Clone)]
pub struct NewsClient {
    proxy: ProxyProvider,
}

impl NewsClient {
    pub fn new(proxy: ProxyProvider) -> Self {
        Self { proxy }
    }

    /// Top headlines for `category`, or technology when none is given.
    pub async fn top_headlines(&self, category: Option<&str>) -> Result<Vec<Article>, FetchError> {
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);

        let res: NewsResponse =
            self.proxy.get_json("news", &[("category", category.to_string())], "news").await?;
        Ok(res.articles)
    }
}

//! Search-as-you-type debouncing.
//!
//! Every keystroke records the latest text and waits out the debounce
//! delay. Only a call whose text is still the latest when the delay
//! expires goes on to search; superseded calls return `None`.

use std::time::Duration;
use tokio::sync::watch;

use crate::client::WeatherClient;
use crate::provider::ForecastProvider;
use crate::types::{Location, WeatherError};
use skycast_core::SearchConfig;

#[derive(Debug)]
pub struct SearchDebouncer {
    latest: watch::Sender<String>,
    delay: Duration,
}

impl SearchDebouncer {
    pub fn new(delay: Duration) -> Self {
        let (latest, _) = watch::channel(String::new());
        Self { latest, delay }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.debounce())
    }

    /// Observe the most recent input text.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.latest.subscribe()
    }

    /// Record `text` and wait out the delay.
    ///
    /// Returns the text if no newer input arrived in the meantime.
    pub async fn settle(&self, text: &str) -> Option<String> {
        self.latest.send_replace(text.to_string());
        tokio::time::sleep(self.delay).await;
        if *self.latest.borrow() == text {
            Some(text.to_string())
        } else {
            tracing::trace!("Discarding superseded search input {:?}", text);
            None
        }
    }

    /// Debounced city search. Blank input settles to an empty list.
    pub async fn search<P: ForecastProvider>(
        &self,
        client: &WeatherClient<P>,
        text: &str,
    ) -> Option<Result<Vec<Location>, WeatherError>> {
        let text = self.settle(text).await?;
        if text.trim().is_empty() {
            return Some(Ok(Vec::new()));
        }
        Some(client.search_cities(&text).await)
    }
}

impl Default for SearchDebouncer {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::WeatherCache;
    use crate::test_support::{location, FakeProvider};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_input_settles() {
        let debouncer = Arc::new(SearchDebouncer::default());

        let mut tasks = Vec::new();
        for text in ["T", "To", "Tok"] {
            let debouncer = Arc::clone(&debouncer);
            tasks.push(tokio::spawn(async move { debouncer.settle(text).await }));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let settled: Vec<_> = join_all(tasks).await;
        assert_eq!(settled, vec![None, None, Some("Tok".to_string())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_after_delay_is_not_superseded() {
        let debouncer = SearchDebouncer::new(Duration::from_millis(400));
        assert_eq!(debouncer.settle("Osaka").await.as_deref(), Some("Osaka"));
        assert_eq!(debouncer.settle("Oslo").await.as_deref(), Some("Oslo"));
        assert_eq!(*debouncer.subscribe().borrow(), "Oslo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_input_clears_results_without_network() {
        let client = WeatherClient::new(FakeProvider::default(), Arc::new(WeatherCache::new()));
        let debouncer = SearchDebouncer::default();

        let results = debouncer.search(&client, "   ").await;
        assert!(matches!(results, Some(Ok(ref list)) if list.is_empty()));
        assert_eq!(client.provider().search_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_keystrokes_make_one_request() {
        let provider = FakeProvider::default();
        provider.set_search_results(vec![location(1, "Sapporo")]);
        let client = Arc::new(WeatherClient::new(provider, Arc::new(WeatherCache::new())));
        let debouncer = Arc::new(SearchDebouncer::default());

        let mut tasks = Vec::new();
        for text in ["Sa", "Sap", "Sapporo"] {
            let client = Arc::clone(&client);
            let debouncer = Arc::clone(&debouncer);
            tasks.push(tokio::spawn(async move {
                debouncer.search(&client, text).await.map(|r| r.is_ok())
            }));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let outcomes = join_all(tasks).await;
        assert_eq!(outcomes, vec![None, None, Some(true)]);
        assert_eq!(client.provider().search_calls(), 1);
    }

    async fn join_all<T>(tasks: Vec<tokio::task::JoinHandle<T>>) -> Vec<T> {
        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            out.push(task.await.unwrap());
        }
        out
    }
}

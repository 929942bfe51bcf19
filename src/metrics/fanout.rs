//! One country-clicks request per link, summed per country

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::debug;

use super::flatten;
use crate::config::TimeUnit;
use crate::upstream::models::{CountriesResponse, CountryMetric};
use crate::upstream::{get_as, Upstream, UpstreamError, UpstreamResult};

/// Fetch clicks per country for every link over `units` trailing `unit` buckets.
///
/// All requests go out as one batch with no cap on how many are in flight.
/// The batch is awaited in full; if any request failed, the first failure in
/// link order is returned and nothing is aggregated.
pub async fn fetch_country_click_sums(
    upstream: &dyn Upstream,
    link_ids: &[String],
    unit: TimeUnit,
    units: u32,
) -> UpstreamResult<BTreeMap<String, u64>> {
    let query = [("unit", unit.to_string()), ("units", units.to_string())];
    let query = &query;

    debug!("Fetching country clicks for {} bitlinks", link_ids.len());

    let requests: Vec<_> = link_ids
        .iter()
        .map(|link_id| async move {
            let path = format!("/bitlinks/{link_id}/countries");
            get_as::<CountriesResponse>(upstream, &path, query).await
        })
        .collect();

    let responses = join_all(requests)
        .await
        .into_iter()
        .collect::<UpstreamResult<Vec<_>>>()?;

    sum_clicks_by_country(flatten(
        responses.into_iter().map(|response| response.metrics),
    ))
}

pub fn sum_clicks_by_country<I>(metrics: I) -> UpstreamResult<BTreeMap<String, u64>>
where
    I: IntoIterator<Item = CountryMetric>,
{
    let mut sums: BTreeMap<String, u64> = BTreeMap::new();
    for metric in metrics {
        let total = sums.entry(metric.value).or_insert(0);
        *total = total.checked_add(metric.clicks).ok_or_else(|| {
            UpstreamError::Malformed("click count overflowed while summing".to_string())
        })?;
    }
    Ok(sums)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::testing::FakeUpstream;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    fn metric(value: &str, clicks: u64) -> CountryMetric {
        CountryMetric {
            value: value.to_string(),
            clicks,
        }
    }

    #[test]
    fn sums_only_observed_countries() {
        let sums = sum_clicks_by_country(vec![
            metric("US", 3),
            metric("GB", 1),
            metric("US", 4),
            metric("JP", 0),
        ])
        .unwrap();

        assert_eq!(sums.len(), 3);
        assert_eq!(sums["US"], 7);
        assert_eq!(sums["GB"], 1);
        assert_eq!(sums["JP"], 0);
    }

    #[test]
    fn overflowing_sum_is_malformed() {
        let result = sum_clicks_by_country(vec![metric("US", u64::MAX), metric("US", 1)]);

        assert!(matches!(result, Err(UpstreamError::Malformed(_))));
    }

    #[tokio::test]
    async fn overflow_across_links_fails_the_batch() {
        let upstream = FakeUpstream::new()
            .ok(
                "/bitlinks/bit.ly/a/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": u64::MAX}]}),
            )
            .ok(
                "/bitlinks/bit.ly/b/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": 1}]}),
            );

        let err = fetch_country_click_sums(&upstream, &ids(&["bit.ly/a", "bit.ly/b"]), TimeUnit::Day, 30)
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Malformed(_)));
    }

    #[tokio::test]
    async fn sums_across_links() {
        let upstream = FakeUpstream::new()
            .ok(
                "/bitlinks/bit.ly/a/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": 2}, {"value": "CA", "clicks": 1}]}),
            )
            .ok(
                "/bitlinks/bit.ly/b/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": 5}]}),
            );

        let sums = fetch_country_click_sums(&upstream, &ids(&["bit.ly/a", "bit.ly/b"]), TimeUnit::Day, 30)
            .await
            .unwrap();

        assert_eq!(sums, BTreeMap::from([("CA".to_string(), 1), ("US".to_string(), 7)]));
    }

    #[tokio::test]
    async fn no_links_issue_no_requests() {
        let upstream = FakeUpstream::new();

        let sums = fetch_country_click_sums(&upstream, &[], TimeUnit::Day, 30)
            .await
            .unwrap();

        assert!(sums.is_empty());
        assert!(upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn one_failed_link_fails_the_batch() {
        let upstream = FakeUpstream::new()
            .ok(
                "/bitlinks/bit.ly/a/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": 2}]}),
            )
            .fail("/bitlinks/bit.ly/b/countries?unit=day&units=30", 429)
            .ok(
                "/bitlinks/bit.ly/c/countries?unit=day&units=30",
                json!({"metrics": [{"value": "US", "clicks": 2}]}),
            );

        let err = fetch_country_click_sums(
            &upstream,
            &ids(&["bit.ly/a", "bit.ly/b", "bit.ly/c"]),
            TimeUnit::Day,
            30,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UpstreamError::Status { status: 429, .. }));
        assert_eq!(upstream.calls().len(), 3);
    }

    #[tokio::test]
    async fn malformed_metric_fails_the_batch() {
        let upstream = FakeUpstream::new().ok(
            "/bitlinks/bit.ly/a/countries?unit=day&units=30",
            json!({"metrics": [{"value": "US"}]}),
        );

        let err = fetch_country_click_sums(&upstream, &ids(&["bit.ly/a"]), TimeUnit::Day, 30)
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    /// Holds every request until `n` of them are in flight at once
    struct GatedUpstream {
        inner: FakeUpstream,
        gate: Arc<Barrier>,
    }

    #[async_trait]
    impl Upstream for GatedUpstream {
        async fn get(&self, path: &str, query: &[(&str, String)]) -> UpstreamResult<Value> {
            self.gate.wait().await;
            self.inner.get(path, query).await
        }
    }

    #[tokio::test]
    async fn all_requests_are_in_flight_together() {
        let links = ids(&["bit.ly/a", "bit.ly/b", "bit.ly/c", "bit.ly/d"]);
        let mut inner = FakeUpstream::new();
        for link in &links {
            inner = inner.ok(
                &format!("/bitlinks/{link}/countries?unit=hour&units=24"),
                json!({"metrics": [{"value": "NL", "clicks": 1}]}),
            );
        }
        let upstream = GatedUpstream {
            inner,
            gate: Arc::new(Barrier::new(links.len())),
        };

        // Sequential requests would never get past the barrier
        let sums = tokio::time::timeout(
            Duration::from_secs(5),
            fetch_country_click_sums(&upstream, &links, TimeUnit::Hour, 24),
        )
        .await
        .expect("requests were not issued concurrently")
        .unwrap();

        assert_eq!(sums["NL"], 4);
    }
}

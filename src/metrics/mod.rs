//! Per-country click averages across every link of the caller's default group
//!
//! The pipeline runs three stages one after another, each blocking until the
//! previous one has finished:
//!
//! 1. `GET /user` for the default group id
//! 2. [`pagination::fetch_link_ids`] walks every page of the group's links
//! 3. [`fanout::fetch_country_click_sums`] fetches country clicks per link
//!
//! Stages 2 and 3 issue their requests as concurrent batches. The first
//! failure of any stage ends the pipeline; there is no partial result.

pub mod fanout;
pub mod pagination;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{MetricsWindow, TimeUnit};
use crate::upstream::models::UserResponse;
use crate::upstream::{get_as, Upstream, UpstreamError, UpstreamResult};

pub use fanout::fetch_country_click_sums;
pub use pagination::fetch_link_ids;

/// Marker emitted alongside the averages under the `type` key
pub const METRIC_TYPE: &str = "clicks";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("There was a problem retrieving the group id")]
    GroupIdUnavailable(#[source] UpstreamError),
    #[error("There was a problem getting the bitlink ids for your group")]
    LinkIdsUnavailable(#[source] UpstreamError),
    #[error("There was a problem with retrieving metrics per country")]
    MetricsUnavailable(#[source] UpstreamError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub unit: TimeUnit,
    pub units: u32,
    pub metrics: CountryAverages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryAverages {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub averages: BTreeMap<String, f64>,
}

impl CountryAverages {
    /// Average each country's summed clicks over `units` buckets.
    ///
    /// A country coded `type` is shadowed by the marker key.
    pub fn from_sums(sums: &BTreeMap<String, u64>, units: u32) -> Self {
        let averages = average_clicks(sums, units)
            .into_iter()
            .filter(|(country, _)| country != "type")
            .collect();

        Self {
            kind: METRIC_TYPE,
            averages,
        }
    }
}

/// Concatenate nested sequences, keeping element order
pub fn flatten<T, I, J>(nested: I) -> Vec<T>
where
    I: IntoIterator<Item = J>,
    J: IntoIterator<Item = T>,
{
    nested.into_iter().flatten().collect()
}

pub fn average_clicks(sums: &BTreeMap<String, u64>, units: u32) -> BTreeMap<String, f64> {
    let divisor = f64::from(units);
    sums.iter()
        .map(|(country, clicks)| (country.clone(), *clicks as f64 / divisor))
        .collect()
}

pub async fn fetch_default_group_id(upstream: &dyn Upstream) -> UpstreamResult<String> {
    let user: UserResponse = get_as(upstream, "/user", &[]).await?;
    Ok(user.default_group_guid)
}

/// Run the full pipeline for one caller
pub async fn compute_averaged_metrics(
    upstream: &dyn Upstream,
    window: MetricsWindow,
) -> Result<AggregatedResult, MetricsError> {
    let group_id = fetch_default_group_id(upstream).await.map_err(|e| {
        error!("Problem getting default group id: {}", e);
        MetricsError::GroupIdUnavailable(e)
    })?;

    let link_ids = fetch_link_ids(upstream, &group_id).await.map_err(|e| {
        error!("Problem getting bitlink ids for group {}: {}", group_id, e);
        MetricsError::LinkIdsUnavailable(e)
    })?;

    info!(
        "Fetching {} metrics for {} bitlinks over {} {}(s)",
        METRIC_TYPE,
        link_ids.len(),
        window.units,
        window.unit
    );

    let sums = fetch_country_click_sums(upstream, &link_ids, window.unit, window.units)
        .await
        .map_err(|e| {
            error!("Problem getting bitlink metrics: {}", e);
            MetricsError::MetricsUnavailable(e)
        })?;

    Ok(AggregatedResult {
        unit: window.unit,
        units: window.units,
        metrics: CountryAverages::from_sums(&sums, window.units),
    })
}

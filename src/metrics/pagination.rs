//! Walks every page of a group's links
//!
//! Page 1 is fetched on its own to learn the page count. The remaining pages
//! are issued together as one batch and the whole batch is awaited before
//! any result is inspected.

use futures::future::join_all;
use tracing::debug;

use super::flatten;
use crate::upstream::models::{BitlinksPage, LinksPage};
use crate::upstream::{get_as, Upstream, UpstreamResult};

pub async fn fetch_link_ids(upstream: &dyn Upstream, group_id: &str) -> UpstreamResult<Vec<String>> {
    let path = format!("/groups/{group_id}/bitlinks");

    let first: BitlinksPage = get_as(upstream, &path, &[]).await?;
    let pages_needed = first.pagination.pages_needed()?;

    let mut pages = vec![first.links];

    if pages_needed > 1 {
        debug!(
            "Fetching pages 2..={} of bitlinks for group {}",
            pages_needed, group_id
        );

        let path = path.as_str();
        let requests: Vec<_> = (2..=pages_needed)
            .map(|page| async move {
                let query = [("page", page.to_string())];
                get_as::<LinksPage>(upstream, path, &query).await
            })
            .collect();

        // Every request has completed here; the first failure in page order wins
        for result in join_all(requests).await {
            pages.push(result?.links);
        }
    }

    Ok(flatten(pages)
        .into_iter()
        .map(|link| link.id)
        .collect())
}

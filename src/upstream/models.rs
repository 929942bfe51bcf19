//! Response shapes of the provider endpoints the pipeline consumes

use serde::Deserialize;

use super::{UpstreamError, UpstreamResult};

/// `GET /user`
#[derive(Debug, Clone, Deserialize)]
pub struct UserResponse {
    pub default_group_guid: String,
}

/// `GET /groups/{group}/bitlinks[?page=N]`
#[derive(Debug, Clone, Deserialize)]
pub struct BitlinksPage {
    /// A page without a `links` array contributes no ids
    #[serde(default)]
    pub links: Vec<Bitlink>,
    pub pagination: Pagination,
}

/// Pages 2..N of the same listing; only their links are read
#[derive(Debug, Clone, Deserialize)]
pub struct LinksPage {
    #[serde(default)]
    pub links: Vec<Bitlink>,
}

/// A link entry; any entry lacking `id` fails deserialization of its page
#[derive(Debug, Clone, Deserialize)]
pub struct Bitlink {
    pub id: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    pub total: u64,
    pub size: u64,
}

impl Pagination {
    /// Number of pages covering `total` items, page 1 included
    pub fn pages_needed(&self) -> UpstreamResult<u64> {
        if self.size == 0 {
            return Err(UpstreamError::Malformed(
                "pagination size must be greater than zero".to_string(),
            ));
        }
        Ok(self.total.div_ceil(self.size))
    }
}

/// `GET /bitlinks/{link}/countries?unit=&units=`
#[derive(Debug, Clone, Deserialize)]
pub struct CountriesResponse {
    pub metrics: Vec<CountryMetric>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CountryMetric {
    /// ISO country code
    pub value: String,
    pub clicks: u64,
}

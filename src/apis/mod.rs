pub mod lineup;
pub mod profile_page;
pub mod search;

pub use lineup::{LineupGateway, LineupPayload, LineupSource};
pub use profile_page::{ProfilePageClient, ProfilePageSource};
pub use search::{GoogleSearchClient, SearchApi, SearchItem, SearchResponse};

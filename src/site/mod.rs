//! Collaborators the pipeline consumes: listing pages, site discovery and image bytes.
//!
//! [`MoebooruSite`] implements all three over HTTP; tests substitute in-memory versions.

pub mod moebooru;

pub use moebooru::{MoebooruSite, parse_listing, parse_total_pages};

use crate::{FetchError, Post, PostId};

/// Fetch and parse one listing page into its posts, in page order.
pub trait PageFetcher: Send + Sync {
    fn fetch_page(&self, page: u32) -> Result<Vec<Post>, FetchError>;
}

/// Site-wide facts needed before a run starts.
pub trait Discovery: Send + Sync {
    /// Id of the newest post on the site, or `None` if the board is empty.
    fn newest_post_id(&self) -> Result<Option<PostId>, FetchError>;
    /// Number of listing pages.
    fn total_pages(&self) -> Result<u32, FetchError>;
}

/// Image bytes plus the length the server declared for them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageBody {
    pub bytes: Vec<u8>,
    /// `Content-Length`, when the server sent one.
    pub declared_len: Option<u64>,
}

impl ImageBody {
    /// Body whose declared length matches its contents.
    pub fn complete(bytes: Vec<u8>) -> Self {
        let declared_len = Some(bytes.len() as u64);
        Self {
            bytes,
            declared_len,
        }
    }
}

/// Fetch one image.
pub trait ImageSource: Send + Sync {
    fn fetch_image(&self, url: &str) -> Result<ImageBody, FetchError>;
}

/// Everything a crawl needs from a site.
pub trait Site: PageFetcher + Discovery + ImageSource {}

impl<T: PageFetcher + Discovery + ImageSource + ?Sized> Site for T {}

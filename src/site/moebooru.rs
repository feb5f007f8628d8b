//! HTTP collaborator for Moebooru boards (konachan.com, yande.re).

use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_LENGTH;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::utils::config::HttpConsts;
use crate::{FetchError, Post, PostId, Rating, SiteVariant};

use super::{Discovery, ImageBody, ImageSource, PageFetcher};

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Parse(format!("bad selector '{css}': {e:?}")))
}

/// Rating from a thumbnail's alt text, e.g. `"Rating: Safe Score: 12 Tags: ..."`.
fn rating_from_alt(alt: &str) -> Option<Rating> {
    if alt.contains("Rating: Safe") {
        Some(Rating::Safe)
    } else if alt.contains("Rating: Questionable") {
        Some(Rating::Questionable)
    } else if alt.contains("Rating: Explicit") {
        Some(Rating::Explicit)
    } else {
        None
    }
}

fn post_from_item(item: ElementRef<'_>, img: &Selector, link: &Selector, base: &Url) -> Option<Post> {
    let id = item.value().attr("id")?;
    let rating = item
        .select(img)
        .next()
        .and_then(|e| e.value().attr("alt"))
        .and_then(rating_from_alt)?;
    let href = item.select(link).next()?.value().attr("href")?;
    // Direct links are often scheme-relative (`//files.yande.re/...`).
    let image_url = base.join(href).ok()?;
    Some(Post {
        id: PostId::new(id),
        image_url: image_url.to_string(),
        rating,
    })
}

/// Parse the posts of a listing page, in page order. Items missing an id, rating or direct
/// link are skipped. A page with no post list (past the last page) has no posts.
pub fn parse_listing(html: &str, base: &Url) -> Result<Vec<Post>, FetchError> {
    let document = Html::parse_document(html);
    let items = selector("ul#post-list-posts > li")?;
    let img = selector("img[alt]")?;
    let link = selector("a.directlink[href]")?;
    Ok(document
        .select(&items)
        .filter_map(|item| post_from_item(item, &img, &link, base))
        .collect())
}

/// Highest page number linked from the paginator, or 1 when there is none.
pub fn parse_total_pages(html: &str) -> Result<u32, FetchError> {
    let document = Html::parse_document(html);
    let links = selector("#paginator a")?;
    Ok(document
        .select(&links)
        .filter_map(|a| a.text().collect::<String>().trim().parse::<u32>().ok())
        .max()
        .unwrap_or(1))
}

fn check_status(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Blocking HTTP client bound to one board.
#[derive(Debug, Clone)]
pub struct MoebooruSite {
    client: Client,
    root: Url,
}

impl MoebooruSite {
    pub fn new(variant: SiteVariant) -> Result<Self, FetchError> {
        Self::with_root(variant.root_url())
    }

    /// Client for a board at `root` (e.g. a mirror).
    pub fn with_root(root: &str) -> Result<Self, FetchError> {
        let root = Url::parse(root)
            .map_err(|e| FetchError::Parse(format!("invalid site root '{root}': {e}")))?;
        let client = Client::builder()
            .user_agent(HttpConsts::USER_AGENT)
            .timeout(HttpConsts::TIMEOUT)
            .connect_timeout(HttpConsts::CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client, root })
    }

    /// `<root>/post?page=<n>&tags=`
    pub fn listing_url(&self, page: u32) -> Result<Url, FetchError> {
        let mut url = self
            .root
            .join("post")
            .map_err(|e| FetchError::Parse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("tags", "");
        Ok(url)
    }

    fn listing_html(&self, page: u32) -> Result<String, FetchError> {
        let url = self.listing_url(page)?;
        debug!("GET {}", url);
        let response = check_status(self.client.get(url).send()?)?;
        Ok(response.text()?)
    }
}

impl PageFetcher for MoebooruSite {
    fn fetch_page(&self, page: u32) -> Result<Vec<Post>, FetchError> {
        parse_listing(&self.listing_html(page)?, &self.root)
    }
}

impl Discovery for MoebooruSite {
    fn newest_post_id(&self) -> Result<Option<PostId>, FetchError> {
        Ok(self.fetch_page(1)?.into_iter().next().map(|post| post.id))
    }

    fn total_pages(&self) -> Result<u32, FetchError> {
        parse_total_pages(&self.listing_html(1)?)
    }
}

impl ImageSource for MoebooruSite {
    fn fetch_image(&self, url: &str) -> Result<ImageBody, FetchError> {
        let response = check_status(self.client.get(url).send()?)?;
        let declared_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let bytes = response.bytes()?.to_vec();
        Ok(ImageBody {
            bytes,
            declared_len,
        })
    }
}

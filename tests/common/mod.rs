//! In-memory site and storage helpers shared by the integration tests.
#![allow(dead_code)]

use konadl::{
    CancelToken, Discovery, FetchError, ImageBody, ImageSource, PageFetcher, Post, PostId, Rating,
    RetryPolicy, RunConfig,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Scripted answer to one image request.
#[derive(Clone, Copy, Debug)]
pub enum ImageReply {
    Complete,
    /// Declares more bytes than it delivers.
    Truncated,
    RateLimited,
}

pub struct MockSite {
    pages: Vec<Vec<Post>>,
    image_replies: Mutex<HashMap<String, VecDeque<ImageReply>>>,
    page_failures: Mutex<HashMap<u32, u32>>,
    broken_pages: HashSet<u32>,
    cancel_after_images: Option<(usize, CancelToken)>,
    image_calls: AtomicUsize,
    page_calls: AtomicUsize,
}

impl MockSite {
    pub fn new(pages: Vec<Vec<Post>>) -> Self {
        Self {
            pages,
            image_replies: Mutex::new(HashMap::new()),
            page_failures: Mutex::new(HashMap::new()),
            broken_pages: HashSet::new(),
            cancel_after_images: None,
            image_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    /// Queue `reply` for the next request of `url`. Unscripted requests succeed.
    pub fn with_image_reply(self, url: &str, reply: ImageReply) -> Self {
        self.image_replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Make the first `n` fetches of `page` fail with HTTP 503.
    pub fn with_page_failures(self, page: u32, n: u32) -> Self {
        self.page_failures.lock().unwrap().insert(page, n);
        self
    }

    /// Make every fetch of `page` fail.
    pub fn with_broken_page(mut self, page: u32) -> Self {
        self.broken_pages.insert(page);
        self
    }

    /// Fire `token` once `n` image requests have been made.
    pub fn cancel_after_images(mut self, n: usize, token: CancelToken) -> Self {
        self.cancel_after_images = Some((n, token));
        self
    }

    pub fn image_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
    }

    pub fn page_calls(&self) -> usize {
        self.page_calls.load(Ordering::SeqCst)
    }
}

impl PageFetcher for MockSite {
    fn fetch_page(&self, page: u32) -> Result<Vec<Post>, FetchError> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_pages.contains(&page) {
            return Err(FetchError::Status { status: 500 });
        }
        if let Some(left) = self.page_failures.lock().unwrap().get_mut(&page)
            && *left > 0
        {
            *left -= 1;
            return Err(FetchError::Status { status: 503 });
        }
        Ok(self
            .pages
            .get(page as usize - 1)
            .cloned()
            .unwrap_or_default())
    }
}

impl Discovery for MockSite {
    fn newest_post_id(&self) -> Result<Option<PostId>, FetchError> {
        Ok(self
            .pages
            .first()
            .and_then(|posts| posts.first())
            .map(|post| post.id.clone()))
    }

    fn total_pages(&self) -> Result<u32, FetchError> {
        Ok(self.pages.len() as u32)
    }
}

impl ImageSource for MockSite {
    fn fetch_image(&self, url: &str) -> Result<ImageBody, FetchError> {
        let calls = self.image_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((n, token)) = &self.cancel_after_images
            && calls >= *n
        {
            token.cancel();
        }
        let reply = self
            .image_replies
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|replies| replies.pop_front())
            .unwrap_or(ImageReply::Complete);
        let bytes = url.as_bytes().to_vec();
        match reply {
            ImageReply::Complete => Ok(ImageBody::complete(bytes)),
            ImageReply::Truncated => {
                let declared_len = Some(bytes.len() as u64 + 10);
                Ok(ImageBody {
                    bytes,
                    declared_len,
                })
            }
            ImageReply::RateLimited => Err(FetchError::RateLimited),
        }
    }
}

pub fn image_url(id: &str) -> String {
    format!("https://files.example.net/image/{id}.jpg")
}

pub fn post(id: &str, rating: Rating) -> Post {
    Post {
        id: PostId::new(id),
        image_url: image_url(id),
        rating,
    }
}

/// `pages` pages of `per_page` posts, newest first. `rating_of` gets the post's global index.
pub fn make_pages(pages: u32, per_page: u32, rating_of: impl Fn(u32) -> Rating) -> Vec<Vec<Post>> {
    (0..pages)
        .map(|p| {
            (0..per_page)
                .map(|j| {
                    let i = p * per_page + j;
                    post(&format!("p{}", 1000 - i), rating_of(i))
                })
                .collect()
        })
        .collect()
}

/// Even global indices Safe, odd Explicit.
pub fn alternating_pages(pages: u32, per_page: u32) -> Vec<Vec<Post>> {
    make_pages(pages, per_page, |i| {
        if i % 2 == 0 {
            Rating::Safe
        } else {
            Rating::Explicit
        }
    })
}

/// Config for tests: no retry delays, small pools.
pub fn test_config(storage: &Path) -> RunConfig {
    let mut config = RunConfig::new(storage);
    config.retry = RetryPolicy::immediate();
    config.page_workers = 2;
    config.download_workers = 3;
    config
}

/// Sorted names of the `.jpg` files directly in `dir`.
pub fn image_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".jpg"))
        .collect();
    names.sort();
    names
}

pub fn part_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".part")
        })
        .count()
}

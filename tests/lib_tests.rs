use konadl::checkpoint::{encode_download_record, parse_download_record, parse_page_record};
use konadl::engine::{file_name_from_url, output_path};
use konadl::pipeline::enqueue_accepted;
use konadl::site::{parse_listing, parse_total_pages};
use konadl::{
    CancelToken, DownloadJob, FetchError, Message, PageJob, Post, PostId, Rating, RatingSet,
    RetryPolicy, RunConfig, WorkQueue,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

fn job(url: &str, page: u32, rating: Rating) -> DownloadJob {
    DownloadJob {
        url: url.to_string(),
        page,
        rating,
    }
}

// --- rating filter ---

#[test]
fn test_rating_filter_truth_table() {
    for bits in 0u8..8 {
        let set = RatingSet::new(bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
        assert_eq!(set.accepts(Rating::Safe), set.safe, "{set:?}");
        assert_eq!(set.accepts(Rating::Questionable), set.questionable, "{set:?}");
        assert_eq!(set.accepts(Rating::Explicit), set.explicit, "{set:?}");
        assert_eq!(set.is_empty(), bits == 0);
        assert_eq!(set.enabled().count(), bits.count_ones() as usize);
    }
}

#[test]
fn test_rating_default_is_safe_only() {
    let config = RunConfig::new("/tmp");
    assert_eq!(config.ratings, RatingSet::safe_only());
}

#[test]
fn test_rating_names_round_trip() {
    for rating in Rating::ALL {
        assert_eq!(rating.as_str().parse::<Rating>().unwrap(), rating);
    }
    assert!("Safe".parse::<Rating>().is_err());
}

#[test]
fn test_enqueue_accepted_keeps_page_order_and_page_number() {
    let posts = vec![
        Post {
            id: PostId::new("p3"),
            image_url: "https://x/3.jpg".into(),
            rating: Rating::Questionable,
        },
        Post {
            id: PostId::new("p2"),
            image_url: "https://x/2.jpg".into(),
            rating: Rating::Safe,
        },
        Post {
            id: PostId::new("p1"),
            image_url: "https://x/1.jpg".into(),
            rating: Rating::Explicit,
        },
    ];
    let queue = WorkQueue::unbounded();
    let queued = enqueue_accepted(&RatingSet::new(true, true, false), &posts, 7, &queue);
    assert_eq!(queued, 2);
    assert_eq!(
        queue.drain(),
        vec![
            job("https://x/3.jpg", 7, Rating::Questionable),
            job("https://x/2.jpg", 7, Rating::Safe),
        ]
    );
}

// --- work queue ---

#[test]
fn test_queue_fifo_and_attempts() {
    let queue = WorkQueue::unbounded();
    queue.push(PageJob { page: 1 });
    queue.push(PageJob { page: 2 });

    let Message::Job(first) = queue.pop() else {
        panic!("expected a job");
    };
    assert_eq!(first.job.page, 1);
    assert_eq!(first.attempt, 0);
    queue.requeue(first);
    queue.ack();

    let Message::Job(second) = queue.pop() else {
        panic!("expected a job");
    };
    assert_eq!(second.job.page, 2);
    queue.put_back(second);
    queue.ack();

    let Message::Job(retried) = queue.pop() else {
        panic!("expected a job");
    };
    assert_eq!(retried.job.page, 1);
    assert_eq!(retried.attempt, 1);
    queue.ack();

    let Message::Job(returned) = queue.pop() else {
        panic!("expected a job");
    };
    assert_eq!(returned.job.page, 2);
    assert_eq!(returned.attempt, 0);
    queue.ack();

    assert_eq!(queue.pending(), 0);
    assert_eq!(queue.pushed(), queue.acked());
}

#[test]
fn test_queue_acks_match_pushes_across_workers() {
    let queue = Arc::new(WorkQueue::unbounded());
    for page in 1..=200 {
        queue.push(PageJob { page });
    }
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut handled = 0;
                while let Message::Job(_) = queue.pop() {
                    handled += 1;
                    queue.ack();
                }
                handled
            })
        })
        .collect();

    queue.join_until_drained();
    queue.shutdown(4);
    let handled: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();

    assert_eq!(handled, 200);
    assert_eq!(queue.pushed(), 200);
    assert_eq!(queue.acked(), 200);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_drain_skips_sentinels() {
    let queue = WorkQueue::unbounded();
    queue.push(PageJob { page: 3 });
    queue.shutdown(2);
    queue.push(PageJob { page: 1 });
    assert_eq!(queue.len(), 4);

    assert_eq!(queue.drain(), vec![PageJob { page: 3 }, PageJob { page: 1 }]);
    assert_eq!(queue.pending(), 0);
    assert!(queue.is_empty());
}

#[test]
fn test_queue_wait_drained_gives_up_on_cancel() {
    let queue = WorkQueue::unbounded();
    queue.push(PageJob { page: 1 });
    let cancel = CancelToken::new();
    cancel.cancel();
    assert!(!queue.wait_drained(&cancel));

    let empty: WorkQueue<PageJob> = WorkQueue::unbounded();
    assert!(empty.wait_drained(&CancelToken::new()));
}

#[test]
fn test_queue_bounded_capacity() {
    let queue = Arc::new(WorkQueue::bounded(1));
    queue.push(PageJob { page: 1 });
    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(PageJob { page: 2 }))
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(queue.len(), 1);

    assert!(matches!(queue.pop(), Message::Job(q) if q.job.page == 1));
    queue.ack();
    producer.join().unwrap();
    assert!(matches!(queue.pop(), Message::Job(q) if q.job.page == 2));
    queue.ack();
    assert_eq!(queue.pending(), 0);
}

// --- cancel token ---

#[test]
fn test_cancel_token_sleep_wakes_early() {
    let cancel = CancelToken::new();
    assert!(cancel.sleep(Duration::from_millis(1)));
    let remote = cancel.clone();
    remote.cancel();
    assert!(cancel.is_cancelled());
    assert!(!cancel.sleep(Duration::from_secs(60)));
}

// --- retry policy ---

#[test]
fn test_retry_policy_unlimited_by_default() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_attempts, None);
    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(u32::MAX));
}

#[test]
fn test_retry_policy_bounded() {
    let policy = RetryPolicy::immediate().with_max_attempts(3);
    assert!(policy.allows_retry(1));
    assert!(policy.allows_retry(2));
    assert!(!policy.allows_retry(3));
}

#[test]
fn test_retry_delay_doubles_and_caps() {
    let policy = RetryPolicy {
        max_attempts: None,
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(30),
        rate_limit_delay: Duration::from_secs(5),
    };
    assert_eq!(policy.delay_for(1, false), Duration::from_millis(500));
    assert_eq!(policy.delay_for(2, false), Duration::from_secs(1));
    assert_eq!(policy.delay_for(3, false), Duration::from_secs(2));
    assert_eq!(policy.delay_for(50, false), Duration::from_secs(30));
    // 429 waits at least the rate-limit delay
    assert_eq!(policy.delay_for(1, true), Duration::from_secs(5));
    assert_eq!(policy.delay_for(50, true), Duration::from_secs(30));
}

#[test]
fn test_immediate_policy_has_no_delay() {
    let policy = RetryPolicy::immediate();
    assert_eq!(policy.delay_for(10, true), Duration::ZERO);
}

// --- checkpoint records ---

#[test]
fn test_download_record_format() {
    let j = job("https://x/a.jpg", 12, Rating::Explicit);
    assert_eq!(encode_download_record(&j), "https://x/a.jpg|12|explicit\n");
    assert_eq!(
        parse_download_record("https://x/a.jpg|12|explicit").unwrap(),
        j
    );
}

#[test]
fn test_download_record_rejects_malformed() {
    assert!(parse_download_record("https://x/a.jpg|12").is_err());
    assert!(parse_download_record("https://x/a.jpg|12|safe|extra").is_err());
    assert!(parse_download_record("https://x/a.jpg|twelve|safe").is_err());
    assert!(parse_download_record("https://x/a.jpg|0|safe").is_err());
    assert!(parse_download_record("https://x/a.jpg|12|lewd").is_err());
    assert!(parse_download_record("|12|safe").is_err());
}

#[test]
fn test_download_record_with_pipe_in_url() {
    let j = job("https://x/a|b.jpg", 3, Rating::Safe);
    assert_eq!(encode_download_record(&j), "https://x/a|b.jpg|3|safe
");
    assert_eq!(parse_download_record("https://x/a|b.jpg|3|safe").unwrap(), j);
}

#[test]
fn test_page_record() {
    assert_eq!(parse_page_record("42").unwrap(), PageJob { page: 42 });
    assert!(parse_page_record("forty-two").is_err());
    assert!(parse_page_record("-1").is_err());
}

// --- output paths ---

#[test]
fn test_file_name_from_url() {
    assert_eq!(
        file_name_from_url(
            "https://konachan.com/image/abc123/Konachan.com%20-%20101%20sky%20clouds.jpg"
        )
        .as_deref(),
        Some("Konachan.com_101_sky_clouds.jpg")
    );
    assert_eq!(
        file_name_from_url("https://x/plain.png").as_deref(),
        Some("plain.png")
    );
}

#[test]
fn test_file_name_from_url_without_name() {
    assert_eq!(file_name_from_url("https://files.example.net/image/"), None);
    assert_eq!(file_name_from_url("https://x/."), None);
    assert_eq!(file_name_from_url("https://x/.."), None);
    let config = RunConfig::new("/data");
    assert_eq!(
        output_path(&config, &job("https://x/image/", 1, Rating::Safe)),
        None
    );
}

#[test]
fn test_output_path_separated_by_rating() {
    let mut config = RunConfig::new("/data");
    let j = job("https://x/a.jpg", 1, Rating::Questionable);
    assert_eq!(output_path(&config, &j), Some(PathBuf::from("/data/a.jpg")));
    config.separate_by_rating = true;
    assert_eq!(
        output_path(&config, &j),
        Some(PathBuf::from("/data/questionable/a.jpg"))
    );
}

// --- listing parser ---

const LISTING: &str = r#"
<html><body>
<ul id="post-list-posts">
  <li id="p101" class="creator-id-1">
    <a class="thumb" href="/post/show/101"><img src="/data/preview/1.jpg" alt="Rating: Safe Score: 12 Tags: sky User: someone"></a>
    <a class="directlink largeimg" href="//files.example.net/image/aa/Konachan.com%20-%20101%20sky.jpg"><span>1920 x 1080</span></a>
  </li>
  <li id="p100">
    <a class="thumb" href="/post/show/100"><img src="/data/preview/2.jpg" alt="Rating: Explicit Score: 3 Tags: x User: someone"></a>
    <a class="directlink largeimg" href="https://files.example.net/image/bb/b.png"><span>800 x 600</span></a>
  </li>
  <li id="p99">
    <a class="thumb" href="/post/show/99"><img src="/data/preview/3.jpg" alt="Rating: Questionable Score: 1 Tags: y User: someone"></a>
  </li>
</ul>
<div id="paginator">
  <a href="/post?page=2">2</a> <a href="/post?page=3">3</a> <a href="/post?page=9377">9377</a>
  <a class="next_page" href="/post?page=2">Next</a>
</div>
</body></html>
"#;

#[test]
fn test_parse_listing() {
    let base = Url::parse("https://konachan.com").unwrap();
    let posts = parse_listing(LISTING, &base).unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].id, PostId::new("p101"));
    assert_eq!(posts[0].rating, Rating::Safe);
    assert_eq!(
        posts[0].image_url,
        "https://files.example.net/image/aa/Konachan.com%20-%20101%20sky.jpg"
    );
    assert_eq!(posts[1].id, PostId::new("p100"));
    assert_eq!(posts[1].rating, Rating::Explicit);
    assert_eq!(posts[1].image_url, "https://files.example.net/image/bb/b.png");
}

#[test]
fn test_parse_listing_without_post_list() {
    let base = Url::parse("https://yande.re").unwrap();
    let posts = parse_listing("<html><body><p>Nobody here</p></body></html>", &base).unwrap();
    assert!(posts.is_empty());
}

#[test]
fn test_parse_total_pages() {
    assert_eq!(parse_total_pages(LISTING).unwrap(), 9377);
    assert_eq!(parse_total_pages("<html></html>").unwrap(), 1);
}

// --- errors ---

#[test]
fn test_rate_limit_detection() {
    assert!(FetchError::RateLimited.is_rate_limited());
    assert!(!FetchError::Status { status: 503 }.is_rate_limited());
    assert!(konadl::DownloadError::from(FetchError::RateLimited).is_rate_limited());
}

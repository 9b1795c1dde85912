use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dp_core::config::{PipelineConfig, Timeouts};
use dp_core::{Constraints, ContentKind, ContentStore, Error, FeedSource, Responder, Result, StoredRecord};
use dp_feeds::FeedTransport;
use dp_inference::responders::LocalResponder;
use dp_pipeline::{Pipeline, RunSummary};
use dp_storage::{InMemoryStorage, SQLiteStorage};
use tokio_util::sync::CancellationToken;

/// Serves fixed feed documents; unknown URLs fail, "slow" URLs hang.
#[derive(Default)]
struct CannedTransport {
    bodies: HashMap<String, String>,
    slow: HashSet<String>,
}

impl CannedTransport {
    fn with_feed(mut self, url: &str, body: String) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    fn with_slow_feed(mut self, url: &str, body: String) -> Self {
        self.slow.insert(url.to_string());
        self.with_feed(url, body)
    }
}

#[async_trait]
impl FeedTransport for CannedTransport {
    async fn get(&self, url: &str) -> Result<String> {
        if self.slow.contains(url) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        self.bodies.get(url).cloned().ok_or_else(|| Error::Fetch {
            feed: url.to_string(),
            message: "connection refused".to_string(),
        })
    }
}

/// Local responder that answers garbage for prompts mentioning `marker`.
struct Sabotaged {
    inner: LocalResponder,
    marker: &'static str,
}

#[async_trait]
impl Responder for Sabotaged {
    fn name(&self) -> &str {
        "sabotaged"
    }

    async fn complete(&self, prompt: &str, constraints: &Constraints) -> Result<String> {
        if prompt.contains(self.marker) {
            return Ok("Sorry, I can't summarize this one.".to_string());
        }
        self.inner.complete(prompt, constraints).await
    }
}

fn rss(entries: &[(&str, &str)]) -> String {
    let items = entries
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{}</title><link>{}</link><guid>{}</guid><description>{} explained.</description><pubDate>Tue, 07 May 2024 10:00:00 GMT</pubDate></item>",
                title, link, link, title
            )
        })
        .collect::<String>();
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel><title>Feed</title><link>https://feeds.test</link><description>test</description>{}</channel></rss>",
        items
    )
}

fn config(feeds: &[&str]) -> PipelineConfig {
    PipelineConfig {
        feeds: feeds
            .iter()
            .enumerate()
            .map(|(i, url)| FeedSource::new(format!("Feed {}", i + 1), *url, Some("research")))
            .collect(),
        limit_per_feed: 10,
        max_publishes: None,
        timeouts: Timeouts {
            fetch_secs: 1,
            responder_secs: 5,
            storage_secs: 5,
        },
        ..PipelineConfig::default()
    }
}

fn pipeline(
    kind: ContentKind,
    config: PipelineConfig,
    transport: CannedTransport,
    store: Arc<dyn ContentStore>,
) -> Pipeline {
    let responder: Arc<dyn Responder> = Arc::new(LocalResponder::new());
    Pipeline::new(kind, config, Arc::new(transport), store, responder.clone(), responder)
}

async fn run(pipeline: &Pipeline) -> RunSummary {
    pipeline.run(&CancellationToken::new()).await.unwrap()
}

fn five_items() -> String {
    rss(&[
        ("Fasting windows", "https://news.test/fasting"),
        ("Zone two cardio", "https://news.test/cardio"),
        ("BROKEN sleep study", "https://news.test/sleep"),
        ("Protein timing", "https://news.test/protein"),
        ("Cold exposure", "https://news.test/cold"),
    ])
}

#[tokio::test]
async fn test_repeated_runs_publish_each_source_once() {
    let store = InMemoryStorage::new();
    let transport = || CannedTransport::default().with_feed("https://feeds.test/a", five_items());

    let mut totals = Vec::new();
    for _ in 0..3 {
        let pipeline = pipeline(
            ContentKind::Article,
            config(&["https://feeds.test/a"]),
            transport(),
            Arc::new(store.clone()),
        );
        totals.push(run(&pipeline).await);
    }

    assert_eq!(totals[0].published, 5);
    assert_eq!(totals[1].published, 0);
    assert_eq!(totals[1].skipped_duplicate, 5);
    assert_eq!(totals[2].published, 0);
    assert_eq!(store.len(ContentKind::Article).await, 5);
}

#[tokio::test]
async fn test_malformed_item_fails_alone() {
    let store = InMemoryStorage::new();
    let responder: Arc<dyn Responder> = Arc::new(Sabotaged {
        inner: LocalResponder::new(),
        marker: "BROKEN",
    });
    let pipeline = Pipeline::new(
        ContentKind::Article,
        config(&["https://feeds.test/a"]),
        Arc::new(CannedTransport::default().with_feed("https://feeds.test/a", five_items())),
        Arc::new(store.clone()),
        responder,
        Arc::new(LocalResponder::new()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.fetched, 5);
    assert_eq!(summary.published, 4);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].source_url, "https://news.test/sleep");
    assert!(summary.errors[0].message.contains("Malformed"));

    let missing = store
        .find_by_source_url(ContentKind::Article, "https://news.test/sleep")
        .await
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(
        summary.published_ids,
        vec!["fasting-windows", "zone-two-cardio", "protein-timing", "cold-exposure"]
    );
}

#[tokio::test]
async fn test_identical_titles_get_distinct_slugs() {
    let store = InMemoryStorage::new();
    let feed = rss(&[
        ("My Title", "https://news.test/one"),
        ("My title!", "https://news.test/two"),
    ]);
    let pipeline = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/a"]),
        CannedTransport::default().with_feed("https://feeds.test/a", feed),
        Arc::new(store.clone()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.published_ids, vec!["my-title", "my-title-2"]);

    let second = store.get_by_id(ContentKind::Article, "my-title-2").await.unwrap().unwrap();
    assert_eq!(second.source_url, "https://news.test/two");
}

#[tokio::test]
async fn test_unreachable_sources_do_not_block_others() {
    let store = InMemoryStorage::new();
    let transport = CannedTransport::default()
        .with_slow_feed("https://feeds.test/slow", rss(&[("Slow news", "https://news.test/slow")]))
        .with_feed("https://feeds.test/b", rss(&[("Fresh news", "https://news.test/fresh")]));
    let pipeline = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/slow", "https://feeds.test/missing", "https://feeds.test/b"]),
        transport,
        Arc::new(store.clone()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.warnings.len(), 2);
    assert!(summary.warnings[0].contains("timed out"));
}

#[tokio::test]
async fn test_all_sources_unreachable_is_not_an_error() {
    let store = InMemoryStorage::new();
    let pipeline = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/missing"]),
        CannedTransport::default(),
        Arc::new(store.clone()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.published, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.warnings.len(), 1);
}

#[tokio::test]
async fn test_empty_input_is_a_no_op() {
    let store = InMemoryStorage::new();

    let no_sources = pipeline(ContentKind::Article, config(&[]), CannedTransport::default(), Arc::new(store.clone()));
    let summary = run(&no_sources).await;
    assert_eq!((summary.fetched, summary.published, summary.failed), (0, 0, 0));

    let empty_feed = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/empty"]),
        CannedTransport::default().with_feed("https://feeds.test/empty", rss(&[])),
        Arc::new(store.clone()),
    );
    let summary = run(&empty_feed).await;
    assert_eq!((summary.fetched, summary.published, summary.failed), (0, 0, 0));
    assert!(summary.warnings.is_empty());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_same_entry_in_two_feeds_is_published_once() {
    let store = InMemoryStorage::new();
    let transport = CannedTransport::default()
        .with_feed("https://feeds.test/a", rss(&[("Shared", "https://news.test/shared?utm_source=a")]))
        .with_feed("https://feeds.test/b", rss(&[("Shared again", "https://news.test/shared#top")]));
    let pipeline = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/a", "https://feeds.test/b"]),
        transport,
        Arc::new(store.clone()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(store.len(ContentKind::Article).await, 1);
}

#[tokio::test]
async fn test_publish_quota_spreads_work_over_runs() {
    let store = InMemoryStorage::new();
    let mut limited = config(&["https://feeds.test/a"]);
    limited.max_publishes = Some(2);

    for expected_total in [2, 4, 5] {
        let pipeline = pipeline(
            ContentKind::Article,
            limited.clone(),
            CannedTransport::default().with_feed("https://feeds.test/a", five_items()),
            Arc::new(store.clone()),
        );
        run(&pipeline).await;
        assert_eq!(store.len(ContentKind::Article).await, expected_total);
    }
}

#[tokio::test]
async fn test_cancelled_run_publishes_nothing() {
    let store = InMemoryStorage::new();
    let pipeline = pipeline(
        ContentKind::Article,
        config(&["https://feeds.test/a"]),
        CannedTransport::default().with_feed("https://feeds.test/a", five_items()),
        Arc::new(store.clone()),
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = pipeline.run(&cancel).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.fetched, 5);
    assert_eq!(summary.published, 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_article_and_tip_pipelines_share_a_store() {
    let store = InMemoryStorage::new();
    let feed = || CannedTransport::default().with_feed("https://feeds.test/a", five_items());
    let articles = pipeline(ContentKind::Article, config(&["https://feeds.test/a"]), feed(), Arc::new(store.clone()));
    let tips = pipeline(ContentKind::Tip, config(&["https://feeds.test/a"]), feed(), Arc::new(store.clone()));

    let (article_run, tip_run) = tokio::join!(run(&articles), run(&tips));
    assert_eq!(article_run.published, 5);
    assert_eq!(tip_run.published, 5);
    assert_eq!(store.len(ContentKind::Article).await, 5);
    assert_eq!(store.len(ContentKind::Tip).await, 5);

    let tip = store
        .find_by_source_url(ContentKind::Tip, "https://news.test/fasting")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tip.id, "tip-fasting-windows");
    assert!(!tip.body.contains("Key Takeaways"));

    let article = store
        .find_by_source_url(ContentKind::Article, "https://news.test/fasting")
        .await
        .unwrap()
        .unwrap();
    assert!(article.body.contains("**Key Takeaways**"));
}

#[tokio::test]
async fn test_sqlite_store_survives_reruns() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("content.db");

    for expected_published in [5, 0] {
        let store = SQLiteStorage::new_with_path(&path).await.unwrap();
        let pipeline = pipeline(
            ContentKind::Article,
            config(&["https://feeds.test/a"]),
            CannedTransport::default().with_feed("https://feeds.test/a", five_items()),
            Arc::new(store),
        );
        let summary = run(&pipeline).await;
        assert_eq!(summary.published, expected_published);
    }

    let store = SQLiteStorage::new_with_path(&path).await.unwrap();
    assert_eq!(store.latest(ContentKind::Article, 10).await.unwrap().len(), 5);
}

/// Delays source lookups so concurrent runs both see a source as new.
struct SlowLookups {
    inner: Arc<dyn ContentStore>,
}

#[async_trait]
impl ContentStore for SlowLookups {
    fn name(&self) -> &str {
        "slow-lookups"
    }

    async fn get_by_id(&self, kind: ContentKind, id: &str) -> Result<Option<StoredRecord>> {
        self.inner.get_by_id(kind, id).await
    }

    async fn find_by_source_url(&self, kind: ContentKind, url: &str) -> Result<Option<StoredRecord>> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.inner.find_by_source_url(kind, url).await
    }

    async fn save(&self, record: &StoredRecord) -> Result<StoredRecord> {
        self.inner.save(record).await
    }

    async fn insert(&self, record: &StoredRecord) -> Result<Option<StoredRecord>> {
        self.inner.insert(record).await
    }

    async fn latest(&self, kind: ContentKind, limit: usize) -> Result<Vec<StoredRecord>> {
        self.inner.latest(kind, limit).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

async fn run_twice_concurrently(store: Arc<dyn ContentStore>) -> (RunSummary, RunSummary) {
    let shared: Arc<dyn ContentStore> = Arc::new(SlowLookups { inner: store });
    let feed = || CannedTransport::default().with_feed("https://feeds.test/a", five_items());
    let first = pipeline(ContentKind::Article, config(&["https://feeds.test/a"]), feed(), shared.clone());
    let second = pipeline(ContentKind::Article, config(&["https://feeds.test/a"]), feed(), shared);
    tokio::join!(run(&first), run(&second))
}

#[tokio::test]
async fn test_concurrent_runs_publish_each_source_once() {
    let store = InMemoryStorage::new();
    let (a, b) = run_twice_concurrently(Arc::new(store.clone())).await;

    assert_eq!(a.published + b.published, 5);
    assert_eq!(a.skipped_duplicate + b.skipped_duplicate, 5);
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(store.len(ContentKind::Article).await, 5);

    let ids = a.published_ids.iter().chain(&b.published_ids).collect::<HashSet<_>>();
    assert_eq!(ids.len(), 5);
    assert!(!ids.iter().any(|id| id.ends_with("-2")));
}

#[tokio::test]
async fn test_concurrent_runs_on_sqlite_publish_each_source_once() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = SQLiteStorage::new_with_path(&temp_dir.path().join("content.db")).await.unwrap();
    let store: Arc<dyn ContentStore> = Arc::new(store);

    let (a, b) = run_twice_concurrently(store.clone()).await;

    assert_eq!(a.published + b.published, 5);
    assert_eq!(a.failed + b.failed, 0);
    assert_eq!(store.latest(ContentKind::Article, 20).await.unwrap().len(), 5);
}

/// Answers every prompt with the same text.
struct Fixed(&'static str);

#[async_trait]
impl Responder for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn complete(&self, _prompt: &str, _constraints: &Constraints) -> Result<String> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn test_bare_fence_answers_fail_items_without_aborting() {
    let store = InMemoryStorage::new();
    let pipeline = Pipeline::new(
        ContentKind::Article,
        config(&["https://feeds.test/a"]),
        Arc::new(CannedTransport::default().with_feed("https://feeds.test/a", five_items())),
        Arc::new(store.clone()),
        Arc::new(Fixed("````")),
        Arc::new(LocalResponder::new()),
    );

    let summary = run(&pipeline).await;
    assert_eq!(summary.failed, 5);
    assert_eq!(summary.published, 0);
    assert!(summary.errors.iter().all(|e| e.message.contains("Malformed")));
    assert!(store.is_empty().await);
}

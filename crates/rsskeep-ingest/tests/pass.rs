//! `run_pass` over stub and wiremock-backed fetchers.

mod common;

use common::{feed, no_delays, registry, rss, StubFetcher, StubTable};
use rsskeep_core::Partition;
use rsskeep_feeds::{ContentFilters, FeedFetcher};
use rsskeep_ingest::{run_pass, PartitionStore, PassOptions, SourceOutcome};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn failing_sources_do_not_stop_the_pass() {
    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let table = StubTable::default();
    let registry = registry(vec![
        feed("https://a.example/feed", "alpha", "FinTech"),
        feed("https://b.example/feed", "bravo", "FinTech"),
        feed("https://c.example/feed", "charlie", "FinTech"),
        feed("https://d.example/feed", "delta", "FinTech"),
    ]);
    let fetcher = StubFetcher::new()
        .with_body("https://a.example/feed", rss(&[("a1", "Alpha one")]))
        .with_status("https://b.example/feed", 503)
        .with_body("https://c.example/feed", "<rss><channel><item></channel>")
        .with_body("https://d.example/feed", rss(&[("d1", "Delta one")]));

    let report = run_pass(&registry, &fetcher, &store, Some(&table), &no_delays()).await;

    let outcomes: Vec<_> = report.sources.iter().map(|s| &s.outcome).collect();
    assert!(matches!(outcomes[0], SourceOutcome::Stored));
    assert!(matches!(outcomes[1], SourceOutcome::FetchFailed(msg) if msg.contains("503")));
    assert!(matches!(outcomes[2], SourceOutcome::ParseFailed(_)));
    assert!(matches!(outcomes[3], SourceOutcome::Stored));
    assert_eq!(report.failed_sources(), 2);
    assert_eq!(report.new_entries(), 2);
    assert_eq!(table.uids(), ["a1", "d1"]);
    assert!(!store.path_for(&Partition::new("bravo", "FinTech")).exists());
}

#[tokio::test]
async fn concurrent_fetching_keeps_registry_order() {
    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let sources: Vec<_> = (0..6)
        .map(|i| feed(&format!("https://s{i}.example/feed"), &format!("s{i}"), "News"))
        .collect();
    let mut fetcher = StubFetcher::new();
    for i in 0..6 {
        let id = format!("id{i}");
        let title = format!("Title {i}");
        fetcher = fetcher.with_body(
            &format!("https://s{i}.example/feed"),
            rss(&[(id.as_str(), title.as_str())]),
        );
    }
    let options = PassOptions {
        fetch_concurrency: 3,
        ..no_delays()
    };

    let report = run_pass(&registry(sources), &fetcher, &store, None::<&StubTable>, &options).await;

    let order: Vec<_> = report.sources.iter().map(|s| s.source.as_str()).collect();
    assert_eq!(order, ["s0", "s1", "s2", "s3", "s4", "s5"]);
    assert!(report.sources.iter().all(|s| s.new == 1));
}

#[tokio::test]
async fn items_without_id_or_link_reach_neither_sink() {
    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let table = StubTable::default();
    let body = "<rss><channel>\
        <item><title>No identity</title></item>\
        <item><title>Linked</title><link>https://x/1</link></item>\
        </channel></rss>";
    let fetcher = StubFetcher::new().with_body("https://a.example/feed", body);
    let registry = registry(vec![feed("https://a.example/feed", "alpha", "FinTech")]);

    let report = run_pass(&registry, &fetcher, &store, Some(&table), &no_delays()).await;

    let source = &report.sources[0];
    assert_eq!(source.fetched, 1);
    assert_eq!(source.rejected, 1);
    assert_eq!(table.uids(), ["https://x/1"]);
    let state = store.load(&Partition::new("alpha", "FinTech")).await.unwrap();
    let titles: Vec<_> = state.document().entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Linked"]);
}

#[tokio::test]
async fn sources_sharing_a_partition_are_deduplicated_together() {
    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let table = StubTable::default();
    let fetcher = StubFetcher::new()
        .with_body("https://a.example/one", rss(&[("x", "Shared story")]))
        .with_body(
            "https://a.example/two",
            rss(&[("y", "Shared story"), ("z", "Fresh story")]),
        );
    let registry = registry(vec![
        feed("https://a.example/one", "alpha", "FinTech"),
        feed("https://a.example/two", "alpha", "FinTech"),
    ]);

    let report = run_pass(&registry, &fetcher, &store, Some(&table), &no_delays()).await;

    assert_eq!(report.sources[0].new, 1);
    assert_eq!(report.sources[1].new, 1);
    // First source created the partition (bulk); second appended to it (single insert).
    assert_eq!(table.bulk_calls(), 1);
    assert_eq!(table.insert_calls(), 1);
    assert_eq!(table.uids(), ["x", "z"]);
}

#[tokio::test]
async fn stored_gmt_date_is_normalized_to_utc() {
    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let table = StubTable::default();
    let body = "<feed xmlns=\"http://www.w3.org/2005/Atom\"><entry>\
        <id>urn:1</id><title>Atom</title><published>2024-03-01T10:00:00Z</published>\
        </entry></feed>";
    let fetcher = StubFetcher::new().with_body("https://a.example/atom", body);
    let registry = registry(vec![feed("https://a.example/atom", "alpha", "FinTech")]);

    run_pass(&registry, &fetcher, &store, Some(&table), &no_delays()).await;

    let rows = table.rows();
    assert_eq!(rows[0].record.published_date, "2024-03-01T10:00:00Z");
    assert_eq!(rows[0].record.gmt_date, "2024-03-01 10:00:00");
}

#[tokio::test]
async fn pass_over_http_writes_partition_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/betakit"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!("\n\n{}", rss(&[("b1", "Betakit story")]))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let store = PartitionStore::new(dir.path());
    let fetcher = FeedFetcher::new(5, "rsskeep-test/0.1", ContentFilters::builtin()).unwrap();
    let registry = registry(vec![
        feed(&format!("{}/betakit", server.uri()), "betakit", "FinTech"),
        feed(&format!("{}/broken", server.uri()), "broken", "FinTech"),
    ]);

    let report = run_pass(&registry, &fetcher, &store, None::<&StubTable>, &no_delays()).await;

    assert_eq!(report.sources[0].new, 1);
    assert!(matches!(report.sources[1].outcome, SourceOutcome::FetchFailed(_)));
    let written = std::fs::read_to_string(dir.path().join("betakit").join("FinTech.xml")).unwrap();
    assert!(written.contains("<title>Betakit story</title>"));
}

//! Crawler behavior against a mock HTTP site: page budgets, depth limits,
//! deduplication, and content-type gating.

use std::time::Duration;

use httpmock::prelude::*;
use url::Url;
use weblore::config::CrawlConfig;
use weblore::crawler::Crawler;

fn filler() -> String {
    "Readable prose that comfortably clears the minimum content length the quality gate enforces. "
        .repeat(5)
}

fn page_html(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|link| format!("<a href=\"{link}\">{link}</a>"))
        .collect();
    format!(
        "<html><head><title>{title}</title></head>\
         <body><article><p>{}</p>{anchors}</article></body></html>",
        filler()
    )
}

fn crawler(max_pages: usize, max_depth: usize) -> Crawler {
    let config = CrawlConfig::default()
        .with_max_pages(max_pages)
        .with_max_depth(max_depth)
        .with_delay(Duration::ZERO)
        .with_max_concurrent(2)
        .with_timeout(Duration::from_secs(10));
    Crawler::new(config).unwrap()
}

#[tokio::test]
async fn crawls_seed_and_linked_pages_once_each() {
    let server = MockServer::start_async().await;
    let seed = server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html; charset=utf-8")
                .body(page_html("Home", &["/a", "/b"]));
        })
        .await;
    let a = server
        .mock_async(|when, then| {
            when.method(GET).path("/a");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("A", &["/", "/b"]));
        })
        .await;
    let b = server
        .mock_async(|when, then| {
            when.method(GET).path("/b");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("B", &[]));
        })
        .await;

    let pages = crawler(10, 2)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;

    assert_eq!(pages.len(), 3);
    // Every URL fetched exactly once despite /a linking back to the seed.
    assert_eq!(seed.hits_async().await, 1);
    assert_eq!(a.hits_async().await, 1);
    assert_eq!(b.hits_async().await, 1);

    let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    assert!(titles.contains(&"Home"));
    assert!(titles.contains(&"A"));
    assert!(titles.contains(&"B"));
}

#[tokio::test]
async fn page_budget_caps_collection() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/p1", "/p2", "/p3", "/p4"]));
        })
        .await;
    for i in 1..=4 {
        let path = format!("/p{i}");
        server
            .mock_async(move |when, then| {
                when.method(GET).path(path);
                then.status(200)
                    .header("content-type", "text/html")
                    .body(page_html("Leaf", &[]));
            })
            .await;
    }

    let pages = crawler(2, 3)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;
    assert_eq!(pages.len(), 2);
}

#[tokio::test]
async fn depth_limit_stops_link_expansion() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/mid"]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/mid");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Mid", &["/deep"]));
        })
        .await;
    let deep = server
        .mock_async(|when, then| {
            when.method(GET).path("/deep");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Deep", &[]));
        })
        .await;

    let pages = crawler(10, 1)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;

    assert_eq!(pages.len(), 2);
    assert_eq!(deep.hits_async().await, 0);
}

#[tokio::test]
async fn non_html_responses_are_dropped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/feed"]));
        })
        .await;
    let feed = server
        .mock_async(|when, then| {
            when.method(GET).path("/feed");
            then.status(200)
                .header("content-type", "application/json")
                .body("{\"items\": []}");
        })
        .await;

    let pages = crawler(10, 2)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;

    assert_eq!(pages.len(), 1);
    assert_eq!(feed.hits_async().await, 1);
}

#[tokio::test]
async fn thin_pages_are_rejected_but_crawl_continues() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/thin", "/full"]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/thin");
            then.status(200)
                .header("content-type", "text/html")
                .body("<html><body><p>almost nothing</p></body></html>");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/full");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Full", &[]));
        })
        .await;

    let pages = crawler(10, 2)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;

    let titles: Vec<&str> = pages.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(pages.len(), 2);
    assert!(!titles.contains(&"thin"));
    assert!(titles.contains(&"Full"));
}

#[tokio::test]
async fn deadline_returns_pages_collected_so_far() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/slow"]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .header("content-type", "text/html")
                .delay(Duration::from_secs(30))
                .body(page_html("Slow", &[]));
        })
        .await;

    let config = CrawlConfig::default()
        .with_delay(Duration::ZERO)
        .with_max_concurrent(2)
        .with_timeout(Duration::from_millis(800));
    let started = std::time::Instant::now();
    let pages = Crawler::new(config)
        .unwrap()
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;

    // The in-flight fetch is abandoned at the deadline; what was already
    // collected comes back as a normal result.
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "Home");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn unreachable_seed_yields_no_pages() {
    // Nothing listens on port 9; the fetch error is absorbed, not raised.
    let pages = crawler(5, 1)
        .crawl(Url::parse("http://127.0.0.1:9/").unwrap())
        .await;
    assert!(pages.is_empty());
}

#[tokio::test]
async fn server_errors_drop_the_page() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/");
            then.status(200)
                .header("content-type", "text/html")
                .body(page_html("Home", &["/broken"]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/broken");
            then.status(500)
                .header("content-type", "text/html")
                .body("oops");
        })
        .await;

    let pages = crawler(10, 2)
        .crawl(Url::parse(&server.url("/")).unwrap())
        .await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title, "Home");
}

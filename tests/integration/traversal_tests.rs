//! Traversal bounds, ordering and failure handling against a scripted site

use crate::common::{
    harness, harness_with, test_config, test_config_with, url, CountingAnalyzer, FakeSite, ROOT,
};
use delve::crawler::{REDIRECTED_OFF_SITE, REDIRECTED_TO_VISITED};
use delve::index::{DocumentCategory, Filter, VectorStore};
use delve::state::{JobStatus, PageStatus};
use delve::storage::OwnerIds;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SHORT_ANALYZER_TIMEOUT: &str = r#"
[analyzer]
endpoint = "https://llm.example.com/v1"
model = "test-model"
timeout-secs = 1
"#;

fn owner() -> OwnerIds {
    OwnerIds::new("user-1", "profile-1")
}

#[tokio::test]
async fn test_cycles_are_visited_once() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b"])
        .page("/a", "A", "page a", &["/", "/b"])
        .page("/b", "B", "page b", &["/a", "/"]);
    let h = harness("max-depth = 5", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(h.site.visits(), vec![url("/"), url("/a"), url("/b")]);
    assert_eq!(job.counters.discovered, 3);
    assert_eq!(job.counters.processed, 3);
}

#[tokio::test]
async fn test_visits_in_depth_first_appearance_order() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b"])
        .page("/a", "A", "page a", &["/c"])
        .page("/b", "B", "page b", &["/d"])
        .page("/c", "C", "page c", &[])
        .page("/d", "D", "page d", &[]);
    let h = harness("max-depth = 3", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(
        h.site.visits(),
        vec![url("/"), url("/a"), url("/c"), url("/b"), url("/d")]
    );

    let pages = h.service.get_job_pages(job.id).unwrap();
    let depths: Vec<(String, u32)> = pages.iter().map(|p| (p.url.clone(), p.depth)).collect();
    assert!(depths.contains(&(url("/"), 1)));
    assert!(depths.contains(&(url("/a"), 2)));
    assert!(depths.contains(&(url("/c"), 3)));
}

#[tokio::test]
async fn test_depth_one_visits_only_the_root() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b"])
        .page("/a", "A", "page a", &[])
        .page("/b", "B", "page b", &[]);
    let h = harness("max-depth = 1", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(h.site.visits(), vec![url("/")]);
    assert_eq!(job.counters.discovered, 1);
}

#[tokio::test]
async fn test_depth_bound_is_inclusive() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a"])
        .page("/a", "A", "page a", &["/b"])
        .page("/b", "B", "page b", &["/c"])
        .page("/c", "C", "page c", &[]);
    let h = harness("max-depth = 3", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(h.site.visits(), vec![url("/"), url("/a"), url("/b")]);
    let pages = h.service.get_job_pages(job.id).unwrap();
    assert!(pages.iter().all(|p| p.depth <= 3));
}

#[tokio::test]
async fn test_page_bound_stops_traversal() {
    let links: Vec<String> = (1..=9).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let mut site = FakeSite::new().page("/", "Home", "root", &link_refs);
    for link in &links {
        site = site.page(link, "Child", "child page", &[]);
    }
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), Some(4)).unwrap();
    assert_eq!(job.max_pages, 4);
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.discovered, 4);
    assert_eq!(
        h.site.visits(),
        vec![url("/"), url("/p1"), url("/p2"), url("/p3")]
    );
    assert_eq!(h.service.get_job_pages(job.id).unwrap().len(), 4);
}

#[tokio::test]
async fn test_out_of_scope_links_are_not_followed() {
    let site = FakeSite::new()
        .page(
            "/",
            "Home",
            "root",
            &["https://elsewhere.test/x", "https://docs.site.test/guide", "/a"],
        )
        .page("/a", "A", "page a", &[]);
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    let visits = h.site.visits();
    assert!(!visits.iter().any(|v| v.contains("elsewhere.test")));
    assert!(visits.contains(&"https://docs.site.test/guide".to_string()));
    assert!(visits.contains(&url("/a")));
}

#[tokio::test]
async fn test_failing_page_is_recorded_and_job_completes() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/broken", "/ok"])
        .failing("/broken", "HTTP 500")
        .page("/ok", "Ok", "fine", &[]);
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.error_message.is_none());
    assert_eq!(job.counters.discovered, 3);
    assert_eq!(job.counters.processed, 3);

    let pages = h.service.get_job_pages(job.id).unwrap();
    let broken = pages.iter().find(|p| p.url == url("/broken")).unwrap();
    assert_eq!(broken.status, PageStatus::Failed);
    assert!(broken.error_message.as_deref().unwrap().contains("HTTP 500"));
    assert!(broken.analysis.is_none());

    let ok = pages.iter().find(|p| p.url == url("/ok")).unwrap();
    assert_ne!(ok.status, PageStatus::Failed);
}

#[tokio::test]
async fn test_unreachable_root_fails_the_job() {
    let site = FakeSite::new().failing("/", "connection refused");
    let h = harness("", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection refused"));
    assert!(job.started_at.is_some());
    assert!(job.completed_at.is_some());
    assert!(h.service.get_job_pages(job.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_cancellation_ends_job_as_cancelled() {
    let links: Vec<String> = (1..=5).map(|i| format!("/p{}", i)).collect();
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
    let mut site = FakeSite::new().page("/", "Home", "root", &link_refs);
    for link in &links {
        site = site.page(link, "Child", "child page", &[]);
    }
    let h = harness("max-depth = 2", site);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let target = url("/p1");
    h.site.set_probe(move |visited| {
        if visited == target {
            trigger.cancel();
        }
    });

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, cancel).await.unwrap();

    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.completed_at.is_some());
    assert_eq!(h.site.visits(), vec![url("/"), url("/p1")]);
}

#[tokio::test]
async fn test_counters_are_persisted_while_running() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b"])
        .page("/a", "A", "page a", &[])
        .page("/b", "B", "page b", &[]);
    let h = harness("max-depth = 2", site);
    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();

    let service = h.service.clone();
    let job_id = job.id;
    let observed = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = observed.clone();
    h.site.set_probe(move |_| {
        let job = service.get_job_status(job_id).unwrap();
        sink.lock().unwrap().push((job.status, job.counters.processed));
    });

    h.service.run_job(job_id, CancellationToken::new()).await.unwrap();

    let observed = observed.lock().unwrap().clone();
    assert_eq!(
        observed,
        vec![
            (JobStatus::Processing, 0),
            (JobStatus::Processing, 1),
            (JobStatus::Processing, 2),
        ]
    );
}

#[tokio::test]
async fn test_analysis_gated_by_threshold() {
    // Short pages score 10 - depth: the root scores 9, its children 8
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b"])
        .page("/a", "A", "page a", &[])
        .page("/b", "B", "page b", &[]);
    let h = harness("max-depth = 2\nanalysis-threshold = 8", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(h.analyzer.calls(), 1);
    assert_eq!(job.counters.analyzed, 1);

    let pages = h.service.get_job_pages(job.id).unwrap();
    let root = pages.iter().find(|p| p.url == url("/")).unwrap();
    assert_eq!(root.status, PageStatus::Analyzed);
    assert_eq!(root.priority, 9);
    assert!(root.analysis.is_some());

    let child = pages.iter().find(|p| p.url == url("/a")).unwrap();
    assert_eq!(child.status, PageStatus::Discovered);
    assert_eq!(child.priority, 8);
    assert!(child.analysis.is_none());
}

#[tokio::test]
async fn test_analyzed_bound_caps_analyzer_calls() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/a", "/b", "/c"])
        .page("/a", "A", "page a", &[])
        .page("/b", "B", "page b", &[])
        .page("/c", "C", "page c", &[]);
    let h = harness("max-depth = 2\nanalysis-threshold = 1\nmax-analyzed = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.counters.discovered, 4);
    assert_eq!(job.counters.analyzed, 2);
    assert_eq!(h.analyzer.calls(), 2);
    assert!(job.counters.analyzed <= job.counters.processed);
    assert!(job.counters.processed <= job.counters.discovered);
}

#[tokio::test]
async fn test_analyzer_failure_stores_fallback() {
    let site = FakeSite::new().page("/", "Home", "root", &[]);
    let h = harness_with(
        test_config("", ":memory:"),
        site,
        CountingAnalyzer::failing(),
    );

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let pages = h.service.get_job_pages(job.id).unwrap();
    let analysis = pages[0].analysis.as_ref().unwrap();
    assert_eq!(analysis.summary, "Content analysis unavailable");
    assert_eq!(analysis.relevance_score, 0.1);
}

#[tokio::test]
async fn test_analyzed_pages_are_indexed() {
    let site = FakeSite::new()
        .page("/", "Home", "welcome to the site", &["/a"])
        .page("/a", "A", "page a", &[]);
    let h = harness("max-depth = 2\nanalysis-threshold = 8", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    let pages = h.service.get_job_pages(job.id).unwrap();
    let root = pages.iter().find(|p| p.url == url("/")).unwrap();
    let child = pages.iter().find(|p| p.url == url("/a")).unwrap();

    let ledger = h.service.context().indexer.ledger();
    assert!(ledger.contains(&DocumentCategory::PageContent.logical_key(root.id)));
    assert!(ledger.contains(&DocumentCategory::Analysis.logical_key(root.id)));
    assert!(!ledger.contains(&DocumentCategory::PageContent.logical_key(child.id)));

    let records = h
        .store
        .list(&Filter::new().field("category", "page_content"), 10)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, "welcome to the site");
    assert_eq!(records[0].metadata["user_id"], "user-1");
    assert_eq!(records[0].metadata["profile_id"], "profile-1");
    assert_eq!(records[0].metadata["url"], url("/").as_str());

    let hits = h.service.search("welcome", Some("user-1"), 5).await.unwrap();
    assert!(!hits.is_empty());
    let none = h.service.search("welcome", Some("someone-else"), 5).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_off_site_redirect_is_recorded_as_failure() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/out", "/ok"])
        .redirecting("/out", "https://elsewhere.test/landing", "Foreign landing", "foreign text")
        .page("/ok", "Ok", "fine", &[]);
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.discovered, 3);
    assert_eq!(job.counters.processed, 3);
    assert_eq!(job.counters.analyzed, 2);
    assert_eq!(h.analyzer.calls(), 2);

    let pages = h.service.get_job_pages(job.id).unwrap();
    let out = pages.iter().find(|p| p.url == url("/out")).unwrap();
    assert_eq!(out.status, PageStatus::Failed);
    assert_eq!(out.error_message.as_deref(), Some(REDIRECTED_OFF_SITE));
    assert!(out.content.is_none());
    assert!(!pages
        .iter()
        .any(|p| p.title.as_deref() == Some("Foreign landing")));

    let records = h
        .store
        .list(&Filter::new().field("category", "page_content"), 10)
        .await
        .unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.text != "foreign text"));
}

#[tokio::test]
async fn test_redirect_to_visited_page_is_not_reprocessed() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/back"])
        .redirecting("/back", ROOT, "Home page here", "root again");
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.analyzed, 1);
    assert_eq!(h.analyzer.calls(), 1);

    let pages = h.service.get_job_pages(job.id).unwrap();
    let back = pages.iter().find(|p| p.url == url("/back")).unwrap();
    assert_eq!(back.status, PageStatus::Failed);
    assert_eq!(back.error_message.as_deref(), Some(REDIRECTED_TO_VISITED));
    assert!(back.analysis.is_none());

    let records = h
        .store
        .list(&Filter::new().field("category", "page_content"), 10)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn test_redirect_target_counts_as_visited() {
    let site = FakeSite::new()
        .page("/", "Home", "root", &["/old", "/new"])
        .redirecting("/old", &url("/new"), "New", "moved content")
        .page("/new", "New", "moved content", &[]);
    let h = harness("max-depth = 2", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(h.site.visits(), vec![url("/"), url("/old")]);
    assert_eq!(job.counters.discovered, 2);

    let pages = h.service.get_job_pages(job.id).unwrap();
    let old = pages.iter().find(|p| p.url == url("/old")).unwrap();
    assert_eq!(old.status, PageStatus::Analyzed);
    assert_eq!(old.content.as_deref(), Some("moved content"));
}

#[tokio::test]
async fn test_root_redirected_off_site_fails_the_job() {
    let site = FakeSite::new().redirecting("/", "https://elsewhere.test/", "Elsewhere", "foreign");
    let h = harness("", site);

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = h.service.run_job(job.id, CancellationToken::new()).await.unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.unwrap().contains(REDIRECTED_OFF_SITE));
    assert!(h.service.get_job_pages(job.id).unwrap().is_empty());
    assert_eq!(h.analyzer.calls(), 0);
}

#[tokio::test]
async fn test_stalled_analysis_times_out_with_fallback() {
    let site = FakeSite::new().page("/", "Home", "root", &[]);
    let h = harness_with(
        test_config_with("", SHORT_ANALYZER_TIMEOUT, ":memory:"),
        site,
        CountingAnalyzer::stalled(),
    );

    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();
    let job = tokio::time::timeout(
        Duration::from_secs(30),
        h.service.run_job(job.id, CancellationToken::new()),
    )
    .await
    .expect("analysis is bounded by its timeout")
    .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.counters.analyzed, 1);
    let pages = h.service.get_job_pages(job.id).unwrap();
    let analysis = pages[0].analysis.as_ref().unwrap();
    assert_eq!(analysis.summary, "Content analysis unavailable");
}

#[tokio::test]
async fn test_cancellation_interrupts_analysis() {
    let site = FakeSite::new().page("/", "Home", "root", &[]);
    let h = harness_with(test_config("", ":memory:"), site, CountingAnalyzer::stalled());
    let job = h.service.create_crawl_job(ROOT, &owner(), None).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let run = h.service.run_job(job.id, cancel);
    let cancel_soon = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    };

    let (job, ()) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(run, cancel_soon)
    })
    .await
    .expect("cancellation stops a stalled analysis");
    let job = job.unwrap();

    assert_eq!(job.status, JobStatus::Cancelled);
    assert_eq!(h.analyzer.calls(), 1);
}

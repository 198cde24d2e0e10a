mod common;

use std::fs;

use common::open_store;
use tempfile::TempDir;
use texproof::cache::{CleanupCriteria, EntryOrigin};
use texproof_core::{fingerprint, CacheLevel, CachePayload, EntryScope, PageContent};

fn page(n: u32, text: &str) -> PageContent {
    PageContent {
        page_number: n,
        content: text.to_string(),
        source_file: "paper.pdf".to_string(),
    }
}

fn origin(byte_size: u64) -> EntryOrigin<'static> {
    EntryOrigin {
        source_name: "paper.pdf",
        byte_size,
        processing_time_secs: 0.25,
    }
}

#[tokio::test]
async fn round_trip_and_access_tracking() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let fp = fingerprint(b"document bytes", None);
    let payload = CachePayload::Document(vec![page(1, "Intro"), page(2, "Method")]);

    assert!(!store.has(&fp, CacheLevel::FullDocument).await);
    assert!(store.put(&fp, EntryScope::FullDocument, &payload, origin(14)).await);
    assert!(store.has(&fp, CacheLevel::FullDocument).await);
    assert!(!store.has(&fp, CacheLevel::Page).await);

    assert_eq!(store.entry(&fp).await.unwrap().unwrap().access_count, 0);
    for expected in 1..=3 {
        assert_eq!(store.get(&fp, CacheLevel::FullDocument).await, Some(payload.clone()));
        let entry = store.entry(&fp).await.unwrap().unwrap();
        assert_eq!(entry.access_count, expected);
        assert!(entry.last_accessed_at >= entry.created_at);
    }

    // Wrong level is a miss and does not count as an access
    assert!(store.get(&fp, CacheLevel::Page).await.is_none());
    assert_eq!(store.entry(&fp).await.unwrap().unwrap().access_count, 3);
}

#[tokio::test]
async fn page_entry_records_parent() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let parent = fingerprint(b"doc", None);
    let fp = fingerprint(b"page two", Some("page_2"));
    let scope = EntryScope::Page {
        page_number: 2,
        parent: parent.clone(),
    };

    assert!(store.put(&fp, scope.clone(), &CachePayload::Page(page(2, "text")), origin(8)).await);
    let entry = store.entry(&fp).await.unwrap().unwrap();
    assert_eq!(entry.scope, scope);
    assert_eq!(entry.level(), CacheLevel::Page);
    assert_eq!(entry.byte_size, 8);
    assert!(entry.content_char_length > 0);
    assert!(store
        .artifact_path(&fp, CacheLevel::Page)
        .starts_with(tmp.path().join("pages")));
}

#[tokio::test]
async fn corrupt_artifact_is_removed_on_read() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let fp = fingerprint(b"doc", None);
    let payload = CachePayload::Document(vec![page(1, "Some extracted text")]);
    assert!(store.put(&fp, EntryScope::FullDocument, &payload, origin(3)).await);

    let path = store.artifact_path(&fp, CacheLevel::FullDocument);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(store.get(&fp, CacheLevel::FullDocument).await.is_none());
    assert!(!store.has(&fp, CacheLevel::FullDocument).await);
    assert!(!path.exists());
    assert!(store.entry(&fp).await.unwrap().is_none());
}

#[tokio::test]
async fn tampered_envelope_is_removed_on_read() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let other = fingerprint(b"another document", None);

    for bad_key in [serde_json::json!("ab"), serde_json::json!(other.as_str()), serde_json::json!(42)] {
        let fp = fingerprint(b"doc", None);
        let payload = CachePayload::Document(vec![page(1, "text")]);
        assert!(store.put(&fp, EntryScope::FullDocument, &payload, origin(3)).await);

        let path = store.artifact_path(&fp, CacheLevel::FullDocument);
        let mut envelope: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        envelope["fingerprint"] = bad_key;
        fs::write(&path, serde_json::to_vec(&envelope).unwrap()).unwrap();

        assert!(store.get(&fp, CacheLevel::FullDocument).await.is_none());
        assert!(!store.has(&fp, CacheLevel::FullDocument).await);
        assert!(store.entry(&fp).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn put_overwrites_existing_entry() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let fp = fingerprint(b"doc", None);
    let first = CachePayload::Document(vec![page(1, "first")]);
    let second = CachePayload::Document(vec![page(1, "second")]);

    assert!(store.put(&fp, EntryScope::FullDocument, &first, origin(3)).await);
    store.get(&fp, CacheLevel::FullDocument).await;
    assert!(store.put(&fp, EntryScope::FullDocument, &second, origin(3)).await);

    assert_eq!(store.entry(&fp).await.unwrap().unwrap().access_count, 0);
    assert_eq!(store.get(&fp, CacheLevel::FullDocument).await, Some(second));
    assert_eq!(store.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_puts_for_same_fingerprint() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let fp = fingerprint(b"doc", None);
    let payload = CachePayload::Document(vec![page(1, "same result")]);

    let (a, b) = tokio::join!(
        store.put(&fp, EntryScope::FullDocument, &payload, origin(3)),
        store.put(&fp, EntryScope::FullDocument, &payload, origin(3)),
    );
    assert!(a && b);
    assert_eq!(store.get(&fp, CacheLevel::FullDocument).await, Some(payload));
}

#[tokio::test]
async fn cleanup_removes_rarely_used_entries() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;

    let mut fps = Vec::new();
    for (i, reads) in [0u64, 1, 5].into_iter().enumerate() {
        let fp = fingerprint(format!("doc {}", i).as_bytes(), None);
        let payload = CachePayload::Document(vec![page(1, "text")]);
        assert!(store.put(&fp, EntryScope::FullDocument, &payload, origin(10)).await);
        for _ in 0..reads {
            store.get(&fp, CacheLevel::FullDocument).await.unwrap();
        }
        fps.push(fp);
    }

    let removed = store
        .cleanup(CleanupCriteria {
            older_than_days: 9999,
            min_access_count: 2,
            max_size_bytes: None,
        })
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert!(!store.has(&fps[0], CacheLevel::FullDocument).await);
    assert!(!store.has(&fps[1], CacheLevel::FullDocument).await);
    assert!(store.has(&fps[2], CacheLevel::FullDocument).await);
}

#[tokio::test]
async fn cleanup_by_size() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let small = fingerprint(b"small", None);
    let large = fingerprint(b"large", None);
    let payload = CachePayload::Document(vec![page(1, "text")]);
    store.put(&small, EntryScope::FullDocument, &payload, origin(100)).await;
    store.put(&large, EntryScope::FullDocument, &payload, origin(10 * 1024 * 1024)).await;

    let removed = store
        .cleanup(CleanupCriteria {
            older_than_days: 9999,
            min_access_count: 0,
            max_size_bytes: Some(5 * 1024 * 1024),
        })
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(store.has(&small, CacheLevel::FullDocument).await);
    assert!(!store.has(&large, CacheLevel::FullDocument).await);
}

#[tokio::test]
async fn stats_and_recommendations() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let doc = fingerprint(b"doc", None);
    store
        .put(
            &doc,
            EntryScope::FullDocument,
            &CachePayload::Document(vec![page(1, "a"), page(2, "b")]),
            origin(6 * 1024 * 1024),
        )
        .await;
    for n in 1..=2u32 {
        let fp = fingerprint(format!("page {}", n).as_bytes(), Some(&format!("page_{}", n)));
        store
            .put(
                &fp,
                EntryScope::Page {
                    page_number: n,
                    parent: doc.clone(),
                },
                &CachePayload::Page(page(n, "x")),
                origin(1000),
            )
            .await;
    }
    store.get(&doc, CacheLevel::FullDocument).await.unwrap();
    store.record_hit(CacheLevel::FullDocument);
    store.record_miss(CacheLevel::Page);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.full_document.entries, 1);
    assert_eq!(stats.full_document.total_accesses, 1);
    assert_eq!(stats.page.entries, 2);
    assert_eq!(stats.page.total_bytes, 2000);
    assert_eq!(stats.overall.entries, 3);
    assert!((stats.overall.avg_processing_secs - 0.25).abs() < 1e-9);
    assert_eq!(stats.session.calls_avoided, 1);
    assert_eq!(stats.session.misses, 1);

    let rec = store.recommendations().await.unwrap();
    assert_eq!(rec.total_entries, 3);
    assert_eq!(rec.low_access_entries, 3);
    assert_eq!(rec.large_entries, 1);
    assert_eq!(rec.stale_entries, 0);
    assert_eq!(rec.advice.len(), 2);
}

#[tokio::test]
async fn list_filters_by_level() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let doc = fingerprint(b"doc", None);
    store
        .put(&doc, EntryScope::FullDocument, &CachePayload::Document(vec![]), origin(3))
        .await;
    let fp = fingerprint(b"p", Some("page_1"));
    store
        .put(
            &fp,
            EntryScope::Page {
                page_number: 1,
                parent: doc.clone(),
            },
            &CachePayload::Page(page(1, "p")),
            origin(1),
        )
        .await;

    assert_eq!(store.list(None).await.unwrap().len(), 2);
    let pages = store.list(Some(CacheLevel::Page)).await.unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].fingerprint, fp);
}

#[tokio::test]
async fn remove_leaves_page_entries_of_document() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let doc = fingerprint(b"doc", None);
    let fp = fingerprint(b"p", Some("page_1"));
    store
        .put(&doc, EntryScope::FullDocument, &CachePayload::Document(vec![page(1, "p")]), origin(3))
        .await;
    store
        .put(
            &fp,
            EntryScope::Page {
                page_number: 1,
                parent: doc.clone(),
            },
            &CachePayload::Page(page(1, "p")),
            origin(1),
        )
        .await;

    assert!(store.remove(&doc).await);
    assert!(!store.remove(&doc).await);
    assert!(store.has(&fp, CacheLevel::Page).await);
}

#[tokio::test]
async fn prune_reconciles_index_and_artifacts() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(tmp.path()).await;
    let kept = fingerprint(b"kept", None);
    let dangling = fingerprint(b"dangling", None);
    let payload = CachePayload::Document(vec![page(1, "x")]);
    store.put(&kept, EntryScope::FullDocument, &payload, origin(4)).await;
    store.put(&dangling, EntryScope::FullDocument, &payload, origin(8)).await;

    fs::remove_file(store.artifact_path(&dangling, CacheLevel::FullDocument)).unwrap();
    let stray = tmp.path().join("pages").join(format!("{}.json", fingerprint(b"stray", None)));
    fs::write(&stray, b"{}").unwrap();

    let report = store.prune_orphans().await.unwrap();
    assert_eq!(report.dangling_rows, 1);
    assert_eq!(report.orphan_artifacts, 1);
    assert!(!stray.exists());
    assert!(store.has(&kept, CacheLevel::FullDocument).await);
    assert_eq!(store.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reopening_keeps_entries() {
    let tmp = TempDir::new().unwrap();
    let fp = fingerprint(b"doc", None);
    let payload = CachePayload::Document(vec![page(1, "persisted")]);
    {
        let store = open_store(tmp.path()).await;
        assert!(store.put(&fp, EntryScope::FullDocument, &payload, origin(3)).await);
        store.close().await;
    }
    let store = open_store(tmp.path()).await;
    assert_eq!(store.get(&fp, CacheLevel::FullDocument).await, Some(payload));
    assert_eq!(store.session().hits, 0);
}

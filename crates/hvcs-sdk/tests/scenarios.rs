//! End-to-end behavior of an on-disk repository.

use std::collections::HashSet;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use hvcs_sdk::{
    CommitOptions, FeedbackRecord, IngestRequest, ObjectId, RepoConfig, Repository, SdkError,
    StateValue,
};
use hvcs_store::{FsObjectStore, ObjectStore, StoreConfig};

fn repo() -> (tempfile::TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    (dir, repo)
}

#[test]
fn stage_commit_history_and_version() {
    let (_dir, repo) = repo();
    repo.stage("a.txt", b"hello").unwrap();
    let h1 = repo.commit("init", "alice").unwrap();

    let history: Vec<ObjectId> = repo
        .get_history(Some("main"), None)
        .unwrap()
        .map(|entry| entry.unwrap().commit_hash)
        .collect();
    assert_eq!(history, vec![h1]);

    let version = repo.get_version(&h1).unwrap();
    assert_eq!(version.len(), 1);
    assert_eq!(version["a.txt"], b"hello".to_vec());
}

#[test]
fn duplicate_puts_write_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsObjectStore::open(dir.path(), StoreConfig::default()).unwrap();
    let content = vec![7u8; 10_000];

    let first = store.put(&content).unwrap();
    let after_first = store.stats();
    let second = store.put(&content).unwrap();
    let after_second = store.stats();

    assert_eq!(first, second);
    assert_eq!(after_first.bytes_written, after_second.bytes_written);
    assert_eq!(after_second.dedup_hits, 1);
    assert_eq!(store.get(&first).unwrap(), content);
}

#[test]
fn corrupted_blob_is_an_integrity_error() {
    let (_dir, repo) = repo();
    let id = repo.stage("doc.txt", b"original contents, long enough to matter").unwrap();
    let h1 = repo.commit("add doc", "alice").unwrap();

    let path = repo
        .root()
        .join("objects")
        .join(&id.to_hex()[..2])
        .join(format!("{}.blob", id.to_hex()));
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let err = repo.get_version(&h1).unwrap_err();
    assert!(matches!(err, SdkError::Integrity(_)), "{err:?}");
}

#[test]
fn history_length_matches_depth() {
    let (_dir, repo) = repo();
    let mut tips = Vec::new();
    for n in 0..6 {
        repo.stage("counter", n.to_string().as_bytes()).unwrap();
        tips.push(repo.commit(&format!("step {n}"), "bot").unwrap());
    }

    let entries: Vec<_> = repo
        .get_history(None, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 6);
    assert_eq!(entries.last().unwrap().parent_hash, None);
    let newest_first: Vec<ObjectId> = tips.iter().rev().copied().collect();
    let walked: Vec<ObjectId> = entries.iter().map(|e| e.commit_hash).collect();
    assert_eq!(walked, newest_first);

    let limited = repo.get_history(None, Some(2)).unwrap();
    let restarted = limited.clone();
    assert_eq!(limited.count(), 2);
    assert_eq!(restarted.count(), 2);
    assert_eq!(repo.status().unwrap().history_length, 6);
}

#[test]
fn repeated_ingest_is_idempotent() {
    let (_dir, repo) = repo();
    let request = IngestRequest::new("pages/a.html", b"<p>a</p>".to_vec(), "ext", "save", "browser-ext");
    let first = repo.ingest(request.clone()).unwrap();
    let second = repo.ingest(request).unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.commit_hash, second.commit_hash);
    assert_eq!(repo.get_history(None, None).unwrap().count(), 1);
}

#[test]
fn concurrent_commits_form_a_single_chain() {
    let (_dir, repo) = repo();
    repo.stage("seed", b"0").unwrap();
    let seed = repo.commit("seed", "alice").unwrap();
    let repo = Arc::new(repo);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|n| {
            let repo = Arc::clone(&repo);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let request = IngestRequest::new(
                    format!("writer-{n}.txt"),
                    format!("payload {n}").into_bytes(),
                    format!("writer-{n}"),
                    "concurrent write",
                    format!("thread-{n}"),
                );
                barrier.wait();
                repo.ingest(request).unwrap()
            })
        })
        .collect();
    let receipts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(receipts.iter().all(|r| r.created));
    let entries: Vec<_> = repo
        .get_history(None, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[2].commit_hash, seed);
    assert_eq!(entries[1].parent_hash, Some(seed));
    assert_eq!(entries[0].parent_hash, Some(entries[1].commit_hash));

    let head = repo.head_commit().unwrap().unwrap();
    let files = repo.get_version(&head).unwrap();
    assert!(files.contains_key("writer-0.txt"));
    assert!(files.contains_key("writer-1.txt"));
}

#[test]
fn many_producers_ingest_without_losing_writes() {
    let dir = tempfile::tempdir().unwrap();
    let config = RepoConfig {
        max_commit_retries: 50,
        ..RepoConfig::default()
    };
    let repo = Arc::new(Repository::init_with_config(dir.path(), config).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let repo = Arc::clone(&repo);
            thread::spawn(move || {
                (0..5)
                    .map(|i| {
                        let request = IngestRequest::new(
                            format!("p{n}/item{i}"),
                            format!("{n}:{i}").into_bytes(),
                            "crawler",
                            "crawl",
                            format!("worker-{n}"),
                        );
                        repo.ingest(request).unwrap().commit_hash
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let commits: HashSet<ObjectId> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(commits.len(), 40);

    let status = repo.status().unwrap();
    assert_eq!(status.history_length, 40);
    let head = status.head_commit_hash.unwrap();
    assert_eq!(repo.get_version(&head).unwrap().len(), 40);
}

#[test]
fn concurrent_commit_calls_both_land() {
    let (_dir, repo) = repo();
    let repo = Arc::new(repo);
    for round in 0..10 {
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|n| {
                let repo = Arc::clone(&repo);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let path = format!("round{round}/writer{n}.txt");
                    repo.stage(&path, path.as_bytes()).unwrap();
                    barrier.wait();
                    repo.commit(&format!("round {round} writer {n}"), "bot")
                })
            })
            .collect();
        for handle in handles {
            // A writer whose entry the other writer already committed has
            // nothing left to commit.
            match handle.join().unwrap() {
                Ok(_) | Err(SdkError::NoChanges(_)) => {}
                Err(e) => panic!("commit failed: {e:?}"),
            }
        }
    }

    let head = repo.head_commit().unwrap().unwrap();
    assert_eq!(repo.get_version(&head).unwrap().len(), 20);
    assert!(repo.staged().unwrap().is_empty());
}

#[test]
fn two_handles_on_one_directory_lose_no_commits() {
    let dir = tempfile::tempdir().unwrap();
    let config = RepoConfig {
        max_commit_retries: 100,
        ..RepoConfig::default()
    };
    drop(Repository::init_with_config(dir.path(), config).unwrap());
    let handles: Vec<Arc<Repository>> = (0..2)
        .map(|_| Arc::new(Repository::open(dir.path()).unwrap()))
        .collect();

    let workers: Vec<_> = (0..8)
        .map(|n| {
            let repo = Arc::clone(&handles[n % 2]);
            thread::spawn(move || {
                (0..10)
                    .map(|i| {
                        let request = IngestRequest::new(
                            format!("h{}/w{n}/item{i}", n % 2),
                            format!("{n}:{i}").into_bytes(),
                            "crawler",
                            "crawl",
                            format!("worker-{n}"),
                        );
                        repo.ingest(request).unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let receipts: Vec<_> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();
    assert!(receipts.iter().all(|r| r.created));

    let fresh = Repository::open(dir.path()).unwrap();
    let status = fresh.status().unwrap();
    assert_eq!(status.history_length, 80);
    let head = status.head_commit_hash.unwrap();
    assert_eq!(fresh.get_version(&head).unwrap().len(), 80);
    let chain: HashSet<ObjectId> = fresh
        .get_history(None, None)
        .unwrap()
        .map(|entry| entry.unwrap().commit_hash)
        .collect();
    assert!(receipts.iter().all(|r| chain.contains(&r.commit_hash)));
}

#[test]
fn staging_carries_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    {
        let repo = Repository::init(dir.path()).unwrap();
        repo.stage("draft.md", b"first draft").unwrap();
        repo.stage("notes.md", b"notes").unwrap();
    }
    {
        let repo = Repository::open(dir.path()).unwrap();
        assert_eq!(repo.staged().unwrap().len(), 2);
        repo.unstage("notes.md").unwrap();
    }

    let repo = Repository::open(dir.path()).unwrap();
    let commit = repo.commit("draft", "alice").unwrap();
    let files = repo.get_version(&commit).unwrap();
    assert_eq!(files.keys().collect::<Vec<_>>(), vec!["draft.md"]);
    drop(repo);

    let repo = Repository::open(dir.path()).unwrap();
    assert!(repo.staged().unwrap().is_empty());
    repo.create_branch("dev", None).unwrap();
    repo.stage("wip.md", b"wip").unwrap();
    repo.checkout("dev", true).unwrap();
    drop(repo);

    let repo = Repository::open(dir.path()).unwrap();
    repo.checkout("main", false).unwrap();
    assert!(repo.staged().unwrap().is_empty());
}

#[test]
fn losing_committer_sees_concurrent_modification() {
    let (_dir, repo) = repo();
    let a = repo.objects().put(b"a").unwrap();
    let b = repo.objects().put(b"b").unwrap();
    let mut left = hvcs_index::StagingArea::new();
    left.stage("left", a, 1).unwrap();
    let mut right = hvcs_index::StagingArea::new();
    right.stage("right", b, 1).unwrap();

    let opts = CommitOptions::new("race", "both");
    let p1 = repo.prepare_commit("main", &left, &opts).unwrap();
    let p2 = repo.prepare_commit("main", &right, &opts).unwrap();
    repo.finalize_commit(p1).unwrap();
    let err = repo.finalize_commit(p2).unwrap_err();
    assert!(err.is_retryable());

    // Recomputing against the new head succeeds.
    let p2 = repo.prepare_commit("main", &right, &opts).unwrap();
    let tip = repo.finalize_commit(p2).unwrap();
    assert_eq!(repo.get_version(&tip).unwrap().len(), 2);
}

#[test]
fn state_roundtrip_and_size_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = RepoConfig {
        max_state_size: 256,
        ..RepoConfig::default()
    };
    let repo = Repository::init_with_config(dir.path(), config).unwrap();

    let value = StateValue::from_json(r#"{"depth": 3, "seeds": ["a", "b"], "active": true}"#).unwrap();
    repo.save_state("crawler_config", &value).unwrap();
    assert_eq!(repo.load_state("crawler_config").unwrap(), value);

    let huge = StateValue::from("x".repeat(1024));
    let err = repo.save_state("crawler_config", &huge).unwrap_err();
    assert!(matches!(err, SdkError::SizeLimitExceeded { .. }), "{err:?}");
    assert_eq!(repo.load_state("crawler_config").unwrap(), value);
}

#[test]
fn feedback_links_to_commits() {
    let (_dir, repo) = repo();
    repo.stage("model.bin", b"weights").unwrap();
    let h1 = repo.commit("train", "alice").unwrap();

    let params = StateValue::from_json(r#"{"epochs": 4}"#).unwrap();
    repo.record_feedback(&FeedbackRecord::new(8, "training", params.clone(), h1))
        .unwrap();
    repo.record_feedback(&FeedbackRecord::new(2, "ui", StateValue::Null, h1))
        .unwrap();

    let training = repo.feedback_for_commit(&h1, Some("training")).unwrap();
    assert_eq!(training.len(), 1);
    assert_eq!(training[0].params, params);
    assert_eq!(repo.feedback_for_commit(&h1, None).unwrap().len(), 2);

    let missing = ObjectId::from_bytes(b"no such commit");
    let err = repo
        .record_feedback(&FeedbackRecord::new(8, "training", params, missing))
        .unwrap_err();
    assert!(matches!(err, SdkError::NotFound(_)));
}

#[test]
fn reopened_repository_keeps_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (commit, feature) = {
        let repo = Repository::init(dir.path()).unwrap();
        repo.stage("a", b"1").unwrap();
        let commit = repo.commit("one", "alice").unwrap();
        let feature = repo.create_branch("feature/x", None).unwrap();
        repo.save_state("cursor", &StateValue::from(42i64)).unwrap();
        (commit, feature)
    };

    let repo = Repository::open(dir.path()).unwrap();
    assert_eq!(repo.head_commit().unwrap(), Some(commit));
    assert_eq!(repo.resolve("feature/x").unwrap(), feature);
    assert_eq!(repo.load_state("cursor").unwrap(), StateValue::from(42i64));
    let names: Vec<String> = repo.list_branches().unwrap().into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["feature/x", "main"]);
}

#[test]
fn large_blobs_roundtrip_through_worker_pool() {
    let (_dir, repo) = repo();
    let big: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 97) as u8).collect();
    repo.stage("big.bin", &big).unwrap();
    let commit = repo.commit("big", "alice").unwrap();
    assert_eq!(repo.read_file(&commit, "big.bin").unwrap(), big);

    let stats = repo.stats().compression();
    assert!(stats.ratio() > 1.0);
}

mod common;

use common::{FlakyIndex, open_depot, staging_files, stored_files, test_config};
use depot_core::ContentHash;
use depot_core::config::IndexConfig;
use depot_ingest::{Depot, IngestError, Ingested, ListOrder};
use depot_metadata::{JsonFileIndex, MetadataIndex};
use depot_storage::{ByteStream, StorageError};
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_ingest_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("notes.txt", "hello").await.unwrap();

    assert_eq!(record.original_name, "notes.txt");
    assert_eq!(record.extension, "txt");
    assert_eq!(record.content_hash, ContentHash::compute(b"hello"));
    assert_eq!(record.id.as_str().len(), 32);

    let (a, b) = record.id.shard();
    let expected = dir
        .path()
        .join("uploads")
        .join(a)
        .join(b)
        .join(format!("{}.txt", record.id));
    assert_eq!(record.stored_path, expected);
    assert_eq!(std::fs::read(&record.stored_path).unwrap(), b"hello");
    assert!(staging_files(depot.root()).is_empty());
}

#[tokio::test]
async fn test_extensionless_file_stored_when_listed() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.policy.allowed_extensions.push(String::new());
    let depot = Depot::open(config).await.unwrap();

    let record = depot.ingest_bytes("README", "read me").await.unwrap();
    assert_eq!(record.extension, "");

    let (a, b) = record.id.shard();
    let expected = dir
        .path()
        .join("uploads")
        .join(a)
        .join(b)
        .join(record.id.to_string());
    assert_eq!(record.stored_path, expected);
    assert_eq!(std::fs::read(&expected).unwrap(), b"read me");
}

#[tokio::test]
async fn test_extension_is_lowercased() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("Scan.Final.PDF", "%PDF-1.4").await.unwrap();
    assert_eq!(record.extension, "pdf");
    assert_eq!(record.original_name, "Scan.Final.PDF");
    assert!(record.stored_path.to_string_lossy().ends_with(".pdf"));
}

#[tokio::test]
async fn test_denied_extension_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let err = depot
        .ingest_bytes("payload.exe", vec![0x4d, 0x5a, 0x90, 0x00])
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedType { .. }), "{err:?}");

    assert!(depot.list_all().await.unwrap().is_empty());
    assert!(stored_files(depot.root()).is_empty());
    assert!(staging_files(depot.root()).is_empty());
}

#[tokio::test]
async fn test_unlisted_and_missing_extensions_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    for name in ["archive.zip", "README", "trailing."] {
        let err = depot.ingest_bytes(name, "data").await.unwrap_err();
        assert!(
            matches!(err, IngestError::UnsupportedType { .. }),
            "{name}: {err:?}"
        );
    }
    assert!(depot.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_content_under_new_name() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let first = depot.ingest_bytes("a.txt", "same bytes").await.unwrap();
    let files_before = stored_files(depot.root());

    let err = depot.ingest_bytes("b.txt", "same bytes").await.unwrap_err();
    match &err {
        IngestError::DuplicateContent { existing } => {
            assert_eq!(existing.id, first.id);
            assert_eq!(existing.original_name, "a.txt");
        }
        other => panic!("expected DuplicateContent, got {other:?}"),
    }
    assert_eq!(err.existing_record().map(|r| &r.id), Some(&first.id));

    assert_eq!(depot.list_all().await.unwrap().len(), 1);
    assert_eq!(stored_files(depot.root()), files_before);
    assert!(staging_files(depot.root()).is_empty());
}

#[tokio::test]
async fn test_duplicate_across_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    depot.ingest_bytes("data.txt", "x,y\n1,2\n").await.unwrap();
    let err = depot.ingest_bytes("data.doc", "x,y\n1,2\n").await.unwrap_err();
    assert!(matches!(err, IngestError::DuplicateContent { .. }));
}

#[tokio::test]
async fn test_ingest_or_existing_reports_existing() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let first = depot
        .ingest_or_existing("one.txt", depot_storage::bytes_stream("content".into()))
        .await
        .unwrap();
    assert!(first.is_created());

    let second = depot
        .ingest_or_existing("two.txt", depot_storage::bytes_stream("content".into()))
        .await
        .unwrap();
    assert!(matches!(second, Ingested::Existing(_)));
    assert_eq!(second.record().id, first.record().id);
    assert_eq!(depot.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_upload_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("empty.txt", "").await.unwrap();
    assert_eq!(record.content_hash, ContentHash::compute(b""));
    assert_eq!(std::fs::metadata(&record.stored_path).unwrap().len(), 0);
}

#[tokio::test]
async fn test_ingest_file_uses_own_name() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;
    let source = dir.path().join("report.pdf");
    std::fs::write(&source, b"%PDF-1.7 body").unwrap();

    let outcome = depot.ingest_file(&source, None, false).await.unwrap();
    assert_eq!(outcome.record().original_name, "report.pdf");
    assert!(source.exists());

    let renamed = depot
        .ingest_file(&source, Some("copy.pdf"), true)
        .await
        .unwrap();
    assert!(matches!(renamed, Ingested::Existing(_)));

    let err = depot.ingest_file(&source, None, false).await.unwrap_err();
    assert!(matches!(err, IngestError::DuplicateContent { .. }));
}

#[tokio::test]
async fn test_fetch_known_and_unknown() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;
    let record = depot.ingest_bytes("photo.png", vec![0x89, b'P', b'N', b'G']).await.unwrap();

    let (path, fetched) = depot.fetch(record.id.as_str()).await.unwrap();
    assert_eq!(path, record.stored_path);
    assert_eq!(fetched, record);

    for missing in ["00000000000000000000000000000000", "not-an-id", ""] {
        let err = depot.fetch(missing).await.unwrap_err();
        assert!(matches!(err, IngestError::NotFound(_)), "{missing}: {err:?}");
    }
}

#[tokio::test]
async fn test_restart_preserves_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut ids = Vec::new();
    {
        let depot = open_depot(dir.path()).await;
        for n in 0..10 {
            let record = depot
                .ingest_bytes(&format!("f{n}.txt"), format!("payload {n}"))
                .await
                .unwrap();
            ids.push(record.id);
        }
    }

    let depot = open_depot(dir.path()).await;
    let mut listed: Vec<_> = depot
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    listed.sort();
    ids.sort();
    assert_eq!(listed, ids);

    // Dedup survives the restart.
    let err = depot.ingest_bytes("again.txt", "payload 3").await.unwrap_err();
    assert!(matches!(err, IngestError::DuplicateContent { .. }));
}

#[tokio::test]
async fn test_sqlite_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.index = IndexConfig::Sqlite {
        path: dir.path().join("metadata.db"),
        busy_timeout_secs: 5,
    };

    let record = {
        let depot = Depot::open(config.clone()).await.unwrap();
        depot.ingest_bytes("notes.txt", "hello").await.unwrap()
    };

    let depot = Depot::open(config).await.unwrap();
    let (_, fetched) = depot.fetch(record.id.as_str()).await.unwrap();
    assert_eq!(fetched.content_hash, record.content_hash);
    assert!(matches!(
        depot.ingest_bytes("hello.txt", "hello").await.unwrap_err(),
        IngestError::DuplicateContent { .. }
    ));
}

#[tokio::test]
async fn test_delete_then_reingest() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("notes.txt", "hello").await.unwrap();
    let deleted = depot.delete(record.id.as_str()).await.unwrap();
    assert_eq!(deleted.id, record.id);
    assert!(!record.stored_path.exists());
    assert!(stored_files(depot.root()).is_empty());
    assert!(matches!(
        depot.fetch(record.id.as_str()).await.unwrap_err(),
        IngestError::NotFound(_)
    ));
    assert!(matches!(
        depot.delete(record.id.as_str()).await.unwrap_err(),
        IngestError::NotFound(_)
    ));

    let again = depot.ingest_bytes("notes.txt", "hello").await.unwrap();
    assert_ne!(again.id, record.id);
    assert_eq!(again.content_hash, record.content_hash);
}

#[tokio::test]
async fn test_delete_tolerates_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("notes.txt", "gone").await.unwrap();
    std::fs::remove_file(&record.stored_path).unwrap();

    depot.delete(record.id.as_str()).await.unwrap();
    assert!(depot.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_detects_tampering() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let record = depot.ingest_bytes("notes.txt", "original").await.unwrap();
    depot.verify(record.id.as_str()).await.unwrap();

    std::fs::write(&record.stored_path, b"tampered").unwrap();
    let err = depot.verify(record.id.as_str()).await.unwrap_err();
    assert!(
        matches!(err, IngestError::Storage(StorageError::HashMismatch { .. })),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_list_sorted_by_name() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    for name in ["c.txt", "a.txt", "b.txt"] {
        depot.ingest_bytes(name, name.to_string()).await.unwrap();
    }

    let names: Vec<_> = depot
        .list_sorted(ListOrder::Name)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.original_name)
        .collect();
    assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);

    let newest = depot.list_sorted(ListOrder::NewestFirst).await.unwrap();
    let oldest = depot.list_sorted(ListOrder::OldestFirst).await.unwrap();
    assert!(newest.first().unwrap().created_at >= newest.last().unwrap().created_at);
    assert!(oldest.first().unwrap().created_at <= oldest.last().unwrap().created_at);
}

#[tokio::test]
async fn test_size_limit_rejects_upload() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ingest.max_object_bytes = Some(8);
    let depot = Depot::open(config).await.unwrap();

    depot.ingest_bytes("small.txt", "12345678").await.unwrap();
    let err = depot.ingest_bytes("big.txt", "123456789").await.unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { limit: 8 }), "{err:?}");
    assert!(staging_files(depot.root()).is_empty());
    assert_eq!(depot.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_stream_error_aborts_ingest() {
    let dir = tempfile::tempdir().unwrap();
    let depot = open_depot(dir.path()).await;

    let content: ByteStream = Box::pin(futures::stream::iter(vec![
        Ok(bytes::Bytes::from_static(b"partial")),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "client went away",
        )),
    ]));
    let err = depot.ingest("notes.txt", content).await.unwrap_err();
    assert!(matches!(err, IngestError::Storage(StorageError::Io(_))), "{err:?}");
    assert!(staging_files(depot.root()).is_empty());
    assert!(stored_files(depot.root()).is_empty());
}

#[tokio::test]
async fn test_failed_insert_removes_moved_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let inner: Arc<dyn MetadataIndex> =
        Arc::new(JsonFileIndex::open(config.index.path()).await.unwrap());
    let flaky = Arc::new(FlakyIndex::new(inner));
    let depot = Depot::with_index(config, flaky.clone()).await.unwrap();

    let err = depot.ingest_bytes("notes.txt", "hello").await.unwrap_err();
    assert!(matches!(err, IngestError::Index(_)), "{err:?}");
    assert!(stored_files(depot.root()).is_empty());
    assert!(staging_files(depot.root()).is_empty());
    assert!(depot.list_all().await.unwrap().is_empty());

    flaky.fail_inserts.store(false, Ordering::SeqCst);
    depot.ingest_bytes("notes.txt", "hello").await.unwrap();
    assert_eq!(stored_files(depot.root()).len(), 1);
}

#[tokio::test]
async fn test_open_purges_stale_staging_files() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("uploads").join(".staging");
    std::fs::create_dir_all(&staging).unwrap();
    std::fs::write(staging.join("leftover.part"), b"crashed upload").unwrap();

    let depot = open_depot(dir.path()).await;
    assert!(staging_files(depot.root()).is_empty());
}

#[tokio::test]
async fn test_invalid_config_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.ingest.io_chunk_size = 0;
    let err = Depot::open(config).await.err().unwrap();
    assert!(matches!(err, IngestError::Config(_)), "{err:?}");
}

#[tokio::test]
async fn test_corrupt_index_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("file_metadata.json"), "not json").unwrap();
    let err = Depot::open(test_config(dir.path())).await.err().unwrap();
    assert!(
        matches!(
            err,
            IngestError::Index(depot_metadata::MetadataError::Corrupt { .. })
        ),
        "{err:?}"
    );
}

//! Blob store behaviour: round trips, deduplication, reference lifecycle
//! and inline placement.

use std::sync::Arc;

use logvault_core::BlobHash;
use logvault_storage::{
    BlobPlacement, BlobStore, BlobStoreConfig, Compression, RedbStorage, RedbStorageConfig,
};
use tempfile::TempDir;

const THRESHOLD: usize = 1024;

fn create_test_store(compression: Compression) -> (BlobStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Arc::new(
        RedbStorage::open(RedbStorageConfig {
            db_path: temp_dir.path().join("blobs.redb"),
            ..Default::default()
        })
        .unwrap(),
    );
    let config = BlobStoreConfig {
        base_dir: temp_dir.path().join("blobs"),
        inline_threshold: THRESHOLD,
        compression,
        ..Default::default()
    };
    (BlobStore::open(config, db).unwrap(), temp_dir)
}

/// Incompressible bytes derived from a seed
fn noise(seed: &[u8], len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    blake3::Hasher::new()
        .update(seed)
        .finalize_xof()
        .fill(&mut buf);
    buf
}

#[test]
fn round_trip_empty_inline_and_external() {
    let (store, _temp) = create_test_store(Compression::default());

    for payload in [Vec::new(), noise(b"inline", 300), noise(b"external", 200_000)] {
        let handle = store.put(&payload).unwrap();
        assert_eq!(handle.hash, BlobHash::of(&payload));
        assert_eq!(handle.decompressed_size, payload.len() as u64);
        assert_eq!(&store.get(&handle.hash).unwrap()[..], &payload[..]);
    }
}

#[test]
fn concurrent_puts_converge_on_one_handle() {
    let (store, _temp) = create_test_store(Compression::default());
    let payload = noise(b"shared", 64 * 1024);

    let handles: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| store.put(&payload).unwrap()))
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(handles[0].hash, handles[1].hash);
    let mut counts: Vec<u32> = handles.iter().map(|h| h.ref_count).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);

    let stored = store.handle(&handles[0].hash).unwrap().unwrap();
    assert_eq!(stored.ref_count, 2);
    assert_eq!(store.list().unwrap().len(), 1);
    assert_eq!(store.stats().unwrap().stored_bytes, stored.size);
}

#[test]
fn release_lifecycle_removes_backing_storage() {
    let (store, _temp) = create_test_store(Compression::default());

    for payload in [noise(b"small", 100), noise(b"large", 10_000)] {
        let first = store.put(&payload).unwrap();
        store.put(&payload).unwrap();
        store.put(&payload).unwrap();
        let path = store.blob_path(&first.hash);

        assert_eq!(store.release(&first.hash).unwrap().unwrap().ref_count, 2);
        assert_eq!(store.release(&first.hash).unwrap().unwrap().ref_count, 1);
        assert!(store.get(&first.hash).is_ok());
        assert!(store.release(&first.hash).unwrap().is_none());

        assert!(!store.exists(&first.hash).unwrap());
        assert!(!path.exists());
        assert!(store.get(&first.hash).unwrap_err().is_not_found());
        assert!(store.release(&first.hash).unwrap_err().is_not_found());
    }
}

#[test]
fn threshold_boundary_is_inclusive() {
    for compression in [Compression::None, Compression::default()] {
        let (store, _temp) = create_test_store(compression);

        let at = store.put(&noise(b"at", THRESHOLD)).unwrap();
        assert_eq!(at.placement, BlobPlacement::Inline);
        assert!(!store.blob_path(&at.hash).exists());

        let over = store.put(&noise(b"over", THRESHOLD + 1)).unwrap();
        assert_eq!(over.placement, BlobPlacement::External);
        assert!(store.blob_path(&over.hash).exists());
    }
}

#[test]
fn compressible_payloads_shrink_on_disk() {
    let (store, _temp) = create_test_store(Compression::Zstd { level: 3 });
    let payload = b"{\"status\":\"ok\"}".repeat(1000);

    let handle = store.put(&payload).unwrap();
    assert_eq!(handle.placement, BlobPlacement::External);
    assert!(handle.size < handle.decompressed_size);
    assert_eq!(
        std::fs::metadata(store.blob_path(&handle.hash)).unwrap().len(),
        handle.size
    );
    assert_eq!(&store.get(&handle.hash).unwrap()[..], &payload[..]);
}

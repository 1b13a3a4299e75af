use std::{
    collections::HashSet,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    task::Poll,
};

use anyhow::anyhow;
use bytes::Bytes;
use domain_storage::{
    exception::{FileException, UploadFailure},
    mock::MockObjectStore,
    model::{
        entity::{CompletedUpload, Multipart},
        vo::{BodyStream, MediaTypePolicy, PartReceipt, UploadRequest},
    },
    service::{MultipartUploadService, ObjectStoreService},
};
use futures::{stream, StreamExt};
use service_storage::{BufferPool, InMemoryObjectStore, MultipartUploadServiceImpl, MAX_PART_COUNT};
use tokio_util::sync::CancellationToken;

const PART_SIZE: usize = 16;
const MAX_OBJECT_SIZE: u64 = 1024;

fn service(store: Arc<dyn ObjectStoreService>) -> MultipartUploadServiceImpl {
    MultipartUploadServiceImpl::builder()
        .object_store(store)
        .part_size(PART_SIZE)
        .max_object_size(MAX_OBJECT_SIZE)
        .build()
}

/// Body delivered in pieces of `piece` bytes.
fn body(data: &[u8], piece: usize) -> BodyStream {
    let items: Vec<io::Result<Bytes>> =
        data.chunks(piece).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
    stream::iter(items).boxed()
}

/// Body that records whether anyone ever polled it.
fn watched_body(polled: Arc<AtomicBool>) -> BodyStream {
    stream::poll_fn(move |_| {
        polled.store(true, Ordering::SeqCst);
        Poll::<Option<io::Result<Bytes>>>::Ready(None)
    })
    .boxed()
}

fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn expect_open(store: &mut MockObjectStore) {
    store
        .expect_create_multipart()
        .times(1)
        .returning(|key, _| Ok(Multipart::new(key, "upload-1")));
}

fn expect_parts_accepted(store: &mut MockObjectStore, times: usize) {
    store
        .expect_upload_part()
        .withf(|_, _, content| !content.is_empty())
        .times(times)
        .returning(|_, part_number, _| Ok(PartReceipt::new(part_number, format!("etag-{part_number}"))));
}

fn completed(multipart: &Multipart) -> anyhow::Result<CompletedUpload> {
    Ok(CompletedUpload {
        object_key: multipart.object_key.clone(),
        location: format!("https://bucket.example/{}", multipart.object_key),
    })
}

#[tokio::test]
async fn unsupported_media_type_is_rejected_before_opening() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();
    let polled = Arc::new(AtomicBool::new(false));

    let request = UploadRequest::new("text/plain", Some(10), watched_body(polled.clone()));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FileException::UnsupportedMediaType { .. }));
    assert!(!polled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn oversized_declared_length_is_rejected_without_reading() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();
    let polled = Arc::new(AtomicBool::new(false));

    let request =
        UploadRequest::new("image/png", Some(MAX_OBJECT_SIZE + 1), watched_body(polled.clone()));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::PayloadTooLarge { size, max: MAX_OBJECT_SIZE } if size == MAX_OBJECT_SIZE + 1
    ));
    assert!(!polled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn declared_length_needing_too_many_parts_is_rejected_without_reading() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();
    let polled = Arc::new(AtomicBool::new(false));
    let service = MultipartUploadServiceImpl::builder()
        .object_store(Arc::new(store))
        .part_size(PART_SIZE)
        .max_object_size(u64::MAX)
        .build();
    let limit = PART_SIZE as u64 * u64::from(MAX_PART_COUNT);

    assert!(service.admit("image/png", Some(limit)).is_ok());
    let request = UploadRequest::new("image/png", Some(limit + 1), watched_body(polled.clone()));
    let err = service.upload(request, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(
        err,
        FileException::PayloadTooLarge { size, max } if size == limit + 1 && max == limit
    ));
    assert!(!polled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn chunked_body_needing_too_many_parts_is_aborted() {
    let store = Arc::new(InMemoryObjectStore::builder().min_part_size(PART_SIZE).build());
    let service = MultipartUploadServiceImpl::builder()
        .object_store(store.clone())
        .part_size(PART_SIZE)
        .max_object_size(u64::MAX)
        .build();

    let len = PART_SIZE * MAX_PART_COUNT as usize + 1;
    let request = UploadRequest::new("image/png", None, body(&data(len), 4096));
    let err = service.upload(request, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, FileException::PayloadTooLarge { .. }));
    assert_eq!(store.pending_upload_count(), 0);
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn zero_part_size_is_an_error_not_a_panic() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();
    let service = MultipartUploadServiceImpl::builder()
        .object_store(Arc::new(store))
        .part_size(0)
        .build();

    let request = UploadRequest::new("image/png", Some(4), body(b"abcd", 4));
    let err = service.upload(request, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, FileException::InternalError { .. }));
}

#[tokio::test]
async fn receipts_are_numbered_one_to_n() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 5);
    store
        .expect_complete_multipart()
        .withf(|_, parts| parts.iter().map(|p| p.part_number).eq(1..=5))
        .times(1)
        .returning(|multipart, _| completed(multipart));
    store.expect_abort_multipart().never();

    // Four full parts and a short last one.
    let content = data(4 * PART_SIZE + 6);
    let request = UploadRequest::new("image/jpeg", Some(content.len() as u64), body(&content, 7));
    let result = service(Arc::new(store)).upload(request, CancellationToken::new()).await.unwrap();

    assert!(result.object_key.ends_with(".jpeg"));
    assert_eq!(result.location, format!("https://bucket.example/{}", result.object_key));
}

#[tokio::test]
async fn body_of_exactly_whole_parts_uploads_no_empty_part() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 2);
    store
        .expect_complete_multipart()
        .withf(|_, parts| parts.len() == 2)
        .times(1)
        .returning(|multipart, _| completed(multipart));

    let content = data(2 * PART_SIZE);
    let request = UploadRequest::new("image/png", None, body(&content, PART_SIZE));
    assert!(service(Arc::new(store)).upload(request, CancellationToken::new()).await.is_ok());
}

#[tokio::test]
async fn body_below_part_size_is_a_single_final_part() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    store
        .expect_upload_part()
        .withf(|_, part_number, content| *part_number == 1 && content.len() == 5)
        .times(1)
        .returning(|_, part_number, _| Ok(PartReceipt::new(part_number, "etag")));
    store
        .expect_complete_multipart()
        .withf(|_, parts| parts == [PartReceipt::new(1, "etag")])
        .times(1)
        .returning(|multipart, _| completed(multipart));

    let request = UploadRequest::new("image/gif", Some(5), body(b"GIF89", 2));
    assert!(service(Arc::new(store)).upload(request, CancellationToken::new()).await.is_ok());
}

#[tokio::test]
async fn failed_third_of_five_parts_aborts_once_and_never_finalizes() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    store.expect_upload_part().times(3).returning(|_, part_number, _| {
        if part_number == 3 {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(PartReceipt::new(part_number, "etag"))
        }
    });
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let content = data(5 * PART_SIZE);
    let request = UploadRequest::new("video/mp4", None, body(&content, PART_SIZE));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::PartUpload { part_number: 3, .. },
            ..
        }
    ));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn abort_failure_does_not_replace_the_original_error() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    store.expect_upload_part().times(1).returning(|_, _, _| Err(anyhow!("boom")));
    store.expect_abort_multipart().times(1).returning(|_| Err(anyhow!("abort refused")));

    let request = UploadRequest::new("image/png", None, body(&data(40), 40));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::PartUpload { part_number: 1, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn empty_chunked_body_is_rejected_and_aborted() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    store.expect_upload_part().never();
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let request = UploadRequest::new("image/png", None, body(&[], 1));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FileException::EmptyFile));
}

#[tokio::test]
async fn declared_empty_body_is_rejected_before_opening() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();

    let request = UploadRequest::new("image/png", Some(0), body(&[], 1));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FileException::EmptyFile));
}

#[tokio::test]
async fn short_body_against_declared_length_is_aborted() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 2);
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let request = UploadRequest::new("image/png", Some(40), body(&data(32), 8));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::LengthMismatch {
            declared: 40,
            received: 32
        }
    ));
}

#[tokio::test]
async fn body_longer_than_declared_is_aborted_before_uploading_the_excess() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 1);
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let request = UploadRequest::new("image/png", Some(20), body(&data(48), 48));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FileException::LengthMismatch { declared: 20, .. }));
}

#[tokio::test]
async fn read_error_aborts_the_transaction() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 1);
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let items = vec![
        Ok(Bytes::from(data(PART_SIZE))),
        Ok(Bytes::from(data(3))),
        Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client went away")),
    ];
    let request = UploadRequest::new("image/png", None, stream::iter(items).boxed());
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::StreamRead { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn finalize_failure_aborts() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    expect_parts_accepted(&mut store, 1);
    store
        .expect_complete_multipart()
        .times(1)
        .returning(|_, _| Err(anyhow!("InvalidPart")));
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let request = UploadRequest::new("image/png", Some(4), body(b"abcd", 4));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::Finalize { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn open_failure_has_nothing_to_abort() {
    let mut store = MockObjectStore::new();
    store
        .expect_create_multipart()
        .times(1)
        .returning(|_, _| Err(anyhow!("AccessDenied")));
    store.expect_abort_multipart().never();

    let request = UploadRequest::new("image/png", Some(4), body(b"abcd", 4));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::Open { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn mismatched_receipt_aborts_instead_of_finalizing() {
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    store
        .expect_upload_part()
        .times(1)
        .returning(|_, _, _| Ok(PartReceipt::new(7, "etag")));
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    let request = UploadRequest::new("image/png", None, body(&data(40), 40));
    let err = service(Arc::new(store))
        .upload(request, CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::UnmatchedPart {
                expected: 1,
                received: 7
            },
            ..
        }
    ));
}

#[tokio::test]
async fn cancellation_stops_reads_and_uploads_then_aborts() {
    let cancel = CancellationToken::new();
    let mut store = MockObjectStore::new();
    expect_open(&mut store);
    let token = cancel.clone();
    store.expect_upload_part().times(1).returning(move |_, part_number, _| {
        token.cancel();
        Ok(PartReceipt::new(part_number, "etag"))
    });
    store.expect_complete_multipart().never();
    store.expect_abort_multipart().times(1).returning(|_| Ok(()));

    // The body never ends, only cancellation can stop the upload.
    let first = stream::iter(vec![Ok(Bytes::from(data(PART_SIZE)))]);
    let request = UploadRequest::new("image/png", None, first.chain(stream::pending()).boxed());
    let err = service(Arc::new(store)).upload(request, cancel).await.unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn cancelled_before_start_opens_nothing() {
    let mut store = MockObjectStore::new();
    store.expect_create_multipart().never();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = UploadRequest::new("image/png", Some(4), body(b"abcd", 4));
    let err = service(Arc::new(store)).upload(request, cancel).await.unwrap_err();

    assert!(matches!(
        err,
        FileException::UploadFailed {
            source: UploadFailure::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn streamed_object_round_trips_through_the_store() {
    let store = Arc::new(InMemoryObjectStore::builder().min_part_size(PART_SIZE).build());
    let service = MultipartUploadServiceImpl::builder()
        .object_store(store.clone())
        .part_size(PART_SIZE)
        .max_object_size(MAX_OBJECT_SIZE)
        .buffer_pool(Arc::new(BufferPool::new(2, PART_SIZE)))
        .build();

    for len in [1, PART_SIZE - 1, PART_SIZE, PART_SIZE + 1, 10 * PART_SIZE + 3] {
        let content = data(len);
        let request = UploadRequest::new("video/webm", Some(len as u64), body(&content, 5));
        let completed = service.upload(request, CancellationToken::new()).await.unwrap();

        let object = store.object(&completed.object_key).unwrap();
        assert_eq!(object.content, content, "length {len}");
        assert_eq!(object.content_type, "video/webm");
    }
    assert_eq!(store.pending_upload_count(), 0);
}

#[tokio::test]
async fn chunked_body_over_the_limit_is_aborted() {
    let store = Arc::new(InMemoryObjectStore::builder().min_part_size(PART_SIZE).build());
    let service = service(store.clone());

    let request = UploadRequest::new("image/png", None, body(&data(MAX_OBJECT_SIZE as usize + 1), 64));
    let err = service.upload(request, CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, FileException::PayloadTooLarge { .. }));
    assert_eq!(store.pending_upload_count(), 0);
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn concurrent_uploads_are_isolated() {
    let store = Arc::new(InMemoryObjectStore::builder().min_part_size(PART_SIZE).build());
    let service = Arc::new(
        MultipartUploadServiceImpl::builder()
            .object_store(store.clone())
            .media_policy(MediaTypePolicy::new(["image/"]))
            .part_size(PART_SIZE)
            .max_object_size(MAX_OBJECT_SIZE)
            .build(),
    );

    let handles: Vec<_> = (0..10usize)
        .map(|n| {
            let service = service.clone();
            tokio::spawn(async move {
                let content: Vec<u8> = vec![n as u8; 3 * PART_SIZE + n];
                let request = UploadRequest::new("image/png", None, body(&content, 7));
                let completed = service.upload(request, CancellationToken::new()).await.unwrap();
                (completed.object_key, content)
            })
        })
        .collect();

    let mut keys = HashSet::new();
    for handle in handles {
        let (key, content) = handle.await.unwrap();
        assert_eq!(store.object(&key).unwrap().content, content);
        assert!(keys.insert(key));
    }
    assert_eq!(keys.len(), 10);
    assert_eq!(store.object_count(), 10);
    assert_eq!(store.pending_upload_count(), 0);
}

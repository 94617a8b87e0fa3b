//! PATCH: offsets, locking and checksums.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;
    use tokio_test::io::Builder;
    use tuskit_core::checksums::ChecksumAlgorithm;
    use tuskit_core::headers::{UPLOAD_CHECKSUM, UPLOAD_OFFSET};
    use tuskit_core::{EventOutcome, Events, TusConfig, TusProtocol};

    use crate::{
        RecordingStore, checksum_header, counting_file_complete, create_upload, offset_of, patch,
        protocol, respond, tus_request, with,
    };

    #[tokio::test]
    async fn test_should_advance_offset_by_written_bytes() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);
        let id = create_upload(&protocol, 10).await;

        let response = respond(&protocol, patch(&id, 0, &b"hello"[..])).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.header(UPLOAD_OFFSET), Some("5"));
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        let response = respond(&protocol, patch(&id, 5, &b"world"[..])).await;
        assert_eq!(response.header(UPLOAD_OFFSET), Some("10"));
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let response = respond(&protocol, patch(&id, 10, &b""[..])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.message.as_deref(), Some("Upload is already complete."));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_should_reject_offset_mismatch_and_keep_offset() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        respond(&protocol, patch(&id, 0, &b"abc"[..])).await;

        let response = respond(&protocol, patch(&id, 1, &b"xyz"[..])).await;
        assert_eq!(response.status, StatusCode::CONFLICT);
        assert_eq!(
            response.message.as_deref(),
            Some("Offset does not match file. File offset: 3. Request offset: 1")
        );
        assert_eq!(offset_of(&protocol, &id).await, 3);
    }

    #[tokio::test]
    async fn test_should_reject_wrong_content_type() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        let request = with(
            tus_request(Method::PATCH, &format!("/files/{id}")),
            UPLOAD_OFFSET,
            "0",
        )
        .with_header(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_should_reject_body_longer_than_upload() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 3).await;
        let response = respond(&protocol, patch(&id, 0, &b"hello"[..])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some(
                "Stream contains more data than the file's upload length. Stream data: 5, upload length: 3."
            )
        );
        assert_eq!(offset_of(&protocol, &id).await, 0);
    }

    #[tokio::test]
    async fn test_should_answer_concurrent_writer_with_conflict() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 4).await;

        let slow_body = Builder::new()
            .read(b"ab")
            .wait(Duration::from_millis(100))
            .read(b"cd")
            .build();
        let (first, second) = tokio::join!(
            respond(&protocol, patch(&id, 0, slow_body)),
            respond(&protocol, patch(&id, 0, &b"xy"[..])),
        );

        let mut statuses = [first.status, second.status];
        statuses.sort();
        assert_eq!(statuses, [StatusCode::NO_CONTENT, StatusCode::CONFLICT]);
        assert_eq!(
            second.message,
            Some(format!(
                "File {id} is currently being updated. Please try again later"
            ))
        );
        assert_eq!(offset_of(&protocol, &id).await, 4);
    }

    #[tokio::test]
    async fn test_should_release_lock_after_oversized_body() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 3).await;

        let response = respond(&protocol, patch(&id, 0, &b"hello"[..])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let response = respond(&protocol, patch(&id, 0, &b"abc"[..])).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.header(UPLOAD_OFFSET), Some("3"));
    }

    #[tokio::test]
    async fn test_should_release_lock_after_rejected_hook() {
        let rejected = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&rejected);
        let events = Events::new().on_before_write(move |_| {
            let first = !seen.swap(true, Ordering::SeqCst);
            async move {
                if first {
                    EventOutcome::proceed().fail_request("quota exceeded")
                } else {
                    EventOutcome::proceed()
                }
            }
        });
        let protocol = protocol(TusConfig::default()).with_events(events);
        let id = create_upload(&protocol, 5).await;

        let response = respond(&protocol, patch(&id, 0, &b"hello"[..])).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.message.as_deref(), Some("quota exceeded"));

        let response = respond(&protocol, patch(&id, 0, &b"hello"[..])).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(rejected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_should_release_lock_when_request_is_dropped() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;

        let (mut client, body) = tokio::io::duplex(64);
        client.write_all(b"ab").await.expect("test write");
        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            respond(&protocol, patch(&id, 0, body)),
        )
        .await;
        assert!(abandoned.is_err(), "request should still be reading");

        let offset = offset_of(&protocol, &id).await;
        let response = respond(&protocol, patch(&id, offset, &b"x"[..])).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT, "{:?}", response.message);
        assert_eq!(offset_of(&protocol, &id).await, offset + 1);
        drop(client);
    }

    #[tokio::test]
    async fn test_should_reject_checksum_mismatch_and_keep_offset() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        respond(&protocol, patch(&id, 0, &b"abc"[..])).await;

        let request = with(
            patch(&id, 3, &b"world"[..]),
            UPLOAD_CHECKSUM,
            &checksum_header(ChecksumAlgorithm::Sha1, b"hello"),
        );
        let response = respond(&protocol, request).await;
        assert_eq!(response.status.as_u16(), 460);
        assert_eq!(
            response.message.as_deref(),
            Some("Header Upload-Checksum does not match the checksum of the file")
        );
        assert_eq!(offset_of(&protocol, &id).await, 3);

        let request = with(
            patch(&id, 3, &b"hello"[..]),
            UPLOAD_CHECKSUM,
            &checksum_header(ChecksumAlgorithm::Sha256, b"hello"),
        );
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.header(UPLOAD_OFFSET), Some("8"));
    }

    #[tokio::test]
    async fn test_should_reject_unsupported_checksum_algorithm() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        let request = with(patch(&id, 0, &b"abc"[..]), UPLOAD_CHECKSUM, "crc32 AAAAAA==");
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some("Unsupported checksum algorithm. Supported algorithms are: sha1,sha256,md5")
        );
    }

    fn trailing_checksum_patch(
        id: &str,
        body: &'static [u8],
        trailers: oneshot::Receiver<HeaderMap>,
    ) -> tuskit_core::TusRequest {
        patch(id, 0, body)
            .with_header(header::TRAILER, HeaderValue::from_static("Upload-Checksum"))
            .with_trailers(trailers)
    }

    #[tokio::test]
    async fn test_should_verify_trailing_checksum() {
        let store = Arc::new(RecordingStore::new());
        let protocol = TusProtocol::new(store.clone(), TusConfig::default());
        let id = create_upload(&protocol, 5).await;

        let (tx, rx) = oneshot::channel();
        let mut trailers = HeaderMap::new();
        trailers.insert(
            UPLOAD_CHECKSUM,
            HeaderValue::from_str(&checksum_header(ChecksumAlgorithm::Md5, b"hello"))
                .expect("test header"),
        );
        tx.send(trailers).expect("test send trailers");

        let response = respond(&protocol, trailing_checksum_patch(&id, b"hello", rx)).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(store.verified().len(), 1);
        assert_eq!(store.verified()[0].0, "md5");
    }

    #[tokio::test]
    async fn test_should_verify_sentinel_when_trailer_is_lost() {
        let store = Arc::new(RecordingStore::new());
        let protocol = TusProtocol::new(store.clone(), TusConfig::default());
        let id = create_upload(&protocol, 5).await;

        let (tx, rx) = oneshot::channel::<HeaderMap>();
        drop(tx);

        let response = respond(&protocol, trailing_checksum_patch(&id, b"hello", rx)).await;
        assert_eq!(response.status.as_u16(), 460);
        assert_eq!(store.verified(), vec![("sha1".to_owned(), vec![0u8; 20])]);
        assert_eq!(offset_of(&protocol, &id).await, 0);
    }

    #[tokio::test]
    async fn test_should_reject_trailer_without_trailer_source() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 5).await;
        let request = patch(&id, 0, &b"hello"[..])
            .with_header(header::TRAILER, HeaderValue::from_static("Upload-Checksum"));
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some("Trailing header Upload-Checksum is not supported")
        );
    }
}

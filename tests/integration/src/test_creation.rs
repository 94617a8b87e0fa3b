//! Creation, creation-with-upload and creation-defer-length.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use http::{Method, StatusCode, header};
    use tuskit_core::TusConfig;
    use tuskit_core::headers::{
        TUS_RESUMABLE, UPLOAD_DEFER_LENGTH, UPLOAD_LENGTH, UPLOAD_METADATA, UPLOAD_OFFSET,
    };
    use tuskit_core::parsers::{MetadataParsingStrategy, parse_metadata};

    use crate::{
        counting_file_complete, create_upload, offset_of, patch, protocol, respond, tus_request,
        upload_id, with,
    };

    #[tokio::test]
    async fn test_should_create_without_completing() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);

        let response = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "100"),
        )
        .await;

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header(TUS_RESUMABLE), Some("1.0.0"));
        assert!(
            response
                .header(header::LOCATION)
                .is_some_and(|l| l.starts_with("/files/"))
        );
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_should_complete_empty_upload_on_creation() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);

        let id = create_upload(&protocol, 0).await;

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(offset_of(&protocol, &id).await, 0);
    }

    #[tokio::test]
    async fn test_should_round_trip_metadata() {
        let protocol = protocol(TusConfig::default());
        let request = with(
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "5"),
            UPLOAD_METADATA,
            "filename d29ybGQ=,is_confidential",
        );
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some("Header Upload-Metadata: Key is_confidential must have a value")
        );

        let request = with(
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "5"),
            UPLOAD_METADATA,
            "filename d29ybGQ=",
        );
        let id = upload_id(&respond(&protocol, request).await);

        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{id}"))).await;
        let raw = head.header(UPLOAD_METADATA).expect("metadata header");
        let metadata = parse_metadata(raw, MetadataParsingStrategy::Original).expect("metadata");
        assert_eq!(
            metadata
                .get("filename")
                .and_then(|v| v.as_str().ok()),
            Some("world")
        );
    }

    #[tokio::test]
    async fn test_should_reject_duplicate_metadata_keys() {
        let protocol = protocol(TusConfig::default());
        let request = with(
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "5"),
            UPLOAD_METADATA,
            "name d29ybGQ=,NAME d29ybGQ=",
        );
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_should_reject_upload_over_max_size() {
        let protocol = protocol(TusConfig::builder().max_allowed_upload_size(10).build());
        let response = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "11"),
        )
        .await;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_should_create_and_write_in_one_request() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);
        let request = with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "5")
            .with_header(
                header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/offset+octet-stream"),
            )
            .with_body(&b"hello"[..]);

        let response = respond(&protocol, request).await;

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header(UPLOAD_OFFSET), Some("5"));
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(offset_of(&protocol, &upload_id(&response)).await, 5);
    }

    #[tokio::test]
    async fn test_should_defer_length_until_first_write() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);
        let response = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_DEFER_LENGTH, "1"),
        )
        .await;
        assert_eq!(response.status, StatusCode::CREATED);
        let id = upload_id(&response);

        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{id}"))).await;
        assert_eq!(head.header(UPLOAD_DEFER_LENGTH), Some("1"));

        let response = respond(
            &protocol,
            with(patch(&id, 0, &b"abc"[..]), UPLOAD_LENGTH, "3"),
        )
        .await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{id}"))).await;
        assert_eq!(head.header(UPLOAD_LENGTH), Some("3"));
        assert!(head.header(UPLOAD_DEFER_LENGTH).is_none());
    }
}

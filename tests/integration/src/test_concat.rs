//! Concatenation of partial uploads.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use http::{Method, StatusCode};
    use tuskit_core::TusConfig;
    use tuskit_core::headers::{UPLOAD_CONCAT, UPLOAD_LENGTH, UPLOAD_OFFSET};
    use tuskit_core::{TusProtocol, TusResponse};

    use crate::{
        counting_file_complete, create_upload, patch, protocol, respond, tus_request, upload_id,
        with,
    };

    async fn create_partial(protocol: &TusProtocol, length: u64) -> String {
        let request = with(
            with(tus_request(Method::POST, "/files"), UPLOAD_CONCAT, "partial"),
            UPLOAD_LENGTH,
            &length.to_string(),
        );
        let response = respond(protocol, request).await;
        assert_eq!(response.status, StatusCode::CREATED);
        upload_id(&response)
    }

    async fn create_final(protocol: &TusProtocol, ids: &[&str]) -> TusResponse {
        let urls: Vec<String> = ids.iter().map(|id| format!("/files/{id}")).collect();
        let header = format!("final;{}", urls.join(" "));
        respond(
            protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_CONCAT, &header),
        )
        .await
    }

    #[tokio::test]
    async fn test_should_concatenate_complete_partials() {
        let (events, completed) = counting_file_complete();
        let protocol = protocol(TusConfig::default()).with_events(events);
        let a = create_partial(&protocol, 3).await;
        let b = create_partial(&protocol, 2).await;
        respond(&protocol, patch(&a, 0, &b"abc"[..])).await;
        respond(&protocol, patch(&b, 0, &b"de"[..])).await;
        // Completing partials does not count as completing the final upload.
        let partials_completed = completed.load(Ordering::SeqCst);

        let response = create_final(&protocol, &[&a, &b]).await;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(completed.load(Ordering::SeqCst), partials_completed + 1);

        let id = upload_id(&response);
        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{id}"))).await;
        assert_eq!(head.header(UPLOAD_LENGTH), Some("5"));
        assert_eq!(head.header(UPLOAD_OFFSET), Some("5"));
        assert_eq!(
            head.header(UPLOAD_CONCAT),
            Some(format!("final;/files/{a} /files/{b}").as_str())
        );

        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{a}"))).await;
        assert_eq!(head.header(UPLOAD_CONCAT), Some("partial"));
    }

    #[tokio::test]
    async fn test_should_reject_unknown_partial() {
        let protocol = protocol(TusConfig::default());
        let a = create_partial(&protocol, 0).await;
        let response = create_final(&protocol, &[&a, "missing"]).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some("Could not find some of the files supplied for concatenation")
        );
    }

    #[tokio::test]
    async fn test_should_reject_non_partial_upload() {
        let protocol = protocol(TusConfig::default());
        let plain = create_upload(&protocol, 0).await;
        let response = create_final(&protocol, &[&plain]).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some(
                "Some of the files supplied for concatenation are not marked as partial and can not be concatenated"
            )
        );
    }

    #[tokio::test]
    async fn test_should_reject_unfinished_partial() {
        let protocol = protocol(TusConfig::default());
        let a = create_partial(&protocol, 3).await;
        let response = create_final(&protocol, &[&a]).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.message.as_deref(),
            Some(
                "Some of the files supplied for concatenation are not finished and can not be concatenated"
            )
        );
    }

    #[tokio::test]
    async fn test_should_reject_final_over_max_size() {
        let protocol = protocol(TusConfig::builder().max_allowed_upload_size(4).build());
        let a = create_partial(&protocol, 3).await;
        let b = create_partial(&protocol, 2).await;
        respond(&protocol, patch(&a, 0, &b"abc"[..])).await;
        respond(&protocol, patch(&b, 0, &b"de"[..])).await;

        let response = create_final(&protocol, &[&a, &b]).await;
        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_should_forbid_writes_to_final_upload() {
        let protocol = protocol(TusConfig::default());
        let a = create_partial(&protocol, 1).await;
        respond(&protocol, patch(&a, 0, &b"x"[..])).await;
        let id = upload_id(&create_final(&protocol, &[&a]).await);

        let response = respond(&protocol, patch(&id, 1, &b"y"[..])).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.message.as_deref(),
            Some("File with \"Upload-Concat: final\" cannot be patched")
        );
    }
}

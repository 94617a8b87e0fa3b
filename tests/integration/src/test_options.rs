//! OPTIONS, DELETE and request classification.

#[cfg(test)]
mod tests {
    use http::{HeaderValue, Method, StatusCode};
    use tuskit_core::headers::{
        TUS_CHECKSUM_ALGORITHM, TUS_EXTENSION, TUS_MAX_SIZE, TUS_RESUMABLE, TUS_VERSION,
        X_HTTP_METHOD_OVERRIDE,
    };
    use tuskit_core::store::TusExtensions;
    use tuskit_core::{ProtocolOutcome, TusConfig, TusRequest};

    use crate::{create_upload, protocol, respond, tus_request};

    #[tokio::test]
    async fn test_should_describe_server() {
        let protocol = protocol(TusConfig::builder().max_allowed_upload_size(1_000).build());
        let response = respond(&protocol, TusRequest::new(Method::OPTIONS, "/files")).await;

        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.header(TUS_RESUMABLE), Some("1.0.0"));
        assert_eq!(response.header(TUS_VERSION), Some("1.0.0"));
        assert_eq!(response.header(TUS_MAX_SIZE), Some("1000"));
        assert_eq!(response.header(TUS_CHECKSUM_ALGORITHM), Some("sha1,sha256,md5"));
        let extensions = response.header(TUS_EXTENSION).expect("extensions");
        assert!(extensions.split(',').any(|e| e == "termination"));
        assert!(!extensions.split(',').any(|e| e == "checksum-trailer"));
    }

    #[tokio::test]
    async fn test_should_limit_extensions_to_allow_list() {
        let config = TusConfig::builder()
            .allowed_extensions(TusExtensions::CREATION | TusExtensions::TERMINATION)
            .build();
        let protocol = protocol(config);
        let response = respond(&protocol, TusRequest::new(Method::OPTIONS, "/files")).await;
        assert_eq!(response.header(TUS_EXTENSION), Some("creation,termination"));
        assert!(response.header(TUS_CHECKSUM_ALGORITHM).is_none());
    }

    #[tokio::test]
    async fn test_should_delete_upload() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        let path = format!("/files/{id}");

        let response = respond(&protocol, tus_request(Method::DELETE, &path)).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);

        let response = respond(&protocol, tus_request(Method::HEAD, &path)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let response = respond(&protocol, tus_request(Method::DELETE, &path)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_should_delete_through_method_override() {
        let protocol = protocol(TusConfig::default());
        let id = create_upload(&protocol, 10).await;
        let request = tus_request(Method::POST, &format!("/files/{id}"))
            .with_header(X_HTTP_METHOD_OVERRIDE, HeaderValue::from_static("DELETE"));
        let response = respond(&protocol, request).await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_should_pass_through_foreign_requests() {
        let protocol = protocol(TusConfig::default());
        for request in [
            TusRequest::new(Method::POST, "/files"),
            tus_request(Method::GET, "/files/abc"),
            tus_request(Method::POST, "/uploads"),
        ] {
            let outcome = protocol.invoke(request).await.expect("invoke");
            assert!(matches!(outcome, ProtocolOutcome::ContinueExecution(_)));
        }
    }
}

//! Upload expiration.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::{Method, StatusCode};
    use tuskit_core::TusConfig;
    use tuskit_core::cancellation::CancellationSignal;
    use tuskit_core::headers::{UPLOAD_EXPIRES, UPLOAD_LENGTH};
    use tuskit_core::helpers::ExpirationPolicy;

    use crate::{patch, protocol, respond, tus_request, upload_id, with};

    fn expiring(policy: ExpirationPolicy) -> TusConfig {
        TusConfig::builder().expiration(policy).build()
    }

    #[tokio::test]
    async fn test_should_keep_absolute_expiry_on_write() {
        let protocol = protocol(expiring(ExpirationPolicy::Absolute {
            timeout_secs: 3600,
        }));
        let created = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "10"),
        )
        .await;
        let expires = created.header(UPLOAD_EXPIRES).expect("expiry").to_owned();
        assert!(expires.ends_with(" GMT"));

        let written = respond(&protocol, patch(&upload_id(&created), 0, &b"abc"[..])).await;
        assert_eq!(written.status, StatusCode::NO_CONTENT);
        assert_eq!(written.header(UPLOAD_EXPIRES), Some(expires.as_str()));
    }

    #[tokio::test]
    async fn test_should_stamp_sliding_expiry_on_write() {
        let protocol = protocol(expiring(ExpirationPolicy::Sliding { timeout_secs: 60 }));
        let created = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "10"),
        )
        .await;

        let written = respond(&protocol, patch(&upload_id(&created), 0, &b"abc"[..])).await;
        assert!(written.header(UPLOAD_EXPIRES).is_some());
    }

    #[tokio::test]
    async fn test_should_hide_and_sweep_expired_uploads() {
        let protocol = protocol(expiring(ExpirationPolicy::Absolute { timeout_secs: 0 }));
        let created = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "10"),
        )
        .await;
        let id = upload_id(&created);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let head = respond(&protocol, tus_request(Method::HEAD, &format!("/files/{id}"))).await;
        assert_eq!(head.status, StatusCode::NOT_FOUND);
        assert_eq!(head.message, None);

        let removed = protocol
            .remove_expired_uploads(&CancellationSignal::new())
            .await
            .expect("sweep");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_should_not_expire_without_policy() {
        let protocol = protocol(TusConfig::default());
        let created = respond(
            &protocol,
            with(tus_request(Method::POST, "/files"), UPLOAD_LENGTH, "10"),
        )
        .await;
        assert!(created.header(UPLOAD_EXPIRES).is_none());
    }
}

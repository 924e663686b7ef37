use claims_desk::storage::{
    ATTACHMENT_PREFIX, MockStorageService, S3StorageClient, StorageError, StorageService,
    attachment_key, sanitize_key,
};
use uuid::Uuid;

#[cfg(test)]
mod key_tests {
    use super::*;

    #[test]
    fn test_sanitize_key_drops_traversal() {
        assert_eq!(sanitize_key("../../etc/passwd"), "etc/passwd");
        assert_eq!(sanitize_key("./a//b/../c"), "a/b/c");
        assert_eq!(sanitize_key("plain.pdf"), "plain.pdf");
    }

    #[test]
    fn test_attachment_key_layout() {
        let owner = Uuid::new_v4();
        let key = attachment_key(owner, "../claims/photo.jpg");

        let prefix = format!("{}/{}/", ATTACHMENT_PREFIX, owner);
        assert!(key.starts_with(&prefix), "{}", key);
        assert!(key.ends_with("-claims_photo.jpg"), "{}", key);
        assert!(!key.contains(".."));
        // Prefix segments plus one file segment.
        assert_eq!(key.split('/').count(), 3);
    }

    #[test]
    fn test_attachment_keys_are_unique() {
        let owner = Uuid::new_v4();
        assert_ne!(attachment_key(owner, "a.pdf"), attachment_key(owner, "a.pdf"));
    }
}

#[cfg(test)]
mod mock_tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success() {
        let mock = MockStorageService::new();
        let key = "attachments/owner/report.pdf";
        let url = mock
            .get_presigned_upload_url(key, "application/pdf")
            .await
            .unwrap();

        assert!(url.contains("signature=fake"));
        assert!(url.contains(key));
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockStorageService::new_failing();
        let result = mock.get_presigned_upload_url("test.pdf", "application/pdf").await;
        assert!(matches!(result, Err(StorageError::Presign(_))));
    }

    #[tokio::test]
    async fn test_mock_sanitization() {
        let mock = MockStorageService::new();
        let url = mock
            .get_presigned_upload_url("../../etc/passwd", "text/plain")
            .await
            .unwrap();
        assert!(!url.contains(".."));
    }
}

#[cfg(test)]
mod s3_tests {
    use super::*;

    #[tokio::test]
    async fn test_s3_presigned_url_format() {
        // Presigning is computed locally; no request reaches the endpoint.
        let client = S3StorageClient::new(
            "http://localhost:9000",
            "us-east-1",
            "testkey",
            "testsecret",
            "testbucket",
        )
        .await;

        let key = attachment_key(Uuid::new_v4(), "policy-scan.pdf");
        let url = client
            .get_presigned_upload_url(&key, "application/pdf")
            .await
            .unwrap();

        assert!(url.contains("localhost:9000/testbucket/"));
        assert!(url.contains(&key));
        assert!(url.contains("X-Amz-Expires=600"));
    }
}

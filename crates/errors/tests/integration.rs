//! Integration tests for error types

#[cfg(test)]
mod tests {
    use ferry_errors::*;

    #[test]
    fn test_error_conversion() {
        let net_err = NetworkError::Timeout {
            url: "https://example.com".into(),
        };
        let err: Error = net_err.into();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(err.user_code(), Some("network.timeout"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = StorageError::CheckpointWrite {
            path: "/var/lib/ferry/fetch.checkpoint".into(),
            message: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot append to checkpoint /var/lib/ferry/fetch.checkpoint: disk full"
        );
    }

    #[test]
    fn test_status_code() {
        let err = NetworkError::HttpError {
            status: 404,
            message: "Not Found".into(),
        };
        assert_eq!(err.status_code(), 404);
        assert!(!err.is_retryable());
        assert_eq!(NetworkError::DownloadFailed("reset".into()).status_code(), 0);
    }

    #[test]
    fn test_io_error_with_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let storage_err = StorageError::from_io_with_path(&io_err, std::path::Path::new("/a/b"));
        assert!(matches!(storage_err, StorageError::PathNotFound { .. }));

        let err = Error::io_with_path(&io_err, "/a/b");
        assert_eq!(err.user_message(), "/a/b: gone");
    }

    #[test]
    fn test_error_clone() {
        let err = IndexError::InvalidName { name: "../x".into() };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}

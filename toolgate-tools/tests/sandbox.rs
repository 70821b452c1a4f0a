#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod sandbox_tests {
    use proptest::prelude::*;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;
    use toolgate_tools::error::ToolError;
    use toolgate_tools::sandbox::*;

    /// Returns (tempdir holding `sbox/` and `outside/`, root at `sbox/`).
    fn setup_sandbox() -> (TempDir, SandboxRoot) {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("sbox")).unwrap();
        std::fs::create_dir(temp.path().join("outside")).unwrap();
        std::fs::write(temp.path().join("outside").join("secret.txt"), "secret").unwrap();
        let root = SandboxRoot::new(temp.path().join("sbox")).unwrap();
        (temp, root)
    }

    fn leftover_temp_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with('.') && name.ends_with(".tmp"))
            .collect()
    }

    #[test]
    fn test_path_traversal_dotdot() {
        let (_temp, root) = setup_sandbox();
        assert!(matches!(
            root.resolve("../outside.txt"),
            Err(ToolError::ContainmentViolation(p)) if p == "../outside.txt"
        ));
        assert!(matches!(
            root.resolve("a/b/../../../outside/secret.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
    }

    #[test]
    fn test_violation_message_hides_real_path() {
        let (temp, root) = setup_sandbox();
        let err = root.resolve("../outside/secret.txt").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("../outside/secret.txt"));
        assert!(!message.contains(&*temp.path().to_string_lossy()));
    }

    #[test]
    fn test_absolute_path_is_rerooted() {
        let (_temp, root) = setup_sandbox();
        let resolved = root.resolve("/etc/passwd").unwrap();
        assert_eq!(resolved.as_path(), root.path().join("etc").join("passwd"));
        assert_eq!(resolved.relative(), Path::new("etc/passwd"));
        assert!(!resolved.exists());
    }

    #[test]
    fn test_sibling_with_root_prefix_rejected() {
        let (temp, root) = setup_sandbox();
        std::fs::create_dir(temp.path().join("sbox_evil")).unwrap();
        assert!(matches!(
            root.resolve("../sbox_evil/file"),
            Err(ToolError::ContainmentViolation(_))
        ));
    }

    #[test]
    fn test_valid_subdirectory() {
        let (_temp, root) = setup_sandbox();
        std::fs::create_dir_all(root.path().join("docs/notes")).unwrap();
        std::fs::write(root.path().join("docs/notes/a.txt"), "a").unwrap();

        let resolved = root.resolve("docs/./notes/../notes/a.txt").unwrap();
        assert!(resolved.is_file());
        assert_eq!(resolved.relative(), Path::new("docs/notes/a.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (temp, root) = setup_sandbox();
        std::os::unix::fs::symlink(
            temp.path().join("outside/secret.txt"),
            root.path().join("innocent.txt"),
        )
        .unwrap();
        std::os::unix::fs::symlink(temp.path().join("outside"), root.path().join("door")).unwrap();

        assert!(matches!(
            root.resolve("innocent.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
        assert!(matches!(
            root.resolve("door/secret.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
        // A write target below an escaping directory link is rejected too.
        assert!(matches!(
            root.resolve("door/new_file.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_escape_rejected() {
        let (temp, root) = setup_sandbox();
        std::os::unix::fs::symlink(
            temp.path().join("outside/not_yet.txt"),
            root.path().join("trap.txt"),
        )
        .unwrap();

        assert!(matches!(
            root.resolve("trap.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
        assert!(matches!(
            root.resolve("missing/../trap.txt"),
            Err(ToolError::ContainmentViolation(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_inside_root_allowed() {
        let (_temp, root) = setup_sandbox();
        std::fs::create_dir(root.path().join("real")).unwrap();
        std::fs::write(root.path().join("real/data.txt"), "data").unwrap();
        std::os::unix::fs::symlink(root.path().join("real"), root.path().join("alias")).unwrap();

        let resolved = root.resolve("alias/data.txt").unwrap();
        assert_eq!(resolved.relative(), Path::new("real/data.txt"));
    }

    fn segment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("..".to_string()),
            Just(".".to_string()),
            Just("".to_string()),
            Just("outside".to_string()),
            Just("sub".to_string()),
            Just("door".to_string()),
            "[a-z]{1,6}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(96))]

        #[test]
        fn prop_resolved_paths_stay_inside_root(
            absolute in any::<bool>(),
            segments in prop::collection::vec(segment(), 0..8),
        ) {
            let (temp, root) = setup_sandbox();
            std::fs::create_dir(root.path().join("sub")).unwrap();
            #[cfg(unix)]
            std::os::unix::fs::symlink(temp.path().join("outside"), root.path().join("door")).unwrap();

            let joined = segments.join("/");
            let raw = if absolute { format!("/{}", joined) } else { joined };

            match root.resolve(&raw) {
                Ok(resolved) => prop_assert!(resolved.as_path().starts_with(root.path())),
                Err(ToolError::ContainmentViolation(p)) => prop_assert_eq!(p, raw),
                Err(other) => prop_assert!(false, "unexpected error: {}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_atomic_write_success() {
        let (_temp, root) = setup_sandbox();
        let target = root.resolve("fresh.txt").unwrap();

        let written = write_bytes_atomic(&target, b"hello", DEFAULT_MAX_BYTES)
            .await
            .unwrap();

        assert_eq!(written, 5);
        assert_eq!(std::fs::read_to_string(target.as_path()).unwrap(), "hello");
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_atomic_write_failure_mid_stream_leaves_no_file() {
        let (_temp, root) = setup_sandbox();
        let target = root.resolve("broken.txt").unwrap();

        let reader = tokio_test::io::Builder::new()
            .read(b"partial bytes")
            .read_error(io::Error::new(io::ErrorKind::Other, "stream broke"))
            .build();

        let result = write_atomic(&target, reader, DEFAULT_MAX_BYTES).await;

        assert!(matches!(result, Err(ToolError::Io(_))));
        assert!(!target.exists());
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_atomic_write_failure_keeps_previous_content() {
        let (_temp, root) = setup_sandbox();
        std::fs::write(root.path().join("keep.txt"), "original").unwrap();
        let target = root.resolve("keep.txt").unwrap();

        let reader = tokio_test::io::Builder::new()
            .read(b"new")
            .read_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();

        assert!(write_atomic(&target, reader, DEFAULT_MAX_BYTES).await.is_err());
        assert_eq!(std::fs::read_to_string(target.as_path()).unwrap(), "original");
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_quota_exceeded_leaves_no_partial_file() {
        let (_temp, root) = setup_sandbox();
        let target = root.resolve("big.bin").unwrap();
        let payload = vec![b'x'; 64 * 1024];

        let result = write_bytes_atomic(&target, &payload, 10_000).await;

        match result {
            Err(ToolError::QuotaExceeded { attempted, limit }) => {
                assert_eq!(limit, 10_000);
                assert!(attempted > limit);
            }
            other => panic!("expected quota error, got {:?}", other),
        }
        assert!(!target.exists());
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let (_temp, root) = setup_sandbox();
        let target = root.resolve("no/such/dir/file.txt").unwrap();

        let result = write_bytes_atomic(&target, b"x", DEFAULT_MAX_BYTES).await;
        assert!(matches!(result, Err(ToolError::Io(e)) if e.kind() == io::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_writers_last_rename_wins() {
        let (_temp, root) = setup_sandbox();
        let payloads: Vec<Vec<u8>> = (0..8u8).map(|i| vec![b'a' + i; 32 * 1024]).collect();

        let mut handles = Vec::new();
        for payload in payloads.clone() {
            let target = root.resolve("shared.txt").unwrap();
            handles.push(tokio::spawn(async move {
                write_bytes_atomic(&target, &payload, DEFAULT_MAX_BYTES).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let content = std::fs::read(root.path().join("shared.txt")).unwrap();
        assert!(payloads.contains(&content), "file holds a mix of writers");
        assert!(leftover_temp_files(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_writer_abort_removes_temp() {
        let (_temp, root) = setup_sandbox();
        let target = root.resolve("aborted.txt").unwrap();

        let mut writer = AtomicWriter::create(&target, DEFAULT_MAX_BYTES).await.unwrap();
        writer.write(b"half").await.unwrap();
        assert_eq!(writer.bytes_written(), 4);
        writer.abort().await;

        assert!(!target.exists());
        assert!(leftover_temp_files(root.path()).is_empty());
    }
}

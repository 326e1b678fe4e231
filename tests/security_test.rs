//! Sandbox enforcement through the public processors.

use docmark::{create_processor, ErrorKind, SingleFileProcessor};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn sandboxed(root: &Path, security: Value) -> SingleFileProcessor {
    let mut overrides = json!({ "security": { "allowed_roots": [root] } });
    if let (Some(section), Value::Object(extra)) = (overrides["security"].as_object_mut(), security) {
        section.extend(extra);
    }
    create_processor("standard", &overrides).unwrap()
}

#[test]
fn test_traversal_out_of_root() {
    let outer = TempDir::new().unwrap();
    let root = outer.path().join("root");
    fs::create_dir(&root).unwrap();
    fs::write(outer.path().join("secret.txt"), "secret").unwrap();

    let processor = sandboxed(&root, json!({}));
    let result = processor.process_file(
        &root.join("../secret.txt"),
        &root.join("secret.md"),
        "markdown",
    );
    assert_eq!(result.error_kind(), Some(ErrorKind::Security));
    assert!(!root.join("secret.md").exists());
}

#[test]
fn test_output_outside_root() {
    let root = TempDir::new().unwrap();
    let elsewhere = TempDir::new().unwrap();
    fs::write(root.path().join("a.txt"), "a").unwrap();

    let processor = sandboxed(root.path(), json!({}));
    let result = processor.process_file(
        &root.path().join("a.txt"),
        &elsewhere.path().join("a.md"),
        "markdown",
    );
    assert_eq!(result.error_kind(), Some(ErrorKind::Security));
    assert!(!elsewhere.path().join("a.md").exists());
}

#[test]
fn test_file_size_limit() {
    let root = TempDir::new().unwrap();
    let input = root.path().join("big.txt");
    fs::write(&input, "x".repeat(64)).unwrap();

    let processor = sandboxed(root.path(), json!({ "max_file_size": 16 }));
    let result = processor.process_file(&input, &root.path().join("big.md"), "markdown");
    assert_eq!(result.error_kind(), Some(ErrorKind::Security));
    assert!(result.error().unwrap().message.contains("exceeds limit"));

    // exactly at the limit is fine
    fs::write(&input, "x".repeat(16)).unwrap();
    let result = processor.process_file(&input, &root.path().join("big.md"), "markdown");
    assert!(result.is_success());
}

#[test]
fn test_depth_limit() {
    let root = TempDir::new().unwrap();
    let deep = root.path().join("a/b/c");
    fs::create_dir_all(&deep).unwrap();
    fs::write(deep.join("d.txt"), "deep").unwrap();
    fs::write(root.path().join("top.txt"), "top").unwrap();

    let processor = sandboxed(root.path(), json!({ "max_depth": 2 }));
    let result = processor.process_file(&deep.join("d.txt"), &root.path().join("d.md"), "markdown");
    assert_eq!(result.error_kind(), Some(ErrorKind::Security));

    let result = processor.process_file(
        &root.path().join("top.txt"),
        &root.path().join("top.md"),
        "markdown",
    );
    assert!(result.is_success());
}

#[test]
fn test_empty_roots_default_to_current_dir() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("a.txt"), "a").unwrap();

    let processor = create_processor("standard", &json!({})).unwrap();
    let cwd = std::env::current_dir().unwrap();
    if root.path().starts_with(&cwd) {
        return;
    }
    let result = processor.process_file(
        &root.path().join("a.txt"),
        &root.path().join("a.md"),
        "markdown",
    );
    assert_eq!(result.error_kind(), Some(ErrorKind::Security));
}

#[test]
fn test_invalid_symlink_policy_is_config_error() {
    let root = TempDir::new().unwrap();
    let err = create_processor(
        "standard",
        &json!({ "security": { "allowed_roots": [root.path()], "symlink_policy": "sometimes" } }),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[cfg(unix)]
mod symlinks {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_deny_rejects_links_inside_root() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("real.txt"), "real").unwrap();
        symlink(root.path().join("real.txt"), root.path().join("link.txt")).unwrap();

        let processor = sandboxed(root.path(), json!({ "symlink_policy": "deny" }));
        let result = processor.process_file(
            &root.path().join("link.txt"),
            &root.path().join("link.md"),
            "markdown",
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::Security));

        let result = processor.process_file(
            &root.path().join("real.txt"),
            &root.path().join("real.md"),
            "markdown",
        );
        assert!(result.is_success());
    }

    #[test]
    fn test_resolve_rechecks_target() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        fs::write(root.path().join("real.txt"), "real").unwrap();
        symlink(outside.path().join("secret.txt"), root.path().join("escape.txt")).unwrap();
        symlink(root.path().join("real.txt"), root.path().join("inside.txt")).unwrap();

        let processor = sandboxed(root.path(), json!({ "symlink_policy": "resolve" }));
        let result = processor.process_file(
            &root.path().join("escape.txt"),
            &root.path().join("escape.md"),
            "markdown",
        );
        assert_eq!(result.error_kind(), Some(ErrorKind::Security));

        let result = processor.process_file(
            &root.path().join("inside.txt"),
            &root.path().join("inside.md"),
            "markdown",
        );
        assert!(result.is_success());
        assert_eq!(
            fs::read_to_string(root.path().join("inside.md")).unwrap(),
            "real\n"
        );
    }

    #[test]
    fn test_allow_follows_links() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("shared.txt"), "shared").unwrap();
        symlink(outside.path().join("shared.txt"), root.path().join("shared.txt")).unwrap();

        let processor = sandboxed(root.path(), json!({ "symlink_policy": "allow" }));
        let result = processor.process_file(
            &root.path().join("shared.txt"),
            &root.path().join("shared.md"),
            "markdown",
        );
        assert!(result.is_success(), "{:?}", result.error());
    }

    #[test]
    fn test_parent_reference_cannot_reach_through_link() {
        let root = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "top secret").unwrap();
        symlink(outside.path(), root.path().join("link")).unwrap();
        let sneaky_input = root.path().join("missing/../link/secret.txt");
        let sneaky_output = root.path().join("missing/../link/planted.md");

        for (profile, policy) in [("standard", "resolve"), ("strict", "deny")] {
            let processor = create_processor(
                profile,
                &json!({ "security": { "allowed_roots": [root.path()], "symlink_policy": policy } }),
            )
            .unwrap();

            let output = root.path().join("out.md");
            let result = processor.process_file(&sneaky_input, &output, "markdown");
            assert_eq!(result.error_kind(), Some(ErrorKind::Security), "{}", policy);
            assert!(!output.exists());

            fs::write(root.path().join("note.txt"), "note").unwrap();
            let result =
                processor.process_file(&root.path().join("note.txt"), &sneaky_output, "markdown");
            assert_eq!(result.error_kind(), Some(ErrorKind::Security), "{}", policy);
            assert!(!outside.path().join("planted.md").exists());
        }
    }
}

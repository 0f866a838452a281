//! Safe operations through the exported bindings surface.

mod common;

use std::sync::Arc;

use kickpass_core::{Context, ContextConfig, KickPassError, Safe, PASSWORD_MAX};

#[test]
fn test_round_trip() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    assert!(!safe.is_open().expect("is_open"));

    safe.open(true, false).expect("create");
    assert!(safe.is_open().expect("is_open"));
    assert_eq!(safe.password().expect("password"), Some(String::new()));
    assert_eq!(safe.metadata().expect("metadata"), Some(String::new()));

    safe.set_password("p1".to_string()).expect("set password");
    safe.set_metadata("m1".to_string()).expect("set metadata");
    safe.save().expect("save");
    safe.close().expect("close");

    safe.open(false, false).expect("reopen");
    assert_eq!(safe.password().expect("password").as_deref(), Some("p1"));
    assert_eq!(safe.metadata().expect("metadata").as_deref(), Some("m1"));
}

#[test]
fn test_reopen_from_another_handle() {
    let ws = common::workspace("master password");
    {
        let safe = Safe::new(ws.context.clone(), "shared".to_string()).expect("safe");
        safe.open(true, false).expect("create");
        safe.set_password("secret".to_string()).expect("set password");
        safe.save().expect("save");
    }

    let safe = Safe::new(ws.context.clone(), "shared".to_string()).expect("safe");
    safe.open(false, false).expect("open");
    assert_eq!(safe.password().expect("password").as_deref(), Some("secret"));
}

#[test]
fn test_closed_safe_has_no_fields() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    assert_eq!(safe.password().expect("password"), None);
    assert_eq!(safe.metadata().expect("metadata"), None);

    safe.open(true, false).expect("create");
    safe.set_password("hidden".to_string()).expect("set password");
    safe.close().expect("close");
    assert_eq!(safe.password().expect("password"), None);
    assert_eq!(safe.metadata().expect("metadata"), None);
}

#[test]
fn test_close_is_idempotent() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.close().expect("close closed");
    safe.open(true, false).expect("create");
    safe.close().expect("first close");
    assert!(!safe.is_open().expect("is_open"));
    safe.close().expect("second close");
    assert!(!safe.is_open().expect("is_open"));
}

#[test]
fn test_open_missing_without_create() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "missing".to_string()).expect("safe");
    let err = safe.open(false, false).expect_err("missing safe");
    match err {
        KickPassError::Open(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!safe.is_open().expect("is_open"));
    assert_eq!(ws.prompt.call_count(), 0);
}

#[test]
fn test_create_prompts_for_confirmation() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "mail".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    let (confirm, prompt) = ws.prompt.last_call().expect("prompted");
    assert!(confirm);
    assert!(prompt.contains("'mail'"), "{prompt}");

    safe.save().expect("save");
    safe.close().expect("close");
    safe.open(false, false).expect("open");
    let (confirm, _) = ws.prompt.last_call().expect("prompted");
    assert!(!confirm);
    assert_eq!(ws.prompt.call_count(), 2);
}

#[test]
fn test_create_existing_needs_force() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.set_password("old".to_string()).expect("set password");
    safe.save().expect("save");
    safe.close().expect("close");

    let err = safe.open(true, false).expect_err("exists");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
    assert!(!safe.is_open().expect("is_open"));

    safe.open(true, true).expect("forced create");
    assert_eq!(safe.password().expect("password"), Some(String::new()));
}

#[test]
fn test_wrong_master_password() {
    let ws = common::workspace("right");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.save().expect("save");
    safe.close().expect("close");

    ws.prompt.push(Ok("wrong".to_string()));
    let err = safe.open(false, false).expect_err("wrong password");
    match err {
        KickPassError::Open(message) => assert_eq!(message, "cannot decrypt safe"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!safe.is_open().expect("is_open"));
}

#[test]
fn test_prompt_failure_is_reported_once() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");

    ws.prompt
        .push(Err(KickPassError::HostOriginated("cancelled".to_string())));
    let err = safe.open(true, false).expect_err("cancelled");
    match err {
        KickPassError::HostOriginated(message) => assert_eq!(message, "cancelled"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!safe.is_open().expect("is_open"));

    // Nothing is left pending: the next failure is the engine's own.
    let err = safe.open(false, false).expect_err("still missing");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
}

#[test]
fn test_prompt_failure_aborts_delete() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.save().expect("save");
    safe.close().expect("close");

    ws.prompt
        .push(Err(KickPassError::HostOriginated("no".to_string())));
    let err = safe.delete().expect_err("cancelled");
    assert!(matches!(err, KickPassError::HostOriginated(_)), "{err:?}");
    assert!(std::path::Path::new(&safe.path().expect("path")).exists());
}

#[test]
fn test_prompt_answer_too_long() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    ws.prompt.push(Ok("x".repeat(PASSWORD_MAX)));
    let err = safe.open(true, false).expect_err("too long");
    assert!(matches!(err, KickPassError::Capacity(_)), "{err:?}");
    assert!(!safe.is_open().expect("is_open"));
}

#[test]
fn test_missing_prompt_handler_fails_when_needed() {
    let root = tempfile::tempdir().expect("tempdir");
    let context = Context::with_config(ContextConfig {
        workspace: Some(root.path().display().to_string()),
        kdf_memory_kib: Some(64),
        kdf_iterations: Some(1),
    })
    .expect("context without handler");
    let safe = Safe::new(context, "test".to_string()).expect("bind without handler");
    let err = safe.open(true, false).expect_err("no handler");
    match err {
        KickPassError::Open(message) => assert_eq!(message, "no password prompt configured"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_capacity_bound() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");

    let fits = "a".repeat(PASSWORD_MAX - 1);
    safe.set_password(fits.clone()).expect("fits");
    safe.set_metadata(fits.clone()).expect("fits");

    for value in ["a".repeat(PASSWORD_MAX), "a".repeat(PASSWORD_MAX + 1)] {
        let err = safe.set_password(value.clone()).expect_err("password too long");
        assert!(matches!(err, KickPassError::Capacity(_)), "{err:?}");
        let err = safe.set_metadata(value).expect_err("metadata too long");
        assert!(matches!(err, KickPassError::Capacity(_)), "{err:?}");
    }
    assert_eq!(safe.password().expect("password"), Some(fits.clone()));
    assert_eq!(safe.metadata().expect("metadata"), Some(fits));
}

#[test]
fn test_setters_need_open_safe() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    let err = safe.set_password("p".to_string()).expect_err("closed");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
    let err = safe.set_metadata("m".to_string()).expect_err("closed");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
}

#[test]
fn test_save_needs_open_safe() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    let err = safe.save().expect_err("closed");
    assert!(matches!(err, KickPassError::Save(_)), "{err:?}");
}

#[test]
fn test_delete_keeps_safe_open() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.set_password("p1".to_string()).expect("set password");
    safe.save().expect("save");
    let path = safe.path().expect("path");

    safe.delete().expect("delete");
    assert!(!std::path::Path::new(&path).exists());
    assert!(safe.is_open().expect("is_open"));
    assert_eq!(safe.password().expect("password").as_deref(), Some("p1"));

    let err = safe.delete().expect_err("already deleted");
    assert!(matches!(err, KickPassError::Delete(_)), "{err:?}");
}

#[test]
fn test_delete_closed_safe_authenticates() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.save().expect("save");
    safe.close().expect("close");

    ws.prompt.push(Ok("wrong".to_string()));
    let err = safe.delete().expect_err("wrong password");
    assert!(matches!(err, KickPassError::Delete(_)), "{err:?}");

    safe.delete().expect("delete");
    assert!(!std::path::Path::new(&safe.path().expect("path")).exists());
}

#[test]
fn test_rename_updates_path() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "old-name".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.save().expect("save");
    let old_path = safe.path().expect("path");

    safe.rename("new-name".to_string()).expect("rename");
    assert_eq!(safe.name().expect("name"), "new-name");
    let new_path = safe.path().expect("path");
    assert!(new_path.ends_with("new-name"), "{new_path}");
    assert!(std::path::Path::new(&new_path).exists());
    assert!(!std::path::Path::new(&old_path).exists());
}

#[test]
fn test_rename_collision_keeps_name() {
    let ws = common::workspace("master password");
    let taken = Safe::new(ws.context.clone(), "taken".to_string()).expect("safe");
    taken.open(true, false).expect("create");
    taken.save().expect("save");

    let safe = Safe::new(ws.context.clone(), "mine".to_string()).expect("safe");
    let err = safe.rename("taken".to_string()).expect_err("collision");
    match err {
        KickPassError::Rename(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(safe.name().expect("name"), "mine");
    assert!(safe.path().expect("path").ends_with("mine"));

    let err = safe.rename("../escape".to_string()).expect_err("invalid");
    assert!(matches!(err, KickPassError::Rename(_)), "{err:?}");
    assert_eq!(safe.name().expect("name"), "mine");
}

#[test]
fn test_invalid_names_fail_to_bind() {
    let ws = common::workspace("master password");
    for name in ["", "/etc/passwd", "../escape"] {
        let err = Safe::new(ws.context.clone(), name.to_string()).expect_err(name);
        assert!(matches!(err, KickPassError::Bind(_)), "{name:?}: {err:?}");
    }
}

#[test]
fn test_destroy_closes_safes() {
    let ws = common::workspace("master password");
    let open = Safe::new(ws.context.clone(), "open".to_string()).expect("safe");
    open.open(true, false).expect("create");
    open.set_password("secret".to_string()).expect("set password");
    let closed = Safe::new(ws.context.clone(), "closed".to_string()).expect("safe");
    closed.close().expect("close");

    ws.context.destroy().expect("destroy");
    assert!(!open.is_open().expect("is_open"));
    assert_eq!(open.password().expect("password"), None);
    open.close().expect("close after destroy");

    let err = open.open(false, false).expect_err("destroyed");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
    let err = open.set_password("p".to_string()).expect_err("destroyed");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
    let err = Safe::new(ws.context.clone(), "late".to_string()).expect_err("destroyed");
    assert!(matches!(err, KickPassError::Bind(_)), "{err:?}");

    ws.context.destroy().expect("second destroy");
}

#[test]
fn test_safe_keeps_context_alive() {
    let ws = common::workspace("master password");
    let context = Arc::clone(&ws.context);
    let safe = Safe::new(context, "test".to_string()).expect("safe");
    drop(ws.context);
    assert!(Arc::ptr_eq(&safe.context(), &safe.context()));
    assert!(!safe.context().is_destroyed());
    safe.open(true, false).expect("create");
}

#[test]
fn test_failed_reopen_keeps_safe_open() {
    let ws = common::workspace("right");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.set_password("p1".to_string()).expect("set password");
    safe.save().expect("save");

    ws.prompt.push(Ok("wrong".to_string()));
    let err = safe.open(false, false).expect_err("wrong password");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");
    assert!(safe.is_open().expect("is_open"));
    assert_eq!(safe.password().expect("password").as_deref(), Some("p1"));
}

#[test]
fn test_failed_save_keeps_previous_file() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    safe.open(true, false).expect("create");
    safe.set_password("p1".to_string()).expect("set password");
    safe.save().expect("save");
    let path = safe.path().expect("path");
    let persisted = std::fs::read(&path).expect("read");

    let workspace = ws.root.path().join(".kickpass");
    let moved = ws.root.path().join("moved");
    std::fs::rename(&workspace, &moved).expect("move workspace");
    safe.set_password("p2".to_string()).expect("set password");
    let err = safe.save().expect_err("no workspace");
    std::fs::rename(&moved, &workspace).expect("restore workspace");
    assert!(matches!(err, KickPassError::Save(_)), "{err:?}");

    assert_eq!(std::fs::read(&path).expect("read"), persisted);
    safe.close().expect("close");
    safe.open(false, false).expect("reopen");
    assert_eq!(safe.password().expect("password").as_deref(), Some("p1"));
}

#[test]
fn test_delete_corrupted_safe() {
    let ws = common::workspace("master password");
    let safe = Safe::new(ws.context.clone(), "test".to_string()).expect("safe");
    let path = safe.path().expect("path");
    std::fs::write(&path, b"truncated").expect("write");

    let err = safe.open(false, false).expect_err("corrupted");
    assert!(matches!(err, KickPassError::Open(_)), "{err:?}");

    safe.delete().expect("delete");
    assert!(!std::path::Path::new(&path).exists());
    assert_eq!(ws.prompt.call_count(), 0);
}

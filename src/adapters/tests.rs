use super::*;
use crate::config::ModuleConfig;
use crate::execution::{ExecutionContext, ExecutionError, ExecutionResult};
use crate::interpreter::{Engine, EngineError, EngineOptions};
use crate::replacer::{ORIGINAL_URI_PATH, REQUEST_URI_PATH};
use http::Request;
use std::path::PathBuf;

struct EchoEngine;

impl Engine for EchoEngine {
    fn init(&self, _options: &EngineOptions) -> Result<(), EngineError> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn execute(
        &self,
        ctx: ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        if !ctx.script_path.is_file() {
            return Err(ExecutionError::ScriptNotFound(ctx.script_path));
        }

        let body = format!(
            "{} {}",
            ctx.script_name,
            ctx.var("REQUEST_URI").unwrap_or_default()
        );
        Ok(ExecutionResult::new(200, body.into_bytes(), Vec::new()))
    }
}

fn php_module(root: &str) -> ModuleConfig {
    ModuleConfig {
        root: root.to_string(),
        split_path: vec![".php".to_string()],
        ..Default::default()
    }
}

#[test]
fn test_scope_keeps_original_uri() {
    let req = Request::get("/blog/?page=2").body(()).unwrap();
    let scope = RequestScope::new(&req).with_root("/srv/www");

    assert_eq!(scope.original_uri().path(), "/blog/");
    assert_eq!(scope.replacer().get(ORIGINAL_URI_PATH).unwrap(), "/blog/");
    assert_eq!(scope.replacer().get(REQUEST_URI_PATH).unwrap(), "/blog/");
    assert_eq!(
        scope.replacer().replace_known("{http.vars.root}", ""),
        "/srv/www"
    );
}

#[test]
fn test_build_splits_path_info() {
    let dir = tempfile::tempdir().unwrap();

    let ctx = WebRequest::get()
        .with_uri("/index.php/extra/path?x=1")
        .with_document_root(dir.path())
        .with_split_path([".php"])
        .build()
        .unwrap();

    assert_eq!(ctx.script_name, "/index.php");
    assert_eq!(ctx.path_info, "/extra/path");
    assert_eq!(ctx.script_path, dir.path().join("index.php"));

    let vars = &ctx.server_vars;
    assert_eq!(vars.get("SCRIPT_NAME"), Some("/index.php"));
    assert_eq!(vars.get("PATH_INFO"), Some("/extra/path"));
    assert_eq!(vars.get("QUERY_STRING"), Some("x=1"));
    assert_eq!(vars.get("REQUEST_URI"), Some("/index.php/extra/path?x=1"));
    assert_eq!(vars.get("SERVER_PORT"), Some("80"));
    assert_eq!(
        vars.get("PATH_TRANSLATED").map(PathBuf::from),
        Some(PathBuf::from(format!("{}/extra/path", dir.path().display())))
    );
}

#[test]
fn test_build_without_split_match() {
    let ctx = WebRequest::get()
        .with_uri("/style.css")
        .with_document_root("/srv/www")
        .with_split_path([".php"])
        .build()
        .unwrap();

    assert_eq!(ctx.script_name, "/style.css");
    assert!(ctx.path_info.is_empty());
    assert!(ctx.server_vars.get("PATH_INFO").is_none());
}

#[test]
fn test_relative_document_root_is_made_absolute() {
    let ctx = WebRequest::get()
        .with_document_root("public")
        .build()
        .unwrap();

    assert!(ctx.document_root.is_absolute());
    assert_eq!(
        ctx.document_root,
        std::env::current_dir().unwrap().join("public")
    );
}

#[test]
fn test_unresolvable_document_root() {
    let err = WebRequest::get()
        .with_document_root("/definitely/does/not/exist")
        .with_resolve_root_symlink(true)
        .build()
        .unwrap_err();

    assert!(matches!(err, RequestError::DocumentRoot { ref path, .. }
        if path == std::path::Path::new("/definitely/does/not/exist")));
}

#[cfg(unix)]
#[test]
fn test_document_root_symlink_is_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let real = dir.path().join("real");
    let link = dir.path().join("link");
    std::fs::create_dir(&real).unwrap();
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let resolved = WebRequest::get()
        .with_document_root(&link)
        .with_resolve_root_symlink(true)
        .build()
        .unwrap();
    assert_eq!(resolved.document_root, std::fs::canonicalize(&real).unwrap());

    let kept = WebRequest::get()
        .with_document_root(&link)
        .build()
        .unwrap();
    assert_eq!(kept.document_root, link);
}

#[test]
fn test_from_http_request() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().into_owned();

    let mut module = php_module("{http.vars.root}");
    module
        .env
        .insert("SITE".to_string(), "{http.request.host}".to_string());
    module
        .env
        .insert("KEEP".to_string(), "{not.known}".to_string());

    let req = Request::post("/app.php?id=1")
        .header("Host", "example.com:8080")
        .header("Content-Type", "text/plain")
        .body(b"payload".to_vec())
        .unwrap();
    let scope = RequestScope::new(&req).with_root(root.as_str());

    let ctx = from_http_request(&module, &req, &scope).unwrap();

    assert_eq!(ctx.document_root, dir.path());
    assert_eq!(ctx.input, b"payload");
    assert_eq!(ctx.env_vars["REQUEST_URI"], "/app.php?id=1");
    assert_eq!(ctx.env_vars["SITE"], "example.com:8080");
    assert_eq!(ctx.env_vars["KEEP"], "{not.known}");

    let vars = &ctx.server_vars;
    assert_eq!(vars.get("REQUEST_METHOD"), Some("POST"));
    assert_eq!(vars.get("SERVER_NAME"), Some("example.com"));
    assert_eq!(vars.get("SERVER_PORT"), Some("8080"));
    assert_eq!(vars.get("SERVER_PROTOCOL"), Some("HTTP/1.1"));
    assert_eq!(vars.get("CONTENT_TYPE"), Some("text/plain"));
    assert_eq!(vars.get("CONTENT_LENGTH"), Some("7"));
    assert_eq!(vars.get("HTTP_HOST"), Some("example.com:8080"));
}

#[test]
fn test_env_request_uri_comes_from_original_request() {
    let original = Request::get("/blog/?page=2").body(()).unwrap();
    let scope = RequestScope::new(&original).with_root("/srv/www");

    let rewritten = Request::get("/index.php?page=2")
        .body(Vec::new())
        .unwrap();

    let ctx = from_http_request(&php_module("/srv/www"), &rewritten, &scope).unwrap();

    assert_eq!(ctx.env_vars["REQUEST_URI"], "/blog/?page=2");
    assert_eq!(ctx.server_vars.get("REQUEST_URI"), Some("/index.php?page=2"));
    assert_eq!(ctx.script_name, "/index.php");
    assert_eq!(ctx.var("REQUEST_URI"), Some("/blog/?page=2"));
}

#[test]
fn test_serve_runs_engine() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.php"), "<?php").unwrap();
    let root = dir.path().to_string_lossy().into_owned();

    let req = Request::get("/index.php").body(Vec::new()).unwrap();
    let scope = RequestScope::new(&req);

    let result = serve(&php_module(&root), &req, &scope, &EchoEngine).unwrap();
    assert_eq!(result.status, 200);
    assert_eq!(result.body_string(), "/index.php /index.php");

    let missing = Request::get("/missing.php").body(Vec::new()).unwrap();
    let scope = RequestScope::new(&missing);

    let err = serve(&php_module(&root), &missing, &scope, &EchoEngine).unwrap_err();
    assert!(matches!(
        err,
        RequestError::Execution(ExecutionError::ScriptNotFound(_))
    ));
}

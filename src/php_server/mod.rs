//! The `php_server` shorthand.
//!
//! A line such as
//!
//! ```text
//! php_server
//! ```
//!
//! expands to the following routes, in this order:
//!
//! ```text
//! # add a trailing slash to directory requests that have an index file
//! @canonicalPath {
//!     file {path}/index.php
//!     not path */
//! }
//! redir @canonicalPath {orig_path}/ 308
//!
//! # serve the index file when the requested file does not exist
//! @indexFiles file {
//!     try_files {path} {path}/index.php index.php
//!     split_path .php
//! }
//! rewrite @indexFiles {file_match.relative}
//!
//! @phpFiles path *.php
//! php @phpFiles
//!
//! file_server
//! ```
//!
//! The block is read in two passes: overrides are extracted first, then the
//! remaining entries are handed to the `php` handler's own parser.

mod overrides;

pub use overrides::{
    is_override, IndexFile, ServerOverrides, DEFAULT_INDEX_FILE, OVERRIDE_NAMES,
};

use http::StatusCode;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::config::{ConfigError, ModuleConfig, ParseContext};
use crate::directive::Directive;
use crate::replacer::{FILE_MATCH_RELATIVE, ORIGINAL_URI_PATH, REQUEST_URI_PATH};
use crate::routing::{
    FileMatcher, FileServer, Handler, MatcherSet, PathMatcher, Redirect, Rewrite,
    Route, Subroute,
};

/// Compiles a `php_server` directive into routes.
///
/// Without a leading matcher the routes are returned flat, in evaluation
/// order. With one, a single route guarded by it wraps them in a subroute.
pub fn compile(
    directive: &Directive,
    ctx: &ParseContext,
) -> Result<Vec<Route>, ConfigError> {
    let (user_matcher, consumed) = ctx.extract_matcher(directive)?;
    if directive.args.len() > consumed {
        return Err(ConfigError::argument_count(directive));
    }

    let overrides = ServerOverrides::extract(directive)?;

    let nesting = directive.nesting + 1;
    let passthrough = directive.retain_block(|entry| !is_override(entry, nesting));

    // root as written; provision resolves it and, for the embedded default,
    // turns symlink resolution off after the passthrough has been applied
    let mut php = ModuleConfig {
        root: overrides.root.clone().unwrap_or_default(),
        split_path: overrides.extensions.clone(),
        ..Default::default()
    };
    php.apply(&passthrough)?;
    php.provision(ctx);

    let root = match overrides.root.as_deref() {
        None => ctx.embedded_document_root(),
        Some(explicit) => Some(ctx.resolve_local(explicit)),
    };

    let mut routes = Vec::with_capacity(4);

    if let IndexFile::Name(index) = &overrides.index {
        routes.push(redirect_route(root.as_deref(), index));
        routes.push(rewrite_route(root.as_deref(), index, &overrides));
    }

    routes.push(Route::new(
        Some(MatcherSet::path(PathMatcher::extensions(
            &overrides.extensions,
        ))),
        Handler::Dispatch(php),
    ));

    if overrides.file_server {
        routes.push(Route::new(
            None,
            Handler::StaticFallback(FileServer { root }),
        ));
    }

    #[cfg(feature = "tracing")]
    debug!(
        line = directive.line,
        routes = routes.len(),
        index = matches!(overrides.index, IndexFile::Name(_)),
        file_server = overrides.file_server,
        wrapped = user_matcher.is_some(),
        "Compiled php_server"
    );

    Ok(match user_matcher {
        Some(matcher) => vec![Route::new(
            Some(matcher),
            Handler::Subroute(Subroute { routes }),
        )],
        None => routes,
    })
}

fn placeholder(key: &str) -> String {
    format!("{{{}}}", key)
}

fn redirect_route(root: Option<&str>, index: &str) -> Route {
    let matcher = MatcherSet::file(FileMatcher {
        root: root.map(str::to_string),
        try_files: vec![format!("{}/{}", placeholder(REQUEST_URI_PATH), index)],
        split_path: Vec::new(),
    })
    .and_not(MatcherSet::path(PathMatcher::new(["*/"])));

    Route::new(
        Some(matcher),
        Handler::Redirect(Redirect {
            status_code: StatusCode::PERMANENT_REDIRECT.as_u16(),
            location: format!("{}/", placeholder(ORIGINAL_URI_PATH)),
        }),
    )
}

fn rewrite_route(
    root: Option<&str>,
    index: &str,
    overrides: &ServerOverrides,
) -> Route {
    let try_files = if overrides.try_files.is_empty() {
        let path = placeholder(REQUEST_URI_PATH);
        vec![path.clone(), format!("{}/{}", path, index), index.to_string()]
    } else {
        overrides.try_files.clone()
    };

    let matcher = MatcherSet::file(FileMatcher {
        root: root.map(str::to_string),
        try_files,
        split_path: overrides.extensions.clone(),
    });

    Route::new(
        Some(matcher),
        Handler::Rewrite(Rewrite {
            uri: placeholder(FILE_MATCH_RELATIVE),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_str(input: &str, ctx: &ParseContext) -> Result<Vec<Route>, ConfigError> {
        let parsed = Directive::parse_str(input).unwrap();
        compile(&parsed[0], ctx)
    }

    fn kinds(routes: &[Route]) -> Vec<&'static str> {
        routes
            .iter()
            .map(|r| r.handler.kind())
            .collect()
    }

    #[test]
    fn test_default_expansion() {
        let routes = compile_str("php_server", &ParseContext::new()).unwrap();

        assert_eq!(
            kinds(&routes),
            ["redirect", "rewrite", "dispatch", "static_fallback"]
        );

        let Handler::Redirect(redirect) = &routes[0].handler else {
            panic!("expected redirect");
        };
        assert_eq!(redirect.status_code, 308);
        assert_eq!(redirect.location, "{http.request.orig_uri.path}/");

        let redirect_matcher = routes[0].matcher.as_ref().unwrap();
        assert_eq!(
            redirect_matcher.file.as_ref().unwrap().try_files,
            ["{http.request.uri.path}/index.php"]
        );
        assert_eq!(
            redirect_matcher.not[0].path.as_ref().unwrap().patterns(),
            ["*/"]
        );

        let rewrite_matcher = routes[1].matcher.as_ref().unwrap();
        let file = rewrite_matcher.file.as_ref().unwrap();
        assert_eq!(
            file.try_files,
            [
                "{http.request.uri.path}",
                "{http.request.uri.path}/index.php",
                "index.php"
            ]
        );
        assert_eq!(file.split_path, [".php"]);

        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "{http.vars.root}");
        assert_eq!(php.split_path, [".php"]);

        assert!(routes[3].matcher.is_none());
    }

    #[test]
    fn test_passthrough_reaches_php_handler() {
        let routes = compile_str(
            "php_server {\n\
                 root /srv/app\n\
                 env APP_ENV prod\n\
                 resolve_root_symlink\n\
             }",
            &ParseContext::new(),
        )
        .unwrap();

        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "/srv/app");
        assert!(php.resolve_root_symlink);
        assert_eq!(php.env.get("APP_ENV").map(String::as_str), Some("prod"));

        let Handler::StaticFallback(files) = &routes[3].handler else {
            panic!("expected file server");
        };
        assert_eq!(files.root.as_deref(), Some("/srv/app"));
    }

    #[test]
    fn test_unknown_passthrough_is_rejected() {
        let err = compile_str("php_server {\n bogus 1\n}", &ParseContext::new())
            .unwrap_err();

        assert!(matches!(err, ConfigError::UnknownSubdirective { ref name, .. } if name == "bogus"));
    }

    #[test]
    fn test_extra_arguments_are_rejected() {
        let err = compile_str("php_server /api/* extra", &ParseContext::new())
            .unwrap_err();

        assert_eq!(
            err,
            ConfigError::ArgumentCount {
                directive: "php_server".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn test_embedded_root_resolution() {
        let ctx = ParseContext::new().with_embedded_app("/tmp/embed");

        let routes = compile_str("php_server", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "/tmp/embed/public");
        assert!(!php.resolve_root_symlink);

        let routes = compile_str("php_server {\n root web\n}", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "/tmp/embed/web");
        assert_eq!(
            routes[1].matcher.as_ref().unwrap().file.as_ref().unwrap().root.as_deref(),
            Some("/tmp/embed/web")
        );

        let routes = compile_str("php_server {\n root /abs\n}", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "/abs");
    }

    #[test]
    fn test_embedded_default_root_never_resolves_symlinks() {
        let ctx = ParseContext::new().with_embedded_app("/tmp/embed");

        let routes = compile_str("php_server {\n resolve_root_symlink\n}", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "/tmp/embed/public");
        assert!(!php.resolve_root_symlink);

        let routes =
            compile_str("php_server {\n root web\n resolve_root_symlink\n}", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert!(php.resolve_root_symlink);
    }

    #[test]
    fn test_relative_embedded_base_is_joined_once() {
        let ctx = ParseContext::new().with_embedded_app("app");

        let routes = compile_str("php_server {\n root web\n}", &ctx).unwrap();
        let Handler::Dispatch(php) = &routes[2].handler else {
            panic!("expected dispatch");
        };
        assert_eq!(php.root, "app/web");
        assert_eq!(
            routes[1].matcher.as_ref().unwrap().file.as_ref().unwrap().root.as_deref(),
            Some("app/web")
        );
    }
}

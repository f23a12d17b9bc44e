use std::path::{Path, PathBuf};

use http::{Request, Uri};

#[cfg(feature = "tracing")]
use tracing::trace;

use super::{clean_path, join_root, Handler, Route};
use crate::adapters::{serve, RequestError, RequestScope};
use crate::config::ROOT_PLACEHOLDER;
use crate::execution::ExecutionResult;
use crate::interpreter::Engine;

/// What evaluating the routes decided for a request.
#[derive(Debug)]
pub enum Outcome {
    Redirect { status: u16, location: String },
    Executed(ExecutionResult),
    ServeFile(PathBuf),
    NotHandled,
}

/// Sequential route evaluator.
///
/// Routes run in order. A rewrite changes the request and evaluation goes
/// on; redirect, dispatch and static fallback end it. A subroute that ends
/// without a terminal handler lets evaluation continue after it.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn handle<B, E>(
        &self,
        req: &mut Request<B>,
        scope: &mut RequestScope,
        engine: &E,
    ) -> Result<Outcome, RequestError>
    where
        B: AsRef<[u8]>,
        E: Engine + ?Sized,
    {
        evaluate(&self.routes, req, scope, engine)
    }
}

fn evaluate<B, E>(
    routes: &[Route],
    req: &mut Request<B>,
    scope: &mut RequestScope,
    engine: &E,
) -> Result<Outcome, RequestError>
where
    B: AsRef<[u8]>,
    E: Engine + ?Sized,
{
    for route in routes {
        if let Some(matcher) = &route.matcher {
            let matched = matcher.matches(req, scope.replacer_mut());

            #[cfg(feature = "tracing")]
            trace!(
                path = req.uri().path(),
                handler = route.handler.kind(),
                matched,
                "Route evaluated"
            );

            if !matched {
                continue;
            }
        }

        match &route.handler {
            Handler::Rewrite(rewrite) => {
                apply_rewrite(req, scope, &rewrite.uri)?;
            }

            Handler::Redirect(redirect) => {
                return Ok(Outcome::Redirect {
                    status: redirect.status_code,
                    location: scope
                        .replacer()
                        .replace_known(&redirect.location, ""),
                });
            }

            Handler::Dispatch(module) => {
                return serve(module, req, scope, engine).map(Outcome::Executed);
            }

            Handler::StaticFallback(files) => {
                let root = scope.replacer().replace_all(
                    files
                        .root
                        .as_deref()
                        .unwrap_or(ROOT_PLACEHOLDER),
                    ".",
                );
                let path = join_root(Path::new(&root), &clean_path(req.uri().path()));
                return Ok(Outcome::ServeFile(path));
            }

            Handler::Subroute(subroute) => {
                match evaluate(&subroute.routes, req, scope, engine)? {
                    Outcome::NotHandled => {}
                    outcome => return Ok(outcome),
                }
            }
        }
    }

    Ok(Outcome::NotHandled)
}

/// Replaces the request URI. The original query is kept unless the new URI
/// carries its own.
fn apply_rewrite<B>(
    req: &mut Request<B>,
    scope: &mut RequestScope,
    template: &str,
) -> Result<(), RequestError> {
    let mut target = scope.replacer().replace_all(template, "");

    if !target.contains('?') {
        if let Some(query) = req.uri().query() {
            target.push('?');
            target.push_str(query);
        }
    }

    let uri: Uri = target
        .parse()
        .map_err(|e: http::uri::InvalidUri| RequestError::InvalidRewrite {
            uri: target.clone(),
            reason: e.to_string(),
        })?;

    #[cfg(feature = "tracing")]
    trace!(from = %req.uri(), to = %uri, "Rewriting request");

    *req.uri_mut() = uri;
    scope
        .replacer_mut()
        .set_request(req);

    Ok(())
}

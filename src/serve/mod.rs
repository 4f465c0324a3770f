//! HTTP front end.
//!
//! Files under `public_dir` are served directly. Every other request is
//! converted into a [`Request`], dispatched through the [`Router`] on tokio's
//! blocking pool and written back as a hyper response.

mod server_constants;

use std::convert::Infallible;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::controller::{Request, Response};
use crate::error::WallabyError;
use crate::fault::page::STATIC_500;
use crate::router::Router;

pub use server_constants::{
    etag_matches, generate_etag, get_mime_type, STATIC_CACHE_MAX_AGE, STATIC_NO_CACHE,
};

type HttpResponse = hyper::Response<Full<Bytes>>;

/// Everything a connection task needs.
pub struct ServerState {
    pub router: Router,
    pub public_dir: PathBuf,
    /// Debug mode disables long-lived caching of static files.
    pub debug: bool,
}

impl ServerState {
    pub fn new(config: &Config, router: Router) -> Self {
        Self {
            router,
            public_dir: config.app.public_dir.clone(),
            debug: config.app.debug,
        }
    }
}

/// Run the server on `config.app.port` until the process is stopped.
pub fn serve(config: &Config, router: Router) -> Result<(), WallabyError> {
    let port = config.app.port;
    let state = Arc::new(ServerState::new(config, router));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(state, port))
}

async fn run(state: Arc<ServerState>, port: u16) -> Result<(), WallabyError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| WallabyError::Server(format!("cannot bind {}: {}", addr, e)))?;

    info!(%addr, debug = state.debug, "listening");
    if state.public_dir.is_dir() {
        info!(public_dir = %state.public_dir.display(), "serving static files");
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(respond(state, req).await) }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%peer, error = %e, "connection closed with error");
            }
        });
    }
}

/// Answer one request. The body of incoming requests is never read.
pub async fn respond<B>(state: Arc<ServerState>, req: hyper::Request<B>) -> HttpResponse {
    let head_only = req.method() == Method::HEAD;

    if matches!(*req.method(), Method::GET | Method::HEAD) {
        if let Some(file) = static_file(&state.public_dir, req.uri().path()) {
            let if_none_match = req
                .headers()
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok());
            return serve_static(&file, if_none_match, state.debug, head_only);
        }
    }

    let request = to_request(&req);
    let method = request.method.clone();
    let path = request.path.clone();

    let worker = state.clone();
    let dispatched =
        tokio::task::spawn_blocking(move || worker.router.dispatch_request(&request)).await;
    let response = match dispatched {
        Ok(dispatch) => {
            if dispatch.faulted {
                warn!(%method, %path, status = dispatch.response.status, "request faulted");
            } else {
                info!(%method, %path, status = dispatch.response.status, "request");
            }
            dispatch.response
        }
        Err(e) => {
            error!(%method, %path, error = %e, "dispatch task failed");
            Response::text(500, STATIC_500)
        }
    };

    to_http_response(response, head_only)
}

/// The framework's view of a hyper request.
pub fn to_request<B>(req: &hyper::Request<B>) -> Request {
    let mut request = Request::get(req.uri().path()).with_method(req.method().as_str());
    request.query = req.uri().query().map(str::to_string);
    for (name, value) in req.headers() {
        match value.to_str() {
            Ok(value) => request = request.with_header(name.as_str(), value),
            Err(_) => debug!(header = %name, "skipping non-text request header"),
        }
    }
    request
}

pub fn to_http_response(response: Response, head_only: bool) -> HttpResponse {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = if head_only {
        Bytes::new()
    } else {
        Bytes::from(response.body)
    };
    build_response(status, &response.headers, body)
}

fn build_response(status: StatusCode, headers: &[(String, String)], body: Bytes) -> HttpResponse {
    let mut http = hyper::Response::new(Full::new(body));
    *http.status_mut() = status;
    for (name, value) in headers {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                http.headers_mut().append(name, value);
            }
            _ => warn!(header = %name, "dropping invalid response header"),
        }
    }
    http
}

/// The file under `public_dir` a URL path names, if it exists. Paths that
/// climb out of `public_dir` never match.
pub fn static_file(public_dir: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = url_path.trim_start_matches('/');
    if relative.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(relative).ok()?;
    if decoded.starts_with('/')
        || decoded.contains('\\')
        || decoded.split('/').any(|segment| segment == "..")
    {
        return None;
    }
    let file = public_dir.join(decoded.as_ref());
    file.is_file().then_some(file)
}

fn serve_static(
    file: &Path,
    if_none_match: Option<&str>,
    debug: bool,
    head_only: bool,
) -> HttpResponse {
    let cache_control = if debug { STATIC_NO_CACHE } else { STATIC_CACHE_MAX_AGE };
    let etag = fs::metadata(file)
        .and_then(|m| Ok(generate_etag(m.modified()?, m.len())))
        .ok();

    if let (Some(etag), Some(if_none_match)) = (&etag, if_none_match) {
        if etag_matches(if_none_match, etag) {
            let headers = [
                ("ETag".to_string(), etag.clone()),
                ("Cache-Control".to_string(), cache_control.to_string()),
            ];
            return build_response(StatusCode::NOT_MODIFIED, &headers, Bytes::new());
        }
    }

    let content = match fs::read(file) {
        Ok(content) => content,
        Err(e) => {
            error!(file = %file.display(), error = %e, "cannot read static file");
            return build_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &[],
                Bytes::from_static(b"Error reading file"),
            );
        }
    };

    let mut headers = vec![
        ("Content-Type".to_string(), get_mime_type(file).to_string()),
        ("Cache-Control".to_string(), cache_control.to_string()),
    ];
    if let Some(etag) = etag {
        headers.push(("ETag".to_string(), etag));
    }
    let body = if head_only { Bytes::new() } else { Bytes::from(content) };
    build_response(StatusCode::OK, &headers, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JsonErrors, RouteTarget, RouterConfig};
    use crate::controller::{ControllerDescriptor, ControllerRegistry};
    use crate::fault::{Fault, FaultPolicy};
    use crate::router::AppContext;
    use crate::template::LayoutAssets;
    use crate::view::ViewEnvironment;
    use http_body_util::BodyExt;
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> Arc<ServerState> {
        let routes = RouterConfig::new([(
            r"^(?P<controller>[a-z-]+)?/?(?P<action>[a-z-]+)?/?(?P<parameter>[^?]*)(?P<query>\?.*)?$".to_string(),
            RouteTarget::default(),
        )]);
        let registry = ControllerRegistry::new()
            .register(
                ControllerDescriptor::new("site")
                    .action("index", |c, p| {
                        c.write(&format!("home:{}", p.values().join(",")));
                        Ok(())
                    })
                    .action("fail", |_, _| Err(Fault::with_code("Gone", 410))),
            )
            .register(ControllerDescriptor::new("error").action("index", |c, _| {
                c.write("missing");
                Ok(())
            }));
        let context = AppContext {
            views: Arc::new(ViewEnvironment::new(
                dir.path().join("views"),
                dir.path().join("themes"),
                LayoutAssets::default(),
                false,
            )),
            faults: FaultPolicy {
                debug: false,
                json_errors: JsonErrors::Negotiate,
                log_file: dir.path().join("error.log"),
            },
            layout: "layouts/main".to_string(),
            theme: None,
        };
        let router = Router::new(routes, registry, context).unwrap();
        Arc::new(ServerState {
            router,
            public_dir: dir.path().join("public"),
            debug: false,
        })
    }

    async fn body_of(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_to_request() {
        let req = hyper::Request::builder()
            .method("POST")
            .uri("/user/view/42?sort=name")
            .header("X-Requested-With", "XMLHttpRequest")
            .body(())
            .unwrap();
        let request = to_request(&req);
        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/user/view/42");
        assert_eq!(request.query.as_deref(), Some("sort=name"));
        assert!(request.is_ajax());
        assert_eq!(request.route_url(), "user/view/42?sort=name");
    }

    #[test]
    fn test_to_http_response() {
        let mut response = Response::html(302, "");
        response.set_header("Location", "/home");
        response.set_header("Bad Header", "x");
        let http = to_http_response(response, false);
        assert_eq!(http.status(), StatusCode::FOUND);
        assert_eq!(http.headers()["location"], "/home");
        assert_eq!(http.headers()["content-type"], "text/html; charset=utf-8");
        assert_eq!(http.headers().len(), 2);
    }

    #[test]
    fn test_static_file_rejects_traversal() {
        let dir = TempDir::new().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("content")).unwrap();
        fs::write(public.join("content/site.css"), "body{}").unwrap();
        fs::write(dir.path().join("secret.txt"), "nope").unwrap();

        let expected = Some(public.join("content/site.css"));
        assert_eq!(static_file(&public, "/content/site.css"), expected);
        assert_eq!(static_file(&public, "/content%2Fsite.css"), expected);
        assert_eq!(static_file(&public, "/../secret.txt"), None);
        assert_eq!(static_file(&public, "/content/%2E%2E/../secret.txt"), None);
        assert_eq!(static_file(&public, "/content"), None);
        assert_eq!(static_file(&public, "/"), None);
    }

    #[tokio::test]
    async fn test_respond_serves_static_with_etag() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);
        fs::create_dir_all(state.public_dir.join("content")).unwrap();
        fs::write(state.public_dir.join("content/app.js"), "go()").unwrap();

        let req = hyper::Request::get("/content/app.js").body(()).unwrap();
        let response = respond(state.clone(), req).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/javascript");
        assert_eq!(response.headers()["cache-control"], STATIC_CACHE_MAX_AGE);
        let etag = response.headers()["etag"].to_str().unwrap().to_string();
        assert_eq!(body_of(response).await, "go()");

        let req = hyper::Request::get("/content/app.js")
            .header("If-None-Match", etag.as_str())
            .body(())
            .unwrap();
        let response = respond(state, req).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(body_of(response).await, "");
    }

    #[tokio::test]
    async fn test_respond_dispatches_through_router() {
        let dir = TempDir::new().unwrap();
        let state = state(&dir);

        let response = respond(state.clone(), hyper::Request::get("/site/index/7").body(()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "home:7");

        let response = respond(state.clone(), hyper::Request::get("/nowhere/at-all").body(()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await, "missing");

        let response = respond(state.clone(), hyper::Request::get("/site/fail").body(()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::GONE);
        assert!(body_of(response).await.contains("Gone"));

        let response = respond(state, hyper::Request::head("/site").body(()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await, "");
    }
}

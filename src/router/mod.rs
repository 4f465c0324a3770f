//! Regex route table and dispatch.
//!
//! Patterns are tried in declaration order with a case-insensitive,
//! unanchored search; the first match wins. Named captures fill in the
//! route: `controller`, `action`, `parameter` (split on `/` into positional
//! parameters) and `query` (parsed as a query string) are reserved, any other
//! name becomes a named parameter. Anything that does not resolve to a
//! registered action is sent to the configured error route.

mod params;

use std::io::{self, Write};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use crate::config::{Config, RouteTarget, RouterConfig};
use crate::controller::registry::{action_method_name, controller_type_name};
use crate::controller::{Controller, ControllerRegistry, Request, Response};
use crate::error::ConfigError;
use crate::fault::page::status_text;
use crate::fault::{FaultHandler, FaultPolicy};
use crate::view::{View, ViewEnvironment};

pub use params::{parse_query_string, ActionParams, ParamKey};

pub const CAPTURE_CONTROLLER: &str = "controller";
pub const CAPTURE_ACTION: &str = "action";
pub const CAPTURE_PARAMETER: &str = "parameter";
pub const CAPTURE_QUERY: &str = "query";

/// Body of the response used when even the error route fails.
pub const FALLBACK_NOT_FOUND: &str = "404 Not Found";

/// Application-wide state every dispatched controller shares.
pub struct AppContext {
    pub views: Arc<ViewEnvironment>,
    pub faults: FaultPolicy,
    /// Layout view id used unless a controller overrides it.
    pub layout: String,
    pub theme: Option<String>,
}

impl AppContext {
    pub fn from_config(config: &Config) -> Self {
        Self {
            views: Arc::new(ViewEnvironment::from_config(config)),
            faults: FaultPolicy::from_config(&config.app),
            layout: config.app.layout.clone(),
            theme: config.app.theme.clone(),
        }
    }
}

struct CompiledRoute {
    pattern: String,
    regex: Regex,
    target: RouteTarget,
}

/// A URL resolved to a registered controller action.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    /// The pattern that matched.
    pub pattern: String,
    pub controller: String,
    pub action: String,
    pub controller_type: String,
    pub action_method: String,
    pub params: ActionParams,
    /// The `query` capture without its leading `?`.
    pub query_string: String,
}

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub response: Response,
    /// True when an action faulted and the response is an error page.
    pub faulted: bool,
}

impl Dispatch {
    /// Process exit status for one-shot dispatch: 1 once an action faulted.
    pub fn exit_code(&self) -> i32 {
        if self.faulted {
            1
        } else {
            0
        }
    }

    /// Write the response CGI-style and return the exit status. With
    /// `include_headers` a `Status:` line and the headers precede the body.
    pub fn write_to<W: Write>(&self, out: &mut W, include_headers: bool) -> io::Result<i32> {
        let response = &self.response;
        if include_headers {
            write!(out, "Status: {} {}\r\n", response.status, status_text(response.status))?;
            for (name, value) in &response.headers {
                write!(out, "{}: {}\r\n", name, value)?;
            }
            out.write_all(b"\r\n")?;
        }
        out.write_all(response.body.as_bytes())?;
        out.flush()?;
        Ok(self.exit_code())
    }
}

pub struct Router {
    routes: Vec<CompiledRoute>,
    config: RouterConfig,
    registry: ControllerRegistry,
    context: AppContext,
}

impl Router {
    /// Compile the route table and check that the error route resolves.
    pub fn new(
        config: RouterConfig,
        registry: ControllerRegistry,
        context: AppContext,
    ) -> Result<Self, ConfigError> {
        if config.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        let routes = config
            .routes
            .iter()
            .map(|(pattern, target)| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConfigError::pattern(pattern, e))?;
                Ok(CompiledRoute {
                    pattern: pattern.clone(),
                    regex,
                    target: target.clone(),
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let router = Self {
            routes,
            config,
            registry,
            context,
        };

        if router.resolve(&router.config.error_handler).is_none() {
            return Err(ConfigError::ErrorRoute(router.config.error_handler.clone()));
        }

        info!(
            routes = router.routes.len(),
            controllers = router.registry.len(),
            "router ready"
        );
        Ok(router)
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn registry(&self) -> &ControllerRegistry {
        &self.registry
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Route patterns and their targets in declaration order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &RouteTarget)> {
        self.routes.iter().map(|r| (r.pattern.as_str(), &r.target))
    }

    /// Resolve `url` without invoking anything. `None` when no pattern
    /// matches or the controller action is not registered.
    pub fn resolve(&self, url: &str) -> Option<ResolvedRoute> {
        let route = self.match_route(url)?;
        self.registry
            .resolve(&route.controller_type, &route.action_method)
            .map(|_| route)
    }

    /// First matching pattern, with defaults applied. The controller may not
    /// exist.
    pub fn match_route(&self, url: &str) -> Option<ResolvedRoute> {
        self.routes.iter().find_map(|route| {
            let caps = route.regex.captures(url)?;

            let mut controller = route.target.controller.clone();
            let mut action = route.target.action.clone();
            let mut parameter = None;
            let mut query = None;
            let mut named = Vec::new();

            for name in route.regex.capture_names().flatten() {
                let Some(m) = caps.name(name).filter(|m| !m.as_str().is_empty()) else {
                    continue;
                };
                let value = m.as_str().to_string();
                match name {
                    CAPTURE_CONTROLLER => controller = Some(value),
                    CAPTURE_ACTION => action = Some(value),
                    CAPTURE_PARAMETER => parameter = Some(value),
                    CAPTURE_QUERY => query = Some(value),
                    _ => named.push((name.to_string(), value)),
                }
            }

            let controller = controller.unwrap_or_else(|| self.config.base_controller.clone());
            let action = action.unwrap_or_else(|| self.config.base_action.clone());

            let mut params = match &parameter {
                Some(p) => ActionParams::from_path(p),
                None => ActionParams::new(),
            };
            for (name, value) in named {
                params.insert(name, value);
            }
            let query_string = query
                .as_deref()
                .map(|q| q.trim_start_matches('?').to_string())
                .unwrap_or_default();
            let params = params.merge_query(&parse_query_string(&query_string));

            Some(ResolvedRoute {
                pattern: route.pattern.clone(),
                controller_type: controller_type_name(&controller),
                action_method: action_method_name(&action),
                controller,
                action,
                params,
                query_string,
            })
        })
    }

    /// Dispatch `url` and return the response.
    pub fn dispatch(&self, url: &str, request: &Request) -> Response {
        self.dispatch_url(url, request).response
    }

    /// Dispatch a request using its own path and query.
    pub fn dispatch_request(&self, request: &Request) -> Dispatch {
        self.dispatch_url(&request.route_url(), request)
    }

    /// Dispatch `url`, reporting whether the action faulted.
    pub fn dispatch_url(&self, url: &str, request: &Request) -> Dispatch {
        if let Some(route) = self.resolve(url) {
            debug!(
                url,
                controller = %route.controller_type,
                action = %route.action_method,
                "dispatching"
            );
            return self.invoke(&route, request, Response::default());
        }

        info!(url, error_route = %self.config.error_handler, "no route, using error route");
        match self.resolve(&self.config.error_handler) {
            Some(route) => self.invoke(&route, request, Response::html(404, String::new())),
            None => {
                warn!(error_route = %self.config.error_handler, "error route does not resolve");
                Dispatch {
                    response: Response::text(404, FALLBACK_NOT_FOUND),
                    faulted: false,
                }
            }
        }
    }

    fn invoke(&self, route: &ResolvedRoute, request: &Request, initial: Response) -> Dispatch {
        let resolved = self.registry.resolve(&route.controller_type, &route.action_method);
        let Some((descriptor, action)) = resolved else {
            return Dispatch {
                response: Response::text(404, FALLBACK_NOT_FOUND),
                faulted: false,
            };
        };

        let mut view = View::new(
            self.context.views.clone(),
            descriptor.layout.clone().unwrap_or_else(|| self.context.layout.clone()),
        );
        view.theme = descriptor.theme.clone().or_else(|| self.context.theme.clone());
        view.title = descriptor.title.clone();
        view.page_url = Some(request.path.clone());

        let mut controller = Controller::new(request.clone(), view).with_response(initial);
        let handler = FaultHandler::install(&self.context.faults);
        match handler.run(|| action(&mut controller, &route.params)) {
            Ok(()) => Dispatch {
                response: controller.into_response(),
                faulted: false,
            },
            Err(fault) => Dispatch {
                response: handler.handle(fault, request),
                faulted: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonErrors;
    use crate::controller::ControllerDescriptor;
    use crate::fault::Fault;
    use crate::template::LayoutAssets;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    const CATCH_ALL: &str = r"^(?P<controller>[a-z-]+)?/?(?P<action>[a-z-]+)?/?(?P<parameter>[^?]*)(?P<query>\?.*)?$";

    fn target(controller: Option<&str>, action: Option<&str>) -> RouteTarget {
        RouteTarget {
            controller: controller.map(str::to_string),
            action: action.map(str::to_string),
        }
    }

    fn context(dir: &TempDir, debug: bool) -> AppContext {
        AppContext {
            views: Arc::new(ViewEnvironment::new(
                dir.path().join("views"),
                dir.path().join("themes"),
                LayoutAssets::default(),
                false,
            )),
            faults: FaultPolicy {
                debug,
                json_errors: JsonErrors::Negotiate,
                log_file: dir.path().join("error.log"),
            },
            layout: "layouts/main".to_string(),
            theme: None,
        }
    }

    fn echo_params(c: &mut Controller, p: &ActionParams) -> Result<(), Fault> {
        c.write(&p.values().join(","));
        Ok(())
    }

    fn registry() -> ControllerRegistry {
        ControllerRegistry::new()
            .register(
                ControllerDescriptor::new("user")
                    .action("view", |c, p| {
                        c.write(&format!("user:{}", p.values().join(",")));
                        Ok(())
                    })
                    .action("index", echo_params)
                    .action("fail", |_, _| Err(Fault::with_code("No such user", 404)))
                    .action("crash", |_, _| panic!("crashed")),
            )
            .register(ControllerDescriptor::new("user-profile").action("index", |c, _| {
                c.write("profile");
                Ok(())
            }))
            .register(ControllerDescriptor::new("site").action("index", |c, _| {
                c.write("home");
                Ok(())
            }))
            .register(ControllerDescriptor::new("error").action("index", |c, _| {
                c.write(&format!("error:{}", c.response().status));
                Ok(())
            }))
    }

    /// Build a router over `routes`, followed by `^error$` so the default
    /// error route always resolves.
    fn router(dir: &TempDir, routes: Vec<(&str, RouteTarget)>) -> Router {
        let mut routes: Vec<(String, RouteTarget)> =
            routes.into_iter().map(|(p, t)| (p.to_string(), t)).collect();
        if !routes.iter().any(|(p, _)| p == "^error$") {
            routes.push(("^error$".to_string(), target(Some("error"), Some("index"))));
        }
        Router::new(RouterConfig::new(routes), registry(), context(dir, false)).unwrap()
    }

    fn body(router: &Router, url: &str) -> (u16, String) {
        let response = router.dispatch(url, &Request::get(url));
        (response.status, response.body)
    }

    #[test]
    fn test_named_id_capture_with_config_defaults() {
        let dir = TempDir::new().unwrap();
        let router = router(
            &dir,
            vec![(r"^user/(?P<id>\d+)$", target(Some("user"), Some("view")))],
        );

        let route = router.resolve("user/42").unwrap();
        assert_eq!(route.controller_type, "UserController");
        assert_eq!(route.action_method, "actionView");
        assert_eq!(route.params.values(), vec!["42"]);
        assert_eq!(route.params.get("id"), Some("42"));
        assert_eq!(body(&router, "user/42"), (200, "user:42".to_string()));
    }

    #[test]
    fn test_router_defaults_fill_missing_controller_and_action() {
        let dir = TempDir::new().unwrap();
        let mut config = RouterConfig::new([
            (r"^user/(?P<id>\d+)$".to_string(), RouteTarget::default()),
            ("^error$".to_string(), target(Some("error"), Some("index"))),
        ]);
        config.base_controller = "user".to_string();
        config.base_action = "view".to_string();
        let router = Router::new(config, registry(), context(&dir, false)).unwrap();

        let route = router.resolve("user/42").unwrap();
        assert_eq!(route.controller_type, "UserController");
        assert_eq!(route.action_method, "actionView");
        assert_eq!(route.params.values(), vec!["42"]);
        assert_eq!(body(&router, "user/42"), (200, "user:42".to_string()));
    }

    #[test]
    fn test_first_declared_match_wins() {
        let dir = TempDir::new().unwrap();
        let router = router(
            &dir,
            vec![
                ("^user", target(Some("user"), Some("view"))),
                ("^user/(?P<id>\\d+)$", target(Some("site"), None)),
            ],
        );
        assert_eq!(router.resolve("user/1").unwrap().controller_type, "UserController");
    }

    #[test]
    fn test_catch_all_pattern_and_query_merge() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);

        let route = router.resolve("user/index/a/b?x=1&0=z").unwrap();
        assert_eq!(route.controller, "user");
        assert_eq!(route.action, "index");
        assert_eq!(route.query_string, "x=1&0=z");
        assert_eq!(route.params.values(), vec!["a", "b", "1", "z"]);

        assert_eq!(body(&router, ""), (200, "home".to_string()));
        assert_eq!(body(&router, "user-profile"), (200, "profile".to_string()));
    }

    #[test]
    fn test_query_value_wins_over_path_value() {
        let dir = TempDir::new().unwrap();
        let router = router(
            &dir,
            vec![(r"^user/(?P<id>\d+)(?P<query>\?.*)?$", target(Some("user"), Some("index")))],
        );
        let route = router.resolve("user/5?id=9").unwrap();
        assert_eq!(route.params.get("id"), Some("9"));
        assert_eq!(body(&router, "user/5?id=9"), (200, "9".to_string()));
    }

    #[test]
    fn test_matching_is_case_insensitive_and_unanchored() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![("user/(?P<id>\\d+)", target(Some("user"), Some("view")))]);
        assert!(router.resolve("api/USER/7/extra").is_some());
    }

    #[test]
    fn test_unknown_controller_or_action_goes_to_error_route() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);

        assert!(router.match_route("nothing/here").is_some());
        assert!(router.resolve("nothing/here").is_none());
        assert_eq!(body(&router, "nothing/here"), (404, "error:404".to_string()));
        assert_eq!(body(&router, "user/delete"), (404, "error:404".to_string()));
    }

    #[test]
    fn test_no_match_goes_to_error_route() {
        let dir = TempDir::new().unwrap();
        let router = router(
            &dir,
            vec![
                ("^user$", target(Some("user"), Some("view"))),
                ("^error$", target(Some("error"), None)),
            ],
        );
        assert_eq!(body(&router, "zzz"), (404, "error:404".to_string()));
    }

    #[test]
    fn test_unresolvable_error_route_is_rejected_at_startup() {
        let dir = TempDir::new().unwrap();
        let mut config =
            RouterConfig::new([("^user$".to_string(), target(Some("user"), Some("view")))]);
        config.error_handler = "missing".to_string();
        let err = Router::new(config, registry(), context(&dir, false)).err().unwrap();
        assert!(matches!(err, ConfigError::ErrorRoute(ref r) if r == "missing"));
    }

    #[test]
    fn test_bad_pattern_is_rejected_at_startup() {
        let dir = TempDir::new().unwrap();
        let config = RouterConfig::new([("(unclosed".to_string(), RouteTarget::default())]);
        let err = Router::new(config, registry(), context(&dir, false)).err().unwrap();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_error_route_failure_falls_back_to_static_404() {
        let dir = TempDir::new().unwrap();
        let mut router = router(&dir, vec![(CATCH_ALL, target(None, None))]);
        router.config.error_handler = "also/missing".to_string();

        let response = router.dispatch("nothing", &Request::get("/nothing"));
        assert_eq!(response.status, 404);
        assert_eq!(response.body, FALLBACK_NOT_FOUND);
        assert_eq!(response.header("Content-Type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_raised_fault_renders_production_page() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);
        let dispatch = router.dispatch_request(&Request::get("/user/fail"));
        assert!(dispatch.faulted);
        assert_eq!(dispatch.response.status, 404);
        assert!(dispatch.response.body.contains("No such user"));
        assert!(!dispatch.response.body.contains("mod.rs"));
    }

    #[test]
    fn test_one_shot_output_exits_1_after_error_page() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);

        let mut out = Vec::new();
        let dispatch = router.dispatch_request(&Request::get("/user/fail"));
        assert_eq!(dispatch.write_to(&mut out, true).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Status: 404 Not Found\r\n"));
        assert!(text.contains("Content-Type: text/html"));
        assert!(text.contains("\r\n\r\n"));
        assert!(text.contains("No such user"));
    }

    #[test]
    fn test_one_shot_output_exits_0_on_success() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);

        let mut out = Vec::new();
        let dispatch = router.dispatch_request(&Request::get("/site/index"));
        assert_eq!(dispatch.write_to(&mut out, false).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap(), "home");
    }

    #[test]
    fn test_panicking_action_renders_500() {
        let dir = TempDir::new().unwrap();
        let router = router(&dir, vec![(CATCH_ALL, target(None, None))]);
        let request = Request::get("/user/crash").with_header("Accept", "application/json");
        let dispatch = router.dispatch_request(&request);
        assert!(dispatch.faulted);
        assert_eq!(dispatch.response.status, 500);
        let body: serde_json::Value = serde_json::from_str(&dispatch.response.body).unwrap();
        assert_eq!(body["error"]["code"], json!(500));
        assert_ne!(body["error"]["message"], json!("crashed"));
    }

    #[test]
    fn test_actions_render_views_with_controller_layout() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("views/layouts")).unwrap();
        fs::create_dir_all(dir.path().join("views/site")).unwrap();
        fs::write(dir.path().join("views/layouts/plain.html.erb"), "<%= page_url %>|<%= yield %>").unwrap();
        fs::write(dir.path().join("views/site/index.html.erb"), "<%= n %>").unwrap();

        let registry = ControllerRegistry::new()
            .register(
                ControllerDescriptor::new("site")
                    .layout("layouts/plain")
                    .action("index", |c, _| c.render("site/index", &json!({"n": 1}))),
            )
            .register(ControllerDescriptor::new("error").action("index", |_, _| Ok(())));
        let config = RouterConfig::new([(CATCH_ALL.to_string(), RouteTarget::default())]);
        let router = Router::new(config, registry, context(&dir, false)).unwrap();

        let response = router.dispatch("", &Request::get("/"));
        assert_eq!(response.body, "/|1");
    }
}

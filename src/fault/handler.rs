use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::error;

use super::{hook, log, page, panic_message, Fault};
use crate::config::{AppConfig, JsonErrors};
use crate::controller::{Request, Response};

/// How faults are presented and where they are logged.
#[derive(Debug, Clone, PartialEq)]
pub struct FaultPolicy {
    pub debug: bool,
    pub json_errors: JsonErrors,
    pub log_file: PathBuf,
}

impl FaultPolicy {
    pub fn from_config(app: &AppConfig) -> Self {
        Self {
            debug: app.debug,
            json_errors: app.json_errors,
            log_file: app.log_file.clone(),
        }
    }

    pub fn wants_json(&self, request: &Request) -> bool {
        match self.json_errors {
            JsonErrors::Never => false,
            JsonErrors::Negotiate => request.wants_json(),
            JsonErrors::Always => true,
        }
    }

    /// Format the error page for `fault`.
    pub fn render(&self, fault: &Fault, request: &Request, error_id: &str) -> Response {
        let status = fault.status();
        if self.wants_json(request) {
            Response::json(status, page::json_body(fault, self.debug).to_string())
        } else if self.debug {
            Response::html(status, page::debug_html(fault, error_id))
        } else {
            Response::html(status, page::production_html(fault, error_id))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Ready to run an action.
    Installed,
    /// Formatting a fault; further faults are not routed back here.
    Handling,
}

/// Per-request fault interception.
pub struct FaultHandler<'p> {
    policy: &'p FaultPolicy,
    state: HandlerState,
}

impl<'p> FaultHandler<'p> {
    /// Create a handler, installing the panic hook if this is the first one.
    pub fn install(policy: &'p FaultPolicy) -> Self {
        hook::install();
        Self {
            policy,
            state: HandlerState::Installed,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Run `f`, turning a panic into a [`Fault`].
    pub fn run<T>(&self, f: impl FnOnce() -> Result<T, Fault>) -> Result<T, Fault> {
        let result = {
            let _capture = hook::CaptureGuard::new();
            panic::catch_unwind(AssertUnwindSafe(f))
        };
        match result {
            Ok(result) => result,
            Err(payload) => Err(Fault::from_panic(payload.as_ref(), hook::take_last_panic())),
        }
    }

    /// Log `fault` and turn it into an error response.
    pub fn handle(self, fault: Fault, request: &Request) -> Response {
        let policy = self.policy;
        self.respond(fault, request, |fault, request, error_id| {
            policy.render(fault, request, error_id)
        })
    }

    fn respond(
        mut self,
        fault: Fault,
        request: &Request,
        format: impl FnOnce(&Fault, &Request, &str) -> Response,
    ) -> Response {
        self.state = HandlerState::Handling;

        let error_id = page::new_error_id();
        let location = fault.location();
        error!(
            error_id = %error_id,
            status = fault.status(),
            location = location.as_deref().unwrap_or("unknown"),
            path = %request.path,
            "{}",
            fault.message
        );
        log::write_fault(&self.policy.log_file, &fault, &error_id, &request.path);

        let formatted = {
            let _capture = hook::CaptureGuard::new();
            panic::catch_unwind(AssertUnwindSafe(|| format(&fault, request, &error_id)))
        };
        match formatted {
            Ok(response) => response,
            Err(payload) => {
                log::write_minimal(&self.policy.log_file, &panic_message(payload.as_ref()));
                Response::text(500, page::STATIC_500)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn policy(dir: &TempDir, debug: bool, json_errors: JsonErrors) -> FaultPolicy {
        FaultPolicy {
            debug,
            json_errors,
            log_file: dir.path().join("error.log"),
        }
    }

    #[test]
    fn test_run_passes_results_through() {
        let dir = TempDir::new().unwrap();
        let policy = policy(&dir, false, JsonErrors::Never);
        let handler = FaultHandler::install(&policy);
        assert_eq!(handler.state(), HandlerState::Installed);
        assert_eq!(handler.run(|| Ok(7)).unwrap(), 7);
        let err = handler
            .run(|| -> Result<(), Fault> { Err(Fault::with_code("no", 403)) })
            .unwrap_err();
        assert_eq!(err.status(), 403);
    }

    #[test]
    fn test_run_catches_panics_with_location() {
        let dir = TempDir::new().unwrap();
        let policy = policy(&dir, true, JsonErrors::Never);
        let handler = FaultHandler::install(&policy);
        let fault = handler
            .run(|| -> Result<(), Fault> { panic!("exploded") })
            .unwrap_err();
        assert_eq!(fault.kind, crate::fault::FaultKind::Panic);
        assert_eq!(fault.message, "exploded");
        assert!(fault.file.as_deref().unwrap().ends_with("handler.rs"));
    }

    #[test]
    fn test_production_html_for_raised_404() {
        let dir = TempDir::new().unwrap();
        let policy = policy(&dir, false, JsonErrors::Negotiate);
        let response =
            FaultHandler::install(&policy).handle(Fault::not_found("No such page"), &Request::get("/x"));
        assert_eq!(response.status, 404);
        assert!(response.header("Content-Type").unwrap().starts_with("text/html"));
        assert!(response.body.contains("No such page"));
        assert!(!response.body.contains("handler.rs"));

        let log = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
        assert!(log.contains("No such page"));
    }

    #[test]
    fn test_json_negotiation() {
        let dir = TempDir::new().unwrap();
        let request = Request::get("/api").with_header("Accept", "application/json");

        let negotiate = policy(&dir, false, JsonErrors::Negotiate);
        let response =
            FaultHandler::install(&negotiate).handle(Fault::with_code("bad", 400), &request);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body, r#"{"error":{"message":"bad","code":400}}"#);

        let never = policy(&dir, false, JsonErrors::Never);
        let response = FaultHandler::install(&never).handle(Fault::with_code("bad", 400), &request);
        assert!(response.header("Content-Type").unwrap().starts_with("text/html"));

        let always = policy(&dir, false, JsonErrors::Always);
        let response = FaultHandler::install(&always).handle(Fault::new("x"), &Request::get("/"));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_secondary_fault_yields_static_500() {
        let dir = TempDir::new().unwrap();
        let policy = policy(&dir, false, JsonErrors::Never);
        let response = FaultHandler::install(&policy).respond(
            Fault::with_code("first", 404),
            &Request::get("/"),
            |_, _, _| panic!("formatter broke"),
        );
        assert_eq!(response.status, 500);
        assert_eq!(response.body, page::STATIC_500);

        let log = std::fs::read_to_string(dir.path().join("error.log")).unwrap();
        assert!(log.contains("secondary fault: formatter broke"));
    }
}

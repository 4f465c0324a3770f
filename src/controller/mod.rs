//! Controller base: what an action can do with the request, the view and the
//! response it is building.

mod http;
pub mod registry;

use serde_json::Value;

use crate::fault::Fault;
use crate::view::View;

pub use http::{Request, Response};
pub use registry::{Action, ControllerDescriptor, ControllerRegistry};

/// Per-request controller instance handed to every action.
pub struct Controller {
    request: Request,
    view: View,
    response: Response,
}

impl Controller {
    pub fn new(request: Request, view: View) -> Self {
        Self {
            request,
            view,
            response: Response::default(),
        }
    }

    /// Start from an existing response, e.g. the error route's 404.
    pub fn with_response(mut self, response: Response) -> Self {
        self.response = response;
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn into_response(mut self) -> Response {
        if self.response.header("Content-Type").is_none() {
            self.response
                .set_header("Content-Type", "text/html; charset=utf-8");
        }
        self.response
    }

    /// Render view `id` inside the current layout.
    pub fn render(&mut self, id: &str, data: &Value) -> Result<(), Fault> {
        self.view.render(id, data, &mut self.response.body)?;
        Ok(())
    }

    /// Render view `id` without a layout.
    pub fn render_partial(&mut self, id: &str, data: &Value) -> Result<(), Fault> {
        self.view.render_partial(id, data, &mut self.response.body)?;
        Ok(())
    }

    /// Render view `id` without a layout and return it instead of writing it.
    pub fn render_partial_to_string(&self, id: &str, data: &Value) -> Result<String, Fault> {
        Ok(self.view.render_partial_to_string(id, data)?)
    }

    /// Redirect to `/path`; leading slashes in `path` are ignored.
    pub fn redirect(&mut self, path: &str) {
        let location = format!("/{}", path.trim_start_matches('/'));
        self.response.set_header("Location", location);
        self.response.status = 302;
    }

    pub fn is_ajax(&self) -> bool {
        self.request.is_ajax()
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.view.title = Some(title.into());
    }

    pub fn set_layout(&mut self, layout: impl Into<String>) {
        self.view.layout = layout.into();
    }

    pub fn set_theme(&mut self, theme: Option<&str>) {
        self.view.theme = theme.map(str::to_string);
    }

    pub fn set_page_url(&mut self, page_url: impl Into<String>) {
        self.view.page_url = Some(page_url.into());
    }

    pub fn set_status(&mut self, status: u16) {
        self.response.status = status;
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    /// Append raw text to the response body.
    pub fn write(&mut self, text: &str) {
        self.response.body.push_str(text);
    }

    /// Replace the body with `value` serialized as JSON.
    pub fn json(&mut self, value: &Value) {
        self.response.set_header("Content-Type", "application/json");
        self.response.body = value.to_string();
    }
}

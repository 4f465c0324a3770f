//! Built-in controllers served by the `wallaby` binary.
//!
//! `site` serves the home page and two small demos, `error` is the default
//! error route. Both render the views `wallaby new` generates.

use serde_json::json;

use crate::controller::{Controller, ControllerDescriptor, ControllerRegistry};
use crate::fault::Fault;
use crate::router::ActionParams;

pub fn registry() -> ControllerRegistry {
    ControllerRegistry::new()
        .register(site_controller())
        .register(error_controller())
}

fn site_controller() -> ControllerDescriptor {
    ControllerDescriptor::new("site")
        .title("Wallaby")
        .action("index", site_index)
        .action("go-home", |c, _| {
            c.redirect("/");
            Ok(())
        })
        .action("ping", site_ping)
}

fn site_index(c: &mut Controller, params: &ActionParams) -> Result<(), Fault> {
    let data = json!({
        "path": c.request().path,
        "params": params.values(),
    });
    if c.is_ajax() {
        return c.render_partial("site/index", &data);
    }
    c.render("site/index", &data)
}

/// `site/ping[/<status>]`: JSON echo, or a raised fault for a numeric status.
fn site_ping(c: &mut Controller, params: &ActionParams) -> Result<(), Fault> {
    match params.positional(0).filter(|s| !s.is_empty()) {
        Some(code) => {
            let code: u16 = code
                .parse()
                .map_err(|_| Fault::with_code(format!("'{}' is not a status code", code), 400))?;
            Err(Fault::with_code(format!("Requested status {}", code), code))
        }
        None => {
            let ajax = c.is_ajax();
            c.json(&json!({ "pong": true, "ajax": ajax }));
            Ok(())
        }
    }
}

fn error_controller() -> ControllerDescriptor {
    ControllerDescriptor::new("error")
        .title("Not Found")
        .action("index", |c, _| {
            c.set_status(404);
            let data = json!({ "path": c.request().path });
            c.render("error/index", &data)
        })
}

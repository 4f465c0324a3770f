//! Wallaby CLI: serve an application, dispatch a single URL, list routes or
//! generate a new application.

use std::env;
use std::io;
use std::path::Path;
use std::process;

use tracing::error;
use tracing_subscriber::EnvFilter;

use wallaby::controller::Request;
use wallaby::router::Router;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Serve an application folder over HTTP
    Serve {
        folder: String,
        port: Option<u16>,
        debug: bool,
    },
    /// Dispatch one URL and write the response to stdout
    Dispatch {
        folder: String,
        url: String,
        ajax: bool,
        json: bool,
        include_headers: bool,
    },
    /// Print the route table and how sample URLs resolve
    Routes { folder: String, urls: Vec<String> },
    /// Create a new application
    New { name: String },
}

fn print_usage() {
    eprintln!("Wallaby {} - MVC web skeleton", VERSION);
    eprintln!();
    eprintln!("Usage: wallaby serve <folder> [--port PORT] [--debug]");
    eprintln!("       wallaby dispatch <folder> <url> [--ajax] [--json] [-i]");
    eprintln!("       wallaby routes <folder> [url...]");
    eprintln!("       wallaby new <app_name>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  serve <folder>       Start the HTTP server for an application folder");
    eprintln!("  dispatch <folder> <url>  Dispatch one URL and print the response body");
    eprintln!("  routes <folder>      Print the route table, and resolve any URLs given");
    eprintln!("  new <app_name>       Create a new Wallaby application");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --port PORT     Port for serve (default: config/app.yml, then 3000)");
    eprintln!("  --debug         Force debug mode (detailed error pages, no static caching)");
    eprintln!("  --ajax          Send X-Requested-With: XMLHttpRequest");
    eprintln!("  --json          Send Accept: application/json");
    eprintln!("  -i, --include   Print the status line and headers before the body");
    eprintln!("  --help, -h      Show this help message");
    eprintln!("  --version, -V   Show the version");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  RUST_LOG        Log filter (default: info)");
    eprintln!("  APP_ENV         Loads .env.<APP_ENV> after .env");
    eprintln!("  APP_DEBUG, APP_PORT, APP_LOG_FILE  Override config/app.yml");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  wallaby new blog                    Create a new application");
    eprintln!("  wallaby serve blog --port 8080      Serve it on port 8080");
    eprintln!("  wallaby dispatch blog site/ping     Dispatch one request");
    eprintln!("  wallaby routes blog user/42 ''      Show how URLs resolve");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    print_usage();
    process::exit(64);
}

fn parse_args() -> Command {
    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        print_usage();
        process::exit(64);
    };
    let rest = &args[1..];

    match command.as_str() {
        "serve" => {
            let mut folder = None;
            let mut port = None;
            let mut debug = false;
            let mut i = 0;
            while i < rest.len() {
                match rest[i].as_str() {
                    "--port" => {
                        i += 1;
                        let Some(value) = rest.get(i) else {
                            usage_error("--port requires a port number");
                        };
                        port = Some(value.parse().unwrap_or_else(|_| {
                            usage_error(&format!("Invalid port number: {}", value))
                        }));
                    }
                    "--debug" => debug = true,
                    arg if arg.starts_with('-') => {
                        usage_error(&format!("Unknown option for serve command: {}", arg))
                    }
                    arg => {
                        if folder.is_some() {
                            usage_error(&format!("Unexpected argument: {}", arg));
                        }
                        folder = Some(arg.to_string());
                    }
                }
                i += 1;
            }
            let Some(folder) = folder else {
                usage_error("serve command requires a folder argument");
            };
            Command::Serve { folder, port, debug }
        }
        "dispatch" => {
            let mut positional = Vec::new();
            let mut ajax = false;
            let mut json = false;
            let mut include_headers = false;
            for arg in rest {
                match arg.as_str() {
                    "--ajax" => ajax = true,
                    "--json" => json = true,
                    "-i" | "--include" => include_headers = true,
                    a if a.starts_with('-') && a.len() > 1 => {
                        usage_error(&format!("Unknown option for dispatch command: {}", a))
                    }
                    a => positional.push(a.to_string()),
                }
            }
            let [folder, url]: [String; 2] = positional
                .try_into()
                .unwrap_or_else(|_| usage_error("dispatch command requires a folder and a url"));
            Command::Dispatch {
                folder,
                url,
                ajax,
                json,
                include_headers,
            }
        }
        "routes" => {
            let Some(folder) = rest.first() else {
                usage_error("routes command requires a folder argument");
            };
            Command::Routes {
                folder: folder.clone(),
                urls: rest[1..].to_vec(),
            }
        }
        "new" => match rest {
            [name] => Command::New { name: name.clone() },
            [] => usage_error("new command requires an app name"),
            _ => usage_error(&format!("Unexpected argument: {}", rest[1])),
        },
        "--help" | "-h" => {
            print_usage();
            process::exit(0);
        }
        "--version" | "-V" => {
            println!("wallaby {}", VERSION);
            process::exit(0);
        }
        other => usage_error(&format!("Unknown command: {}", other)),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let command = parse_args();
    init_logging();

    match command {
        Command::Serve { folder, port, debug } => run_serve(&folder, port, debug),
        Command::Dispatch {
            folder,
            url,
            ajax,
            json,
            include_headers,
        } => run_dispatch(&folder, &url, ajax, json, include_headers),
        Command::Routes { folder, urls } => run_routes(&folder, &urls),
        Command::New { name } => run_new(&name),
    }
}

/// Load an application folder, exiting with status 1 when it cannot be used.
fn load_app(folder: &str) -> (wallaby::config::Config, Router) {
    let path = Path::new(folder);
    if !path.is_dir() {
        eprintln!("Error: '{}' is not a directory", folder);
        process::exit(1);
    }
    match wallaby::load(path, wallaby::app::registry()) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!(folder, error = %e, "cannot load application");
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn run_serve(folder: &str, port: Option<u16>, debug: bool) {
    let path = Path::new(folder);
    if !path.is_dir() {
        eprintln!("Error: '{}' is not a directory", folder);
        process::exit(1);
    }

    let loaded = wallaby::config::Config::load(path).and_then(|mut config| {
        if let Some(port) = port {
            config.app.port = port;
        }
        config.app.debug |= debug;
        let context = wallaby::router::AppContext::from_config(&config);
        let router = Router::new(config.router.clone(), wallaby::app::registry(), context)?;
        Ok((config, router))
    });
    let (config, router) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = wallaby::serve::serve(&config, router) {
        error!(error = %e, "server stopped");
        eprintln!("Error: {}", e);
        process::exit(70);
    }
}

fn run_dispatch(folder: &str, url: &str, ajax: bool, json: bool, include_headers: bool) {
    let (_, router) = load_app(folder);

    let mut request = Request::get(url);
    if ajax {
        request = request.with_header("X-Requested-With", "XMLHttpRequest");
    }
    if json {
        request = request.with_header("Accept", "application/json");
    }

    let dispatch = router.dispatch_request(&request);
    let code = dispatch
        .write_to(&mut io::stdout().lock(), include_headers)
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            1
        });
    if code != 0 {
        process::exit(code);
    }
}

fn run_routes(folder: &str, urls: &[String]) {
    let (config, router) = load_app(folder);

    println!("Routes ({}):", config.router.routes.len());
    for (i, (pattern, target)) in router.routes().enumerate() {
        println!(
            "  {:>2}. {}  ->  controller={} action={}",
            i + 1,
            pattern,
            target.controller.as_deref().unwrap_or("(capture)"),
            target.action.as_deref().unwrap_or("(capture)"),
        );
    }
    println!(
        "Defaults: controller={} action={} error_handler={}",
        config.router.base_controller, config.router.base_action, config.router.error_handler
    );
    println!("Controllers: {}", router.registry().type_names().join(", "));

    if urls.is_empty() {
        return;
    }
    println!();
    for url in urls {
        match router.match_route(url) {
            Some(route) => {
                let registered = router
                    .registry()
                    .resolve(&route.controller_type, &route.action_method)
                    .is_some();
                println!(
                    "  '{}'  ->  {}::{} params={:?}{}",
                    url,
                    route.controller_type,
                    route.action_method,
                    route.params.values(),
                    if registered { "" } else { "  (not registered, error route)" }
                );
            }
            None => println!("  '{}'  ->  no match, error route", url),
        }
    }
}

fn run_new(name: &str) {
    if let Err(e) = wallaby::scaffold::create_app(name) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

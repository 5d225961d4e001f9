//! Process entry point: CLI parsing, logging, listener setup, and the
//! top-level error-to-exit-code convention of spec.md §6/§7. Grounded on
//! the teacher's examples (`hello_world.rs`, `chunked.rs`), which pair
//! `env_logger::init()` with a bare `tokio::net::TcpListener` accept loop;
//! generalised here to two listening surfaces (IPv4 and, optionally, IPv6
//! side by side) and a shared rules store.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use rand::RngCore;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use turq::rules::store::{Program, RulesStore, DEFAULT_RULES};
use turq::{cli::Cli, conn, editor, logging, EditorAuth};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    logging::init(cli.verbose, cli.no_color);
    let verbose = cli.verbose;

    if let Err(err) = run(cli).await {
        let code = logging::report_fatal(err.as_ref(), verbose);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let source = match &cli.rules {
        Some(path) => std::fs::read_to_string(path).map_err(|err| format!("cannot read {}: {}", path.display(), err))?,
        None => DEFAULT_RULES.to_string(),
    };
    let program = Program::compile(&source).map_err(|err| format!("{}", err))?;
    let rules_store = Arc::new(RulesStore::new(program));
    let conn_counter = Arc::new(conn::ConnCounter::new());
    let shutdown = Arc::new(Notify::new());

    let mock_listeners = bind_all(&bind_addrs(&cli.bind, cli.mock_port, cli.ipv6)).await?;
    for listener in &mock_listeners {
        log::info!("mock port listening on {}", listener.local_addr()?);
    }

    let editor_listeners = if cli.no_editor {
        Vec::new()
    } else {
        let listeners = bind_all(&bind_addrs(&cli.bind, cli.editor_port, cli.ipv6)).await?;
        for listener in &listeners {
            log::info!("editor listening on {}", listener.local_addr()?);
        }
        log::info!("open the editor at {}", guess_external_url(&cli.bind, cli.editor_port));
        listeners
    };

    let auth = editor_auth(&cli.editor_password);

    let mut tasks = Vec::new();
    for listener in mock_listeners {
        let rules_store = rules_store.clone();
        let conn_counter = conn_counter.clone();
        tasks.push(tokio::spawn(async move {
            mock_accept_loop(listener, rules_store, conn_counter).await;
        }));
    }
    for listener in editor_listeners {
        let rules_store = rules_store.clone();
        let conn_counter = conn_counter.clone();
        let auth = auth.clone();
        let shutdown = shutdown.clone();
        tasks.push(tokio::spawn(async move {
            editor_accept_loop(listener, rules_store, auth, shutdown, conn_counter).await;
        }));
    }

    tokio::select! {
        _ = shutdown.notified() => {
            log::info!("shutdown requested via editor, exiting");
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("received interrupt, exiting");
        }
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}

async fn mock_accept_loop(listener: TcpListener, rules_store: Arc<RulesStore>, conn_counter: Arc<conn::ConnCounter>) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let rules_store = rules_store.clone();
                let conn_id = conn_counter.next();
                tokio::spawn(async move {
                    conn::serve(socket, peer, rules_store, conn_id).await;
                });
            }
            Err(err) => log::warn!("accept error on mock port: {}", err),
        }
    }
}

async fn editor_accept_loop(
    listener: TcpListener,
    rules_store: Arc<RulesStore>,
    auth: Option<Arc<EditorAuth>>,
    shutdown: Arc<Notify>,
    conn_counter: Arc<conn::ConnCounter>,
) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                let rules_store = rules_store.clone();
                let auth = auth.clone();
                let shutdown = shutdown.clone();
                let conn_id = conn_counter.next();
                tokio::spawn(async move {
                    editor::serve(socket, peer, rules_store, auth, shutdown, conn_id).await;
                });
            }
            Err(err) => log::warn!("accept error on editor port: {}", err),
        }
    }
}

/// One password, auto-generated and logged once if the flag was omitted
/// (spec.md §6). An explicit empty string disables auth.
fn editor_auth(flag: &Option<String>) -> Option<Arc<EditorAuth>> {
    match flag {
        Some(password) if password.is_empty() => None,
        Some(password) => Some(Arc::new(EditorAuth::new(password.clone()))),
        None => {
            let mut bytes = [0u8; 18];
            rand::thread_rng().fill_bytes(&mut bytes);
            let password = base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes);
            log::info!("generated editor password: {}", password);
            Some(Arc::new(EditorAuth::new(password)))
        }
    }
}

/// A URL likely to reach `bind_host` from outside the process, for the
/// startup log line (original `turq/util/http.py::guess_external_url`):
/// a wildcard bind address isn't itself dereferenceable from a browser.
fn guess_external_url(bind_host: &str, port: u16) -> String {
    let host = if bind_host == "0.0.0.0" || bind_host == "::" { "localhost" } else { bind_host };
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}/editor", host, port)
    } else {
        format!("http://{}:{}/editor", host, port)
    }
}

fn bind_addrs(bind: &str, port: u16, ipv6: bool) -> Vec<SocketAddr> {
    let mut addrs = vec![format!("{}:{}", bind, port)];
    if ipv6 {
        addrs.push(format!("[::]:{}", port));
    }
    addrs.into_iter().filter_map(|a| a.parse::<SocketAddr>().ok()).collect()
}

/// Bind every address in `addrs`. A bind failure at startup is fatal
/// (spec.md §7): exit with a non-zero code and a single `turq: error:`
/// line, surfaced by `main` via `logging::report_fatal`.
async fn bind_all(addrs: &[SocketAddr]) -> Result<Vec<TcpListener>, Box<dyn std::error::Error>> {
    let mut listeners = Vec::new();
    for addr in addrs {
        let listener = TcpListener::bind(addr).await.map_err(|err| format!("failed to bind {}: {}", addr, err))?;
        listeners.push(listener);
    }
    Ok(listeners)
}

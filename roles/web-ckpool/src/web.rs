use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::AppState;
use stats::{user_stats::validate_address, ChartKey, HashrateWindow, Sample, UserRecord};
use web_assets::icons::{card_icon_css, favicon_inline_svg};
use web_utils::{
    escape_html, format_elapsed_time, format_hashrate, format_share, format_uptime,
    unix_timestamp,
};

const DASHBOARD_PAGE_TEMPLATE: &str = include_str!("../templates/dashboard.html");
const USER_PAGE_TEMPLATE: &str = include_str!("../templates/user.html");
const ERROR_PAGE_TEMPLATE: &str = include_str!("../templates/error.html");
const CHART_SCRIPT: &str = include_str!("../templates/chart.js");

const HTML: &str = "text/html; charset=utf-8";
const JSON: &str = "application/json";

pub async fn run_http_server<S>(
    address: String,
    state: Arc<AppState>,
    shutdown: S,
) -> Result<(), Box<dyn std::error::Error>>
where
    S: Future<Output = ()>,
{
    let listener = TcpListener::bind(&address).await?;
    info!("🌐 ckpool dashboard listening on http://{}", address);
    info!(
        "Client polling interval: {} seconds",
        state.client_poll_interval_secs()
    );

    tokio::pin!(shutdown);

    loop {
        let (stream, _) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                info!("Web server shutting down");
                return Ok(());
            }
        };
        let io = TokioIo::new(stream);
        let state = state.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    Ok(route(&method, &path, query.as_deref(), &state).await)
}

/// Dispatch one request. Every outcome, including upstream failures, is a response.
pub async fn route(
    method: &Method,
    path: &str,
    query: Option<&str>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    if *method != Method::GET {
        return respond(StatusCode::METHOD_NOT_ALLOWED, "text/plain", "Method Not Allowed");
    }

    match path {
        "/favicon.ico" | "/favicon.svg" => serve_favicon(),
        "/" => dashboard_page(state).await,
        "/user" => lookup_redirect(query),
        "/api/hashrate" => api_hashrate(state).await,
        "/api/series" => api_series(state, ChartKey::Pool),
        "/health" => health(state),
        _ => {
            if let Some(address) = path.strip_prefix("/user/") {
                user_page(state, address).await
            } else if let Some(rest) = path.strip_prefix("/api/user/") {
                match rest.strip_suffix("/series") {
                    Some(address) => api_series(state, ChartKey::User(address.to_string())),
                    None => api_user(state, rest).await,
                }
            } else {
                respond(StatusCode::NOT_FOUND, "text/plain", "Not Found")
            }
        }
    }
}

fn respond(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response(status: StatusCode, value: serde_json::Value) -> Response<Full<Bytes>> {
    respond(status, JSON, value.to_string())
}

fn serve_favicon() -> Response<Full<Bytes>> {
    respond(
        StatusCode::OK,
        "image/svg+xml",
        Bytes::from_static(favicon_inline_svg().as_bytes()),
    )
}

/// `GET /user?address=...` from the lookup form.
fn lookup_redirect(query: Option<&str>) -> Response<Full<Bytes>> {
    let address = query
        .unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "address")
        .map(|(_, value)| value.trim_matches('+').trim())
        .unwrap_or_default();

    if address.is_empty() {
        return redirect("/");
    }
    if validate_address(address).is_err() {
        return error_page(
            StatusCode::BAD_REQUEST,
            "Invalid address",
            "Bitcoin addresses contain only letters and digits.",
        );
    }
    redirect(&format!("/user/{}", address))
}

fn redirect(location: &str) -> Response<Full<Bytes>> {
    let mut response = respond(StatusCode::SEE_OTHER, HTML, Bytes::new());
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

fn error_page(status: StatusCode, title: &str, message: &str) -> Response<Full<Bytes>> {
    let html = fill_template(
        ERROR_PAGE_TEMPLATE,
        &[
            ("{title}", escape_html(title)),
            ("{message}", escape_html(message)),
        ],
    );
    respond(status, HTML, html)
}

/// Substitute every placeholder in a single left-to-right pass.
///
/// Inserted values are copied straight to the output and never searched, so
/// upstream text that happens to contain `{address}` or similar stays literal.
fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut html = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, *placeholder, value))
            })
            .min_by_key(|(at, _, _)| *at);

        match next {
            Some((at, placeholder, value)) => {
                html.push_str(&rest[..at]);
                html.push_str(value);
                rest = &rest[at + placeholder.len()..];
            }
            None => {
                html.push_str(rest);
                return html;
            }
        }
    }
}

/// Chart points as the page script reads them.
fn series_points(samples: &[Sample]) -> serde_json::Value {
    samples
        .iter()
        .map(|sample| {
            let value = sample.value();
            json!({
                "label": sample.label,
                "hashrate": sample.hashrate,
                "value": value,
                "display": format_hashrate(value),
            })
        })
        .collect()
}

/// JSON for embedding inside a `<script>` element.
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace('<', "\\u003c")
}

fn client_poll_interval_ms(state: &AppState) -> String {
    (state.client_poll_interval_secs() * 1000).to_string()
}

async fn dashboard_page(state: &AppState) -> Response<Full<Bytes>> {
    let record = match state.dashboard_status().await {
        Ok(record) => record,
        Err(e) => {
            error!("Failed to load pool status for dashboard: {}", e);
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Pool data unavailable",
                "Failed to load pool data from ckpool. Try again in a moment.",
            );
        }
    };

    let samples = state.pool_chart(&record.hashrate1d());
    let current = record
        .hashrate(HashrateWindow::OneMinute)
        .unwrap_or_else(|| "0".to_string());

    let last_update = match record.lastupdate() {
        0 => "unknown".to_string(),
        lastupdate => format_elapsed_time(unix_timestamp(), lastupdate),
    };

    let html = fill_template(
        DASHBOARD_PAGE_TEMPLATE,
        &[
            ("/* {{CARD_ICON_CSS}} */", card_icon_css().to_string()),
            ("/* {{CHART_SCRIPT}} */", CHART_SCRIPT.to_string()),
            ("{client_poll_interval_ms}", client_poll_interval_ms(state)),
            ("{series_url}", "/api/series".to_string()),
            ("{initial_series}", script_json(&series_points(&samples))),
            ("{users}", record.users().to_string()),
            ("{workers}", record.workers().to_string()),
            ("{idle}", record.idle().to_string()),
            ("{disconnected}", record.disconnected().to_string()),
            ("{last_update}", last_update),
            ("{uptime}", format_uptime(record.runtime())),
            ("{stratum_url}", escape_html(state.stratum_url())),
            ("{hashrate_current}", escape_html(&current)),
        ],
    );
    respond(StatusCode::OK, HTML, html)
}

fn worker_rows(user: &UserRecord) -> String {
    if user.worker.is_empty() {
        return r#"<tr><td colspan="4" class="empty">No workers</td></tr>"#.to_string();
    }
    user.worker
        .iter()
        .map(|worker| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{:.0}</td><td>{}</td></tr>",
                escape_html(&worker.workername),
                escape_html(&worker.hashrate1hr),
                worker.shares,
                format_share(worker.bestshare),
            )
        })
        .collect()
}

fn last_share(user: &UserRecord) -> String {
    if user.lastshare == 0 {
        "never".to_string()
    } else {
        format_elapsed_time(unix_timestamp(), user.lastshare)
    }
}

async fn user_page(state: &AppState, address: &str) -> Response<Full<Bytes>> {
    if validate_address(address).is_err() {
        return error_page(
            StatusCode::BAD_REQUEST,
            "Invalid address",
            "Bitcoin addresses contain only letters and digits.",
        );
    }

    let user = match state.user_page_record(address).await {
        Ok(user) => user,
        Err(e) => {
            error!("Failed to load user {}: {}", address, e);
            return error_page(
                StatusCode::INTERNAL_SERVER_ERROR,
                "User data unavailable",
                "Failed to load statistics for this address. Try again in a moment.",
            );
        }
    };

    let samples = state.user_chart(address, &user.hashrate1d);

    let html = fill_template(
        USER_PAGE_TEMPLATE,
        &[
            ("/* {{CARD_ICON_CSS}} */", card_icon_css().to_string()),
            ("/* {{CHART_SCRIPT}} */", CHART_SCRIPT.to_string()),
            ("{client_poll_interval_ms}", client_poll_interval_ms(state)),
            ("{series_url}", format!("/api/user/{}/series", address)),
            ("{initial_series}", script_json(&series_points(&samples))),
            ("{last_share}", last_share(&user)),
            ("{best_share}", format_share(user.bestshare)),
            ("{hashrate_current}", escape_html(&user.hashrate1m)),
            ("{address}", address.to_string()),
            ("{worker_rows}", worker_rows(&user)),
        ],
    );
    respond(StatusCode::OK, HTML, html)
}

async fn api_hashrate(state: &AppState) -> Response<Full<Bytes>> {
    match state.api_status().await {
        Ok(record) => {
            let mut body = serde_json::Map::new();
            body.insert("hashrate1d".to_string(), json!(record.hashrate1d()));
            if let Some(hashrate7d) = record.hashrate(HashrateWindow::SevenDays) {
                body.insert("hashrate7d".to_string(), json!(hashrate7d));
            }
            json_response(StatusCode::OK, serde_json::Value::Object(body))
        }
        Err(e) => {
            error!("Failed to fetch pool status: {}", e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to fetch pool status" }),
            )
        }
    }
}

async fn api_user(state: &AppState, address: &str) -> Response<Full<Bytes>> {
    match state.user_api_record(address).await {
        Ok(user) => match serde_json::to_value(&user) {
            Ok(value) => json_response(StatusCode::OK, value),
            Err(e) => {
                error!("Failed to serialize user {}: {}", address, e);
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to fetch user statistics" }),
                )
            }
        },
        Err(e) if e.is_caller_error() => {
            json_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid address" }))
        }
        Err(e) => {
            error!("Failed to fetch user {}: {}", address, e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to fetch user statistics" }),
            )
        }
    }
}

fn api_series(state: &AppState, key: ChartKey) -> Response<Full<Bytes>> {
    match state.charts().samples(&key) {
        Some(samples) => json_response(
            StatusCode::OK,
            json!({
                "samples": series_points(&samples),
                "capacity": state.charts().capacity(),
                "refresh_interval_secs": state.charts().refresh_interval().as_secs(),
            }),
        ),
        None => {
            warn!("Series requested for unmounted chart {}", key);
            json_response(StatusCode::NOT_FOUND, json!({ "error": "No chart mounted" }))
        }
    }
}

fn health(state: &AppState) -> Response<Full<Bytes>> {
    let stale = state.is_stale();
    let status_code = if stale {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    json_response(status_code, json!({ "healthy": !stale, "stale": stale }))
}

#![forbid(unsafe_code)]

//! Browser front end: serves the keyword form and runs one batch per
//! submission. `POST /api/search` exposes the same batch as JSON.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio::{signal, task};
use tracing::{error, info};
use viral_finder::{
    batch::{BatchError, BatchReport, BatchRequest, run_batch},
    config::{
        DEFAULT_CONFIG_PATH, DEFAULT_DAY_WINDOW, FinderSettings, MAX_DAY_WINDOW, MIN_DAY_WINDOW,
        load_config_from,
    },
    logging,
    present::{self, escape_html},
    youtube::{MetadataSource, YoutubeApi},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Serve the viral video finder form over HTTP.")]
struct Cli {
    #[arg(
        long = "config",
        value_name = "PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the config file"
    )]
    config: PathBuf,
    #[arg(long = "host", value_name = "ADDR", help = "Override the listen address")]
    host: Option<String>,
    #[arg(long = "port", value_name = "PORT", help = "Override the listen port")]
    port: Option<u16>,
}

#[derive(Clone)]
struct AppState {
    source: Arc<dyn MetadataSource + Send + Sync>,
    settings: Arc<FinderSettings>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Browser form fields. `days` stays text so a cleared or mistyped box is
/// answered on the page instead of by the extractor.
#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    keywords: String,
    days: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default = "default_day_window")]
    days: u32,
}

fn default_day_window() -> u32 {
    DEFAULT_DAY_WINDOW
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init("viral_finder=info,viral_server=info");

    let config = load_config_from(&cli.config)?;
    let settings = config.finder;
    let api = YoutubeApi::new(
        &settings.api_base_url,
        settings.require_api_key()?,
        settings.request_timeout,
    );

    let state = AppState {
        source: Arc::new(api),
        settings: Arc::new(settings),
    };

    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = SocketAddr::new(host.parse().context("parsing listen address")?, port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("finder listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running finder server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(show_form))
        .route("/search", post(search_form))
        .route("/api/search", post(search_json))
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        error!("Failed to install Ctrl+C handler: {}", err);
    }
}

async fn show_form() -> Html<String> {
    Html(render_page("", DEFAULT_DAY_WINDOW, ""))
}

/// A blank box means the default window.
fn form_day_window(raw: Option<&str>) -> Result<u32, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(DEFAULT_DAY_WINDOW),
        Some(text) => text
            .parse()
            .map_err(|_| format!("'{text}' is not a whole number of days")),
    }
}

/// Input problems and failed runs are shown inline on the form rather than
/// as an error page.
async fn search_form(State(state): State<AppState>, Form(form): Form<SearchForm>) -> Response {
    let parsed = form_day_window(form.days.as_deref()).and_then(|days| {
        BatchRequest::from_text(&form.keywords, days).map_err(|err| err.to_string())
    });
    let request = match parsed {
        Ok(request) => request,
        Err(message) => {
            let days = form_day_window(form.days.as_deref()).unwrap_or(DEFAULT_DAY_WINDOW);
            return form_notice(StatusCode::BAD_REQUEST, &form.keywords, days, &message);
        }
    };

    let days = request.day_window;
    match state.run(request).await {
        Ok(report) => Html(render_page(
            &form.keywords,
            days,
            &present::render_html(&report),
        ))
        .into_response(),
        Err(err) => {
            error!(error = %err.message, "form search failed");
            form_notice(err.status, &form.keywords, days, &err.message)
        }
    }
}

fn form_notice(status: StatusCode, keywords: &str, days: u32, message: &str) -> Response {
    let notice = format!("<p class=\"warning\">{}</p>\n", escape_html(message));
    (status, Html(render_page(keywords, days, &notice))).into_response()
}

async fn search_json(
    State(state): State<AppState>,
    Json(payload): Json<SearchPayload>,
) -> ApiResult<Json<BatchReport>> {
    let request = BatchRequest::from_terms(&payload.keywords, payload.days)?;
    let report = state.run(request).await?;
    Ok(Json(report))
}

impl AppState {
    /// Batches use the blocking HTTP client, so they run on the blocking pool.
    async fn run(&self, request: BatchRequest) -> ApiResult<BatchReport> {
        let source = Arc::clone(&self.source);
        let settings = Arc::clone(&self.settings);
        task::spawn_blocking(move || run_batch(source.as_ref(), &settings, &request, Utc::now()))
            .await
            .map_err(|err| ApiError::internal(format!("task join error: {err}")))?
            .map_err(ApiError::from)
    }
}

fn render_page(keywords: &str, days: u32, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>YouTube Viral Finder</title>
<style>
body {{ font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }}
textarea {{ width: 100%; }}
.warning {{ color: #8a5300; background: #fff4e0; padding: 0.5rem; }}
.success {{ color: #135c1b; background: #e7f6e9; padding: 0.5rem; }}
.result {{ border-bottom: 1px solid #ddd; padding: 0.5rem 0; }}
dl {{ display: grid; grid-template-columns: max-content auto; gap: 0.2rem 1rem; }}
</style>
</head>
<body>
<h1>YouTube Viral Finder</h1>
<form method="post" action="/search">
<h2>Keywords</h2>
<label for="keywords">Enter keywords (one per line):</label>
<textarea id="keywords" name="keywords" rows="8" placeholder="wildlife rescue&#10;animal rescue&#10;dog rescue">{keywords}</textarea>
<p>
<label for="days">Search videos published in last N days:</label>
<input id="days" name="days" type="number" min="{min}" max="{max}" value="{days}">
</p>
<button type="submit">Find Viral Videos</button>
</form>
<section id="results">
{body}</section>
</body>
</html>
"#,
        keywords = escape_html(keywords),
        min = MIN_DAY_WINDOW,
        max = MAX_DAY_WINDOW,
        days = days.clamp(MIN_DAY_WINDOW, MAX_DAY_WINDOW),
        body = body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use chrono::{DateTime, Duration};
    use tower::ServiceExt;
    use viral_finder::youtube::{
        ChannelStatistics, FetchError, SearchQuery, VideoCandidate, VideoStatistics,
    };

    /// Fixed answers keyed by keyword. `storm` fails, `boom` panics.
    struct CannedSource {
        published_at: DateTime<Utc>,
    }

    impl MetadataSource for CannedSource {
        fn search(
            &self,
            query: &SearchQuery,
            _max_results: u32,
        ) -> Result<Vec<VideoCandidate>, FetchError> {
            match query.keyword.as_str() {
                "dog rescue" => Ok(vec![VideoCandidate {
                    video_id: "dog1".into(),
                    channel_id: "shelter".into(),
                    title: "Rescuer's puppy".into(),
                    published_at: self.published_at,
                }]),
                "storm" => Err(FetchError::Status {
                    endpoint: "search",
                    status: 403,
                }),
                "boom" => panic!("source crashed"),
                _ => Ok(Vec::new()),
            }
        }

        fn video_statistics(&self, video_ids: &[String]) -> Result<VideoStatistics, FetchError> {
            Ok(video_ids.iter().map(|id| (id.clone(), 500_000)).collect())
        }

        fn channel_statistics(
            &self,
            channel_ids: &[String],
        ) -> Result<ChannelStatistics, FetchError> {
            Ok(channel_ids.iter().map(|id| (id.clone(), 2_000)).collect())
        }
    }

    fn test_router() -> Router {
        let source = CannedSource {
            published_at: Utc::now() - Duration::days(3),
        };
        router(AppState {
            source: Arc::new(source),
            settings: Arc::new(FinderSettings::default()),
        })
    }

    async fn send(request: Request<Body>) -> (StatusCode, String, String) {
        let response = test_router().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn form_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/search")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    fn json_post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[test]
    fn page_escapes_previous_keywords() {
        let page = render_page("<dogs>\ncats", 7, "");
        assert!(page.contains("&lt;dogs&gt;\ncats</textarea>"));
        assert!(page.contains("value=\"7\""));
    }

    #[test]
    fn page_clamps_displayed_day_window() {
        assert!(render_page("", 99, "").contains("value=\"30\""));
        assert!(render_page("", 0, "").contains("value=\"1\""));
    }

    #[test]
    fn empty_form_maps_to_bad_request() {
        let err = ApiError::from(BatchError::NoKeywords);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, present::NO_KEYWORDS_NOTICE);
    }

    #[test]
    fn form_day_window_parsing() {
        assert_eq!(form_day_window(None), Ok(DEFAULT_DAY_WINDOW));
        assert_eq!(form_day_window(Some(" ")), Ok(DEFAULT_DAY_WINDOW));
        assert_eq!(form_day_window(Some("12")), Ok(12));
        assert_eq!(
            form_day_window(Some("-3")),
            Err("'-3' is not a whole number of days".to_string())
        );
    }

    #[test]
    fn payload_defaults_day_window() {
        let payload: SearchPayload = serde_json::from_str(r#"{"keywords": ["dogs"]}"#).unwrap();
        assert_eq!(payload.days, DEFAULT_DAY_WINDOW);
        let payload: SearchPayload = serde_json::from_str(r#"{"days": 3}"#).unwrap();
        assert!(payload.keywords.is_empty());
        assert_eq!(payload.days, 3);
    }

    #[tokio::test]
    async fn index_serves_form() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let (status, content_type, body) = send(request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("<form method=\"post\" action=\"/search\">"));
    }

    #[tokio::test]
    async fn api_search_rejects_empty_keywords() {
        let (status, content_type, body) = send(json_post(r#"{"keywords": []}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("application/json"));
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], present::NO_KEYWORDS_NOTICE);
    }

    #[tokio::test]
    async fn api_search_returns_report() {
        let (status, _, body) =
            send(json_post(r#"{"keywords": ["dog rescue", "storm"], "days": 5}"#)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["keywords"], serde_json::json!(["dog rescue", "storm"]));
        assert_eq!(
            json["results"][0]["url"],
            "https://www.youtube.com/watch?v=dog1"
        );
        assert_eq!(json["results"][0]["views_to_subs"], 250.0);
        assert_eq!(json["warnings"][0]["keyword"], "storm");
    }

    #[tokio::test]
    async fn form_search_renders_results_and_warnings() {
        let (status, content_type, body) =
            send(form_post("keywords=dog+rescue%0Astorm&days=7")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("Found 1 viral opportunity"));
        assert!(body.contains("<h3>Rescuer&#39;s puppy</h3>"));
        assert!(body.contains(
            "Error with keyword &#39;storm&#39;: search request returned HTTP 403"
        ));
    }

    #[tokio::test]
    async fn form_blank_days_uses_default_window() {
        let (status, _, body) = send(form_post("keywords=dog+rescue&days=")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("value=\"7\""));
        assert!(body.contains("Found 1 viral opportunity"));
    }

    #[tokio::test]
    async fn form_bad_days_are_reported_inline() {
        let (status, content_type, body) = send(form_post("keywords=dogs&days=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains(
            "<p class=\"warning\">&#39;abc&#39; is not a whole number of days</p>"
        ));
        assert!(body.contains(">dogs</textarea>"));

        let (status, _, body) = send(form_post("keywords=dogs&days=45")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("day window must be between 1 and 30 days, got 45"));
    }

    #[tokio::test]
    async fn form_without_keywords_is_reported_inline() {
        let (status, content_type, body) = send(form_post("keywords=%0A++%0A&days=7")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains(present::NO_KEYWORDS_NOTICE));
    }

    #[tokio::test]
    async fn form_failed_run_is_reported_inline() {
        let (status, content_type, body) = send(form_post("keywords=boom&days=7")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(content_type.starts_with("text/html"));
        assert!(body.contains("task join error"));
        assert!(body.contains("<form method=\"post\""));
    }
}

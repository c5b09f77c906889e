use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

pub const API_TOKEN: &str = "test-api-token";
pub const ACCESS_TOKEN: &str = "stub-access-token";
pub const BASE_UUID: &str = "b7c1e2f0-stub";

#[derive(Debug, Clone)]
pub struct StubFile {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SeaTableStubConfig {
    /// The metadata `tables` array, verbatim.
    pub tables: serde_json::Value,
    /// Rows array per view name; `""` serves requests without a view. Row
    /// values may embed the `{BASE}` placeholder, replaced with the bound
    /// base URL at spawn time.
    pub rows_by_view: HashMap<String, serde_json::Value>,
    /// Served bytes per request path; anything else is a 404.
    pub files: HashMap<String, StubFile>,
}

pub struct SeaTableStub {
    pub base_url: String,
    /// Request count per file path, shared with the serving thread.
    pub file_hits: Arc<Mutex<HashMap<String, usize>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl SeaTableStub {
    pub fn spawn(config: SeaTableStubConfig) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start seatable stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let mut config = config;
        for rows in config.rows_by_view.values_mut() {
            let raw = rows.to_string().replace("{BASE}", &base_url);
            *rows = serde_json::from_str(&raw).expect("substitute {BASE} in stub rows");
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let file_hits: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        let thread_base_url = base_url.clone();
        let thread_file_hits = Arc::clone(&file_hits);
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let requested = match url::Url::parse(&format!("http://stub{}", request.url())) {
                    Ok(parsed) => parsed,
                    Err(_) => {
                        let _ = request.respond(
                            tiny_http::Response::from_string("bad request url")
                                .with_status_code(400),
                        );
                        continue;
                    }
                };
                let path = requested.path().to_owned();

                let response = route(
                    &config,
                    &thread_base_url,
                    &thread_file_hits,
                    &request,
                    &path,
                    &requested,
                );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            file_hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn hits_for(&self, path: &str) -> usize {
        self.file_hits
            .lock()
            .expect("lock file hits")
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for SeaTableStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

type StubResponse = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

fn route(
    config: &SeaTableStubConfig,
    base_url: &str,
    file_hits: &Mutex<HashMap<String, usize>>,
    request: &tiny_http::Request,
    path: &str,
    requested: &url::Url,
) -> StubResponse {
    if path == "/api/v2.1/dtable/app-access-token/" {
        if header_value(request, "Authorization") != Some(format!("Token {API_TOKEN}")) {
            return json_response(
                serde_json::json!({"error_msg": "permission denied"}),
                403,
            );
        }
        return json_response(
            serde_json::json!({"access_token": ACCESS_TOKEN, "dtable_uuid": BASE_UUID}),
            200,
        );
    }

    if path == format!("/dtable-server/api/v1/dtables/{BASE_UUID}/metadata/") {
        if !has_bearer(request) {
            return json_response(serde_json::json!({"error_msg": "bad access token"}), 403);
        }
        return json_response(
            serde_json::json!({"metadata": {"tables": &config.tables}}),
            200,
        );
    }

    if path == format!("/dtable-server/api/v1/dtables/{BASE_UUID}/rows/") {
        if !has_bearer(request) {
            return json_response(serde_json::json!({"error_msg": "bad access token"}), 403);
        }
        let view = query_param(requested, "view_name").unwrap_or_default();
        return match config.rows_by_view.get(&view) {
            Some(rows) => json_response(serde_json::json!({"rows": &rows}), 200),
            None => json_response(
                serde_json::json!({"error_msg": format!("view not found: {view}")}),
                404,
            ),
        };
    }

    if path == "/api/v2.1/dtable/app-download-link/" {
        let Some(asset_path) = query_param(requested, "path") else {
            return json_response(serde_json::json!({"error_msg": "missing path"}), 400);
        };
        return json_response(
            serde_json::json!({"download_link": format!("{base_url}/files/{asset_path}")}),
            200,
        );
    }

    // Everything else is a file request: download-link targets under
    // /files/ and direct image URLs alike.
    {
        let mut hits = file_hits.lock().expect("lock file hits");
        *hits.entry(path.to_owned()).or_insert(0) += 1;
    }
    match config.files.get(path) {
        Some(file) => {
            let mut response =
                tiny_http::Response::from_data(file.bytes.clone()).with_status_code(200);
            let header = tiny_http::Header::from_bytes(
                &b"Content-Type"[..],
                file.content_type.as_bytes(),
            )
            .expect("build header");
            response = response.with_header(header);
            response
        }
        None => tiny_http::Response::from_data(b"not found".to_vec()).with_status_code(404),
    }
}

fn header_value(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv(name))
        .map(|header| header.value.as_str().to_owned())
}

fn has_bearer(request: &tiny_http::Request) -> bool {
    header_value(request, "Authorization") == Some(format!("Bearer {ACCESS_TOKEN}"))
}

fn query_param(requested: &url::Url, key: &str) -> Option<String> {
    requested
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.to_string())
}

fn json_response(value: serde_json::Value, status: u16) -> StubResponse {
    let mut response =
        tiny_http::Response::from_string(value.to_string()).with_status_code(status);
    let header =
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
            .expect("build header");
    response = response.with_header(header);
    response
}

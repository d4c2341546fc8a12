#![allow(dead_code)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use enphase_grid_charging::api;
use enphase_grid_charging::model::Credentials;
use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, HeaderMap, Method, Request, Response, Server, StatusCode};

pub const TOKEN_PATH: &str = "/oauth/token";
pub const SETTINGS_PATH: &str = "/api/v4/systems/config/1765/battery_settings";
pub const SYSTEM_ID: &str = "1765";
pub const API_KEY: &str = "apikey1";

pub const SETTINGS: &str = r#"{
  "system_id": 1765,
  "battery_mode": "Self - Consumption",
  "reserve_soc": 95,
  "energy_independence": "enabled",
  "charge_from_grid": "disabled",
  "battery_shutdown_level": 13
}"#;

/// A request as seen by the stub server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Decoded `application/x-www-form-urlencoded` body.
    pub fn form(&self) -> Vec<(String, String)> {
        reqwest::Url::parse(&format!("http://stub/?{}", self.body))
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.form()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Reply {
            status: StatusCode::from_u16(status).unwrap(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Reply::new(200, body)
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Reply { delay, ..self }
    }
}

type Handler = Arc<dyn Fn(&Recorded) -> Reply + Send + Sync>;

/// Vendor API stand-in. Every request is recorded, then answered by the handler.
pub struct StubServer {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl StubServer {
    pub fn start<H>(handler: H) -> Self
    where
        H: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));

        let make_svc = {
            let requests = requests.clone();
            make_service_fn(move |_conn| {
                let handler = handler.clone();
                let requests = requests.clone();
                async move {
                    Ok::<_, Infallible>(service_fn(move |req| {
                        respond(handler.clone(), requests.clone(), req)
                    }))
                }
            })
        };

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
        let url = format!("http://{}", server.local_addr());
        tokio::spawn(async move {
            if let Err(err) = server.await {
                eprintln!("StubServer: {err}");
            }
        });

        StubServer { url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }

    pub fn api(&self, timeout: Duration) -> enphase_grid_charging::model::Api {
        let mut api = api::api(String::from(API_KEY), credentials());
        api.api_url = self.url.clone();
        api.auth_url = format!("{}/oauth", self.url);
        api.request_timeout = timeout;
        api
    }

    pub fn client(&self) -> api::Client {
        api::Client::new(self.api(Duration::from_secs(5))).unwrap()
    }
}

async fn respond(
    handler: Handler,
    requests: Arc<Mutex<Vec<Recorded>>>,
    req: Request<Body>,
) -> Result<Response<Body>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = hyper::body::to_bytes(body).await.unwrap_or_default();
    let recorded = Recorded {
        method: parts.method,
        path: parts.uri.path().to_owned(),
        query: parts.uri.query().map(str::to_owned),
        headers: parts.headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    let reply = handler(&recorded);
    requests.lock().unwrap().push(recorded);

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let response = Response::builder()
        .status(reply.status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(reply.body))
        .unwrap();
    Ok(response)
}

pub fn credentials() -> Credentials {
    Credentials {
        client_id: "id1".into(),
        client_secret: "secret1".into(),
        authorization_code: "abc123".into(),
        redirect_uri: api::endpoint::REDIRECT_URI.into(),
    }
}

pub fn token_body(n: usize, expires_in: u64) -> String {
    format!(
        r#"{{"access_token":"access-{n}","refresh_token":"refresh-{n}","expires_in":{expires_in},"token_type":"bearer"}}"#
    )
}

/// Token endpoint issuing `access-1`, `access-2`, ... valid for an hour.
pub fn token_issuer() -> impl Fn(&Recorded) -> Reply + Send + Sync + 'static {
    let issued = AtomicUsize::new(0);
    move |_| Reply::ok(token_body(issued.fetch_add(1, Ordering::SeqCst) + 1, 3600))
}

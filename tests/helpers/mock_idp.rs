//! Mock OIDC identity provider for integration tests
//!
//! Serves the token, userinfo, and JWKS endpoints on a loopback port.
//! Tokens are configured per test; error modes simulate a misbehaving
//! provider.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use reinhardt_oidc::TokenResponse;

/// Error simulation mode
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
	Success,
	ServerError,
	Unauthorized,
	InvalidResponse,
}

struct MockIdpState {
	error_mode: ErrorMode,
	id_token: Option<String>,
	userinfo_body: String,
	jwks_body: String,
}

/// Mock OIDC provider
pub struct MockIdpServer {
	state: Arc<Mutex<MockIdpState>>,
	local_addr: SocketAddr,
}

impl MockIdpServer {
	/// Start the server with an initial JWKS document
	pub async fn start(jwks_body: String) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let local_addr = listener.local_addr().unwrap();

		let state = Arc::new(Mutex::new(MockIdpState {
			error_mode: ErrorMode::Success,
			id_token: None,
			userinfo_body: r#"{"sub": "user123", "email": "user@example.com"}"#.to_string(),
			jwks_body,
		}));

		let state_clone = state.clone();
		tokio::spawn(async move {
			let state = state_clone;
			loop {
				if let Ok((stream, _)) = listener.accept().await {
					let io = TokioIo::new(stream);
					let state = state.clone();

					tokio::spawn(async move {
						let service = hyper::service::service_fn(move |req: Request<Incoming>| {
							let state = state.clone();
							async move { handle_request(req, state).await }
						});

						let _ = hyper::server::conn::http1::Builder::new()
							.serve_connection(io, service)
							.await;
					});
				}
			}
		});

		// Wait for the accept loop to come up
		tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

		Self { state, local_addr }
	}

	pub fn base_url(&self) -> String {
		format!("http://{}", self.local_addr)
	}

	pub fn authorization_url(&self) -> String {
		format!("{}/authorize", self.base_url())
	}

	pub fn token_url(&self) -> String {
		format!("{}/token", self.base_url())
	}

	pub fn userinfo_url(&self) -> String {
		format!("{}/userinfo", self.base_url())
	}

	pub fn jwks_url(&self) -> String {
		format!("{}/jwks", self.base_url())
	}

	/// Raw ID token the token endpoint hands out
	pub fn set_id_token(&self, raw: impl Into<String>) {
		self.state.lock().unwrap().id_token = Some(raw.into());
	}

	/// Userinfo response body
	pub fn set_userinfo(&self, body: impl Into<String>) {
		self.state.lock().unwrap().userinfo_body = body.into();
	}

	/// Replace the served JWKS document (key rotation)
	pub fn set_jwks(&self, body: impl Into<String>) {
		self.state.lock().unwrap().jwks_body = body.into();
	}

	pub fn set_error_mode(&self, mode: ErrorMode) {
		self.state.lock().unwrap().error_mode = mode;
	}
}

async fn handle_request(
	req: Request<Incoming>,
	state: Arc<Mutex<MockIdpState>>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
	let (error_mode, id_token, userinfo_body, jwks_body) = {
		let state = state.lock().unwrap();
		(
			state.error_mode,
			state.id_token.clone(),
			state.userinfo_body.clone(),
			state.jwks_body.clone(),
		)
	};

	let response = match (req.method(), req.uri().path()) {
		(&Method::POST, "/token") => match error_mode {
			ErrorMode::ServerError => plain(StatusCode::INTERNAL_SERVER_ERROR, "server error"),
			ErrorMode::Unauthorized => plain(StatusCode::UNAUTHORIZED, "invalid_client"),
			ErrorMode::InvalidResponse => plain(StatusCode::OK, "this is not json"),
			ErrorMode::Success => {
				let body = serde_json::to_string(&TokenResponse {
					access_token: "mock-access-token".to_string(),
					token_type: Some("Bearer".to_string()),
					expires_in: Some(300),
					refresh_token: None,
					id_token,
					scope: None,
				})
				.unwrap();
				json(StatusCode::OK, body)
			}
		},
		(&Method::GET, "/userinfo") => match error_mode {
			ErrorMode::ServerError => plain(StatusCode::INTERNAL_SERVER_ERROR, "server error"),
			_ => json(StatusCode::OK, userinfo_body),
		},
		(&Method::GET, "/jwks") => json(StatusCode::OK, jwks_body),
		_ => plain(StatusCode::NOT_FOUND, "not found"),
	};

	Ok(response)
}

fn json(status: StatusCode, body: String) -> Response<Full<Bytes>> {
	Response::builder()
		.status(status)
		.header("content-type", "application/json")
		.body(Full::new(Bytes::from(body)))
		.unwrap()
}

fn plain(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
	Response::builder()
		.status(status)
		.body(Full::new(Bytes::from(body.to_string())))
		.unwrap()
}

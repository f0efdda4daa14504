//! Agent trigger over HTTP(S)

use async_trait::async_trait;

use super::Trigger;
use crate::error::TransportError;
use crate::logging::*;

pub struct HttpTrigger {
	client: reqwest::Client,
}

impl HttpTrigger {
	pub fn new() -> Result<Self, TransportError> {
		let client = reqwest::Client::builder()
			.user_agent(concat!("shipit/", env!("CARGO_PKG_VERSION")))
			.build()
			.map_err(|e| TransportError::Http { url: String::new(), message: e.to_string() })?;
		Ok(Self { client })
	}
}

#[async_trait]
impl Trigger for HttpTrigger {
	async fn post(&self, url: &str, secret: &str) -> Result<String, TransportError> {
		let http_error =
			|e: reqwest::Error| TransportError::Http { url: url.to_string(), message: e.to_string() };

		let response =
			self.client.post(url).form(&[("key", secret)]).send().await.map_err(http_error)?;

		let status = response.status();
		if !status.is_success() {
			warn!("{} answered {}", url, status);
			return Err(TransportError::Status { url: url.to_string(), status: status.as_u16() });
		}
		response.text().await.map_err(http_error)
	}
}

// vim: ts=4

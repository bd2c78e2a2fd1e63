//! HTTP transport
//!
//! Blocking `ureq` calls run on the tokio blocking pool. Every HTTP status is
//! handed back as a response; only calls that produce no response at all
//! (connect failures, timeouts, unreadable bodies) are errors.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use ureq::Agent;

use crate::{
    config::Rest,
    core::{
        request::{RawResponse, RestRequest},
        traits::Transport,
        DataError, DataResult,
    },
    utils::content_type,
};

pub struct HttpTransport {
    agent: Agent,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(rest: &Rest) -> DataResult<Self> {
        if rest.timeout == 0 {
            return Err(crate::config_error!("rest.timeout must be at least one second"));
        }
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(rest.timeout)))
            .http_status_as_error(false)
            .build()
            .into();
        Ok(Self {
            agent,
            user_agent: rest.user_agent.clone(),
        })
    }
}

fn network_error(request: &RestRequest, err: ureq::Error) -> DataError {
    DataError::Network(format!("{} {}: {}", request.method, request.href, err))
}

fn execute_blocking(agent: &Agent, user_agent: &str, request: &RestRequest) -> DataResult<RawResponse> {
    let href = request.href.as_str();
    let body = request.body.clone().unwrap_or_default();

    let result = match request.method.as_str() {
        "GET" => agent
            .get(href)
            .header("Accept", content_type::HAL_JSON)
            .header("User-Agent", user_agent)
            .call(),
        "DELETE" => agent
            .delete(href)
            .header("Accept", content_type::HAL_JSON)
            .header("User-Agent", user_agent)
            .call(),
        "POST" => agent
            .post(href)
            .header("Accept", content_type::HAL_JSON)
            .header("Content-Type", content_type::APPLICATION_JSON)
            .header("User-Agent", user_agent)
            .send(&body[..]),
        "PUT" => agent
            .put(href)
            .header("Accept", content_type::HAL_JSON)
            .header("Content-Type", content_type::APPLICATION_JSON)
            .header("User-Agent", user_agent)
            .send(&body[..]),
        "PATCH" => agent
            .patch(href)
            .header("Accept", content_type::HAL_JSON)
            .header("Content-Type", content_type::APPLICATION_JSON)
            .header("User-Agent", user_agent)
            .send(&body[..]),
        other => {
            return Err(DataError::Unsupported(format!(
                "HTTP method {other} is not supported"
            )))
        }
    };

    let response = result.map_err(|e| network_error(request, e))?;
    let status = response.status();
    let body = response
        .into_body()
        .read_to_vec()
        .map_err(|e| network_error(request, e))?;
    debug!("{} {} -> {}", request.method, request.href, status);
    Ok(RawResponse::new(status, Bytes::from(body)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &RestRequest) -> DataResult<RawResponse> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let request = request.clone();

        tokio::task::spawn_blocking(move || execute_blocking(&agent, &user_agent, &request))
            .await
            .map_err(|e| DataError::Internal(format!("transport task join error: {e}")))?
    }
}

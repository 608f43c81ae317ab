// src/infrastructure/http.rs
// Shared HTTPS client for the JSON collaborators

use hyper::client::HttpConnector;
use hyper::{Body, Client, Method, Request, StatusCode};
use hyper_tls::HttpsConnector;

use crate::domain::errors::{HttpError, HttpResult};

pub type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

pub fn https_client() -> HttpsClient {
    Client::builder().build::<_, Body>(HttpsConnector::new())
}

async fn read_body(response: hyper::Response<Body>) -> HttpResult<(StatusCode, String)> {
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(HttpError::Body)?;

    Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
}

/// POST a JSON body and return the status with the raw response text
pub async fn post_json(
    client: &HttpsClient,
    url: &str,
    bearer: Option<&str>,
    payload: &serde_json::Value,
) -> HttpResult<(StatusCode, String)> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(url)
        .header("content-type", "application/json");
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }

    let request = builder
        .body(Body::from(payload.to_string()))
        .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

    let response = client.request(request).await.map_err(HttpError::Transport)?;
    read_body(response).await
}

pub async fn get(client: &HttpsClient, url: &str) -> HttpResult<(StatusCode, String)> {
    let uri = url
        .parse::<hyper::Uri>()
        .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;
    let response = client.get(uri).await.map_err(HttpError::Transport)?;
    read_body(response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_malformed_url_is_rejected_before_sending() {
        let client = https_client();

        let err = get(&client, "not a url").await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidRequest(_)));

        let err = post_json(&client, "not a url", Some("token"), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, HttpError::InvalidRequest(_)));
        assert!(err.to_string().starts_with("Failed to build request"));
    }
}

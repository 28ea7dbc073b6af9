//! # sf-api-http
//!
//! REST implementation of the remote ports.
//!
//! Resources live under `{base_url}/api/`. Every request carries the session
//! token as a bearer credential and exchanges camelCase JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use sf_core::{
    AppError, AuthToken, Community, CommunityApi, CommunityScope, EntityKind, FetchScope,
    Interactable, InteractableApi, NewComment, Result,
};
use tracing::debug;
use uuid::Uuid;

pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("skillfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Send with auth and turn non-2xx statuses into `AppError`.
    ///
    /// `target` names the entity a 404 refers to.
    async fn send(
        &self,
        request: RequestBuilder,
        token: &AuthToken,
        target: Option<(EntityKind, Uuid)>,
    ) -> Result<Response> {
        let response = request
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, target))
    }
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::Network(err.to_string())
}

async fn decode<R: DeserializeOwned>(response: Response) -> Result<R> {
    response.json().await.map_err(|e| {
        if e.is_decode() {
            AppError::Internal(format!("undecodable response body: {e}"))
        } else {
            transport(e)
        }
    })
}

/// `{"message": "..."}` bodies carry the server's explanation.
fn server_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_owned)
}

fn status_error(status: StatusCode, body: &str, target: Option<(EntityKind, Uuid)>) -> AppError {
    let detail = server_message(body)
        .or_else(|| Some(body.trim().to_string()).filter(|b| !b.is_empty()))
        .unwrap_or_else(|| status.to_string());

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::Validation(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(detail),
        StatusCode::NOT_FOUND => match target {
            Some((kind, id)) => AppError::not_found(kind, id),
            None => AppError::Internal(format!("endpoint not found: {detail}")),
        },
        s if s.is_server_error() => AppError::Network(detail),
        _ => AppError::Internal(format!("unexpected status {status}: {detail}")),
    }
}

#[async_trait]
impl<T> InteractableApi<T> for HttpApi
where
    T: Interactable + Serialize + DeserializeOwned,
{
    async fn fetch_all(&self, scope: &FetchScope, token: &AuthToken) -> Result<Vec<T>> {
        let resource = T::KIND.resource();
        let path = match scope {
            FetchScope::All => resource.to_string(),
            FetchScope::ByAuthor(author) => format!("{resource}/user/{author}"),
        };
        debug!(%path, "fetching");
        let response = self.send(self.client.get(self.url(&path)), token, None).await?;
        decode(response).await
    }

    async fn add_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("{}/{parent_id}/likes", T::KIND.resource()));
        let request = self.client.post(url).json(&json!({ "userId": user_id }));
        self.send(request, token, Some((T::KIND, parent_id))).await?;
        Ok(())
    }

    async fn remove_like(&self, parent_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("{}/{parent_id}/likes/{user_id}", T::KIND.resource()));
        self.send(self.client.delete(url), token, Some((T::KIND, parent_id)))
            .await?;
        Ok(())
    }

    async fn add_comment(&self, parent_id: Uuid, comment: NewComment, token: &AuthToken) -> Result<T> {
        let url = self.url(&format!("{}/{parent_id}/comments", T::KIND.resource()));
        let response = self
            .send(self.client.post(url).json(&comment), token, Some((T::KIND, parent_id)))
            .await?;
        decode(response).await
    }

    async fn update_comment(
        &self,
        parent_id: Uuid,
        comment_id: Uuid,
        content: &str,
        token: &AuthToken,
    ) -> Result<()> {
        let url = self.url(&format!("{}/{parent_id}/comments/{comment_id}", T::KIND.resource()));
        let request = self.client.put(url).json(&json!({ "content": content }));
        self.send(request, token, Some((EntityKind::Comment, comment_id)))
            .await?;
        Ok(())
    }

    async fn delete_comment(&self, parent_id: Uuid, comment_id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("{}/{parent_id}/comments/{comment_id}", T::KIND.resource()));
        self.send(self.client.delete(url), token, Some((EntityKind::Comment, comment_id)))
            .await?;
        Ok(())
    }

    async fn update(&self, entity: T, token: &AuthToken) -> Result<T> {
        let id = entity.id();
        let url = self.url(&format!("{}/{id}", T::KIND.resource()));
        let response = self
            .send(self.client.put(url).json(&entity), token, Some((T::KIND, id)))
            .await?;
        decode(response).await
    }

    async fn delete(&self, id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("{}/{id}", T::KIND.resource()));
        self.send(self.client.delete(url), token, Some((T::KIND, id)))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CommunityApi for HttpApi {
    async fn fetch(&self, scope: CommunityScope, user_id: Uuid, token: &AuthToken) -> Result<Vec<Community>> {
        let path = match scope {
            CommunityScope::All => "communities".to_string(),
            CommunityScope::Mine => format!("communities/user/{user_id}"),
            CommunityScope::Public => "communities/public".to_string(),
        };
        debug!(%path, "fetching");
        let response = self.send(self.client.get(self.url(&path)), token, None).await?;
        decode(response).await
    }

    async fn join(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("communities/{community_id}/join"));
        let request = self.client.post(url).json(&json!({ "userId": user_id }));
        self.send(request, token, Some((EntityKind::Community, community_id)))
            .await?;
        Ok(())
    }

    async fn leave(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<()> {
        let url = self.url(&format!("communities/{community_id}/leave"));
        let request = self.client.post(url).json(&json!({ "userId": user_id }));
        self.send(request, token, Some((EntityKind::Community, community_id)))
            .await?;
        Ok(())
    }

    async fn is_member(&self, community_id: Uuid, user_id: Uuid, token: &AuthToken) -> Result<bool> {
        let url = self.url(&format!("communities/{community_id}/members/{user_id}"));
        let response = self
            .send(self.client.get(url), token, Some((EntityKind::Community, community_id)))
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sf_core::Post;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer exactly one request with `status_line` and `body`.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{addr}")
    }

    /// Drain headers plus `content-length` bytes so closing never resets the client.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if received.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    fn api(base_url: String) -> HttpApi {
        HttpApi::new(base_url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn statuses_map_to_error_variants() {
        let id = Uuid::now_v7();
        let target = Some((EntityKind::Post, id));

        assert!(matches!(status_error(StatusCode::BAD_REQUEST, "", target), AppError::Validation(_)));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "", target),
            AppError::Validation(_)
        ));
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, "", target), AppError::Auth(_)));
        assert!(matches!(status_error(StatusCode::FORBIDDEN, "", target), AppError::Auth(_)));
        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "", target),
            AppError::NotFound(EntityKind::Post, id)
        );
        assert!(matches!(status_error(StatusCode::NOT_FOUND, "", None), AppError::Internal(_)));
        assert!(matches!(status_error(StatusCode::BAD_GATEWAY, "", target), AppError::Network(_)));
    }

    #[test]
    fn server_message_is_preferred() {
        let err = status_error(StatusCode::BAD_REQUEST, r#"{"message":"content too long"}"#, None);
        assert_eq!(err, AppError::Validation("content too long".into()));

        let err = status_error(StatusCode::FORBIDDEN, "  nope ", None);
        assert_eq!(err, AppError::Auth("nope".into()));
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let api = api("http://localhost:8080/".into());
        assert_eq!(api.url("posts"), "http://localhost:8080/api/posts");
    }

    #[tokio::test]
    async fn fetch_decodes_camel_case_posts() {
        let base = serve_once(
            "200 OK",
            r#"[{"id":"0190a6d2-8b1e-7c3a-9f4e-1a2b3c4d5e6f","userId":"0190a6d2-8b1e-7c3a-9f4e-000000000001","content":"hello","createdAt":"2024-05-01T12:00:00Z","likes":[],"comments":[]}]"#,
        )
        .await;
        let posts: Vec<Post> = api(base)
            .fetch_all(&FetchScope::All, &AuthToken::new("t"))
            .await
            .unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "hello");
    }

    #[tokio::test]
    async fn missing_parent_is_not_found() {
        let base = serve_once("404 Not Found", "").await;
        let id = Uuid::now_v7();
        let err = InteractableApi::<Post>::add_like(&api(base), id, Uuid::now_v7(), &AuthToken::new("t"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::NotFound(EntityKind::Post, id));
    }

    #[tokio::test]
    async fn garbage_body_is_internal() {
        let base = serve_once("200 OK", "<html>").await;
        let err = InteractableApi::<Post>::fetch_all(&api(base), &FetchScope::All, &AuthToken::new("t"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_network() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = CommunityApi::is_member(
            &api(format!("http://{addr}")),
            Uuid::now_v7(),
            Uuid::now_v7(),
            &AuthToken::new("t"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }
}

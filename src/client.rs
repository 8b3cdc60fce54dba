//! REST client for the assistant backend.
//!
//! Every endpoint returns the standard `{success, message, data,
//! errorCode, timestamp}` envelope; [`ApiClient`] unwraps it and maps
//! failures into [`ApiError`]. A 401 triggers exactly one
//! refresh-token exchange and retry; if the exchange fails the stored
//! session is cleared and the caller sees `SessionExpired`.

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::models::{
    ApiEnvelope, Conversation, CreateCategoryRequest, CreateConversationRequest,
    CreateDocumentRequest, CreateToolRequest, DocumentSearch, ImportResult, KnowledgeCategory,
    KnowledgeDocument, LoginRequest, LoginResponse, Message, Paginated, RefreshRequest,
    RefreshResponse, RegisterRequest, RenameConversationRequest, SendMessageRequest,
    TestToolRequest, Tool, ToolExecution, ToolTestOutcome, ToolTypeInfo, ToolTypeTemplate,
    UpdateCategoryRequest, UpdateDocumentRequest, UpdateToolRequest, UserInfo,
};

/// HTTP client for the assistant REST API.
///
/// Cheap to clone; clones share the auth context and connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    auth: AuthContext,
}

impl ApiClient {
    /// Create a client against a base URL (e.g. `http://host/api/v1`).
    pub fn new(base_url: impl Into<String>, auth: AuthContext) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            auth,
        }
    }

    /// Create a client reusing an existing reqwest client.
    pub fn with_client(base_url: impl Into<String>, client: Client, auth: AuthContext) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// The underlying reqwest client, for sharing with the streaming
    /// transport.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth.access_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request, retrying once through the refresh path on 401.
    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        // The un-authed clone is kept for the retry so it picks up the
        // refreshed token
        let retry = builder.try_clone();
        let response = self.bearer(builder).send().await?;
        if response.status().as_u16() != 401 {
            return Ok(response);
        }
        let Some(retry) = retry else {
            return Ok(response);
        };
        debug!("got 401, attempting token refresh");
        self.refresh_session().await?;
        Ok(self.bearer(retry).send().await?)
    }

    /// Unwrap the response envelope into its data payload.
    async fn unwrap_data<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let ok = (200..300).contains(&status);
        let text = response.text().await?;

        let envelope: ApiEnvelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if ok => return Err(ApiError::Json(e)),
            Err(_) => {
                return Err(ApiError::Server {
                    status,
                    error_code: None,
                    message: text,
                })
            }
        };

        if !ok || !envelope.success {
            return Err(ApiError::Server {
                status,
                error_code: envelope.error_code,
                message: envelope.message.unwrap_or_default(),
            });
        }
        envelope.data.ok_or_else(|| ApiError::MissingData {
            endpoint: endpoint.to_string(),
        })
    }

    /// Like [`Self::unwrap_data`] for endpoints whose success envelope
    /// carries no payload.
    async fn unwrap_unit(&self, response: reqwest::Response) -> Result<(), ApiError> {
        let status = response.status().as_u16();
        let ok = (200..300).contains(&status);
        let text = response.text().await?;

        if let Ok(envelope) = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text) {
            if !ok || !envelope.success {
                return Err(ApiError::Server {
                    status,
                    error_code: envelope.error_code,
                    message: envelope.message.unwrap_or_default(),
                });
            }
            return Ok(());
        }
        if ok {
            Ok(())
        } else {
            Err(ApiError::Server {
                status,
                error_code: None,
                message: text,
            })
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path))).await?;
        self.unwrap_data(response, path).await
    }

    async fn request_data<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let builder = self.client.request(method, self.url(path)).json(body);
        let response = self.send(builder).await?;
        self.unwrap_data(response, path).await
    }

    async fn request_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        self.unwrap_unit(response).await
    }

    // --- Auth ---

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure here is terminal for the session: the stored
    /// credentials are cleared so the UI falls back to the login flow.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        let refresh_token = match self.auth.refresh_token() {
            Some(token) => token,
            None => {
                self.auth.clear();
                return Err(ApiError::SessionExpired("no refresh token".to_string()));
            }
        };

        let result: Result<RefreshResponse, ApiError> = async {
            let response = self
                .client
                .post(self.url("/auth/refresh"))
                .json(&RefreshRequest { refresh_token })
                .send()
                .await?;
            self.unwrap_data(response, "/auth/refresh").await
        }
        .await;

        match result {
            Ok(refreshed) => {
                self.auth.set_tokens(
                    refreshed.access_token,
                    refreshed.refresh_token,
                    refreshed.expires_in,
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing session");
                self.auth.clear();
                Err(ApiError::SessionExpired(e.to_string()))
            }
        }
    }

    /// Log in and store the returned token pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserInfo, ApiError> {
        let payload: LoginResponse = self
            .request_data(
                Method::POST,
                "/auth/login",
                &LoginRequest {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            )
            .await?;
        self.auth.set_tokens(
            payload.access_token,
            Some(payload.refresh_token),
            payload.expires_in,
        );
        self.auth.set_user(
            Some(payload.user.id.clone()),
            Some(payload.user.username.clone()),
        );
        Ok(payload.user)
    }

    /// Register a new account and store the returned token pair.
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserInfo, ApiError> {
        let payload: LoginResponse = self
            .request_data(Method::POST, "/auth/register", request)
            .await?;
        self.auth.set_tokens(
            payload.access_token,
            Some(payload.refresh_token),
            payload.expires_in,
        );
        self.auth.set_user(
            Some(payload.user.id.clone()),
            Some(payload.user.username.clone()),
        );
        Ok(payload.user)
    }

    /// Log out. Local credentials are cleared even when the server
    /// call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .request_unit::<serde_json::Value>(Method::POST, "/auth/logout", None)
            .await;
        self.auth.clear();
        result
    }

    /// Fetch the authenticated user's profile.
    pub async fn profile(&self) -> Result<UserInfo, ApiError> {
        self.get_data("/auth/profile").await
    }

    // --- Conversations ---

    pub async fn list_conversations(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<Conversation>, ApiError> {
        self.get_data(&format!("/conversations?page={}&pageSize={}", page, page_size))
            .await
    }

    /// Create a conversation. The server may return an existing empty
    /// conversation instead of a new one.
    pub async fn create_conversation(
        &self,
        title: Option<&str>,
    ) -> Result<Conversation, ApiError> {
        self.request_data(
            Method::POST,
            "/conversations",
            &CreateConversationRequest {
                title: title.map(String::from),
            },
        )
        .await
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation, ApiError> {
        self.get_data(&format!("/conversations/{}", conversation_id))
            .await
    }

    pub async fn rename_conversation(
        &self,
        conversation_id: &str,
        title: &str,
    ) -> Result<Conversation, ApiError> {
        self.request_data(
            Method::PUT,
            &format!("/conversations/{}", conversation_id),
            &RenameConversationRequest {
                title: title.to_string(),
            },
        )
        .await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::DELETE,
            &format!("/conversations/{}", conversation_id),
            None,
        )
        .await
    }

    // --- Messages ---

    pub async fn list_messages(
        &self,
        conversation_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Paginated<Message>, ApiError> {
        self.get_data(&format!(
            "/conversations/{}/messages?page={}&pageSize={}",
            conversation_id, page, page_size
        ))
        .await
    }

    /// Persist a user message. The returned message carries the id the
    /// streaming endpoint needs as `userMessageId`.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<Message, ApiError> {
        self.request_data(
            Method::POST,
            &format!("/conversations/{}/messages", conversation_id),
            &SendMessageRequest {
                content: content.to_string(),
                metadata: None,
            },
        )
        .await
    }

    pub async fn get_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Message, ApiError> {
        self.get_data(&format!(
            "/conversations/{}/messages/{}",
            conversation_id, message_id
        ))
        .await
    }

    /// Ask the server to regenerate an assistant message.
    pub async fn regenerate_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Message, ApiError> {
        self.request_data(
            Method::POST,
            &format!(
                "/conversations/{}/messages/{}/regenerate",
                conversation_id, message_id
            ),
            &json!({}),
        )
        .await
    }

    // --- Knowledge base ---

    /// Fetch the category tree.
    pub async fn knowledge_categories(&self) -> Result<Vec<KnowledgeCategory>, ApiError> {
        self.get_data("/knowledge/categories").await
    }

    pub async fn create_category(
        &self,
        request: &CreateCategoryRequest,
    ) -> Result<KnowledgeCategory, ApiError> {
        self.request_data(Method::POST, "/knowledge/categories", request)
            .await
    }

    pub async fn update_category(
        &self,
        category_id: &str,
        request: &UpdateCategoryRequest,
    ) -> Result<KnowledgeCategory, ApiError> {
        self.request_data(
            Method::PUT,
            &format!("/knowledge/categories/{}", category_id),
            request,
        )
        .await
    }

    pub async fn delete_category(&self, category_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::DELETE,
            &format!("/knowledge/categories/{}", category_id),
            None,
        )
        .await
    }

    pub async fn search_documents(
        &self,
        search: &DocumentSearch,
    ) -> Result<Paginated<KnowledgeDocument>, ApiError> {
        self.get_data(&format!("/knowledge/documents?{}", search.to_query()))
            .await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<KnowledgeDocument, ApiError> {
        self.get_data(&format!("/knowledge/documents/{}", document_id))
            .await
    }

    pub async fn create_document(
        &self,
        request: &CreateDocumentRequest,
    ) -> Result<KnowledgeDocument, ApiError> {
        self.request_data(Method::POST, "/knowledge/documents", request)
            .await
    }

    pub async fn update_document(
        &self,
        document_id: &str,
        request: &UpdateDocumentRequest,
    ) -> Result<KnowledgeDocument, ApiError> {
        self.request_data(
            Method::PUT,
            &format!("/knowledge/documents/{}", document_id),
            request,
        )
        .await
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::DELETE,
            &format!("/knowledge/documents/{}", document_id),
            None,
        )
        .await
    }

    pub async fn publish_document(&self, document_id: &str) -> Result<KnowledgeDocument, ApiError> {
        self.request_data(
            Method::POST,
            &format!("/knowledge/documents/{}/publish", document_id),
            &json!({}),
        )
        .await
    }

    pub async fn archive_document(&self, document_id: &str) -> Result<KnowledgeDocument, ApiError> {
        self.request_data(
            Method::POST,
            &format!("/knowledge/documents/{}/archive", document_id),
            &json!({}),
        )
        .await
    }

    pub async fn like_document(&self, document_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::POST,
            &format!("/knowledge/documents/{}/like", document_id),
            None,
        )
        .await
    }

    pub async fn unlike_document(&self, document_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::DELETE,
            &format!("/knowledge/documents/{}/like", document_id),
            None,
        )
        .await
    }

    /// Record a document view.
    pub async fn view_document(&self, document_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::POST,
            &format!("/knowledge/documents/{}/view", document_id),
            None,
        )
        .await
    }

    /// Bulk-import documents from an uploaded file.
    pub async fn import_documents(
        &self,
        category_id: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<ImportResult, ApiError> {
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(content).file_name(file_name.to_string()),
            )
            .text("categoryId", category_id.to_string());
        // Multipart bodies cannot be cloned, so no 401 retry here
        let response = self
            .bearer(self.client.post(self.url("/knowledge/documents/import")))
            .multipart(form)
            .send()
            .await?;
        self.unwrap_data(response, "/knowledge/documents/import")
            .await
    }

    /// Export documents as a file download; returns the raw bytes.
    pub async fn export_documents(&self, document_ids: &[String]) -> Result<Vec<u8>, ApiError> {
        let response = self
            .send(
                self.client
                    .post(self.url("/knowledge/documents/export"))
                    .json(&json!({ "documentIds": document_ids })),
            )
            .await?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let message = response.text().await.unwrap_or_default();
            return Err(ApiError::Server {
                status,
                error_code: None,
                message,
            });
        }
        Ok(response.bytes().await?.to_vec())
    }

    // --- Tools ---

    pub async fn list_tools(&self, page: u32, page_size: u32) -> Result<Paginated<Tool>, ApiError> {
        self.get_data(&format!("/tools?page={}&pageSize={}", page, page_size))
            .await
    }

    pub async fn get_tool(&self, tool_id: &str) -> Result<Tool, ApiError> {
        self.get_data(&format!("/tools/{}", tool_id)).await
    }

    pub async fn create_tool(&self, request: &CreateToolRequest) -> Result<Tool, ApiError> {
        self.request_data(Method::POST, "/tools", request).await
    }

    pub async fn update_tool(
        &self,
        tool_id: &str,
        request: &UpdateToolRequest,
    ) -> Result<Tool, ApiError> {
        self.request_data(Method::PUT, &format!("/tools/{}", tool_id), request)
            .await
    }

    pub async fn delete_tool(&self, tool_id: &str) -> Result<(), ApiError> {
        self.request_unit::<serde_json::Value>(
            Method::DELETE,
            &format!("/tools/{}", tool_id),
            None,
        )
        .await
    }

    pub async fn toggle_tool(&self, tool_id: &str, enabled: bool) -> Result<Tool, ApiError> {
        self.request_data(
            Method::PUT,
            &format!("/tools/{}/toggle", tool_id),
            &json!({ "enabled": enabled }),
        )
        .await
    }

    /// Test a candidate tool config without persisting it.
    pub async fn test_tool(&self, request: &TestToolRequest) -> Result<ToolTestOutcome, ApiError> {
        self.request_data(Method::POST, "/tools/test", request).await
    }

    pub async fn execute_tool(
        &self,
        tool_id: &str,
        input_params: serde_json::Value,
        message_id: Option<&str>,
    ) -> Result<ToolExecution, ApiError> {
        self.request_data(
            Method::POST,
            "/tools/execute",
            &json!({
                "toolId": tool_id,
                "inputParams": input_params,
                "messageId": message_id,
            }),
        )
        .await
    }

    pub async fn tool_types(&self) -> Result<Vec<ToolTypeInfo>, ApiError> {
        self.get_data("/tools/types").await
    }

    pub async fn tool_template(&self, tool_type: &str) -> Result<ToolTypeTemplate, ApiError> {
        self.get_data(&format!("/tools/types/{}/template", tool_type))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://host/api/v1", AuthContext::in_memory());
        assert_eq!(client.url("/conversations"), "http://host/api/v1/conversations");
    }

    #[test]
    fn test_client_clones_share_auth() {
        let client = ApiClient::new("http://host", AuthContext::in_memory());
        let clone = client.clone();
        client
            .auth()
            .set_tokens("token".to_string(), None, Some(60));
        assert_eq!(clone.auth().access_token(), Some("token".to_string()));
    }
}

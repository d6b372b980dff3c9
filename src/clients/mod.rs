// Outbound HTTP clients for external collaborators

pub mod auth_client;
pub mod linkedin_client;
pub mod llm_client;

pub use auth_client::{AuthClient, AuthError, AuthUser};
pub use linkedin_client::{LinkedInClient, LinkedInError, LinkedInProfile, UgcShare};
pub use llm_client::{ChatCompletion, ChatMessage, LlmClient, LlmError};

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;

    /// Serve `app` on an ephemeral local port and return its base URL.
    pub async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

// LinkedIn REST API client (OAuth, profile lookup, UGC shares, image uploads)

use std::time::Duration;

use serde::{Deserialize, Serialize};

const LINKEDIN_TIMEOUT_SECS: u64 = 30;

/// Media uploads can be slow for large images
const MEDIA_TIMEOUT_SECS: u64 = 120;

const RESTLI_PROTOCOL_HEADER: &str = "X-Restli-Protocol-Version";
const RESTLI_PROTOCOL_VERSION: &str = "2.0.0";

const FEEDSHARE_IMAGE_RECIPE: &str = "urn:li:digitalmediaRecipe:feedshare-image";
const UPLOAD_MECHANISM_KEY: &str = "com.linkedin.digitalmedia.uploading.MediaUploadHttpRequest";

#[derive(Debug, thiserror::Error)]
pub enum LinkedInError {
    #[error("LinkedIn OAuth not configured")]
    NotConfigured,
    #[error("LinkedIn request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("LinkedIn returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("Unexpected LinkedIn response: {0}")]
    Malformed(String),
}

// ============================================
// Response types
// ============================================

#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// OpenID Connect `userinfo` payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub sub: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub headline: String,
    pub industry: String,
    pub location: String,
}

impl LinkedInProfile {
    /// Merge `userinfo` with the optional legacy `/v2/me` projection.
    pub fn combine(info: UserInfo, me: Option<&serde_json::Value>) -> Self {
        let me_str = |field: &str| {
            me.and_then(|m| m.get(field))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        let first_name = info.given_name.unwrap_or_default();
        let last_name = info.family_name.unwrap_or_default();
        let name = info
            .name
            .unwrap_or_else(|| format!("{} {}", first_name, last_name).trim().to_string());
        let id = if info.sub.is_empty() {
            me_str("id")
        } else {
            info.sub
        };
        let location = me
            .and_then(|m| m.pointer("/location/name"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Self {
            id,
            first_name,
            last_name,
            name,
            email: info.email.unwrap_or_default(),
            profile_picture: info.picture.unwrap_or_default(),
            headline: me_str("headline"),
            industry: me_str("industry"),
            location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredUpload {
    pub upload_url: String,
    pub asset: String,
}

// ============================================
// UGC share payload
// ============================================

pub fn person_urn(linkedin_id: &str) -> String {
    format!("urn:li:person:{}", linkedin_id)
}

#[derive(Debug, Clone, Serialize)]
struct TextValue {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct ShareMedia {
    status: &'static str,
    description: TextValue,
    media: String,
    title: TextValue,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShareContent {
    share_commentary: TextValue,
    share_media_category: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    media: Vec<ShareMedia>,
}

#[derive(Debug, Clone, Serialize)]
struct SpecificContent {
    #[serde(rename = "com.linkedin.ugc.ShareContent")]
    share_content: ShareContent,
}

#[derive(Debug, Clone, Serialize)]
struct Visibility {
    #[serde(rename = "com.linkedin.ugc.MemberNetworkVisibility")]
    member_network: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UgcShare {
    author: String,
    lifecycle_state: &'static str,
    specific_content: SpecificContent,
    visibility: Visibility,
}

impl UgcShare {
    /// Public, immediately published text share
    pub fn text(linkedin_id: &str, text: impl Into<String>) -> Self {
        Self {
            author: person_urn(linkedin_id),
            lifecycle_state: "PUBLISHED",
            specific_content: SpecificContent {
                share_content: ShareContent {
                    share_commentary: TextValue { text: text.into() },
                    share_media_category: "NONE",
                    media: Vec::new(),
                },
            },
            visibility: Visibility {
                member_network: "PUBLIC",
            },
        }
    }

    pub fn with_image(mut self, asset: impl Into<String>) -> Self {
        let content = &mut self.specific_content.share_content;
        content.share_media_category = "IMAGE";
        content.media = vec![ShareMedia {
            status: "READY",
            description: TextValue {
                text: "Post media".to_string(),
            },
            media: asset.into(),
            title: TextValue {
                text: "Post media".to_string(),
            },
        }];
        self
    }
}

// ============================================
// Client
// ============================================

#[derive(Clone)]
pub struct LinkedInClient {
    http: reqwest::Client,
    api_url: String,
    oauth_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl LinkedInClient {
    pub fn new(
        api_url: impl Into<String>,
        oauth_url: impl Into<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<Self, LinkedInError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LINKEDIN_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            oauth_url: oauth_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.filter(|s| !s.is_empty()),
            client_secret: client_secret.filter(|s| !s.is_empty()),
        })
    }

    pub fn oauth_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Exchange an OAuth authorization code for an access token
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AccessToken, LinkedInError> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(LinkedInError::NotConfigured);
        };

        let response = self
            .http
            .post(format!("{}/accessToken", self.oauth_url))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    pub async fn userinfo(&self, access_token: &str) -> Result<UserInfo, LinkedInError> {
        let response = self
            .http
            .get(format!("{}/v2/userinfo", self.api_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    /// Legacy profile projection. Best effort: many apps lack the scope.
    pub async fn me(&self, access_token: &str) -> Option<serde_json::Value> {
        let response = self
            .http
            .get(format!("{}/v2/me", self.api_url))
            .bearer_auth(access_token)
            .header(RESTLI_PROTOCOL_HEADER, RESTLI_PROTOCOL_VERSION)
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            tracing::debug!("LinkedIn /v2/me unavailable: {}", response.status());
            return None;
        }
        response.json().await.ok()
    }

    pub async fn profile(&self, access_token: &str) -> Result<LinkedInProfile, LinkedInError> {
        let info = self.userinfo(access_token).await?;
        let me = self.me(access_token).await;
        Ok(LinkedInProfile::combine(info, me.as_ref()))
    }

    /// Register an image upload owned by `owner_urn`
    pub async fn register_image_upload(
        &self,
        access_token: &str,
        owner_urn: &str,
    ) -> Result<RegisteredUpload, LinkedInError> {
        let body = serde_json::json!({
            "registerUploadRequest": {
                "recipes": [FEEDSHARE_IMAGE_RECIPE],
                "owner": owner_urn,
                "serviceRelationships": [{
                    "relationshipType": "OWNER",
                    "identifier": "urn:li:userGeneratedContent"
                }]
            }
        });

        let response = self
            .http
            .post(format!("{}/v2/assets?action=registerUpload", self.api_url))
            .bearer_auth(access_token)
            .header(RESTLI_PROTOCOL_HEADER, RESTLI_PROTOCOL_VERSION)
            .json(&body)
            .send()
            .await?;

        let payload: serde_json::Value = ensure_success(response).await?.json().await?;
        parse_registered_upload(&payload)
    }

    /// Download media referenced by a post so it can be re-uploaded
    pub async fn fetch_media(&self, url: &str) -> Result<Vec<u8>, LinkedInError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(MEDIA_TIMEOUT_SECS))
            .send()
            .await?;
        let bytes = ensure_success(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub async fn upload_media(
        &self,
        access_token: &str,
        upload_url: &str,
        bytes: Vec<u8>,
    ) -> Result<(), LinkedInError> {
        let response = self
            .http
            .post(upload_url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(Duration::from_secs(MEDIA_TIMEOUT_SECS))
            .body(bytes)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Publish a UGC share, returning the created post URN
    pub async fn create_share(
        &self,
        access_token: &str,
        share: &UgcShare,
    ) -> Result<String, LinkedInError> {
        let response = self
            .http
            .post(format!("{}/v2/ugcPosts", self.api_url))
            .bearer_auth(access_token)
            .header(RESTLI_PROTOCOL_HEADER, RESTLI_PROTOCOL_VERSION)
            .json(share)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let header_id = response
            .headers()
            .get("x-restli-id")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);

        let body: serde_json::Value = response.json().await.unwrap_or_default();
        body.get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or(header_id)
            .ok_or_else(|| LinkedInError::Malformed("share created without an id".to_string()))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, LinkedInError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(LinkedInError::Api {
        status: status.as_u16(),
        body,
    })
}

fn parse_registered_upload(payload: &serde_json::Value) -> Result<RegisteredUpload, LinkedInError> {
    let value = payload
        .get("value")
        .ok_or_else(|| LinkedInError::Malformed("registerUpload without value".to_string()))?;

    let upload_url = value
        .get("uploadMechanism")
        .and_then(|m| m.get(UPLOAD_MECHANISM_KEY))
        .and_then(|m| m.get("uploadUrl"))
        .and_then(|u| u.as_str())
        .ok_or_else(|| LinkedInError::Malformed("registerUpload without uploadUrl".to_string()))?;

    let asset = value
        .get("asset")
        .and_then(|a| a.as_str())
        .ok_or_else(|| LinkedInError::Malformed("registerUpload without asset".to_string()))?;

    Ok(RegisteredUpload {
        upload_url: upload_url.to_string(),
        asset: asset.to_string(),
    })
}

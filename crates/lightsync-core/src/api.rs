//! Gateway REST client
//!
//! Thin typed wrapper over the gateway's JSON API. Every non-2xx response
//! carries `{"error": "..."}` and is surfaced as [`ApiError::Api`] with that
//! message verbatim.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::models::{
    BridgeInfo, BridgeStatus, BridgeTestResult, DeviceCommand, GatewayConfig, Group, Health,
    ImportMode, ImportResult, Light, Mapping, MappingUpdate, MappingsBackup, NewMapping,
    PairResult, Scene,
};

/// The subset of the gateway API the device store depends on
#[async_trait]
pub trait LightingApi: Send + Sync + 'static {
    async fn get_devices(&self) -> ApiResult<Vec<Light>>;
    async fn get_groups(&self) -> ApiResult<Vec<Group>>;
    async fn get_scenes(&self) -> ApiResult<Vec<Scene>>;
    async fn set_device(&self, id: &str, command: &DeviceCommand) -> ApiResult<()>;
    async fn set_group(&self, id: &str, command: &DeviceCommand) -> ApiResult<()>;
    async fn activate_scene(&self, id: &str) -> ApiResult<()>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
struct DevicesBody {
    #[serde(default)]
    devices: Option<Vec<Light>>,
}

#[derive(Deserialize)]
struct GroupsBody {
    #[serde(default)]
    groups: Option<Vec<Group>>,
}

#[derive(Deserialize)]
struct ScenesBody {
    #[serde(default)]
    scenes: Option<Vec<Scene>>,
}

#[derive(Deserialize)]
struct MappingsBody {
    #[serde(default)]
    mappings: Option<Vec<Mapping>>,
}

#[derive(Deserialize)]
struct BridgesBody {
    #[serde(default)]
    bridges: Option<Vec<BridgeInfo>>,
}

#[derive(Serialize)]
struct BridgeAddress<'a> {
    bridge_ip: &'a str,
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    mode: ImportMode,
    backup: &'a MappingsBackup,
}

/// HTTP client for the gateway
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    /// Build a client from configuration
    pub fn new(config: Config) -> ApiResult<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            "lightsync/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::Transport)?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Endpoint URL under the API base; each segment is percent-encoded
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let base = self.config.api_url("");
        let mut url =
            Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(base.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        let url = self.url(segments)?;
        debug!("{} {}", method, url);
        Ok(self
            .client
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json"))
    }

    /// Send a request and decode the JSON body, mapping non-2xx to `ApiError::Api`
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = check_status(request.send().await?).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Send a request whose success body we don't care about
    async fn send_unit(&self, request: RequestBuilder) -> ApiResult<()> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    // ==================== Bridge ====================

    pub async fn bridge_status(&self) -> ApiResult<BridgeStatus> {
        self.send_json(self.request(Method::GET, &["bridge"])?).await
    }

    /// Discover bridges on the gateway's network; an empty list is normal
    pub async fn discover_bridges(&self) -> ApiResult<Vec<BridgeInfo>> {
        let body: BridgesBody = self
            .send_json(self.request(Method::GET, &["bridge", "discover"])?)
            .await?;
        Ok(body.bridges.unwrap_or_default())
    }

    pub async fn pair_bridge(&self, bridge_ip: &str) -> ApiResult<PairResult> {
        let request = self
            .request(Method::POST, &["bridge", "pair"])?
            .json(&BridgeAddress { bridge_ip });
        self.send_json(request).await
    }

    /// DNS, TCP 80/443 and HTTPS reachability checks run by the gateway
    pub async fn test_bridge(&self, bridge_ip: &str) -> ApiResult<BridgeTestResult> {
        let request = self
            .request(Method::POST, &["bridge", "test"])?
            .json(&BridgeAddress { bridge_ip });
        self.send_json(request).await
    }

    // ==================== Devices ====================

    pub async fn get_device(&self, id: &str) -> ApiResult<Light> {
        self.send_json(self.request(Method::GET, &["devices", id])?).await
    }

    pub async fn get_group(&self, id: &str) -> ApiResult<Group> {
        self.send_json(self.request(Method::GET, &["groups", id])?).await
    }

    // ==================== Mappings ====================

    pub async fn get_mappings(&self) -> ApiResult<Vec<Mapping>> {
        let body: MappingsBody = self.send_json(self.request(Method::GET, &["mappings"])?).await?;
        Ok(body.mappings.unwrap_or_default())
    }

    pub async fn create_mapping(&self, mapping: &NewMapping) -> ApiResult<Mapping> {
        let request = self.request(Method::POST, &["mappings"])?.json(mapping);
        self.send_json(request).await
    }

    pub async fn update_mapping(&self, id: &str, update: &MappingUpdate) -> ApiResult<Mapping> {
        let request = self.request(Method::PUT, &["mappings", id])?.json(update);
        self.send_json(request).await
    }

    pub async fn delete_mapping(&self, id: &str) -> ApiResult<()> {
        self.send_unit(self.request(Method::DELETE, &["mappings", id])?).await
    }

    pub async fn export_mappings(&self) -> ApiResult<MappingsBackup> {
        self.send_json(self.request(Method::GET, &["mappings", "export"])?).await
    }

    pub async fn import_mappings(
        &self,
        backup: &MappingsBackup,
        mode: ImportMode,
    ) -> ApiResult<ImportResult> {
        let request = self
            .request(Method::POST, &["mappings", "import"])?
            .json(&ImportRequest { mode, backup });
        self.send_json(request).await
    }

    // ==================== Diagnostics ====================

    pub async fn gateway_config(&self) -> ApiResult<GatewayConfig> {
        self.send_json(self.request(Method::GET, &["config"])?).await
    }

    pub async fn health(&self) -> ApiResult<Health> {
        self.send_json(self.request(Method::GET, &["health"])?).await
    }
}

#[async_trait]
impl LightingApi for ApiClient {
    async fn get_devices(&self) -> ApiResult<Vec<Light>> {
        let body: DevicesBody = self.send_json(self.request(Method::GET, &["devices"])?).await?;
        Ok(body.devices.unwrap_or_default())
    }

    async fn get_groups(&self) -> ApiResult<Vec<Group>> {
        let body: GroupsBody = self.send_json(self.request(Method::GET, &["groups"])?).await?;
        Ok(body.groups.unwrap_or_default())
    }

    async fn get_scenes(&self) -> ApiResult<Vec<Scene>> {
        let body: ScenesBody = self.send_json(self.request(Method::GET, &["scenes"])?).await?;
        Ok(body.scenes.unwrap_or_default())
    }

    async fn set_device(&self, id: &str, command: &DeviceCommand) -> ApiResult<()> {
        let request = self.request(Method::PUT, &["devices", id])?.json(command);
        self.send_unit(request).await
    }

    async fn set_group(&self, id: &str, command: &DeviceCommand) -> ApiResult<()> {
        let request = self.request(Method::PUT, &["groups", id])?.json(command);
        self.send_unit(request).await
    }

    async fn activate_scene(&self, id: &str) -> ApiResult<()> {
        let request = self
            .request(Method::POST, &["scenes", id, "activate"])?
            .json(&json!({}));
        self.send_unit(request).await
    }
}

/// Pass 2xx responses through, turn everything else into `ApiError::Api`
async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let fallback = status
        .canonical_reason()
        .unwrap_or("API request failed")
        .to_string();
    let bytes = response.bytes().await.unwrap_or_default();

    Err(ApiError::Api {
        status: status.as_u16(),
        message: error_message(&bytes, &fallback),
    })
}

/// Pull the `error` field out of an error body, or fall back to the status text
fn error_message(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

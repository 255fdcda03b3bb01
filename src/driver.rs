//! Docker volume-plugin wire protocol: the `VolumeDriver` seam and the
//! axum router that speaks plugin-v1 JSON over the unix socket.

use std::{collections::HashMap, path::PathBuf};

use axum::Router;
use serde::{Deserialize, Serialize};

#[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
#[derive(Serialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
#[allow(unused)]
pub enum Scope {
    Local,
    Global,
}

/// Options map of a `/VolumeDriver.Create` request.
pub type CreateOpts = HashMap<String, String>;

#[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<PathBuf>,
}

#[cfg_attr(test, derive(Debug, Clone))]
pub struct VolumeState<S> {
    pub mountpoint: Option<PathBuf>,
    pub status: S,
}

#[async_trait::async_trait]
pub trait VolumeDriver: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;
    type Status: Serialize + Send + Sync + 'static;

    async fn implements(&self) -> Vec<String> {
        vec!["VolumeDriver".to_string()]
    }

    async fn capabilities(&self) -> Scope;
    async fn path(&self, name: &str) -> Result<Option<PathBuf>, Self::Error>;
    async fn get(&self, name: &str) -> Result<VolumeState<Self::Status>, Self::Error>;
    async fn list(&self) -> Result<Vec<VolumeSummary>, Self::Error>;
    async fn create(&self, name: &str, opts: Option<CreateOpts>) -> Result<(), Self::Error>;
    async fn remove(&self, name: &str) -> Result<(), Self::Error>;
    async fn mount(&self, name: &str, id: &str) -> Result<PathBuf, Self::Error>;
    async fn unmount(&self, name: &str, id: &str) -> Result<(), Self::Error>;

    fn into_router(self) -> Router {
        router::build(self)
    }
}

mod router {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Request, State},
        http::{HeaderValue, header::CONTENT_TYPE},
        middleware::{self, Next},
        response::{IntoResponse, Response},
        routing::post,
    };
    use tracing::{debug, error};

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct ErrorBody {
        pub err: String,
    }

    impl IntoResponse for ErrorBody {
        fn into_response(self) -> Response {
            Json(self).into_response()
        }
    }

    fn fail(endpoint: &'static str, error: impl std::fmt::Display) -> ErrorBody {
        error!(endpoint, error = %error, "request failed");
        ErrorBody {
            err: error.to_string(),
        }
    }

    type Result<T> = std::result::Result<Json<T>, ErrorBody>;

    #[cfg_attr(test, derive(Debug, PartialEq, Serialize))]
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct NameRequest {
        pub name: String,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Serialize))]
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct AttachRequest {
        pub name: String,
        #[serde(rename = "ID")]
        pub id: String,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Serialize))]
    #[derive(Deserialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct CreateRequest {
        pub name: String,
        pub opts: Option<CreateOpts>,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize, Clone)]
    pub struct Empty {}

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct Implements {
        pub implements: Vec<String>,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct Capability {
        pub scope: Scope,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct CapabilitiesBody {
        pub capabilities: Capability,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct PathBody {
        #[serde(skip_serializing_if = "Option::is_none")]
        pub mountpoint: Option<PathBuf>,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct FullVolume<S> {
        pub name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub mountpoint: Option<PathBuf>,
        pub status: S,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct VolumeBody<S> {
        pub volume: FullVolume<S>,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct ListBody {
        pub volumes: Vec<VolumeSummary>,
    }

    #[cfg_attr(test, derive(Debug, PartialEq, Deserialize))]
    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    pub struct MountpointBody {
        pub mountpoint: PathBuf,
    }

    async fn activate<D: VolumeDriver>(State(driver): State<D>) -> Json<Implements> {
        debug!("handling /Plugin.Activate");
        Json(Implements {
            implements: driver.implements().await,
        })
    }

    async fn capabilities<D: VolumeDriver>(State(driver): State<D>) -> Json<CapabilitiesBody> {
        debug!("handling /VolumeDriver.Capabilities");
        Json(CapabilitiesBody {
            capabilities: Capability {
                scope: driver.capabilities().await,
            },
        })
    }

    async fn path<D: VolumeDriver>(
        State(driver): State<D>,
        Json(NameRequest { name }): Json<NameRequest>,
    ) -> Result<PathBody> {
        debug!(volume = name, "handling /VolumeDriver.Path");
        driver
            .path(&name)
            .await
            .map(|mountpoint| Json(PathBody { mountpoint }))
            .map_err(|e| fail("/VolumeDriver.Path", e))
    }

    async fn get<D: VolumeDriver>(
        State(driver): State<D>,
        Json(NameRequest { name }): Json<NameRequest>,
    ) -> Result<VolumeBody<D::Status>> {
        debug!(volume = name, "handling /VolumeDriver.Get");
        driver
            .get(&name)
            .await
            .map(|VolumeState { mountpoint, status }| {
                Json(VolumeBody {
                    volume: FullVolume {
                        name,
                        mountpoint,
                        status,
                    },
                })
            })
            .map_err(|e| fail("/VolumeDriver.Get", e))
    }

    async fn list<D: VolumeDriver>(State(driver): State<D>) -> Result<ListBody> {
        debug!("handling /VolumeDriver.List");
        driver
            .list()
            .await
            .map(|volumes| Json(ListBody { volumes }))
            .map_err(|e| fail("/VolumeDriver.List", e))
    }

    async fn create<D: VolumeDriver>(
        State(driver): State<D>,
        Json(CreateRequest { name, opts }): Json<CreateRequest>,
    ) -> Result<Empty> {
        debug!(volume = name, ?opts, "handling /VolumeDriver.Create");
        driver
            .create(&name, opts)
            .await
            .map(|_| Json(Empty {}))
            .map_err(|e| fail("/VolumeDriver.Create", e))
    }

    async fn remove<D: VolumeDriver>(
        State(driver): State<D>,
        Json(NameRequest { name }): Json<NameRequest>,
    ) -> Result<Empty> {
        debug!(volume = name, "handling /VolumeDriver.Remove");
        driver
            .remove(&name)
            .await
            .map(|_| Json(Empty {}))
            .map_err(|e| fail("/VolumeDriver.Remove", e))
    }

    async fn mount<D: VolumeDriver>(
        State(driver): State<D>,
        Json(AttachRequest { name, id }): Json<AttachRequest>,
    ) -> Result<MountpointBody> {
        debug!(volume = name, id, "handling /VolumeDriver.Mount");
        driver
            .mount(&name, &id)
            .await
            .map(|mountpoint| Json(MountpointBody { mountpoint }))
            .map_err(|e| fail("/VolumeDriver.Mount", e))
    }

    async fn unmount<D: VolumeDriver>(
        State(driver): State<D>,
        Json(AttachRequest { name, id }): Json<AttachRequest>,
    ) -> Result<Empty> {
        debug!(volume = name, id, "handling /VolumeDriver.Unmount");
        driver
            .unmount(&name, &id)
            .await
            .map(|_| Json(Empty {}))
            .map_err(|e| fail("/VolumeDriver.Unmount", e))
    }

    pub fn build<D: VolumeDriver>(driver: D) -> Router {
        Router::new()
            .route("/Plugin.Activate", post(activate::<D>))
            .route("/VolumeDriver.Capabilities", post(capabilities::<D>))
            .route("/VolumeDriver.Path", post(path::<D>))
            .route("/VolumeDriver.Get", post(get::<D>))
            .route("/VolumeDriver.List", post(list::<D>))
            .route("/VolumeDriver.Create", post(create::<D>))
            .route("/VolumeDriver.Remove", post(remove::<D>))
            .route("/VolumeDriver.Mount", post(mount::<D>))
            .route("/VolumeDriver.Unmount", post(unmount::<D>))
            .layer(middleware::from_fn(plugin_headers))
            .with_state(driver)
    }

    /// Docker sends plugin requests without a JSON content type and expects
    /// the plugin-v1 media type back.
    async fn plugin_headers(mut request: Request, next: Next) -> Response {
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut response = next.run(request).await;
        response.headers_mut().append(
            CONTENT_TYPE,
            HeaderValue::from_static("application/vnd.docker.plugin.v1+json"),
        );
        response
    }
}

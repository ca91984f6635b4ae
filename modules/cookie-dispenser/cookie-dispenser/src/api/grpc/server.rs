//! gRPC server for `cookies.v1.CookieService`.
//!
//! Dispense and reset delegate to the domain [`Service`]. `SetConfig` hands the parsed
//! configuration to a [`ConfigSink`], which is the lifecycle coordinator in production.

use std::sync::Arc;

use async_trait::async_trait;
use tonic::{Request, Response, Status};

use cookie_dispenser_sdk::{
    CookieService, GetCookieRequest, GetCookieResponse, ResetCookiesRequest,
    ResetCookiesResponse, SetConfigRequest, SetConfigResponse,
};

use crate::config::CookieDispenserConfig;
use crate::domain::error::DomainError;
use crate::domain::{Service, Surface};
use crate::module::LifecycleError;

/// Receiver of configuration pushed over gRPC.
#[async_trait]
pub trait ConfigSink: Send + Sync {
    /// Apply `config` exactly as a host delivery would.
    ///
    /// # Errors
    /// Returns the lifecycle error raised while applying the configuration.
    async fn apply_config(&self, config: CookieDispenserConfig) -> Result<(), LifecycleError>;
}

/// gRPC service implementation that wraps the domain [`Service`].
#[derive(Clone)]
pub struct CookieServiceImpl {
    service: Arc<Service>,
    config_sink: Arc<dyn ConfigSink>,
}

impl CookieServiceImpl {
    #[must_use]
    pub fn new(service: Arc<Service>, config_sink: Arc<dyn ConfigSink>) -> Self {
        Self {
            service,
            config_sink,
        }
    }
}

fn domain_error_to_status(e: DomainError) -> Status {
    match e {
        DomainError::Exhausted => Status::resource_exhausted(e.to_string()),
        DomainError::Rejected { .. } => Status::aborted(e.to_string()),
        DomainError::Persistence(source) => {
            tracing::error!(error = %source, "failed to persist cookie receipt");
            Status::internal("failed to record cookie receipt")
        }
    }
}

fn lifecycle_error_to_status(e: &LifecycleError) -> Status {
    match e {
        LifecycleError::OutOfOrder { .. } => Status::failed_precondition(e.to_string()),
        LifecycleError::DependencyUnavailable(_) => Status::unavailable(e.to_string()),
        LifecycleError::Route(_) | LifecycleError::Persistence(_) => {
            tracing::error!(error = %e, "failed to apply configuration");
            Status::internal("failed to apply configuration")
        }
    }
}

#[async_trait]
impl CookieService for CookieServiceImpl {
    async fn get_cookie(
        &self,
        request: Request<GetCookieRequest>,
    ) -> Result<Response<GetCookieResponse>, Status> {
        let req = request.into_inner();
        let msg = self
            .service
            .consume(&req.name, Surface::Grpc)
            .await
            .map_err(domain_error_to_status)?;
        Ok(Response::new(GetCookieResponse { msg }))
    }

    async fn reset_cookies(
        &self,
        request: Request<ResetCookiesRequest>,
    ) -> Result<Response<ResetCookiesResponse>, Status> {
        let req = request.into_inner();
        let outcome = self.service.reset(req.cookies_left, Surface::Grpc);
        Ok(Response::new(ResetCookiesResponse {
            previous_cookies_left: outcome.previous,
            current_cookies_left: outcome.current,
        }))
    }

    async fn set_config(
        &self,
        request: Request<SetConfigRequest>,
    ) -> Result<Response<SetConfigResponse>, Status> {
        let req = request.into_inner();
        let config: CookieDispenserConfig = serde_json::from_str(&req.new_config_json)
            .map_err(|e| Status::invalid_argument(format!("invalid configuration: {e}")))?;

        self.config_sink
            .apply_config(config)
            .await
            .map_err(|e| lifecycle_error_to_status(&e))?;

        let updated_config_json = serde_json::to_string(&*self.service.state().config())
            .map_err(|e| Status::internal(format!("failed to serialize configuration: {e}")))?;
        Ok(Response::new(SetConfigResponse {
            updated_config_json,
        }))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::ModuleState;
    use crate::domain::metrics::CookieMetrics;
    use crate::domain::repo::ReceiptRepository;
    use crate::infra::InMemoryReceiptRepository;
    use crate::module::LifecyclePhase;
    use tonic::Code;

    struct NoMetrics;

    impl CookieMetrics for NoMetrics {
        fn record_requests(&self, _count: u64) {}
        fn set_cookies_left(&self, _value: u32) {}
    }

    /// Stores the config on the shared state, or refuses when `ready` is false.
    struct StateSink {
        state: Arc<ModuleState>,
        ready: bool,
    }

    #[async_trait]
    impl ConfigSink for StateSink {
        async fn apply_config(&self, config: CookieDispenserConfig) -> Result<(), LifecycleError> {
            if !self.ready {
                return Err(LifecycleError::OutOfOrder {
                    hook: "on_config",
                    expected: "Registered",
                    actual: LifecyclePhase::ServerStarted,
                });
            }
            self.state.set_config(Arc::new(config));
            Ok(())
        }
    }

    async fn server(quota: u32, ready: bool) -> CookieServiceImpl {
        let state = Arc::new(ModuleState::new());
        assert_eq!(state.set_quota(quota), 0);
        state.replace_blocked_names(vec!["Alex".to_owned()]);
        let repo = Arc::new(InMemoryReceiptRepository::new());
        repo.ensure_schema().await.unwrap();
        let service = Arc::new(Service::new(state.clone(), repo, Arc::new(NoMetrics)));
        CookieServiceImpl::new(service, Arc::new(StateSink { state, ready }))
    }

    fn get(name: &str) -> Request<GetCookieRequest> {
        Request::new(GetCookieRequest {
            name: name.to_owned(),
        })
    }

    #[tokio::test]
    async fn get_cookie_maps_outcomes_to_status_codes() {
        let svc = server(2, true).await;

        let ok = svc.get_cookie(get("Bob")).await.unwrap();
        assert_eq!(ok.into_inner().msg, "Hey there Bob, have a cookie.");

        let rejected = svc.get_cookie(get("Alex")).await.unwrap_err();
        assert_eq!(rejected.code(), Code::Aborted);

        let exhausted = svc.get_cookie(get("Carol")).await.unwrap_err();
        assert_eq!(exhausted.code(), Code::ResourceExhausted);
        assert_eq!(exhausted.message(), "We ran out of cookies!");
    }

    #[tokio::test]
    async fn reset_reports_previous_and_current() {
        let svc = server(4, true).await;
        let response = svc
            .reset_cookies(Request::new(ResetCookiesRequest {
                cookies_left: Some(11),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.previous_cookies_left, 4);
        assert_eq!(response.current_cookies_left, 11);
    }

    #[tokio::test]
    async fn set_config_returns_applied_config() {
        let svc = server(0, true).await;
        let response = svc
            .set_config(Request::new(SetConfigRequest {
                new_config_json: r#"{"default_quota": 3, "blocked_names": ["Zed"]}"#.to_owned(),
            }))
            .await
            .unwrap()
            .into_inner();

        let applied: CookieDispenserConfig =
            serde_json::from_str(&response.updated_config_json).unwrap();
        assert_eq!(applied.default_quota, 3);
        assert_eq!(applied.blocked_names, ["Zed"]);
        assert!(applied.active);
    }

    #[tokio::test]
    async fn set_config_rejects_bad_json_and_early_delivery() {
        let ready = server(0, true).await;
        let err = ready
            .set_config(Request::new(SetConfigRequest {
                new_config_json: "{not json".to_owned(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::InvalidArgument);

        let early = server(0, false).await;
        let err = early
            .set_config(Request::new(SetConfigRequest {
                new_config_json: "{}".to_owned(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::FailedPrecondition);
    }
}

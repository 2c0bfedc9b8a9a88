//! 多实例聚合
//!
//! 把同一个尾部检索请求并发发送给多个检索实例，汇总成功结果，
//! 单个实例失败或超时只记录在 `failures` 中，不影响其他实例。

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::retrieval::LogRetriever;
use crate::error::{ErrorResponse, Result, RetrievalError};
use crate::models::{RetrievalResponse, TailRequest};

/// 可被聚合的检索实例
#[async_trait]
pub trait RetrievalInstance: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: &TailRequest) -> Result<RetrievalResponse>;
}

/// 进程内实例，直接调用本地检索引擎
pub struct LocalInstance {
    name: String,
    retriever: Arc<LogRetriever>,
}

impl LocalInstance {
    pub fn new(name: impl Into<String>, retriever: Arc<LogRetriever>) -> Self {
        Self {
            name: name.into(),
            retriever,
        }
    }
}

#[async_trait]
impl RetrievalInstance for LocalInstance {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: &TailRequest) -> Result<RetrievalResponse> {
        let result = Arc::clone(&self.retriever)
            .retrieve_async(request.clone())
            .await?;
        Ok(RetrievalResponse::from(&result))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceResult {
    pub instance: String,
    pub response: RetrievalResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceFailure {
    pub instance: String,
    pub code: String,
    pub message: String,
}

/// 聚合结果，顺序与传入的实例顺序一致
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResponse {
    pub results: Vec<InstanceResult>,
    pub failures: Vec<InstanceFailure>,
}

impl AggregateResponse {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 并发请求所有实例，每个实例单独受 `timeout` 约束
pub async fn fan_out(
    instances: &[Arc<dyn RetrievalInstance>],
    request: &TailRequest,
    timeout: Duration,
) -> AggregateResponse {
    let calls = instances.iter().map(|instance| async move {
        let outcome = match tokio::time::timeout(timeout, instance.fetch(request)).await {
            Ok(result) => result,
            Err(_) => Err(RetrievalError::Timeout(format!(
                "instance {} did not answer within {} ms",
                instance.name(),
                timeout.as_millis()
            ))),
        };
        (instance.name().to_string(), outcome)
    });

    let mut aggregate = AggregateResponse::default();
    for (instance, outcome) in join_all(calls).await {
        match outcome {
            Ok(response) => aggregate.results.push(InstanceResult { instance, response }),
            Err(e) => {
                warn!(instance = %instance, code = e.code(), error = %e, "Instance failed");
                let ErrorResponse { code, message } = ErrorResponse::from(&e);
                aggregate.failures.push(InstanceFailure {
                    instance,
                    code,
                    message,
                });
            }
        }
    }

    info!(
        succeeded = aggregate.results.len(),
        failed = aggregate.failures.len(),
        "Fan-out completed"
    );
    aggregate
}

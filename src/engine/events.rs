// ==========================================
// 仓库移库作业引擎 - 引擎层事件发布
// ==========================================
// 职责: 定义作业事件发布 trait,实现依赖倒置
// 说明: Engine 层定义 trait,Repository 层(action_log)实现审计适配
// 红线: 事件在状态提交之后发布;发布失败不回滚已提交的状态
// ==========================================

use crate::domain::{ActionType, RequestContext};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 作业事件
// ==========================================

/// 作业事件
///
/// 每次状态变更提交后发布一次,携带操作人/终端以便审计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// 操作类型
    pub action: ActionType,
    /// 主体 ID(托盘 ID / 移库单 ID / 订单行 ID / 调整 ID)
    pub subject_id: String,
    /// 操作人
    pub actor: String,
    /// 终端设备
    pub device_id: Option<String>,
    /// 请求 ID
    pub request_id: String,
    /// 附加参数
    pub payload: Option<JsonValue>,
    /// 描述
    pub detail: Option<String>,
}

impl WorkflowEvent {
    pub fn new(action: ActionType, subject_id: impl Into<String>, ctx: &RequestContext) -> Self {
        Self {
            action,
            subject_id: subject_id.into(),
            actor: ctx.operator_id.clone(),
            device_id: ctx.device_id.clone(),
            request_id: ctx.request_id.clone(),
            payload: None,
            detail: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// 主体类型(由操作类型推导)
    pub fn subject_type(&self) -> &'static str {
        match self.action {
            ActionType::PalletCreate
            | ActionType::PalletAddLine
            | ActionType::PalletRemoveLine
            | ActionType::PalletClose
            | ActionType::PalletReopen => "PALLET",
            ActionType::TransferCreate | ActionType::TransferComplete => "TRANSFER",
            ActionType::LineStart
            | ActionType::LineComplete
            | ActionType::LineBlock
            | ActionType::LineUnlock => "ORDER_LINE",
            ActionType::AdjustmentRecord | ActionType::AdjustmentReview => "STOCK_ADJUSTMENT",
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 作业事件发布者 Trait
///
/// # 实现说明
/// - `ActionLogRepository` 实现此 trait,将事件写入 action_log
pub trait WorkflowEventPublisher: Send + Sync {
    /// 发布作业事件
    ///
    /// # 返回
    /// - `Ok(id)`: 落库记录 ID(如果支持)或空字符串
    fn publish(&self, event: WorkflowEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl WorkflowEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: WorkflowEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - action={}, subject_id={}",
            event.action,
            event.subject_id
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn WorkflowEventPublisher>> 的使用;发布失败只记日志
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn WorkflowEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn WorkflowEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件(如果有发布者)
    pub fn publish(&self, event: WorkflowEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者,跳过事件 - action={}, subject_id={}",
                event.action,
                event.subject_id
            );
            return;
        };
        let action = event.action;
        let subject_id = event.subject_id.clone();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                action = %action,
                subject_id = %subject_id,
                error = %e,
                "作业事件发布失败(状态已提交)"
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingPublisher {
        events: Mutex<Vec<WorkflowEvent>>,
    }

    impl WorkflowEventPublisher for RecordingPublisher {
        fn publish(&self, event: WorkflowEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            self.events.lock().unwrap().push(event);
            Ok("E1".to_string())
        }
    }

    struct FailingPublisher;

    impl WorkflowEventPublisher for FailingPublisher {
        fn publish(&self, _event: WorkflowEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
            Err("disk full".into())
        }
    }

    #[test]
    fn test_event_carries_context() {
        let ctx = RequestContext::operator("op1").with_device("HH-07");
        let event = WorkflowEvent::new(ActionType::PalletClose, "P1", &ctx)
            .with_detail("origin A$01");

        assert_eq!(event.actor, "op1");
        assert_eq!(event.device_id.as_deref(), Some("HH-07"));
        assert_eq!(event.subject_type(), "PALLET");
        assert_eq!(event.request_id, ctx.request_id);
    }

    #[test]
    fn test_subject_type_by_action() {
        let ctx = RequestContext::operator("op1");
        assert_eq!(
            WorkflowEvent::new(ActionType::TransferComplete, "T1", &ctx).subject_type(),
            "TRANSFER"
        );
        assert_eq!(
            WorkflowEvent::new(ActionType::LineBlock, "L1", &ctx).subject_type(),
            "ORDER_LINE"
        );
    }

    #[test]
    fn test_optional_publisher_forwards() {
        let recorder = Arc::new(RecordingPublisher {
            events: Mutex::new(Vec::new()),
        });
        let publisher = OptionalEventPublisher::with_publisher(recorder.clone());
        assert!(publisher.is_configured());

        let ctx = RequestContext::operator("op1");
        publisher.publish(WorkflowEvent::new(ActionType::PalletCreate, "P1", &ctx));
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_optional_publisher_swallows_failure() {
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(FailingPublisher));
        let ctx = RequestContext::operator("op1");
        publisher.publish(WorkflowEvent::new(ActionType::PalletCreate, "P1", &ctx));

        let none = OptionalEventPublisher::none();
        assert!(!none.is_configured());
        none.publish(WorkflowEvent::new(ActionType::PalletCreate, "P1", &ctx));
    }
}

// ==========================================
// 仓库移库作业引擎 - 请求上下文
// ==========================================
// 红线: 不使用全局会话状态,每次引擎调用显式传入
// ==========================================

use crate::domain::types::OperatorRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 调用方当前期望的作业(用于校验加托盘行)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedWork {
    pub article: String,     // 物料编码
    pub lot: Option<String>, // 批次(None = 任意批次)
}

impl ExpectedWork {
    /// 判断物料/批次是否满足期望
    pub fn matches(&self, article: &str, lot: Option<&str>) -> bool {
        if !self.article.eq_ignore_ascii_case(article.trim()) {
            return false;
        }
        match (&self.lot, lot) {
            (None, _) => true,
            (Some(expected), Some(actual)) => expected.trim().eq_ignore_ascii_case(actual.trim()),
            (Some(_), None) => false,
        }
    }
}

/// 请求上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub operator_id: String,             // 操作员
    pub device_id: Option<String>,       // 终端设备
    pub role: OperatorRole,              // 角色
    pub request_id: String,              // 请求 ID(日志关联)
    pub expected_work: Vec<ExpectedWork>, // 期望作业(空 = 不校验)
}

impl RequestContext {
    /// 现场操作员上下文
    pub fn operator(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            device_id: None,
            role: OperatorRole::Operator,
            request_id: Uuid::new_v4().to_string(),
            expected_work: Vec::new(),
        }
    }

    /// 主管上下文
    pub fn supervisor(operator_id: impl Into<String>) -> Self {
        Self {
            role: OperatorRole::Supervisor,
            ..Self::operator(operator_id)
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_expected_work(mut self, expected: Vec<ExpectedWork>) -> Self {
        self.expected_work = expected;
        self
    }

    pub fn is_supervisor(&self) -> bool {
        self.role == OperatorRole::Supervisor
    }
}

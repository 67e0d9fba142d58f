// ==========================================
// 仓库移库作业引擎 - 盘点差异决策
// ==========================================
// 职责: 计划量 vs 实盘量 → 接受 / 升级审核 / 阻断(纯函数)
// 规则:
// - 相等(1e-9 内)            → Accept{0}
// - 短缺 ≤ 容差               → Accept{found - planned}(planned := found)
// - 短缺 > 容差               → Escalate(待主管审核,行可继续作业)
// - 盘盈(found > planned)     → Block{surplus}(与容差无关)
// ==========================================

use crate::config::ReconciliationTolerance;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

const QUANTITY_EPSILON: f64 = 1e-9;

/// 盘点决策
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconciliationDecision {
    Accept { adjustment: f64 },
    Escalate { shortfall: f64 },
    Block { surplus: f64 },
}

impl ReconciliationDecision {
    pub fn is_no_op(&self) -> bool {
        matches!(self, ReconciliationDecision::Accept { adjustment } if *adjustment == 0.0)
    }
}

pub fn decide(
    planned: f64,
    found: f64,
    tolerance: &ReconciliationTolerance,
) -> EngineResult<ReconciliationDecision> {
    validate_quantity("planned", planned)?;
    validate_quantity("found", found)?;

    if (found - planned).abs() <= QUANTITY_EPSILON {
        return Ok(ReconciliationDecision::Accept { adjustment: 0.0 });
    }
    if found > planned {
        return Ok(ReconciliationDecision::Block {
            surplus: found - planned,
        });
    }

    let shortfall = planned - found;
    if shortfall <= tolerance.allowance(planned) + QUANTITY_EPSILON {
        Ok(ReconciliationDecision::Accept {
            adjustment: found - planned,
        })
    } else {
        Ok(ReconciliationDecision::Escalate { shortfall })
    }
}

fn validate_quantity(name: &str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::InvalidQuantity(format!("{} = {}", name, value)));
    }
    Ok(())
}

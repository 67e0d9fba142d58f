// ==========================================
// 集成测试共享替身
// ==========================================
#![allow(dead_code)]

pub mod mock_config;
pub mod scripted_orders;

pub use mock_config::MockConfig;
pub use scripted_orders::ScriptedOrderStore;

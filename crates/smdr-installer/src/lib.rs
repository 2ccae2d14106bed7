//! SMDR 接收服务安装程序。
//!
//! 功能：
//! - 安装编排：有序步骤（execute / compensate），覆盖安装、卸载、升级、重新配置与重启
//! - 交互式参数采集（逐项校验、失败重新提示）
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

pub mod orchestrator;
pub mod prompt;
pub mod steps;

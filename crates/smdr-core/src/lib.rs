//! SMDR 接收服务安装核心库（跨平台/与具体操作系统无关）。
//!
//! 功能：
//! - 安装参数采集与校验（端口、日志路径、组件选择）
//! - 配置文件（`smdr_config.json`）的渲染与落盘
//! - 服务生命周期状态机（Absent → Stopped → Running）与后端抽象
//! - 防火墙入站规则同步与后端抽象
//! - 安装状态落盘模型（install-state.json）、安装结果与错误分类
//! - 统一路径与目录约定（ProgramFiles / ProgramData）
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

pub mod artifact;
pub mod config;
pub mod error;
pub mod firewall;
pub mod net;
pub mod paths;
pub mod result;
pub mod service;
pub mod settings;
pub mod state;

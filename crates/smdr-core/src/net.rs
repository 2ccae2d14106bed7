//! 端口占用检测。
//!
//! 作者：SMDR 接收服务项目组
//! 创建时间：2026-10-17
//! 修改时间：2026-10-17

use std::net::{Ipv4Addr, TcpListener};

/// 判断 TCP 端口当前是否可在所有网卡上绑定。
///
/// 说明：
/// - 通过短暂绑定一个监听套接字来判断，绑定成功后立即释放
/// - 结果仅代表检测瞬间的状态
pub fn port_is_available(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}

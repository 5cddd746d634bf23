use std::net::UdpSocket;

const LOOPBACK: &str = "127.0.0.1";

/// 获取本机IP地址，无法探测时回退到回环地址
pub fn local_ip() -> String {
    detect_local_ip().unwrap_or_else(|| LOOPBACK.to_string())
}

fn detect_local_ip() -> Option<String> {
    // UDP connect 不发送数据，只用于让内核选出出口地址
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let local_addr = socket.local_addr().ok()?;
    Some(local_addr.ip().to_string())
}

/// 获取主机名
pub fn local_hostname() -> String {
    hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_host_info_is_never_empty() {
        assert!(!local_ip().is_empty());
        assert!(!local_hostname().is_empty());
    }
}

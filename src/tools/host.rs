//! 主机名解析工具：只做 DNS 解析（不 ping），返回 {host, resolvable, ip, error}

use std::net::IpAddr;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::schema::{parse_args, schema_for_args};
use crate::tools::{Tool, ToolError, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct CheckHostArgs {
    /// Host name to resolve, e.g. "vpn.example.com"
    host: String,
}

/// 解析结果；解析失败不是工具错误，而是 resolvable=false 并附带 error
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostCheck {
    pub host: String,
    pub resolvable: bool,
    pub ip: Option<String>,
    pub error: Option<String>,
}

/// 用系统解析器解析主机名，优先返回 IPv4
pub async fn check_host(host: &str) -> HostCheck {
    let host = host.trim();
    let failed = |error: String| HostCheck {
        host: host.to_string(),
        resolvable: false,
        ip: None,
        error: Some(error),
    };
    if host.is_empty() {
        return failed("empty host name".to_string());
    }

    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            let ip = ips
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| ips.first())
                .map(|ip| ip.to_string());
            match ip {
                Some(ip) => HostCheck {
                    host: host.to_string(),
                    resolvable: true,
                    ip: Some(ip),
                    error: None,
                },
                None => failed("no address records".to_string()),
            }
        }
        Err(e) => failed(e.to_string()),
    }
}

pub struct CheckHostTool;

#[async_trait]
impl Tool for CheckHostTool {
    fn name(&self) -> &str {
        "check_host"
    }

    fn description(&self) -> &str {
        "Check whether a host name resolves through DNS (no ping). Returns {host, resolvable, ip, error}."
    }

    fn parameters_schema(&self) -> Value {
        schema_for_args::<CheckHostArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: CheckHostArgs = parse_args(args)?;
        let result = check_host(&args.host).await;
        serde_json::to_value(result)
            .map(ToolOutput::new)
            .map_err(|e| ToolError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_host_shape() {
        // 不校验具体 IP（取决于网络环境），只校验结构
        let out = CheckHostTool
            .execute(serde_json::json!({"host": "example.com"}))
            .await
            .unwrap();
        let obj = out.value.as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["error", "host", "ip", "resolvable"]);
        assert_eq!(obj["host"], "example.com");
    }

    #[tokio::test]
    async fn test_localhost_resolves() {
        let r = check_host("localhost").await;
        assert!(r.resolvable);
        assert!(r.ip.is_some());
        assert!(r.error.is_none());
    }

    #[tokio::test]
    async fn test_invalid_host_not_resolvable() {
        let r = check_host("no-such-host.invalid").await;
        assert!(!r.resolvable);
        assert!(r.ip.is_none());
        assert!(r.error.is_some());
    }

    #[tokio::test]
    async fn test_empty_host() {
        let r = check_host("  ").await;
        assert!(!r.resolvable);
        assert_eq!(r.error.as_deref(), Some("empty host name"));
    }
}

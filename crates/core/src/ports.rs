//! Port publishing.
//!
//! Parses `--publish/-p HOSTIP?:HOST:CONTAINER[/proto]` flags into a
//! normalized form and renders them back as `docker run --publish`
//! arguments, preserving the order they were given on the command line.

use crate::errors::{PacknplayError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSpec {
    pub host_ip: Option<String>,
    pub host_port: String,
    pub container_port: String,
    pub protocol: Option<String>,
}

impl PublishSpec {
    /// Renders the original `--publish` argument value.
    pub fn to_arg(&self) -> String {
        let mut s = String::new();
        if let Some(ip) = &self.host_ip {
            s.push_str(ip);
            s.push(':');
        }
        s.push_str(&self.host_port);
        s.push(':');
        s.push_str(&self.container_port);
        if let Some(proto) = &self.protocol {
            s.push('/');
            s.push_str(proto);
        }
        s
    }
}

/// Parses a single `-p`/`--publish` flag value.
///
/// Accepted forms: `HOST:CONTAINER`, `HOST:CONTAINER/proto`,
/// `HOSTIP:HOST:CONTAINER`, `HOSTIP:HOST:CONTAINER/proto`.
pub fn parse_publish(raw: &str) -> Result<PublishSpec> {
    let (port_part, protocol) = match raw.rsplit_once('/') {
        Some((p, proto)) => (p, Some(proto.to_string())),
        None => (raw, None),
    };

    let segments: Vec<&str> = port_part.split(':').collect();
    let (host_ip, host_port, container_port) = match segments.as_slice() {
        [host, container] => (None, host.to_string(), container.to_string()),
        [ip, host, container] => (Some(ip.to_string()), host.to_string(), container.to_string()),
        _ => {
            return Err(PacknplayError::runtime(format!(
                "invalid --publish value: {raw}"
            )))
        }
    };

    Ok(PublishSpec {
        host_ip,
        host_port,
        container_port,
        protocol,
    })
}

/// Parses every `--publish` flag value in order, preserving order.
pub fn parse_all(values: &[String]) -> Result<Vec<PublishSpec>> {
    values.iter().map(|v| parse_publish(v)).collect()
}

/// Normalizes a devcontainer `forwardPorts` entry (a bare port number or
/// `host:container` string) into a publish spec bound to all interfaces.
pub fn from_forward_port(raw: &serde_json::Value) -> Result<PublishSpec> {
    match raw {
        serde_json::Value::Number(n) => {
            let port = n.to_string();
            Ok(PublishSpec {
                host_ip: None,
                host_port: port.clone(),
                container_port: port,
                protocol: None,
            })
        }
        serde_json::Value::String(s) => parse_publish(s),
        other => Err(PacknplayError::runtime(format!(
            "invalid forwardPorts entry: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_three_publish_order_preserved() {
        let specs = parse_all(&[
            "8080:3000".to_string(),
            "127.0.0.1:9000:9001/tcp".to_string(),
        ])
        .unwrap();
        assert_eq!(specs[0].to_arg(), "8080:3000");
        assert_eq!(specs[1].to_arg(), "127.0.0.1:9000:9001/tcp");
    }

    #[test]
    fn rejects_malformed_value() {
        assert!(parse_publish("not-a-port-spec").is_err());
    }

    #[test]
    fn forward_port_number_maps_both_sides() {
        let spec = from_forward_port(&serde_json::json!(3000)).unwrap();
        assert_eq!(spec.host_port, "3000");
        assert_eq!(spec.container_port, "3000");
    }
}

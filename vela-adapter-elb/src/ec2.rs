//! aws-sdk-ec2 binding for the security-group surface

use async_trait::async_trait;
use aws_sdk_ec2::Client;
use aws_sdk_ec2::types::{IpPermission, UserIdGroupPair};

use vela_core::{AdapterError, AdapterResult};

use crate::api::Ec2Api;
use crate::rules::{GrantOperation, IngressRule, Protocol, SecurityGroup};

/// EC2-backed implementation of `Ec2Api`
pub struct AwsEc2Client {
    client: Client,
}

impl AwsEc2Client {
    /// Create a new client, loading AWS config for the given region
    pub async fn new(region: impl Into<String>) -> Self {
        let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_ec2::config::Region::new(region.into()))
            .load()
            .await;

        Self::with_client(Client::new(&aws_config))
    }

    /// Create a new AwsEc2Client with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Ec2Api for AwsEc2Client {
    async fn describe_security_groups(
        &self,
        ids: &[String],
    ) -> AdapterResult<Vec<SecurityGroup>> {
        let output = self
            .client
            .describe_security_groups()
            .set_group_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(output
            .security_groups()
            .iter()
            .map(convert_group)
            .collect())
    }

    async fn authorize_ingress(&self, grant: &GrantOperation) -> AdapterResult<()> {
        log::debug!(
            "granting {} {}-{} on {} to {}",
            grant.protocol.as_str(),
            grant.from_port,
            grant.to_port,
            grant.group_id,
            grant.peer
        );

        let permission = IpPermission::builder()
            .ip_protocol(grant.protocol.as_str())
            .from_port(i32::from(grant.from_port))
            .to_port(i32::from(grant.to_port))
            .user_id_group_pairs(
                UserIdGroupPair::builder().group_id(&grant.peer).build(),
            )
            .build();

        self.client
            .authorize_security_group_ingress()
            .group_id(&grant.group_id)
            .ip_permissions(permission)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(())
    }
}

fn convert_group(group: &aws_sdk_ec2::types::SecurityGroup) -> SecurityGroup {
    SecurityGroup {
        id: group.group_id().unwrap_or_default().to_string(),
        rules: group.ip_permissions().iter().map(convert_rule).collect(),
    }
}

fn convert_rule(permission: &IpPermission) -> IngressRule {
    IngressRule {
        protocol: Protocol::parse(permission.ip_protocol()),
        from_port: port_or(permission.from_port(), 0),
        to_port: port_or(permission.to_port(), u16::MAX),
        peers: permission
            .user_id_group_pairs()
            .iter()
            .filter_map(|pair| pair.group_id().map(str::to_string))
            .collect(),
    }
}

/// Provider ports arrive as optional i32; -1 or absent means "all traffic",
/// which must widen to the range end so an allow-all rule covers any port
fn port_or(value: Option<i32>, all: u16) -> u16 {
    match value {
        Some(v) if v >= 0 => v.min(i32::from(u16::MAX)) as u16,
        _ => all,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_or() {
        assert_eq!(port_or(Some(443), 0), 443);
        assert_eq!(port_or(Some(70000), 0), u16::MAX);
        assert_eq!(port_or(None, 0), 0);
        assert_eq!(port_or(None, u16::MAX), u16::MAX);
        assert_eq!(port_or(Some(-1), u16::MAX), u16::MAX);
    }

    /// An allow-all permission (no ports reported) converts to the full
    /// range, so it covers any requirement instead of collapsing to 0..0
    #[test]
    fn test_allow_all_permission_covers_any_port() {
        let permission = IpPermission::builder().ip_protocol("tcp").build();

        let rule = convert_rule(&permission);
        assert_eq!((rule.from_port, rule.to_port), (0, u16::MAX));
        assert!(rule.covers(Protocol::Tcp, 443));
        assert!(rule.covers(Protocol::Tcp, u16::MAX));
    }

    #[test]
    fn test_convert_rule() {
        let permission = IpPermission::builder()
            .ip_protocol("tcp")
            .from_port(443)
            .to_port(443)
            .user_id_group_pairs(UserIdGroupPair::builder().group_id("sg-lb1").build())
            .build();

        let rule = convert_rule(&permission);
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert_eq!((rule.from_port, rule.to_port), (443, 443));
        assert_eq!(rule.peers, vec!["sg-lb1"]);
    }
}

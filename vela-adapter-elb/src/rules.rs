//! Security-group rule matching and reconciliation
//!
//! Given what each backend instance must expose to the load balancer, compute
//! the minimal set of peer grants so that every required (protocol, port)
//! pair admits the front end's security groups. Grants are additive: rules
//! are widened with new peers, never created and never revoked here.

use vela_core::{AdapterError, AdapterResult};

/// Normalized rule protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Normalize a protocol string
    ///
    /// Only "udp" (any casing) maps to UDP; everything else, including
    /// "http", "https", "tcp", empty, and unset, maps to TCP. Operators
    /// declare listener protocols at the HTTP level and the underlying grant
    /// is TCP, so the wide default is the intended policy.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("udp") => Protocol::Udp,
            _ => Protocol::Tcp,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

/// What a backend instance must expose to the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortProtocolRequirement {
    pub protocol: Protocol,
    pub port: u16,
}

/// One ingress rule of a security group
#[derive(Debug, Clone, PartialEq)]
pub struct IngressRule {
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
    /// Security groups already granted access through this rule
    pub peers: Vec<String>,
}

impl IngressRule {
    /// Whether this rule's protocol and port range cover a requirement
    pub fn covers(&self, protocol: Protocol, port: u16) -> bool {
        self.protocol == protocol && self.from_port <= port && port <= self.to_port
    }

    pub fn has_peer(&self, peer: &str) -> bool {
        self.peers.iter().any(|p| p == peer)
    }
}

/// A security group and its ingress rules, as read from the provider
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroup {
    pub id: String,
    pub rules: Vec<IngressRule>,
}

/// One missing peer grant to issue against the provider
///
/// Carries the matched rule's own port range and protocol, not the raw
/// requirement, so the grant is port-for-port identical to the rule and any
/// wider range the operator configured is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantOperation {
    pub group_id: String,
    pub protocol: Protocol,
    pub from_port: u16,
    pub to_port: u16,
    pub peer: String,
}

/// Find the first ingress rule on a group covering (protocol, port)
pub fn find_matching_rule(
    group: &SecurityGroup,
    protocol: Protocol,
    port: u16,
) -> Option<&IngressRule> {
    group.rules.iter().find(|rule| rule.covers(protocol, port))
}

/// Compute the grants needed so every requirement admits the front end
///
/// For each requirement the first matching rule across the instance's groups
/// wins; scanning stops there. Peers already on that rule are skipped, so
/// re-running after the grants are applied produces nothing. A requirement
/// with no matching rule on any group is an error: this design widens peer
/// access on existing rules, it does not create rules.
pub fn plan_grants(
    instance_name: &str,
    groups: &[SecurityGroup],
    requirements: &[PortProtocolRequirement],
    front_end_peers: &[String],
) -> AdapterResult<Vec<GrantOperation>> {
    let mut grants = Vec::new();

    for requirement in requirements {
        let matched = groups.iter().find_map(|group| {
            find_matching_rule(group, requirement.protocol, requirement.port)
                .map(|rule| (group, rule))
        });

        let Some((group, rule)) = matched else {
            return Err(AdapterError::NoMatchingRule {
                instance: instance_name.to_string(),
                protocol: requirement.protocol.as_str().to_string(),
                port: requirement.port,
            });
        };

        for peer in front_end_peers {
            if !rule.has_peer(peer) {
                grants.push(GrantOperation {
                    group_id: group.id.clone(),
                    protocol: rule.protocol,
                    from_port: rule.from_port,
                    to_port: rule.to_port,
                    peer: peer.clone(),
                });
            }
        }
    }

    Ok(grants)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_rule(from: u16, to: u16, peers: &[&str]) -> IngressRule {
        IngressRule {
            protocol: Protocol::Tcp,
            from_port: from,
            to_port: to,
            peers: peers.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn requirement(protocol: Protocol, port: u16) -> PortProtocolRequirement {
        PortProtocolRequirement { protocol, port }
    }

    #[test]
    fn protocol_normalization() {
        assert_eq!(Protocol::parse(Some("UDP")), Protocol::Udp);
        assert_eq!(Protocol::parse(Some("udp")), Protocol::Udp);
        assert_eq!(Protocol::parse(Some("tcp")), Protocol::Tcp);
        assert_eq!(Protocol::parse(Some("http")), Protocol::Tcp);
        assert_eq!(Protocol::parse(Some("https")), Protocol::Tcp);
        assert_eq!(Protocol::parse(Some("")), Protocol::Tcp);
        assert_eq!(Protocol::parse(None), Protocol::Tcp);
    }

    #[test]
    fn matcher_finds_first_covering_rule() {
        let group = SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![
                tcp_rule(22, 22, &[]),
                tcp_rule(400, 500, &["sg-other"]),
                tcp_rule(443, 443, &[]),
            ],
        };

        // 443 falls inside 400-500, which appears before the exact rule
        let rule = find_matching_rule(&group, Protocol::Tcp, 443).unwrap();
        assert_eq!((rule.from_port, rule.to_port), (400, 500));

        assert!(find_matching_rule(&group, Protocol::Tcp, 8080).is_none());
        assert!(find_matching_rule(&group, Protocol::Udp, 443).is_none());
    }

    #[test]
    fn grant_emitted_for_missing_peer() {
        let groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![tcp_rule(443, 443, &[])],
        }];

        let grants = plan_grants(
            "web-1",
            &groups,
            &[requirement(Protocol::Tcp, 443)],
            &["sg-lb1".to_string()],
        )
        .unwrap();

        assert_eq!(
            grants,
            vec![GrantOperation {
                group_id: "sg-1".to_string(),
                protocol: Protocol::Tcp,
                from_port: 443,
                to_port: 443,
                peer: "sg-lb1".to_string(),
            }]
        );
    }

    /// Re-reconciling after the grant is applied produces nothing
    #[test]
    fn reconcile_is_idempotent() {
        let mut groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![tcp_rule(443, 443, &[])],
        }];
        let requirements = [requirement(Protocol::Tcp, 443)];
        let peers = ["sg-lb1".to_string()];

        let grants = plan_grants("web-1", &groups, &requirements, &peers).unwrap();
        assert_eq!(grants.len(), 1);

        // Apply the grant to the model, then plan again
        for grant in &grants {
            let group = groups.iter_mut().find(|g| g.id == grant.group_id).unwrap();
            let rule = group
                .rules
                .iter_mut()
                .find(|r| r.covers(grant.protocol, grant.from_port))
                .unwrap();
            rule.peers.push(grant.peer.clone());
        }

        let grants = plan_grants("web-1", &groups, &requirements, &peers).unwrap();
        assert!(grants.is_empty());
    }

    #[test]
    fn no_matching_rule_is_an_error() {
        let groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![tcp_rule(443, 443, &[])],
        }];

        let result = plan_grants(
            "web-1",
            &groups,
            &[requirement(Protocol::Tcp, 8080)],
            &["sg-lb1".to_string()],
        );

        assert!(matches!(
            result,
            Err(AdapterError::NoMatchingRule { port: 8080, .. })
        ));
    }

    /// The grant carries the matched rule's range, not the requirement's port
    #[test]
    fn grant_preserves_wider_configured_range() {
        let groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![tcp_rule(8000, 9000, &[])],
        }];

        let grants = plan_grants(
            "web-1",
            &groups,
            &[requirement(Protocol::Tcp, 8080)],
            &["sg-lb1".to_string()],
        )
        .unwrap();

        assert_eq!((grants[0].from_port, grants[0].to_port), (8000, 9000));
    }

    /// First group with a matching rule wins; later groups are not scanned
    #[test]
    fn first_matching_group_wins() {
        let groups = vec![
            SecurityGroup {
                id: "sg-a".to_string(),
                rules: vec![tcp_rule(443, 443, &["sg-lb1"])],
            },
            SecurityGroup {
                id: "sg-b".to_string(),
                rules: vec![tcp_rule(443, 443, &[])],
            },
        ];

        // sg-a already admits the peer, so nothing is granted even though
        // sg-b's rule does not
        let grants = plan_grants(
            "web-1",
            &groups,
            &[requirement(Protocol::Tcp, 443)],
            &["sg-lb1".to_string()],
        )
        .unwrap();

        assert!(grants.is_empty());
    }

    #[test]
    fn one_grant_per_missing_peer() {
        let groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![tcp_rule(443, 443, &["sg-lb1"])],
        }];

        let grants = plan_grants(
            "web-1",
            &groups,
            &[requirement(Protocol::Tcp, 443)],
            &["sg-lb1".to_string(), "sg-lb2".to_string()],
        )
        .unwrap();

        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].peer, "sg-lb2");
    }

    #[test]
    fn udp_requirement_matches_udp_rules_only() {
        let groups = vec![SecurityGroup {
            id: "sg-1".to_string(),
            rules: vec![
                tcp_rule(53, 53, &[]),
                IngressRule {
                    protocol: Protocol::Udp,
                    from_port: 53,
                    to_port: 53,
                    peers: vec![],
                },
            ],
        }];

        let grants = plan_grants(
            "dns-1",
            &groups,
            &[requirement(Protocol::Udp, 53)],
            &["sg-lb1".to_string()],
        )
        .unwrap();

        assert_eq!(grants[0].protocol, Protocol::Udp);
    }
}

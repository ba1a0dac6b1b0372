//! Static catalog of editable rule fields.
//! 规则字段目录（固定 14 项，运行期不可变）。

/// One editable rule field: display label, document match key, editor
/// placeholder and whether values must be integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleFieldDescriptor {
    pub label: &'static str,
    pub key: &'static str,
    pub placeholder: &'static str,
    pub numeric: bool,
}

pub const RULE_FIELDS: &[RuleFieldDescriptor] = &[
    RuleFieldDescriptor {
        label: "Domain",
        key: "domain",
        placeholder: "example.com",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Domain Suffix",
        key: "domain_suffix",
        placeholder: ".example.com",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Domain Keyword",
        key: "domain_keyword",
        placeholder: "example",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Domain Regex",
        key: "domain_regex",
        placeholder: "^ads\\.",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "IP CIDR",
        key: "ip_cidr",
        placeholder: "10.0.0.0/8",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Private IP",
        key: "ip_is_private",
        placeholder: "true",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Source IP CIDR",
        key: "source_ip_cidr",
        placeholder: "192.168.0.0/16",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Port",
        key: "port",
        placeholder: "443",
        numeric: true,
    },
    RuleFieldDescriptor {
        label: "Source Port",
        key: "source_port",
        placeholder: "12345",
        numeric: true,
    },
    RuleFieldDescriptor {
        label: "Port Range",
        key: "port_range",
        placeholder: "1000:2000",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Source Port Range",
        key: "source_port_range",
        placeholder: "1000:2000",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Process Name",
        key: "process_name",
        placeholder: "curl",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Process Path",
        key: "process_path",
        placeholder: "/usr/bin/curl",
        numeric: false,
    },
    RuleFieldDescriptor {
        label: "Protocol",
        key: "protocol",
        placeholder: "quic",
        numeric: false,
    },
];

pub fn field_by_key(key: &str) -> Option<&'static RuleFieldDescriptor> {
    RULE_FIELDS.iter().find(|f| f.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_fourteen_unique_keys() {
        assert_eq!(RULE_FIELDS.len(), 14);
        let mut keys: Vec<_> = RULE_FIELDS.iter().map(|f| f.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 14);
    }

    #[test]
    fn numeric_flag_only_on_ports() {
        let numeric: Vec<_> = RULE_FIELDS.iter().filter(|f| f.numeric).map(|f| f.key).collect();
        assert_eq!(numeric, ["port", "source_port"]);
    }
}

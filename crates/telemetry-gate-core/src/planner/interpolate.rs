// telemetry-gate-core/src/planner/interpolate.rs
// ============================================================================
// Module: Argument Interpolation
// Description: Pure substitution of #{name} tokens and $-prefixed host/server
//              references inside commands and criteria field predicates.
// ============================================================================

use std::collections::BTreeMap;

use crate::planner::PlannerError;

/// Host facts collected once at startup and treated as read-only for the
/// rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct HostInfo {
    /// `$hostname`.
    pub hostname: String,
    /// Default network interface name, for `$netif`.
    pub netif: String,
    /// `$ipaddr4`.
    pub ipaddr4: String,
    /// `$ipaddr6`.
    pub ipaddr6: String,
    /// Link-local IPv6 address.
    pub ll_ipaddr6: String,
    /// MAC address of the default interface.
    pub macaddr: String,
    /// First available address, IPv4 preferred, for `$ipaddr`.
    pub ipaddr: String,
    /// `$gateway`.
    pub gateway: String,
    /// Subnet mask in hex form, e.g. `0xffffff00`.
    pub subnet_mask: String,
    /// `$subnet`.
    pub subnet: String,
    /// `$username`.
    pub username: String,
}

impl HostInfo {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "hostname" => Some(&self.hostname),
            "netif" => Some(&self.netif),
            "ipaddr4" => Some(&self.ipaddr4),
            "ipaddr6" => Some(&self.ipaddr6),
            "ll_ipaddr6" => Some(&self.ll_ipaddr6),
            "macaddr" => Some(&self.macaddr),
            "ipaddr" => Some(&self.ipaddr),
            "gateway" => Some(&self.gateway),
            "subnet_mask" => Some(&self.subnet_mask),
            "subnet" => Some(&self.subnet),
            "username" => Some(&self.username),
            _ => None,
        }
    }
}

/// One row of `servers.csv`.
#[derive(Debug, Clone, Default)]
pub struct ServerEntry {
    /// Server id.
    pub id: String,
    /// Server type/role label.
    pub server_type: String,
    /// Hostname.
    pub hostname: String,
    /// Address.
    pub addr: String,
    /// Port.
    pub port: String,
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
    /// Public key material or path.
    pub pubkey: String,
}

impl ServerEntry {
    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "addr" => Some(&self.addr),
            "port" => Some(&self.port),
            "username" => Some(&self.username),
            "password" => Some(&self.password),
            "pubkey" => Some(&self.pubkey),
            "hostname" => Some(&self.hostname),
            _ => None,
        }
    }
}

/// `servers.csv` indexed for `$SERVER[id-or-type]` lookups.
#[derive(Debug, Clone, Default)]
pub struct ServerTable {
    entries: Vec<ServerEntry>,
}

impl ServerTable {
    /// Builds a table from parsed rows.
    #[must_use]
    pub fn new(entries: Vec<ServerEntry>) -> Self {
        Self { entries }
    }

    fn find(&self, id_or_type: &str) -> Option<&ServerEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id_or_type)
            .or_else(|| self.entries.iter().find(|e| e.server_type == id_or_type))
    }

    /// Returns the parsed rows, for callers that need to inspect the table
    /// directly (e.g. config loaders validating a `servers.csv` file).
    #[must_use]
    pub fn entries(&self) -> &[ServerEntry] {
        &self.entries
    }
}

/// Substitutes `#{name}` tokens, `$`-prefixed host/server references, and
/// `PathToAtomicsFolder` occurrences in `template`, using `args` for
/// `#{name}` lookups.
///
/// # Errors
///
/// Returns [`PlannerError::UnresolvedToken`] if a `#{…}` token remains after
/// substitution, and [`PlannerError::UnknownServer`] if a `$SERVER[...]`
/// reference cannot be resolved.
pub fn interpolate(
    template: &str,
    args: &BTreeMap<String, String>,
    host: &HostInfo,
    servers: &ServerTable,
    atomics_dir: &str,
) -> Result<String, PlannerError> {
    let mut out = substitute_braces(template, args)?;
    out = substitute_dollar_vars(&out, host, servers)?;
    out = substitute_atomics_path(&out, atomics_dir);
    if let Some(token) = find_unresolved_brace(&out) {
        return Err(PlannerError::UnresolvedToken(token));
    }
    Ok(out)
}

fn substitute_braces(template: &str, args: &BTreeMap<String, String>) -> Result<String, PlannerError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '#' && template[i..].starts_with("#{") {
            let rest = &template[i + 2..];
            if let Some(end) = rest.find('}') {
                let name = &rest[..end];
                if let Some(value) = args.get(name) {
                    out.push_str(value);
                } else {
                    out.push_str("#{");
                    out.push_str(name);
                    out.push('}');
                }
                for _ in 0..end + 2 {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    Ok(out)
}

fn find_unresolved_brace(text: &str) -> Option<String> {
    let start = text.find("#{")?;
    let rest = &text[start + 2..];
    let end = rest.find('}')?;
    Some(format!("#{{{}}}", &rest[..end]))
}

const DOLLAR_VARS: &[&str] = &[
    "hostname", "ipaddr4", "ipaddr6", "ipaddr", "subnet", "gateway", "netif", "username",
];

fn substitute_dollar_vars(text: &str, host: &HostInfo, servers: &ServerTable) -> Result<String, PlannerError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let Some(pos) = rest.find('$') else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after_prefix) = tail.strip_prefix("$SERVER[") {
            if let Some(close) = after_prefix.find(']') {
                let id_or_type = &after_prefix[..close];
                let after_bracket = &after_prefix[close + 1..];
                if let Some(dot) = after_bracket.strip_prefix('.') {
                    let field_name: String = dot.chars().take_while(|c| c.is_alphanumeric() || *c == '_').collect();
                    let entry = servers
                        .find(id_or_type)
                        .ok_or_else(|| PlannerError::UnknownServer(id_or_type.to_string()))?;
                    let value = entry.field(&field_name).unwrap_or_default();
                    out.push_str(value);
                    rest = &dot[field_name.len()..];
                    continue;
                }
            }
            out.push('$');
            rest = &tail[1..];
            continue;
        }
        let matched = DOLLAR_VARS.iter().find(|name| tail[1..].starts_with(**name));
        if let Some(name) = matched {
            if let Some(value) = host.lookup(name) {
                out.push_str(value);
                rest = &tail[1 + name.len()..];
                continue;
            }
        }
        out.push('$');
        rest = &tail[1..];
    }
    Ok(out)
}

/// Substitutes `PathToAtomicsFolder` occurrences, scoped to each
/// whitespace-delimited token rather than the command as a whole: a URL
/// elsewhere in the command must not suppress the substitution in an
/// unrelated argument. Mirrors the original implementation's per-argument
/// substitution loop, one token standing in for one interpolated value.
fn substitute_atomics_path(text: &str, atomics_dir: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if rest.starts_with(char::is_whitespace) {
            let end = rest.find(|c: char| !c.is_whitespace()).unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            out.push_str(&substitute_atomics_path_token(&rest[..end], atomics_dir));
            rest = &rest[end..];
        }
    }
    out
}

/// Applies the `PathToAtomicsFolder` substitution to one token, leaving it
/// untouched when it is itself a URL.
fn substitute_atomics_path_token(token: &str, atomics_dir: &str) -> String {
    if token.starts_with("http") || token.contains("://") {
        return token.to_string();
    }
    token.replace("$PathToAtomicsFolder", atomics_dir).replace("PathToAtomicsFolder", atomics_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_brace_tokens() {
        let mut args = BTreeMap::new();
        args.insert("journal_folder".to_string(), "/var/log/journal".to_string());
        let host = HostInfo::default();
        let servers = ServerTable::default();
        let result = interpolate("rm #{journal_folder}/*", &args, &host, &servers, "/opt/atomics").unwrap();
        assert_eq!(result, "rm /var/log/journal/*");
    }

    #[test]
    fn unresolved_token_is_an_error() {
        let args = BTreeMap::new();
        let host = HostInfo::default();
        let servers = ServerTable::default();
        let err = interpolate("echo #{missing}", &args, &host, &servers, "/opt/atomics").unwrap_err();
        assert_eq!(err, PlannerError::UnresolvedToken("#{missing}".to_string()));
    }

    #[test]
    fn substitutes_host_vars() {
        let args = BTreeMap::new();
        let mut host = HostInfo::default();
        host.hostname = "victim-host".to_string();
        let servers = ServerTable::default();
        let result = interpolate("ping $hostname", &args, &host, &servers, "/opt/atomics").unwrap();
        assert_eq!(result, "ping victim-host");
    }

    #[test]
    fn substitutes_server_reference() {
        let args = BTreeMap::new();
        let host = HostInfo::default();
        let servers = ServerTable::new(vec![ServerEntry {
            id: "s1".to_string(),
            server_type: "c2".to_string(),
            addr: "10.0.0.5".to_string(),
            ..ServerEntry::default()
        }]);
        let result = interpolate("connect $SERVER[c2].addr", &args, &host, &servers, "/opt/atomics").unwrap();
        assert_eq!(result, "connect 10.0.0.5");
    }

    #[test]
    fn leaves_urls_untouched() {
        let result = substitute_atomics_path("http://PathToAtomicsFolder/x", "/opt/atomics");
        assert_eq!(result, "http://PathToAtomicsFolder/x");
    }

    #[test]
    fn a_url_elsewhere_in_the_command_does_not_suppress_an_unrelated_substitution() {
        let result = substitute_atomics_path("curl http://x & cp payload.sh PathToAtomicsFolder/out", "/opt/atomics");
        assert_eq!(result, "curl http://x & cp payload.sh /opt/atomics/out");
    }
}

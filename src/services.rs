use std::collections::HashMap;

/// Static mapping from port number to its conventional service name.
///
/// Built once at startup and shared read-only between probes. Tests can
/// build a controlled table with `collect()`.
#[derive(Debug, Clone, Default)]
pub struct ServiceTable {
    names: HashMap<u16, String>,
}

impl ServiceTable {
    /// Table of commonly used TCP ports.
    pub fn well_known() -> Self {
        const WELL_KNOWN: &[(u16, &str)] = &[
            (20, "FTP Data"),
            (21, "FTP Control"),
            (22, "SSH"),
            (23, "Telnet"),
            (25, "SMTP"),
            (53, "DNS"),
            (80, "HTTP"),
            (110, "POP3"),
            (111, "RPCbind"),
            (135, "MSRPC"),
            (139, "NetBIOS-SSN"),
            (143, "IMAP"),
            (389, "LDAP"),
            (443, "HTTPS"),
            (445, "SMB"),
            (465, "SMTPS"),
            (587, "Submission"),
            (993, "IMAPS"),
            (995, "POP3S"),
            (1433, "MSSQL"),
            (1521, "Oracle"),
            (2049, "NFS"),
            (3306, "MySQL"),
            (3389, "RDP"),
            (5432, "PostgreSQL"),
            (5900, "VNC"),
            (6379, "Redis"),
            (8080, "HTTP-Alt"),
            (8443, "HTTPS-Alt"),
            (9200, "Elasticsearch"),
            (11211, "Memcached"),
            (27017, "MongoDB"),
        ];
        WELL_KNOWN.iter().copied().collect()
    }

    pub fn lookup(&self, port: u16) -> Option<&str> {
        self.names.get(&port).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<'a> FromIterator<(u16, &'a str)> for ServiceTable {
    fn from_iter<I: IntoIterator<Item = (u16, &'a str)>>(iter: I) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(port, name)| (port, name.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_has_common_ports() {
        let table = ServiceTable::well_known();
        assert_eq!(table.lookup(22), Some("SSH"));
        assert_eq!(table.lookup(80), Some("HTTP"));
        assert_eq!(table.lookup(3389), Some("RDP"));
        assert_eq!(table.lookup(40000), None);
    }

    #[test]
    fn custom_table_replaces_defaults() {
        let table: ServiceTable = [(9999, "Test")].into_iter().collect();
        assert_eq!(table.lookup(9999), Some("Test"));
        assert_eq!(table.lookup(22), None);
        assert_eq!(table.len(), 1);
    }
}

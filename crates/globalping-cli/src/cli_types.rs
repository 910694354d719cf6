use clap::ValueEnum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum CliTraceProtocol {
    Icmp,
    Tcp,
    Udp,
}

impl CliTraceProtocol {
    pub fn as_wire(self) -> &'static str {
        match self {
            CliTraceProtocol::Icmp => "ICMP",
            CliTraceProtocol::Tcp => "TCP",
            CliTraceProtocol::Udp => "UDP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum CliDnsProtocol {
    Udp,
    Tcp,
}

impl CliDnsProtocol {
    pub fn as_wire(self) -> &'static str {
        match self {
            CliDnsProtocol::Udp => "UDP",
            CliDnsProtocol::Tcp => "TCP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum CliDnsType {
    A,
    Aaaa,
    Any,
    Cname,
    Dnskey,
    Ds,
    Https,
    Mx,
    Ns,
    Nsec,
    Ptr,
    Rrsig,
    Soa,
    Txt,
    Srv,
}

impl CliDnsType {
    pub fn as_wire(self) -> &'static str {
        match self {
            CliDnsType::A => "A",
            CliDnsType::Aaaa => "AAAA",
            CliDnsType::Any => "ANY",
            CliDnsType::Cname => "CNAME",
            CliDnsType::Dnskey => "DNSKEY",
            CliDnsType::Ds => "DS",
            CliDnsType::Https => "HTTPS",
            CliDnsType::Mx => "MX",
            CliDnsType::Ns => "NS",
            CliDnsType::Nsec => "NSEC",
            CliDnsType::Ptr => "PTR",
            CliDnsType::Rrsig => "RRSIG",
            CliDnsType::Soa => "SOA",
            CliDnsType::Txt => "TXT",
            CliDnsType::Srv => "SRV",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum CliHttpMethod {
    Get,
    Head,
    Options,
}

impl CliHttpMethod {
    pub fn as_wire(self) -> &'static str {
        match self {
            CliHttpMethod::Get => "GET",
            CliHttpMethod::Head => "HEAD",
            CliHttpMethod::Options => "OPTIONS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "UPPER")]
pub enum CliHttpProtocol {
    Http,
    Https,
    Http2,
}

impl CliHttpProtocol {
    pub fn as_wire(self) -> &'static str {
        match self {
            CliHttpProtocol::Http => "HTTP",
            CliHttpProtocol::Https => "HTTPS",
            CliHttpProtocol::Http2 => "HTTP2",
        }
    }
}

//! Geo/ASN enrichment.
//!
//! Resolves a record's remote address against MaxMind GeoIP2 city and ASN
//! databases. The databases are memory-mapped once at startup and shared
//! read-only across all task workers.

use std::net::IpAddr;
use std::path::Path;

use maxminddb::PathElement;

use crate::errors::{ConfigError, RecordError};
use crate::parser::UNKNOWN;

/// Country and autonomous-system metadata for one remote address. Values
/// the databases do not know default to the `unknown` sentinel (ASN 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoInfo {
    pub country_code: String,
    pub country_name: String,
    pub asn_number: u32,
    pub asn_org: String,
}

impl Default for GeoInfo {
    fn default() -> Self {
        Self {
            country_code: UNKNOWN.to_string(),
            country_name: UNKNOWN.to_string(),
            asn_number: 0,
            asn_org: UNKNOWN.to_string(),
        }
    }
}

/// MaxMind database pair (city + ASN).
pub struct GeoFinder {
    city_reader: maxminddb::Reader<maxminddb::Mmap>,
    asn_reader: maxminddb::Reader<maxminddb::Mmap>,
}

impl GeoFinder {
    /// Open both databases. Failure here is fatal: enrichment is a startup
    /// dependency, not an optional feature.
    ///
    /// Safety note on the memory-mapped readers: the files are opened
    /// read-only and never mutated while the process runs.
    pub fn open(city_path: &Path, asn_path: &Path) -> Result<Self, ConfigError> {
        let city_reader = unsafe { maxminddb::Reader::open_mmap(city_path) }.map_err(|e| {
            ConfigError::GeoDatabase {
                path: city_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        let asn_reader = unsafe { maxminddb::Reader::open_mmap(asn_path) }.map_err(|e| {
            ConfigError::GeoDatabase {
                path: asn_path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self {
            city_reader,
            asn_reader,
        })
    }

    /// Look up one remote address. An unparsable address or a database
    /// error drops the record; an address simply absent from the databases
    /// enriches to the `unknown` defaults.
    pub fn find(&self, addr: &str) -> Result<GeoInfo, RecordError> {
        let ip: IpAddr = addr.parse().map_err(|_| RecordError::Enrichment {
            addr: addr.to_string(),
            reason: "not an IP address".to_string(),
        })?;

        let mut info = GeoInfo::default();

        let lookup = self
            .city_reader
            .lookup(ip)
            .map_err(|e| RecordError::Enrichment {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(code) = lookup
            .decode_path::<String>(&[PathElement::Key("country"), PathElement::Key("iso_code")])
            .ok()
            .flatten()
        {
            info.country_code = or_unknown(code);
        }

        if let Some(name) = lookup
            .decode_path::<String>(&[
                PathElement::Key("country"),
                PathElement::Key("names"),
                PathElement::Key("en"),
            ])
            .ok()
            .flatten()
        {
            info.country_name = or_unknown(name);
        }

        let lookup = self
            .asn_reader
            .lookup(ip)
            .map_err(|e| RecordError::Enrichment {
                addr: addr.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(number) = lookup
            .decode_path::<u32>(&[PathElement::Key("autonomous_system_number")])
            .ok()
            .flatten()
        {
            info.asn_number = number;
        }

        if let Some(org) = lookup
            .decode_path::<String>(&[PathElement::Key("autonomous_system_organization")])
            .ok()
            .flatten()
        {
            info.asn_org = or_unknown(org);
        }

        Ok(info)
    }
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

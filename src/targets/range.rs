//! Network range expressions.
//!
//! Accepted entry forms, separated by commas or whitespace:
//! - CIDR: `10.0.0.0/24`, `2001:db8::/126`
//! - inclusive range: `10.0.0.1-10.0.0.20`, or last-octet shorthand `10.0.0.1-20`
//! - a single address

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::{JobflowError, Result};

/// Expands a range expression into host addresses, in order, at most `max_hosts` in total.
pub fn expand_network_range(
    range: &str,
    max_hosts: usize,
) -> Result<Vec<String>> {
    let mut hosts: Vec<String> = Vec::new();

    for entry in range.split(|c: char| c == ',' || c.is_whitespace()).filter(|e| !e.is_empty()) {
        let budget = max_hosts.saturating_sub(hosts.len());
        let expanded = if let Some((addr, prefix)) = entry.split_once('/') {
            expand_cidr(entry, addr, prefix, budget)?
        } else if let Some((start, end)) = entry.split_once('-') {
            expand_span(entry, start, end, budget)?
        } else {
            let addr: IpAddr = entry.parse().map_err(|_| invalid(entry, "not an ip address"))?;
            check_budget(entry, 1, budget)?;
            vec![addr.to_string()]
        };
        hosts.extend(expanded);
    }

    if hosts.is_empty() {
        return Err(JobflowError::TargetResolution(format!("network range '{}' contains no hosts", range.trim())));
    }
    Ok(hosts)
}

fn expand_cidr(
    entry: &str,
    addr: &str,
    prefix: &str,
    budget: usize,
) -> Result<Vec<String>> {
    let addr: IpAddr = addr.parse().map_err(|_| invalid(entry, "not an ip address"))?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid(entry, "prefix is not a number"))?;

    match addr {
        IpAddr::V4(v4) => {
            if prefix > 32 {
                return Err(invalid(entry, "ipv4 prefix must be at most 32"));
            }
            let host_bits = 32 - prefix;
            let mask = if prefix == 0 { 0 } else { u32::MAX << host_bits };
            let network = u64::from(u32::from(v4) & mask);
            let size = 1u64 << host_bits;

            // network and broadcast are not hosts below /31
            let (first, last) = if prefix < 31 { (network + 1, network + size - 2) } else { (network, network + size - 1) };
            let count = (last - first + 1) as usize;
            check_budget(entry, count, budget)?;
            Ok((first..=last).map(|n| Ipv4Addr::from(n as u32).to_string()).collect())
        }
        IpAddr::V6(v6) => {
            if prefix > 128 {
                return Err(invalid(entry, "ipv6 prefix must be at most 128"));
            }
            let host_bits = 128 - prefix;
            if host_bits >= 64 {
                return Err(invalid(entry, "range is too large"));
            }
            let mask = if prefix == 0 { 0 } else { u128::MAX << host_bits };
            let network = u128::from(v6) & mask;
            let size = 1u128 << host_bits;
            check_budget(entry, size as usize, budget)?;
            Ok((0..size).map(|offset| Ipv6Addr::from(network + offset).to_string()).collect())
        }
    }
}

fn expand_span(
    entry: &str,
    start: &str,
    end: &str,
    budget: usize,
) -> Result<Vec<String>> {
    let start: IpAddr = start.trim().parse().map_err(|_| invalid(entry, "range start is not an ip address"))?;
    let end = end.trim();

    match start {
        IpAddr::V4(v4) => {
            let end: Ipv4Addr = if let Ok(last_octet) = end.parse::<u8>() {
                let [a, b, c, _] = v4.octets();
                Ipv4Addr::new(a, b, c, last_octet)
            } else {
                end.parse().map_err(|_| invalid(entry, "range end is not an ipv4 address"))?
            };
            let (first, last) = (u32::from(v4), u32::from(end));
            if first > last {
                return Err(invalid(entry, "range start is after range end"));
            }
            check_budget(entry, (u64::from(last) - u64::from(first) + 1) as usize, budget)?;
            Ok((first..=last).map(|n| Ipv4Addr::from(n).to_string()).collect())
        }
        IpAddr::V6(v6) => {
            let end: Ipv6Addr = end.parse().map_err(|_| invalid(entry, "range end is not an ipv6 address"))?;
            let (first, last) = (u128::from(v6), u128::from(end));
            if first > last {
                return Err(invalid(entry, "range start is after range end"));
            }
            let count = last - first + 1;
            if count > budget as u128 {
                return Err(invalid(entry, &format!("expands to more than {} hosts", budget)));
            }
            Ok((first..=last).map(|n| Ipv6Addr::from(n).to_string()).collect())
        }
    }
}

fn check_budget(
    entry: &str,
    count: usize,
    budget: usize,
) -> Result<()> {
    if count > budget {
        return Err(invalid(entry, &format!("expands to more than {} hosts", budget)));
    }
    Ok(())
}

fn invalid(
    entry: &str,
    reason: &str,
) -> JobflowError {
    JobflowError::TargetResolution(format!("invalid network range '{}': {}", entry, reason))
}

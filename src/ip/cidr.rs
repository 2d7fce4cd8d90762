//! CIDR arithmetic.
//!
//! Containment, overlap, alignment and summarization over IPv4 blocks. All
//! math runs on `u32` network addresses; `Ipv4Net` is only used at the edges
//! for parsing and display.

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

/// Addresses the provider holds back in every subnet (network, router, DNS,
/// future use, broadcast)
pub const RESERVED_ADDRESSES: u64 = 5;

/// Low addresses reserved at the start of every subnet
pub const RESERVED_LOW_ADDRESSES: u64 = 4;

/// Smallest subnet the provider will create
pub const MIN_SUBNET_PREFIX: u8 = 28;

/// Number of addresses in a block of the given prefix length
pub fn block_size(prefix_len: u8) -> u64 {
    1u64 << (32 - u32::from(prefix_len))
}

/// First address of a block as an integer
pub fn first(net: &Ipv4Net) -> u64 {
    u64::from(u32::from(net.network()))
}

/// Last address of a block as an integer
pub fn last(net: &Ipv4Net) -> u64 {
    first(net) + block_size(net.prefix_len()) - 1
}

/// Whether two blocks share any address
pub fn overlaps(a: &Ipv4Net, b: &Ipv4Net) -> bool {
    first(a) <= last(b) && first(b) <= last(a)
}

/// Whether `inner` lies entirely inside `outer`
pub fn contains(outer: &Ipv4Net, inner: &Ipv4Net) -> bool {
    first(outer) <= first(inner) && last(inner) <= last(outer)
}

/// Whether the address part of `net` sits on its prefix boundary
pub fn is_aligned(net: &Ipv4Net) -> bool {
    u64::from(u32::from(net.addr())) % block_size(net.prefix_len()) == 0
}

/// Build a block starting at `start`; `None` if misaligned or out of range
pub fn block_at(start: u64, prefix_len: u8) -> Option<Ipv4Net> {
    if prefix_len > 32 || start % block_size(prefix_len) != 0 || start > u64::from(u32::MAX) {
        return None;
    }
    Ipv4Net::new(Ipv4Addr::from(start as u32), prefix_len).ok()
}

/// Prefix length of the smallest power-of-two block holding `hosts`
/// usable addresses plus the provider reservation, clamped to the
/// provider minimum
pub fn prefix_for_hosts(hosts: u64) -> u8 {
    let needed = (hosts + RESERVED_ADDRESSES).next_power_of_two();
    let prefix = 32 - needed.trailing_zeros().min(32) as u8;
    prefix.min(MIN_SUBNET_PREFIX)
}

/// Merge blocks into the fewest covering supernets.
///
/// Only exact siblings and contained blocks are merged, so the result
/// covers precisely the input addresses.
pub fn summarize(nets: &[Ipv4Net]) -> Vec<Ipv4Net> {
    let trunc: Vec<Ipv4Net> = nets.iter().map(Ipv4Net::trunc).collect();
    let mut merged = Ipv4Net::aggregate(&trunc);
    merged.sort();
    merged
}

/// The `offset`-th address of a block, if it exists
pub fn host_at(net: &Ipv4Net, offset: u64) -> Option<Ipv4Addr> {
    if offset >= block_size(net.prefix_len()) {
        return None;
    }
    Some(Ipv4Addr::from((first(net) + offset) as u32))
}

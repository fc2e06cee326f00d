//! Constant-time selection helpers.
//!
//! Packet-number lengths, masks and truncated packet numbers are secret
//! until header protection is removed and the payload is authenticated.
//! Every decision over them goes through `subtle` choices and arithmetic
//! selection, never through a branch.

#![forbid(unsafe_code)]

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};

pub(crate) fn eq_u32(a: u32, b: u32) -> Choice {
    a.ct_eq(&b)
}

pub(crate) fn lt_u64(a: u64, b: u64) -> Choice {
    b.ct_gt(&a)
}

pub(crate) fn le_u64(a: u64, b: u64) -> Choice {
    !a.ct_gt(&b)
}

/// `if_true` when `choice` is set, `if_false` otherwise.
pub(crate) fn select_u64(choice: Choice, if_false: u64, if_true: u64) -> u64 {
    u64::conditional_select(&if_false, &if_true, choice)
}

pub(crate) fn select_u32(choice: Choice, if_false: u32, if_true: u32) -> u32 {
    u32::conditional_select(&if_false, &if_true, choice)
}

pub(crate) fn min_u64(a: u64, b: u64) -> u64 {
    select_u64(lt_u64(b, a), a, b)
}

pub(crate) fn max_u64(a: u64, b: u64) -> u64 {
    select_u64(lt_u64(a, b), a, b)
}

/// Pick `table[index]` by scanning every entry.
///
/// Out-of-range indices yield 0.
pub(crate) fn lookup_u32(table: &[u32], index: u32) -> u32 {
    table.iter().zip(0u32..).fold(0, |acc, (&entry, i)| {
        acc | select_u32(eq_u32(index, i), 0, entry)
    })
}

pub(crate) fn lookup_u64(table: &[u64], index: u32) -> u64 {
    table.iter().zip(0u32..).fold(0, |acc, (&entry, i)| {
        acc | select_u64(eq_u32(index, i), 0, entry)
    })
}

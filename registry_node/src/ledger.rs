//! Capacity accounting.
//!
//! Every transition takes the current numbers plus a delta and returns the
//! new free capacity or an error. Nothing here touches storage, so a
//! rejected transition can never leave a half-applied state behind.

use crate::error::{RegistryError, Result};
use num_bigint::BigUint;

/// Outcome of a transition that may push free capacity above the pledge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub free: BigUint,
    /// Set when the credit would have exceeded the pledged size
    pub clamped: bool,
}

fn cap(free: BigUint, size: &BigUint) -> Credit {
    if &free > size {
        Credit {
            free: size.clone(),
            clamped: true,
        }
    } else {
        Credit {
            free,
            clamped: false,
        }
    }
}

/// Reserve `amount` out of `free`
pub fn allocate(free: &BigUint, amount: &BigUint) -> Result<BigUint> {
    if amount > free {
        return Err(RegistryError::InsufficientSpace {
            requested: amount.clone(),
            available: free.clone(),
        });
    }
    Ok(free - amount)
}

/// Re-account a file that changed from `old_size` to `new_size`:
/// `free + old_size - new_size`, which must not go negative.
pub fn resize(
    free: &BigUint,
    size: &BigUint,
    old_size: &BigUint,
    new_size: &BigUint,
) -> Result<Credit> {
    let available = free + old_size;
    if new_size > &available {
        return Err(RegistryError::InsufficientSpace {
            requested: new_size.clone(),
            available,
        });
    }
    Ok(cap(available - new_size, size))
}

/// Return `amount` to the free pool
pub fn release(free: &BigUint, size: &BigUint, amount: &BigUint) -> Credit {
    cap(free + amount, size)
}

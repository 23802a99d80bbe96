//! Gas accounting.
//!
//! A [GasMeter] starts from the gas limit of a request and decreases as cpu,
//! ram and storage are charged, so that outside of sub-budgets
//! `cpu + ram + storage + remaining == limit` always holds.

use crate::error::OutOfGas;
use hotmoka_types::GasCosts;
use std::ops::{Deref, DerefMut};
use tracing::trace;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    remaining: u64,
    cpu: u64,
    ram: u64,
    storage: u64,
    unlimited: bool,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            cpu: 0,
            ram: 0,
            storage: 0,
            unlimited: false,
        }
    }

    /// A meter that never runs out and records nothing, for initial transactions.
    pub fn unlimited() -> Self {
        Self {
            limit: u64::MAX,
            remaining: u64::MAX,
            cpu: 0,
            ram: 0,
            storage: 0,
            unlimited: true,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn consumed(&self) -> GasCosts {
        GasCosts {
            cpu: self.cpu,
            ram: self.ram,
            storage: self.storage,
        }
    }

    /// Gas left unconsumed by a failed transaction, that the caller loses.
    pub fn penalty(&self) -> u64 {
        self.limit.saturating_sub(self.consumed().total())
    }

    pub fn charge_cpu(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.take(amount)?;
        self.cpu += if self.unlimited { 0 } else { amount };
        Ok(())
    }

    pub fn charge_ram(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.take(amount)?;
        self.ram += if self.unlimited { 0 } else { amount };
        Ok(())
    }

    pub fn charge_storage(&mut self, amount: u64) -> Result<(), OutOfGas> {
        self.take(amount)?;
        self.storage += if self.unlimited { 0 } else { amount };
        Ok(())
    }

    fn take(&mut self, amount: u64) -> Result<(), OutOfGas> {
        if self.unlimited {
            return Ok(());
        }
        if amount > self.remaining {
            trace!(amount, remaining = self.remaining, "charge exceeds remaining gas");
            return Err(OutOfGas);
        }
        self.remaining -= amount;
        Ok(())
    }

    /// Runs `scope` with at most `amount` gas: whatever it leaves unused goes
    /// back to this meter, on every exit path.
    pub fn with_gas<R, E>(
        &mut self,
        amount: u64,
        scope: impl FnOnce(&mut Self) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<OutOfGas>,
    {
        let mut budget = SubBudget::enter(self, amount)?;
        scope(&mut *budget)
    }
}

impl AsMut<GasMeter> for GasMeter {
    fn as_mut(&mut self) -> &mut GasMeter {
        self
    }
}

/// Guard that restricts the meter of `T` to a slice of its remaining gas.
///
/// On drop (including during unwinding) the meter gets back the gas it had
/// outside the slice, plus whatever the slice did not use.
pub struct SubBudget<'a, T: AsMut<GasMeter>> {
    owner: &'a mut T,
    outside: u64,
}

impl<'a, T: AsMut<GasMeter>> SubBudget<'a, T> {
    pub fn enter(owner: &'a mut T, amount: u64) -> Result<Self, OutOfGas> {
        let meter = owner.as_mut();
        if meter.unlimited {
            return Ok(Self { owner, outside: 0 });
        }
        if amount > meter.remaining {
            return Err(OutOfGas);
        }
        let outside = meter.remaining - amount;
        meter.remaining = amount;
        Ok(Self { owner, outside })
    }
}

impl<T: AsMut<GasMeter>> Deref for SubBudget<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.owner
    }
}

impl<T: AsMut<GasMeter>> DerefMut for SubBudget<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.owner
    }
}

impl<T: AsMut<GasMeter>> Drop for SubBudget<'_, T> {
    fn drop(&mut self) {
        let meter = self.owner.as_mut();
        if !meter.unlimited {
            meter.remaining += self.outside;
        }
    }
}

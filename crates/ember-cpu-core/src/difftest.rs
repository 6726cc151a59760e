/// A pending differential-test opt-out, drained by the driver after each
/// instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffSkip {
    /// Don't compare against the reference for this instruction; copy the
    /// DUT state into the reference instead.
    pub skip_ref: bool,
    /// Let the reference run this many extra steps before the next compare.
    pub ref_steps: u32,
    /// Exempt this many architectural-state fields from the next compare.
    pub state_fields: u32,
}

/// The core -> differential-test boundary.
///
/// Handlers for unimplemented or partially-modeled instructions post a skip
/// request here; the cross-checking harness consumes it via [`take`]. This
/// is an opt-out signal only; no data flows back into execution.
///
/// [`take`]: DifftestControl::take
#[derive(Debug, Default)]
pub struct DifftestControl {
    pending: DiffSkip,
}

impl DifftestControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn skip_ref(&mut self) {
        tracing::trace!("difftest: skip reference compare");
        self.pending.skip_ref = true;
    }

    pub(crate) fn skip_dut(&mut self, ref_steps: u32, state_fields: u32) {
        tracing::trace!(ref_steps, state_fields, "difftest: skip DUT compare");
        self.pending.ref_steps += ref_steps;
        self.pending.state_fields += state_fields;
    }

    /// Drain the pending request (driver side).
    pub fn take(&mut self) -> DiffSkip {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn pending(&self) -> DiffSkip {
        self.pending
    }
}

use thiserror::Error;

/// A guest-triggerable architectural fault.
///
/// Distinct from [`Fault::Contract`]/[`Fault::Unimplemented`]: the correct
/// architectural response is a guest-visible trap through the IDT. Interrupt
/// delivery is not modeled yet, so the driver currently aborts on these too,
/// but the type keeps the category recoverable once it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Exception {
    #[error("divide error (#DE)")]
    DivideError,
    #[error("memory access fault at 0x{addr:08x}")]
    MemoryFault { addr: u32 },
}

impl Exception {
    /// Architectural exception vector.
    #[must_use]
    pub const fn vector(self) -> u8 {
        match self {
            Exception::DivideError => 0,
            Exception::MemoryFault { .. } => 13,
        }
    }
}

/// An internal-consistency violation of the decoder -> core contract.
///
/// These are programming errors, not guest behavior; they abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("write through an immediate operand")]
    WriteToImmediate,
    #[error("missing {slot} operand for `{mnemonic}`")]
    MissingOperand {
        mnemonic: &'static str,
        slot: &'static str,
    },
    #[error("`{mnemonic}` requires a memory operand")]
    ExpectedMemoryOperand { mnemonic: &'static str },
}

/// The single fatal-fault channel from the core to the driver/debugger.
///
/// Every error path out of a handler names the offending condition; the core
/// never silently continues after any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("guest fault: {0}")]
    Guest(#[from] Exception),
    #[error("unimplemented instruction: `{0}`")]
    Unimplemented(&'static str),
    #[error("decode contract violated: {0}")]
    Contract(#[from] ContractViolation),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors() {
        assert_eq!(Exception::DivideError.vector(), 0);
        assert_eq!(Exception::MemoryFault { addr: 0 }.vector(), 13);
    }

    #[test]
    fn diagnostics_name_the_condition() {
        let f = Fault::Unimplemented("iret");
        assert_eq!(f.to_string(), "unimplemented instruction: `iret`");

        let f = Fault::from(ContractViolation::WriteToImmediate);
        assert!(f.to_string().contains("immediate operand"));

        let f = Fault::from(Exception::DivideError);
        assert!(f.to_string().contains("#DE"));
    }
}

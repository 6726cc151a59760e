#![forbid(unsafe_code)]

//! Execution core of the Ember i386-subset emulator.
//!
//! The crate API is centered around [`state::CpuState`] (the architectural
//! register file, flags, and privileged registers) and [`interp::Executor`],
//! which applies one decoded instruction's full architectural effect per
//! call. The fetch/decode driver lives outside this crate: it builds an
//! [`interp::DecodedInst`] out of [`ember_x86`] operand descriptors, invokes
//! the executor, and owns the instruction pointer.
//!
//! Instruction handlers reach the machine exclusively through the RTL
//! primitive layer in [`rtl`]; the memory/port boundary is the [`mem::CpuBus`]
//! trait, the trace boundary is [`trace::TraceSink`], and differential-test
//! skip requests flow through [`difftest::DifftestControl`].

pub mod difftest;
pub mod exception;
pub mod interp;
pub mod mem;
pub mod rtl;
pub mod state;
pub mod trace;

pub use difftest::{DiffSkip, DifftestControl};
pub use exception::{ContractViolation, Exception, Fault};
pub use interp::{DecodedInst, ExecConfig, Executor, Op};
pub use mem::{CpuBus, FlatTestBus};
pub use state::{CpuState, DescriptorTableReg, Eflags};
pub use trace::{NullTrace, RecordingTrace, TraceSink};

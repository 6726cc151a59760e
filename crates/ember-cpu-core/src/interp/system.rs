//! System/privileged and port-I/O handlers.
//!
//! Control-register moves, software interrupts, and `iret` are deliberate
//! gaps in the modeled instruction set: they abort emulation with a named
//! diagnostic rather than silently desynchronizing architectural state.

use ember_x86::{Operand, Width};

use crate::exception::{ContractViolation, Fault};
use crate::mem::CpuBus;
use crate::trace::TraceSink;

use super::Exec;

/// Load IDTR from two adjacent memory fields: the 2-byte limit at the
/// operand address, the 4-byte base at +2.
pub(crate) fn lidt<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    if !dest.is_memory() {
        return Err(ContractViolation::ExpectedMemoryOperand { mnemonic: "lidt" }.into());
    }

    let limit = ctx.rtl.read_mem(dest.addr, Width::W2)?;
    let base = ctx.rtl.read_mem(dest.addr.wrapping_add(2), Width::W4)?;
    ctx.rtl.set_idtr(base, limit as u16);

    ctx.trace1("lidt", dest);
    Ok(())
}

pub(crate) fn mov_to_cr<B: CpuBus, T: TraceSink>(_ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    Err(Fault::Unimplemented("mov-to-cr"))
}

pub(crate) fn mov_from_cr<B: CpuBus, T: TraceSink>(ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    // The reference model may shadow control registers we don't; don't
    // compare this instruction.
    ctx.difftest.skip_ref();
    Err(Fault::Unimplemented("mov-from-cr"))
}

pub(crate) fn int<B: CpuBus, T: TraceSink>(ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    // A delivered interrupt would diverge from the reference by one step and
    // two state fields until delivery is modeled.
    ctx.difftest.skip_dut(1, 2);
    Err(Fault::Unimplemented("int"))
}

pub(crate) fn iret<B: CpuBus, T: TraceSink>(_ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    Err(Fault::Unimplemented("iret"))
}

/// Port read, dispatched on the port operand's width, written back through
/// the destination descriptor.
pub(crate) fn in_<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &mut Operand,
    src: &Operand,
) -> Result<(), Fault> {
    dest.value = ctx.rtl.io_read(src.value as u16, src.width)?;
    ctx.rtl.operand_write(dest, dest.value)?;

    ctx.trace2("in", dest, src);
    Ok(())
}

/// Port write. Always issued as the 1-byte form regardless of the declared
/// width.
// TODO: switch to width dispatch like `in_` once wide port writes have been
// cross-checked against the reference model.
pub(crate) fn out<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    ctx.rtl.io_write(dest.value as u16, Width::W1, src.value)?;

    ctx.trace2("out", dest, src);
    Ok(())
}

//! Data-movement and stack handlers.

use ember_x86::{Operand, Register, Width};

use crate::exception::Fault;
use crate::mem::CpuBus;
use crate::rtl;
use crate::trace::TraceSink;

use super::Exec;

pub(crate) fn mov<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    ctx.rtl.operand_write(dest, src.value)?;
    ctx.trace2("mov", dest, src);
    Ok(())
}

/// `lea` writes the computed address, never the memory contents; unmapped
/// backing memory is irrelevant here.
pub(crate) fn lea<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    ctx.rtl.operand_write(dest, src.addr)?;
    ctx.trace2("lea", dest, src);
    Ok(())
}

pub(crate) fn push<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    ctx.rtl.push(dest.value)?;
    // Redundant write-back of the operand's own (pre-push) value. When the
    // operand is ESP itself this deliberately restores the pointer the push
    // just adjusted; see DESIGN.md for the cross-check note.
    if !dest.is_immediate() {
        ctx.rtl.operand_write(dest, dest.value)?;
    }

    ctx.trace1("push", dest);
    Ok(())
}

pub(crate) fn pop<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &mut Operand,
) -> Result<(), Fault> {
    dest.value = ctx.rtl.pop()?;
    // An immediate destination fails the write-back contract here.
    ctx.rtl.operand_write(dest, dest.value)?;

    ctx.trace1("pop", dest);
    Ok(())
}

/// ESP <- EBP, then pop into EBP. The pop must read from the just-restored
/// stack pointer, so the order is the observable contract.
pub(crate) fn leave<B: CpuBus, T: TraceSink>(ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    let ebp = ctx.rtl.load_reg(Register::EBP);
    ctx.rtl.store_reg(Register::ESP, ebp);
    let val = ctx.rtl.pop()?;
    ctx.rtl.store_reg(Register::EBP, val);

    ctx.trace0("leave");
    Ok(())
}

/// Replicate the accumulator's sign into the adjacent wide register: `cwd`
/// fills DX (EDX's upper half untouched) under a 16-bit operand size, `cltd`
/// fills all of EDX otherwise.
pub(crate) fn cltd<B: CpuBus, T: TraceSink>(ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    if ctx.osize16 {
        let fill = if rtl::msb(ctx.rtl.load_reg(Register::AX), Width::W2) {
            0xFFFF
        } else {
            0
        };
        ctx.rtl.store_reg(Register::DX, fill);
    } else {
        let fill = if rtl::msb(ctx.rtl.load_reg(Register::EAX), Width::W4) {
            0xFFFF_FFFF
        } else {
            0
        };
        ctx.rtl.store_reg(Register::EDX, fill);
    }

    ctx.trace0(if ctx.osize16 { "cwtd" } else { "cltd" });
    Ok(())
}

/// Widen the accumulator in place: `cbtw` (AL -> AX) under a 16-bit operand
/// size, `cwtl` (AX -> EAX) otherwise.
pub(crate) fn cwtl<B: CpuBus, T: TraceSink>(ctx: &mut Exec<'_, B, T>) -> Result<(), Fault> {
    if ctx.osize16 {
        let al = ctx.rtl.load_reg(Register::AL);
        ctx.rtl.store_reg(Register::AX, rtl::sext(al, Width::W1));
    } else {
        let ax = ctx.rtl.load_reg(Register::AX);
        ctx.rtl.store_reg(Register::EAX, rtl::sext(ax, Width::W2));
    }

    ctx.trace0(if ctx.osize16 { "cbtw" } else { "cwtl" });
    Ok(())
}

/// The destination width follows the operand-size mode; a 4-byte source is
/// narrowed to its low word before extending.
fn extension_source(dest: &mut Operand, src: &Operand, osize16: bool) -> (u32, Width) {
    dest.width = if osize16 { Width::W2 } else { Width::W4 };
    if src.width == Width::W4 {
        (src.value & 0xFFFF, Width::W2)
    } else {
        (src.value, src.width)
    }
}

pub(crate) fn movsx<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &mut Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let (val, width) = extension_source(dest, src, ctx.osize16);
    ctx.rtl.operand_write(dest, rtl::sext(val, width))?;

    ctx.trace2("movsx", dest, src);
    Ok(())
}

pub(crate) fn movzx<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &mut Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let (val, width) = extension_source(dest, src, ctx.osize16);
    ctx.rtl.operand_write(dest, rtl::zext(val, width))?;

    ctx.trace2("movzx", dest, src);
    Ok(())
}

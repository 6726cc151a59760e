//! Bitwise and shift handlers. Logical ops clear CF and OF and derive ZF/SF
//! from the masked result; shifts additionally capture the last bit shifted
//! out in CF and leave flags untouched for a zero count.

use ember_x86::Operand;

use crate::exception::Fault;
use crate::mem::CpuBus;
use crate::rtl;
use crate::trace::TraceSink;

use super::Exec;

fn bitwise<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    mnemonic: &str,
    dest: &Operand,
    src: &Operand,
    result: u32,
    write_back: bool,
) -> Result<(), Fault> {
    if write_back {
        ctx.rtl.operand_write(dest, result)?;
    }
    ctx.rtl.update_zf_sf(result, dest.width);
    ctx.rtl.set_cf(false);
    ctx.rtl.set_of(false);

    ctx.trace2(mnemonic, dest, src);
    Ok(())
}

pub(crate) fn and<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let result = rtl::and(dest.value, src.value);
    bitwise(ctx, "and", dest, src, result, true)
}

pub(crate) fn or<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let result = rtl::or(dest.value, src.value);
    bitwise(ctx, "or", dest, src, result, true)
}

pub(crate) fn xor<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let result = rtl::xor(dest.value, src.value);
    bitwise(ctx, "xor", dest, src, result, true)
}

/// `and` without the write-back.
pub(crate) fn test<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let result = rtl::and(dest.value, src.value);
    bitwise(ctx, "test", dest, src, result, false)
}

/// `not` affects no flags.
pub(crate) fn not<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    ctx.rtl.operand_write(dest, rtl::not(dest.value))?;
    ctx.trace1("not", dest);
    Ok(())
}

/// Shift counts are masked to 5 bits as on hardware.
fn shift_count(src: &Operand) -> u32 {
    src.value & 0x1F
}

pub(crate) fn shl<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let count = shift_count(src);
    if count == 0 {
        ctx.trace2("shl", dest, src);
        return Ok(());
    }

    let val = rtl::mask(dest.value, dest.width);
    let result = rtl::shl(val, count);
    ctx.rtl.operand_write(dest, result)?;

    ctx.rtl.update_zf_sf(result, dest.width);
    let out_bit = dest.width.bits().checked_sub(count);
    ctx.rtl
        .set_cf(out_bit.is_some_and(|b| (val >> b) & 1 != 0));
    ctx.rtl.set_of(false);

    ctx.trace2("shl", dest, src);
    Ok(())
}

pub(crate) fn shr<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let count = shift_count(src);
    if count == 0 {
        ctx.trace2("shr", dest, src);
        return Ok(());
    }

    let val = rtl::mask(dest.value, dest.width);
    let result = rtl::shr(val, count);
    ctx.rtl.operand_write(dest, result)?;

    ctx.rtl.update_zf_sf(result, dest.width);
    ctx.rtl.set_cf(rtl::shr(val, count - 1) & 1 != 0);
    ctx.rtl.set_of(false);

    ctx.trace2("shr", dest, src);
    Ok(())
}

pub(crate) fn sar<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let count = shift_count(src);
    if count == 0 {
        ctx.trace2("sar", dest, src);
        return Ok(());
    }

    // Sign-extend first so the replicated sign bits shift in from the top.
    let val = rtl::sext(dest.value, dest.width);
    let result = ((val as i32) >> count.min(31)) as u32;
    ctx.rtl.operand_write(dest, result)?;

    ctx.rtl.update_zf_sf(result, dest.width);
    ctx.rtl
        .set_cf(((val as i32) >> (count - 1).min(31)) & 1 != 0);
    ctx.rtl.set_of(false);

    ctx.trace2("sar", dest, src);
    Ok(())
}

//! Arithmetic handlers: add/sub/cmp, inc/dec/neg, adc/sbb with carry
//! threading, and the width-routed wide multiply/divide family.
//!
//! Masking order is the load-bearing part of every flag sequence here:
//! ZF/SF and OF are derived from the width-masked result, while the carry
//! predicates compare against the unmasked intermediate values so that
//! wraparound below native width is still observable.

use ember_x86::{Operand, Register, Width};

use crate::exception::{Exception, Fault};
use crate::mem::CpuBus;
use crate::rtl;
use crate::trace::TraceSink;

use super::Exec;

/// The accumulator alias at a given operand width.
const fn accumulator(width: Width) -> Register {
    match width {
        Width::W1 => Register::AL,
        Width::W2 => Register::AX,
        Width::W4 => Register::EAX,
    }
}

pub(crate) fn add<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let raw = rtl::add(dest.value, src.value);
    ctx.rtl.operand_write(dest, raw)?;

    let masked = rtl::mask(raw, dest.width);
    ctx.rtl.update_zf_sf(masked, dest.width);
    ctx.rtl.set_cf(rtl::is_add_carry(masked, dest.value));
    ctx.rtl
        .set_of(rtl::is_add_overflow(masked, dest.value, src.value, dest.width));

    ctx.trace2("add", dest, src);
    Ok(())
}

pub(crate) fn sub<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let raw = rtl::sub(dest.value, src.value);
    ctx.rtl.operand_write(dest, raw)?;

    let masked = rtl::mask(raw, dest.width);
    ctx.rtl.update_zf_sf(masked, dest.width);
    ctx.rtl.set_cf(rtl::is_sub_carry(masked, dest.value));
    ctx.rtl
        .set_of(rtl::is_sub_overflow(masked, dest.value, src.value, dest.width));

    ctx.trace2("sub", dest, src);
    Ok(())
}

/// `sub` without the write-back.
pub(crate) fn cmp<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let masked = rtl::mask(rtl::sub(dest.value, src.value), dest.width);
    ctx.rtl.update_zf_sf(masked, dest.width);
    ctx.rtl.set_cf(rtl::is_sub_carry(masked, dest.value));
    ctx.rtl
        .set_of(rtl::is_sub_overflow(masked, dest.value, src.value, dest.width));

    ctx.trace2("cmp", dest, src);
    Ok(())
}

pub(crate) fn inc<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let result = rtl::add(dest.value, 1);
    let wrapped = rtl::is_add_carry(result, dest.value);
    ctx.rtl.operand_write(dest, result)?;

    ctx.rtl.update_zf_sf(result, dest.width);
    ctx.rtl.set_cf(wrapped);

    // Overflow against a fixed +1 source: the operands agree in sign and the
    // result's sign flips.
    let of = rtl::and(rtl::not(rtl::xor(dest.value, 1)), rtl::xor(dest.value, result));
    ctx.rtl.set_of(rtl::msb(of, dest.width));

    ctx.trace1("inc", dest);
    Ok(())
}

pub(crate) fn dec<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let result = rtl::sub(dest.value, 1);
    let wrapped = rtl::is_sub_carry(result, dest.value);
    ctx.rtl.operand_write(dest, result)?;

    ctx.rtl.update_zf_sf(result, dest.width);
    ctx.rtl.set_cf(wrapped);
    ctx.rtl
        .set_of(rtl::is_sub_overflow(result, dest.value, 1, dest.width));

    ctx.trace1("dec", dest);
    Ok(())
}

pub(crate) fn neg<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    // Negating zero is the only case that cannot borrow.
    ctx.rtl.set_cf(rtl::mask(dest.value, dest.width) != 0);
    let result = rtl::sub(0, dest.value);
    ctx.rtl.operand_write(dest, result)?;

    ctx.trace1("neg", dest);
    Ok(())
}

pub(crate) fn adc<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let cf_in = ctx.rtl.get_cf() as u32;
    let sum = rtl::add(dest.value, src.value);
    let total = rtl::add(sum, cf_in);
    ctx.rtl.operand_write(dest, total)?;

    let masked = rtl::mask(total, dest.width);
    ctx.rtl.update_zf_sf(masked, dest.width);

    // Either sub-step (dest + src, then + CF) can produce the carry.
    let carry = rtl::is_add_carry(masked, sum) || rtl::is_add_carry(sum, dest.value);
    ctx.rtl.set_cf(carry);
    ctx.rtl
        .set_of(rtl::is_add_overflow(masked, dest.value, src.value, dest.width));

    ctx.trace2("adc", dest, src);
    Ok(())
}

pub(crate) fn sbb<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let cf_in = ctx.rtl.get_cf() as u32;
    let diff = rtl::sub(dest.value, src.value);
    let total = rtl::sub(diff, cf_in);
    ctx.rtl.operand_write(dest, total)?;

    let masked = rtl::mask(total, dest.width);
    ctx.rtl.update_zf_sf(masked, dest.width);

    // Either sub-step (dest - src, then - CF) can borrow.
    let borrow = rtl::is_sub_carry(masked, diff) || rtl::is_sub_carry(diff, dest.value);
    ctx.rtl.set_cf(borrow);
    ctx.rtl
        .set_of(rtl::is_sub_overflow(masked, dest.value, src.value, dest.width));

    ctx.trace2("sbb", dest, src);
    Ok(())
}

pub(crate) fn mul<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let acc = ctx.rtl.load_reg(accumulator(dest.width));
    let lo = rtl::mul_lo(dest.value, acc);

    match dest.width {
        // An 8x8 product fits entirely in AX.
        Width::W1 => ctx.rtl.store_reg(Register::AX, lo),
        Width::W2 => {
            ctx.rtl.store_reg(Register::AX, lo);
            ctx.rtl.store_reg(Register::DX, rtl::shr(lo, 16));
        }
        Width::W4 => {
            ctx.rtl.store_reg(Register::EDX, rtl::mul_hi(dest.value, acc));
            ctx.rtl.store_reg(Register::EAX, lo);
        }
    }

    ctx.trace1("mul", dest);
    Ok(())
}

/// One-operand `imul`: like `mul` but a signed product.
pub(crate) fn imul1<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let acc = ctx.rtl.load_reg(accumulator(dest.width));
    let lo = rtl::imul_lo(dest.value, acc);

    match dest.width {
        Width::W1 => ctx.rtl.store_reg(Register::AX, lo),
        Width::W2 => {
            ctx.rtl.store_reg(Register::AX, lo);
            ctx.rtl.store_reg(Register::DX, rtl::shr(lo, 16));
        }
        Width::W4 => {
            ctx.rtl.store_reg(Register::EDX, rtl::imul_hi(dest.value, acc));
            ctx.rtl.store_reg(Register::EAX, lo);
        }
    }

    ctx.trace1("imul", dest);
    Ok(())
}

/// Two-operand `imul`: sign-extend both operands, keep only the low half.
/// High-half overflow is architecturally not reported through flags here.
pub(crate) fn imul2<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
) -> Result<(), Fault> {
    let a = rtl::sext(src.value, src.width);
    let b = rtl::sext(dest.value, dest.width);
    ctx.rtl.operand_write(dest, rtl::imul_lo(b, a))?;

    ctx.trace2("imul", dest, src);
    Ok(())
}

/// Three-operand `imul`: both explicit sources at the first source's width.
pub(crate) fn imul3<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
    src: &Operand,
    src2: &Operand,
) -> Result<(), Fault> {
    let a = rtl::sext(src.value, src.width);
    let b = rtl::sext(src2.value, src.width);
    ctx.rtl.operand_write(dest, rtl::imul_lo(b, a))?;

    ctx.trace3("imul", dest, src, src2);
    Ok(())
}

pub(crate) fn div<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let divisor = rtl::mask(dest.value, dest.width);
    // Guest-visible fault; the dividend registers must stay untouched.
    if divisor == 0 {
        return Err(Exception::DivideError.into());
    }

    match dest.width {
        Width::W1 => {
            let dividend = ctx.rtl.load_reg(Register::AX) as u64;
            ctx.rtl.store_reg(Register::AL, rtl::div_q(dividend, divisor));
            ctx.rtl.store_reg(Register::AH, rtl::div_r(dividend, divisor));
        }
        Width::W2 => {
            let dividend = ((ctx.rtl.load_reg(Register::DX) as u64) << 16)
                | ctx.rtl.load_reg(Register::AX) as u64;
            ctx.rtl.store_reg(Register::AX, rtl::div_q(dividend, divisor));
            ctx.rtl.store_reg(Register::DX, rtl::div_r(dividend, divisor));
        }
        Width::W4 => {
            let dividend = ((ctx.rtl.load_reg(Register::EDX) as u64) << 32)
                | ctx.rtl.load_reg(Register::EAX) as u64;
            ctx.rtl.store_reg(Register::EAX, rtl::div_q(dividend, divisor));
            ctx.rtl.store_reg(Register::EDX, rtl::div_r(dividend, divisor));
        }
    }

    ctx.trace1("div", dest);
    Ok(())
}

pub(crate) fn idiv<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    dest: &Operand,
) -> Result<(), Fault> {
    let divisor = rtl::sext(dest.value, dest.width) as i32;
    if divisor == 0 {
        return Err(Exception::DivideError.into());
    }

    match dest.width {
        Width::W1 => {
            let dividend = ctx.rtl.load_reg(Register::AX) as u16 as i16 as i64;
            ctx.rtl.store_reg(Register::AL, rtl::idiv_q(dividend, divisor));
            ctx.rtl.store_reg(Register::AH, rtl::idiv_r(dividend, divisor));
        }
        Width::W2 => {
            let dividend = (((ctx.rtl.load_reg(Register::DX) << 16)
                | ctx.rtl.load_reg(Register::AX)) as i32) as i64;
            ctx.rtl.store_reg(Register::AX, rtl::idiv_q(dividend, divisor));
            ctx.rtl.store_reg(Register::DX, rtl::idiv_r(dividend, divisor));
        }
        Width::W4 => {
            let dividend = (((ctx.rtl.load_reg(Register::EDX) as u64) << 32)
                | ctx.rtl.load_reg(Register::EAX) as u64) as i64;
            ctx.rtl.store_reg(Register::EAX, rtl::idiv_q(dividend, divisor));
            ctx.rtl.store_reg(Register::EDX, rtl::idiv_r(dividend, divisor));
        }
    }

    ctx.trace1("idiv", dest);
    Ok(())
}

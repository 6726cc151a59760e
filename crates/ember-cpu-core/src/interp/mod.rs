//! Instruction semantic handlers and the per-instruction executor.
//!
//! The driver decodes one instruction into a [`DecodedInst`] and calls
//! [`Executor::execute`]; the matching handler consumes the operand
//! descriptors, drives the RTL layer, and returns having fully applied the
//! instruction's architectural effect: register/flag/memory updates and any
//! stack-pointer side effects, but never the instruction pointer.

mod arith;
mod data_mov;
mod logic;
mod system;

use ember_x86::Operand;

use crate::difftest::DifftestControl;
use crate::exception::{ContractViolation, Fault};
use crate::mem::CpuBus;
use crate::rtl::Rtl;
use crate::state::CpuState;
use crate::trace::{NullTrace, TraceSink};

/// Handler identity, selected by the decoder: one variant per
/// mnemonic + form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // arithmetic
    Add,
    Sub,
    Cmp,
    Inc,
    Dec,
    Neg,
    Adc,
    Sbb,
    Mul,
    Imul1,
    Imul2,
    Imul3,
    Div,
    Idiv,
    // logic / shifts
    And,
    Or,
    Xor,
    Test,
    Not,
    Shl,
    Shr,
    Sar,
    // data movement / stack
    Mov,
    Push,
    Pop,
    Pusha,
    Popa,
    Lea,
    Movsx,
    Movzx,
    Leave,
    Cltd,
    Cwtl,
    // system / privileged
    Lidt,
    MovToCr,
    MovFromCr,
    Int,
    Iret,
    In,
    Out,
}

impl Op {
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Cmp => "cmp",
            Op::Inc => "inc",
            Op::Dec => "dec",
            Op::Neg => "neg",
            Op::Adc => "adc",
            Op::Sbb => "sbb",
            Op::Mul => "mul",
            Op::Imul1 | Op::Imul2 | Op::Imul3 => "imul",
            Op::Div => "div",
            Op::Idiv => "idiv",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Test => "test",
            Op::Not => "not",
            Op::Shl => "shl",
            Op::Shr => "shr",
            Op::Sar => "sar",
            Op::Mov => "mov",
            Op::Push => "push",
            Op::Pop => "pop",
            Op::Pusha => "pusha",
            Op::Popa => "popa",
            Op::Lea => "lea",
            Op::Movsx => "movsx",
            Op::Movzx => "movzx",
            Op::Leave => "leave",
            Op::Cltd => "cltd",
            Op::Cwtl => "cwtl",
            Op::Lidt => "lidt",
            Op::MovToCr => "mov-to-cr",
            Op::MovFromCr => "mov-from-cr",
            Op::Int => "int",
            Op::Iret => "iret",
            Op::In => "in",
            Op::Out => "out",
        }
    }
}

/// One decoded instruction as handed over by the (external) decoder: the
/// handler identity, up to three operand descriptors, and the operand-size
/// mode in effect. Descriptors may be mutated by the handler; nothing here
/// survives the instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedInst {
    pub op: Op,
    pub dest: Option<Operand>,
    pub src: Option<Operand>,
    pub src2: Option<Operand>,
    /// True when a 16-bit operand-size override is in effect.
    pub osize16: bool,
}

impl DecodedInst {
    #[must_use]
    pub fn nullary(op: Op) -> Self {
        Self {
            op,
            dest: None,
            src: None,
            src2: None,
            osize16: false,
        }
    }

    #[must_use]
    pub fn unary(op: Op, dest: Operand) -> Self {
        Self {
            dest: Some(dest),
            ..Self::nullary(op)
        }
    }

    #[must_use]
    pub fn binary(op: Op, dest: Operand, src: Operand) -> Self {
        Self {
            dest: Some(dest),
            src: Some(src),
            ..Self::nullary(op)
        }
    }

    #[must_use]
    pub fn ternary(op: Op, dest: Operand, src: Operand, src2: Operand) -> Self {
        Self {
            dest: Some(dest),
            src: Some(src),
            src2: Some(src2),
            ..Self::nullary(op)
        }
    }

    #[must_use]
    pub fn with_osize16(mut self, osize16: bool) -> Self {
        self.osize16 = osize16;
        self
    }
}

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Render each executed instruction to the trace sink.
    pub trace: bool,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self { trace: true }
    }
}

/// Applies one instruction at a time against borrowed architectural state.
///
/// Owns the collaborator channels that outlive a single instruction: the
/// trace sink and the differential-test control.
#[derive(Debug)]
pub struct Executor<T: TraceSink = NullTrace> {
    cfg: ExecConfig,
    trace: T,
    difftest: DifftestControl,
}

impl Executor<NullTrace> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_trace(ExecConfig::default(), NullTrace)
    }
}

impl Default for Executor<NullTrace> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TraceSink> Executor<T> {
    #[must_use]
    pub fn with_trace(cfg: ExecConfig, trace: T) -> Self {
        Self {
            cfg,
            trace,
            difftest: DifftestControl::new(),
        }
    }

    /// Apply `inst`'s full architectural effect to `state`/`bus`.
    ///
    /// On error nothing is rolled back: every [`Fault`] is fatal to the run
    /// today (see the error taxonomy on [`Fault`]), but the diagnostic
    /// always names the offending condition.
    pub fn execute<B: CpuBus>(
        &mut self,
        state: &mut CpuState,
        bus: &mut B,
        inst: &mut DecodedInst,
    ) -> Result<(), Fault> {
        let op = inst.op;
        let mut ctx = Exec {
            rtl: Rtl::new(state, bus),
            trace: &mut self.trace,
            difftest: &mut self.difftest,
            cfg: &self.cfg,
            osize16: inst.osize16,
        };
        let result = dispatch(
            &mut ctx,
            op,
            inst.dest.as_mut(),
            inst.src.as_mut(),
            inst.src2.as_mut(),
        );
        if let Err(Fault::Unimplemented(mnemonic)) = &result {
            tracing::warn!(mnemonic, "aborting emulation: unimplemented instruction");
        }
        result
    }

    /// The differential-test boundary; the driver drains pending skip
    /// requests from here after each instruction.
    pub fn difftest(&mut self) -> &mut DifftestControl {
        &mut self.difftest
    }

    #[must_use]
    pub fn trace(&self) -> &T {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut T {
        &mut self.trace
    }
}

/// Per-invocation handler context: the RTL layer plus the write-only
/// collaborator channels.
pub(crate) struct Exec<'a, B: CpuBus, T: TraceSink> {
    pub rtl: Rtl<'a, B>,
    trace: &'a mut T,
    pub difftest: &'a mut DifftestControl,
    cfg: &'a ExecConfig,
    pub osize16: bool,
}

impl<B: CpuBus, T: TraceSink> Exec<'_, B, T> {
    pub fn trace0(&mut self, mnemonic: &str) {
        if self.cfg.trace {
            self.trace.record(mnemonic);
        }
    }

    pub fn trace1(&mut self, mnemonic: &str, a: &Operand) {
        if self.cfg.trace {
            self.trace.record(&format!("{mnemonic} {a}"));
        }
    }

    pub fn trace2(&mut self, mnemonic: &str, a: &Operand, b: &Operand) {
        if self.cfg.trace {
            self.trace.record(&format!("{mnemonic} {a}, {b}"));
        }
    }

    pub fn trace3(&mut self, mnemonic: &str, a: &Operand, b: &Operand, c: &Operand) {
        if self.cfg.trace {
            self.trace.record(&format!("{mnemonic} {a}, {b}, {c}"));
        }
    }
}

fn require<'o>(
    op: Op,
    slot: &'static str,
    operand: Option<&'o mut Operand>,
) -> Result<&'o mut Operand, Fault> {
    operand.ok_or_else(|| {
        ContractViolation::MissingOperand {
            mnemonic: op.mnemonic(),
            slot,
        }
        .into()
    })
}

fn dispatch<B: CpuBus, T: TraceSink>(
    ctx: &mut Exec<'_, B, T>,
    op: Op,
    dest: Option<&mut Operand>,
    src: Option<&mut Operand>,
    src2: Option<&mut Operand>,
) -> Result<(), Fault> {
    match op {
        Op::Add => arith::add(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Sub => arith::sub(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Cmp => arith::cmp(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Inc => arith::inc(ctx, require(op, "destination", dest)?),
        Op::Dec => arith::dec(ctx, require(op, "destination", dest)?),
        Op::Neg => arith::neg(ctx, require(op, "destination", dest)?),
        Op::Adc => arith::adc(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Sbb => arith::sbb(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Mul => arith::mul(ctx, require(op, "destination", dest)?),
        Op::Imul1 => arith::imul1(ctx, require(op, "destination", dest)?),
        Op::Imul2 => {
            arith::imul2(ctx, require(op, "destination", dest)?, require(op, "source", src)?)
        }
        Op::Imul3 => arith::imul3(
            ctx,
            require(op, "destination", dest)?,
            require(op, "source", src)?,
            require(op, "second source", src2)?,
        ),
        Op::Div => arith::div(ctx, require(op, "destination", dest)?),
        Op::Idiv => arith::idiv(ctx, require(op, "destination", dest)?),

        Op::And => logic::and(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Or => logic::or(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Xor => logic::xor(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Test => {
            logic::test(ctx, require(op, "destination", dest)?, require(op, "source", src)?)
        }
        Op::Not => logic::not(ctx, require(op, "destination", dest)?),
        Op::Shl => logic::shl(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Shr => logic::shr(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Sar => logic::sar(ctx, require(op, "destination", dest)?, require(op, "source", src)?),

        Op::Mov => data_mov::mov(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Push => data_mov::push(ctx, require(op, "destination", dest)?),
        Op::Pop => data_mov::pop(ctx, require(op, "destination", dest)?),
        Op::Pusha => Err(Fault::Unimplemented("pusha")),
        Op::Popa => Err(Fault::Unimplemented("popa")),
        Op::Lea => data_mov::lea(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Movsx => {
            data_mov::movsx(ctx, require(op, "destination", dest)?, require(op, "source", src)?)
        }
        Op::Movzx => {
            data_mov::movzx(ctx, require(op, "destination", dest)?, require(op, "source", src)?)
        }
        Op::Leave => data_mov::leave(ctx),
        Op::Cltd => data_mov::cltd(ctx),
        Op::Cwtl => data_mov::cwtl(ctx),

        Op::Lidt => system::lidt(ctx, require(op, "destination", dest)?),
        Op::MovToCr => system::mov_to_cr(ctx),
        Op::MovFromCr => system::mov_from_cr(ctx),
        Op::Int => system::int(ctx),
        Op::Iret => system::iret(ctx),
        Op::In => system::in_(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
        Op::Out => system::out(ctx, require(op, "destination", dest)?, require(op, "source", src)?),
    }
}

use ember_cpu_core::{
    CpuState, DecodedInst, Eflags, Exception, Executor, Fault, FlatTestBus, Op,
};
use ember_x86::{Operand, Register, Width};

const BUS_SIZE: usize = 0x1000;

fn setup() -> (CpuState, FlatTestBus, Executor) {
    (CpuState::new(), FlatTestBus::new(BUS_SIZE), Executor::new())
}

macro_rules! run {
    ($state:expr, $bus:expr, $exec:expr, $inst:expr $(,)?) => {{
        let mut inst = $inst;
        $exec.execute($state, $bus, &mut inst)
    }};
}

fn reg_op(state: &CpuState, reg: Register) -> Operand {
    Operand::reg(reg, state.read_reg(reg))
}

#[test]
fn add_then_sub_round_trips_every_width() {
    let cases: &[(Register, u32, u32)] = &[
        (Register::AL, 0x00, 0x00),
        (Register::AL, 0x7F, 0x23),
        (Register::AL, 0xFF, 0x01),
        (Register::CX, 0x8000, 0x8000),
        (Register::CX, 0x1234, 0xFFFF),
        (Register::EBX, 0xFFFF_FFFF, 0x0000_0001),
        (Register::EBX, 0xDEAD_BEEF, 0x1234_5678),
    ];

    for &(reg, dest_val, src_val) in cases {
        let (mut state, mut bus, mut exec) = setup();
        state.write_reg(reg, dest_val);

        let width = reg.width();
        run!(
            &mut state,
            &mut bus,
            &mut exec,
            DecodedInst::binary(Op::Add, reg_op(&state, reg), Operand::imm(src_val, width)),
        )
        .unwrap();
        run!(
            &mut state,
            &mut bus,
            &mut exec,
            DecodedInst::binary(Op::Sub, reg_op(&state, reg), Operand::imm(src_val, width)),
        )
        .unwrap();

        assert_eq!(state.read_reg(reg), dest_val, "{reg} {dest_val:#x}+{src_val:#x}");
        assert_eq!(state.get_flag(Eflags::ZF), dest_val == 0);
    }
}

#[test]
fn add_carry_at_byte_width() {
    // 0xFF + 0x01 = 0x00 with carry: the operands' signs differ, so no
    // signed overflow.
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0xFF);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Add,
            reg_op(&state, Register::AL),
            Operand::imm(0x01, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 0x00);
    assert!(state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::ZF));
    assert!(!state.get_flag(Eflags::OF));
    assert!(!state.get_flag(Eflags::SF));
}

#[test]
fn add_overflow_at_byte_width() {
    // 0x7F + 0x01 = 0x80: positive + positive -> negative, no unsigned wrap.
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x7F);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Add,
            reg_op(&state, Register::AL),
            Operand::imm(0x01, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 0x80);
    assert!(state.get_flag(Eflags::OF));
    assert!(!state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::SF));
}

#[test]
fn sub_borrow_and_overflow() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x00);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Sub,
            reg_op(&state, Register::AL),
            Operand::imm(0x01, Width::W1),
        ),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0xFF);
    assert!(state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::SF));

    // 0x80 - 0x01 = 0x7F: negative - positive -> positive.
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x80);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Sub,
            reg_op(&state, Register::AL),
            Operand::imm(0x01, Width::W1),
        ),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0x7F);
    assert!(state.get_flag(Eflags::OF));
    assert!(!state.get_flag(Eflags::CF));
}

#[test]
fn cmp_updates_flags_without_writing_back() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::ECX, 5);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Cmp,
            reg_op(&state, Register::ECX),
            Operand::imm(5, Width::W4),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::ECX), 5);
    assert!(state.get_flag(Eflags::ZF));
    assert!(!state.get_flag(Eflags::CF));
}

#[test]
fn adc_threads_the_incoming_carry() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0xFF);
    state.set_flag(Eflags::CF, true);

    // 0xFF + 0x00 + CF = 0x00, carry out of the carry sub-step.
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Adc,
            reg_op(&state, Register::AL),
            Operand::imm(0x00, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 0x00);
    assert!(state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::ZF));
}

#[test]
fn adc_carries_from_the_first_sub_step() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x80);
    state.set_flag(Eflags::CF, false);

    // 0x80 + 0x80 = 0x100: carry from dest + src alone.
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Adc,
            reg_op(&state, Register::AL),
            Operand::imm(0x80, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 0x00);
    assert!(state.get_flag(Eflags::CF));
    // -128 + -128 overflows signed 8-bit.
    assert!(state.get_flag(Eflags::OF));
}

#[test]
fn multi_word_add_via_adc() {
    // 0x0000_0001_FFFF_FFFF + 1 across two 32-bit halves.
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, 0xFFFF_FFFF);
    state.write_reg(Register::EDX, 0x0000_0001);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Add,
            reg_op(&state, Register::EAX),
            Operand::imm(1, Width::W4),
        ),
    )
    .unwrap();
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Adc,
            reg_op(&state, Register::EDX),
            Operand::imm(0, Width::W4),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::EAX), 0);
    assert_eq!(state.read_reg(Register::EDX), 2);
}

#[test]
fn sbb_borrows_through_the_carry() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x00);
    state.set_flag(Eflags::CF, true);

    // 0x00 - 0x00 - CF = 0xFF with borrow.
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Sbb,
            reg_op(&state, Register::AL),
            Operand::imm(0x00, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 0xFF);
    assert!(state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::SF));
}

#[test]
fn inc_overflow_and_zero() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x7F);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Inc, reg_op(&state, Register::AL)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0x80);
    assert!(state.get_flag(Eflags::OF));
    assert!(state.get_flag(Eflags::SF));

    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0xFF);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Inc, reg_op(&state, Register::AL)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0x00);
    assert!(state.get_flag(Eflags::ZF));
    assert!(!state.get_flag(Eflags::OF));
}

#[test]
fn inc_wraps_the_full_word() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, 0xFFFF_FFFF);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Inc, reg_op(&state, Register::EAX)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::EAX), 0);
    assert!(state.get_flag(Eflags::CF));
    assert!(state.get_flag(Eflags::ZF));
}

#[test]
fn dec_overflow_and_wraparound() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x80);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Dec, reg_op(&state, Register::AL)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0x7F);
    assert!(state.get_flag(Eflags::OF));

    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EBX, 0);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Dec, reg_op(&state, Register::EBX)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::EBX), 0xFFFF_FFFF);
    assert!(state.get_flag(Eflags::CF));
    assert!(!state.get_flag(Eflags::OF));
}

#[test]
fn neg_sets_carry_iff_nonzero() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x01);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Neg, reg_op(&state, Register::AL)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0xFF);
    assert!(state.get_flag(Eflags::CF));

    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x00);
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Neg, reg_op(&state, Register::AL)),
    )
    .unwrap();
    assert_eq!(state.read_reg(Register::AL), 0x00);
    assert!(!state.get_flag(Eflags::CF));
}

#[test]
fn mul_byte_product_fills_ax() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AL, 0x10);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Mul, Operand::imm(0x10, Width::W1)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AX), 0x0100);
}

#[test]
fn mul_word_product_splits_across_dx_ax() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AX, 0x1234);
    state.write_reg(Register::CX, 0x5678);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Mul, reg_op(&state, Register::CX)),
    )
    .unwrap();

    let product = 0x1234u32 * 0x5678;
    assert_eq!(state.read_reg(Register::AX), product & 0xFFFF);
    assert_eq!(state.read_reg(Register::DX), product >> 16);
}

#[test]
fn mul_dword_product_splits_across_edx_eax() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, 0x8000_0000);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Mul, Operand::imm(4, Width::W4)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::EAX), 0);
    assert_eq!(state.read_reg(Register::EDX), 2);
}

#[test]
fn imul_one_operand_signed_dword() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, (-2i32) as u32);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Imul1, Operand::imm(3, Width::W4)),
    )
    .unwrap();

    // -6 as a 64-bit product: EDX holds the sign extension.
    assert_eq!(state.read_reg(Register::EAX), (-6i32) as u32);
    assert_eq!(state.read_reg(Register::EDX), 0xFFFF_FFFF);
}

#[test]
fn imul_two_operand_sign_extends_narrow_sources() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, 3);

    // Source 0xFF sign-extends to -1 at byte width.
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::binary(
            Op::Imul2,
            reg_op(&state, Register::EAX),
            Operand::imm(0xFF, Width::W1),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::EAX), (-3i32) as u32);
}

#[test]
fn imul_three_operand_writes_low_half_only() {
    let (mut state, mut bus, mut exec) = setup();

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::ternary(
            Op::Imul3,
            reg_op(&state, Register::EDI),
            Operand::imm(0xFFFE, Width::W2), // -2 at word width
            Operand::imm(7, Width::W2),
        ),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::EDI), (-14i32) as u32);
}

#[test]
fn div_byte_quotient_and_remainder() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AX, 100);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Div, Operand::imm(7, Width::W1)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), 14);
    assert_eq!(state.read_reg(Register::AH), 2);
}

#[test]
fn div_word_reads_dx_ax_pair() {
    let (mut state, mut bus, mut exec) = setup();
    // Dividend 0x0001_0000.
    state.write_reg(Register::DX, 1);
    state.write_reg(Register::AX, 0);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Div, Operand::imm(0x10, Width::W2)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AX), 0x1000);
    assert_eq!(state.read_reg(Register::DX), 0);
}

#[test]
fn div_dword_reads_edx_eax_pair() {
    let (mut state, mut bus, mut exec) = setup();
    // Dividend 0x0000_0001_0000_0005.
    state.write_reg(Register::EDX, 1);
    state.write_reg(Register::EAX, 5);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Div, Operand::imm(2, Width::W4)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::EAX), 0x8000_0002);
    assert_eq!(state.read_reg(Register::EDX), 0x0000_0001);
}

#[test]
fn div_by_zero_faults_and_leaves_dividend_alone() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::EAX, 0x1234_5678);
    state.write_reg(Register::EDX, 0x9ABC_DEF0);

    let err = run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Div, Operand::imm(0, Width::W4)),
    )
    .unwrap_err();

    assert_eq!(err, Fault::Guest(Exception::DivideError));
    assert_eq!(state.read_reg(Register::EAX), 0x1234_5678);
    assert_eq!(state.read_reg(Register::EDX), 0x9ABC_DEF0);
}

#[test]
fn idiv_by_zero_faults() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AX, 10);

    let err = run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Idiv, Operand::imm(0, Width::W1)),
    )
    .unwrap_err();

    assert_eq!(err, Fault::Guest(Exception::DivideError));
}

#[test]
fn idiv_signed_rounds_toward_zero() {
    let (mut state, mut bus, mut exec) = setup();
    // Dividend -7 in DX:AX.
    state.write_reg(Register::DX, 0xFFFF);
    state.write_reg(Register::AX, (-7i16) as u16 as u32);

    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Idiv, Operand::imm(2, Width::W2)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AX), (-3i16) as u16 as u32);
    assert_eq!(state.read_reg(Register::DX), (-1i16) as u16 as u32);
}

#[test]
fn idiv_byte_sign_extends_the_divisor() {
    let (mut state, mut bus, mut exec) = setup();
    state.write_reg(Register::AX, 100);

    // Divisor 0xFF is -1 at byte width.
    run!(
        &mut state,
        &mut bus,
        &mut exec,
        DecodedInst::unary(Op::Idiv, Operand::imm(0xFF, Width::W1)),
    )
    .unwrap();

    assert_eq!(state.read_reg(Register::AL), (-100i8) as u8 as u32);
    assert_eq!(state.read_reg(Register::AH), 0);
}

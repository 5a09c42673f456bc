//! End-to-end scenarios driving the whole core through small hand-assembled
//! RV32I programs, each built once from the formats it needs and verified
//! against its architectural exit value.

use tomasulo_core::{Config, Cpu, HALT_INSTRUCTION, MemoryConfig, MemoryImage, PredictorKind};

const OP_IMM: u32 = 0b0010011;
const OP: u32 = 0b0110011;
const LOAD: u32 = 0b0000011;
const STORE: u32 = 0b0100011;
const BRANCH: u32 = 0b1100011;
const JAL: u32 = 0b1101111;
const JALR: u32 = 0b1100111;

fn write_word(image: &mut MemoryImage, addr: u32, word: u32) {
    for i in 0..4u32 {
        image.set_byte(addr + i, (word >> (8 * i)) as u8);
    }
}

fn rtype(opcode: u32, rd: u8, subop: u8, rs1: u8, rs2: u8, variant: bool) -> u32 {
    let funct7 = if variant { 0b0100000u32 } else { 0 };
    opcode
        | (u32::from(rd) << 7)
        | (u32::from(subop) << 12)
        | (u32::from(rs1) << 15)
        | (u32::from(rs2) << 20)
        | (funct7 << 25)
}

fn itype(opcode: u32, rd: u8, subop: u8, rs1: u8, imm: i32) -> u32 {
    let imm_bits = (imm as u32) & 0xFFF;
    opcode | (u32::from(rd) << 7) | (u32::from(subop) << 12) | (u32::from(rs1) << 15) | (imm_bits << 20)
}

fn stype(subop: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm_bits = (imm as u32) & 0xFFF;
    let low = imm_bits & 0x1F;
    let high = (imm_bits >> 5) & 0x7F;
    STORE | (low << 7) | (u32::from(subop) << 12) | (u32::from(rs1) << 15) | (u32::from(rs2) << 20) | (high << 25)
}

fn btype(subop: u8, rs1: u8, rs2: u8, imm: i32) -> u32 {
    let imm_bits = imm as u32;
    let bit11 = (imm_bits >> 11) & 1;
    let bits4_1 = (imm_bits >> 1) & 0xF;
    let bits10_5 = (imm_bits >> 5) & 0x3F;
    let bit12 = (imm_bits >> 12) & 1;
    BRANCH
        | (bit11 << 7)
        | (bits4_1 << 8)
        | (u32::from(subop) << 12)
        | (u32::from(rs1) << 15)
        | (u32::from(rs2) << 20)
        | (bits10_5 << 25)
        | (bit12 << 31)
}

fn jtype(rd: u8, imm: i32) -> u32 {
    let imm_bits = imm as u32;
    let bits19_12 = (imm_bits >> 12) & 0xFF;
    let bit11 = (imm_bits >> 11) & 1;
    let bits10_1 = (imm_bits >> 1) & 0x3FF;
    let bit20 = (imm_bits >> 20) & 1;
    JAL | (u32::from(rd) << 7) | (bits19_12 << 12) | (bit11 << 20) | (bits10_1 << 21) | (bit20 << 31)
}

// Register numbers used across the programs below.
const X0: u8 = 0;
const RA: u8 = 1;
const SP: u8 = 2;
const A0: u8 = 10;
const S0: u8 = 8;
const S1: u8 = 9;
const T0: u8 = 5;
const T1: u8 = 6;

#[test]
fn immediates_add_and_halt() {
    // addi a0, x0, 5; addi a1, x0, 7; add a0, a0, a1; halt
    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, A0, 0b000, X0, 5));
    write_word(&mut image, 4, itype(OP_IMM, 11, 0b000, X0, 7));
    write_word(&mut image, 8, rtype(OP, A0, 0b000, A0, 11, false));
    write_word(&mut image, 12, HALT_INSTRUCTION);

    let mut cpu = Cpu::new(&Config::default(), &image);
    assert_eq!(cpu.run().unwrap(), 12);
}

#[test]
fn recursive_fibonacci_of_ten() {
    // Stack-based recursive fib(n), called once with n=10.
    //
    //   0: addi sp, x0, 0x400
    //   4: addi a0, x0, 10
    //   8: jal  ra, FIB
    //  12: halt                       <- ra lands exactly here after the call
    //
    //  FIB = 16:
    //  16: addi sp, sp, -16
    //  20: sw   ra, 12(sp)
    //  24: sw   s0, 8(sp)
    //  28: sw   s1, 4(sp)
    //  32: addi s0, a0, 0              ; s0 = n
    //  36: addi t0, x0, 2
    //  40: blt  s0, t0, BASE           ; n < 2 -> base case
    //  44: addi a0, s0, -1
    //  48: jal  ra, FIB                ; fib(n-1)
    //  52: addi s1, a0, 0              ; s1 = fib(n-1)
    //  56: addi a0, s0, -2
    //  60: jal  ra, FIB                ; fib(n-2)
    //  64: add  a0, a0, s1             ; a0 = fib(n-2) + fib(n-1)
    //  68: jal  x0, EPILOGUE
    //  BASE = 72:
    //  72: addi a0, s0, 0
    //  EPILOGUE = 76:
    //  76: lw   ra, 12(sp)
    //  80: lw   s0, 8(sp)
    //  84: lw   s1, 4(sp)
    //  88: addi sp, sp, 16
    //  92: jalr x0, 0(ra)
    const FIB: i32 = 16;
    const BASE: i32 = 72;
    const EPILOGUE: i32 = 76;

    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, SP, 0b000, X0, 0x400));
    write_word(&mut image, 4, itype(OP_IMM, A0, 0b000, X0, 10));
    write_word(&mut image, 8, jtype(RA, FIB - 8));
    write_word(&mut image, 12, HALT_INSTRUCTION);

    write_word(&mut image, 16, itype(OP_IMM, SP, 0b000, SP, -16));
    write_word(&mut image, 20, stype(0b010, SP, RA, 12));
    write_word(&mut image, 24, stype(0b010, SP, S0, 8));
    write_word(&mut image, 28, stype(0b010, SP, S1, 4));
    write_word(&mut image, 32, itype(OP_IMM, S0, 0b000, A0, 0));
    write_word(&mut image, 36, itype(OP_IMM, T0, 0b000, X0, 2));
    write_word(&mut image, 40, btype(0b100, S0, T0, BASE - 40));
    write_word(&mut image, 44, itype(OP_IMM, A0, 0b000, S0, -1));
    write_word(&mut image, 48, jtype(RA, FIB - 48));
    write_word(&mut image, 52, itype(OP_IMM, S1, 0b000, A0, 0));
    write_word(&mut image, 56, itype(OP_IMM, A0, 0b000, S0, -2));
    write_word(&mut image, 60, jtype(RA, FIB - 60));
    write_word(&mut image, 64, rtype(OP, A0, 0b000, A0, S1, false));
    write_word(&mut image, 68, jtype(X0, EPILOGUE - 68));
    write_word(&mut image, 72, itype(OP_IMM, A0, 0b000, S0, 0));
    write_word(&mut image, 76, itype(LOAD, RA, 0b010, SP, 12));
    write_word(&mut image, 80, itype(LOAD, S0, 0b010, SP, 8));
    write_word(&mut image, 84, itype(LOAD, S1, 0b010, SP, 4));
    write_word(&mut image, 88, itype(OP_IMM, SP, 0b000, SP, 16));
    write_word(&mut image, 92, itype(JALR, X0, 0b000, RA, 0));

    let mut cpu = Cpu::new(&Config::default(), &image);
    assert_eq!(cpu.run().unwrap(), 55);
}

#[test]
fn branch_intensive_sum_one_to_one_hundred() {
    // a0 = 0; t0 = 1; t1 = 101; while (t0 != t1) { a0 += t0; t0 += 1; }
    const LOOP: i32 = 12;
    const DONE: i32 = 28;

    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, A0, 0b000, X0, 0));
    write_word(&mut image, 4, itype(OP_IMM, T0, 0b000, X0, 1));
    write_word(&mut image, 8, itype(OP_IMM, T1, 0b000, X0, 101));
    write_word(&mut image, 12, btype(0b000, T0, T1, DONE - 12));
    write_word(&mut image, 16, rtype(OP, A0, 0b000, A0, T0, false));
    write_word(&mut image, 20, itype(OP_IMM, T0, 0b000, T0, 1));
    write_word(&mut image, 24, jtype(X0, LOOP - 24));
    write_word(&mut image, 28, HALT_INSTRUCTION);

    let mut cpu = Cpu::new(&Config::default(), &image);
    assert_eq!(cpu.run().unwrap(), (5050 & 0xFF) as u8);
}

#[test]
fn store_then_reload_across_register_reuse_is_a_hazard_free_round_trip() {
    // sp = 0x100; store byte 0xAA at sp-4; reload it unsigned; exit 0xAA.
    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, SP, 0b000, X0, 0x100));
    write_word(&mut image, 4, itype(OP_IMM, T0, 0b000, X0, 0xAA));
    write_word(&mut image, 8, stype(0b010, SP, T0, -4));
    write_word(&mut image, 12, itype(LOAD, A0, 0b100, SP, -4));
    write_word(&mut image, 16, HALT_INSTRUCTION);

    let mut cpu = Cpu::new(&Config::default(), &image);
    assert_eq!(cpu.run().unwrap(), 0xAA);
}

#[test]
fn always_not_taken_and_always_taken_agree_on_a_tight_backward_branch() {
    // t0 = 5; do { t0 -= 1 } while (t0 != 0); a0 = 42; halt
    const LOOP: i32 = 4;
    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, T0, 0b000, X0, 5));
    write_word(&mut image, 4, itype(OP_IMM, T0, 0b000, T0, -1));
    write_word(&mut image, 8, btype(0b001, T0, X0, LOOP - 8));
    write_word(&mut image, 12, itype(OP_IMM, A0, 0b000, X0, 42));
    write_word(&mut image, 16, HALT_INSTRUCTION);

    let mut never_taken = Config {
        predictor: PredictorKind::NeverTaken,
        ..Config::default()
    };
    let mut always_taken = Config {
        predictor: PredictorKind::AlwaysTaken,
        ..Config::default()
    };
    never_taken.validate().unwrap();
    always_taken.validate().unwrap();

    let mut cpu_ant = Cpu::new(&never_taken, &image);
    let mut cpu_at = Cpu::new(&always_taken, &image);
    assert_eq!(cpu_ant.run().unwrap(), 42);
    assert_eq!(cpu_at.run().unwrap(), 42);
}

#[test]
fn cache_enabled_run_matches_plain_memory_exit() {
    // sp = 0x40; store word 0x2A at sp; reload it; exit 42. Run once plain,
    // once with the cache enabled; only cycle count should differ.
    let mut image = MemoryImage::new();
    write_word(&mut image, 0, itype(OP_IMM, SP, 0b000, X0, 0x40));
    write_word(&mut image, 4, itype(OP_IMM, T0, 0b000, X0, 42));
    write_word(&mut image, 8, stype(0b010, SP, T0, 0));
    write_word(&mut image, 12, itype(LOAD, A0, 0b010, SP, 0));
    write_word(&mut image, 16, HALT_INSTRUCTION);

    let plain = Config::default();
    let cached = Config {
        memory: MemoryConfig::Cache {
            set_bits: 4,
            ways: 4,
            block_bits: 4,
            hit_delay: 0,
            miss_delay: 2,
        },
        ..Config::default()
    };

    let mut cpu_plain = Cpu::new(&plain, &image);
    let mut cpu_cached = Cpu::new(&cached, &image);
    assert_eq!(cpu_plain.run().unwrap(), cpu_cached.run().unwrap());
}

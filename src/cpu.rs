// The chip behind the Game Boy: the Sharp LR35902, a Z80 relative with an
// 8-bit accumulator, 16-bit addressing and two 256-entry opcode pages.
use super::error::{Error, Result};
use super::memory::Memory;
use super::register::Flag::{C, H, N, Z};
use super::register::Register;

// Cycle counts per opcode, in t-cycles. Conditional jumps, calls and returns
// always charge their not-taken count; the cost does not depend on the branch
// taken. Entries for the CB prefix and the reserved opcodes are never read.
//  0   1   2   3   4   5   6   7   8   9   a   b   c   d   e   f
const OP_CYCLES: [u32; 256] = [
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1
     8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2
     8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // a
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // b
     8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  0, 12, 24,  8, 16, // c
     8, 12, 12,  0, 12, 16,  8, 16,  8, 16, 12,  0, 12,  0,  8, 16, // d
    12, 12,  8,  0,  0, 16,  8, 16, 16,  4, 16,  0,  0,  0,  8, 16, // e
    12, 12,  8,  4,  0, 16,  8, 16, 12,  8, 16,  4,  0,  0,  8, 16, // f
];

//  0   1   2   3   4   5   6   7   8   9   a   b   c   d   e   f
const CB_CYCLES: [u32; 256] = [
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 0
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 1
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 2
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 3
     8,  8,  8,  8,  8,  8, 12,  8,  8,  8,  8,  8,  8,  8, 12,  8, // 4
     8,  8,  8,  8,  8,  8, 12,  8,  8,  8,  8,  8,  8,  8, 12,  8, // 5
     8,  8,  8,  8,  8,  8, 12,  8,  8,  8,  8,  8,  8,  8, 12,  8, // 6
     8,  8,  8,  8,  8,  8, 12,  8,  8,  8,  8,  8,  8,  8, 12,  8, // 7
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 8
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // 9
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // a
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // b
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // c
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // d
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // e
     8,  8,  8,  8,  8,  8, 16,  8,  8,  8,  8,  8,  8,  8, 16,  8, // f
];

// Cycles consumed when the CPU enters an interrupt handler.
const INTERRUPT_CYCLES: u32 = 20;

pub struct Cpu {
    pub reg: Register,
    pub halted: bool,
    ime: bool,
    ei_pending: bool,
}

// A summary of the instruction set is given with each helper below. If
// 'Flags affected' is not given for a command then none are affected.
impl Cpu {
    fn imm(&mut self, mem: &mut dyn Memory) -> Result<u8> {
        let v = mem.get(self.reg.pc)?;
        self.reg.pc = self.reg.pc.wrapping_add(1);
        Ok(v)
    }

    fn imm_word(&mut self, mem: &mut dyn Memory) -> Result<u16> {
        let v = mem.get_word(self.reg.pc)?;
        self.reg.pc = self.reg.pc.wrapping_add(2);
        Ok(v)
    }

    fn stack_add(&mut self, mem: &mut dyn Memory, v: u16) -> Result<()> {
        self.reg.sp = self.reg.sp.wrapping_sub(2);
        mem.set_word(self.reg.sp, v)
    }

    fn stack_pop(&mut self, mem: &mut dyn Memory) -> Result<u16> {
        let r = mem.get_word(self.reg.sp)?;
        self.reg.sp = self.reg.sp.wrapping_add(2);
        Ok(r)
    }

    // Add n to A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Set if carry from bit 3.
    // C - Set if carry from bit 7.
    fn alu_add(&mut self, n: u8) {
        let a = self.reg.a;
        let r = a.wrapping_add(n);
        self.reg.set_flag(C, u16::from(a) + u16::from(n) > 0xff);
        self.reg.set_flag(H, (a & 0x0f) + (n & 0x0f) > 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Add n + Carry flag to A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Set if carry from bit 3.
    // C - Set if carry from bit 7.
    fn alu_adc(&mut self, n: u8) {
        let a = self.reg.a;
        let c = u8::from(self.reg.get_flag(C));
        let r = a.wrapping_add(n).wrapping_add(c);
        self.reg.set_flag(C, u16::from(a) + u16::from(n) + u16::from(c) > 0xff);
        self.reg.set_flag(H, (a & 0x0f) + (n & 0x0f) + c > 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Subtract n from A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Set.
    // H - Set if borrow from bit 4.
    // C - Set if borrow.
    fn alu_sub(&mut self, n: u8) {
        let a = self.reg.a;
        let r = a.wrapping_sub(n);
        self.reg.set_flag(C, u16::from(a) < u16::from(n));
        self.reg.set_flag(H, (a & 0x0f) < (n & 0x0f));
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Subtract n + Carry flag from A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Set.
    // H - Set if borrow from bit 4.
    // C - Set if borrow.
    fn alu_sbc(&mut self, n: u8) {
        let a = self.reg.a;
        let c = u8::from(self.reg.get_flag(C));
        let r = a.wrapping_sub(n).wrapping_sub(c);
        self.reg.set_flag(C, u16::from(a) < u16::from(n) + u16::from(c));
        self.reg.set_flag(H, (a & 0x0f) < (n & 0x0f) + c);
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Logically AND n with A, result in A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Set.
    // C - Reset.
    fn alu_and(&mut self, n: u8) {
        let r = self.reg.a & n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Logical OR n with A, result in A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Reset.
    fn alu_or(&mut self, n: u8) {
        let r = self.reg.a | n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Logical exclusive OR n with A, result in A.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Reset.
    fn alu_xor(&mut self, n: u8) {
        let r = self.reg.a ^ n;
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        self.reg.a = r;
    }

    // Compare A with n: an A - n subtraction with the result thrown away.
    //
    // Flags affected:
    // Z - Set if A equals n.
    // N - Set.
    // H - Set if borrow from bit 4.
    // C - Set if A is less than n.
    fn alu_cp(&mut self, n: u8) {
        let r = self.reg.a;
        self.alu_sub(n);
        self.reg.a = r;
    }

    // Increment register n.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Set if carry from bit 3.
    // C - Not affected.
    fn alu_inc(&mut self, a: u8) -> u8 {
        let r = a.wrapping_add(1);
        self.reg.set_flag(H, (a & 0x0f) + 0x01 > 0x0f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Decrement register n.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Set.
    // H - Set if borrow from bit 4.
    // C - Not affected.
    fn alu_dec(&mut self, a: u8) -> u8 {
        let r = a.wrapping_sub(1);
        self.reg.set_flag(H, a & 0x0f == 0x00);
        self.reg.set_flag(N, true);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Add n to HL.
    //
    // Flags affected:
    // Z - Not affected.
    // N - Reset.
    // H - Set if carry from bit 11.
    // C - Set if carry from bit 15.
    fn alu_add_hl(&mut self, n: u16) {
        let a = self.reg.get_hl();
        let r = a.wrapping_add(n);
        self.reg.set_flag(C, a > 0xffff - n);
        self.reg.set_flag(H, (a & 0x0fff) + (n & 0x0fff) > 0x0fff);
        self.reg.set_flag(N, false);
        self.reg.set_hl(r);
    }

    // Add a one byte signed immediate value to SP.
    //
    // Flags affected:
    // Z - Reset.
    // N - Reset.
    // H - Set or reset according to operation.
    // C - Set or reset according to operation.
    fn alu_add_sp(&mut self, mem: &mut dyn Memory) -> Result<()> {
        let a = self.reg.sp;
        let b = i16::from(self.imm(mem)? as i8) as u16;
        self.reg.set_flag(C, (a & 0x00ff) + (b & 0x00ff) > 0x00ff);
        self.reg.set_flag(H, (a & 0x000f) + (b & 0x000f) > 0x000f);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, false);
        self.reg.sp = a.wrapping_add(b);
        Ok(())
    }

    // Swap upper and lower nibbles of n.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Reset.
    fn alu_swap(&mut self, a: u8) -> u8 {
        self.reg.set_flag(C, false);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, a == 0x00);
        (a >> 4) | (a << 4)
    }

    // Complement A register. (Flip all bits.)
    //
    // Flags affected:
    // Z - Not affected.
    // N - Set.
    // H - Set.
    // C - Not affected.
    fn alu_cpl(&mut self) {
        self.reg.a = !self.reg.a;
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, true);
    }

    // Complement carry flag.
    //
    // Flags affected:
    // Z - Not affected.
    // N - Reset.
    // H - Reset.
    // C - Complemented.
    fn alu_ccf(&mut self) {
        let v = !self.reg.get_flag(C);
        self.reg.set_flag(C, v);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
    }

    // Set carry flag.
    //
    // Flags affected:
    // Z - Not affected.
    // N - Reset.
    // H - Reset.
    // C - Set.
    fn alu_scf(&mut self) {
        self.reg.set_flag(C, true);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
    }

    // Rotate n left. Old bit 7 to Carry flag.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 7 data.
    fn alu_rlc(&mut self, a: u8) -> u8 {
        let c = (a & 0x80) >> 7 == 0x01;
        let r = (a << 1) | u8::from(c);
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Rotate n left through Carry flag.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 7 data.
    fn alu_rl(&mut self, a: u8) -> u8 {
        let c = (a & 0x80) >> 7 == 0x01;
        let r = (a << 1) | u8::from(self.reg.get_flag(C));
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Rotate n right. Old bit 0 to Carry flag.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 0 data.
    fn alu_rrc(&mut self, a: u8) -> u8 {
        let c = a & 0x01 == 0x01;
        let r = if c { 0x80 | (a >> 1) } else { a >> 1 };
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Rotate n right through Carry flag.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 0 data.
    fn alu_rr(&mut self, a: u8) -> u8 {
        let c = a & 0x01 == 0x01;
        let r = if self.reg.get_flag(C) { 0x80 | (a >> 1) } else { a >> 1 };
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Shift n left into Carry. LSB of n set to 0.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 7 data.
    fn alu_sla(&mut self, a: u8) -> u8 {
        let c = (a & 0x80) >> 7 == 0x01;
        let r = a << 1;
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Shift n right into Carry. MSB doesn't change.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 0 data.
    fn alu_sra(&mut self, a: u8) -> u8 {
        let c = a & 0x01 == 0x01;
        let r = (a >> 1) | (a & 0x80);
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Shift n right into Carry. MSB set to 0.
    //
    // Flags affected:
    // Z - Set if result is zero.
    // N - Reset.
    // H - Reset.
    // C - Contains old bit 0 data.
    fn alu_srl(&mut self, a: u8) -> u8 {
        let c = a & 0x01 == 0x01;
        let r = a >> 1;
        self.reg.set_flag(C, c);
        self.reg.set_flag(H, false);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r == 0x00);
        r
    }

    // Test bit b in register r.
    //
    // Flags affected:
    // Z - Set if bit b of register r is 0.
    // N - Reset.
    // H - Set.
    // C - Not affected.
    fn alu_bit(&mut self, a: u8, b: u8) {
        let r = a & (1 << b) == 0x00;
        self.reg.set_flag(H, true);
        self.reg.set_flag(N, false);
        self.reg.set_flag(Z, r);
    }

    // Set bit b in register r. Flags affected: none.
    fn alu_set(&mut self, a: u8, b: u8) -> u8 {
        a | (1 << b)
    }

    // Reset bit b in register r. Flags affected: none.
    fn alu_res(&mut self, a: u8, b: u8) -> u8 {
        a & !(1 << b)
    }

    // Add a one byte signed immediate value to the current address and jump
    // to it.
    fn alu_jr(&mut self, mem: &mut dyn Memory) -> Result<()> {
        let n = self.imm(mem)? as i8;
        self.reg.pc = ((u32::from(self.reg.pc) as i32) + i32::from(n)) as u16;
        Ok(())
    }
}

impl Cpu {
    pub fn power_up() -> Self {
        Self { reg: Register::power_up(), halted: false, ime: true, ei_pending: false }
    }

    // Run one interrupt dispatch or one instruction, returning the t-cycles
    // consumed.
    pub fn step(&mut self, mem: &mut dyn Memory) -> Result<u32> {
        if let Some(c) = self.interrupt(mem)? {
            return Ok(c);
        }
        if self.halted {
            return Ok(4);
        }
        let pending = self.ei_pending;
        let cycles = self.ex(mem)?;
        // EI only takes effect after the instruction that follows it.
        if pending && self.ei_pending {
            self.ei_pending = false;
            self.ime = true;
        }
        Ok(cycles)
    }

    // Inspect IF & IE before the next fetch. The lowest set bit wins; its
    // request flag is acknowledged and the handler vector entered.
    fn interrupt(&mut self, mem: &mut dyn Memory) -> Result<Option<u32>> {
        if !self.ime && !self.halted {
            return Ok(None);
        }
        let intf = mem.get(0xff0f)?;
        let inte = mem.get(0xffff)?;
        let pending = intf & inte & 0x1f;
        if pending == 0x00 {
            return Ok(None);
        }
        // A pending interrupt releases HALT even when dispatch is disabled.
        self.halted = false;
        if !self.ime {
            return Ok(None);
        }
        self.ime = false;
        let n = pending.trailing_zeros();
        mem.set(0xff0f, intf & !(1 << n))?;
        self.stack_add(mem, self.reg.pc)?;
        self.reg.pc = 0x0040 | ((n as u16) << 3);
        Ok(Some(INTERRUPT_CYCLES))
    }

    #[allow(clippy::cognitive_complexity)]
    fn ex(&mut self, mem: &mut dyn Memory) -> Result<u32> {
        let opcode = self.imm(mem)?;
        let mut cbcode: u8 = 0;
        match opcode {
            0x00 => {}
            0x01 => {
                let v = self.imm_word(mem)?;
                self.reg.set_bc(v);
            }
            0x02 => mem.set(self.reg.get_bc(), self.reg.a)?,
            0x03 => {
                let v = self.reg.get_bc().wrapping_add(1);
                self.reg.set_bc(v);
            }
            0x04 => self.reg.b = self.alu_inc(self.reg.b),
            0x05 => self.reg.b = self.alu_dec(self.reg.b),
            0x06 => self.reg.b = self.imm(mem)?,
            0x07 => self.reg.a = self.alu_rlc(self.reg.a),
            0x08 => {
                let a = self.imm_word(mem)?;
                mem.set_word(a, self.reg.sp)?;
            }
            0x09 => self.alu_add_hl(self.reg.get_bc()),
            0x0a => self.reg.a = mem.get(self.reg.get_bc())?,
            0x0b => {
                let v = self.reg.get_bc().wrapping_sub(1);
                self.reg.set_bc(v);
            }
            0x0c => self.reg.c = self.alu_inc(self.reg.c),
            0x0d => self.reg.c = self.alu_dec(self.reg.c),
            0x0e => self.reg.c = self.imm(mem)?,
            0x0f => self.reg.a = self.alu_rrc(self.reg.a),
            0x10 => return Err(Error::NotImplemented(0x10)),
            0x11 => {
                let v = self.imm_word(mem)?;
                self.reg.set_de(v);
            }
            0x12 => mem.set(self.reg.get_de(), self.reg.a)?,
            0x13 => {
                let v = self.reg.get_de().wrapping_add(1);
                self.reg.set_de(v);
            }
            0x14 => self.reg.d = self.alu_inc(self.reg.d),
            0x15 => self.reg.d = self.alu_dec(self.reg.d),
            0x16 => self.reg.d = self.imm(mem)?,
            0x17 => self.reg.a = self.alu_rl(self.reg.a),
            0x18 => self.alu_jr(mem)?,
            0x19 => self.alu_add_hl(self.reg.get_de()),
            0x1a => self.reg.a = mem.get(self.reg.get_de())?,
            0x1b => {
                let v = self.reg.get_de().wrapping_sub(1);
                self.reg.set_de(v);
            }
            0x1c => self.reg.e = self.alu_inc(self.reg.e),
            0x1d => self.reg.e = self.alu_dec(self.reg.e),
            0x1e => self.reg.e = self.imm(mem)?,
            0x1f => self.reg.a = self.alu_rr(self.reg.a),
            0x20 => {
                if !self.reg.get_flag(Z) {
                    self.alu_jr(mem)?;
                } else {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            0x21 => {
                let v = self.imm_word(mem)?;
                self.reg.set_hl(v);
            }
            0x22 => {
                let a = self.reg.get_hl();
                mem.set(a, self.reg.a)?;
                self.reg.set_hl(a.wrapping_add(1));
            }
            0x23 => {
                let v = self.reg.get_hl().wrapping_add(1);
                self.reg.set_hl(v);
            }
            0x24 => self.reg.h = self.alu_inc(self.reg.h),
            0x25 => self.reg.h = self.alu_dec(self.reg.h),
            0x26 => self.reg.h = self.imm(mem)?,
            0x27 => return Err(Error::NotImplemented(0x27)),
            0x28 => {
                if self.reg.get_flag(Z) {
                    self.alu_jr(mem)?;
                } else {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            0x29 => self.alu_add_hl(self.reg.get_hl()),
            0x2a => {
                let a = self.reg.get_hl();
                self.reg.a = mem.get(a)?;
                self.reg.set_hl(a.wrapping_add(1));
            }
            0x2b => {
                let v = self.reg.get_hl().wrapping_sub(1);
                self.reg.set_hl(v);
            }
            0x2c => self.reg.l = self.alu_inc(self.reg.l),
            0x2d => self.reg.l = self.alu_dec(self.reg.l),
            0x2e => self.reg.l = self.imm(mem)?,
            0x2f => self.alu_cpl(),
            0x30 => {
                if !self.reg.get_flag(C) {
                    self.alu_jr(mem)?;
                } else {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            0x31 => self.reg.sp = self.imm_word(mem)?,
            0x32 => {
                let a = self.reg.get_hl();
                mem.set(a, self.reg.a)?;
                self.reg.set_hl(a.wrapping_sub(1));
            }
            0x33 => self.reg.sp = self.reg.sp.wrapping_add(1),
            0x34 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_inc(v);
                mem.set(a, r)?;
            }
            0x35 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_dec(v);
                mem.set(a, r)?;
            }
            0x36 => {
                let a = self.reg.get_hl();
                let v = self.imm(mem)?;
                mem.set(a, v)?;
            }
            0x37 => self.alu_scf(),
            0x38 => {
                if self.reg.get_flag(C) {
                    self.alu_jr(mem)?;
                } else {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            0x39 => self.alu_add_hl(self.reg.sp),
            0x3a => {
                let a = self.reg.get_hl();
                self.reg.a = mem.get(a)?;
                self.reg.set_hl(a.wrapping_sub(1));
            }
            0x3b => self.reg.sp = self.reg.sp.wrapping_sub(1),
            0x3c => self.reg.a = self.alu_inc(self.reg.a),
            0x3d => self.reg.a = self.alu_dec(self.reg.a),
            0x3e => self.reg.a = self.imm(mem)?,
            0x3f => self.alu_ccf(),
            0x40 => {}
            0x41 => self.reg.b = self.reg.c,
            0x42 => self.reg.b = self.reg.d,
            0x43 => self.reg.b = self.reg.e,
            0x44 => self.reg.b = self.reg.h,
            0x45 => self.reg.b = self.reg.l,
            0x46 => self.reg.b = mem.get(self.reg.get_hl())?,
            0x47 => self.reg.b = self.reg.a,
            0x48 => self.reg.c = self.reg.b,
            0x49 => {}
            0x4a => self.reg.c = self.reg.d,
            0x4b => self.reg.c = self.reg.e,
            0x4c => self.reg.c = self.reg.h,
            0x4d => self.reg.c = self.reg.l,
            0x4e => self.reg.c = mem.get(self.reg.get_hl())?,
            0x4f => self.reg.c = self.reg.a,
            0x50 => self.reg.d = self.reg.b,
            0x51 => self.reg.d = self.reg.c,
            0x52 => {}
            0x53 => self.reg.d = self.reg.e,
            0x54 => self.reg.d = self.reg.h,
            0x55 => self.reg.d = self.reg.l,
            0x56 => self.reg.d = mem.get(self.reg.get_hl())?,
            0x57 => self.reg.d = self.reg.a,
            0x58 => self.reg.e = self.reg.b,
            0x59 => self.reg.e = self.reg.c,
            0x5a => self.reg.e = self.reg.d,
            0x5b => {}
            0x5c => self.reg.e = self.reg.h,
            0x5d => self.reg.e = self.reg.l,
            0x5e => self.reg.e = mem.get(self.reg.get_hl())?,
            0x5f => self.reg.e = self.reg.a,
            0x60 => self.reg.h = self.reg.b,
            0x61 => self.reg.h = self.reg.c,
            0x62 => self.reg.h = self.reg.d,
            0x63 => self.reg.h = self.reg.e,
            0x64 => {}
            0x65 => self.reg.h = self.reg.l,
            0x66 => self.reg.h = mem.get(self.reg.get_hl())?,
            0x67 => self.reg.h = self.reg.a,
            0x68 => self.reg.l = self.reg.b,
            0x69 => self.reg.l = self.reg.c,
            0x6a => self.reg.l = self.reg.d,
            0x6b => self.reg.l = self.reg.e,
            0x6c => self.reg.l = self.reg.h,
            0x6d => {}
            0x6e => self.reg.l = mem.get(self.reg.get_hl())?,
            0x6f => self.reg.l = self.reg.a,
            0x70 => mem.set(self.reg.get_hl(), self.reg.b)?,
            0x71 => mem.set(self.reg.get_hl(), self.reg.c)?,
            0x72 => mem.set(self.reg.get_hl(), self.reg.d)?,
            0x73 => mem.set(self.reg.get_hl(), self.reg.e)?,
            0x74 => mem.set(self.reg.get_hl(), self.reg.h)?,
            0x75 => mem.set(self.reg.get_hl(), self.reg.l)?,
            0x76 => self.halted = true,
            0x77 => mem.set(self.reg.get_hl(), self.reg.a)?,
            0x78 => self.reg.a = self.reg.b,
            0x79 => self.reg.a = self.reg.c,
            0x7a => self.reg.a = self.reg.d,
            0x7b => self.reg.a = self.reg.e,
            0x7c => self.reg.a = self.reg.h,
            0x7d => self.reg.a = self.reg.l,
            0x7e => self.reg.a = mem.get(self.reg.get_hl())?,
            0x7f => {}
            0x80 => self.alu_add(self.reg.b),
            0x81 => self.alu_add(self.reg.c),
            0x82 => self.alu_add(self.reg.d),
            0x83 => self.alu_add(self.reg.e),
            0x84 => self.alu_add(self.reg.h),
            0x85 => self.alu_add(self.reg.l),
            0x86 => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_add(v);
            }
            0x87 => self.alu_add(self.reg.a),
            0x88 => self.alu_adc(self.reg.b),
            0x89 => self.alu_adc(self.reg.c),
            0x8a => self.alu_adc(self.reg.d),
            0x8b => self.alu_adc(self.reg.e),
            0x8c => self.alu_adc(self.reg.h),
            0x8d => self.alu_adc(self.reg.l),
            0x8e => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_adc(v);
            }
            0x8f => self.alu_adc(self.reg.a),
            0x90 => self.alu_sub(self.reg.b),
            0x91 => self.alu_sub(self.reg.c),
            0x92 => self.alu_sub(self.reg.d),
            0x93 => self.alu_sub(self.reg.e),
            0x94 => self.alu_sub(self.reg.h),
            0x95 => self.alu_sub(self.reg.l),
            0x96 => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_sub(v);
            }
            0x97 => self.alu_sub(self.reg.a),
            0x98 => self.alu_sbc(self.reg.b),
            0x99 => self.alu_sbc(self.reg.c),
            0x9a => self.alu_sbc(self.reg.d),
            0x9b => self.alu_sbc(self.reg.e),
            0x9c => self.alu_sbc(self.reg.h),
            0x9d => self.alu_sbc(self.reg.l),
            0x9e => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_sbc(v);
            }
            0x9f => self.alu_sbc(self.reg.a),
            0xa0 => self.alu_and(self.reg.b),
            0xa1 => self.alu_and(self.reg.c),
            0xa2 => self.alu_and(self.reg.d),
            0xa3 => self.alu_and(self.reg.e),
            0xa4 => self.alu_and(self.reg.h),
            0xa5 => self.alu_and(self.reg.l),
            0xa6 => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_and(v);
            }
            0xa7 => self.alu_and(self.reg.a),
            0xa8 => self.alu_xor(self.reg.b),
            0xa9 => self.alu_xor(self.reg.c),
            0xaa => self.alu_xor(self.reg.d),
            0xab => self.alu_xor(self.reg.e),
            0xac => self.alu_xor(self.reg.h),
            0xad => self.alu_xor(self.reg.l),
            0xae => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_xor(v);
            }
            0xaf => self.alu_xor(self.reg.a),
            0xb0 => self.alu_or(self.reg.b),
            0xb1 => self.alu_or(self.reg.c),
            0xb2 => self.alu_or(self.reg.d),
            0xb3 => self.alu_or(self.reg.e),
            0xb4 => self.alu_or(self.reg.h),
            0xb5 => self.alu_or(self.reg.l),
            0xb6 => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_or(v);
            }
            0xb7 => self.alu_or(self.reg.a),
            0xb8 => self.alu_cp(self.reg.b),
            0xb9 => self.alu_cp(self.reg.c),
            0xba => self.alu_cp(self.reg.d),
            0xbb => self.alu_cp(self.reg.e),
            0xbc => self.alu_cp(self.reg.h),
            0xbd => self.alu_cp(self.reg.l),
            0xbe => {
                let v = mem.get(self.reg.get_hl())?;
                self.alu_cp(v);
            }
            0xbf => self.alu_cp(self.reg.a),
            0xc0 => {
                if !self.reg.get_flag(Z) {
                    self.reg.pc = self.stack_pop(mem)?;
                }
            }
            0xc1 => {
                let v = self.stack_pop(mem)?;
                self.reg.set_bc(v);
            }
            0xc2 => {
                let pc = self.imm_word(mem)?;
                if !self.reg.get_flag(Z) {
                    self.reg.pc = pc;
                }
            }
            0xc3 => self.reg.pc = self.imm_word(mem)?,
            0xc4 => {
                let a = self.imm_word(mem)?;
                if !self.reg.get_flag(Z) {
                    self.stack_add(mem, self.reg.pc)?;
                    self.reg.pc = a;
                }
            }
            0xc5 => self.stack_add(mem, self.reg.get_bc())?,
            0xc6 => {
                let v = self.imm(mem)?;
                self.alu_add(v);
            }
            0xc7 => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x00;
            }
            0xc8 => {
                if self.reg.get_flag(Z) {
                    self.reg.pc = self.stack_pop(mem)?;
                }
            }
            0xc9 => self.reg.pc = self.stack_pop(mem)?,
            0xca => {
                let pc = self.imm_word(mem)?;
                if self.reg.get_flag(Z) {
                    self.reg.pc = pc;
                }
            }
            0xcb => {
                cbcode = self.imm(mem)?;
                self.ex_cb(mem, cbcode)?;
            }
            0xcc => {
                let a = self.imm_word(mem)?;
                if self.reg.get_flag(Z) {
                    self.stack_add(mem, self.reg.pc)?;
                    self.reg.pc = a;
                }
            }
            0xcd => {
                let a = self.imm_word(mem)?;
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = a;
            }
            0xce => {
                let v = self.imm(mem)?;
                self.alu_adc(v);
            }
            0xcf => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x08;
            }
            0xd0 => {
                if !self.reg.get_flag(C) {
                    self.reg.pc = self.stack_pop(mem)?;
                }
            }
            0xd1 => {
                let v = self.stack_pop(mem)?;
                self.reg.set_de(v);
            }
            0xd2 => {
                let pc = self.imm_word(mem)?;
                if !self.reg.get_flag(C) {
                    self.reg.pc = pc;
                }
            }
            0xd3 => return Err(Error::IllegalOpcode(0xd3)),
            0xd4 => {
                let a = self.imm_word(mem)?;
                if !self.reg.get_flag(C) {
                    self.stack_add(mem, self.reg.pc)?;
                    self.reg.pc = a;
                }
            }
            0xd5 => self.stack_add(mem, self.reg.get_de())?,
            0xd6 => {
                let v = self.imm(mem)?;
                self.alu_sub(v);
            }
            0xd7 => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x10;
            }
            0xd8 => {
                if self.reg.get_flag(C) {
                    self.reg.pc = self.stack_pop(mem)?;
                }
            }
            0xd9 => {
                self.reg.pc = self.stack_pop(mem)?;
                self.ime = true;
            }
            0xda => {
                let pc = self.imm_word(mem)?;
                if self.reg.get_flag(C) {
                    self.reg.pc = pc;
                }
            }
            0xdb => return Err(Error::IllegalOpcode(0xdb)),
            0xdc => {
                let a = self.imm_word(mem)?;
                if self.reg.get_flag(C) {
                    self.stack_add(mem, self.reg.pc)?;
                    self.reg.pc = a;
                }
            }
            0xdd => return Err(Error::IllegalOpcode(0xdd)),
            0xde => {
                let v = self.imm(mem)?;
                self.alu_sbc(v);
            }
            0xdf => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x18;
            }
            0xe0 => {
                let a = 0xff00 | u16::from(self.imm(mem)?);
                mem.set(a, self.reg.a)?;
            }
            0xe1 => {
                let v = self.stack_pop(mem)?;
                self.reg.set_hl(v);
            }
            0xe2 => mem.set(0xff00 | u16::from(self.reg.c), self.reg.a)?,
            0xe3 => return Err(Error::IllegalOpcode(0xe3)),
            0xe4 => return Err(Error::IllegalOpcode(0xe4)),
            0xe5 => self.stack_add(mem, self.reg.get_hl())?,
            0xe6 => {
                let v = self.imm(mem)?;
                self.alu_and(v);
            }
            0xe7 => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x20;
            }
            0xe8 => self.alu_add_sp(mem)?,
            0xe9 => self.reg.pc = self.reg.get_hl(),
            0xea => {
                let a = self.imm_word(mem)?;
                mem.set(a, self.reg.a)?;
            }
            0xeb => return Err(Error::IllegalOpcode(0xeb)),
            0xec => return Err(Error::IllegalOpcode(0xec)),
            0xed => return Err(Error::IllegalOpcode(0xed)),
            0xee => {
                let v = self.imm(mem)?;
                self.alu_xor(v);
            }
            0xef => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x28;
            }
            0xf0 => {
                let a = 0xff00 | u16::from(self.imm(mem)?);
                self.reg.a = mem.get(a)?;
            }
            0xf1 => {
                let v = self.stack_pop(mem)?;
                self.reg.set_af(v);
            }
            0xf2 => self.reg.a = mem.get(0xff00 | u16::from(self.reg.c))?,
            0xf3 => {
                self.ime = false;
                self.ei_pending = false;
            }
            0xf4 => return Err(Error::IllegalOpcode(0xf4)),
            0xf5 => self.stack_add(mem, self.reg.get_af())?,
            0xf6 => {
                let v = self.imm(mem)?;
                self.alu_or(v);
            }
            0xf7 => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x30;
            }
            0xf8 => {
                let a = self.reg.sp;
                let b = i16::from(self.imm(mem)? as i8) as u16;
                self.reg.set_flag(C, (a & 0x00ff) + (b & 0x00ff) > 0x00ff);
                self.reg.set_flag(H, (a & 0x000f) + (b & 0x000f) > 0x000f);
                self.reg.set_flag(N, false);
                self.reg.set_flag(Z, false);
                self.reg.set_hl(a.wrapping_add(b));
            }
            0xf9 => self.reg.sp = self.reg.get_hl(),
            0xfa => {
                let a = self.imm_word(mem)?;
                self.reg.a = mem.get(a)?;
            }
            0xfb => self.ei_pending = true,
            0xfc => return Err(Error::IllegalOpcode(0xfc)),
            0xfd => return Err(Error::IllegalOpcode(0xfd)),
            0xfe => {
                let v = self.imm(mem)?;
                self.alu_cp(v);
            }
            0xff => {
                self.stack_add(mem, self.reg.pc)?;
                self.reg.pc = 0x38;
            }
        }
        Ok(if opcode == 0xcb { CB_CYCLES[cbcode as usize] } else { OP_CYCLES[opcode as usize] })
    }

    // The CB page: rotates and shifts on the low quarter, then BIT, RES and
    // SET with the target register encoded in the low three bits.
    fn ex_cb(&mut self, mem: &mut dyn Memory, cbcode: u8) -> Result<()> {
        match cbcode {
            0x00 => self.reg.b = self.alu_rlc(self.reg.b),
            0x01 => self.reg.c = self.alu_rlc(self.reg.c),
            0x02 => self.reg.d = self.alu_rlc(self.reg.d),
            0x03 => self.reg.e = self.alu_rlc(self.reg.e),
            0x04 => self.reg.h = self.alu_rlc(self.reg.h),
            0x05 => self.reg.l = self.alu_rlc(self.reg.l),
            0x06 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_rlc(v);
                mem.set(a, r)?;
            }
            0x07 => self.reg.a = self.alu_rlc(self.reg.a),
            0x08 => self.reg.b = self.alu_rrc(self.reg.b),
            0x09 => self.reg.c = self.alu_rrc(self.reg.c),
            0x0a => self.reg.d = self.alu_rrc(self.reg.d),
            0x0b => self.reg.e = self.alu_rrc(self.reg.e),
            0x0c => self.reg.h = self.alu_rrc(self.reg.h),
            0x0d => self.reg.l = self.alu_rrc(self.reg.l),
            0x0e => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_rrc(v);
                mem.set(a, r)?;
            }
            0x0f => self.reg.a = self.alu_rrc(self.reg.a),
            0x10 => self.reg.b = self.alu_rl(self.reg.b),
            0x11 => self.reg.c = self.alu_rl(self.reg.c),
            0x12 => self.reg.d = self.alu_rl(self.reg.d),
            0x13 => self.reg.e = self.alu_rl(self.reg.e),
            0x14 => self.reg.h = self.alu_rl(self.reg.h),
            0x15 => self.reg.l = self.alu_rl(self.reg.l),
            0x16 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_rl(v);
                mem.set(a, r)?;
            }
            0x17 => self.reg.a = self.alu_rl(self.reg.a),
            0x18 => self.reg.b = self.alu_rr(self.reg.b),
            0x19 => self.reg.c = self.alu_rr(self.reg.c),
            0x1a => self.reg.d = self.alu_rr(self.reg.d),
            0x1b => self.reg.e = self.alu_rr(self.reg.e),
            0x1c => self.reg.h = self.alu_rr(self.reg.h),
            0x1d => self.reg.l = self.alu_rr(self.reg.l),
            0x1e => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_rr(v);
                mem.set(a, r)?;
            }
            0x1f => self.reg.a = self.alu_rr(self.reg.a),
            0x20 => self.reg.b = self.alu_sla(self.reg.b),
            0x21 => self.reg.c = self.alu_sla(self.reg.c),
            0x22 => self.reg.d = self.alu_sla(self.reg.d),
            0x23 => self.reg.e = self.alu_sla(self.reg.e),
            0x24 => self.reg.h = self.alu_sla(self.reg.h),
            0x25 => self.reg.l = self.alu_sla(self.reg.l),
            0x26 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_sla(v);
                mem.set(a, r)?;
            }
            0x27 => self.reg.a = self.alu_sla(self.reg.a),
            0x28 => self.reg.b = self.alu_sra(self.reg.b),
            0x29 => self.reg.c = self.alu_sra(self.reg.c),
            0x2a => self.reg.d = self.alu_sra(self.reg.d),
            0x2b => self.reg.e = self.alu_sra(self.reg.e),
            0x2c => self.reg.h = self.alu_sra(self.reg.h),
            0x2d => self.reg.l = self.alu_sra(self.reg.l),
            0x2e => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_sra(v);
                mem.set(a, r)?;
            }
            0x2f => self.reg.a = self.alu_sra(self.reg.a),
            0x30 => self.reg.b = self.alu_swap(self.reg.b),
            0x31 => self.reg.c = self.alu_swap(self.reg.c),
            0x32 => self.reg.d = self.alu_swap(self.reg.d),
            0x33 => self.reg.e = self.alu_swap(self.reg.e),
            0x34 => self.reg.h = self.alu_swap(self.reg.h),
            0x35 => self.reg.l = self.alu_swap(self.reg.l),
            0x36 => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_swap(v);
                mem.set(a, r)?;
            }
            0x37 => self.reg.a = self.alu_swap(self.reg.a),
            0x38 => self.reg.b = self.alu_srl(self.reg.b),
            0x39 => self.reg.c = self.alu_srl(self.reg.c),
            0x3a => self.reg.d = self.alu_srl(self.reg.d),
            0x3b => self.reg.e = self.alu_srl(self.reg.e),
            0x3c => self.reg.h = self.alu_srl(self.reg.h),
            0x3d => self.reg.l = self.alu_srl(self.reg.l),
            0x3e => {
                let a = self.reg.get_hl();
                let v = mem.get(a)?;
                let r = self.alu_srl(v);
                mem.set(a, r)?;
            }
            0x3f => self.reg.a = self.alu_srl(self.reg.a),
            0x40..=0x7f => {
                let b = (cbcode - 0x40) >> 3;
                match cbcode & 0x07 {
                    0x00 => self.alu_bit(self.reg.b, b),
                    0x01 => self.alu_bit(self.reg.c, b),
                    0x02 => self.alu_bit(self.reg.d, b),
                    0x03 => self.alu_bit(self.reg.e, b),
                    0x04 => self.alu_bit(self.reg.h, b),
                    0x05 => self.alu_bit(self.reg.l, b),
                    0x06 => {
                        let v = mem.get(self.reg.get_hl())?;
                        self.alu_bit(v, b);
                    }
                    _ => self.alu_bit(self.reg.a, b),
                }
            }
            0x80..=0xbf => {
                let b = (cbcode - 0x80) >> 3;
                match cbcode & 0x07 {
                    0x00 => self.reg.b = self.alu_res(self.reg.b, b),
                    0x01 => self.reg.c = self.alu_res(self.reg.c, b),
                    0x02 => self.reg.d = self.alu_res(self.reg.d, b),
                    0x03 => self.reg.e = self.alu_res(self.reg.e, b),
                    0x04 => self.reg.h = self.alu_res(self.reg.h, b),
                    0x05 => self.reg.l = self.alu_res(self.reg.l, b),
                    0x06 => {
                        let a = self.reg.get_hl();
                        let v = mem.get(a)?;
                        let r = self.alu_res(v, b);
                        mem.set(a, r)?;
                    }
                    _ => self.reg.a = self.alu_res(self.reg.a, b),
                }
            }
            0xc0..=0xff => {
                let b = (cbcode - 0xc0) >> 3;
                match cbcode & 0x07 {
                    0x00 => self.reg.b = self.alu_set(self.reg.b, b),
                    0x01 => self.reg.c = self.alu_set(self.reg.c, b),
                    0x02 => self.reg.d = self.alu_set(self.reg.d, b),
                    0x03 => self.reg.e = self.alu_set(self.reg.e, b),
                    0x04 => self.reg.h = self.alu_set(self.reg.h, b),
                    0x05 => self.reg.l = self.alu_set(self.reg.l, b),
                    0x06 => {
                        let a = self.reg.get_hl();
                        let v = mem.get(a)?;
                        let r = self.alu_set(v, b);
                        mem.set(a, r)?;
                    }
                    _ => self.reg.a = self.alu_set(self.reg.a, b),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ram {
        data: Vec<u8>,
    }

    impl Ram {
        // Flat 64K memory with `code` placed at the reset PC, 0x0100.
        fn new(code: &[u8]) -> Self {
            let mut data = vec![0x00; 0x10000];
            data[0x0100..0x0100 + code.len()].copy_from_slice(code);
            Ram { data }
        }
    }

    impl Memory for Ram {
        fn get(&self, a: u16) -> Result<u8> {
            Ok(self.data[a as usize])
        }

        fn set(&mut self, a: u16, v: u8) -> Result<()> {
            self.data[a as usize] = v;
            Ok(())
        }
    }

    #[test]
    fn test_nop() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x00]);
        let f = cpu.reg.f;
        assert_eq!(cpu.step(&mut mem).unwrap(), 4);
        assert_eq!(cpu.reg.pc, 0x0101);
        assert_eq!(cpu.reg.f, f);
    }

    #[test]
    fn test_ld_bc_nn() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x01, 0xa5, 0x00]);
        assert_eq!(cpu.step(&mut mem).unwrap(), 12);
        assert_eq!(cpu.reg.b, 0x00);
        assert_eq!(cpu.reg.c, 0xa5);
        assert_eq!(cpu.reg.pc, 0x0103);

        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x01, 0x00, 0xa5]);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.b, 0xa5);
        assert_eq!(cpu.reg.c, 0x00);
    }

    #[test]
    fn test_inc_b_half_carry() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x04]);
        cpu.reg.b = 0x0f;
        let c = cpu.reg.get_flag(C);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.b, 0x10);
        assert!(!cpu.reg.get_flag(Z));
        assert!(!cpu.reg.get_flag(N));
        assert!(cpu.reg.get_flag(H));
        assert_eq!(cpu.reg.get_flag(C), c);
    }

    #[test]
    fn test_dec_to_zero() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x05]);
        cpu.reg.b = 0x01;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.b, 0x00);
        assert!(cpu.reg.get_flag(Z));
        assert!(cpu.reg.get_flag(N));
        assert!(!cpu.reg.get_flag(H));
    }

    #[test]
    fn test_add_a_a_overflow() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x87]);
        cpu.reg.a = 0x80;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x00);
        assert!(cpu.reg.get_flag(Z));
        assert!(!cpu.reg.get_flag(N));
        assert!(!cpu.reg.get_flag(H));
        assert!(cpu.reg.get_flag(C));
    }

    #[test]
    fn test_rlca() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x07]);
        cpu.reg.a = 0x85;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x0b);
        assert!(!cpu.reg.get_flag(Z));
        assert!(!cpu.reg.get_flag(N));
        assert!(!cpu.reg.get_flag(H));
        assert!(cpu.reg.get_flag(C));
    }

    #[test]
    fn test_sub_borrow() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xd6, 0x01]);
        cpu.reg.a = 0x10;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x0f);
        assert!(!cpu.reg.get_flag(Z));
        assert!(cpu.reg.get_flag(N));
        assert!(cpu.reg.get_flag(H));
        assert!(!cpu.reg.get_flag(C));
    }

    #[test]
    fn test_add_hl_half_carry_from_bit_11() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x09]);
        cpu.reg.set_hl(0x0fff);
        cpu.reg.set_bc(0x0001);
        let z = cpu.reg.get_flag(Z);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.get_hl(), 0x1000);
        assert!(!cpu.reg.get_flag(N));
        assert!(cpu.reg.get_flag(H));
        assert!(!cpu.reg.get_flag(C));
        assert_eq!(cpu.reg.get_flag(Z), z);
    }

    #[test]
    fn test_add_sp_signed() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xe8, 0xfe]);
        cpu.reg.sp = 0x0100;
        assert_eq!(cpu.step(&mut mem).unwrap(), 16);
        assert_eq!(cpu.reg.sp, 0x00fe);
        assert!(!cpu.reg.get_flag(Z));
        assert!(!cpu.reg.get_flag(N));
    }

    #[test]
    fn test_jr_backwards() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x18, 0xfe]);
        assert_eq!(cpu.step(&mut mem).unwrap(), 12);
        assert_eq!(cpu.reg.pc, 0x0100);
    }

    #[test]
    fn test_jr_nz_not_taken() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x20, 0x10]);
        cpu.reg.set_flag(Z, true);
        assert_eq!(cpu.step(&mut mem).unwrap(), 8);
        assert_eq!(cpu.reg.pc, 0x0102);
    }

    #[test]
    fn test_call_and_ret() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xcd, 0x00, 0x02]);
        mem.data[0x0200] = 0xc9;
        assert_eq!(cpu.step(&mut mem).unwrap(), 24);
        assert_eq!(cpu.reg.pc, 0x0200);
        assert_eq!(cpu.reg.sp, 0xfffc);
        assert_eq!(mem.get_word(cpu.reg.sp).unwrap(), 0x0103);
        assert_eq!(cpu.step(&mut mem).unwrap(), 16);
        assert_eq!(cpu.reg.pc, 0x0103);
        assert_eq!(cpu.reg.sp, 0xfffe);
    }

    #[test]
    fn test_push_pop_af_masks_low_nibble() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xf5, 0xf1]);
        cpu.reg.a = 0x12;
        cpu.reg.f = 0xff;
        cpu.step(&mut mem).unwrap();
        cpu.reg.f = 0x00;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x12);
        assert_eq!(cpu.reg.f, 0xf0);
    }

    #[test]
    fn test_ldh() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xe0, 0x80, 0xf0, 0x80]);
        cpu.reg.a = 0x42;
        assert_eq!(cpu.step(&mut mem).unwrap(), 12);
        assert_eq!(mem.get(0xff80).unwrap(), 0x42);
        cpu.reg.a = 0x00;
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x42);
    }

    #[test]
    fn test_cb_swap() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xcb, 0x37]);
        cpu.reg.a = 0xf0;
        assert_eq!(cpu.step(&mut mem).unwrap(), 8);
        assert_eq!(cpu.reg.a, 0x0f);
        assert!(!cpu.reg.get_flag(Z));
        assert!(!cpu.reg.get_flag(C));
    }

    #[test]
    fn test_cb_bit() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xcb, 0x7c, 0xcb, 0x7c]);
        cpu.reg.h = 0x80;
        cpu.step(&mut mem).unwrap();
        assert!(!cpu.reg.get_flag(Z));
        assert!(cpu.reg.get_flag(H));
        cpu.reg.h = 0x00;
        cpu.step(&mut mem).unwrap();
        assert!(cpu.reg.get_flag(Z));
    }

    #[test]
    fn test_cb_res_set_mem_hl() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xcb, 0x86, 0xcb, 0xfe]);
        cpu.reg.set_hl(0xc000);
        mem.data[0xc000] = 0x01;
        assert_eq!(cpu.step(&mut mem).unwrap(), 16);
        assert_eq!(mem.get(0xc000).unwrap(), 0x00);
        cpu.step(&mut mem).unwrap();
        assert_eq!(mem.get(0xc000).unwrap(), 0x80);
    }

    #[test]
    fn test_interrupt_dispatch() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x00]);
        mem.set(0xff0f, 0x01).unwrap();
        mem.set(0xffff, 0x01).unwrap();
        assert_eq!(cpu.step(&mut mem).unwrap(), 20);
        assert_eq!(cpu.reg.pc, 0x0040);
        assert_eq!(cpu.reg.sp, 0xfffc);
        assert_eq!(mem.get_word(cpu.reg.sp).unwrap(), 0x0100);
        assert_eq!(mem.get(0xff0f).unwrap(), 0x00);
        assert!(!cpu.ime);
    }

    #[test]
    fn test_interrupt_priority() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x00]);
        // V-Blank and LCD STAT both pending: the lower bit wins.
        mem.set(0xff0f, 0x03).unwrap();
        mem.set(0xffff, 0x03).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.pc, 0x0040);
        assert_eq!(mem.get(0xff0f).unwrap(), 0x02);
    }

    #[test]
    fn test_ei_is_delayed_one_instruction() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xfb, 0x00, 0x00]);
        cpu.ime = false;
        mem.set(0xff0f, 0x01).unwrap();
        mem.set(0xffff, 0x01).unwrap();
        // EI itself.
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.pc, 0x0101);
        assert!(!cpu.ime);
        // The following instruction still runs with interrupts off.
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.pc, 0x0102);
        assert!(cpu.ime);
        // Now the pending interrupt is taken.
        assert_eq!(cpu.step(&mut mem).unwrap(), 20);
        assert_eq!(cpu.reg.pc, 0x0040);
    }

    #[test]
    fn test_di_is_immediate() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xf3, 0x00]);
        cpu.step(&mut mem).unwrap();
        assert!(!cpu.ime);
        // A request arriving now is ignored.
        mem.set(0xff0f, 0x01).unwrap();
        mem.set(0xffff, 0x01).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.pc, 0x0102);
    }

    #[test]
    fn test_reti_restores_ime() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xd9]);
        cpu.ime = false;
        cpu.reg.sp = 0xfffc;
        mem.set_word(0xfffc, 0x1234).unwrap();
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.pc, 0x1234);
        assert!(cpu.ime);
    }

    #[test]
    fn test_halt_until_interrupt() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x76, 0x00]);
        cpu.ime = false;
        cpu.step(&mut mem).unwrap();
        assert!(cpu.halted);
        // Nothing pending: the CPU stays parked.
        assert_eq!(cpu.step(&mut mem).unwrap(), 4);
        assert_eq!(cpu.reg.pc, 0x0101);
        // A pending interrupt releases HALT without dispatching when IME is
        // off.
        mem.set(0xff0f, 0x01).unwrap();
        mem.set(0xffff, 0x01).unwrap();
        cpu.step(&mut mem).unwrap();
        assert!(!cpu.halted);
        assert_eq!(cpu.reg.pc, 0x0102);
    }

    #[test]
    fn test_illegal_opcode() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0xd3]);
        assert_eq!(cpu.step(&mut mem), Err(Error::IllegalOpcode(0xd3)));
    }

    #[test]
    fn test_daa_and_stop_are_stubs() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x27]);
        assert_eq!(cpu.step(&mut mem), Err(Error::NotImplemented(0x27)));
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x10]);
        assert_eq!(cpu.step(&mut mem), Err(Error::NotImplemented(0x10)));
    }

    #[test]
    fn test_ldi_ldd() {
        let mut cpu = Cpu::power_up();
        let mut mem = Ram::new(&[0x22, 0x3a]);
        cpu.reg.a = 0x77;
        cpu.reg.set_hl(0xc000);
        cpu.step(&mut mem).unwrap();
        assert_eq!(mem.get(0xc000).unwrap(), 0x77);
        assert_eq!(cpu.reg.get_hl(), 0xc001);
        cpu.step(&mut mem).unwrap();
        assert_eq!(cpu.reg.a, 0x00);
        assert_eq!(cpu.reg.get_hl(), 0xc000);
    }
}

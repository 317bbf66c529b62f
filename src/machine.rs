// The driver loop: owns the CPU, the bus and the LCD controller and keeps
// them on a shared cycle budget. Each CPU step happens before the matching
// LCD update, and the LCD's interrupt raises are visible to the CPU at its
// next fetch.
use super::bus::Bus;
use super::cartridge::Cartridge;
use super::cpu::Cpu;
use super::error::Result;
use super::lcd::Lcd;
use super::screen::Screen;

pub struct Machine {
    pub bus: Bus,
    pub cpu: Cpu,
    pub lcd: Lcd,
}

impl Machine {
    pub fn power_up(rom: Vec<u8>) -> Result<Self> {
        Ok(Self {
            bus: Bus::power_up(Cartridge::power_up(rom)?),
            cpu: Cpu::power_up(),
            lcd: Lcd::power_up(),
        })
    }

    // One CPU instruction or interrupt entry, with the LCD keeping pace.
    pub fn next(&mut self, screen: &mut dyn Screen) -> Result<u32> {
        let cycles = self.cpu.step(&mut self.bus)?;
        self.lcd.update(&mut self.bus, screen, cycles)?;
        Ok(cycles)
    }

    // Drive the machine until the LCD presents a frame, returning the cycles
    // consumed. The front-end paces these calls to the display refresh.
    pub fn run_frame(&mut self, screen: &mut dyn Screen) -> Result<u32> {
        let mut cycles = 0;
        while !self.lcd.updated {
            cycles += self.next(screen)?;
        }
        self.lcd.updated = false;
        Ok(cycles)
    }
}

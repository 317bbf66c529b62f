// Failure conditions inside the emulation core. None of them are recoverable
// mid-session: they indicate either a host bug or a ROM doing something real
// hardware would lock up on, so callers propagate them out to the front-end.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum Error {
    // Raised by the cartridge or bus when an access falls outside the mapped
    // address space, e.g. a banked ROM read past the end of the image.
    #[error("address {0:#06x} is out of range")]
    AddrRange(u16),
    // Raised on MBC control writes against a cartridge without a bank
    // controller (cartridge type 0).
    #[error("cartridge is ROM only, control write at {0:#06x} rejected")]
    CartImmutable(u16),
    // The eleven reserved opcodes. Real hardware hangs on these.
    #[error("illegal opcode {0:#04x}")]
    IllegalOpcode(u8),
    #[error("opcode {0:#04x} is not implemented")]
    NotImplemented(u8),
}

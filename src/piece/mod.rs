mod bitfield;

pub use bitfield::Bitfield;

//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection, no final XOR)
//! over arbitrary byte spans, via the `crc16` crate's precomputed-table state
//! machine (the same crate and variant the teacher's own ISO track parser
//! uses for IBM sector CRCs).

/// Computes CRC-16/CCITT-FALSE over `data`.
pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc = crc16::State::<crc16::CCITT_FALSE>::new();
    crc.update(data);
    crc.get()
}

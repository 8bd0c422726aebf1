//! 字节序与字序变换。

use domain::ByteOrder;

/// 按字节序把寄存器展开为字节。
pub fn registers_to_bytes(registers: &[u16], byte_order: ByteOrder) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for register in registers {
        match byte_order {
            ByteOrder::Msb => bytes.extend_from_slice(&register.to_be_bytes()),
            ByteOrder::Lsb => bytes.extend_from_slice(&register.to_le_bytes()),
        }
    }
    bytes
}

/// `registers_to_bytes` 的逆变换。奇数长度时末字节按 0 补齐。
pub fn bytes_to_registers(bytes: &[u8], byte_order: ByteOrder) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|chunk| {
            let pair = [chunk[0], chunk.get(1).copied().unwrap_or(0)];
            match byte_order {
                ByteOrder::Msb => u16::from_be_bytes(pair),
                ByteOrder::Lsb => u16::from_le_bytes(pair),
            }
        })
        .collect()
}

/// 每个 4 字节块内交换前后两个 16 位字；不足 4 字节的尾部保持不变。
///
/// 自逆：连续调用两次得到原缓冲区。
pub fn swap_words(bytes: &mut [u8]) {
    for chunk in bytes.chunks_exact_mut(4) {
        chunk.swap(0, 2);
        chunk.swap(1, 3);
    }
}

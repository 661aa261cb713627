//! Protocol-2.0-style packet framing for the servo bus.
//!
//! Packets use the header `FF FF FD 00`, a packet id byte, a little-endian
//! length field, an instruction byte, parameters, and a CRC-16 trailer. This
//! module only builds byte buffers; it has no knowledge of the serial port.

/// Header bytes that open every packet on the bus.
pub const HEADER: [u8; 4] = [0xFF, 0xFF, 0xFD, 0x00];

/// Broadcast packet id: addresses all motors at once.
pub const BROADCAST_ID: u8 = 0xFE;

/// `WRITE` instruction: write to a contiguous register range on one motor.
pub const INST_WRITE: u8 = 0x03;
/// `SYNC_WRITE` instruction: write the same register range on many motors
/// in a single bus transaction, one parameter block per motor.
pub const INST_SYNC_WRITE: u8 = 0x83;

/// Torque-enable control table register, length 1 byte.
pub const ADDR_TORQUE_ENABLE: u16 = 0x0040;
/// Goal-position control table register, length 4 bytes (little-endian).
pub const ADDR_GOAL_POSITION: u16 = 0x0074;
/// Byte width of the goal-position register.
pub const LEN_GOAL_POSITION: u16 = 4;

/// Compute the CRC-16 used to terminate every packet. Table-driven
/// implementation of the CRC used by the reference servo firmware's
/// Protocol 2.0 (MSB-first, non-reflected, poly 0x8005, init 0).
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        let index = (((crc >> 8) ^ byte as u16) & 0xFF) as usize;
        crc = (crc << 8) ^ CRC_TABLE[index];
    }
    crc
}

/// Build a single `WRITE` instruction packet targeting one motor.
pub fn build_write_packet(motor_id: u8, address: u16, params: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + params.len());
    body.push((address & 0xFF) as u8);
    body.push((address >> 8) as u8);
    body.extend_from_slice(params);
    build_packet(motor_id, INST_WRITE, &body)
}

/// Build a `SYNC_WRITE` instruction packet writing the same register range
/// on several motors, one `(motor_id, value_bytes)` pair per parameter block.
pub fn build_sync_write_packet(
    address: u16,
    data_len: u16,
    entries: &[(u8, Vec<u8>)],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + entries.len() * (1 + data_len as usize));
    body.push((address & 0xFF) as u8);
    body.push((address >> 8) as u8);
    body.push((data_len & 0xFF) as u8);
    body.push((data_len >> 8) as u8);
    for (id, value) in entries {
        body.push(*id);
        body.extend_from_slice(value);
    }
    build_packet(BROADCAST_ID, INST_SYNC_WRITE, &body)
}

fn build_packet(id: u8, instruction: u8, body: &[u8]) -> Vec<u8> {
    let length = (body.len() + 3) as u16; // instruction + body + 2 CRC bytes
    let mut packet = Vec::with_capacity(HEADER.len() + 3 + body.len() + 2);
    packet.extend_from_slice(&HEADER);
    packet.push(id);
    packet.push((length & 0xFF) as u8);
    packet.push((length >> 8) as u8);
    packet.push(instruction);
    packet.extend_from_slice(body);

    let crc = crc16(&packet);
    packet.push((crc & 0xFF) as u8);
    packet.push((crc >> 8) as u8);
    packet
}

/// Split a little-endian `u32` goal position into its 4 wire bytes.
pub fn goal_position_bytes(raw: u32) -> [u8; 4] {
    raw.to_le_bytes()
}

const CRC_TABLE: [u16; 256] = build_crc_table();

const fn build_crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc: u16 = (i as u16) << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x8005;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_position_bytes_round_trip() {
        let raw = 2389u32;
        let bytes = goal_position_bytes(raw);
        assert_eq!(u32::from_le_bytes(bytes), raw);
    }

    #[test]
    fn write_packet_has_correct_length_field() {
        let packet = build_write_packet(1, ADDR_TORQUE_ENABLE, &[1]);
        // header(4) + id(1) + len(2) + instruction(1) + addr(2) + param(1) + crc(2)
        assert_eq!(packet.len(), 13);
        let length = u16::from_le_bytes([packet[5], packet[6]]);
        assert_eq!(length as usize, packet.len() - 7);
    }

    #[test]
    fn sync_write_packet_contains_all_motor_ids() {
        let entries: Vec<(u8, Vec<u8>)> = (1..=12u8)
            .map(|id| (id, goal_position_bytes(2048).to_vec()))
            .collect();
        let packet = build_sync_write_packet(ADDR_GOAL_POSITION, LEN_GOAL_POSITION, &entries);
        assert_eq!(packet[4], BROADCAST_ID);
        for id in 1..=12u8 {
            assert!(packet.contains(&id));
        }
    }

    #[test]
    fn crc_is_deterministic() {
        let a = crc16(b"hello hexapod");
        let b = crc16(b"hello hexapod");
        assert_eq!(a, b);
        let c = crc16(b"hello hexapoe");
        assert_ne!(a, c);
    }

    #[test]
    fn crc_matches_known_good_reference_vector() {
        // Protocol 2.0 PING instruction packet for ID 1, a standard
        // reference example for this CRC (header, id, length, instruction,
        // no params): FF FF FD 00 01 03 00 01, CRC = 0x4E19.
        let packet = [0xFF, 0xFF, 0xFD, 0x00, 0x01, 0x03, 0x00, 0x01];
        assert_eq!(crc16(&packet), 0x4E19);
    }
}

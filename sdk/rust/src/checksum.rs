//! Additive integrity check shared by both entities.
//!
//! The channel corrupts packets by overwriting header or payload fields while
//! leaving the stored checksum alone, so a plain sum over every field is
//! enough: changing any single field changes the sum.

use sr_lab_abstract::Packet;

pub fn compute_checksum(packet: &Packet) -> i32 {
    packet
        .payload
        .iter()
        .fold(packet.seqnum.wrapping_add(packet.acknum), |sum, &b| {
            sum.wrapping_add(i32::from(b))
        })
}

pub fn is_corrupted(packet: &Packet) -> bool {
    packet.checksum != compute_checksum(packet)
}

/// Store the checksum of `packet`'s current fields.
pub fn seal(mut packet: Packet) -> Packet {
    packet.checksum = compute_checksum(&packet);
    packet
}

// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Build synthetic telemetry logs for integration tests.
// Author: Lukas Bower
#![allow(dead_code)]

pub const BLOCK: usize = 512;
pub const NVME_HOST_LOG_ID: u8 = 0x07;
pub const V2_SERIAL: &str = "PHAB1234";

/// Zero-filled log image with helpers to place headers, TOCs and objects.
pub struct LogBuilder {
    bytes: Vec<u8>,
}

impl LogBuilder {
    pub fn new(blocks: usize) -> Self {
        Self {
            bytes: vec![0u8; blocks * BLOCK],
        }
    }

    pub fn header(mut self, log_id: u8, last_blocks: [u16; 3]) -> Self {
        self.bytes[0] = log_id;
        self.bytes[5..8].copy_from_slice(&[0x5C, 0xD2, 0xE4]);
        for (slot, last) in last_blocks.iter().enumerate() {
            let at = 8 + slot * 2;
            self.bytes[at..at + 2].copy_from_slice(&last.to_le_bytes());
        }
        self.bytes[382] = 1;
        self.bytes[383] = 2;
        self
    }

    pub fn reason(mut self, major: u16, minor: u16, serial: &str) -> Self {
        self.bytes[384..386].copy_from_slice(&major.to_le_bytes());
        self.bytes[386..388].copy_from_slice(&minor.to_le_bytes());
        self.bytes[412..416].copy_from_slice(b"FW42");
        self.bytes[436..436 + serial.len()].copy_from_slice(serial.as_bytes());
        self
    }

    pub fn put(mut self, offset: usize, data: &[u8]) -> Self {
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn v1_toc(minor: u8, entries: &[(u16, u16)]) -> Vec<u8> {
    let mut toc = vec![0u8; BLOCK];
    toc[0] = 1;
    toc[1] = minor;
    for (slot, (start, count)) in entries.iter().enumerate() {
        let at = 4 + slot * 4;
        toc[at..at + 2].copy_from_slice(&start.to_le_bytes());
        toc[at + 2..at + 4].copy_from_slice(&count.to_le_bytes());
    }
    toc
}

/// Legacy object: 4096-byte header block followed by a payload filled with `id`.
pub fn v1_object(id: u8, cpu: u8, size_blocks: u16, name: &str) -> Vec<u8> {
    let mut object = vec![id; usize::from(size_blocks) * BLOCK];
    object[..4096].fill(0);
    object[0] = id;
    object[1] = cpu;
    object[4..6].copy_from_slice(&size_blocks.to_le_bytes());
    object[6..10].copy_from_slice(&u32::from(id).to_le_bytes());
    object[14..14 + name.len()].copy_from_slice(name.as_bytes());
    object
}

/// V1.4 object: 4096-byte header block with a 32-byte name.
pub fn v1_4_object(id: u8, cpu: u8, size_blocks: u16, name: &str) -> Vec<u8> {
    let mut object = vec![0xEE; usize::from(size_blocks) * BLOCK];
    object[..4096].fill(0);
    object[0] = id;
    object[1] = cpu;
    object[4..6].copy_from_slice(&size_blocks.to_le_bytes());
    object[6..6 + name.len()].copy_from_slice(name.as_bytes());
    object
}

pub fn v2_toc(area_size: u32, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut toc = vec![0u8; 16 + entries.len() * 8];
    toc[0] = 2;
    toc[2..4].copy_from_slice(&(entries.len() as u16).to_le_bytes());
    toc[4..8].copy_from_slice(&area_size.to_le_bytes());
    for (index, (offset, size)) in entries.iter().enumerate() {
        let at = 16 + index * 8;
        toc[at..at + 4].copy_from_slice(&offset.to_le_bytes());
        toc[at + 4..at + 8].copy_from_slice(&size.to_le_bytes());
    }
    toc
}

pub fn v2_object(major: u16, minor: u16, euid: u32, media: u8, payload: &[u8]) -> Vec<u8> {
    let mut object = Vec::with_capacity(12 + payload.len());
    object.extend_from_slice(&major.to_le_bytes());
    object.extend_from_slice(&minor.to_le_bytes());
    object.extend_from_slice(&euid.to_le_bytes());
    object.extend_from_slice(&[media, 0, 0, 0]);
    object.extend_from_slice(payload);
    object
}

/// Legacy-format log: 4096-byte header region, data area 1 with three V1
/// objects, data area 2 with one V1.4 object.
pub fn v1_log() -> Vec<u8> {
    v1_log_with_toc(&[(16, 9), (25, 9), (34, 9)])
}

pub fn v1_log_with_toc(entries: &[(u16, u16)]) -> Vec<u8> {
    LogBuilder::new(53)
        .header(NVME_HOST_LOG_ID, [42, 52, 52])
        .put(8 * BLOCK, &v1_toc(0, entries))
        .put(16 * BLOCK, &v1_object(0, 1, 9, "nplog"))
        .put(25 * BLOCK, &v1_object(1, 1, 9, "eventDump"))
        .put(34 * BLOCK, &v1_object(2, 2, 9, "stateSnapshot"))
        .put(43 * BLOCK, &v1_toc(4, &[(44, 9)]))
        .put(44 * BLOCK, &v1_4_object(3, 2, 9, "media_bank_statistics_v14"))
        .build()
}

pub fn v2_payload_a() -> Vec<u8> {
    (0u8..16).collect()
}

pub fn v2_payload_b() -> Vec<u8> {
    (100u8..120).collect()
}

/// V2 log with one 512-byte data area holding two objects at offsets 32 and 60.
pub fn v2_log(area_size: u32) -> Vec<u8> {
    v2_log_with(area_size, &[(32, 28), (60, 32)], 1)
}

pub fn v2_log_with(area_size: u32, entries: &[(u32, u32)], first_major: u16) -> Vec<u8> {
    LogBuilder::new(2)
        .header(NVME_HOST_LOG_ID, [1, 1, 1])
        .reason(1, 2, V2_SERIAL)
        .put(BLOCK, &v2_toc(area_size, entries))
        .put(BLOCK + 32, &v2_object(first_major, 0, 0x100, 0, &v2_payload_a()))
        .put(BLOCK + 60, &v2_object(2, 1, 0x200, 1, &v2_payload_b()))
        .build()
}

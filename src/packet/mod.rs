//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod error;
pub mod lsa;
pub mod tlv;

use std::net::Ipv4Addr;

use bitflags::bitflags;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

// OSPFv2 options field.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-1
bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct Options: u8 {
        const E = 0x02;
        const MC = 0x04;
        const NP = 0x08;
        const L = 0x10;
        const DC = 0x20;
        const O = 0x40;
    }
}

// Extension methods for Bytes.
pub trait BytesExt {
    // Gets an unsigned 24 bit integer from `self` in the big-endian byte
    // order.
    //
    // The current position is advanced by 3.
    fn get_u24(&mut self) -> u32;

    // Gets an IPv4 address from `self` in big-endian byte order.
    //
    // The current position is advanced by 4.
    fn get_ipv4(&mut self) -> Ipv4Addr;

    // Gets an optional IPv4 address from `self` in big-endian byte order,
    // mapping 0.0.0.0 to None.
    //
    // The current position is advanced by 4.
    fn get_opt_ipv4(&mut self) -> Option<Ipv4Addr>;
}

// Extension methods for BytesMut.
pub trait BytesMutExt {
    // Writes an unsigned 24 bit integer to `self` in the big-endian byte
    // order.
    //
    // The current position is advanced by 3.
    fn put_u24(&mut self, value: u32);

    // Writes an IPv4 address to `self` in big-endian byte order.
    //
    // The current position is advanced by 4.
    fn put_ipv4(&mut self, addr: &Ipv4Addr);
}

// ===== impl Bytes =====

impl BytesExt for Bytes {
    fn get_u24(&mut self) -> u32 {
        self.get_uint(3) as u32
    }

    fn get_ipv4(&mut self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_u32())
    }

    fn get_opt_ipv4(&mut self) -> Option<Ipv4Addr> {
        let addr = self.get_ipv4();
        (addr != Ipv4Addr::UNSPECIFIED).then_some(addr)
    }
}

// ===== impl BytesMut =====

impl BytesMutExt for BytesMut {
    fn put_u24(&mut self, value: u32) {
        self.put_uint(value.into(), 3);
    }

    fn put_ipv4(&mut self, addr: &Ipv4Addr) {
        self.put_slice(&addr.octets());
    }
}

//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::packet::error::{DecodeError, DecodeResult};
use crate::packet::{BytesExt, BytesMutExt};

// TLV header size.
pub const TLV_HDR_SIZE: u16 = 4;

// OSPFv2 Grace-LSA Top Level TLV types.
//
// IANA registry:
// https://www.iana.org/assignments/ospfv2-parameters/ospfv2-parameters.xhtml#ospfv2-parameters-13
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(FromPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum GraceTlvType {
    GracePeriod = 1,
    GrReason = 2,
    InterfaceAddr = 3,
}

//
// Grace Period TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                         Grace Period                          |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct GracePeriodTlv(u32);

//
// Graceful Restart reason TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// | Restart Reason|                 (padding)                     |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct GrReasonTlv(u8);

//
// IP interface address TLV.
//
// Encoding format:
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |              Type             |             Length            |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                   IP Interface Address                        |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Copy, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct GrInterfaceAddrTlv(Ipv4Addr);

// OSPF Graceful Restart reason value.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(FromPrimitive, ToPrimitive)]
#[derive(Deserialize, Serialize)]
pub enum GrReason {
    #[default]
    Unknown = 0,
    SoftwareRestart = 1,
    SoftwareUpgrade = 2,
    ControlProcessorSwitchover = 3,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct UnknownTlv {
    pub tlv_type: u16,
    pub length: u16,
    pub value: Bytes,
}

// ===== impl GracePeriodTlv =====

impl GracePeriodTlv {
    const VALUE_LEN: u16 = 4;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        // The grace period is a single 32-bit word.
        if tlv_len != Self::VALUE_LEN {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }

        Ok(GracePeriodTlv(buf.get_u32()))
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        tlv_put_hdr(buf, GraceTlvType::GracePeriod, Self::VALUE_LEN);
        buf.put_u32(self.0);
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

// ===== impl GrReasonTlv =====

impl GrReasonTlv {
    const VALUE_LEN: u16 = 1;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        // The restart reason is a single octet.
        if tlv_len != Self::VALUE_LEN {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }

        Ok(GrReasonTlv(buf.get_u8()))
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        tlv_put_hdr(buf, GraceTlvType::GrReason, Self::VALUE_LEN);
        buf.put_u8(self.0);
        // Pad the single-octet value out to the word boundary.
        buf.put_bytes(0, 3);
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

// ===== impl GrInterfaceAddrTlv =====

impl GrInterfaceAddrTlv {
    const VALUE_LEN: u16 = 4;

    pub(crate) fn decode(tlv_len: u16, buf: &mut Bytes) -> DecodeResult<Self> {
        // The interface address is a single IPv4 address.
        if tlv_len != Self::VALUE_LEN {
            return Err(DecodeError::InvalidTlvLength(tlv_len));
        }

        Ok(GrInterfaceAddrTlv(buf.get_ipv4()))
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        tlv_put_hdr(buf, GraceTlvType::InterfaceAddr, Self::VALUE_LEN);
        buf.put_ipv4(&self.0);
    }

    pub fn get(&self) -> Ipv4Addr {
        self.0
    }
}

// ===== impl GrReason =====

impl std::fmt::Display for GrReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrReason::Unknown => {
                write!(f, "unknown")
            }
            GrReason::SoftwareRestart => {
                write!(f, "software restart")
            }
            GrReason::SoftwareUpgrade => {
                write!(f, "software upgrade")
            }
            GrReason::ControlProcessorSwitchover => {
                write!(f, "control plane switchover")
            }
        }
    }
}

// ===== global functions =====

// Space the TLV value takes on the wire, including the padding up to the
// next 32-bit boundary. The declared length itself excludes the padding.
pub(crate) fn tlv_padded_len(tlv_len: u16) -> u16 {
    tlv_len.div_ceil(4) * 4
}

// All Grace-LSA TLVs carry fixed-size values, so their headers can be
// written up front with the final length.
fn tlv_put_hdr(buf: &mut BytesMut, tlv_type: GraceTlvType, tlv_len: u16) {
    buf.put_u16(tlv_type as u16);
    buf.put_u16(tlv_len);
}
